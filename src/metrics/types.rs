use serde::Serialize;

use crate::error::{Error, Result};
use crate::goal::{Dimension, Scope};

/// A fact table the aggregator can read, with its column mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactTable {
    /// Billing / appointment lines (`faturamento_analitico`).
    Billing,
    /// Commercial proposals (`feegow_proposals`).
    Proposals,
    /// Card contracts (`feegow_contracts`).
    Contracts,
}

/// Normalizes `DD/MM/YYYY` payment dates to ISO; anything else is cut to
/// its date part.
pub(crate) const BILLING_DATE_EXPR: &str = "(CASE WHEN data_do_pagamento LIKE '__/__/____' \
     THEN substr(data_do_pagamento, 7, 4) || '-' || substr(data_do_pagamento, 4, 2) || '-' || substr(data_do_pagamento, 1, 2) \
     ELSE substr(data_do_pagamento, 1, 10) END)";

impl FactTable {
    pub fn name(&self) -> &'static str {
        match self {
            FactTable::Billing => "faturamento_analitico",
            FactTable::Proposals => "feegow_proposals",
            FactTable::Contracts => "feegow_contracts",
        }
    }

    /// SQL expression yielding the row's ISO date.
    pub fn date_expr(&self) -> &'static str {
        match self {
            FactTable::Billing => BILLING_DATE_EXPR,
            FactTable::Proposals => "substr(date, 1, 10)",
            FactTable::Contracts => "substr(start_date, 1, 10)",
        }
    }

    /// Column holding the unit name; card/benefit units are matched on it.
    pub fn unit_column(&self) -> &'static str {
        match self {
            FactTable::Billing => "unidade",
            FactTable::Proposals | FactTable::Contracts => "unit_name",
        }
    }

    /// Column backing `dim` in this table, if the table has one.
    pub fn column_for(&self, dim: Dimension) -> Option<&'static str> {
        match (self, dim) {
            (FactTable::Billing, Dimension::Group) => Some("grupo"),
            (FactTable::Billing, Dimension::Unit) => Some("unidade"),
            (FactTable::Billing, Dimension::Collaborator) => Some("profissional"),
            (FactTable::Billing, Dimension::Team) => Some("equipe"),
            (FactTable::Proposals, Dimension::Collaborator) => Some("professional_name"),
            (FactTable::Contracts, Dimension::Collaborator) => Some("seller_name"),
            (FactTable::Proposals | FactTable::Contracts, Dimension::Unit) => Some("unit_name"),
            (FactTable::Proposals | FactTable::Contracts, Dimension::Team) => Some("team"),
            (FactTable::Proposals | FactTable::Contracts, Dimension::Group) => None,
        }
    }

    /// Tables that make up a scope's fact family.
    pub fn for_scope(scope: Scope) -> &'static [FactTable] {
        match scope {
            Scope::Clinic => &[FactTable::Billing],
            Scope::Card => &[FactTable::Proposals, FactTable::Contracts],
        }
    }
}

/// How a metric's value is read off an aggregate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Sum,
    Count,
    /// `total / count`, zero when nothing matched.
    Ratio,
}

/// A computable metric from the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    Appointments,
    TicketMedio,
    Proposals,
    Sales,
    Contracts,
    SalesQty,
}

/// The sentinel metric id of goals that are advanced by hand.
pub const MANUAL_METRIC: &str = "manual";

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Revenue,
        Metric::Appointments,
        Metric::TicketMedio,
        Metric::Proposals,
        Metric::Sales,
        Metric::Contracts,
        Metric::SalesQty,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Metric::Revenue => "revenue",
            Metric::Appointments => "appointments",
            Metric::TicketMedio => "ticket_medio",
            Metric::Proposals => "proposals",
            Metric::Sales => "sales",
            Metric::Contracts => "contracts",
            Metric::SalesQty => "sales_qty",
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Metric::Revenue | Metric::Appointments | Metric::TicketMedio => Scope::Clinic,
            Metric::Proposals | Metric::Sales | Metric::Contracts | Metric::SalesQty => Scope::Card,
        }
    }

    pub fn table(&self) -> FactTable {
        match self {
            Metric::Revenue | Metric::Appointments | Metric::TicketMedio => FactTable::Billing,
            Metric::Proposals => FactTable::Proposals,
            Metric::Sales | Metric::Contracts | Metric::SalesQty => FactTable::Contracts,
        }
    }

    /// Expression summed into `total`.
    pub fn value_expr(&self) -> &'static str {
        match self {
            Metric::Revenue | Metric::Appointments | Metric::TicketMedio => "total_pago",
            Metric::Proposals => "total_value",
            Metric::Sales => "membership_value",
            Metric::Contracts | Metric::SalesQty => "total_value",
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            Metric::Revenue | Metric::Sales | Metric::Contracts => ValueKind::Sum,
            Metric::Appointments | Metric::Proposals | Metric::SalesQty => ValueKind::Count,
            Metric::TicketMedio => ValueKind::Ratio,
        }
    }

    /// Resolve a goal's linked metric id. `Ok(None)` is the manual sentinel.
    ///
    /// A metric that exists but belongs to the other scope is as unusable as
    /// an unknown one.
    pub fn resolve(id: &str, scope: Scope) -> Result<Option<Metric>> {
        let id = id.trim();
        if id.is_empty() || id.eq_ignore_ascii_case(MANUAL_METRIC) {
            return Ok(None);
        }
        let metric = Metric::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(id))
            .ok_or_else(|| Error::Unconfigured(format!("unknown metric: {id:?}")))?;
        if metric.scope() != scope {
            return Err(Error::Unconfigured(format!(
                "metric {} is not available for scope {scope}",
                metric.id()
            )));
        }
        Ok(Some(metric))
    }
}

/// One bucket of a history series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    /// `YYYY-MM-DD` or `YYYY-MM`, depending on the bucket.
    pub period: String,
    pub total: f64,
    pub count: u64,
    /// The metric's value for this bucket.
    pub value: f64,
}

impl AggregateRow {
    pub fn new(period: String, total: f64, count: u64, kind: ValueKind) -> Self {
        Self {
            value: metric_value(kind, total, count),
            period,
            total,
            count,
        }
    }
}

pub fn metric_value(kind: ValueKind, total: f64, count: u64) -> f64 {
    match kind {
        ValueKind::Sum => total,
        ValueKind::Count => count as f64,
        ValueKind::Ratio if count == 0 => 0.0,
        ValueKind::Ratio => total / count as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_catalogue() {
        assert_eq!(Metric::resolve("manual", Scope::Card).unwrap(), None);
        assert_eq!(Metric::resolve("", Scope::Clinic).unwrap(), None);
        assert_eq!(
            Metric::resolve("revenue", Scope::Clinic).unwrap(),
            Some(Metric::Revenue)
        );
        assert_eq!(
            Metric::resolve("SALES_QTY", Scope::Card).unwrap(),
            Some(Metric::SalesQty)
        );
    }

    #[test]
    fn test_resolve_rejects_unknown_and_cross_scope() {
        assert!(matches!(
            Metric::resolve("churn", Scope::Clinic),
            Err(Error::Unconfigured(_))
        ));
        assert!(matches!(
            Metric::resolve("revenue", Scope::Card),
            Err(Error::Unconfigured(_))
        ));
    }

    #[test]
    fn test_columns_ignore_missing_dimensions() {
        assert_eq!(FactTable::Billing.column_for(Dimension::Group), Some("grupo"));
        assert_eq!(FactTable::Proposals.column_for(Dimension::Group), None);
        assert_eq!(
            FactTable::Contracts.column_for(Dimension::Collaborator),
            Some("seller_name")
        );
    }

    #[test]
    fn test_metric_value() {
        assert_eq!(metric_value(ValueKind::Sum, 10.5, 3), 10.5);
        assert_eq!(metric_value(ValueKind::Count, 10.5, 3), 3.0);
        assert_eq!(metric_value(ValueKind::Ratio, 30.0, 3), 10.0);
        assert_eq!(metric_value(ValueKind::Ratio, 0.0, 0), 0.0);
    }
}
