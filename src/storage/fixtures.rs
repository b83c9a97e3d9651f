//! Fact row writers for seeding test databases. The ingestion workers own
//! these tables in production; the engine itself only reads them.

use rusqlite::{params, Connection};

/// A paid line from the billing export. `paid_on` keeps the export's
/// `DD/MM/YYYY` text.
#[derive(Debug, Clone, Default)]
pub(crate) struct BillingRecord {
    pub(crate) paid_on: String,
    pub(crate) unit: Option<String>,
    pub(crate) group: Option<String>,
    pub(crate) procedure: Option<String>,
    pub(crate) professional: Option<String>,
    pub(crate) team: Option<String>,
    pub(crate) amount: f64,
}

pub(crate) fn insert_billing(conn: &Connection, rec: &BillingRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO faturamento_analitico (
            data_do_pagamento, unidade, grupo, procedimento, profissional, equipe, total_pago
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            rec.paid_on,
            rec.unit,
            rec.group,
            rec.procedure,
            rec.professional,
            rec.team,
            rec.amount,
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ProposalRecord {
    pub(crate) proposal_id: i64,
    pub(crate) date: String,
    pub(crate) status: String,
    pub(crate) unit: Option<String>,
    pub(crate) professional: Option<String>,
    pub(crate) team: Option<String>,
    pub(crate) total_value: f64,
}

pub(crate) fn upsert_proposal(conn: &Connection, rec: &ProposalRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO feegow_proposals (
            proposal_id, date, status, unit_name, professional_name, team, total_value, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
        ON CONFLICT(proposal_id) DO UPDATE SET
            date=excluded.date, status=excluded.status, unit_name=excluded.unit_name,
            professional_name=excluded.professional_name, team=excluded.team,
            total_value=excluded.total_value, updated_at=excluded.updated_at",
        params![
            rec.proposal_id,
            rec.date,
            rec.status,
            rec.unit,
            rec.professional,
            rec.team,
            rec.total_value,
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ContractRecord {
    pub(crate) contract_id: i64,
    pub(crate) start_date: String,
    pub(crate) status: String,
    pub(crate) unit: Option<String>,
    pub(crate) seller: Option<String>,
    pub(crate) team: Option<String>,
    pub(crate) membership_value: f64,
    pub(crate) total_value: f64,
}

pub(crate) fn upsert_contract(conn: &Connection, rec: &ContractRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO feegow_contracts (
            contract_id, start_date, status_contract, unit_name, seller_name, team,
            membership_value, total_value, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
        ON CONFLICT(contract_id) DO UPDATE SET
            start_date=excluded.start_date, status_contract=excluded.status_contract,
            unit_name=excluded.unit_name, seller_name=excluded.seller_name, team=excluded.team,
            membership_value=excluded.membership_value, total_value=excluded.total_value,
            updated_at=excluded.updated_at",
        params![
            rec.contract_id,
            rec.start_date,
            rec.status,
            rec.unit,
            rec.seller,
            rec.team,
            rec.membership_value,
            rec.total_value,
        ],
    )?;
    Ok(())
}

mod tests {
    use super::*;
    use crate::storage::Database;

    #[tokio::test]
    async fn test_contract_upsert_replaces() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let mut rec = ContractRecord {
                    contract_id: 7,
                    start_date: "2025-01-10".into(),
                    status: "Pendente".into(),
                    membership_value: 50.0,
                    total_value: 600.0,
                    ..Default::default()
                };
                upsert_contract(conn, &rec)?;
                rec.status = "Aprovado".into();
                upsert_contract(conn, &rec)?;

                let (count, status): (i64, String) = conn.query_row(
                    "SELECT COUNT(*), MAX(status_contract) FROM feegow_contracts",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                assert_eq!(count, 1);
                assert_eq!(status, "Aprovado");
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
