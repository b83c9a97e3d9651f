//! Canonical cache keys: `namespace:path?sorted-query`.

use url::form_urlencoded;
use url::Url;

fn assemble(namespace: &str, path: &str, mut pairs: Vec<(String, String)>) -> String {
    pairs.sort();
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&pairs)
        .finish();
    if query.is_empty() {
        format!("{namespace}:{path}")
    } else {
        format!("{namespace}:{path}?{query}")
    }
}

/// Key for a logical request. Parameter order does not matter.
pub fn cache_key(namespace: &str, path: &str, params: &[(&str, &str)]) -> String {
    let pairs = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assemble(namespace, path, pairs)
}

/// Key for a raw request target such as `/api/goals/3/history?b=2&a=1`.
///
/// A target that does not parse as a relative URL is used verbatim.
pub fn cache_key_from_request(namespace: &str, raw: &str) -> String {
    let parsed = Url::parse("http://localhost").and_then(|base| base.join(raw));
    match parsed {
        Ok(url) => {
            let pairs = url.query_pairs().into_owned().collect();
            assemble(namespace, url.path(), pairs)
        }
        Err(_) => format!("{namespace}:{raw}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_order_collides() {
        let a = cache_key("goals", "history", &[("unit", "Matriz"), ("id", "3")]);
        let b = cache_key("goals", "history", &[("id", "3"), ("unit", "Matriz")]);
        assert_eq!(a, b);
        assert_eq!(a, "goals:history?id=3&unit=Matriz");
    }

    #[test]
    fn test_distinct_values_do_not_collide() {
        let a = cache_key("goals", "history", &[("id", "3")]);
        let b = cache_key("goals", "history", &[("id", "4")]);
        let c = cache_key("options", "history", &[("id", "3")]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache_key("goals", "dashboard", &[]), "goals:dashboard");
    }

    #[test]
    fn test_values_are_encoded() {
        // A value containing separators cannot impersonate another parameter
        let a = cache_key("o", "p", &[("team", "a&unit=b")]);
        let b = cache_key("o", "p", &[("team", "a"), ("unit", "b")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_request() {
        let a = cache_key_from_request("admin", "/api/goals/3/history?periodicity=daily&scope=CARD");
        let b = cache_key_from_request("admin", "/api/goals/3/history?scope=CARD&periodicity=daily");
        assert_eq!(a, b);
        assert_eq!(a, "admin:/api/goals/3/history?periodicity=daily&scope=CARD");
        assert_eq!(
            cache_key_from_request("admin", "/api/status"),
            "admin:/api/status"
        );
    }
}
