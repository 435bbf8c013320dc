use serde_json::{Map, Value};

/// Merge `overlay` on top of `base`, one level deep.
///
/// Same-named top-level keys are replaced wholesale, tables included: a later
/// file that defines `environments` replaces the whole earlier subtree.
pub fn shallow_merge(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn disjoint_keys_merge() {
        let mut base = table(json!({"host": "localhost"}));
        shallow_merge(&mut base, table(json!({"port": 3000})));
        assert_eq!(base["host"], "localhost");
        assert_eq!(base["port"], 3000);
    }

    #[test]
    fn same_scalar_key_overlay_wins() {
        let mut base = table(json!({"port": 8080}));
        shallow_merge(&mut base, table(json!({"port": 3000})));
        assert_eq!(base["port"], 3000);
    }

    #[test]
    fn nested_tables_are_replaced_not_merged() {
        let mut base = table(json!({
            "environments": {"production": {"port": 80}, "staging": {"port": 8081}}
        }));
        shallow_merge(
            &mut base,
            table(json!({"environments": {"production": {"debug": false}}})),
        );
        assert_eq!(base["environments"], json!({"production": {"debug": false}}));
    }

    #[test]
    fn empty_overlay_is_noop() {
        let mut base = table(json!({"a": 1}));
        shallow_merge(&mut base, Map::new());
        assert_eq!(Value::Object(base), json!({"a": 1}));
    }
}
