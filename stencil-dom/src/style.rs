use std::collections::BTreeMap;

use serde_json::Value;

/// Splits an inline style string (`color: red; width: 10px`) into declarations.
/// Later declarations override earlier ones, unknown syntax is ignored.
pub fn parse(css: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for decl in css.split(';') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }
        if let Some((k, v)) = decl.split_once(':') {
            let (k, v) = (k.trim(), v.trim());
            if !k.is_empty() {
                map.insert(k.to_string(), v.to_string());
            }
        }
    }
    map
}

/// Style from a runtime value: an object of declarations or a css string.
pub fn from_value(value: &Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(object) => object
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), stencil_expr::value::to_display(v)))
            .collect(),
        Value::String(css) => parse(css),
        _ => BTreeMap::new(),
    }
}
