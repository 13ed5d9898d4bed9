//! `{name}` placeholder substitution for request templates
//!
//! A leaf string that starts with `{` and ends with `}` names a parameter;
//! the whole leaf is replaced by that parameter's value, which may be any
//! JSON type. Strings that merely contain braces are left alone.

use crate::{Error, Result};
use serde_json::{Map, Value};

/// Parameters available to a template.
pub type Params = Map<String, Value>;

/// Return a copy of `template` with every placeholder leaf resolved.
///
/// The template itself is not touched, so one template can serve many
/// requests. A placeholder without a matching parameter is a configuration
/// defect and fails with [`Error::MissingPlaceholder`].
pub fn resolve_placeholders(template: &Value, params: &Params) -> Result<Value> {
    match template {
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key.clone(), resolve_placeholders(value, params)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_placeholders(item, params))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::String(s) => match placeholder_name(s) {
            Some(name) => params
                .get(name)
                .cloned()
                .ok_or_else(|| Error::MissingPlaceholder { name: name.to_string() }),
            None => Ok(template.clone()),
        },
        _ => Ok(template.clone()),
    }
}

/// Resolve every value of a mapping, keeping key order.
pub fn resolve_map(template: &Map<String, Value>, params: &Params) -> Result<Map<String, Value>> {
    let mut resolved = Map::with_capacity(template.len());
    for (key, value) in template {
        resolved.insert(key.clone(), resolve_placeholders(value, params)?);
    }
    Ok(resolved)
}

fn placeholder_name(s: &str) -> Option<&str> {
    if s.starts_with('{') && s.ends_with('}') {
        Some(s.trim_matches(|c| c == '{' || c == '}'))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> Params {
        let mut p = Params::new();
        p.insert("timestamp_now".into(), json!(1718000000123_i64));
        p.insert("search_value".into(), json!("89860000000000000001"));
        p.insert("cookies".into(), json!("JSESSIONID=abc"));
        p
    }

    #[test]
    fn test_resolves_nested_maps_and_lists() {
        let template = json!({
            "_dc": "{timestamp_now}",
            "search": [
                {"property": "oneBox", "type": "CONTAINS", "value": "{search_value}"},
                {"property": "status", "value": ["{search_value}", "fixed"]}
            ],
            "page": 1
        });

        let resolved = resolve_placeholders(&template, &params()).unwrap();

        assert_eq!(resolved["_dc"], json!(1718000000123_i64));
        assert_eq!(resolved["search"][0]["value"], json!("89860000000000000001"));
        assert_eq!(resolved["search"][1]["value"][0], json!("89860000000000000001"));
        assert_eq!(resolved["search"][1]["value"][1], json!("fixed"));
        assert_eq!(resolved["page"], json!(1));
    }

    #[test]
    fn test_template_is_left_untouched() {
        let template = json!({"Cookie": "{cookies}"});
        let before = template.clone();
        let resolved = resolve_placeholders(&template, &params()).unwrap();
        assert_eq!(template, before);
        assert_eq!(resolved, json!({"Cookie": "JSESSIONID=abc"}));
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let template = json!({
            "limit": 50,
            "sort": [{"property": "iccid", "direction": "ASC"}],
            "note": "braces {inside} text",
            "flag": true,
            "none": null
        });
        let resolved = resolve_placeholders(&template, &params()).unwrap();
        assert_eq!(resolved, template);
        assert_eq!(resolve_placeholders(&resolved, &params()).unwrap(), template);
    }

    #[test]
    fn test_missing_parameter_is_fatal() {
        let template = json!({"a": {"b": ["{sim_id}"]}});
        let err = resolve_placeholders(&template, &params()).unwrap_err();
        match err {
            Error::MissingPlaceholder { name } => assert_eq!(name, "sim_id"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_map_keeps_key_order() {
        let template = json!({"z": "{search_value}", "a": "static", "m": "{timestamp_now}"});
        let Value::Object(map) = template else { unreachable!() };
        let resolved = resolve_map(&map, &params()).unwrap();
        let keys: Vec<_> = resolved.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
