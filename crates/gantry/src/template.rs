//! `{{VAR}}` template substitution over nested configuration values.
//!
//! Server descriptors may carry placeholders anywhere in their string leaves
//! (URLs, header values, future fields), so the walk is over generic
//! [`serde_json::Value`] trees rather than a fixed schema. Extraction and
//! substitution are pure: inputs are never mutated.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

/// Placeholder: double braces around an identifier, optional inner whitespace.
static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("valid placeholder regex"));

/// Collect the distinct template variable names referenced anywhere in `node`.
///
/// Non-string scalars are ignored. The result is sorted, which keeps error
/// reporting and mode detection deterministic.
pub fn extract_template_vars(node: &Value) -> BTreeSet<String> {
    let mut vars = BTreeSet::new();
    collect_vars(node, &mut vars);
    vars
}

fn collect_vars(node: &Value, out: &mut BTreeSet<String>) {
    match node {
        Value::String(s) => {
            for cap in VAR_RE.captures_iter(s) {
                out.insert(cap[1].to_string());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_vars(item, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_vars(v, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// True iff `node` references at least one template variable.
pub fn has_templates(node: &Value) -> bool {
    !extract_template_vars(node).is_empty()
}

/// Return a deep copy of `node` with every placeholder replaced from `values`.
///
/// All placeholders in one string are replaced; non-template content passes
/// through unchanged. Fails with [`Error::MissingTemplateVariables`] naming
/// every referenced-but-unsupplied variable (sorted) before touching any
/// string. Unused entries in `values` are ignored.
pub fn substitute_templates(node: &Value, values: &HashMap<String, String>) -> Result<Value> {
    let referenced = extract_template_vars(node);
    let missing: Vec<String> = referenced
        .iter()
        .filter(|name| !values.contains_key(*name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingTemplateVariables { missing });
    }
    Ok(replace(node, values))
}

fn replace(node: &Value, values: &HashMap<String, String>) -> Value {
    match node {
        Value::String(s) => {
            if !s.contains("{{") {
                return Value::String(s.clone());
            }
            let replaced = VAR_RE.replace_all(s, |cap: &regex::Captures<'_>| {
                // Coverage was checked up front; absent here means the name
                // was not captured as a placeholder at extraction time.
                values.get(&cap[1]).cloned().unwrap_or_else(|| cap[0].to_string())
            });
            Value::String(replaced.into_owned())
        }
        Value::Array(items) => Value::Array(items.iter().map(|i| replace(i, values)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), replace(v, values)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Non-fatal syntax diagnostics: flags string leaves whose `{{` and `}}`
/// counts disagree. Balanced single braces (ordinary JSON text) pass.
pub fn validate_template_syntax(node: &Value) -> Vec<String> {
    let mut diagnostics = Vec::new();
    check_syntax(node, "$", &mut diagnostics);
    diagnostics
}

fn check_syntax(node: &Value, path: &str, out: &mut Vec<String>) {
    match node {
        Value::String(s) => {
            let opens = s.matches("{{").count();
            let closes = s.matches("}}").count();
            if opens != closes {
                out.push(format!(
                    "unbalanced braces at {path}: {opens} '{{{{' vs {closes} '}}}}' in {s:?}"
                ));
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_syntax(item, &format!("{path}[{i}]"), out);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                check_syntax(v, &format!("{path}.{k}"), out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: &Value) -> BTreeSet<String> {
        extract_template_vars(value)
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_single_variable() {
        let config = json!({"url": "https://api.example.com/{{API_KEY}}"});
        assert_eq!(vars(&config), set(&["API_KEY"]));
    }

    #[test]
    fn extracts_across_nested_maps_and_lists() {
        let config = json!({
            "url": "{{BASE_URL}}/api",
            "headers": {"Authorization": "Bearer {{USER_TOKEN}}"},
            "mirrors": ["https://{{SERVER1}}/api", "https://{{SERVER2}}/api"],
            "deep": {"a": {"b": {"token": "{{DEEP_TOKEN}}"}}}
        });
        assert_eq!(
            vars(&config),
            set(&["BASE_URL", "USER_TOKEN", "SERVER1", "SERVER2", "DEEP_TOKEN"])
        );
    }

    #[test]
    fn duplicates_collapse_and_whitespace_is_tolerated() {
        let config = json!({
            "a": "{{ TOKEN }}",
            "b": "{{  TOKEN  }}",
            "c": "{{TOKEN}}"
        });
        assert_eq!(vars(&config), set(&["TOKEN"]));
        // Extraction is a pure read; repeating it yields the same set.
        assert_eq!(vars(&config), vars(&config));
    }

    #[test]
    fn non_string_scalars_are_ignored() {
        let config = json!({"port": 8080, "enabled": true, "timeout": null, "t": "{{TOKEN}}"});
        assert_eq!(vars(&config), set(&["TOKEN"]));
    }

    #[test]
    fn no_variables_means_empty_set_and_static() {
        let config = json!({"url": "https://api.example.com", "headers": {"K": "hardcoded"}});
        assert_eq!(vars(&config), BTreeSet::new());
        assert!(!has_templates(&config));
        assert!(has_templates(&json!({"u": "{{X}}"})));
    }

    #[test]
    fn substitutes_multiple_variables_in_one_string() {
        let config = json!({"url": "https://{{HOST}}:{{PORT}}/{{PATH}}"});
        let values: HashMap<String, String> = [
            ("HOST", "api.example.com"),
            ("PORT", "8443"),
            ("PATH", "v1/api"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let out = substitute_templates(&config, &values).unwrap();
        assert_eq!(out["url"], "https://api.example.com:8443/v1/api");
    }

    #[test]
    fn substitution_preserves_non_template_values_and_input() {
        let config = json!({
            "port": 8080,
            "enabled": true,
            "timeout": null,
            "static_url": "https://api.example.com",
            "dynamic_token": "{{TOKEN}}"
        });
        let values = HashMap::from([("TOKEN".to_string(), "secret".to_string())]);
        let out = substitute_templates(&config, &values).unwrap();
        assert_eq!(out["port"], 8080);
        assert_eq!(out["enabled"], true);
        assert_eq!(out["timeout"], Value::Null);
        assert_eq!(out["static_url"], "https://api.example.com");
        assert_eq!(out["dynamic_token"], "secret");
        // original untouched
        assert_eq!(config["dynamic_token"], "{{TOKEN}}");
    }

    #[test]
    fn missing_variables_reported_sorted_and_complete() {
        let config = json!({"a": "{{TOKEN_B}}", "b": "{{TOKEN_A}}", "c": "{{TOKEN_C}}"});
        let values = HashMap::from([("TOKEN_C".to_string(), "v".to_string())]);
        let err = substitute_templates(&config, &values).unwrap_err();
        match err {
            Error::MissingTemplateVariables { missing } => {
                assert_eq!(missing, vec!["TOKEN_A".to_string(), "TOKEN_B".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_variable_message_is_stable() {
        let config = json!({"token": "{{TOKEN}}"});
        let err = substitute_templates(&config, &HashMap::new()).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Missing required template variables:")
        );
        assert!(err.to_string().contains("TOKEN"));
    }

    #[test]
    fn extra_values_are_ignored() {
        let config = json!({"token": "{{TOKEN}}"});
        let values = HashMap::from([
            ("TOKEN".to_string(), "secret".to_string()),
            ("EXTRA".to_string(), "ignored".to_string()),
        ]);
        let out = substitute_templates(&config, &values).unwrap();
        assert_eq!(out, json!({"token": "secret"}));
    }

    #[test]
    fn static_config_substitutes_to_itself() {
        let config = json!({"url": "https://api.example.com", "n": 1});
        let out = substitute_templates(&config, &HashMap::new()).unwrap();
        assert_eq!(out, config);
    }

    #[test]
    fn syntax_flags_unbalanced_braces_only() {
        let bad = json!({"token": "{{TOKEN}"});
        let diags = validate_template_syntax(&bad);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("unbalanced braces"));

        let json_ish = json!({"body": "{\"key\": \"value\"}"});
        assert!(validate_template_syntax(&json_ish).is_empty());

        let fine = json!({"token": "{{TOKEN}}"});
        assert!(validate_template_syntax(&fine).is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn var_name() -> impl Strategy<Value = String> {
            "[A-Z][A-Z0-9_]{0,14}"
        }

        proptest! {
            // Substituting exactly the extracted variable set leaves no
            // placeholders behind, and re-extraction finds nothing.
            #[test]
            fn round_trip_leaves_no_placeholders(
                names in proptest::collection::btree_set(var_name(), 1..5),
                fill in "[a-z0-9./-]{0,12}",
            ) {
                let parts: Vec<String> = names
                    .iter()
                    .map(|n| format!("https://host/{{{{{n}}}}}/{fill}"))
                    .collect();
                let config = serde_json::json!({"urls": parts, "fixed": fill});

                let extracted = extract_template_vars(&config);
                prop_assert_eq!(&extracted, &names);

                let values: HashMap<String, String> = extracted
                    .iter()
                    .map(|n| (n.clone(), format!("v-{}", n.to_lowercase())))
                    .collect();
                let out = substitute_templates(&config, &values).unwrap();
                prop_assert!(extract_template_vars(&out).is_empty());
                let rendered = serde_json::to_string(&out).unwrap();
                prop_assert!(!rendered.contains("{{"));
            }
        }
    }
}
