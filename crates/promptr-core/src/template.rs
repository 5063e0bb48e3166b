//! `{{name}}` placeholders inside saved prompts.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("placeholder pattern"));

/// Unique placeholder names in order of first appearance.
pub fn extract_variables(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Replace every placeholder that has a value. Unknown placeholders are left as written.
pub fn fill_variables(text: &str, values: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholders in `text` with no entry in `values`.
pub fn missing_variables(text: &str, values: &HashMap<String, String>) -> Vec<String> {
    extract_variables(text)
        .into_iter()
        .filter(|name| !values.contains_key(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn extracts_unique_names_in_order() {
        let text = "Dear {{name}}, your {{item}} ships to {{name}} at {{ address }}.";
        assert_eq!(extract_variables(text), vec!["name", "item"]);
        assert!(extract_variables("no placeholders").is_empty());
    }

    #[test]
    fn fills_known_and_keeps_unknown() {
        let text = "Translate {{text}} into {{language}}.";
        let filled = fill_variables(text, &values(&[("language", "French")]));
        assert_eq!(filled, "Translate {{text}} into French.");
    }

    #[test]
    fn value_containing_braces_is_inserted_verbatim() {
        let filled = fill_variables("{{a}} and {{b}}", &values(&[("a", "{{b}}"), ("b", "$1")]));
        assert_eq!(filled, "{{b}} and $1");
    }

    #[test]
    fn reports_missing_values() {
        let text = "{{role}} reviewing {{topic}}";
        assert_eq!(
            missing_variables(text, &values(&[("role", "editor")])),
            vec!["topic"]
        );
    }
}
