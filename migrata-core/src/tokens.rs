//! `{{token}}` placeholder substitution for script text.
//!
//! Replacement is a single left-to-right pass with a case-sensitive exact
//! key match. Substituted values are never rescanned, and placeholders
//! without a mapping are left in the text untouched.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::{Captures, Regex};

use crate::error::{MigrateResult, MigrationError};

/// Token name to replacement value.
pub type Tokens = BTreeMap<String, String>;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z0-9_.\-]+)\}\}").expect("token pattern is a valid regex")
});

/// Replace every `{{name}}` whose name is present in `tokens`.
///
/// Returns the input unchanged (borrowed) when nothing matched.
pub fn replace_tokens<'t>(text: &'t str, tokens: &Tokens) -> Cow<'t, str> {
    if tokens.is_empty() {
        return Cow::Borrowed(text);
    }

    TOKEN_PATTERN.replace_all(text, |caps: &Captures<'_>| match tokens.get(&caps[1]) {
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    })
}

/// Names of the placeholders in `text` that have no mapping, in order of
/// first appearance.
pub fn unresolved_tokens(text: &str, tokens: &Tokens) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for caps in TOKEN_PATTERN.captures_iter(text) {
        let name = &caps[1];
        if !tokens.contains_key(name) && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    missing
}

/// Parse a `key=value` pair as given on the command line.
pub fn parse_token(input: &str) -> MigrateResult<(String, String)> {
    let (key, value) = input.split_once('=').ok_or_else(|| {
        MigrationError::invalid_configuration(format!(
            "token '{input}' must be written as key=value"
        ))
    })?;

    let key = key.trim();
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(MigrationError::invalid_configuration(format!(
            "invalid token name '{key}'"
        )));
    }

    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(pairs: &[(&str, &str)]) -> Tokens {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_replace_known_tokens() {
        let map = tokens(&[("schema", "sales"), ("owner", "app_user")]);
        let out = replace_tokens(
            "CREATE TABLE {{schema}}.orders (id INT); GRANT SELECT ON {{schema}}.orders TO {{owner}};",
            &map,
        );
        assert_eq!(
            out,
            "CREATE TABLE sales.orders (id INT); GRANT SELECT ON sales.orders TO app_user;"
        );
    }

    #[test]
    fn test_unknown_tokens_left_verbatim() {
        let map = tokens(&[("schema", "sales")]);
        let out = replace_tokens("SELECT '{{missing}}' FROM {{schema}}.t", &map);
        assert_eq!(out, "SELECT '{{missing}}' FROM sales.t");
    }

    #[test]
    fn test_case_sensitive_match() {
        let map = tokens(&[("Schema", "sales")]);
        assert_eq!(replace_tokens("{{schema}}", &map), "{{schema}}");
        assert_eq!(replace_tokens("{{Schema}}", &map), "sales");
    }

    #[test]
    fn test_replacement_is_not_rescanned() {
        let map = tokens(&[("a", "{{b}}"), ("b", "final")]);
        assert_eq!(replace_tokens("{{a}}", &map), "{{b}}");
    }

    #[test]
    fn test_idempotent_once_resolved() {
        let map = tokens(&[("schema", "sales"), ("env", "prod")]);
        let text = "INSERT INTO {{schema}}.settings VALUES ('{{env}}', '{{other}}')";
        let once = replace_tokens(text, &map).into_owned();
        let twice = replace_tokens(&once, &map).into_owned();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_tokens_borrows() {
        let out = replace_tokens("SELECT 1", &tokens(&[("a", "b")]));
        assert!(matches!(out, Cow::Borrowed(_)));
        let out = replace_tokens("SELECT {{a}}", &Tokens::new());
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_names_with_spaces_are_not_tokens() {
        let map = tokens(&[("a", "b")]);
        assert_eq!(replace_tokens("{{ a }}", &map), "{{ a }}");
    }

    #[test]
    fn test_unresolved_tokens() {
        let map = tokens(&[("schema", "sales")]);
        let missing = unresolved_tokens("{{owner}} {{schema}} {{env}} {{owner}}", &map);
        assert_eq!(missing, vec!["owner".to_string(), "env".to_string()]);
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(
            parse_token("schema=sales").unwrap(),
            ("schema".to_string(), "sales".to_string())
        );
        assert_eq!(
            parse_token("conn=a=b").unwrap(),
            ("conn".to_string(), "a=b".to_string())
        );
        assert!(parse_token("novalue").is_err());
        assert!(parse_token("=value").is_err());
        assert!(parse_token("bad name=value").is_err());
    }
}
