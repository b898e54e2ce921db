use std::sync::LazyLock;

use regex::{NoExpand, Regex, RegexBuilder};
use tracing::warn;

use super::extract::FieldValues;
use crate::error::{Error, Result};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    pub found_any: bool,
}

impl Substitution {
    /// The filled-in text, or `Extraction` if no field had a value.
    pub fn into_text(self) -> Result<String> {
        if self.found_any {
            Ok(self.text)
        } else {
            Err(Error::Extraction)
        }
    }
}

/// Replaces `{{identifier}}` tokens (case-insensitive) with found values.
/// Tokens of missing or failed fields stay in the text as written.
pub fn substitute(content: &str, values: &FieldValues) -> Substitution {
    let mut text = content.to_string();
    let mut found_any = false;

    for (key, value) in values {
        let Some(value) = value.found() else {
            continue;
        };
        let pattern = format!(r"\{{\{{{}\}}\}}", regex::escape(key));
        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => {
                text = re.replace_all(&text, NoExpand(value)).into_owned();
                found_any = true;
            }
            Err(e) => warn!(field = %key, "skipping placeholder: {}", e),
        }
    }

    Substitution { text, found_any }
}

/// Distinct placeholder identifiers in order of first appearance.
pub fn placeholders(content: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(content) {
        let id = &caps[1];
        if !seen.iter().any(|s| same_placeholder(s, id)) {
            seen.push(id.to_string());
        }
    }
    seen
}

/// Whether two identifiers name the same token, using the same case folding
/// as `substitute`.
pub fn same_placeholder(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::extract::FieldValue;

    fn values(pairs: &[(&str, FieldValue)]) -> FieldValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn found(v: &str) -> FieldValue {
        FieldValue::Found(v.to_string())
    }

    #[test]
    fn replaces_token() {
        let out = substitute("Hello {{name}}!", &values(&[("name", found("World"))]));
        assert_eq!(out.text, "Hello World!");
        assert!(out.found_any);
    }

    #[test]
    fn missing_value_leaves_token() {
        let out = substitute("Hello {{name}}!", &values(&[("name", FieldValue::Missing)]));
        assert_eq!(out.text, "Hello {{name}}!");
        assert!(!out.found_any);
        assert!(matches!(out.into_text(), Err(Error::Extraction)));
    }

    #[test]
    fn failed_value_leaves_token() {
        let out = substitute(
            "{{a}} / {{b}}",
            &values(&[("a", FieldValue::Failed("bad".into())), ("b", found("ok"))]),
        );
        assert_eq!(out.text, "{{a}} / ok");
        assert!(out.found_any);
    }

    #[test]
    fn token_match_is_case_insensitive() {
        let out = substitute("{{Name}} and {{NAME}}", &values(&[("name", found("X"))]));
        assert_eq!(out.text, "X and X");
    }

    #[test]
    fn all_occurrences_replaced() {
        let out = substitute("{{x}}-{{x}}-{{x}}", &values(&[("x", found("1"))]));
        assert_eq!(out.text, "1-1-1");
    }

    #[test]
    fn values_are_inserted_literally() {
        let out = substitute("cost: {{p}}", &values(&[("p", found("$1 ${2} $$"))]));
        assert_eq!(out.text, "cost: $1 ${2} $$");
    }

    #[test]
    fn identifiers_are_not_regex() {
        let out = substitute("{{a.b}} {{axb}}", &values(&[("a.b", found("dot"))]));
        assert_eq!(out.text, "dot {{axb}}");
    }

    #[test]
    fn unmapped_tokens_are_kept() {
        let out = substitute("{{x}} {{y}}", &values(&[("x", found("1"))]));
        assert_eq!(out.text, "1 {{y}}");
    }

    #[test]
    fn found_value_without_token_still_counts() {
        let out = substitute("static text", &values(&[("x", found("1"))]));
        assert_eq!(out.into_text().unwrap(), "static text");
    }

    #[test]
    fn empty_values_fail() {
        assert!(!substitute("{{x}}", &FieldValues::new()).found_any);
    }

    #[test]
    fn lists_placeholders_once() {
        let ids = placeholders("{{name}}, order {{id}} for {{Name}} {{id}} {x}");
        assert_eq!(ids, ["name", "id"]);
    }

    #[test]
    fn non_ascii_placeholders_fold_like_substitution() {
        assert_eq!(placeholders("{{ä}} {{Ä}} {{Straße}}"), ["ä", "Straße"]);
        assert!(same_placeholder("Ä", "ä"));
        assert!(!same_placeholder("a", "ä"));

        let out = substitute("{{Ä}}", &values(&[("ä", found("umlaut"))]));
        assert_eq!(out.text, "umlaut");
    }
}
