//! Raw template substitution
//!
//! `?` placeholders take positional arguments in order (array arguments are
//! spliced in element by element); `:name` placeholders take named arguments.
//! Placeholders without a matching argument are left as written.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::quoting::quote_json;
use crate::condition::{RawTemplate, TemplateArgs};

fn named_placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r":(\w+)").expect("placeholder pattern is valid"))
}

/// Renders a raw template into dialect text
pub fn render(template: &RawTemplate) -> String {
    match &template.args {
        TemplateArgs::Positional(args) => fill_positional(&template.text, args),
        TemplateArgs::Named(args) => named_placeholder()
            .replace_all(&template.text, |caps: &Captures<'_>| match args.get(&caps[1]) {
                Some(value) => quote_json(value),
                None => caps[0].to_string(),
            })
            .into_owned(),
    }
}

fn fill_positional(text: &str, args: &[Value]) -> String {
    let mut flattened = args.iter().flat_map(|arg| match arg {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    });

    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '?' {
            match flattened.next() {
                Some(value) => out.push_str(&quote_json(value)),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn positional(text: &str, args: Vec<Value>) -> RawTemplate {
        RawTemplate {
            text: text.into(),
            args: TemplateArgs::Positional(args),
        }
    }

    #[test]
    fn test_positional_replacements() {
        let t = positional("body in (?, ?)", vec![json!("FUZ"), json!("BUZ")]);
        assert_eq!(render(&t), r#"body in ("FUZ", "BUZ")"#);
    }

    #[test]
    fn test_positional_subarray() {
        let t = positional("body in (?, ?)", vec![json!(["FUZ", "BUZ"])]);
        assert_eq!(render(&t), r#"body in ("FUZ", "BUZ")"#);
    }

    #[test]
    fn test_literal_without_args() {
        let t = positional("body like '%frotz%'", vec![]);
        assert_eq!(render(&t), "body like '%frotz%'");
    }

    #[test]
    fn test_named_replacements() {
        let mut args = BTreeMap::new();
        args.insert("title".to_string(), json!("foo"));
        args.insert("body".to_string(), json!("bar"));
        let t = RawTemplate {
            text: "title = :title and body = :body".into(),
            args: TemplateArgs::Named(args),
        };
        assert_eq!(render(&t), r#"title = "foo" and body = "bar""#);
    }

    #[test]
    fn test_missing_named_placeholder_kept() {
        let t = RawTemplate {
            text: "title = :title".into(),
            args: TemplateArgs::Named(BTreeMap::new()),
        };
        assert_eq!(render(&t), "title = :title");
    }

    #[test]
    fn test_values_are_escaped() {
        let t = positional("title = ?", vec![json!("a \"quoted\" word")]);
        assert_eq!(render(&t), r#"title = "a ""quoted"" word""#);
    }
}
