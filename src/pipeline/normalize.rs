//! Response normalisation: arbitrary agent output → one display string.
//!
//! Webhook agents answer with whatever their last workflow node produced:
//! a bare string, `{"output": "..."}`, `[{"output": "..."}]`, a JSON-encoded
//! string with its quotes still attached, or something else entirely. The
//! value is first lifted into the closed [`RawResponse`] enum, then walked
//! with a fixed key-priority search. The walk is total: unknown shapes yield
//! an empty string, never an error and never an object dump.

use serde_json::Value;
use tracing::debug;

/// Keys searched, in order, when the response is a mapping.
pub const TEXT_KEYS: &[&str] = &["output", "text", "content", "message", "answer", "reply"];

/// Nesting beyond this depth is ignored.
pub const MAX_NORMALIZE_DEPTH: usize = 32;

/// An untrusted value received from the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    /// `null` or an absent body.
    Nullish,
    Text(String),
    Sequence(Vec<RawResponse>),
    /// Key order is preserved but irrelevant; lookup is by [`TEXT_KEYS`].
    Mapping(Vec<(String, RawResponse)>),
    /// Numbers and booleans, already stringified.
    Other(String),
}

impl RawResponse {
    /// Parse a response body. Anything that is not JSON is kept as text.
    pub fn from_body(body: &str) -> Self {
        if body.trim().is_empty() {
            return RawResponse::Nullish;
        }
        match serde_json::from_str::<Value>(body) {
            Ok(v) => RawResponse::from(v),
            Err(_) => RawResponse::Text(body.to_string()),
        }
    }

    fn get(&self, key: &str) -> Option<&RawResponse> {
        match self {
            RawResponse::Mapping(entries) => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }
}

impl From<Value> for RawResponse {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawResponse::Nullish,
            Value::String(s) => RawResponse::Text(s),
            Value::Array(items) => {
                RawResponse::Sequence(items.into_iter().map(RawResponse::from).collect())
            }
            Value::Object(map) => RawResponse::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, RawResponse::from(v)))
                    .collect(),
            ),
            Value::Bool(b) => RawResponse::Other(b.to_string()),
            Value::Number(n) => RawResponse::Other(n.to_string()),
        }
    }
}

impl From<&str> for RawResponse {
    fn from(s: &str) -> Self {
        RawResponse::Text(s.to_string())
    }
}

impl From<String> for RawResponse {
    fn from(s: String) -> Self {
        RawResponse::Text(s)
    }
}

/// Extract the best candidate text from a raw agent response.
pub fn normalize(value: &RawResponse) -> String {
    normalize_at(value, 0)
}

fn normalize_at(value: &RawResponse, depth: usize) -> String {
    if depth > MAX_NORMALIZE_DEPTH {
        debug!("Response nesting exceeds {} levels; ignoring", MAX_NORMALIZE_DEPTH);
        return String::new();
    }

    match value {
        RawResponse::Nullish => String::new(),
        RawResponse::Text(s) => clean_text(s),
        RawResponse::Sequence(items) => items
            .iter()
            .map(|item| normalize_at(item, depth + 1))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        RawResponse::Mapping(_) => {
            for key in TEXT_KEYS {
                if let Some(inner) = value.get(key) {
                    return normalize_at(inner, depth + 1);
                }
            }
            String::new()
        }
        RawResponse::Other(s) => s.trim().to_string(),
    }
}

/// Strip one layer of JSON-style quoting, unescape `\n`, trim.
pub(crate) fn clean_text(s: &str) -> String {
    strip_wrapping_quotes(s).replace("\\n", "\n").trim().to_string()
}

/// Remove one leading and one trailing `"` or `'`, independently.
pub(crate) fn strip_wrapping_quotes(s: &str) -> &str {
    let s = s.strip_prefix(['"', '\'']).unwrap_or(s);
    s.strip_suffix(['"', '\'']).unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn norm(v: Value) -> String {
        normalize(&RawResponse::from(v))
    }

    #[test]
    fn null_is_empty() {
        assert_eq!(norm(json!(null)), "");
        assert_eq!(normalize(&RawResponse::Nullish), "");
    }

    #[test]
    fn string_is_unquoted_unescaped_trimmed() {
        assert_eq!(norm(json!("\"Hello\\nworld\"")), "Hello\nworld");
        assert_eq!(norm(json!("'single'")), "single");
        assert_eq!(norm(json!("  plain  ")), "plain");
    }

    #[test]
    fn quotes_are_stripped_before_trimming() {
        // Trailing whitespace hides the closing quote from the strip.
        assert_eq!(norm(json!("\"Hello\\nworld\"  ")), "Hello\nworld\"");
        assert_eq!(norm(json!("'quoted'  ")), "quoted'");
        assert_eq!(norm(json!("  'quoted'")), "'quoted");
    }

    #[test]
    fn only_one_quote_layer_is_removed() {
        assert_eq!(norm(json!("\"\"twice\"\"")), "\"twice\"");
    }

    #[test]
    fn array_joins_non_empty_with_blank_line() {
        let v = json!([{"output": "first"}, null, "", {"unknown": 1}, "second"]);
        assert_eq!(norm(v), "first\n\nsecond");
    }

    #[test]
    fn mapping_uses_first_priority_key_only() {
        let v = json!({"reply": "late", "text": "early", "output": "first"});
        assert_eq!(norm(v), "first");

        let v = json!({"reply": "late", "content": "mid"});
        assert_eq!(norm(v), "mid");
    }

    #[test]
    fn present_null_key_stops_the_search() {
        let v = json!({"output": null, "text": "ignored"});
        assert_eq!(norm(v), "");
    }

    #[test]
    fn mapping_without_known_keys_is_empty() {
        assert_eq!(norm(json!({"foo": "bar", "nested": {"x": 1}})), "");
        assert_eq!(norm(json!({})), "");
    }

    #[test]
    fn nested_mapping_recurses() {
        let v = json!({"message": {"content": [{"text": "deep"}]}});
        assert_eq!(norm(v), "deep");
    }

    #[test]
    fn primitives_are_stringified() {
        assert_eq!(norm(json!(42)), "42");
        assert_eq!(norm(json!(true)), "true");
    }

    #[test]
    fn idempotent_on_clean_strings() {
        for s in ["hello", "Line one\nLine two", "", "a  b"] {
            let once = normalize(&RawResponse::from(s));
            let twice = normalize(&RawResponse::from(once.as_str()));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn adversarial_nesting_is_bounded() {
        let mut v = json!("bottom");
        for _ in 0..(MAX_NORMALIZE_DEPTH + 10) {
            v = json!({ "output": v });
        }
        assert_eq!(norm(v), "");

        let mut v = json!("bottom");
        for _ in 0..5 {
            v = json!([v]);
        }
        assert_eq!(norm(v), "bottom");
    }

    #[test]
    fn from_body_falls_back_to_text() {
        assert_eq!(
            RawResponse::from_body("not json at all"),
            RawResponse::Text("not json at all".into())
        );
        assert_eq!(RawResponse::from_body("   "), RawResponse::Nullish);
        assert_eq!(
            normalize(&RawResponse::from_body(r#"{"output":"ok"}"#)),
            "ok"
        );
    }
}
