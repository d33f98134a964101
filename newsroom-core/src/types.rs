//! Item records shared with upstream data.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The fields of a wire or agenda item that the counters read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Precomputed word count; anything but a non-negative whole number reads as absent.
    #[serde(default, deserialize_with = "whole_number", skip_serializing_if = "Option::is_none")]
    pub wordcount: Option<u64>,
    /// Precomputed character count, same rules as `wordcount`.
    #[serde(default, deserialize_with = "whole_number", skip_serializing_if = "Option::is_none")]
    pub charcount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
}

impl NewsItem {
    pub fn with_body(body_html: &str) -> Self {
        Self {
            body_html: Some(body_html.to_string()),
            ..Self::default()
        }
    }
}

fn whole_number<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(|v| match v {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_wordcount_is_kept() {
        let item: NewsItem = serde_json::from_str(r#"{"wordcount": 5, "body_html": "<p>x</p>"}"#).unwrap();
        assert_eq!(item.wordcount, Some(5));
        assert_eq!(item.body_html.as_deref(), Some("<p>x</p>"));
    }

    #[test]
    fn test_whole_float_wordcount_is_kept() {
        let item: NewsItem = serde_json::from_str(r#"{"wordcount": 7.0}"#).unwrap();
        assert_eq!(item.wordcount, Some(7));
    }

    #[test]
    fn test_non_integer_wordcount_reads_as_absent() {
        for raw in [
            r#"{"wordcount": 5.5}"#,
            r#"{"wordcount": "5"}"#,
            r#"{"wordcount": null}"#,
            r#"{"wordcount": -3}"#,
            r#"{}"#,
        ] {
            let item: NewsItem = serde_json::from_str(raw).unwrap();
            assert_eq!(item.wordcount, None, "input {raw}");
        }
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let json = serde_json::to_string(&NewsItem::with_body("<p>a</p>")).unwrap();
        assert_eq!(json, r#"{"body_html":"<p>a</p>"}"#);
    }
}
