use serde::Deserialize;

use crate::Classification;

pub const MAX_TAGS: usize = 5;
pub const MAX_DESCRIPTION_CHARS: usize = 200;
const FALLBACK_DESCRIPTION: &str = "AI generated reading guide";

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Cut `text` to at most `max_chars` characters, appending `marker` when cut.
pub fn truncate_chars(text: &str, max_chars: usize, marker: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}{marker}", &text[..end]),
        None => text.to_string(),
    }
}

/// Parse the classifier reply, tolerating markdown code fences around the JSON.
///
/// Anything that is not a JSON object yields no tags and the start of the reply as
/// the description.
pub fn parse_classification(reply: &str) -> Classification {
    let body = strip_code_fence(reply.trim());
    match serde_json::from_str::<RawClassification>(body) {
        Ok(raw) => Classification {
            tags: raw
                .tags
                .into_iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .take(MAX_TAGS)
                .collect(),
            description: truncate_chars(
                raw.desc.or(raw.description).unwrap_or_default().trim(),
                MAX_DESCRIPTION_CHARS,
                "",
            ),
        },
        Err(_) => Classification {
            tags: Vec::new(),
            description: if body.is_empty() {
                FALLBACK_DESCRIPTION.to_string()
            } else {
                truncate_chars(body, MAX_DESCRIPTION_CHARS, "")
            },
        },
    }
}

/// Description used when classification fails entirely.
pub fn fallback_classification() -> Classification {
    Classification {
        tags: Vec::new(),
        description: FALLBACK_DESCRIPTION.to_string(),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_is_parsed() {
        let reply = "```json\n{\"tags\": [\"nlp\", \" \", \"survey\"], \"desc\": \"A survey.\"}\n```";
        let parsed = parse_classification(reply);
        assert_eq!(parsed.tags, vec!["nlp", "survey"]);
        assert_eq!(parsed.description, "A survey.");
    }

    #[test]
    fn tags_and_description_are_capped() {
        let reply = format!(
            "{{\"tags\": [\"a\",\"b\",\"c\",\"d\",\"e\",\"f\"], \"description\": \"{}\"}}",
            "x".repeat(300)
        );
        let parsed = parse_classification(&reply);
        assert_eq!(parsed.tags.len(), MAX_TAGS);
        assert_eq!(parsed.description.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn plain_text_reply_becomes_description() {
        let parsed = parse_classification("Not JSON at all");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.description, "Not JSON at all");

        assert_eq!(parse_classification("   ").description, FALLBACK_DESCRIPTION);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("文献阅读指南", 2, "…"), "文献…");
        assert_eq!(truncate_chars("short", 10, "…"), "short");
    }
}
