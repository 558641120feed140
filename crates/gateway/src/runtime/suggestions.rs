//! Follow-up prompt generation after a final answer.
//!
//! One extra model call without tools. Any failure, or fewer than three
//! usable strings, means no suggestions.

use gw_domain::config::SuggestionsConfig;
use gw_domain::tool::{Message, Role};
use gw_providers::{ChatRequest, LlmProvider};

const COUNT: usize = 3;

const INSTRUCTION: &str = "Suggest exactly three short follow-up requests the user might \
    send next. Reply with a JSON array of three strings and nothing else.";

pub async fn generate(
    provider: &dyn LlmProvider,
    cfg: &SuggestionsConfig,
    run_model: &str,
    conversation: &[Message],
    answer: &str,
) -> Option<Vec<String>> {
    let request = conversation
        .iter()
        .find(|m| m.role == Role::User)
        .and_then(|m| m.content.text())
        .unwrap_or_default();

    let req = ChatRequest {
        messages: vec![Message::user(format!(
            "Request:\n{request}\n\nAnswer:\n{answer}\n\n{INSTRUCTION}"
        ))],
        max_tokens: Some(cfg.max_tokens),
        model: Some(cfg.model.clone().unwrap_or_else(|| run_model.to_string())),
        ..Default::default()
    };

    match provider.chat(req).await {
        Ok(resp) => {
            let parsed = parse(&resp.text());
            if parsed.is_none() {
                tracing::debug!("suggestions reply unusable; skipping");
            }
            parsed
        }
        Err(e) => {
            tracing::debug!(error = %e, "suggestions call failed; skipping");
            None
        }
    }
}

/// Pull the first JSON array of strings out of `text`.
fn parse(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    let items: Vec<String> = serde_json::from_str(&text[start..=end]).ok()?;
    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(COUNT)
        .collect();
    (items.len() == COUNT).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_arrays() {
        let text = "Sure:\n```json\n[\"a\", \"b\", \" c \"]\n```";
        assert_eq!(parse(text), Some(vec!["a".into(), "b".into(), "c".into()]));
    }

    #[test]
    fn rejects_short_or_malformed_replies() {
        assert_eq!(parse(r#"["only", "two"]"#), None);
        assert_eq!(parse("no json here"), None);
        assert_eq!(parse(r#"["a", 1, "c"]"#), None);
        assert_eq!(parse("] backwards ["), None);
    }

    #[test]
    fn extra_items_are_dropped() {
        let got = parse(r#"["a", "b", "c", "d"]"#).unwrap();
        assert_eq!(got.len(), 3);
    }
}
