//! Response Normalizer — extracts a plain-text reply from a model response of
//! unknown shape.
//!
//! The known shapes form a small closed set, attempted in priority order via
//! typed decodes rather than attribute poking. An unrecognized shape (or a
//! recognized one whose text is empty/whitespace) yields `None`; the caller
//! decides whether that is a placeholder situation or a hard failure.

use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct ChatShape {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: String,
}

#[derive(Deserialize)]
struct DeltaShape {
    choices: Vec<DeltaChoice>,
}

#[derive(Deserialize)]
struct DeltaChoice {
    delta: DeltaBody,
}

#[derive(Deserialize)]
struct DeltaBody {
    content: String,
}

#[derive(Deserialize)]
struct CompletionShape {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct FlatText {
    text: String,
}

#[derive(Deserialize)]
struct FlatResponse {
    response: String,
}

fn decode<T: for<'de> Deserialize<'de>>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

/// First matching candidate across the known shapes, in priority order:
/// chat choice → streaming delta → completion text → flat `text` → flat
/// `response` → bare string.
fn first_candidate(response: &Value) -> Option<String> {
    if let Some(text) = decode::<ChatShape>(response)
        .and_then(|s| s.choices.into_iter().next())
        .map(|c| c.message.content)
    {
        return Some(text);
    }
    if let Some(text) = decode::<DeltaShape>(response)
        .and_then(|s| s.choices.into_iter().next())
        .map(|c| c.delta.content)
    {
        return Some(text);
    }
    if let Some(text) = decode::<CompletionShape>(response)
        .and_then(|s| s.choices.into_iter().next())
        .map(|c| c.text)
    {
        return Some(text);
    }
    if let Some(flat) = decode::<FlatText>(response) {
        return Some(flat.text);
    }
    if let Some(flat) = decode::<FlatResponse>(response) {
        return Some(flat.response);
    }
    if let Value::String(s) = response {
        return Some(s.clone());
    }
    None
}

/// Extracts the assistant text from an untrusted model response.
/// Returns `None` when no known shape matches or when the matched text is
/// empty/whitespace — never panics, never errors.
pub fn extract_text(response: &Value) -> Option<String> {
    let text = first_candidate(response)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_shape() {
        let resp = json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]});
        assert_eq!(extract_text(&resp).as_deref(), Some("hello"));
    }

    #[test]
    fn test_streaming_delta_shape() {
        let resp = json!({"choices": [{"delta": {"content": "partial"}}]});
        assert_eq!(extract_text(&resp).as_deref(), Some("partial"));
    }

    #[test]
    fn test_completion_shape() {
        let resp = json!({"choices": [{"text": "completed"}]});
        assert_eq!(extract_text(&resp).as_deref(), Some("completed"));
    }

    #[test]
    fn test_flat_text_shape() {
        let resp = json!({"text": "flat"});
        assert_eq!(extract_text(&resp).as_deref(), Some("flat"));
    }

    #[test]
    fn test_flat_response_shape() {
        let resp = json!({"response": "nested"});
        assert_eq!(extract_text(&resp).as_deref(), Some("nested"));
    }

    #[test]
    fn test_bare_string() {
        let resp = json!("just text");
        assert_eq!(extract_text(&resp).as_deref(), Some("just text"));
    }

    #[test]
    fn test_chat_shape_wins_over_flat_text() {
        let resp = json!({
            "choices": [{"message": {"content": "from chat"}}],
            "text": "from flat"
        });
        assert_eq!(extract_text(&resp).as_deref(), Some("from chat"));
    }

    #[test]
    fn test_empty_choices_falls_through_to_flat_text() {
        let resp = json!({"choices": [], "text": "fallback"});
        assert_eq!(extract_text(&resp).as_deref(), Some("fallback"));
    }

    #[test]
    fn test_unrecognized_shape_returns_none() {
        let resp = json!({"foo": "bar"});
        assert_eq!(extract_text(&resp), None);
    }

    #[test]
    fn test_whitespace_content_returns_none() {
        let resp = json!({"choices": [{"message": {"content": "   \n  "}}]});
        assert_eq!(extract_text(&resp), None);
    }

    #[test]
    fn test_result_is_trimmed() {
        let resp = json!({"text": "  padded  "});
        assert_eq!(extract_text(&resp).as_deref(), Some("padded"));
    }
}
