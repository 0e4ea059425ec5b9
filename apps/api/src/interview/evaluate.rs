//! CV evaluation — a side channel that scores candidate/job fit without
//! touching any session or question counter.
//!
//! The model reply must carry four section markers. A reply that fails
//! validation gets exactly one reformat round-trip asking the model to
//! relabel its own output; if that still fails, the original unvalidated
//! text is returned rather than failing the request.

use tracing::warn;

use crate::errors::AppError;
use crate::gateway::normalize::extract_text;
use crate::gateway::{ChatGateway, ChatOptions};
use crate::sessions::{Message, Role};

/// Section markers every valid evaluation must contain.
pub const REQUIRED_MARKERS: [&str; 4] = ["SCORE:", "STRENGTHS:", "IMPROVEMENTS:", "SUMMARY:"];

const EVALUATION_SYSTEM: &str = "You are a senior technical recruiter evaluating a candidate's fit for a role. \
Respond with exactly four labeled sections, in this order:\n\
SCORE: an overall fit score from 0 to 100.\n\
STRENGTHS: two or three bullet points on where the candidate matches the role.\n\
IMPROVEMENTS: two or three bullet points on gaps relative to the role.\n\
SUMMARY: one short paragraph with a hiring recommendation.\n\
Do not add any other sections or commentary.";

const REFORMAT_INSTRUCTION: &str = "Your previous evaluation did not use the required section labels. \
Reformat the text below into exactly four sections labeled SCORE:, STRENGTHS:, IMPROVEMENTS:, and SUMMARY:. \
Preserve the content; change only the structure.\n\nPrevious evaluation:\n";

/// True when the text contains all four required section markers.
pub fn has_required_markers(text: &str) -> bool {
    REQUIRED_MARKERS.iter().all(|m| text.contains(m))
}

fn evaluation_request(
    cv_text: &str,
    job_description: Option<&str>,
    company_info: Option<&str>,
) -> String {
    let mut body = format!("Candidate CV:\n{cv_text}\n");
    if let Some(jd) = job_description.filter(|s| !s.trim().is_empty()) {
        body.push_str(&format!("\nJob Description:\n{jd}\n"));
    }
    if let Some(info) = company_info.filter(|s| !s.trim().is_empty()) {
        body.push_str(&format!("\nCompany Info:\n{info}\n"));
    }
    body
}

fn scoring_messages(user_content: String) -> Vec<Message> {
    vec![
        Message {
            role: Role::System,
            content: EVALUATION_SYSTEM.to_string(),
        },
        Message {
            role: Role::User,
            content: user_content,
        },
    ]
}

/// Scores a CV against an optional job description and company info.
///
/// An upstream error or an unextractable first reply is a hard failure —
/// evaluation never substitutes placeholder text. Validation failure of the
/// reply's shape triggers the single bounded reformat attempt.
pub async fn evaluate_cv(
    gateway: &dyn ChatGateway,
    options: &ChatOptions,
    cv_text: &str,
    job_description: Option<&str>,
    company_info: Option<&str>,
) -> Result<String, AppError> {
    if cv_text.trim().is_empty() {
        return Err(AppError::Validation("cv_text is required".to_string()));
    }

    let request = evaluation_request(cv_text, job_description, company_info);
    let response = gateway.chat(&scoring_messages(request), options).await?;
    let text = extract_text(&response).ok_or(AppError::SchemaDrift)?;

    if has_required_markers(&text) {
        return Ok(text);
    }

    warn!("evaluation reply missing required markers; issuing one reformat attempt");
    let reformat = format!("{REFORMAT_INSTRUCTION}{text}");
    match gateway.chat(&scoring_messages(reformat), options).await {
        Ok(second) => match extract_text(&second) {
            Some(reformatted) if has_required_markers(&reformatted) => Ok(reformatted),
            _ => {
                warn!("reformat attempt did not validate; returning original text");
                Ok(text)
            }
        },
        Err(e) => {
            warn!("reformat attempt failed upstream ({e}); returning original text");
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::interview::test_support::StubGateway;
    use serde_json::json;

    const VALID_EVAL: &str =
        "SCORE: 82\nSTRENGTHS:\n- strong backend depth\nIMPROVEMENTS:\n- little cloud exposure\nSUMMARY: solid hire.";

    #[test]
    fn test_marker_validation() {
        assert!(has_required_markers(VALID_EVAL));
        assert!(!has_required_markers("SCORE: 80\nSTRENGTHS: ok"));
        assert!(!has_required_markers(""));
    }

    #[tokio::test]
    async fn test_valid_first_reply_skips_reformat() {
        let gateway = StubGateway::replying(&[VALID_EVAL]);
        let reply = evaluate_cv(
            &gateway,
            &ChatOptions::default(),
            "Experienced engineer.",
            Some("Backend role."),
            None,
        )
        .await
        .unwrap();
        assert_eq!(reply, VALID_EVAL);
        assert_eq!(gateway.call_count(), 1, "no reformat call for a valid reply");
    }

    #[tokio::test]
    async fn test_invalid_reply_reformatted_once_and_accepted() {
        let gateway = StubGateway::replying(&["the candidate seems fine overall", VALID_EVAL]);
        let reply = evaluate_cv(
            &gateway,
            &ChatOptions::default(),
            "Experienced engineer.",
            None,
            None,
        )
        .await
        .unwrap();
        assert_eq!(reply, VALID_EVAL);
        assert_eq!(gateway.call_count(), 2);

        let calls = gateway.calls.lock().unwrap();
        assert!(
            calls[1][1].content.contains("the candidate seems fine overall"),
            "reformat prompt must carry the original reply"
        );
    }

    #[tokio::test]
    async fn test_failed_reformat_falls_back_to_original() {
        let gateway = StubGateway::replying(&["unlabeled evaluation", "still unlabeled"]);
        let reply = evaluate_cv(
            &gateway,
            &ChatOptions::default(),
            "Experienced engineer.",
            None,
            None,
        )
        .await
        .unwrap();
        assert_eq!(reply, "unlabeled evaluation");
        assert_eq!(gateway.call_count(), 2, "exactly one reformat attempt, never more");
    }

    #[tokio::test]
    async fn test_reformat_upstream_error_falls_back_to_original() {
        let gateway = StubGateway::new(vec![
            Ok(json!({"choices": [{"message": {"content": "unlabeled evaluation"}}]})),
            Err(GatewayError::Api {
                status: 503,
                message: "overloaded".to_string(),
            }),
        ]);
        let reply = evaluate_cv(
            &gateway,
            &ChatOptions::default(),
            "Experienced engineer.",
            None,
            None,
        )
        .await
        .unwrap();
        assert_eq!(reply, "unlabeled evaluation");
    }

    #[tokio::test]
    async fn test_empty_first_reply_is_hard_failure() {
        let gateway = StubGateway::new(vec![Ok(json!({"foo": "bar"}))]);
        let err = evaluate_cv(
            &gateway,
            &ChatOptions::default(),
            "Experienced engineer.",
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::SchemaDrift));
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_cv_rejected_before_any_call() {
        let gateway = StubGateway::new(vec![]);
        let err = evaluate_cv(&gateway, &ChatOptions::default(), "  ", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_request_includes_optional_materials() {
        let gateway = StubGateway::replying(&[VALID_EVAL]);
        evaluate_cv(
            &gateway,
            &ChatOptions::default(),
            "Experienced engineer.",
            Some("Backend role."),
            Some("Nimbus Analytics."),
        )
        .await
        .unwrap();

        let calls = gateway.calls.lock().unwrap();
        let body = &calls[0][1].content;
        assert!(body.contains("Candidate CV:"));
        assert!(body.contains("Backend role."));
        assert!(body.contains("Nimbus Analytics."));
    }
}
