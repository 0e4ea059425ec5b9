//! Turn Controller — the state machine governing session lifecycle.
//!
//! Lifecycle: created → (assets attached)* → active → quota-exhausted. A
//! quota-exhausted session stops producing assistant turns but stays
//! readable. Each turn holds the session's own mutex for its full duration
//! (append → gateway call → append → counter), so concurrent requests against
//! one session serialize instead of interleaving.

pub mod evaluate;
pub mod handlers;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::gateway::normalize::extract_text;
use crate::gateway::{ChatGateway, ChatOptions};
use crate::prompt::presets::PresetStore;
use crate::prompt::{self, AssetUpdate, START_INSTRUCTION};
use crate::sessions::{seed_metadata, Message, Role, Session, SessionStore};

/// Appended as the assistant turn when the gateway nominally succeeds but the
/// response carries no extractable text. Conversational turns only; the
/// evaluation path treats the same situation as a hard failure.
pub const NO_TEXT_PLACEHOLDER: &str = "(no text returned from model)";

/// Result of one start/message turn.
#[derive(Debug, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub questions_asked: u64,
    pub max_questions: u64,
}

#[derive(Debug, Default)]
pub struct CreateParams {
    pub role: Option<String>,
    pub system_prompt: Option<String>,
    pub technicality: Option<Value>,
    pub politeness: Option<Value>,
    pub difficulty: Option<Value>,
    pub max_questions: Option<u64>,
    pub metadata: Option<Map<String, Value>>,
}

impl CreateParams {
    fn has_dials(&self) -> bool {
        self.technicality.is_some() || self.politeness.is_some() || self.difficulty.is_some()
    }
}

/// Creates a session. Prompt precedence: explicit `system_prompt`, then a
/// style preset when any dial is present, then the role-based default.
pub fn create_session(
    store: &SessionStore,
    presets: &PresetStore,
    default_max_questions: u64,
    params: CreateParams,
) -> Result<Session, AppError> {
    let system_prompt = match params.system_prompt {
        Some(prompt) => prompt,
        None if params.has_dials() => presets
            .lookup(
                prompt::dial(params.technicality.as_ref()),
                prompt::dial(params.politeness.as_ref()),
                prompt::dial(params.difficulty.as_ref()),
            )
            .ok_or_else(|| AppError::Validation("unresolvable style preset".to_string()))?
            .to_string(),
        None => prompt::default_system_prompt(params.role.as_deref()),
    };

    let max_questions = params.max_questions.unwrap_or(default_max_questions);
    let metadata = seed_metadata(params.metadata, max_questions);
    let session = store.create(system_prompt, metadata);
    info!("created session {} (max_questions={max_questions})", session.id);
    Ok(session)
}

/// Merges assets into the session prompt. Consumes no quota, but is only
/// valid while the session can still produce turns.
pub async fn attach_assets(
    store: &SessionStore,
    id: Uuid,
    update: AssetUpdate,
    base_prompt: Option<String>,
) -> Result<Session, AppError> {
    if update.is_empty() {
        return Err(AppError::Validation(
            "no assets provided; expected cv, job_description, or company_info".to_string(),
        ));
    }

    let slot = store
        .entry(id)
        .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))?;
    let mut session = slot.lock().await;
    session.check_quota()?;
    prompt::attach_assets(&mut session, update, base_prompt.as_deref());
    Ok(session.clone())
}

/// Swaps the system prompt for a style preset. Consumes no quota.
pub async fn apply_settings(
    store: &SessionStore,
    presets: &PresetStore,
    id: Uuid,
    technicality: Option<Value>,
    politeness: Option<Value>,
    difficulty: Option<Value>,
) -> Result<Session, AppError> {
    // Resolve before any mutation: an unresolvable preset changes nothing.
    let preset = presets
        .lookup(
            prompt::dial(technicality.as_ref()),
            prompt::dial(politeness.as_ref()),
            prompt::dial(difficulty.as_ref()),
        )
        .ok_or_else(|| AppError::Validation("unresolvable style preset".to_string()))?
        .to_string();

    store.set_system_prompt(id, preset).await?;
    store
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))
}

/// First turn of an interview. Sends the system prompt plus a fixed
/// single-question kickoff instruction — not the (empty) history — so the
/// opening reply is exactly one question rather than an evaluation.
pub async fn start_turn(
    store: &SessionStore,
    gateway: &dyn ChatGateway,
    options: &ChatOptions,
    id: Uuid,
) -> Result<TurnOutcome, AppError> {
    let slot = store
        .entry(id)
        .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))?;
    let mut session = slot.lock().await;
    session.check_quota()?;

    let kickoff = vec![
        Message {
            role: Role::System,
            content: session.system_prompt.clone(),
        },
        Message {
            role: Role::User,
            content: START_INSTRUCTION.to_string(),
        },
    ];

    let response = gateway.chat(&kickoff, options).await?;
    let reply = extract_text(&response).unwrap_or_else(|| NO_TEXT_PLACEHOLDER.to_string());

    session.append(Role::Assistant, reply.clone());
    session.record_question();
    info!(
        "session {id}: started interview ({}/{})",
        session.questions_asked(),
        session.max_questions()
    );

    Ok(TurnOutcome {
        reply,
        questions_asked: session.questions_asked(),
        max_questions: session.max_questions(),
    })
}

/// One user-initiated exchange. The user message is appended before the
/// gateway call and survives a failed call — the turn is at-least-recorded,
/// not all-or-nothing.
pub async fn message_turn(
    store: &SessionStore,
    gateway: &dyn ChatGateway,
    options: &ChatOptions,
    id: Uuid,
    content: String,
) -> Result<TurnOutcome, AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("message content is empty".to_string()));
    }

    let slot = store
        .entry(id)
        .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))?;
    let mut session = slot.lock().await;
    session.check_quota()?;

    session.append(Role::User, content);
    let history = session.messages.clone();

    let response = gateway.chat(&history, options).await?;
    let reply = extract_text(&response).unwrap_or_else(|| NO_TEXT_PLACEHOLDER.to_string());

    session.append(Role::Assistant, reply.clone());
    session.record_question();

    Ok(TurnOutcome {
        reply,
        questions_asked: session.questions_asked(),
        max_questions: session.max_questions(),
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::StubGateway;
    use super::*;
    use crate::gateway::GatewayError;
    use serde_json::json;

    fn fixtures() -> (SessionStore, PresetStore) {
        (SessionStore::new(), PresetStore::new())
    }

    fn new_session(store: &SessionStore, presets: &PresetStore, max_questions: u64) -> Session {
        create_session(
            store,
            presets,
            10,
            CreateParams {
                max_questions: Some(max_questions),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_create_with_explicit_prompt_wins_over_dials() {
        let (store, presets) = fixtures();
        let session = create_session(
            &store,
            &presets,
            10,
            CreateParams {
                system_prompt: Some("custom prompt".to_string()),
                technicality: Some(json!(3)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(session.system_prompt, "custom prompt");
    }

    #[test]
    fn test_create_with_dials_resolves_preset() {
        let (store, presets) = fixtures();
        let session = create_session(
            &store,
            &presets,
            10,
            CreateParams {
                technicality: Some(json!(3)),
                politeness: Some(json!(1)),
                ..Default::default()
            },
        )
        .unwrap();
        // difficulty missing → defaults to 2
        assert_eq!(
            session.system_prompt,
            presets.lookup(3, 1, 2).unwrap().to_string()
        );
    }

    #[test]
    fn test_create_without_prompt_or_dials_uses_role_default() {
        let (store, presets) = fixtures();
        let session = create_session(
            &store,
            &presets,
            10,
            CreateParams {
                role: Some("data science interviewer".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(session.system_prompt.contains("data science interviewer"));
    }

    #[tokio::test]
    async fn test_start_sends_kickoff_not_history() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 10);
        let gateway = StubGateway::replying(&["What drew you to backend work?"]);

        let outcome = start_turn(&store, &gateway, &ChatOptions::default(), session.id)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "What drew you to backend work?");
        assert_eq!(outcome.questions_asked, 1);

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls[0].len(), 2, "kickoff is system + instruction only");
        assert_eq!(calls[0][0].role, Role::System);
        assert_eq!(calls[0][1].role, Role::User);
        assert_eq!(calls[0][1].content, START_INSTRUCTION);

        drop(calls);
        let snapshot = store.get(session.id).await.unwrap();
        // Only the assistant reply lands in history; the kickoff stays out.
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_message_sends_entire_history() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 10);
        let gateway = StubGateway::replying(&["First question?", "Follow-up?"]);

        start_turn(&store, &gateway, &ChatOptions::default(), session.id)
            .await
            .unwrap();
        message_turn(
            &store,
            &gateway,
            &ChatOptions::default(),
            session.id,
            "I led a migration to Rust.".to_string(),
        )
        .await
        .unwrap();

        let calls = gateway.calls.lock().unwrap();
        let history = &calls[1];
        // system + assistant question + user answer
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[2].content, "I led a migration to Rust.");
    }

    #[tokio::test]
    async fn test_quota_end_to_end_with_single_question() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 1);
        let gateway = StubGateway::replying(&["Only question."]);

        let outcome = start_turn(&store, &gateway, &ChatOptions::default(), session.id)
            .await
            .unwrap();
        assert_eq!(outcome.questions_asked, 1);

        let err = message_turn(
            &store,
            &gateway,
            &ChatOptions::default(),
            session.id,
            "my answer".to_string(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::QuotaExhausted { asked: 1, max: 1 }));

        // No user or assistant message was appended by the rejected turn.
        let snapshot = store.get(session.id).await.unwrap();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_session_remains_readable() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 1);
        let gateway = StubGateway::replying(&["Only question."]);
        start_turn(&store, &gateway, &ChatOptions::default(), session.id)
            .await
            .unwrap();

        let snapshot = store.get(session.id).await.unwrap();
        assert_eq!(snapshot.questions_asked(), 1);
        assert!(!snapshot.quota_remaining());
    }

    #[tokio::test]
    async fn test_user_message_survives_gateway_failure() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 10);
        let gateway = StubGateway::new(vec![Err(GatewayError::Api {
            status: 503,
            message: "overloaded".to_string(),
        })]);

        let err = message_turn(
            &store,
            &gateway,
            &ChatOptions::default(),
            session.id,
            "my answer".to_string(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));

        let snapshot = store.get(session.id).await.unwrap();
        assert_eq!(snapshot.messages.len(), 2, "user message must be retained");
        assert_eq!(snapshot.messages[1].role, Role::User);
        assert_eq!(snapshot.messages[1].content, "my answer");
        assert_eq!(snapshot.questions_asked(), 0, "failed turn consumes no quota");
    }

    #[tokio::test]
    async fn test_unextractable_reply_becomes_placeholder() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 10);
        let gateway = StubGateway::new(vec![Ok(json!({"foo": "bar"}))]);

        let outcome = message_turn(
            &store,
            &gateway,
            &ChatOptions::default(),
            session.id,
            "my answer".to_string(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.reply, NO_TEXT_PLACEHOLDER);
        assert_eq!(outcome.questions_asked, 1);
    }

    #[tokio::test]
    async fn test_empty_message_rejected_before_any_mutation() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 10);
        let gateway = StubGateway::new(vec![]);

        let err = message_turn(
            &store,
            &gateway,
            &ChatOptions::default(),
            session.id,
            "   ".to_string(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let snapshot = store.get(session.id).await.unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (store, _) = fixtures();
        let gateway = StubGateway::new(vec![]);
        let err = start_turn(&store, &gateway, &ChatOptions::default(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_apply_settings_swaps_prompt_without_quota() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 10);

        let updated = apply_settings(
            &store,
            &presets,
            session.id,
            Some(json!(3)),
            Some(json!(3)),
            Some(json!(3)),
        )
        .await
        .unwrap();

        assert_eq!(updated.system_prompt, presets.lookup(3, 3, 3).unwrap());
        assert_eq!(updated.messages[0].content, updated.system_prompt);
        assert_eq!(updated.questions_asked(), 0);
    }

    #[tokio::test]
    async fn test_attach_assets_requires_at_least_one_field() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 10);
        let err = attach_assets(&store, session.id, AssetUpdate::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_attach_assets_invalid_after_quota_exhausted() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 1);
        let gateway = StubGateway::replying(&["Only question."]);
        start_turn(&store, &gateway, &ChatOptions::default(), session.id)
            .await
            .unwrap();

        let err = attach_assets(
            &store,
            session.id,
            AssetUpdate {
                cv: Some("late cv".to_string()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::QuotaExhausted { .. }));
    }

    #[tokio::test]
    async fn test_attach_assets_consumes_no_quota() {
        let (store, presets) = fixtures();
        let session = new_session(&store, &presets, 10);
        let updated = attach_assets(
            &store,
            session.id,
            AssetUpdate {
                cv: Some("Experienced engineer.".to_string()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
        assert_eq!(updated.questions_asked(), 0);
        assert!(updated.system_prompt.contains("Candidate CV"));
    }
}
