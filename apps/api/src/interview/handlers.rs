use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract;
use crate::interview::{self, evaluate, CreateParams, TurnOutcome};
use crate::prompt::AssetUpdate;
use crate::sessions::Session;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionRequest {
    pub role: Option<String>,
    pub system_prompt: Option<String>,
    pub technicality: Option<Value>,
    pub politeness: Option<Value>,
    pub difficulty: Option<Value>,
    pub max_questions: Option<u64>,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub id: Uuid,
    pub system_prompt: String,
    pub max_questions: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssetsRequest {
    pub cv: Option<String>,
    pub job_description: Option<String>,
    pub company_info: Option<String>,
    pub base_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingsRequest {
    pub technicality: Option<Value>,
    pub politeness: Option<Value>,
    pub difficulty: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub cv_text: String,
    pub job_description: Option<String>,
    pub company_info: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub reply: String,
}

/// POST /session
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let session = interview::create_session(
        &state.sessions,
        &state.presets,
        state.config.default_max_questions,
        CreateParams {
            role: req.role,
            system_prompt: req.system_prompt,
            technicality: req.technicality,
            politeness: req.politeness,
            difficulty: req.difficulty,
            max_questions: req.max_questions,
            metadata: req.metadata,
        },
    )?;
    Ok(Json(CreateSessionResponse {
        id: session.id,
        max_questions: session.max_questions(),
        system_prompt: session.system_prompt,
    }))
}

/// GET /session/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, AppError> {
    let session = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))?;
    Ok(Json(session))
}

/// POST /session/:id/assets — JSON body or combined multipart upload.
/// Multipart parts named `cv`, `job_description`, or `company_info` may be
/// plain text or uploaded documents; documents are routed through extraction.
pub async fn handle_attach_assets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Request,
) -> Result<Json<Session>, AppError> {
    let (update, base_prompt) = if is_multipart(&req) {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?;
        read_asset_parts(multipart).await?
    } else {
        let Json(body) = Json::<AssetsRequest>::from_request(req, &())
            .await
            .map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")))?;
        (
            AssetUpdate {
                cv: body.cv,
                job_description: body.job_description,
                company_info: body.company_info,
            },
            body.base_prompt,
        )
    };

    let session = interview::attach_assets(&state.sessions, id, update, base_prompt).await?;
    Ok(Json(session))
}

/// POST /session/:id/settings
pub async fn handle_apply_settings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<Session>, AppError> {
    let session = interview::apply_settings(
        &state.sessions,
        &state.presets,
        id,
        req.technicality,
        req.politeness,
        req.difficulty,
    )
    .await?;
    Ok(Json(session))
}

/// POST /session/:id/start
pub async fn handle_start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TurnOutcome>, AppError> {
    let outcome =
        interview::start_turn(&state.sessions, &*state.gateway, &state.chat_options, id).await?;
    Ok(Json(outcome))
}

/// POST /session/:id/message — JSON `{content}` or multipart with an `audio`
/// part routed through transcription.
pub async fn handle_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Request,
) -> Result<Json<TurnOutcome>, AppError> {
    let content = if is_multipart(&req) {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?;
        let audio = read_audio_part(multipart).await?;
        state.transcriber.transcribe(audio).await?
    } else {
        let Json(body) = Json::<MessageRequest>::from_request(req, &())
            .await
            .map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")))?;
        body.content
    };

    let outcome = interview::message_turn(
        &state.sessions,
        &*state.gateway,
        &state.chat_options,
        id,
        content,
    )
    .await?;
    Ok(Json(outcome))
}

/// POST /evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let reply = evaluate::evaluate_cv(
        &*state.gateway,
        &state.chat_options,
        &req.cv_text,
        req.job_description.as_deref(),
        req.company_info.as_deref(),
    )
    .await?;
    Ok(Json(EvaluateResponse { reply }))
}

/// POST /extract — standalone document-to-text helper for clients that want
/// to preview extraction before attaching.
pub async fn handle_extract(
    State(_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if let Some(filename) = field.file_name().map(str::to_string) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("unreadable upload: {e}")))?;
            let text = extract::extract_text(&filename, &data)?;
            return Ok(Json(json!({ "filename": filename, "text": text })));
        }
    }
    Err(AppError::Validation("no file part provided".to_string()))
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

async fn read_asset_parts(
    mut multipart: Multipart,
) -> Result<(AssetUpdate, Option<String>), AppError> {
    let mut update = AssetUpdate::default();
    let mut base_prompt = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "cv" | "job_description" | "company_info" => {
                let text = if let Some(filename) = field.file_name().map(str::to_string) {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("unreadable upload: {e}")))?;
                    extract::extract_text(&filename, &data)?
                } else {
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(format!("unreadable field: {e}")))?
                };
                match name.as_str() {
                    "cv" => update.cv = Some(text),
                    "job_description" => update.job_description = Some(text),
                    _ => update.company_info = Some(text),
                }
            }
            "base_prompt" => {
                base_prompt = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("unreadable base_prompt field: {e}"))
                })?);
            }
            other => {
                return Err(AppError::Validation(format!(
                    "unexpected multipart field '{other}'"
                )));
            }
        }
    }

    Ok((update, base_prompt))
}

async fn read_audio_part(mut multipart: Multipart) -> Result<bytes::Bytes, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("audio") {
            return field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("unreadable audio upload: {e}")));
        }
    }
    Err(AppError::Validation(
        "no 'audio' part in multipart body".to_string(),
    ))
}
