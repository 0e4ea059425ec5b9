//! Session Store — in-memory registry of interview conversations.
//!
//! The store is an explicit object constructed at startup and carried in
//! `AppState`; handlers never reach for a global. Each session sits behind its
//! own `tokio::sync::Mutex` so a turn (append user message → model call →
//! append reply → bump counter) holds one session exclusively without
//! serializing unrelated sessions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;

/// Question cap applied when neither the client nor the metadata supplies one.
pub const DEFAULT_MAX_QUESTIONS: u64 = 10;

const QUESTIONS_ASKED_KEY: &str = "questions_asked";
const MAX_QUESTIONS_KEY: &str = "max_questions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a session's history. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Free-text context merged into the system prompt. Each field is
/// independently settable; `None` means "never provided".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_info: Option<String>,
}

/// Full state of one interview conversation.
///
/// Invariant: `messages[0]` always has role `system` and its content always
/// equals `system_prompt`. Every mutation path below preserves this.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub metadata: Map<String, Value>,
    pub assets: Assets,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new(system_prompt: String, metadata: Map<String, Value>) -> Self {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            messages: vec![Message {
                role: Role::System,
                content: system_prompt.clone(),
            }],
            system_prompt,
            metadata,
            assets: Assets::default(),
            created_at: now,
            last_active: now,
        }
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Message {
        let msg = Message {
            role,
            content: content.into(),
        };
        self.messages.push(msg.clone());
        self.last_active = Utc::now();
        msg
    }

    /// Overwrites the system prompt and the seeded first message together so
    /// the history never disagrees with the prompt.
    pub fn set_system_prompt(&mut self, text: impl Into<String>) {
        self.system_prompt = text.into();
        self.messages[0] = Message {
            role: Role::System,
            content: self.system_prompt.clone(),
        };
        self.last_active = Utc::now();
    }

    pub fn questions_asked(&self) -> u64 {
        self.metadata
            .get(QUESTIONS_ASKED_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn max_questions(&self) -> u64 {
        self.metadata
            .get(MAX_QUESTIONS_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_QUESTIONS)
    }

    pub fn quota_remaining(&self) -> bool {
        self.questions_asked() < self.max_questions()
    }

    /// Records one produced assistant question. The counter only ever grows.
    pub fn record_question(&mut self) {
        let next = self.questions_asked() + 1;
        self.metadata
            .insert(QUESTIONS_ASKED_KEY.to_string(), Value::from(next));
    }

    /// Rejects the turn if the session has already produced its question quota.
    pub fn check_quota(&self) -> Result<(), AppError> {
        if self.quota_remaining() {
            Ok(())
        } else {
            Err(AppError::QuotaExhausted {
                asked: self.questions_asked(),
                max: self.max_questions(),
            })
        }
    }
}

/// Builds the initial metadata bag for a new session: caller-supplied entries
/// plus the two recognized counters.
pub fn seed_metadata(extra: Option<Map<String, Value>>, max_questions: u64) -> Map<String, Value> {
    let mut metadata = extra.unwrap_or_default();
    metadata.insert(QUESTIONS_ASKED_KEY.to_string(), Value::from(0u64));
    metadata
        .entry(MAX_QUESTIONS_KEY.to_string())
        .or_insert_with(|| Value::from(max_questions));
    metadata
}

type SessionSlot = Arc<Mutex<Session>>;

/// Process-wide session registry. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, SessionSlot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new session seeded with a single system message.
    /// Pure allocation; never fails.
    pub fn create(&self, system_prompt: String, metadata: Map<String, Value>) -> Session {
        let session = Session::new(system_prompt, metadata);
        let snapshot = session.clone();
        self.inner
            .write()
            .expect("session store lock poisoned")
            .insert(session.id, Arc::new(Mutex::new(session)));
        snapshot
    }

    /// Resolves a session slot for turn-scoped locking. Absence is a value,
    /// not an error; the caller decides what "not found" means.
    pub fn entry(&self, id: Uuid) -> Option<SessionSlot> {
        self.inner
            .read()
            .expect("session store lock poisoned")
            .get(&id)
            .cloned()
    }

    /// Returns a point-in-time snapshot of a session.
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        let slot = self.entry(id)?;
        let session = slot.lock().await;
        Some(session.clone())
    }

    pub async fn append(
        &self,
        id: Uuid,
        role: Role,
        content: impl Into<String>,
    ) -> Result<Message, AppError> {
        let slot = self
            .entry(id)
            .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))?;
        let mut session = slot.lock().await;
        Ok(session.append(role, content))
    }

    /// Directly overwrites the system prompt, bypassing asset-merge logic.
    /// Used when applying a precomputed style preset.
    pub async fn set_system_prompt(&self, id: Uuid, text: String) -> Result<(), AppError> {
        let slot = self
            .entry(id)
            .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))?;
        let mut session = slot.lock().await;
        session.set_system_prompt(text);
        Ok(())
    }

    /// Evicts sessions idle longer than `ttl`. Sessions with a turn in flight
    /// (slot currently locked) are skipped and revisited on the next sweep.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let slots: Vec<(Uuid, SessionSlot)> = {
            let map = self.inner.read().expect("session store lock poisoned");
            map.iter().map(|(id, s)| (*id, s.clone())).collect()
        };

        let mut expired = Vec::new();
        for (id, slot) in slots {
            if let Ok(session) = slot.try_lock() {
                if session.last_active < cutoff {
                    expired.push(id);
                }
            }
        }

        let mut map = self.inner.write().expect("session store lock poisoned");
        for id in &expired {
            map.remove(id);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("session store lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
