//! Prompt Composer — builds and mutates the system instructions for a session.
//!
//! Three inputs shape the prompt: a base template, three ordinal style dials
//! (technicality / politeness / difficulty, each 1–3), and up to three
//! free-text assets (CV, job description, company info). Asset embedding is
//! delimiter-fenced so re-attachment never duplicates sections.

pub mod presets;

use serde_json::Value;

use crate::sessions::Session;

/// Interview protocol template. The three style notes are substituted by
/// `resolve_style`.
pub const BASE_PROMPT: &str = "You are a software engineering interviewer running a practice session. \
You are interacting with the job candidate via voice, even though you might perceive the conversation through text. \
Use any candidate CV, job description, or company information provided to tailor your questions.\n\n\
Interview protocol:\n\
- Ask one focused question at a time.\n\
- Allow the candidate to reason aloud; use concise follow-ups when answers are incomplete.\n\
- Avoid repeating previous questions; build on what has already been discussed.\n\
- At the end, deliver structured feedback with three labeled sections:\n\
  1. Strengths — exactly two bullet points.\n\
  2. Areas to improve — exactly two bullet points.\n\
  3. Sample improved answer — one concise model response.\n\n\
Style adjustments:\n\
{technicality_note}\n\
{politeness_note}\n\
{difficulty_note}\n\n\
Keep every message concise, actionable, and no longer than three short paragraphs unless code is explicitly requested.";

/// Fallback template when the client supplies no prompt and no style dials.
/// `{role}` is substituted by `compose`.
pub const DEFAULT_ROLE_TEMPLATE: &str = "You are a helpful {role} for job interview practice. \
Ask clear interview questions, follow up when answers are incomplete, \
and at the end provide concise feedback: strengths, areas to improve, and a sample improved answer. \
Keep responses actionable and friendly.";

pub const DEFAULT_ROLE: &str = "software engineering interviewer";

/// Kickoff instruction for the first turn. Sent alongside the system prompt
/// instead of the (empty) history so the opening reply is exactly one
/// question rather than an evaluation.
pub const START_INSTRUCTION: &str = "Please begin the interview based on the provided materials. \
Ask exactly one opening question and nothing else.";

/// Fixed header prepended whenever assets are merged into the prompt.
const PRIORITY_HEADER: &str = "When framing questions, prioritize the job description; \
treat the candidate CV and company information as supporting context.\n\n";

/// Fence between the base prompt and the embedded asset sections. Stripping
/// everything from this marker onward recovers a clean base prompt.
const ASSETS_DELIMITER: &str = "\n\n=== Candidate materials ===\n";

/// Per-asset character budget before embedding.
pub const ASSET_MAX_CHARS: usize = 4000;

/// Appended to any asset cut at the budget so the truncation is visible to
/// the model and in session snapshots.
pub const TRUNCATION_MARKER: &str = "\n[truncated]";

fn technicality_note(level: u8) -> &'static str {
    match level {
        1 => "- Technical depth: stay conceptual and high-level; translate jargon into plain language and connect ideas to real-world impact.",
        3 => "- Technical depth: probe advanced topics, expect precise terminology, and request rigorous performance, correctness, and trade-off analysis.",
        _ => "- Technical depth: explore implementation details, data structures, and complexity; invite short code snippets or diagrams when useful.",
    }
}

fn politeness_note(level: u8) -> &'static str {
    match level {
        1 => "- Tone: warm and encouraging; celebrate progress, offer gentle hints, and phrase critiques supportively.",
        3 => "- Tone: firm and direct; expect concise answers, push for specifics, and call out gaps bluntly while remaining professional.",
        _ => "- Tone: balanced and professional; stay clear, respectful, and objective without extra warmth.",
    }
}

fn difficulty_note(level: u8) -> &'static str {
    match level {
        1 => "- Difficulty: focus on foundational, approachable questions that reinforce core concepts and practical understanding.",
        3 => "- Difficulty: deliver challenging, multi-step problems that demand rigorous reasoning, optimization, and edge-case coverage.",
        _ => "- Difficulty: present medium-complexity scenarios covering edge cases, design trade-offs, and applied problem solving.",
    }
}

/// Clamps a dial to [1, 3].
fn clamp_level(level: i64) -> u8 {
    level.clamp(1, 3) as u8
}

/// Coerces a loosely-typed dial value from request JSON. Integers (and
/// numeric strings) are clamped to [1, 3]; anything else defaults to 2.
pub fn dial(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(2),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(2),
        _ => 2,
    }
}

/// Deterministically composes the three style notes into one prompt.
/// Pure: the same triple always yields the same text.
pub fn resolve_style(technicality: i64, politeness: i64, difficulty: i64) -> String {
    BASE_PROMPT
        .replace("{technicality_note}", technicality_note(clamp_level(technicality)))
        .replace("{politeness_note}", politeness_note(clamp_level(politeness)))
        .replace("{difficulty_note}", difficulty_note(clamp_level(difficulty)))
}

/// Substitutes the role placeholder into a base template. A template without
/// the placeholder survives untouched; substitution is never fatal.
pub fn compose(base_template: &str, role: Option<&str>) -> String {
    base_template.replace("{role}", role.unwrap_or(DEFAULT_ROLE))
}

pub fn default_system_prompt(role: Option<&str>) -> String {
    compose(DEFAULT_ROLE_TEMPLATE, role)
}

/// Partial asset update: `Some` overwrites, `None` leaves the stored value.
#[derive(Debug, Default, Clone)]
pub struct AssetUpdate {
    pub cv: Option<String>,
    pub job_description: Option<String>,
    pub company_info: Option<String>,
}

impl AssetUpdate {
    pub fn is_empty(&self) -> bool {
        self.cv.is_none() && self.job_description.is_none() && self.company_info.is_none()
    }
}

/// Recovers a clean base prompt from a previously rebuilt one: drop the
/// embedded asset sections, then the fixed header.
fn clean_base(prompt: &str) -> &str {
    let base = match prompt.find(ASSETS_DELIMITER) {
        Some(idx) => &prompt[..idx],
        None => prompt,
    };
    base.strip_prefix(PRIORITY_HEADER).unwrap_or(base)
}

/// Cuts an asset to `ASSET_MAX_CHARS` characters, marking the cut. An asset
/// exactly at the budget passes through untouched.
fn truncate_asset(text: &str) -> String {
    if text.chars().count() <= ASSET_MAX_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(ASSET_MAX_CHARS).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

/// Merges assets into the session's system prompt and keeps `messages[0]` in
/// step. Provided assets overwrite stored ones; omitted assets persist. The
/// rebuild starts from `base_prompt` when given, otherwise from the stored
/// prompt with any previous asset section stripped, so re-attachment never
/// double-embeds.
pub fn attach_assets(session: &mut Session, update: AssetUpdate, base_prompt: Option<&str>) {
    if let Some(cv) = update.cv {
        session.assets.cv = Some(cv);
    }
    if let Some(jd) = update.job_description {
        session.assets.job_description = Some(jd);
    }
    if let Some(info) = update.company_info {
        session.assets.company_info = Some(info);
    }

    let base = match base_prompt {
        Some(p) => p.to_string(),
        None => clean_base(&session.system_prompt).to_string(),
    };

    let sections: Vec<(&str, &Option<String>)> = vec![
        ("Candidate CV", &session.assets.cv),
        ("Job Description", &session.assets.job_description),
        ("Company Info", &session.assets.company_info),
    ];

    let mut prompt = format!("{PRIORITY_HEADER}{base}");
    if sections.iter().any(|(_, v)| matches!(v, Some(s) if !s.trim().is_empty())) {
        prompt.push_str(ASSETS_DELIMITER);
        for (label, value) in sections {
            if let Some(text) = value {
                if !text.trim().is_empty() {
                    prompt.push_str(&format!("\n{label}:\n{}\n", truncate_asset(text)));
                }
            }
        }
    }

    session.set_system_prompt(prompt);
}
