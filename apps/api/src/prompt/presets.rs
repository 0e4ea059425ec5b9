//! Style preset store — an explicit read-through cache over `resolve_style`.
//!
//! All 27 dial combinations are materialized eagerly at startup; lookups are
//! pure map reads after that. Carried in `AppState` as `Arc<PresetStore>`.

use std::collections::HashMap;

use super::resolve_style;

/// Maps a clamped (technicality, politeness, difficulty) triple to its
/// resolved prompt text.
pub struct PresetStore {
    table: HashMap<(u8, u8, u8), String>,
}

impl PresetStore {
    pub fn new() -> Self {
        let mut table = HashMap::with_capacity(27);
        for t in 1..=3u8 {
            for p in 1..=3u8 {
                for d in 1..=3u8 {
                    table.insert((t, p, d), resolve_style(t as i64, p as i64, d as i64));
                }
            }
        }
        PresetStore { table }
    }

    /// Resolves a preset for the given dials, clamping each to [1, 3].
    /// `None` means the triple has no mapping; callers surface that as an
    /// invalid-input condition.
    pub fn lookup(&self, technicality: i64, politeness: i64, difficulty: i64) -> Option<&str> {
        let key = (
            technicality.clamp(1, 3) as u8,
            politeness.clamp(1, 3) as u8,
            difficulty.clamp(1, 3) as u8,
        );
        self.table.get(&key).map(String::as_str)
    }

    /// The balanced (2, 2, 2) preset.
    pub fn default_prompt(&self) -> &str {
        self.lookup(2, 2, 2)
            .expect("preset table must contain the (2,2,2) default")
    }
}

impl Default for PresetStore {
    fn default() -> Self {
        Self::new()
    }
}
