//! Cache-hit versus retranslate.
//!
//! Only the lecture key and the `force` flag decide. The source hash is not
//! consulted: auto-generated captions jitter between fetches of the same
//! lecture and would otherwise invalidate good translations.

use serde::{Deserialize, Serialize};

use super::entry::CacheEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheAction {
    UseCache,
    Retranslate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Force,
    CacheMiss,
    CacheValid,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::CacheMiss => "cache_miss",
            Self::CacheValid => "cache_valid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDecision {
    pub decision: CacheAction,
    pub reason: DecisionReason,
    /// An entry existed, even when `force` overrode it
    pub cache_hit: bool,
    pub cached_entry: Option<CacheEntry>,
}

impl CacheDecision {
    pub fn use_cache(&self) -> bool {
        self.decision == CacheAction::UseCache
    }
}

pub fn decide(cached: Option<CacheEntry>, force: bool) -> CacheDecision {
    let cache_hit = cached.is_some();
    let (decision, reason) = match (&cached, force) {
        (_, true) => (CacheAction::Retranslate, DecisionReason::Force),
        (None, false) => (CacheAction::Retranslate, DecisionReason::CacheMiss),
        (Some(_), false) => (CacheAction::UseCache, DecisionReason::CacheValid),
    };
    CacheDecision {
        decision,
        reason,
        cache_hit,
        cached_entry: cached,
    }
}
