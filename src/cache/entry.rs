use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Provider;

/// Primary key of a cached translation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub course_id: String,
    pub lecture_id: String,
}

impl CacheKey {
    pub fn new(course_id: impl Into<String>, lecture_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            lecture_id: lecture_id.into(),
        }
    }

    /// Stable identifier for stores that need a flat name
    pub fn storage_id(&self) -> String {
        format!("{:x}", md5::compute(format!("{}\u{1f}{}", self.course_id, self.lecture_id)))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.course_id, self.lecture_id)
    }
}

/// A translated lecture as stored in the cache.
///
/// `original_hash` fingerprints the source subtitle for diagnostics only.
/// Lookups go by [`CacheKey`] alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub course_id: String,
    pub lecture_id: String,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub lecture_name: Option<String>,
    pub original_hash: String,
    #[serde(rename = "translatedVTT")]
    pub translated_vtt: String,
    pub provider: Provider,
    pub model: String,
    pub tokens_used: u64,
    pub estimated_cost: f64,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds
    pub last_accessed_at: i64,
}

impl CacheEntry {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.course_id.clone(), self.lecture_id.clone())
    }

    /// Size used for the byte bound: length of the serialized entry
    pub fn size_bytes(&self) -> u64 {
        serde_json::to_string(self).map(|s| s.len() as u64).unwrap_or(0)
    }

    /// LRU order: least recently accessed first, older creation breaks ties
    pub fn lru_order(&self) -> (i64, i64) {
        (self.last_accessed_at, self.created_at)
    }
}

/// md5 fingerprint of the source subtitle text
pub fn content_hash(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}
