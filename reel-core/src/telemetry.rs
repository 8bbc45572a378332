//! Lifetime manifestation telemetry.
//!
//! Tracks, per story element, how often generated output actually contained
//! the element. The table outlives any single pipeline run and feeds the
//! continuity engine's manifestation-risk rule; it is advisory, so readers
//! may observe a value that is stale by one write.

use crate::capability::{CapabilityError, CapabilityResult};
use crate::continuity::SceneState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Success rate assumed for an element that has never been attempted.
pub const UNSEEN_RATE: f64 = 0.8;

/// Lifetime appearance telemetry for one story element.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ManifestationScore {
    pub attempts: u32,
    pub successes: u32,
}

impl ManifestationScore {
    /// Success rate in [0, 1]. Unseen elements get the benefit of the doubt.
    pub fn rate(&self) -> f64 {
        if self.attempts == 0 {
            return UNSEEN_RATE;
        }
        self.successes as f64 / self.attempts as f64
    }

    /// Record one generation attempt.
    pub fn record(&mut self, appeared: bool) {
        self.attempts += 1;
        if appeared {
            self.successes += 1;
        }
    }
}

/// Advisory continuity snapshot saved at the end of a validation run. Never
/// consulted by rule evaluation; the first segment of any run starts clean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuityState {
    pub project_id: String,
    pub last_scene: Option<SceneState>,
    pub updated_at: DateTime<Utc>,
}

impl ContinuityState {
    pub fn new(project_id: impl Into<String>, last_scene: Option<SceneState>) -> Self {
        Self {
            project_id: project_id.into(),
            last_scene,
            updated_at: Utc::now(),
        }
    }
}

/// Pluggable storage for manifestation telemetry and advisory continuity
/// state. The only resource whose lifetime crosses pipeline runs.
///
/// Implementations must serialize concurrent read-modify-write per element
/// key; a whole-table writer lock satisfies that.
#[async_trait]
pub trait ManifestationStore: Send + Sync {
    /// Load the advisory continuity state for a project, if any.
    async fn load_state(&self, project_id: &str) -> CapabilityResult<Option<ContinuityState>>;

    /// Persist the advisory continuity state under its project id.
    async fn save_state(&self, state: &ContinuityState) -> CapabilityResult<()>;

    /// Record one generation attempt for an element. Keys are lowercased.
    async fn save_telemetry(&self, element: &str, appeared: bool) -> CapabilityResult<()>;

    /// Snapshot of every lifetime score, keyed by lowercase element name.
    async fn load_manifestation_scores(
        &self,
    ) -> CapabilityResult<HashMap<String, ManifestationScore>>;

    /// Drop all stored state and telemetry.
    async fn clear(&self) -> CapabilityResult<()>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// HashMap-backed [`ManifestationStore`]. All data is lost on drop.
#[derive(Debug, Clone, Default)]
pub struct InMemoryManifestationStore {
    scores: Arc<RwLock<HashMap<String, ManifestationScore>>>,
    states: Arc<RwLock<HashMap<String, ContinuityState>>>,
}

impl InMemoryManifestationStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a score directly (for tests).
    pub async fn seed_score(&self, element: &str, attempts: u32, successes: u32) {
        self.scores.write().await.insert(
            element.to_lowercase(),
            ManifestationScore {
                attempts,
                successes,
            },
        );
    }

    /// Number of tracked elements (for tests).
    pub async fn len(&self) -> usize {
        self.scores.read().await.len()
    }

    /// Whether the store tracks no elements (for tests).
    pub async fn is_empty(&self) -> bool {
        self.scores.read().await.is_empty()
    }
}

#[async_trait]
impl ManifestationStore for InMemoryManifestationStore {
    async fn load_state(&self, project_id: &str) -> CapabilityResult<Option<ContinuityState>> {
        Ok(self.states.read().await.get(project_id).cloned())
    }

    async fn save_state(&self, state: &ContinuityState) -> CapabilityResult<()> {
        if state.project_id.is_empty() {
            return Err(CapabilityError::RequestFailed(
                "continuity state requires a project id".to_string(),
            ));
        }
        self.states
            .write()
            .await
            .insert(state.project_id.clone(), state.clone());
        Ok(())
    }

    async fn save_telemetry(&self, element: &str, appeared: bool) -> CapabilityResult<()> {
        let mut scores = self.scores.write().await;
        scores
            .entry(element.to_lowercase())
            .or_default()
            .record(appeared);
        Ok(())
    }

    async fn load_manifestation_scores(
        &self,
    ) -> CapabilityResult<HashMap<String, ManifestationScore>> {
        Ok(self.scores.read().await.clone())
    }

    async fn clear(&self) -> CapabilityResult<()> {
        self.scores.write().await.clear();
        self.states.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_rate_is_point_eight() {
        let score = ManifestationScore::default();
        assert_eq!(score.rate(), 0.8);
    }

    #[test]
    fn test_all_successes_rate_is_one() {
        let mut score = ManifestationScore::default();
        for _ in 0..5 {
            score.record(true);
        }
        assert_eq!(score.rate(), 1.0);
    }

    #[test]
    fn test_all_failures_rate_is_zero() {
        let mut score = ManifestationScore::default();
        for _ in 0..3 {
            score.record(false);
        }
        assert_eq!(score.rate(), 0.0);
        assert_eq!(score.attempts, 3);
    }

    #[tokio::test]
    async fn test_telemetry_keys_are_lowercased() {
        let store = InMemoryManifestationStore::new();
        store.save_telemetry("Sword", true).await.unwrap();
        store.save_telemetry("SWORD", false).await.unwrap();

        let scores = store.load_manifestation_scores().await.unwrap();
        assert_eq!(scores.len(), 1);
        let sword = &scores["sword"];
        assert_eq!(sword.attempts, 2);
        assert_eq!(sword.successes, 1);
    }

    #[tokio::test]
    async fn test_state_round_trip() {
        let store = InMemoryManifestationStore::new();
        assert!(store.load_state("p1").await.unwrap().is_none());

        let state = ContinuityState::new("p1", None);
        store.save_state(&state).await.unwrap();
        let loaded = store.load_state("p1").await.unwrap().unwrap();
        assert_eq!(loaded.project_id, "p1");

        store.clear().await.unwrap();
        assert!(store.load_state("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_score_wire_format() {
        let store = InMemoryManifestationStore::new();
        store.seed_score("sword", 3, 0).await;

        let scores = store.load_manifestation_scores().await.unwrap();
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"sword":{"attempts":3,"successes":0}}"#);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_writes_to_disjoint_keys() {
        let store = InMemoryManifestationStore::new();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("element-{}", i);
                for _ in 0..50 {
                    store.save_telemetry(&key, true).await.unwrap();
                }
            }));
        }
        futures::future::join_all(handles).await;

        let scores = store.load_manifestation_scores().await.unwrap();
        assert_eq!(scores.len(), 8);
        for i in 0..8 {
            let score = &scores[&format!("element-{}", i)];
            assert_eq!(score.attempts, 50);
            assert_eq!(score.successes, 50);
        }
    }
}
