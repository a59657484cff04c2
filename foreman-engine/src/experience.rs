//! Experience store: reuse of prior run outcomes by task similarity.
//!
//! Pure acceleration. A lookup hit lets a caller skip dispatch for a task
//! it has effectively already run; a miss costs nothing. Run state is
//! never derived from here.

use foreman_core::{EmbeddingVector, ExperienceEntry, ForemanResult};
use tokio::sync::Mutex;

/// In-memory similarity-keyed store of prior run outcomes.
pub struct ExperienceStore {
    entries: Mutex<Vec<ExperienceEntry>>,
    min_similarity: f32,
}

impl ExperienceStore {
    /// Create an empty store with the given similarity floor.
    pub fn new(min_similarity: f32) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            min_similarity,
        }
    }

    /// Record a completed run's outcome.
    pub async fn record(&self, entry: ExperienceEntry) {
        self.entries.lock().await.push(entry);
    }

    /// Number of entries stored.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Find the closest prior outcome at or above the similarity floor.
    ///
    /// A hit bumps the entry's `hit_count` and `last_used_at` before the
    /// entry is returned; no other mutation ever happens to stored entries.
    pub async fn lookup(
        &self,
        embedding: &EmbeddingVector,
    ) -> ForemanResult<Option<ExperienceEntry>> {
        let mut entries = self.entries.lock().await;

        let mut best: Option<(usize, f32)> = None;
        for (i, entry) in entries.iter().enumerate() {
            let similarity = embedding.cosine_similarity(&entry.task_embedding)?;
            if similarity >= self.min_similarity
                && best.is_none_or(|(_, score)| similarity > score)
            {
                best = Some((i, similarity));
            }
        }

        Ok(best.map(|(i, similarity)| {
            let entry = &mut entries[i];
            entry.record_hit();
            tracing::debug!(
                run_id = %entry.run_id,
                similarity,
                hit_count = entry.hit_count,
                "experience hit"
            );
            entry.clone()
        }))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use foreman_core::{new_entity_id, TaskStatus};

    fn entry(description: &str, vector: Vec<f32>) -> ExperienceEntry {
        ExperienceEntry {
            task_description: description.to_string(),
            task_embedding: EmbeddingVector::new(vector, "mock".to_string()),
            result_output: "done".to_string(),
            result_cost: 0.02,
            result_status: TaskStatus::Completed,
            run_id: new_entity_id(),
            confidence: 0.9,
            hit_count: 0,
            last_used_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_lookup_finds_closest_match() {
        let store = ExperienceStore::new(0.8);
        store.record(entry("add CI cache", vec![1.0, 0.0, 0.0])).await;
        store.record(entry("fix flaky test", vec![0.0, 1.0, 0.0])).await;

        let query = EmbeddingVector::new(vec![0.1, 0.99, 0.0], "mock".to_string());
        let hit = store.lookup(&query).await.unwrap().unwrap();
        assert_eq!(hit.task_description, "fix flaky test");
        assert_eq!(hit.hit_count, 1);
    }

    #[tokio::test]
    async fn test_lookup_below_floor_misses() {
        let store = ExperienceStore::new(0.9);
        store.record(entry("add CI cache", vec![1.0, 0.0])).await;

        let query = EmbeddingVector::new(vec![0.0, 1.0], "mock".to_string());
        assert!(store.lookup(&query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hits_accumulate() {
        let store = ExperienceStore::new(0.5);
        store.record(entry("add CI cache", vec![1.0, 0.0])).await;

        let query = EmbeddingVector::new(vec![1.0, 0.0], "mock".to_string());
        store.lookup(&query).await.unwrap().unwrap();
        let second = store.lookup(&query).await.unwrap().unwrap();
        assert_eq!(second.hit_count, 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_propagates() {
        let store = ExperienceStore::new(0.5);
        store.record(entry("add CI cache", vec![1.0, 0.0, 0.0])).await;

        let query = EmbeddingVector::new(vec![1.0, 0.0], "mock".to_string());
        assert!(store.lookup(&query).await.is_err());
    }
}
