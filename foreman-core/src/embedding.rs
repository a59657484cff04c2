//! Embedding vectors for experience similarity lookup.
//!
//! The embedding model itself is an external collaborator; this type only
//! carries its output and computes cosine similarity for reuse matching.

use crate::{ForemanError, ForemanResult, ValidationError};
use serde::{Deserialize, Serialize};

/// Embedding vector with dynamic dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    /// The embedding data.
    pub data: Vec<f32>,
    /// Identifier of the model that produced this embedding.
    pub model_id: String,
}

impl EmbeddingVector {
    /// Create a new embedding vector.
    pub fn new(data: Vec<f32>, model_id: String) -> Self {
        Self { data, model_id }
    }

    /// Number of dimensions.
    pub fn dimensions(&self) -> usize {
        self.data.len()
    }

    /// Compute cosine similarity between two embedding vectors.
    ///
    /// # Errors
    ///
    /// Returns a validation error when dimensions differ.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> ForemanResult<f32> {
        if self.dimensions() != other.dimensions() {
            return Err(ForemanError::Validation(ValidationError::InvalidValue {
                field: "task_embedding".to_string(),
                reason: format!(
                    "dimension mismatch: {} vs {}",
                    self.dimensions(),
                    other.dimensions()
                ),
            }));
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let norm_a = norm_a.sqrt();
        let norm_b = norm_b.sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / (norm_a * norm_b))
    }
}

// =============================================================================
// TESTS
// =============================================================================
