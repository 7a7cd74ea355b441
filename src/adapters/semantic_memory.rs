//! Semantic-memory adapter (reserved).
//!
//! `spec.md` §4.1: "Reserved; resolver must function with an empty
//! result." No implementation currently queries a real semantic
//! memory service; `NullSemanticMemoryAdapter` is the only adapter
//! wired up by default and is always a valid, empty response.

use async_trait::async_trait;

use super::SemanticMemoryAdapter;
use crate::types::Segment;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSemanticMemoryAdapter;

#[async_trait]
impl SemanticMemoryAdapter for NullSemanticMemoryAdapter {
    async fn query_nearby(&self, _user_id: &str, _embedding: &[f32], _k: usize) -> Vec<Segment> {
        Vec::new()
    }
}
