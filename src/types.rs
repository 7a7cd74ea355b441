//! Core data model for the conversation thread resolver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Stable identifier for a conversational thread.
pub type ThreadId = String;

/// Dense embedding vector. Dimension is fixed per deployment
/// (`ResolverConfig::embedding_dimension`, nominal 768).
pub type Embedding = Vec<f32>;

/// Entities grouped by type (`PERSON`, `ORG`, `GPE`, ...), each an
/// ordered, deduplicated list of surface forms.
pub type EntityMap = HashMap<String, Vec<String>>;

/// Thread resolution actions.
///
/// `Merge` is part of the contract but this resolver never produces
/// it; see `spec.md` §9 Open Questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadAction {
    Continue,
    Create,
    Branch,
    Reactivate,
    Merge,
}

/// Reasons for a thread decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadReason {
    TemporalContinuity,
    SemanticSimilarity,
    TopicShift,
    UserIntentChange,
    ConversationBoundary,
    ContextOverflow,
    NewSession,
    Fallback,
}

/// Result of a single `resolve` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadResolution {
    pub thread_id: ThreadId,
    pub action: ThreadAction,
    pub confidence: f32,
    pub primary_reason: ThreadReason,
    pub reasoning: String,
    pub created_at: Option<DateTime<Utc>>,
    pub parent_thread_id: Option<ThreadId>,
    pub semantic_similarity: Option<f32>,
    pub temporal_gap: Option<chrono::Duration>,
    pub context_factors: HashMap<String, serde_json::Value>,
}

impl ThreadResolution {
    /// Create a brand-new thread resolution (`CREATE`).
    pub fn new_thread(reason: ThreadReason, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            thread_id: Uuid::new_v4().to_string(),
            action: ThreadAction::Create,
            confidence: confidence.clamp(0.0, 1.0),
            primary_reason: reason,
            reasoning: reasoning.into(),
            created_at: Some(Utc::now()),
            parent_thread_id: None,
            semantic_similarity: None,
            temporal_gap: None,
            context_factors: HashMap::new(),
        }
    }
}

/// Role of a message within a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    UserInput,
    AiResponse,
    Other,
}

/// A single message returned by the working-memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub thread_id: Option<ThreadId>,
    pub user_id: String,
    pub message_type: MessageType,
    pub message_content: String,
    pub timestamp: DateTime<Utc>,
}

/// A message as retained inside a `ThreadContext::recent_messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub role: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Derived status of a thread, computed from its last activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    Dormant,
}

/// Per-thread, per-request context assembled from recent history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadContext {
    pub thread_id: ThreadId,
    pub user_id: String,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
    pub status: ThreadStatus,
    pub topic_embedding: Option<Embedding>,
    pub recent_messages: Vec<ThreadMessage>,
    pub entities: EntityMap,
    pub intent_history: Vec<String>,
    pub conversation_type: String,
    pub user_engagement_score: f32,
}

/// Analysis of a single incoming message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationAnalysis {
    pub message_embedding: Embedding,
    pub detected_intent: String,
    pub topic_shift_score: f32,
    pub conversation_boundary_score: f32,
    pub urgency_score: f32,
    pub context_dependency_score: f32,
    pub entities: EntityMap,
}

impl ConversationAnalysis {
    /// Minimal, never-fails analysis used when the analyzer pipeline
    /// cannot complete within its deadline (`spec.md` §3 invariant 6).
    pub fn neutral(embedding_dimension: usize) -> Self {
        Self {
            message_embedding: vec![0.0; embedding_dimension],
            detected_intent: "general".to_string(),
            topic_shift_score: 0.0,
            conversation_boundary_score: 0.0,
            urgency_score: 0.5,
            context_dependency_score: 0.0,
            entities: HashMap::new(),
        }
    }
}

/// The six per-thread factor scores plus their weighted aggregate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreRow {
    pub semantic_similarity: f32,
    pub temporal_continuity: f32,
    pub intent_alignment: f32,
    pub entity_overlap: f32,
    pub conversation_flow: f32,
    pub user_pattern_match: f32,
    pub overall: f32,
}

impl ScoreRow {
    pub fn to_json_map(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("semantic_similarity".into(), json_f32(self.semantic_similarity));
        map.insert("temporal_continuity".into(), json_f32(self.temporal_continuity));
        map.insert("intent_alignment".into(), json_f32(self.intent_alignment));
        map.insert("entity_overlap".into(), json_f32(self.entity_overlap));
        map.insert("conversation_flow".into(), json_f32(self.conversation_flow));
        map.insert("user_pattern_match".into(), json_f32(self.user_pattern_match));
        map.insert("overall".into(), json_f32(self.overall));
        map
    }
}

fn json_f32(v: f32) -> serde_json::Value {
    serde_json::Number::from_f64(v as f64)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Reserved result type for the semantic-memory adapter. The resolver
/// must function with an empty result set (`spec.md` §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub content: String,
    pub embedding: Embedding,
    pub score: f32,
}
