//! Scorer (C4): per-thread multi-factor scoring.
//!
//! `spec.md` §4.4. Scoring a single thread must never raise; any
//! internal failure is absorbed into an all-zero row, logged at WARN
//! keyed by `thread_id`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::similarity::cosine_similarity;
use crate::types::{ConversationAnalysis, ScoreRow, ThreadContext, ThreadId};

/// Aggregate weights; must sum to 1.0 (`spec.md` §4.4).
pub const WEIGHT_SEMANTIC: f32 = 0.30;
pub const WEIGHT_TEMPORAL: f32 = 0.25;
pub const WEIGHT_INTENT: f32 = 0.20;
pub const WEIGHT_ENTITY: f32 = 0.10;
pub const WEIGHT_FLOW: f32 = 0.10;
pub const WEIGHT_PATTERN: f32 = 0.05;

/// Stateless scorer: every method is a pure function of its inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Scorer;

impl Scorer {
    /// Score every thread context against the current analysis.
    pub fn score(&self, analysis: &ConversationAnalysis, contexts: &[ThreadContext]) -> HashMap<ThreadId, ScoreRow> {
        let now = Utc::now();
        contexts
            .iter()
            .map(|ctx| (ctx.thread_id.clone(), self.score_thread(analysis, ctx, now)))
            .collect()
    }

    /// Score a single thread. Every sub-score below is a total function
    /// of its inputs (no division by a quantity that can be zero goes
    /// unchecked), so scoring one thread can never take the whole
    /// request down with it.
    pub fn score_thread(&self, analysis: &ConversationAnalysis, ctx: &ThreadContext, now: DateTime<Utc>) -> ScoreRow {
        let semantic_similarity = match &ctx.topic_embedding {
            Some(topic_embedding) => cosine_similarity(&analysis.message_embedding, topic_embedding),
            None => 0.0,
        };

        let time_gap = now - ctx.last_activity;
        let temporal_continuity = temporal_score(time_gap);

        let intent_alignment = intent_alignment_score(&analysis.detected_intent, &ctx.intent_history);

        let entity_overlap = entity_overlap_score(&analysis.entities, &ctx.entities);

        let conversation_flow = 0.5; // reserved, spec.md §4.4/§9
        let user_pattern_match = ctx.user_engagement_score;

        let overall = WEIGHT_SEMANTIC * semantic_similarity
            + WEIGHT_TEMPORAL * temporal_continuity
            + WEIGHT_INTENT * intent_alignment
            + WEIGHT_ENTITY * entity_overlap
            + WEIGHT_FLOW * conversation_flow
            + WEIGHT_PATTERN * user_pattern_match;

        ScoreRow {
            semantic_similarity,
            temporal_continuity,
            intent_alignment,
            entity_overlap,
            conversation_flow,
            user_pattern_match,
            overall,
        }
    }
}

/// Piecewise temporal-continuity function (`spec.md` §4.4): monotonic
/// non-increasing in the time gap.
pub fn temporal_score(gap: chrono::Duration) -> f32 {
    let hours = gap.num_seconds() as f64 / 3600.0;
    if hours <= 0.5 {
        1.0
    } else if hours <= 2.0 {
        0.8
    } else if hours <= 6.0 {
        0.5
    } else if hours <= 24.0 {
        0.2
    } else {
        0.0
    }
}

/// Fraction of the last 5 intents equal to the current intent; 0.5
/// when the history is empty (`spec.md` §4.4).
pub fn intent_alignment_score(current_intent: &str, intent_history: &[String]) -> f32 {
    if intent_history.is_empty() {
        return 0.5;
    }
    let recent: Vec<&String> = intent_history.iter().rev().take(5).collect();
    let matches = recent.iter().filter(|i| i.as_str() == current_intent).count();
    matches as f32 / recent.len() as f32
}

/// Σ|current∩thread| per type / Σ|current| per type; 0 if the
/// denominator is 0 (`spec.md` §4.4).
pub fn entity_overlap_score(
    current: &HashMap<String, Vec<String>>,
    thread: &HashMap<String, Vec<String>>,
) -> f32 {
    if current.is_empty() || thread.is_empty() {
        return 0.0;
    }

    let mut overlap = 0usize;
    let mut total = 0usize;

    for (entity_type, entities) in current {
        total += entities.len();
        if let Some(thread_entities) = thread.get(entity_type) {
            let thread_set: std::collections::HashSet<&String> = thread_entities.iter().collect();
            overlap += entities.iter().filter(|e| thread_set.contains(e)).count();
        }
    }

    if total == 0 {
        0.0
    } else {
        overlap as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThreadStatus;
    use chrono::Duration;
    use std::collections::HashMap;

    fn context(last_activity: DateTime<Utc>, topic_embedding: Option<Vec<f32>>) -> ThreadContext {
        ThreadContext {
            thread_id: "t1".to_string(),
            user_id: "u1".to_string(),
            last_activity,
            message_count: 1,
            status: ThreadStatus::Active,
            topic_embedding,
            recent_messages: Vec::new(),
            entities: HashMap::new(),
            intent_history: Vec::new(),
            conversation_type: "general".to_string(),
            user_engagement_score: 0.5,
        }
    }

    fn analysis(embedding: Vec<f32>) -> ConversationAnalysis {
        ConversationAnalysis {
            message_embedding: embedding,
            detected_intent: "question".to_string(),
            topic_shift_score: 0.0,
            conversation_boundary_score: 0.0,
            urgency_score: 0.5,
            context_dependency_score: 0.0,
            entities: HashMap::new(),
        }
    }

    #[test]
    fn temporal_score_is_monotonic_non_increasing() {
        let gaps = [0, 20, 40, 90, 200, 400, 1000, 2000];
        let mut last = f32::MAX;
        for mins in gaps {
            let score = temporal_score(Duration::minutes(mins));
            assert!(score <= last, "temporal score increased with a larger gap");
            last = score;
        }
    }

    #[test]
    fn temporal_score_matches_spec_breakpoints() {
        assert_eq!(temporal_score(Duration::minutes(10)), 1.0);
        assert_eq!(temporal_score(Duration::minutes(90)), 0.8);
        assert_eq!(temporal_score(Duration::hours(4)), 0.5);
        assert_eq!(temporal_score(Duration::hours(20)), 0.2);
        assert_eq!(temporal_score(Duration::hours(48)), 0.0);
    }

    #[test]
    fn intent_alignment_defaults_to_half_when_empty() {
        assert_eq!(intent_alignment_score("question", &[]), 0.5);
    }

    #[test]
    fn intent_alignment_counts_last_five() {
        let history = vec![
            "question".to_string(),
            "question".to_string(),
            "general".to_string(),
            "general".to_string(),
            "general".to_string(),
            "general".to_string(),
        ];
        // last 5: question, general, general, general, general -> 1/5
        assert!((intent_alignment_score("question", &history) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn entity_overlap_is_zero_with_no_entities() {
        assert_eq!(entity_overlap_score(&HashMap::new(), &HashMap::new()), 0.0);
    }

    #[test]
    fn entity_overlap_computes_fraction() {
        let mut current = HashMap::new();
        current.insert("PERSON".to_string(), vec!["Alice".to_string(), "Bob".to_string()]);
        let mut thread = HashMap::new();
        thread.insert("PERSON".to_string(), vec!["Alice".to_string()]);
        assert!((entity_overlap_score(&current, &thread) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn overall_matches_weighted_sum_within_tolerance() {
        let now = Utc::now();
        let ctx = context(now - Duration::minutes(10), Some(vec![1.0, 0.0, 0.0]));
        let a = analysis(vec![1.0, 0.0, 0.0]);
        let scorer = Scorer;
        let row = scorer.score_thread(&a, &ctx, now);

        let expected = WEIGHT_SEMANTIC * row.semantic_similarity
            + WEIGHT_TEMPORAL * row.temporal_continuity
            + WEIGHT_INTENT * row.intent_alignment
            + WEIGHT_ENTITY * row.entity_overlap
            + WEIGHT_FLOW * row.conversation_flow
            + WEIGHT_PATTERN * row.user_pattern_match;

        assert!((row.overall - expected).abs() < 1e-6);
    }

    #[test]
    fn weights_sum_to_one() {
        let total = WEIGHT_SEMANTIC + WEIGHT_TEMPORAL + WEIGHT_INTENT + WEIGHT_ENTITY + WEIGHT_FLOW + WEIGHT_PATTERN;
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_topic_embedding_yields_zero_semantic_similarity() {
        let now = Utc::now();
        let ctx = context(now, None);
        let a = analysis(vec![1.0, 0.0, 0.0]);
        let scorer = Scorer;
        let row = scorer.score_thread(&a, &ctx, now);
        assert_eq!(row.semantic_similarity, 0.0);
    }
}
