//! Decision matrix (C5): turns per-thread scores into a single
//! `ThreadResolution`.
//!
//! `spec.md` §4.5. Rules are evaluated in order; the first rule that
//! matches wins. `best` is the context with the highest `overall`
//! score; when `best.overall` is the degenerate value 0.0 (or no
//! scored candidate exists at all), rules 3-5 are skipped and
//! evaluation falls straight through to rule 6.

use chrono::Utc;
use std::collections::HashMap;

use crate::config::ResolverConfig;
use crate::types::{
    ConversationAnalysis, ScoreRow, ThreadAction, ThreadContext, ThreadReason, ThreadResolution,
};

/// Stateless decision matrix.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecisionMatrix;

impl DecisionMatrix {
    /// Decide the action for the current message given its analysis,
    /// the user's existing thread contexts, and their scores.
    pub fn decide(
        &self,
        _message: &str,
        analysis: &ConversationAnalysis,
        contexts: &[ThreadContext],
        scores: &HashMap<String, ScoreRow>,
        config: &ResolverConfig,
    ) -> ThreadResolution {
        // Rule 1: no existing threads at all.
        if contexts.is_empty() {
            return ThreadResolution::new_thread(
                ThreadReason::NewSession,
                1.0,
                "no existing threads for this user",
            );
        }

        // Rule 2: pick the highest-scoring candidate.
        let best = contexts
            .iter()
            .filter_map(|ctx| scores.get(&ctx.thread_id).map(|row| (ctx, row)))
            .max_by(|(_, a), (_, b)| a.overall.partial_cmp(&b.overall).unwrap_or(std::cmp::Ordering::Equal));

        let Some((best_ctx, best_row)) = best else {
            return ThreadResolution::new_thread(
                ThreadReason::NewSession,
                1.0,
                "no scored candidate threads",
            );
        };

        if best_row.overall > 0.0 {
            // Rule 3: strong semantic match on a thread that's still
            // reasonably fresh -> continue it.
            if best_row.semantic_similarity >= config.semantic_similarity_threshold
                && best_row.temporal_continuity > 0.5
            {
                let confidence = (best_row.semantic_similarity + best_row.temporal_continuity).min(1.0);
                return continue_thread(
                    best_ctx,
                    best_row,
                    ThreadReason::SemanticSimilarity,
                    confidence,
                );
            }

            // Rule 4: topic-shift heuristic fired.
            if analysis.topic_shift_score > config.topic_shift_threshold {
                if best_row.temporal_continuity > 0.3 {
                    return branch(
                        best_ctx,
                        best_row,
                        ThreadReason::TopicShift,
                        analysis.topic_shift_score,
                        "topic shift detected with partial continuity to an existing thread",
                    );
                }
                return ThreadResolution::new_thread(
                    ThreadReason::TopicShift,
                    1.0,
                    "topic shift detected with no continuity to an existing thread",
                );
            }

            // Rule 5: explicit conversational boundary (greeting/farewell).
            if analysis.conversation_boundary_score > 0.7 {
                return ThreadResolution::new_thread(
                    ThreadReason::ConversationBoundary,
                    1.0,
                    "message contains an explicit conversational boundary",
                );
            }
        }

        // Rule 6: the best thread has gone cold but still resembles
        // the current message -> reactivate it rather than starting
        // fresh. Inclusive on the low end (`<= 0.2`, not `< 0.2`) so a
        // thread sitting exactly on the 6h/24h continuity boundary
        // still reactivates instead of silently falling through to
        // the default continue rule; see DESIGN.md Open Questions.
        if best_row.temporal_continuity <= 0.2 && best_row.semantic_similarity > 0.4 {
            return reactivate(best_ctx, best_row, best_row.semantic_similarity);
        }

        // Rule 7: default -> continue the best candidate on temporal grounds.
        continue_thread(best_ctx, best_row, ThreadReason::TemporalContinuity, best_row.overall)
    }
}

fn continue_thread(ctx: &ThreadContext, row: &ScoreRow, reason: ThreadReason, confidence: f32) -> ThreadResolution {
    ThreadResolution {
        thread_id: ctx.thread_id.clone(),
        action: ThreadAction::Continue,
        confidence: confidence.clamp(0.0, 1.0),
        primary_reason: reason,
        reasoning: format!("continuing thread {} ({:?})", ctx.thread_id, reason),
        created_at: None,
        parent_thread_id: None,
        semantic_similarity: Some(row.semantic_similarity),
        temporal_gap: Some(Utc::now() - ctx.last_activity),
        context_factors: row.to_json_map(),
    }
}

fn reactivate(ctx: &ThreadContext, row: &ScoreRow, confidence: f32) -> ThreadResolution {
    ThreadResolution {
        thread_id: ctx.thread_id.clone(),
        action: ThreadAction::Reactivate,
        confidence: confidence.clamp(0.0, 1.0),
        primary_reason: ThreadReason::SemanticSimilarity,
        reasoning: format!("reactivating dormant thread {} on continuity match", ctx.thread_id),
        created_at: None,
        parent_thread_id: None,
        semantic_similarity: Some(row.semantic_similarity),
        temporal_gap: Some(Utc::now() - ctx.last_activity),
        context_factors: row.to_json_map(),
    }
}

fn branch(ctx: &ThreadContext, row: &ScoreRow, reason: ThreadReason, confidence: f32, why: &str) -> ThreadResolution {
    ThreadResolution {
        thread_id: uuid::Uuid::new_v4().to_string(),
        action: ThreadAction::Branch,
        confidence: confidence.clamp(0.0, 1.0),
        primary_reason: reason,
        reasoning: format!("branching from thread {}: {}", ctx.thread_id, why),
        created_at: Some(Utc::now()),
        parent_thread_id: Some(ctx.thread_id.clone()),
        semantic_similarity: Some(row.semantic_similarity),
        temporal_gap: Some(Utc::now() - ctx.last_activity),
        context_factors: row.to_json_map(),
    }
}
