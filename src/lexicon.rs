//! Heuristic lexicons for boundary, topic-shift, and context-dependency
//! detection (`spec.md` §6 "Heuristic lexicons").
//!
//! These are deliberately simple, deterministic phrase/token lookups:
//! they provide a lower bound on signal quality when the intent/NER
//! models are cold or unavailable (`spec.md` §4.2).

const GREETINGS: &[&str] = &["hi", "hello", "hey", "good morning", "good afternoon"];
const FAREWELLS: &[&str] = &["bye", "goodbye", "see you", "thanks", "thank you"];
const TOPIC_SHIFTERS: &[&str] = &[
    "by the way",
    "speaking of",
    "anyway",
    "also",
    "another thing",
    "changing topics",
    "different subject",
    "new topic",
];
const CONTEXT_PRONOUNS: &[&str] = &["it", "that", "this", "they", "them", "what", "which", "where"];

/// Boundary score: 0.8 if the message contains a greeting phrase, 0.9
/// if it contains a farewell, else 0.0. Greeting takes precedence over
/// farewell when a message (unusually) contains both, matching the
/// `elif` ordering in the original heuristic.
pub fn conversation_boundary_score(message: &str) -> f32 {
    let lower = message.to_lowercase();
    if GREETINGS.iter().any(|p| lower.contains(p)) {
        0.8
    } else if FAREWELLS.iter().any(|p| lower.contains(p)) {
        0.9
    } else {
        0.0
    }
}

/// Topic-shift score: 0.8 if any topic-shift indicator phrase is
/// present (case-insensitive substring match), else 0.0.
pub fn topic_shift_score(message: &str) -> f32 {
    let lower = message.to_lowercase();
    if TOPIC_SHIFTERS.iter().any(|p| lower.contains(p)) {
        0.8
    } else {
        0.0
    }
}

/// Context-dependency score: count of context-pronoun tokens, divided
/// by 5, clamped to `[0, 1]`.
pub fn context_dependency_score(message: &str) -> f32 {
    let lower = message.to_lowercase();
    let count = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| CONTEXT_PRONOUNS.contains(token))
        .count();
    (count as f32 / 5.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_scores_point_eight() {
        assert_eq!(conversation_boundary_score("Hi!"), 0.8);
        assert_eq!(conversation_boundary_score("Good morning, team"), 0.8);
    }

    #[test]
    fn farewell_scores_point_nine() {
        assert_eq!(conversation_boundary_score("Thanks, bye!"), 0.9);
        assert_eq!(conversation_boundary_score("See you tomorrow"), 0.9);
    }

    #[test]
    fn neutral_message_scores_zero() {
        assert_eq!(conversation_boundary_score("Can you help me with the ML model?"), 0.0);
    }

    #[test]
    fn topic_shifter_phrase_detected() {
        assert_eq!(topic_shift_score("By the way, what's the weather today?"), 0.8);
        assert_eq!(topic_shift_score("anyway let's move on"), 0.8);
    }

    #[test]
    fn no_topic_shifter_scores_zero() {
        assert_eq!(topic_shift_score("Can you help me with the ML model?"), 0.0);
    }

    #[test]
    fn context_dependency_counts_pronouns() {
        // "it", "that" -> 2 matches / 5 = 0.4
        assert!((context_dependency_score("Is it that bad?") - 0.4).abs() < 1e-6);
    }

    #[test]
    fn context_dependency_clamps_at_one() {
        let many = "it that this they them what which where it that";
        assert_eq!(context_dependency_score(many), 1.0);
    }

    #[test]
    fn empty_message_has_zero_scores() {
        assert_eq!(conversation_boundary_score(""), 0.0);
        assert_eq!(topic_shift_score(""), 0.0);
        assert_eq!(context_dependency_score(""), 0.0);
    }
}
