//! Vector similarity helpers.
//!
//! Inlined per `spec.md` §9: dimension is small (≤1024) so no external
//! tensor runtime is needed in the core.

use crate::types::Embedding;

/// Cosine similarity between two vectors, clamped to `[0.0, 1.0]`.
///
/// Returns `0.0` when the vectors differ in length or either has zero
/// norm (a zero vector is the sentinel for "no embedding available",
/// `spec.md` §9) rather than producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Raw (unclamped) cosine similarity in `[-1.0, 1.0]`, used where
/// callers need the sign (none of the core scoring paths do, but it's
/// kept alongside the clamped variant for observability/debugging).
pub fn cosine_similarity_signed(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// True when a vector is the all-zero sentinel (no embedding available).
pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Mean of a set of vectors. Returns `None` if `vectors` is empty; all
/// vectors are assumed to share the same dimension (callers filter
/// mismatches before calling).
pub fn mean_vector(vectors: &[Embedding]) -> Option<Embedding> {
    let first = vectors.first()?;
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;

    for v in vectors {
        if v.len() != dim {
            continue;
        }
        for (s, x) in sum.iter_mut().zip(v.iter()) {
            *s += x;
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }

    for s in sum.iter_mut() {
        *s /= count as f32;
    }
    Some(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_nonzero_vectors_are_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_are_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_similarity(&a, &b)).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_yields_zero_similarity() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&b, &a), 0.0);
    }

    #[test]
    fn mismatched_dimensions_yield_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn is_symmetric() {
        let a = vec![1.0, 0.5, -0.2];
        let b = vec![0.3, 0.9, 0.1];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn negative_similarity_clamps_to_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn mean_of_one_vector_is_itself() {
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(mean_vector(&[v.clone()]), Some(v));
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean_vector(&[]), None);
    }

    #[test]
    fn mean_averages_componentwise() {
        let a = vec![1.0, 1.0];
        let b = vec![3.0, 5.0];
        let mean = mean_vector(&[a, b]).unwrap();
        assert!((mean[0] - 2.0).abs() < 1e-6);
        assert!((mean[1] - 3.0).abs() < 1e-6);
    }
}
