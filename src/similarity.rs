//! Cosine similarity over `f32` embedding vectors.

use crate::error::{Error, Result};

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Zero-magnitude vectors short-circuit to `0.0`. Mismatched lengths are a
/// programmer error and return `InvalidArgument`.
///
/// The loop is written over four accumulator lanes so the compiler can
/// auto-vectorize it; the result is numerically the scalar definition.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::InvalidArgument(format!(
            "cosine: vector lengths differ ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Ok(0.0);
    }

    let mut dot = [0.0f32; 4];
    let mut norm_a = [0.0f32; 4];
    let mut norm_b = [0.0f32; 4];

    let chunks = a.len() / 4;
    for i in 0..chunks {
        let base = i * 4;
        for lane in 0..4 {
            let x = a[base + lane];
            let y = b[base + lane];
            dot[lane] += x * y;
            norm_a[lane] += x * x;
            norm_b[lane] += y * y;
        }
    }
    for i in chunks * 4..a.len() {
        dot[0] += a[i] * b[i];
        norm_a[0] += a[i] * a[i];
        norm_b[0] += b[i] * b[i];
    }

    let dot: f32 = dot.iter().sum();
    let norm_a: f32 = norm_a.iter().sum();
    let norm_b: f32 = norm_b.iter().sum();

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors() {
        assert_eq!(cosine(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]).unwrap(), 1.0);
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((cosine(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors() {
        assert_eq!(cosine(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn opposite_vectors() {
        assert_eq!(cosine(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]).unwrap(), -1.0);
    }

    #[test]
    fn forty_five_degrees() {
        let sim = cosine(&[1.0, 1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap();
        assert!((sim - 0.707_106_7).abs() < 1e-4);
    }

    #[test]
    fn zero_magnitude_short_circuits() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
        assert_eq!(cosine(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let err = cosine(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn long_vector_matches_scalar_definition() {
        // Exercise both the 4-lane body and the remainder loop.
        let a: Vec<f32> = (0..103).map(|i| (i as f32 * 0.37).sin()).collect();
        let b: Vec<f32> = (0..103).map(|i| (i as f32 * 0.11).cos()).collect();

        let mut dot = 0.0f32;
        let mut na = 0.0f32;
        let mut nb = 0.0f32;
        for i in 0..a.len() {
            dot += a[i] * b[i];
            na += a[i] * a[i];
            nb += b[i] * b[i];
        }
        let expected = dot / (na.sqrt() * nb.sqrt());

        assert!((cosine(&a, &b).unwrap() - expected).abs() < 1e-5);
    }
}
