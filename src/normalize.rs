use num_traits::Float;
use rayon::prelude::*;

/// L2-normalize every vector in place, in parallel.
///
/// Vectors are independent; each worker touches only its own vector and the
/// call returns once all of them are done. An all-zero vector has no
/// direction and is left as zeros instead of being divided by zero.
pub fn l2_normalize<T>(vectors: &mut [Vec<T>])
where
    T: Float + Send + Sync,
{
    vectors.par_iter_mut().for_each(|v| l2_normalize_one(v));
}

/// L2-normalize a single vector in place.
pub fn l2_normalize_one<T: Float>(vector: &mut [T]) {
    let norm = l2_norm(vector);
    if norm == T::zero() {
        return;
    }
    vector.iter_mut().for_each(|x| *x = *x / norm);
}

pub fn l2_norm<T: Float>(vector: &[T]) -> T {
    vector
        .iter()
        .fold(T::zero(), |acc, &x| acc + x * x)
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn test_three_four_five() {
        let mut vectors = vec![vec![3.0f32, 4.0]];
        l2_normalize(&mut vectors);
        assert!((vectors[0][0] - 0.6).abs() < EPS);
        assert!((vectors[0][1] - 0.8).abs() < EPS);
    }

    #[test]
    fn test_unit_norm_for_many_vectors() {
        let mut vectors: Vec<Vec<f32>> = (1..200)
            .map(|i| (0..64).map(|k| ((i * 31 + k * 7) % 17) as f32 - 8.0).collect())
            .collect();
        vectors.push(vec![1e-3; 64]);
        l2_normalize(&mut vectors);

        for v in &vectors {
            if v.iter().any(|x| *x != 0.0) {
                assert!((l2_norm(v) - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_zero_vector_stays_zero() {
        let mut vectors = vec![vec![0.0f64; 4], vec![0.0, 2.0, 0.0, 0.0]];
        l2_normalize(&mut vectors);
        assert_eq!(vectors[0], vec![0.0; 4]);
        assert!(vectors[0].iter().all(|x| !x.is_nan()));
        assert_eq!(vectors[1], vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_input() {
        let mut vectors: Vec<Vec<f32>> = Vec::new();
        l2_normalize(&mut vectors);
        assert!(vectors.is_empty());
    }
}
