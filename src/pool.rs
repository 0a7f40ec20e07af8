use std::fmt;
use std::str::FromStr;

use num_traits::Float;

use crate::errors::{FeatureError, Result};

/// How per-region descriptors are aggregated into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStrategy {
    /// Elementwise arithmetic mean.
    Avg,
}

impl PoolStrategy {
    pub const ALL: [Self; 1] = [Self::Avg];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
        }
    }
}

impl fmt::Display for PoolStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PoolStrategy {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| {
                let supported: Vec<_> = Self::ALL.iter().map(|p| format!("`{p}`")).collect();
                FeatureError::invalid_argument(
                    "pool",
                    format!(
                        "`{s}` is not implemented. Supported strategies: {}",
                        supported.join(", ")
                    ),
                )
            })
    }
}

/// Aggregate `vectors` into a single descriptor.
///
/// Returns `Ok(None)` for an empty input. All vectors must have the length of
/// the first one.
pub fn pool<T: Float>(vectors: &[Vec<T>], strategy: PoolStrategy) -> Result<Option<Vec<T>>> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let dim = first.len();
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(FeatureError::Dimension {
            context: format!("pooling vector {i}"),
            expected: dim,
            actual: v.len(),
        });
    }

    match strategy {
        PoolStrategy::Avg => {
            let mut sum = vec![T::zero(); dim];
            for v in vectors {
                sum.iter_mut().zip(v).for_each(|(acc, &x)| *acc = *acc + x);
            }
            let count = T::from(vectors.len()).ok_or_else(|| {
                FeatureError::invalid_argument("pool", "vector count not representable")
            })?;
            sum.iter_mut().for_each(|x| *x = *x / count);
            Ok(Some(sum))
        }
    }
}

/// Replace `vectors` by its pooled descriptor. An empty set is left as is.
pub fn pool_in_place<T: Float>(vectors: &mut Vec<Vec<T>>, strategy: PoolStrategy) -> Result<()> {
    if let Some(pooled) = pool(vectors, strategy)? {
        vectors.clear();
        vectors.push(pooled);
    }
    Ok(())
}

/// Pool with a strategy given by name, as read from configuration.
pub fn pool_by_name<T: Float>(vectors: &[Vec<T>], strategy: &str) -> Result<Option<Vec<T>>> {
    pool(vectors, strategy.parse()?)
}
