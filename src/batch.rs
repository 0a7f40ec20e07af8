use crate::errors::{FeatureError, Result};

/// How the last, partially filled batch is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// Fill the remaining slots with the first item of the whole input.
    /// Needed by engines that only accept one batch shape.
    #[default]
    RepeatFirst,
    /// Leave the last batch short. Used when the engine accepts variable
    /// batch sizes.
    None,
}

/// One group of items submitted to inference together.
///
/// The first `real_len()` slots are input items in order; any remaining slots
/// are padding whose outputs must be discarded.
#[derive(Debug, Clone)]
pub struct ImageBatch<'a, T> {
    index: usize,
    offset: usize,
    items: Vec<&'a T>,
    real: usize,
}

impl<'a, T> ImageBatch<'a, T> {
    /// Position of this batch in the partition.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Index of the first real item in the original input.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Number of slots, padding included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of slots holding real input items.
    pub const fn real_len(&self) -> usize {
        self.real
    }

    pub fn padding_len(&self) -> usize {
        self.items.len() - self.real
    }

    /// All slots, padding included.
    pub fn items(&self) -> &[&'a T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a T> + '_ {
        self.items.iter().copied()
    }
}

/// Splits an input sequence into fixed-size batches.
#[derive(Debug, Clone, Copy)]
pub struct BatchPartitioner {
    batch_size: usize,
    padding: Padding,
}

impl BatchPartitioner {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(FeatureError::invalid_argument(
                "batch_size",
                "must be at least 1",
            ));
        }
        Ok(Self {
            batch_size,
            padding: Padding::default(),
        })
    }

    pub const fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub const fn padding(&self) -> Padding {
        self.padding
    }

    /// Number of batches produced for `len` items: `ceil(len / batch_size)`.
    pub const fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.batch_size)
    }

    /// Partition `items` into `ceil(N / B)` batches.
    ///
    /// With `Padding::RepeatFirst` every batch has exactly `B` slots and the
    /// last one is completed with `items[0]`.
    pub fn partition<'a, T>(&self, items: &'a [T]) -> Vec<ImageBatch<'a, T>> {
        let Some(first) = items.first() else {
            return Vec::new();
        };

        items
            .chunks(self.batch_size)
            .enumerate()
            .map(|(index, chunk)| {
                let mut slots: Vec<&T> = Vec::with_capacity(self.batch_size);
                slots.extend(chunk.iter());
                if self.padding == Padding::RepeatFirst {
                    slots.resize(self.batch_size, first);
                }
                ImageBatch {
                    index,
                    offset: index * self.batch_size,
                    items: slots,
                    real: chunk.len(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = BatchPartitioner::new(0).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_empty_input_produces_no_batches() -> Result<()> {
        let partitioner = BatchPartitioner::new(4)?;
        let items: Vec<u32> = Vec::new();
        assert!(partitioner.partition(&items).is_empty());
        assert_eq!(partitioner.batch_count(0), 0);
        Ok(())
    }

    #[test]
    fn test_last_batch_padded_with_first_input() -> Result<()> {
        let partitioner = BatchPartitioner::new(2)?;
        let items = [10, 11, 12, 13, 14];
        let batches = partitioner.partition(&items);

        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 2));

        let last = &batches[2];
        assert_eq!(last.index(), 2);
        assert_eq!(last.offset(), 4);
        assert_eq!(last.real_len(), 1);
        assert_eq!(last.padding_len(), 1);
        // padding repeats the first item of the whole input, not of the batch
        assert_eq!(last.iter().copied().collect::<Vec<_>>(), vec![14, 10]);
        Ok(())
    }

    #[test]
    fn test_batch_counts_and_sizes() -> Result<()> {
        for batch_size in 1..=6 {
            let partitioner = BatchPartitioner::new(batch_size)?;
            for n in 0..=13usize {
                let items: Vec<usize> = (0..n).collect();
                let batches = partitioner.partition(&items);

                assert_eq!(batches.len(), n.div_ceil(batch_size));
                assert!(batches.iter().all(|b| b.len() == batch_size));

                let real: Vec<usize> = batches
                    .iter()
                    .flat_map(|b| b.items()[..b.real_len()].iter().map(|v| **v))
                    .collect();
                assert_eq!(real, items);
            }
        }
        Ok(())
    }

    #[test]
    fn test_no_padding_leaves_last_batch_short() -> Result<()> {
        let partitioner = BatchPartitioner::new(4)?.with_padding(Padding::None);
        let items = ["a", "b", "c", "d", "e", "f"];
        let batches = partitioner.partition(&items);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 2);
        assert_eq!(batches[1].padding_len(), 0);
        Ok(())
    }
}
