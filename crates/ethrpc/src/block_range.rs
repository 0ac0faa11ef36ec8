use {
    anyhow::{Result, ensure},
    std::num::NonZeroU64,
};

/// A non-empty inclusive range, `start <= end` is enforced on construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RangeInclusive<T: Ord> {
    start: T,
    end: T,
}

impl<T: Ord> RangeInclusive<T> {
    pub fn try_new(start: T, end: T) -> Result<Self> {
        ensure!(end >= start, "end has to be bigger or equal to start");
        Ok(Self { start, end })
    }

    pub fn start(&self) -> &T {
        &self.start
    }

    pub fn end(&self) -> &T {
        &self.end
    }

    pub fn into_inner(self) -> (T, T) {
        (self.start, self.end)
    }
}

impl RangeInclusive<u64> {
    /// Splits the range into consecutive, non-overlapping sub-ranges of at
    /// most `size` blocks each. Every chunk starts right after the end of the
    /// previous one and the last chunk ends at `self.end()`.
    pub fn chunks(&self, size: NonZeroU64) -> Chunks {
        Chunks {
            next: Some(self.start),
            end: self.end,
            size: size.get(),
        }
    }
}

impl std::fmt::Display for RangeInclusive<u64> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Iterator returned by [`RangeInclusive::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks {
    next: Option<u64>,
    end: u64,
    size: u64,
}

impl Iterator for Chunks {
    type Item = RangeInclusive<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next?;
        let end = start.saturating_add(self.size - 1).min(self.end);
        self.next = if end == self.end { None } else { Some(end + 1) };
        Some(RangeInclusive { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(size: u64) -> NonZeroU64 {
        NonZeroU64::new(size).unwrap()
    }

    fn bounds(range: &RangeInclusive<u64>, size_: u64) -> Vec<(u64, u64)> {
        range
            .chunks(size(size_))
            .map(RangeInclusive::into_inner)
            .collect()
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(RangeInclusive::try_new(2u64, 1).is_err());
        assert!(RangeInclusive::try_new(1u64, 1).is_ok());
    }

    #[test]
    fn chunks_cover_range_without_gaps() {
        let range = RangeInclusive::try_new(1, 1200).unwrap();
        assert_eq!(
            bounds(&range, 500),
            vec![(1, 500), (501, 1000), (1001, 1200)]
        );
    }

    #[test]
    fn chunks_exact_multiple() {
        let range = RangeInclusive::try_new(1, 1000).unwrap();
        assert_eq!(bounds(&range, 500), vec![(1, 500), (501, 1000)]);
    }

    #[test]
    fn chunks_single_block() {
        let range = RangeInclusive::try_new(7, 7).unwrap();
        assert_eq!(range.start(), range.end());
        assert_eq!(bounds(&range, 500), vec![(7, 7)]);
    }

    #[test]
    fn chunks_of_one_block_each() {
        let range = RangeInclusive::try_new(10, 12).unwrap();
        assert_eq!(bounds(&range, 1), vec![(10, 10), (11, 11), (12, 12)]);
    }

    #[test]
    fn chunks_near_u64_max_terminate() {
        let range = RangeInclusive::try_new(u64::MAX - 2, u64::MAX).unwrap();
        assert_eq!(
            bounds(&range, 2),
            vec![(u64::MAX - 2, u64::MAX - 1), (u64::MAX, u64::MAX)]
        );
    }
}
