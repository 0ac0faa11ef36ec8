/// Highest block whose eligibility events have all been decided.
///
/// Lives in memory only. After a restart the scan resumes from a lookback
/// window and the claim ledger prevents paying a wallet twice.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    last_processed_block: Option<u64>,
}

impl ScanCursor {
    #[cfg(test)]
    pub fn at(block: u64) -> Self {
        Self {
            last_processed_block: Some(block),
        }
    }

    pub fn last_processed_block(&self) -> Option<u64> {
        self.last_processed_block
    }

    /// Sets the starting point of the first scan. Has no effect once the
    /// cursor holds a block.
    pub fn initialize(&mut self, block: u64) {
        self.last_processed_block.get_or_insert(block);
    }

    /// Marks everything up to and including `block` as processed. The cursor
    /// never moves backwards.
    pub fn advance(&mut self, block: u64) {
        self.last_processed_block = Some(match self.last_processed_block {
            Some(current) => current.max(block),
            None => block,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_only_once() {
        let mut cursor = ScanCursor::default();
        assert_eq!(cursor.last_processed_block(), None);
        cursor.initialize(10);
        cursor.initialize(20);
        assert_eq!(cursor.last_processed_block(), Some(10));
    }

    #[test]
    fn advance_is_monotonic() {
        let mut cursor = ScanCursor::at(100);
        cursor.advance(140);
        assert_eq!(cursor.last_processed_block(), Some(140));
        cursor.advance(120);
        assert_eq!(cursor.last_processed_block(), Some(140));
    }
}
