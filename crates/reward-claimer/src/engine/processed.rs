use {crate::domain::WalletAddress, std::collections::HashSet};

/// Wallets handled during the lifetime of this process.
///
/// A cache in front of the claim ledger: a hit skips all I/O, a miss says
/// nothing and has to be resolved by the ledger.
#[derive(Debug, Default)]
pub struct ProcessedSet(HashSet<WalletAddress>);

impl ProcessedSet {
    pub fn contains(&self, wallet: &WalletAddress) -> bool {
        self.0.contains(wallet)
    }

    pub fn insert(&mut self, wallet: WalletAddress) {
        self.0.insert(wallet);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
