//! Types shared by the engine and its boundary adapters.

use {
    alloy::primitives::{Address, B256},
    chrono::{DateTime, Utc},
    std::{fmt, str::FromStr},
};

/// A wallet address in its canonical form.
///
/// Addresses are compared by their 20 bytes, so the hex casing used by
/// whoever produced the address does not matter. `Display` renders the
/// lowercase `0x`-prefixed form which is also the ledger key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(Address);

impl WalletAddress {
    pub fn new(address: Address) -> Self {
        Self(address)
    }

    /// Reads an address from an indexed event topic, which holds it
    /// left-padded to 32 bytes.
    pub fn from_topic(topic: B256) -> Self {
        Self(Address::from_word(topic))
    }

    pub fn as_address(&self) -> Address {
        self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid wallet address {0:?}")]
pub struct InvalidAddress(String);

impl FromStr for WalletAddress {
    type Err = InvalidAddress;

    /// Accepts any hex casing, checksummed or not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| InvalidAddress(s.to_string()))?;
        if hex.len() != 40 {
            return Err(InvalidAddress(s.to_string()));
        }
        Address::from_str(hex)
            .map(Self)
            .map_err(|_| InvalidAddress(s.to_string()))
    }
}

/// One occurrence of the eligibility signal emitted by the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EligibilityEvent {
    pub wallet: WalletAddress,
    pub block_number: u64,
    pub log_index: u64,
}

/// Durable proof that a wallet has been paid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRecord {
    pub wallet: WalletAddress,
    pub claimed_at: DateTime<Utc>,
    pub tx_hash: String,
}

/// Result of a reward transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    pub tx_hash: String,
}

#[cfg(test)]
mod tests {
    use {super::*, alloy::primitives::address};

    #[test]
    fn parsing_is_case_insensitive() {
        let lower: WalletAddress = "0xabcdef0123456789abcdef0123456789abcdef01".parse().unwrap();
        let mixed: WalletAddress = "0xAbCdEf0123456789ABCDEF0123456789abcdef01".parse().unwrap();
        let upper_prefix: WalletAddress =
            "0XABCDEF0123456789ABCDEF0123456789ABCDEF01".parse().unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(lower, upper_prefix);
    }

    #[test]
    fn displays_lowercase() {
        let wallet: WalletAddress = "0xAbCdEf0123456789ABCDEF0123456789abcdef01".parse().unwrap();
        assert_eq!(
            wallet.to_string(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        for input in [
            "",
            "0x",
            "abcdef0123456789abcdef0123456789abcdef01",
            "0xabcdef0123456789abcdef0123456789abcdef",
            "0xabcdef0123456789abcdef0123456789abcdef0102",
            "0xzzcdef0123456789abcdef0123456789abcdef01",
        ] {
            assert!(input.parse::<WalletAddress>().is_err(), "{input}");
        }
    }

    #[test]
    fn reads_address_from_topic() {
        let user = address!("0x00000000000000000000000000000000000000ab");
        let wallet = WalletAddress::from_topic(user.into_word());
        assert_eq!(wallet, WalletAddress::new(user));
    }
}
