use serde::{Deserialize, Serialize};

/// Ethereum zero address, used as the mint source and burn target.
pub const ETHEREUM_ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// All source chains an event can come from
pub enum Blockchain {
    Ethereum,
    Tezos,
    Bitmark,
}

impl Blockchain {
    /// Chain tag as sent to the event processor.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Blockchain::Ethereum => "ethereum",
            Blockchain::Tezos => "tezos",
            Blockchain::Bitmark => "bitmark",
        }
    }

    /// Addresses that mark a token as created (when sending) or destroyed
    /// (when receiving).
    ///
    /// Only Ethereum encodes mints and burns this way. Tezos and Bitmark
    /// report a mint as a transfer without a source and never report burns.
    pub const fn zero_addresses(&self) -> &'static [&'static str] {
        match self {
            Blockchain::Ethereum => &[ETHEREUM_ZERO_ADDRESS],
            Blockchain::Tezos | Blockchain::Bitmark => &[],
        }
    }

    /// Whether `address` is one of this chain's zero addresses. Hex
    /// addresses compare case-insensitively so checksummed forms agree.
    pub fn is_zero_address(&self, address: &str) -> bool {
        self.zero_addresses()
            .iter()
            .any(|zero| zero.eq_ignore_ascii_case(address))
    }
}

impl std::fmt::Display for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
