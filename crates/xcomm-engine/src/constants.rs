use alloy::primitives::{fixed_bytes, Address, FixedBytes};

/// Name bound into every signing domain.
pub const DOMAIN_NAME: &str = "X COMM V1";

/// ERC-1271 acceptance value: bytes4(keccak256("isValidSignature(bytes32,bytes)")).
/// A delegated verification call must return exactly this to accept.
pub const ERC1271_MAGIC_VALUE: FixedBytes<4> = fixed_bytes!("0x1626ba7e");

/// Chain ID of the local development network.
pub const DEV_CHAIN_ID: u64 = 31337;

/// Signing domain for one engine deployment. Immutable after construction;
/// binds every signature to one contract on one chain so it cannot be
/// replayed elsewhere.
///
/// The domain carries exactly three fields (name, chainId, verifyingContract);
/// there is deliberately no version field in the domain typehash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    pub name: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl DomainConfig {
    /// Domain for a deployment of this engine on the given chain.
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: DOMAIN_NAME.to_string(),
            chain_id,
            verifying_contract,
        }
    }
}

impl Default for DomainConfig {
    /// Defaults to the local development network.
    fn default() -> Self {
        Self::new(DEV_CHAIN_ID, Address::ZERO)
    }
}
