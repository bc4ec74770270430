//! EIP-155 chain identifiers.
//!
//! Transfers name their origin and destination chains by numeric EIP-155 chain
//! ID (e.g. `84532` for Base Sepolia). Configuration keys use the CAIP-2 form
//! `eip155:<id>`.

/// An EIP-155 chain ID (e.g., 8453 for Base, 11155420 for OP Sepolia).
pub type ChainId = u64;

/// CAIP-2 namespace for EVM chains.
pub const EIP155_NAMESPACE: &str = "eip155";

/// Formats a chain ID as a CAIP-2 identifier.
///
/// Example: `caip2(8453)` returns `"eip155:8453"`.
#[must_use]
pub fn caip2(chain_id: ChainId) -> String {
    format!("{EIP155_NAMESPACE}:{chain_id}")
}

/// Parses a CAIP-2 identifier into an EIP-155 chain ID.
///
/// Returns `None` if the input is not a valid `eip155:` prefixed string.
#[must_use]
pub fn parse_caip2(caip: &str) -> Option<ChainId> {
    caip.strip_prefix("eip155:").and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caip2_roundtrip() {
        assert_eq!(caip2(84532), "eip155:84532");
        assert_eq!(parse_caip2("eip155:84532"), Some(84532));
    }

    #[test]
    fn test_parse_caip2_rejects_other_namespaces() {
        assert_eq!(parse_caip2("solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"), None);
        assert_eq!(parse_caip2("eip155:base"), None);
        assert_eq!(parse_caip2("84532"), None);
    }
}
