//! Signature classification and verification.
//!
//! Handles EOA, EIP-1271 (contract wallet), and EIP-6492 (counterfactual
//! wallet) signature formats that a sender may attach to a transfer
//! authorization.

use alloy_primitives::{Address, B256, Bytes, Signature, hex};
use alloy_sol_types::SolType;
use circlepay::CirclePayError;

use crate::contract::Sig6492;

/// The fixed 32-byte magic suffix defined by [EIP-6492](https://eips.ethereum.org/EIPS/eip-6492).
const EIP6492_MAGIC_SUFFIX: [u8; 32] =
    hex!("6492649264926492649264926492649264926492649264926492649264926492");

/// A structured representation of an authorization signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredSignature {
    /// A 64- or 65-byte signature that recovers to the expected signer.
    #[allow(clippy::upper_case_acronyms)]
    EOA(Signature),
    /// An EIP-6492 wrapped signature of a not-yet-deployed wallet.
    EIP6492 {
        /// Wallet factory.
        factory: Address,
        /// Factory deployment calldata.
        factory_calldata: Bytes,
        /// The signature the deployed wallet validates.
        inner: Bytes,
    },
    /// Anything else; only a contract wallet can validate it on-chain.
    EIP1271(Bytes),
}

/// Errors from parsing a structured signature.
#[derive(Debug, thiserror::Error)]
pub enum StructuredSignatureFormatError {
    /// The EIP-6492 wrapper could not be decoded.
    #[error(transparent)]
    InvalidEIP6492Format(alloy_sol_types::Error),
}

impl StructuredSignature {
    /// Classifies `bytes` as a signature by `expected_signer` over `prehash`.
    ///
    /// # Errors
    ///
    /// Returns [`StructuredSignatureFormatError`] if an EIP-6492 wrapper is
    /// malformed.
    pub fn try_from_bytes(
        bytes: Bytes,
        expected_signer: Address,
        prehash: &B256,
    ) -> Result<Self, StructuredSignatureFormatError> {
        let is_eip6492 = bytes.len() >= 32 && bytes[bytes.len() - 32..] == EIP6492_MAGIC_SUFFIX;
        if is_eip6492 {
            let body = &bytes[..bytes.len() - 32];
            let sig6492 = Sig6492::abi_decode_params(body)
                .map_err(StructuredSignatureFormatError::InvalidEIP6492Format)?;
            return Ok(Self::EIP6492 {
                factory: sig6492.factory,
                factory_calldata: sig6492.factoryCalldata,
                inner: sig6492.innerSig,
            });
        }
        let eoa_signature = match bytes.len() {
            65 => Signature::from_raw(&bytes).ok().map(Signature::normalized_s),
            64 => Some(Signature::from_erc2098(&bytes).normalized_s()),
            _ => None,
        };
        let recovered = eoa_signature.filter(|s| {
            s.recover_address_from_prehash(prehash)
                .is_ok_and(|r| r == expected_signer)
        });
        Ok(recovered.map_or(Self::EIP1271(bytes), Self::EOA))
    }

    /// Short label for logs and API responses.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EOA(_) => "eoa",
            Self::EIP6492 { .. } => "eip6492",
            Self::EIP1271(_) => "eip1271",
        }
    }
}

/// Checks a stored signature against the authorization it claims to sign.
///
/// With `require_eoa` set, only a 64/65-byte signature recovering to `sender`
/// is accepted. Without it, contract-wallet signatures pass through and are
/// left for the token contract to validate.
///
/// # Errors
///
/// Returns [`CirclePayError::InvalidInput`] when the signature is malformed
/// or, under `require_eoa`, does not recover to `sender`.
pub fn verify_signature(
    signature: &Bytes,
    sender: Address,
    signing_hash: &B256,
    require_eoa: bool,
) -> Result<StructuredSignature, CirclePayError> {
    let structured = StructuredSignature::try_from_bytes(signature.clone(), sender, signing_hash)
        .map_err(|e| CirclePayError::InvalidInput(format!("malformed signature: {e}")))?;
    if require_eoa && !matches!(structured, StructuredSignature::EOA(_)) {
        return Err(CirclePayError::InvalidInput(format!(
            "signature does not recover to sender {sender}"
        )));
    }
    Ok(structured)
}
