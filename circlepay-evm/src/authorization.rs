//! Authorization Builder.
//!
//! Produces the EIP-712 payload a sender signs to authorize a gasless USDC
//! transfer:
//!
//! 1. [`generate_nonce`] derives a 32-byte nonce from the signer and the clock
//! 2. [`build_authorization_message`] assembles the token's EIP-712 domain and
//!    the [`TransferWithAuthorization`] struct
//! 3. [`sign_authorization`] asks an [`AuthorizationSigner`] for the signature
//!
//! For a cross-chain transfer the signed `to` is the settlement contract on
//! the origin chain. The real receiver travels out-of-band in the persisted
//! record and is handed to the settlement contract at execution time.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, B256, Bytes, FixedBytes, Signature, U256, keccak256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{Eip712Domain, SolStruct};
use circlepay::transfer::ValidatedTransfer;
use circlepay::{
    AuthorizationNonce, ChainId, CirclePayError, Clock, ExecutionPath, NewTransfer, TokenAmount,
    TransferAuthorization, UnixTimestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chain::ChainRegistry;
use crate::contract::TransferWithAuthorization;
use crate::signature::{StructuredSignature, verify_signature};

/// Derives an authorization nonce for `signer`.
///
/// The nonce is `keccak256(keccak256(signer ‖ uint256(micros)))`, where
/// `micros` is the clock reading in microseconds, packed without padding
/// like Solidity's `abi.encodePacked(address, uint256)`.
///
/// # Errors
///
/// Returns [`CirclePayError::InvalidInput`] if no signer address is given.
pub fn generate_nonce(
    signer: Option<Address>,
    clock: &impl Clock,
) -> Result<AuthorizationNonce, CirclePayError> {
    let signer = signer
        .ok_or_else(|| CirclePayError::invalid_input("a signer address is required for a nonce"))?;
    Ok(derive_nonce(signer, clock.now_micros()))
}

fn derive_nonce(signer: Address, micros: u64) -> AuthorizationNonce {
    let mut packed = [0u8; 52];
    packed[..20].copy_from_slice(signer.as_slice());
    packed[20..].copy_from_slice(&U256::from(micros).to_be_bytes::<32>());
    AuthorizationNonce(keccak256(keccak256(packed)))
}

/// Nonce source that never hashes the same clock reading twice.
///
/// Two requests landing in the same microsecond would otherwise derive the
/// same nonce for the same signer; the generator bumps the reading past the
/// last one it used.
#[derive(Debug)]
pub struct NonceGenerator<C> {
    clock: C,
    last: AtomicU64,
}

impl<C: Clock> NonceGenerator<C> {
    /// Creates a generator reading from `clock`.
    pub const fn new(clock: C) -> Self {
        Self {
            clock,
            last: AtomicU64::new(0),
        }
    }

    /// Derives a fresh nonce for `signer`.
    ///
    /// # Errors
    ///
    /// Returns [`CirclePayError::InvalidInput`] if no signer address is given.
    pub fn generate(&self, signer: Option<Address>) -> Result<AuthorizationNonce, CirclePayError> {
        let signer = signer.ok_or_else(|| {
            CirclePayError::invalid_input("a signer address is required for a nonce")
        })?;
        let now = self.clock.now_micros();
        let bump = |last: u64| now.max(last.saturating_add(1));
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(bump(last)))
            .unwrap_or_else(|last| last);
        Ok(derive_nonce(signer, bump(previous)))
    }
}

/// The inputs of a transfer authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    /// The token holder signing the authorization.
    pub from: Address,
    /// The final receiver.
    pub to: Address,
    /// Amount in base units.
    pub value: TokenAmount,
    /// Earliest execution time; `0` means immediately valid.
    pub valid_after: UnixTimestamp,
    /// Expiry time.
    pub valid_before: UnixTimestamp,
    /// One-time nonce.
    pub nonce: AuthorizationNonce,
    /// Origin chain.
    pub chain_id: ChainId,
    /// Destination chain.
    pub destination_chain: ChainId,
}

impl From<&ValidatedTransfer> for AuthorizationRequest {
    fn from(t: &ValidatedTransfer) -> Self {
        Self {
            from: t.sender,
            to: t.receiver,
            value: t.amount,
            valid_after: t.valid_after,
            valid_before: t.valid_before,
            nonce: t.nonce,
            chain_id: t.chain_id,
            destination_chain: t.destination_chain,
        }
    }
}

impl From<&TransferAuthorization> for AuthorizationRequest {
    fn from(t: &TransferAuthorization) -> Self {
        Self {
            from: t.sender,
            to: t.receiver,
            value: t.amount,
            valid_after: t.valid_after,
            valid_before: t.valid_before,
            nonce: t.nonce,
            chain_id: t.chain_id,
            destination_chain: t.destination_chain,
        }
    }
}

/// A ready-to-sign EIP-712 authorization.
#[derive(Debug, Clone)]
pub struct TypedAuthorization {
    /// Domain of the origin chain's token contract.
    pub domain: Eip712Domain,
    /// The struct being signed.
    pub message: TransferWithAuthorization,
    /// The inputs the message was built from.
    pub request: AuthorizationRequest,
    /// Execution path implied by the two chains.
    pub path: ExecutionPath,
}

/// Assembles the EIP-712 domain and message for `request`.
///
/// A `valid_after` of `0` is passed through unchanged; the token contract
/// enforces the validity window.
///
/// # Errors
///
/// - [`CirclePayError::InvalidInput`] for a zero sender or zero amount
/// - [`CirclePayError::UnsupportedChain`] if the origin chain is unknown, or a
///   cross-chain transfer has no settlement contract or an unknown destination
pub fn build_authorization_message(
    registry: &ChainRegistry,
    request: &AuthorizationRequest,
) -> Result<TypedAuthorization, CirclePayError> {
    if request.from.is_zero() {
        return Err(CirclePayError::invalid_input("sender address is required"));
    }
    if request.value.is_zero() {
        return Err(CirclePayError::invalid_input("amount must be greater than zero"));
    }
    let deployment = registry.deployment(request.chain_id)?;
    let path = ExecutionPath::select(request.chain_id, request.destination_chain);
    let signed_to = match path {
        ExecutionPath::SameChain => request.to,
        ExecutionPath::CrossChain { .. } => registry.resolve_target(request.chain_id, path)?,
    };
    let message = TransferWithAuthorization {
        from: request.from,
        to: signed_to,
        value: request.value.into(),
        validAfter: U256::from(request.valid_after.as_secs()),
        validBefore: U256::from(request.valid_before.as_secs()),
        nonce: request.nonce.as_b256(),
    };
    Ok(TypedAuthorization {
        domain: deployment.eip712_domain(),
        message,
        request: request.clone(),
        path,
    })
}

impl TypedAuthorization {
    /// The EIP-712 digest the sender signs.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        self.message.eip712_signing_hash(&self.domain)
    }

    /// Typed-data JSON as accepted by `eth_signTypedData_v4`.
    ///
    /// `uint256` values are rendered as decimal strings.
    #[must_use]
    pub fn to_typed_data(&self) -> serde_json::Value {
        let chain_id = self.domain.chain_id.map(|c| c.to_string());
        json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" },
                ],
                "TransferWithAuthorization": [
                    { "name": "from", "type": "address" },
                    { "name": "to", "type": "address" },
                    { "name": "value", "type": "uint256" },
                    { "name": "validAfter", "type": "uint256" },
                    { "name": "validBefore", "type": "uint256" },
                    { "name": "nonce", "type": "bytes32" },
                ],
            },
            "domain": {
                "name": self.domain.name,
                "version": self.domain.version,
                "chainId": chain_id,
                "verifyingContract": self.domain.verifying_contract,
            },
            "primaryType": "TransferWithAuthorization",
            "message": {
                "from": self.message.from,
                "to": self.message.to,
                "value": self.message.value.to_string(),
                "validAfter": self.message.validAfter.to_string(),
                "validBefore": self.message.validBefore.to_string(),
                "nonce": self.message.nonce,
            },
        })
    }
}

/// Abstraction over the signing service.
///
/// Implemented for owned signers and for `Arc`-wrapped ones, since alloy's
/// `Signer` is not implemented for `Arc<T>`.
pub trait AuthorizationSigner: Send + Sync {
    /// Returns the address of the signer.
    fn address(&self) -> Address;

    /// Signs the given hash.
    fn sign_hash(
        &self,
        hash: &FixedBytes<32>,
    ) -> impl Future<Output = Result<Signature, alloy_signer::Error>> + Send;
}

impl AuthorizationSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

impl<T: AuthorizationSigner> AuthorizationSigner for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// A typed authorization together with the sender's signature.
#[derive(Debug, Clone)]
pub struct SignedAuthorization {
    /// What was signed.
    pub authorization: TypedAuthorization,
    /// 65-byte signature over [`TypedAuthorization::signing_hash`].
    pub signature: Bytes,
}

impl SignedAuthorization {
    /// Store input for this authorization, requested by `initiator`.
    ///
    /// The receiver is the real beneficiary, not the signed `to`.
    #[must_use]
    pub fn into_new_transfer(self, initiator: Address) -> NewTransfer {
        let request = self.authorization.request;
        NewTransfer {
            initiator: Some(initiator),
            sender: Some(request.from),
            receiver: Some(request.to),
            amount: Some(request.value),
            chain_id: Some(request.chain_id),
            destination_chain: Some(request.destination_chain),
            valid_after: Some(request.valid_after),
            valid_before: Some(request.valid_before),
            nonce: Some(request.nonce),
            signature: Some(self.signature),
        }
    }
}

/// Signs `authorization` with `signer`.
///
/// # Errors
///
/// Returns [`CirclePayError::SignatureRejected`] if the signer is not the
/// sender or the signing service fails.
pub async fn sign_authorization<S: AuthorizationSigner>(
    signer: &S,
    authorization: &TypedAuthorization,
) -> Result<SignedAuthorization, CirclePayError> {
    let sender = authorization.message.from;
    if signer.address() != sender {
        return Err(CirclePayError::SignatureRejected(format!(
            "connected account {} is not the sender {sender}",
            signer.address()
        )));
    }
    let signature = signer
        .sign_hash(&authorization.signing_hash())
        .await
        .map_err(|e| CirclePayError::SignatureRejected(e.to_string()))?;
    Ok(SignedAuthorization {
        authorization: authorization.clone(),
        signature: Bytes::copy_from_slice(&signature.as_bytes()),
    })
}

/// Recomputes the signing hash of a transfer and checks its signature.
///
/// # Errors
///
/// Returns the errors of [`build_authorization_message`] and
/// [`verify_signature`].
pub fn verify_transfer_signature(
    registry: &ChainRegistry,
    transfer: &ValidatedTransfer,
    require_eoa: bool,
) -> Result<StructuredSignature, CirclePayError> {
    let typed = build_authorization_message(registry, &AuthorizationRequest::from(transfer))?;
    verify_signature(
        &transfer.signature,
        transfer.sender,
        &typed.signing_hash(),
        require_eoa,
    )
}
