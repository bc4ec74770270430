//! The persisted transfer authorization record.
//!
//! A [`TransferAuthorization`] is a signed, not-yet-executed (or executed)
//! EIP-3009 intent. It carries everything a sponsor needs to submit the call
//! later: the parties, the amount in base units, both chains, the validity
//! window, the 32-byte nonce and the sender's signature.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, Bytes, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::TokenAmount;
use crate::chain::ChainId;
use crate::execution::ExecutionPath;
use crate::nonce::AuthorizationNonce;
use crate::store::StoreError;
use crate::timestamp::UnixTimestamp;

/// Opaque, store-assigned transfer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub Uuid);

impl TransferId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TransferId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A stored transfer authorization.
///
/// Once `executed` is `true` it never reverts to `false`, and
/// `transaction_hash` is set if and only if `executed` is `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
    /// Store-assigned identifier.
    pub id: TransferId,
    /// Party that requested the authorization (often equal to `sender`).
    pub initiator: Address,
    /// Token holder who signed the authorization.
    pub sender: Address,
    /// Beneficiary on the destination chain.
    pub receiver: Address,
    /// Amount in base units.
    pub amount: TokenAmount,
    /// Origin chain, where the authorization is executed.
    pub chain_id: ChainId,
    /// Chain where the receiver is credited.
    pub destination_chain: ChainId,
    /// Earliest execution time; `0` means immediately valid.
    pub valid_after: UnixTimestamp,
    /// Expiry time.
    pub valid_before: UnixTimestamp,
    /// 32-byte authorization nonce.
    pub nonce: AuthorizationNonce,
    /// Sender's signature over the typed authorization.
    #[serde(rename = "sign", alias = "signature")]
    pub signature: Bytes,
    /// Whether the authorization has been executed on-chain.
    pub executed: bool,
    /// Hash of the executing transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<TxHash>,
    /// When the record was created.
    pub initiate_date: DateTime<Utc>,
    /// When the record was marked executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl TransferAuthorization {
    /// The execution path implied by the origin and destination chains.
    #[must_use]
    pub fn path(&self) -> ExecutionPath {
        ExecutionPath::select(self.chain_id, self.destination_chain)
    }

    /// Whether the record is still waiting for execution.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.executed
    }
}

/// Input to [`TransferStore::create`](crate::store::TransferStore::create).
///
/// Every field is optional so that callers can pass partially decoded client
/// input; [`NewTransfer::validate`] rejects anything missing by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransfer {
    /// Requesting party.
    pub initiator: Option<Address>,
    /// Token holder.
    pub sender: Option<Address>,
    /// Beneficiary.
    pub receiver: Option<Address>,
    /// Amount in base units.
    pub amount: Option<TokenAmount>,
    /// Origin chain.
    pub chain_id: Option<ChainId>,
    /// Destination chain.
    pub destination_chain: Option<ChainId>,
    /// Earliest execution time.
    pub valid_after: Option<UnixTimestamp>,
    /// Expiry time.
    pub valid_before: Option<UnixTimestamp>,
    /// 32-byte nonce.
    pub nonce: Option<AuthorizationNonce>,
    /// Sender's signature.
    #[serde(alias = "sign")]
    pub signature: Option<Bytes>,
}

/// A [`NewTransfer`] with every field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransfer {
    /// Requesting party.
    pub initiator: Address,
    /// Token holder.
    pub sender: Address,
    /// Beneficiary.
    pub receiver: Address,
    /// Amount in base units.
    pub amount: TokenAmount,
    /// Origin chain.
    pub chain_id: ChainId,
    /// Destination chain.
    pub destination_chain: ChainId,
    /// Earliest execution time.
    pub valid_after: UnixTimestamp,
    /// Expiry time.
    pub valid_before: UnixTimestamp,
    /// 32-byte nonce.
    pub nonce: AuthorizationNonce,
    /// Sender's signature.
    pub signature: Bytes,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, StoreError> {
    value.ok_or_else(|| StoreError::Validation(format!("missing required field `{field}`")))
}

/// Persistent backends keep integers as signed 64-bit values.
fn storable(value: u64, field: &str) -> Result<u64, StoreError> {
    match i64::try_from(value) {
        Ok(_) => Ok(value),
        Err(_) => Err(StoreError::Validation(format!(
            "`{field}` is out of range: {value}"
        ))),
    }
}

impl NewTransfer {
    /// Checks that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] naming the first missing field, or
    /// the first chain id or timestamp that does not fit in an `i64`.
    pub fn validate(self) -> Result<ValidatedTransfer, StoreError> {
        let signature = required(self.signature, "sign")?;
        if signature.is_empty() {
            return Err(StoreError::Validation("`sign` must not be empty".into()));
        }
        let chain_id = storable(required(self.chain_id, "chainId")?, "chainId")?;
        let destination_chain = storable(
            required(self.destination_chain, "destinationChain")?,
            "destinationChain",
        )?;
        let valid_after = required(self.valid_after, "validAfter")?;
        storable(valid_after.as_secs(), "validAfter")?;
        let valid_before = required(self.valid_before, "validBefore")?;
        storable(valid_before.as_secs(), "validBefore")?;
        Ok(ValidatedTransfer {
            initiator: required(self.initiator, "initiator")?,
            sender: required(self.sender, "sender")?,
            receiver: required(self.receiver, "receiver")?,
            amount: required(self.amount, "amount")?,
            chain_id,
            destination_chain,
            valid_after,
            valid_before,
            nonce: required(self.nonce, "nonce")?,
            signature,
        })
    }
}

impl ValidatedTransfer {
    /// Turns the validated input into a pending record.
    #[must_use]
    pub fn into_pending(self, id: TransferId, initiate_date: DateTime<Utc>) -> TransferAuthorization {
        TransferAuthorization {
            id,
            initiator: self.initiator,
            sender: self.sender,
            receiver: self.receiver,
            amount: self.amount,
            chain_id: self.chain_id,
            destination_chain: self.destination_chain,
            valid_after: self.valid_after,
            valid_before: self.valid_before,
            nonce: self.nonce,
            signature: self.signature,
            executed: false,
            transaction_hash: None,
            initiate_date,
            executed_at: None,
        }
    }
}

/// Conjunctive filter over stored transfers.
///
/// Every field that is `Some` must match; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFilter {
    /// Match on the initiating party.
    pub initiator: Option<Address>,
    /// Match on the token holder.
    pub sender: Option<Address>,
    /// Match on the beneficiary.
    pub receiver: Option<Address>,
    /// Match on execution status.
    pub executed: Option<bool>,
}

impl TransferFilter {
    /// Whether `record` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, record: &TransferAuthorization) -> bool {
        self.initiator.is_none_or(|a| a == record.initiator)
            && self.sender.is_none_or(|a| a == record.sender)
            && self.receiver.is_none_or(|a| a == record.receiver)
            && self.executed.is_none_or(|e| e == record.executed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::address;

    pub(crate) fn sample_input() -> NewTransfer {
        NewTransfer {
            initiator: Some(address!("0x1111111111111111111111111111111111111111")),
            sender: Some(address!("0x1111111111111111111111111111111111111111")),
            receiver: Some(address!("0x2222222222222222222222222222222222222222")),
            amount: Some(TokenAmount::from(12_340_000)),
            chain_id: Some(84532),
            destination_chain: Some(84532),
            valid_after: Some(UnixTimestamp::ZERO),
            valid_before: Some(UnixTimestamp::from_secs(1_900_000_000)),
            nonce: Some("0x01".parse().unwrap()),
            signature: Some(Bytes::from(vec![0x1b; 65])),
        }
    }

    #[test]
    fn test_validate_names_missing_field() {
        let mut input = sample_input();
        input.receiver = None;
        let err = input.validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref m) if m.contains("receiver")));
    }

    #[test]
    fn test_validate_rejects_values_beyond_i64() {
        let mut input = sample_input();
        input.valid_before = Some(UnixTimestamp::from_secs(u64::MAX));
        let err = input.validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref m) if m.contains("validBefore")));

        let mut input = sample_input();
        input.valid_after = Some(UnixTimestamp::from_secs(1 << 63));
        let err = input.validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref m) if m.contains("validAfter")));

        let mut input = sample_input();
        input.chain_id = Some(u64::MAX);
        let err = input.validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref m) if m.contains("chainId")));

        let mut input = sample_input();
        input.valid_before = Some(UnixTimestamp::from_secs(i64::MAX.unsigned_abs()));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_signature() {
        let mut input = sample_input();
        input.signature = Some(Bytes::new());
        assert!(matches!(input.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_pending_record_wire_form() {
        let record = sample_input()
            .validate()
            .unwrap()
            .into_pending(TransferId::new_v4(), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["executed"], false);
        assert_eq!(json["amount"], "12340000");
        assert_eq!(json["chainId"], 84532);
        assert_eq!(json["nonce"], "1");
        assert!(json.get("sign").is_some());
        assert!(json.get("transactionHash").is_none());
        let back: TransferAuthorization = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let record = sample_input()
            .validate()
            .unwrap()
            .into_pending(TransferId::new_v4(), Utc::now());
        assert!(TransferFilter::default().matches(&record));
        let by_sender = TransferFilter {
            sender: Some(record.sender),
            executed: Some(false),
            ..Default::default()
        };
        assert!(by_sender.matches(&record));
        let wrong_receiver = TransferFilter {
            sender: Some(record.sender),
            receiver: Some(record.sender),
            ..Default::default()
        };
        assert!(!wrong_receiver.matches(&record));
    }

    #[test]
    fn test_path_follows_chains() {
        let mut record = sample_input()
            .validate()
            .unwrap()
            .into_pending(TransferId::new_v4(), Utc::now());
        assert_eq!(record.path(), ExecutionPath::SameChain);
        record.destination_chain = 421_614;
        assert_eq!(
            record.path(),
            ExecutionPath::CrossChain {
                destination_chain: 421_614
            }
        );
    }
}
