use std::str::FromStr;

use alloy_primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use circlepay::{
    NewTransfer, StoreError, TransferAuthorization, TransferFilter, TransferId, TransferStore,
    UnixTimestamp,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{SqliteStore, backend};

const COLUMNS: &str = "id, initiator, sender, receiver, amount, chain_id, destination_chain, \
                       valid_after, valid_before, nonce, sign, executed, transaction_hash, \
                       initiate_date, executed_at";

/// A `transfers` row before its text columns are parsed.
struct TransferRow {
    id: String,
    initiator: String,
    sender: String,
    receiver: String,
    amount: String,
    chain_id: i64,
    destination_chain: i64,
    valid_after: i64,
    valid_before: i64,
    nonce: String,
    sign: Vec<u8>,
    executed: bool,
    transaction_hash: Option<String>,
    initiate_date: i64,
    executed_at: Option<i64>,
}

impl TransferRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            initiator: row.get(1)?,
            sender: row.get(2)?,
            receiver: row.get(3)?,
            amount: row.get(4)?,
            chain_id: row.get(5)?,
            destination_chain: row.get(6)?,
            valid_after: row.get(7)?,
            valid_before: row.get(8)?,
            nonce: row.get(9)?,
            sign: row.get(10)?,
            executed: row.get(11)?,
            transaction_hash: row.get(12)?,
            initiate_date: row.get(13)?,
            executed_at: row.get(14)?,
        })
    }

    fn into_record(self) -> Result<TransferAuthorization, StoreError> {
        Ok(TransferAuthorization {
            id: self.id.parse().map_err(backend)?,
            initiator: Address::from_str(&self.initiator).map_err(backend)?,
            sender: Address::from_str(&self.sender).map_err(backend)?,
            receiver: Address::from_str(&self.receiver).map_err(backend)?,
            amount: self.amount.parse().map_err(backend)?,
            chain_id: to_u64(self.chain_id)?,
            destination_chain: to_u64(self.destination_chain)?,
            valid_after: UnixTimestamp::from_secs(to_u64(self.valid_after)?),
            valid_before: UnixTimestamp::from_secs(to_u64(self.valid_before)?),
            nonce: self.nonce.parse().map_err(backend)?,
            signature: Bytes::from(self.sign),
            executed: self.executed,
            transaction_hash: self
                .transaction_hash
                .as_deref()
                .map(TxHash::from_str)
                .transpose()
                .map_err(backend)?,
            initiate_date: from_micros(self.initiate_date)?,
            executed_at: self.executed_at.map(from_micros).transpose()?,
        })
    }
}

fn to_u64(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(backend)
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Validation(format!("{value} is out of range")))
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Backend(format!("invalid stored timestamp {micros}")))
}

/// Current time at the precision the table stores.
fn now_micros() -> Result<DateTime<Utc>, StoreError> {
    from_micros(Utc::now().timestamp_micros())
}

fn load(conn: &Connection, id: TransferId) -> Result<Option<TransferAuthorization>, StoreError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM transfers WHERE id = ?1"),
        [id.to_string()],
        TransferRow::read,
    )
    .optional()
    .map_err(backend)?
    .map(TransferRow::into_record)
    .transpose()
}

#[async_trait]
impl TransferStore for SqliteStore {
    async fn create(&self, input: NewTransfer) -> Result<TransferAuthorization, StoreError> {
        let validated = input.validate()?;
        let record = validated.into_pending(TransferId::new_v4(), now_micros()?);
        let chain_id = to_i64(record.chain_id)?;
        let destination_chain = to_i64(record.destination_chain)?;
        let valid_after = to_i64(record.valid_after.as_secs())?;
        let valid_before = to_i64(record.valid_before.as_secs())?;
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO transfers ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, NULL, ?12, NULL)"
                ),
                params![
                    record.id.to_string(),
                    record.initiator.to_string(),
                    record.sender.to_string(),
                    record.receiver.to_string(),
                    record.amount.to_string(),
                    chain_id,
                    destination_chain,
                    valid_after,
                    valid_before,
                    record.nonce.to_hex(),
                    record.signature.as_ref(),
                    record.initiate_date.timestamp_micros(),
                ],
            )
            .map_err(backend)?;
            #[cfg(feature = "telemetry")]
            tracing::debug!(transfer_id = %record.id, sender = %record.sender, "stored pending transfer");
            Ok(record)
        })
        .await
    }

    async fn find_by_id(
        &self,
        id: TransferId,
    ) -> Result<Option<TransferAuthorization>, StoreError> {
        self.run(move |conn| load(conn, id)).await
    }

    async fn query(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<TransferAuthorization>, StoreError> {
        let initiator = filter.initiator.map(|a| a.to_string());
        let sender = filter.sender.map(|a| a.to_string());
        let receiver = filter.receiver.map(|a| a.to_string());
        let executed = filter.executed;
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM transfers \
                     WHERE (?1 IS NULL OR initiator = ?1) \
                       AND (?2 IS NULL OR sender = ?2) \
                       AND (?3 IS NULL OR receiver = ?3) \
                       AND (?4 IS NULL OR executed = ?4) \
                     ORDER BY initiate_date, id"
                ))
                .map_err(backend)?;
            let rows = stmt
                .query_map(
                    params![initiator, sender, receiver, executed],
                    TransferRow::read,
                )
                .map_err(backend)?;
            rows.map(|row| row.map_err(backend).and_then(TransferRow::into_record))
                .collect()
        })
        .await
    }

    async fn mark_executed(
        &self,
        id: TransferId,
        transaction_hash: TxHash,
    ) -> Result<TransferAuthorization, StoreError> {
        let executed_at = now_micros()?.timestamp_micros();
        self.run(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE transfers SET executed = 1, transaction_hash = ?2, executed_at = ?3 \
                     WHERE id = ?1 AND executed = 0",
                    params![id.to_string(), transaction_hash.to_string(), executed_at],
                )
                .map_err(backend)?;
            match load(conn, id)? {
                None => Err(StoreError::NotFound(id)),
                Some(_) if changed == 0 => Err(StoreError::AlreadyExecuted(id)),
                Some(record) => {
                    #[cfg(feature = "telemetry")]
                    tracing::info!(transfer_id = %id, tx = %transaction_hash, "transfer marked executed");
                    Ok(record)
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use circlepay::{AuthorizationNonce, TokenAmount};

    use super::*;

    fn sample_input(nonce: u8) -> NewTransfer {
        NewTransfer {
            initiator: Some(Address::repeat_byte(0x11)),
            sender: Some(Address::repeat_byte(0x11)),
            receiver: Some(Address::repeat_byte(0x22)),
            amount: Some(TokenAmount::from(12_340_000u64)),
            chain_id: Some(84532),
            destination_chain: Some(11_155_420),
            valid_after: Some(UnixTimestamp::ZERO),
            valid_before: Some(UnixTimestamp::from_secs(1_900_000_000)),
            nonce: Some(AuthorizationNonce::from(alloy_primitives::B256::with_last_byte(nonce))),
            signature: Some(Bytes::from(vec![0x1b; 65])),
        }
    }

    #[tokio::test]
    async fn test_create_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("circlepay.db");
        let created = {
            let store = SqliteStore::open(&path).unwrap();
            store.create(sample_input(1)).await.unwrap()
        };
        assert!(!created.executed);

        let reopened = SqliteStore::open(&path).unwrap();
        let loaded = reopened.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert!(loaded.path().is_cross_chain());
    }

    #[tokio::test]
    async fn test_missing_field_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut input = sample_input(1);
        input.receiver = None;
        let err = store.create(input).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref m) if m.contains("receiver")));
        assert!(store.query(&TransferFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_beyond_i64_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut input = sample_input(1);
        input.valid_before = Some(UnixTimestamp::from_secs(u64::MAX));
        let err = store.create(input).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref m) if m.contains("validBefore")));
        assert!(store.query(&TransferFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_filters_are_conjunctive() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.create(sample_input(1)).await.unwrap();
        let mut other = sample_input(2);
        other.sender = Some(Address::repeat_byte(0x33));
        let second = store.create(other).await.unwrap();
        store
            .mark_executed(second.id, TxHash::repeat_byte(9))
            .await
            .unwrap();

        let all = store.query(&TransferFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let pending_from_first = TransferFilter {
            sender: Some(Address::repeat_byte(0x11)),
            executed: Some(false),
            ..TransferFilter::default()
        };
        let found = store.query(&pending_from_first).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, first.id);

        let executed_from_first = TransferFilter {
            sender: Some(Address::repeat_byte(0x11)),
            executed: Some(true),
            ..TransferFilter::default()
        };
        assert!(store.query(&executed_from_first).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_executed_is_compare_and_set() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = store.create(sample_input(1)).await.unwrap();
        let first = TxHash::repeat_byte(1);

        let executed = store.mark_executed(record.id, first).await.unwrap();
        assert!(executed.executed);
        assert_eq!(executed.transaction_hash, Some(first));
        assert!(executed.executed_at.is_some());

        let err = store
            .mark_executed(record.id, TxHash::repeat_byte(2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExecuted(id) if id == record.id));
        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.transaction_hash, Some(first));

        let missing = TransferId::new_v4();
        assert!(matches!(
            store.mark_executed(missing, first).await,
            Err(StoreError::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mark_executed_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("race.db")).unwrap());
        let id = store.create(sample_input(1)).await.unwrap().id;

        let handles: Vec<_> = (0u8..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.mark_executed(id, TxHash::repeat_byte(i)).await
                })
            })
            .collect();
        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(StoreError::AlreadyExecuted(_)) => {}
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_duplicate_nonce_is_not_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create(sample_input(7)).await.unwrap();
        let b = store.create(sample_input(7)).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.nonce, b.nonce);
    }
}
