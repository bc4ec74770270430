use alloy_primitives::{Address, TxHash};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{StoreError, TransferStore};
use crate::campaign::{Campaign, CampaignStore, NewCampaign, duplicate_campaign};
use crate::transfer::{NewTransfer, TransferAuthorization, TransferFilter, TransferId};

/// In-memory [`TransferStore`].
///
/// Records live for the lifetime of the process. The executed flag is flipped
/// under the map shard's write lock, which makes
/// [`mark_executed`](TransferStore::mark_executed) a compare-and-set.
#[derive(Debug, Default)]
pub struct MemoryTransferStore {
    records: DashMap<TransferId, TransferAuthorization>,
}

impl MemoryTransferStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TransferStore for MemoryTransferStore {
    async fn create(&self, input: NewTransfer) -> Result<TransferAuthorization, StoreError> {
        let validated = input.validate()?;
        let id = TransferId::new_v4();
        match self.records.entry(id) {
            Entry::Occupied(_) => Err(StoreError::Backend(format!("transfer id {id} collided"))),
            Entry::Vacant(slot) => {
                let record = validated.into_pending(id, Utc::now());
                slot.insert(record.clone());
                #[cfg(feature = "telemetry")]
                tracing::debug!(transfer_id = %id, sender = %record.sender, "stored pending transfer");
                Ok(record)
            }
        }
    }

    async fn find_by_id(
        &self,
        id: TransferId,
    ) -> Result<Option<TransferAuthorization>, StoreError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn query(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<TransferAuthorization>, StoreError> {
        let mut found: Vec<_> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| a.initiate_date.cmp(&b.initiate_date).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn mark_executed(
        &self,
        id: TransferId,
        transaction_hash: TxHash,
    ) -> Result<TransferAuthorization, StoreError> {
        let mut record = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.executed {
            return Err(StoreError::AlreadyExecuted(id));
        }
        record.executed = true;
        record.transaction_hash = Some(transaction_hash);
        record.executed_at = Some(Utc::now());
        #[cfg(feature = "telemetry")]
        tracing::info!(transfer_id = %id, tx = %transaction_hash, "transfer marked executed");
        Ok(record.clone())
    }
}

/// In-memory [`CampaignStore`].
#[derive(Debug, Default)]
pub struct MemoryCampaignStore {
    campaigns: DashMap<String, Campaign>,
}

impl MemoryCampaignStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn create(&self, input: NewCampaign) -> Result<Campaign, StoreError> {
        let campaign = input.validate()?;
        match self.campaigns.entry(campaign.id.clone()) {
            Entry::Occupied(_) => Err(duplicate_campaign(&campaign.id)),
            Entry::Vacant(slot) => {
                slot.insert(campaign.clone());
                Ok(campaign)
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Campaign>, StoreError> {
        Ok(self.campaigns.get(id).map(|c| c.value().clone()))
    }

    async fn list_by_owner(&self, owner: Address) -> Result<Vec<Campaign>, StoreError> {
        let mut owned: Vec<_> = self
            .campaigns
            .iter()
            .filter(|c| c.owner == owner)
            .map(|c| c.value().clone())
            .collect();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy_primitives::address;

    use super::*;
    use crate::amount::TokenAmount;
    use crate::transfer::tests::sample_input;

    #[tokio::test]
    async fn test_create_then_find() {
        let store = MemoryTransferStore::new();
        let record = store.create(sample_input()).await.unwrap();
        assert!(!record.executed);
        assert!(record.transaction_hash.is_none());
        let found = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(found, record);
        assert!(
            store
                .find_by_id(TransferId::new_v4())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_create_rejects_missing_field() {
        let store = MemoryTransferStore::new();
        let mut input = sample_input();
        input.nonce = None;
        let err = store.create(input).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref m) if m.contains("nonce")));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_expiry_beyond_i64() {
        let store = MemoryTransferStore::new();
        let mut input = sample_input();
        input.valid_before = Some(crate::UnixTimestamp::from_secs(u64::MAX));
        let err = store.create(input).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref m) if m.contains("validBefore")));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_query_filters_by_sender_and_status() {
        let store = MemoryTransferStore::new();
        let first = store.create(sample_input()).await.unwrap();
        let mut other = sample_input();
        other.sender = Some(address!("0x3333333333333333333333333333333333333333"));
        store.create(other).await.unwrap();
        store
            .mark_executed(first.id, TxHash::repeat_byte(1))
            .await
            .unwrap();

        let pending_from_first_sender = TransferFilter {
            sender: first.sender.into(),
            executed: Some(false),
            ..Default::default()
        };
        assert!(
            store
                .query(&pending_from_first_sender)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(store.query(&TransferFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mark_executed_is_one_shot() {
        let store = MemoryTransferStore::new();
        let record = store.create(sample_input()).await.unwrap();
        let first = TxHash::repeat_byte(0xaa);
        let done = store.mark_executed(record.id, first).await.unwrap();
        assert!(done.executed);
        assert_eq!(done.transaction_hash, Some(first));
        assert!(done.executed_at.is_some());

        let err = store
            .mark_executed(record.id, TxHash::repeat_byte(0xbb))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExecuted(id) if id == record.id));
        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.transaction_hash, Some(first));
    }

    #[tokio::test]
    async fn test_mark_executed_unknown_id() {
        let store = MemoryTransferStore::new();
        let id = TransferId::new_v4();
        let err = store
            .mark_executed(id, TxHash::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mark_executed_has_single_winner() {
        let store = Arc::new(MemoryTransferStore::new());
        let record = store.create(sample_input()).await.unwrap();
        let handles: Vec<_> = (0u8..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .mark_executed(record.id, TxHash::repeat_byte(i + 1))
                        .await
                })
            })
            .collect();
        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(r) => winners.push(r.transaction_hash),
                Err(StoreError::AlreadyExecuted(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners.len(), 1);
        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.transaction_hash, winners[0]);
    }

    #[tokio::test]
    async fn test_campaigns_by_owner_and_duplicate_id() {
        let store = MemoryCampaignStore::new();
        let owner = address!("0x4444444444444444444444444444444444444444");
        let input = NewCampaign {
            id: Some("spring".into()),
            owner: Some(owner),
            reserve: Some(TokenAmount::from(50_000_000)),
        };
        store.create(input.clone()).await.unwrap();
        assert!(matches!(
            store.create(input).await,
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.list_by_owner(owner).await.unwrap().len(), 1);
        assert!(
            store
                .list_by_owner(Address::ZERO)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            store.find_by_id("spring").await.unwrap().unwrap().owner,
            owner
        );
    }
}
