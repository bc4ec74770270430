//! Sponsor campaigns.
//!
//! A campaign is a named budget a sponsor sets aside to pay for gasless
//! transfers. The store only tracks who owns which campaign and its reserve;
//! it does not debit the reserve on execution.

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::amount::TokenAmount;
use crate::store::StoreError;

/// A sponsor campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    /// Caller-chosen unique identifier.
    pub id: String,
    /// Sponsor address.
    pub owner: Address,
    /// Budget set aside, in base units.
    pub reserve: TokenAmount,
}

/// Input to [`CampaignStore::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    /// Unique identifier.
    pub id: Option<String>,
    /// Sponsor address.
    pub owner: Option<Address>,
    /// Budget in base units.
    pub reserve: Option<TokenAmount>,
}

impl NewCampaign {
    /// Checks that every field is present and the ID is not blank.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] naming the offending field.
    pub fn validate(self) -> Result<Campaign, StoreError> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| StoreError::Validation("missing required field `id`".into()))?;
        let owner = self
            .owner
            .ok_or_else(|| StoreError::Validation("missing required field `owner`".into()))?;
        let reserve = self
            .reserve
            .ok_or_else(|| StoreError::Validation("missing required field `reserve`".into()))?;
        Ok(Campaign { id, owner, reserve })
    }
}

/// Persistence for campaigns.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Persists a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for missing fields or a duplicate ID.
    async fn create(&self, input: NewCampaign) -> Result<Campaign, StoreError>;

    /// Looks up a campaign by ID.
    async fn find_by_id(&self, id: &str) -> Result<Option<Campaign>, StoreError>;

    /// All campaigns owned by `owner`.
    async fn list_by_owner(&self, owner: Address) -> Result<Vec<Campaign>, StoreError>;
}

/// The error every backend reports for a campaign ID that is already taken.
#[must_use]
pub fn duplicate_campaign(id: &str) -> StoreError {
    StoreError::Validation(format!("campaign `{id}` already exists"))
}
