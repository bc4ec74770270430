use std::str::FromStr;

use alloy_primitives::Address;
use async_trait::async_trait;
use circlepay::campaign::duplicate_campaign;
use circlepay::{Campaign, CampaignStore, NewCampaign, StoreError};
use rusqlite::{ErrorCode, OptionalExtension, Row, params};

use crate::{SqliteStore, backend};

fn read_campaign(row: &Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_campaign((id, owner, reserve): (String, String, String)) -> Result<Campaign, StoreError> {
    Ok(Campaign {
        id,
        owner: Address::from_str(&owner).map_err(backend)?,
        reserve: reserve.parse().map_err(backend)?,
    })
}

#[async_trait]
impl CampaignStore for SqliteStore {
    async fn create(&self, input: NewCampaign) -> Result<Campaign, StoreError> {
        let campaign = input.validate()?;
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO campaigns (id, owner, reserve) VALUES (?1, ?2, ?3)",
                params![
                    campaign.id,
                    campaign.owner.to_string(),
                    campaign.reserve.to_string()
                ],
            );
            match inserted {
                Ok(_) => Ok(campaign),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(duplicate_campaign(&campaign.id))
                }
                Err(e) => Err(backend(e)),
            }
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Campaign>, StoreError> {
        let id = id.to_owned();
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, owner, reserve FROM campaigns WHERE id = ?1",
                [id],
                read_campaign,
            )
            .optional()
            .map_err(backend)?
            .map(into_campaign)
            .transpose()
        })
        .await
    }

    async fn list_by_owner(&self, owner: Address) -> Result<Vec<Campaign>, StoreError> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare("SELECT id, owner, reserve FROM campaigns WHERE owner = ?1 ORDER BY id")
                .map_err(backend)?;
            let rows = stmt
                .query_map([owner.to_string()], read_campaign)
                .map_err(backend)?;
            rows.map(|row| row.map_err(backend).and_then(into_campaign))
                .collect()
        })
        .await
    }
}
