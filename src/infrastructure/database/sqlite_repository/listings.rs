use super::SqliteRepository;
use super::mapper::map_listing_row;
use super::queries::{DEACTIVATE_ALL_LISTINGS, SELECT_LISTINGS_BASE, UPSERT_LISTING};
use crate::application::ports::repositories::ListingRepository;
use crate::domain::entities::{ListingFilter, MarketplaceListing};
use crate::infrastructure::database::{SqlValue, Statement};
use crate::params;
use crate::shared::error::AppError;
use crate::shared::validation::clamp_limit;
use async_trait::async_trait;

fn upsert_statement(listing: &MarketplaceListing) -> Statement {
    (
        UPSERT_LISTING.to_string(),
        params![
            listing.listing_id,
            listing.contract_address.as_str(),
            listing.token_id.as_str(),
            listing.event_id,
            listing.seller.as_str(),
            listing.price.as_str(),
            listing.is_active,
            listing.listed_at,
            listing.last_synced,
        ],
    )
}

fn build_list_query(filter: &ListingFilter) -> Result<(String, Vec<SqlValue>), AppError> {
    let mut sql = String::from(SELECT_LISTINGS_BASE);
    let mut params: Vec<SqlValue> = Vec::new();

    if !filter.include_inactive.unwrap_or(false) {
        sql.push_str(" AND is_active = 1");
    }
    if let Some(event_id) = filter.event_id {
        sql.push_str(" AND event_id = ?");
        params.push(event_id.into());
    }
    if let Some(seller) = &filter.seller {
        sql.push_str(" AND seller = ?");
        params.push(seller.to_ascii_lowercase().into());
    }

    sql.push_str(" ORDER BY listed_at DESC, listing_id DESC LIMIT ? OFFSET ?");
    params.push(clamp_limit(filter.limit)?.into());
    params.push(filter.offset.unwrap_or(0).into());

    Ok((sql, params))
}

#[async_trait]
impl ListingRepository for SqliteRepository {
    async fn upsert_listings(&self, listings: &[MarketplaceListing]) -> Result<u64, AppError> {
        let statements: Vec<Statement> = listings.iter().map(upsert_statement).collect();
        self.store.exec_batch(&statements).await
    }

    async fn list_listings(
        &self,
        filter: &ListingFilter,
    ) -> Result<Vec<MarketplaceListing>, AppError> {
        let (sql, params) = build_list_query(filter)?;
        let rows = self.store.query(&sql, &params).await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            listings.push(map_listing_row(&row)?);
        }
        Ok(listings)
    }

    async fn deactivate_missing(
        &self,
        active_ids: &[u64],
        synced_at: i64,
    ) -> Result<u64, AppError> {
        let mut sql = DEACTIVATE_ALL_LISTINGS.trim_end().to_string();
        let mut params = params![synced_at];
        if !active_ids.is_empty() {
            let placeholders = vec!["?"; active_ids.len()].join(", ");
            sql.push_str(&format!(" AND listing_id NOT IN ({placeholders})"));
            params.extend(active_ids.iter().map(|id| SqlValue::from(*id)));
        }
        self.store.exec(&sql, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{listing, repository};
    use super::*;

    #[tokio::test]
    async fn deactivate_missing_only_touches_absent_listings() {
        let repo = repository().await;
        repo.upsert_listings(&[listing(1, 7, 100), listing(2, 7, 200), listing(3, 8, 300)])
            .await
            .unwrap();

        let deactivated = repo.deactivate_missing(&[2], 999).await.unwrap();
        assert_eq!(deactivated, 2);

        let active = repo.list_listings(&ListingFilter::default()).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].listing_id, 2);

        let all = repo
            .list_listings(&ListingFilter {
                include_inactive: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().filter(|l| !l.is_active).all(|l| l.last_synced == 999));
    }

    #[tokio::test]
    async fn list_filters_by_event_newest_first() {
        let repo = repository().await;
        repo.upsert_listings(&[listing(1, 7, 100), listing(2, 7, 200), listing(3, 8, 300)])
            .await
            .unwrap();

        let for_event: Vec<u64> = repo
            .list_listings(&ListingFilter {
                event_id: Some(7),
                ..Default::default()
            })
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.listing_id)
            .collect();
        assert_eq!(for_event, vec![2, 1]);
    }
}
