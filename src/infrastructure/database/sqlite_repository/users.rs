use super::SqliteRepository;
use super::mapper::map_user_row;
use super::queries::{SEARCH_USERS, SELECT_USER, UPSERT_USER};
use crate::application::ports::repositories::UserRepository;
use crate::domain::entities::User;
use crate::params;
use crate::shared::error::AppError;
use crate::shared::validation::like_pattern;
use async_trait::async_trait;

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_user(&self, user: &User) -> Result<u64, AppError> {
        self.store
            .exec(
                UPSERT_USER,
                &params![
                    user.address.as_str(),
                    user.display_name.as_deref(),
                    user.avatar_uri.as_deref(),
                    user.bio.as_deref(),
                    user.tickets_owned,
                    user.events_organized,
                    user.last_synced,
                ],
            )
            .await
    }

    async fn get_user(&self, address: &str) -> Result<Option<User>, AppError> {
        let row = self
            .store
            .query_optional(SELECT_USER, &params![address])
            .await?;

        match row {
            Some(row) => Ok(Some(map_user_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<User>, AppError> {
        if query.trim().is_empty() {
            return Ok(vec![]);
        }

        let pattern = like_pattern(query.trim());
        let rows = self
            .store
            .query(
                SEARCH_USERS,
                &params![pattern.as_str(), pattern.as_str(), pattern.as_str(), limit],
            )
            .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(map_user_row(&row)?);
        }
        Ok(users)
    }
}
