use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::models::{FeatureRow, ScreenshotRow};

pub struct FeatureQueries;

impl FeatureQueries {
    /// Fetch feature rows, optionally filtered to one game and capped.
    /// `game_id` is compared as text so integer and UUID keys both work.
    #[inline]
    pub async fn fetch(
        pool: &PgPool,
        limit: Option<i64>,
        game_id: Option<&str>,
    ) -> Result<Vec<FeatureRow>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT feature_id, name, description, game_id::text AS game_id, updated_at \
             FROM features_game",
        );

        if let Some(game_id) = game_id {
            query.push(" WHERE game_id::text = ").push_bind(game_id);
        }
        query.push(" ORDER BY feature_id");
        if let Some(limit) = limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows = query
            .build_query_as::<FeatureRow>()
            .fetch_all(pool)
            .await
            .context("Failed to fetch features")?;

        debug!("fetched {} feature rows", rows.len());
        Ok(rows)
    }

    #[inline]
    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM features_game")
            .fetch_one(pool)
            .await
            .context("Failed to count features")?;
        Ok(count.0)
    }
}

pub struct ScreenshotQueries;

impl ScreenshotQueries {
    #[inline]
    pub async fn fetch(
        pool: &PgPool,
        limit: Option<i64>,
        game_id: Option<&str>,
    ) -> Result<Vec<ScreenshotRow>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT screenshot_id, caption, description, elements, \
             game_id::text AS game_id, updated_at \
             FROM screenshots",
        );

        if let Some(game_id) = game_id {
            query.push(" WHERE game_id::text = ").push_bind(game_id);
        }
        query.push(" ORDER BY screenshot_id");
        if let Some(limit) = limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows = query
            .build_query_as::<ScreenshotRow>()
            .fetch_all(pool)
            .await
            .context("Failed to fetch screenshots")?;

        debug!("fetched {} screenshot rows", rows.len());
        Ok(rows)
    }

    #[inline]
    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM screenshots")
            .fetch_one(pool)
            .await
            .context("Failed to count screenshots")?;
        Ok(count.0)
    }
}
