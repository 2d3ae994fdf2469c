use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::sync::SourceReader;

pub mod models;
pub mod queries;

pub use models::{FeatureRow, RecordKind, ScreenshotRow, SourceRecord};

use queries::{FeatureQueries, ScreenshotQueries};

/// Read-only handle on the PostgreSQL source of truth. The sync pipeline
/// never writes here.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[inline]
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to source database")?;

        info!("Connected to source database");
        Ok(Self { pool })
    }

    #[inline]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[inline]
    pub async fn fetch_features(
        &self,
        limit: Option<i64>,
        game_id: Option<&str>,
    ) -> Result<Vec<SourceRecord>> {
        let rows = FeatureQueries::fetch(&self.pool, limit, game_id).await?;
        Ok(rows.into_iter().map(FeatureRow::into_record).collect())
    }

    #[inline]
    pub async fn fetch_screenshots(
        &self,
        limit: Option<i64>,
        game_id: Option<&str>,
    ) -> Result<Vec<SourceRecord>> {
        let rows = ScreenshotQueries::fetch(&self.pool, limit, game_id).await?;
        Ok(rows.into_iter().map(ScreenshotRow::into_record).collect())
    }

    #[inline]
    pub async fn count_rows(&self, kind: RecordKind) -> Result<i64> {
        match kind {
            RecordKind::Feature => FeatureQueries::count(&self.pool).await,
            RecordKind::Screenshot => ScreenshotQueries::count(&self.pool).await,
        }
    }
}

#[async_trait]
impl SourceReader for Database {
    async fn fetch(
        &self,
        kind: RecordKind,
        limit: Option<i64>,
        game_id: Option<&str>,
    ) -> Result<Vec<SourceRecord>> {
        match kind {
            RecordKind::Feature => self.fetch_features(limit, game_id).await,
            RecordKind::Screenshot => self.fetch_screenshots(limit, game_id).await,
        }
    }
}
