use super::{FetchedSeries, SeriesSource};
use crate::db::{self, DbPool};
use crate::errors::AggregatorResult;
use crate::pnl::Entity;

/// Serves fresh cached series from SQLite and falls through to the inner
/// source otherwise. Each fetch replaces the cached payload wholesale.
/// A failed fetch is surfaced even when a stale row exists.
pub struct CachedSource<S> {
    inner: S,
    db: DbPool,
    ttl_secs: i64,
}

impl<S: SeriesSource> CachedSource<S> {
    pub fn new(inner: S, db: DbPool, ttl_secs: i64) -> Self {
        Self { inner, db, ttl_secs }
    }

    fn fresh(&self, entity_id: &str, now: i64) -> AggregatorResult<Option<FetchedSeries>> {
        let Some(cached) = db::get_cached_series(&self.db, entity_id)? else {
            return Ok(None);
        };
        if now - cached.fetched_at >= self.ttl_secs {
            return Ok(None);
        }
        match serde_json::from_str(&cached.payload) {
            Ok(series) => Ok(Some(series)),
            Err(e) => {
                tracing::warn!(entity = %entity_id, error = %e, "discarding unreadable cache row");
                Ok(None)
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: SeriesSource> SeriesSource for CachedSource<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_series(&self, entity: &Entity) -> AggregatorResult<FetchedSeries> {
        let now = chrono::Utc::now().timestamp();

        if let Some(series) = self.fresh(&entity.id, now)? {
            tracing::debug!(entity = %entity.id, "serving cached series");
            return Ok(series);
        }

        let series = self.inner.fetch_series(entity).await?;
        let payload = serde_json::to_string(&series)?;
        db::put_cached_series(&self.db, &entity.id, &payload, now)?;
        tracing::info!(
            entity = %entity.id,
            source = self.inner.name(),
            days = series.daily.len(),
            "series fetched and cached"
        );
        Ok(series)
    }
}
