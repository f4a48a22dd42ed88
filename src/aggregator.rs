use crate::feeds::SeriesSource;
use crate::pnl::combine::{self, CombinedView, EntitySeries};
use crate::pnl::metrics::{self, Metrics};
use crate::pnl::normalize;
use crate::pnl::rollup::{self, EquityPoint, Period, PeriodRollup};
use crate::pnl::Entity;
use chrono::NaiveDate;
use std::sync::Arc;

/// Receives every freshly built view. Registered explicitly by the caller.
pub trait ViewListener: Send + Sync {
    fn on_view(&self, view: &DashboardView);
}

/// An entity whose series could not be fetched. Reported, never folded in as zero P&L.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFailure {
    pub entity_id: String,
    pub entity_name: String,
    pub error: String,
}

/// A better display name discovered on the source page.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameCorrection {
    pub entity_id: String,
    pub name: String,
}

/// Everything the dashboard renders for one selection of entities.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    #[serde(flatten)]
    pub combined: CombinedView,
    pub metrics: Metrics,
    pub equity_curve: Vec<EquityPoint>,
    pub monthly: Vec<PeriodRollup>,
    pub errors: Vec<EntityFailure>,
    pub name_corrections: Vec<NameCorrection>,
    pub skipped_entries: usize,
    pub requested: usize,
    pub loaded: usize,
    pub generated_at: String,
}

/// Result of fanning out fetches for a selection.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub loaded: Vec<EntitySeries>,
    pub failures: Vec<EntityFailure>,
    pub skipped_entries: usize,
}

/// Aggregation context: the fetch collaborator plus the listeners to notify.
pub struct Aggregator {
    source: Arc<dyn SeriesSource>,
    listeners: Vec<Arc<dyn ViewListener>>,
}

impl Aggregator {
    pub fn new(source: Arc<dyn SeriesSource>) -> Self {
        Self {
            source,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ViewListener>) {
        self.listeners.push(listener);
    }

    /// Fetch every entity concurrently and normalize what arrives.
    /// One slow or failing fetch neither blocks nor poisons the others.
    pub async fn fetch_all(&self, entities: &[Entity]) -> FetchOutcome {
        let futures: Vec<_> = entities
            .iter()
            .map(|entity| async move { (entity, self.source.fetch_series(entity).await) })
            .collect();

        let results = futures_util::future::join_all(futures).await;

        let mut outcome = FetchOutcome::default();
        for (entity, result) in results {
            match result {
                Ok(fetched) => {
                    let capital = fetched
                        .capital
                        .filter(|c| c.is_finite() && *c > 0.0)
                        .unwrap_or(entity.capital);
                    let normalized = normalize::normalize(&fetched.daily, capital);
                    if !normalized.skipped.is_empty() {
                        tracing::warn!(
                            entity = %entity.id,
                            skipped = normalized.skipped.len(),
                            "dropped malformed entries"
                        );
                    }
                    outcome.skipped_entries += normalized.skipped.len();
                    outcome.loaded.push(EntitySeries {
                        entity: entity.clone(),
                        series: normalized.series,
                        capital: fetched.capital,
                        fetched_name: fetched.client_name,
                        info: fetched.client_info,
                    });
                }
                Err(e) => {
                    tracing::warn!(entity = %entity.id, error = %e, "series fetch failed");
                    outcome.failures.push(EntityFailure {
                        entity_id: entity.id.clone(),
                        entity_name: entity.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Fetch, combine and analyse a selection. Listeners are not notified.
    /// Partial failures drop the failing entities and list them in `errors`.
    pub async fn load_view(&self, entities: &[Entity], now: NaiveDate) -> DashboardView {
        let outcome = self.fetch_all(entities).await;
        let view = build_view(outcome, entities.len(), now);

        tracing::info!(
            requested = view.requested,
            loaded = view.loaded,
            days = view.combined.daily.len(),
            total_pnl = view.combined.summary.total.pnl,
            "view built"
        );
        view
    }

    /// [`load_view`](Self::load_view), then hand the result to every listener.
    /// Reserved for the shared all-entities view.
    pub async fn publish_view(&self, entities: &[Entity], now: NaiveDate) -> DashboardView {
        let view = self.load_view(entities, now).await;
        for listener in &self.listeners {
            listener.on_view(&view);
        }
        view
    }
}

/// Pure tail of the pipeline: combine, summarize, analyse.
pub fn build_view(outcome: FetchOutcome, requested: usize, now: NaiveDate) -> DashboardView {
    let name_corrections = discovered_names(&outcome.loaded);
    let combined = combine::combine(&outcome.loaded, now);
    let metrics = metrics::compute_metrics(&combined.daily, combined.capital);
    let equity_curve = rollup::equity_curve(&combined.daily, combined.capital);
    let monthly = rollup::rollup(&combined.daily, combined.capital, Period::Monthly);

    DashboardView {
        metrics,
        equity_curve,
        monthly,
        loaded: outcome.loaded.len(),
        errors: outcome.failures,
        name_corrections,
        skipped_entries: outcome.skipped_entries,
        requested,
        generated_at: chrono::Utc::now().to_rfc3339(),
        combined,
    }
}

/// Fetched names that are real (not placeholders) and differ from the registry.
pub fn discovered_names(loaded: &[EntitySeries]) -> Vec<NameCorrection> {
    loaded
        .iter()
        .filter_map(|input| {
            let fetched = input.fetched_name.as_deref()?.trim();
            if fetched.is_empty() || combine::is_placeholder(fetched) || fetched == input.entity.name {
                return None;
            }
            Some(NameCorrection {
                entity_id: input.entity.id.clone(),
                name: fetched.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AggregatorError, AggregatorResult};
    use crate::feeds::FetchedSeries;
    use crate::pnl::{RawAmount, RawEntry};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned rows per entity id; ids absent from the map fail.
    struct StubSource {
        data: HashMap<String, FetchedSeries>,
        delay_ms: HashMap<String, u64>,
    }

    #[async_trait::async_trait]
    impl SeriesSource for StubSource {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn fetch_series(&self, entity: &Entity) -> AggregatorResult<FetchedSeries> {
            if let Some(ms) = self.delay_ms.get(&entity.id) {
                tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
            }
            self.data.get(&entity.id).cloned().ok_or_else(|| AggregatorError::Fetch {
                entity: entity.id.clone(),
                reason: "proxy timeout".into(),
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        views: Mutex<Vec<(usize, usize)>>,
    }

    impl ViewListener for Recorder {
        fn on_view(&self, view: &DashboardView) {
            if let Ok(mut v) = self.views.lock() {
                v.push((view.requested, view.loaded));
            }
        }
    }

    fn rows(days: &[(&str, f64)]) -> Vec<RawEntry> {
        days.iter()
            .map(|&(date, pnl)| RawEntry {
                date: date.into(),
                pnl: Some(RawAmount::Number(pnl)),
                percent: None,
            })
            .collect()
    }

    fn entity(id: &str, name: &str, capital: f64) -> Entity {
        Entity::new(id, name, "", capital).expect("entity")
    }

    fn now() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date")
    }

    fn stub(entries: Vec<(&str, FetchedSeries)>) -> StubSource {
        StubSource {
            data: entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            delay_ms: HashMap::new(),
        }
    }

    fn series(days: &[(&str, f64)]) -> FetchedSeries {
        FetchedSeries {
            daily: rows(days),
            ..FetchedSeries::default()
        }
    }

    #[tokio::test]
    async fn test_combined_view_two_entities() {
        let source = stub(vec![
            ("a", series(&[("2025-01-01", 100000.0)])),
            ("b", series(&[("2025-01-01", 50000.0), ("2025-01-02", 20000.0)])),
        ]);
        let agg = Aggregator::new(Arc::new(source));
        let view = agg
            .load_view(&[entity("a", "A", 10_000_000.0), entity("b", "B", 5_000_000.0)], now())
            .await;

        assert_eq!(view.requested, 2);
        assert_eq!(view.loaded, 2);
        assert!(view.errors.is_empty());
        assert_eq!(view.combined.capital, 15_000_000.0);
        assert_eq!(view.combined.summary.total.pnl, 170000.0);
        assert_eq!(view.combined.summary.mtd.pnl, 170000.0);
        assert_eq!(view.metrics.total_trading_days, 2);
        assert_eq!(view.equity_curve.last().map(|p| p.cumulative_pnl), Some(170000.0));
        assert_eq!(view.monthly.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_reports_dropped_entity() {
        let source = stub(vec![("a", series(&[("2025-01-01", 1000.0)]))]);
        let agg = Aggregator::new(Arc::new(source));
        let view = agg
            .load_view(&[entity("a", "A", 1_000_000.0), entity("b", "RISHU GARG", 2_000_000.0)], now())
            .await;

        assert_eq!(view.requested, 2);
        assert_eq!(view.loaded, 1);
        assert_eq!(view.errors.len(), 1);
        assert_eq!(view.errors[0].entity_id, "b");
        assert_eq!(view.errors[0].entity_name, "RISHU GARG");
        assert!(view.errors[0].error.contains("proxy timeout"));
        // only the loaded entity contributes capital and pnl
        assert_eq!(view.combined.capital, 1_000_000.0);
        assert_eq!(view.combined.summary.total.pnl, 1000.0);
    }

    #[tokio::test]
    async fn test_all_failed_is_well_formed() {
        let agg = Aggregator::new(Arc::new(stub(vec![])));
        let view = agg.load_view(&[entity("a", "A", 1.0)], now()).await;
        assert_eq!(view.loaded, 0);
        assert_eq!(view.errors.len(), 1);
        assert!(view.combined.daily.is_empty());
        assert_eq!(view.metrics, Metrics::default());
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let agg = Aggregator::new(Arc::new(stub(vec![])));
        let view = agg.load_view(&[], now()).await;
        assert_eq!(view.requested, 0);
        assert!(view.errors.is_empty());
        assert_eq!(view.combined.summary, crate::pnl::Summary::default());
    }

    #[tokio::test]
    async fn test_fetches_run_concurrently() {
        let mut source = stub(vec![
            ("a", series(&[("2025-01-01", 1.0)])),
            ("b", series(&[("2025-01-01", 2.0)])),
            ("c", series(&[("2025-01-01", 3.0)])),
        ]);
        for id in ["a", "b", "c"] {
            source.delay_ms.insert(id.to_string(), 200);
        }
        let agg = Aggregator::new(Arc::new(source));
        let started = std::time::Instant::now();
        let outcome = agg
            .fetch_all(&[entity("a", "A", 1.0), entity("b", "B", 1.0), entity("c", "C", 1.0)])
            .await;
        assert_eq!(outcome.loaded.len(), 3);
        assert!(started.elapsed() < std::time::Duration::from_millis(550), "fetches ran sequentially");
    }

    #[tokio::test]
    async fn test_series_capital_used_for_single_entity() {
        let mut fetched = series(&[("2025-01-01", 50000.0), ("2025-01-01", 50000.0), ("garbage", 1.0)]);
        fetched.capital = Some(5_000_000.0);
        fetched.client_name = Some("Client 1".into());
        let agg = Aggregator::new(Arc::new(stub(vec![("a", fetched)])));
        let view = agg.load_view(&[entity("a", "SACHIN GUPTA", 10_000_000.0)], now()).await;

        assert_eq!(view.combined.capital, 5_000_000.0);
        assert_eq!(view.combined.daily.len(), 1);
        assert!((view.combined.daily[0].percent - 2.0).abs() < 1e-9);
        assert_eq!(view.combined.client_name, "SACHIN GUPTA");
        assert_eq!(view.skipped_entries, 1);
        assert!(view.name_corrections.is_empty(), "placeholder names are not corrections");
    }

    #[tokio::test]
    async fn test_name_corrections_and_listeners() {
        let mut fetched = series(&[("2025-01-01", 1.0)]);
        fetched.client_name = Some("SUNKULA PUSHPAVATHI".into());
        let recorder = Arc::new(Recorder::default());
        let mut agg = Aggregator::new(Arc::new(stub(vec![("a", fetched)])));
        agg.add_listener(recorder.clone());

        let quiet = agg.load_view(&[entity("a", "Client 1", 1_000_000.0)], now()).await;
        assert!(recorder.views.lock().expect("lock").is_empty(), "load_view must not notify");

        let view = agg.publish_view(&[entity("a", "Client 1", 1_000_000.0)], now()).await;
        assert_eq!(quiet.combined, view.combined);
        assert_eq!(
            view.name_corrections,
            vec![NameCorrection {
                entity_id: "a".into(),
                name: "SUNKULA PUSHPAVATHI".into()
            }]
        );
        assert_eq!(view.combined.client_name, "SUNKULA PUSHPAVATHI");
        assert_eq!(*recorder.views.lock().expect("lock"), vec![(1, 1)]);
    }

    #[test]
    fn test_view_serializes_flat_combined_fields() {
        let view = build_view(FetchOutcome::default(), 0, now());
        let json = serde_json::to_value(&view).expect("serialize");
        assert!(json.get("clientName").is_some());
        assert!(json.get("summary").is_some());
        assert!(json.get("daily").is_some());
        assert!(json["metrics"].get("maxDrawdown").is_some());
    }
}
