use super::{FetchedSeries, SeriesSource};
use crate::errors::{AggregatorError, AggregatorResult};
use crate::pnl::{Entity, RawEntry};
use std::path::PathBuf;

/// Hand-entered series: `<dir>/<entity id>.json`, either the full proxy
/// shape (`{"daily": [...], "capital": ..., "clientName": ...}`) or a bare
/// array of `{date, pnl}` rows.
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum FileShape {
    Full(FetchedSeries),
    Rows(Vec<RawEntry>),
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl SeriesSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_series(&self, entity: &Entity) -> AggregatorResult<FetchedSeries> {
        if entity.id.contains(['/', '\\']) || entity.id.contains("..") {
            return Err(AggregatorError::Fetch {
                entity: entity.id.clone(),
                reason: "id is not a valid file name".into(),
            });
        }

        let path = self.dir.join(format!("{}.json", entity.id));
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AggregatorError::Fetch {
                    entity: entity.id.clone(),
                    reason: format!("no series file at {}", path.display()),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let shape: FileShape = serde_json::from_str(&body)
            .map_err(|e| AggregatorError::Parse(format!("{}: {e}", path.display())))?;

        Ok(match shape {
            FileShape::Full(series) => series,
            FileShape::Rows(daily) => FetchedSeries {
                daily,
                ..FetchedSeries::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str) -> Entity {
        Entity::new(id, "A", "", 10_000_000.0).expect("entity")
    }

    #[tokio::test]
    async fn test_reads_full_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("client-1.json"),
            r#"{"clientName":"RISHU GARG","capital":5000000,"daily":[{"date":"2025-01-01","pnl":1000}]}"#,
        )
        .expect("write");

        let fetched = FileSource::new(dir.path()).fetch_series(&entity("client-1")).await.expect("fetch");
        assert_eq!(fetched.client_name.as_deref(), Some("RISHU GARG"));
        assert_eq!(fetched.capital, Some(5_000_000.0));
        assert_eq!(fetched.daily.len(), 1);
    }

    #[tokio::test]
    async fn test_reads_bare_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("client-2.json"),
            r#"[{"date":"2025-01-01","pnl":1000},{"date":"02/01/2025","pnl":"-250"}]"#,
        )
        .expect("write");

        let fetched = FileSource::new(dir.path()).fetch_series(&entity("client-2")).await.expect("fetch");
        assert_eq!(fetched.daily.len(), 2);
        assert!(fetched.client_name.is_none());
    }

    #[tokio::test]
    async fn test_bad_rows_survive_for_normalizer() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("client-5.json"),
            r#"{"capital":"₹1,00,00,000","clientName":7,"daily":[
                {"date":null,"pnl":1},
                {"date":"2025-01-01","pnl":2,"percent":"0.5%"},
                {"date":"2025-01-02","pnl":true},
                {"date":"2025-01-03","pnl":3}
            ]}"#,
        )
        .expect("write");

        let fetched = FileSource::new(dir.path()).fetch_series(&entity("client-5")).await.expect("fetch");
        assert_eq!(fetched.daily.len(), 4);
        assert_eq!(fetched.capital, Some(10_000_000.0));
        assert!(fetched.client_name.is_none());

        let normalized = crate::pnl::normalize::normalize(&fetched.daily, 10_000_000.0);
        let days: Vec<f64> = normalized.series.iter().map(|e| e.pnl).collect();
        assert_eq!(days, vec![2.0, 3.0]);
        assert_eq!(normalized.skipped.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FileSource::new(dir.path()).fetch_series(&entity("client-3")).await.unwrap_err();
        assert!(matches!(err, AggregatorError::Fetch { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FileSource::new(dir.path()).fetch_series(&entity("../etc/passwd")).await.unwrap_err();
        assert!(matches!(err, AggregatorError::Fetch { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("client-4.json"), "{ not json").expect("write");
        let err = FileSource::new(dir.path()).fetch_series(&entity("client-4")).await.unwrap_err();
        assert!(matches!(err, AggregatorError::Parse(_)), "{err}");
    }
}
