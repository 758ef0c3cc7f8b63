//! Catalog loading: one fetch of the track list, then one duration probe per
//! track, joined before the catalog is published.
//!
//! ```text
//!   fetch_records ──► decode_records ──► probe_durations (JoinSet, 1 task/track)
//!        │ retry on transport/5xx              │ optional per-probe timeout
//!        ▼                                     ▼
//!   CatalogStatus::Failed              CatalogStatus::Ready { tracks, dropped }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::CatalogConfig;
use crate::track::{decode_records, Catalog, Track, TrackRecord};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog endpoint answered HTTP {0}")]
    Status(u16),
    #[error("catalog body is malformed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CatalogError {
    /// Transport failures and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Transport(_) => true,
            CatalogError::Status(code) => *code >= 500,
            CatalogError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe tool unavailable: {0}")]
    Unavailable(String),
    #[error("probe failed: {0}")]
    Failed(String),
    #[error("source reported no usable duration")]
    InvalidDuration,
    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),
}

/// Resolves the playable length of an audio source, in seconds.
pub trait DurationProbe: Send + Sync + 'static {
    fn probe(&self, source: &str) -> impl Future<Output = Result<f64, ProbeError>> + Send;
}

/// Observable state of the catalog.
#[derive(Debug, Clone, Default)]
pub enum CatalogStatus {
    #[default]
    Loading,
    /// `dropped` counts tracks whose probe failed or timed out.
    Ready { tracks: Catalog, dropped: usize },
    Failed(String),
}

impl CatalogStatus {
    /// Tracks when ready, otherwise an empty slice.
    pub fn tracks(&self) -> &[Track] {
        match self {
            CatalogStatus::Ready { tracks, .. } => tracks,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, CatalogStatus::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CatalogStatus::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

pub struct CatalogStore<P> {
    client: reqwest::Client,
    config: CatalogConfig,
    probe: Arc<P>,
}

impl<P: DurationProbe> CatalogStore<P> {
    pub fn new(config: CatalogConfig, probe: P) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            config,
            probe: Arc::new(probe),
        })
    }

    /// Fetch, validate, and probe. Never fails: errors land in `Failed`.
    pub async fn load(&self) -> CatalogStatus {
        match self.try_load().await {
            Ok((tracks, dropped)) => {
                info!(
                    "catalog: loaded {} tracks ({} dropped)",
                    tracks.len(),
                    dropped
                );
                CatalogStatus::Ready { tracks, dropped }
            }
            Err(e) => {
                warn!("catalog: load failed: {}", e);
                CatalogStatus::Failed(e.to_string())
            }
        }
    }

    pub async fn try_load(&self) -> Result<(Catalog, usize), CatalogError> {
        info!("catalog: fetching {}", self.config.endpoint);
        let records = fetch_records(
            &self.client,
            &self.config.endpoint,
            self.config.fetch_retries,
            self.config.retry_backoff(),
        )
        .await?;
        debug!("catalog: {} valid records, probing durations", records.len());

        let (tracks, dropped) = probe_durations(
            records,
            Arc::clone(&self.probe),
            &self.config.asset_base,
            self.config.probe_timeout(),
        )
        .await;
        Ok((tracks.into(), dropped))
    }
}

/// GET the track list. Only HTTP 200 is success.
///
/// Retryable failures are attempted again up to `retries` times, sleeping
/// `backoff * attempt` in between.
pub async fn fetch_records(
    client: &reqwest::Client,
    endpoint: &str,
    retries: u32,
    backoff: Duration,
) -> Result<Vec<TrackRecord>, CatalogError> {
    let mut attempt = 0u32;
    loop {
        match fetch_once(client, endpoint).await {
            Ok(records) => return Ok(records),
            Err(e) if attempt < retries && e.is_retryable() => {
                attempt += 1;
                warn!(
                    "catalog: attempt {}/{} failed: {}",
                    attempt,
                    retries + 1,
                    e
                );
                tokio::time::sleep(backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(
    client: &reqwest::Client,
    endpoint: &str,
) -> Result<Vec<TrackRecord>, CatalogError> {
    let response = client.get(endpoint).send().await?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(CatalogError::Status(status.as_u16()));
    }
    let body = response.bytes().await?;
    Ok(decode_records(&body)?)
}

/// Probe every record concurrently and join on all of them.
///
/// Output keeps server order. A record whose probe errors, times out, or
/// yields a non-finite/negative length is left out and counted in the
/// returned drop count.
pub async fn probe_durations<P: DurationProbe>(
    records: Vec<TrackRecord>,
    probe: Arc<P>,
    asset_base: &str,
    timeout: Option<Duration>,
) -> (Vec<Track>, usize) {
    let mut set = JoinSet::new();
    for (idx, record) in records.iter().enumerate() {
        let probe = Arc::clone(&probe);
        let source = record.url.clone();
        set.spawn(async move {
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, probe.probe(&source))
                    .await
                    .unwrap_or(Err(ProbeError::TimedOut(limit))),
                None => probe.probe(&source).await,
            };
            (idx, result)
        });
    }

    let mut durations: Vec<Option<f64>> = vec![None; records.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, Ok(secs))) if secs.is_finite() && secs >= 0.0 => {
                durations[idx] = Some(secs);
            }
            Ok((idx, Ok(secs))) => {
                warn!("catalog: probe for {} returned {}", records[idx].url, secs);
            }
            Ok((idx, Err(e))) => {
                warn!("catalog: probe for {} failed: {}", records[idx].url, e);
            }
            Err(e) => warn!("catalog: probe task aborted: {}", e),
        }
    }

    let total = records.len();
    let tracks: Vec<Track> = records
        .into_iter()
        .zip(durations)
        .filter_map(|(record, secs)| secs.map(|s| Track::new(record, asset_base, s)))
        .collect();
    let dropped = total - tracks.len();
    (tracks, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TableProbe(HashMap<&'static str, f64>);

    impl DurationProbe for TableProbe {
        async fn probe(&self, source: &str) -> Result<f64, ProbeError> {
            match self.0.get(source) {
                Some(secs) => Ok(*secs),
                None => std::future::pending().await,
            }
        }
    }

    fn record(id: u64, url: &str) -> TrackRecord {
        TrackRecord {
            id,
            name: Some(format!("track {}", id)),
            artist: Some("artist".into()),
            cover: Some(format!("cover{}", id)),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_probe_keeps_server_order() {
        let probe = Arc::new(TableProbe(HashMap::from([
            ("a", 200.0),
            ("b", 5.5),
            ("c", 61.0),
        ])));
        let records = vec![record(3, "a"), record(1, "b"), record(2, "c")];
        let (tracks, dropped) = probe_durations(records, probe, "base/", None).await;
        assert_eq!(dropped, 0);
        let ids: Vec<u64> = tracks.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        let durations: Vec<&str> = tracks.iter().map(|t| t.duration.as_str()).collect();
        assert_eq!(durations, vec!["3:20", "0:05", "1:01"]);
        assert_eq!(tracks[0].cover_url, "base/cover3");
    }

    #[tokio::test]
    async fn test_stalled_probe_is_dropped_after_timeout() {
        let probe = Arc::new(TableProbe(HashMap::from([("a", 10.0), ("c", 30.0)])));
        let records = vec![record(1, "a"), record(2, "stalls"), record(3, "c")];
        let (tracks, dropped) =
            probe_durations(records, probe, "", Some(Duration::from_millis(50))).await;
        assert_eq!(dropped, 1);
        let ids: Vec<u64> = tracks.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_unusable_duration_is_dropped() {
        let probe = Arc::new(TableProbe(HashMap::from([
            ("live", f64::INFINITY),
            ("ok", 42.0),
        ])));
        let records = vec![record(1, "live"), record(2, "ok")];
        let (tracks, dropped) = probe_durations(records, probe, "", None).await;
        assert_eq!(dropped, 1);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].duration, "0:42");
    }

    #[tokio::test]
    async fn test_empty_record_list() {
        let probe = Arc::new(TableProbe(HashMap::new()));
        let (tracks, dropped) = probe_durations(Vec::new(), probe, "", None).await;
        assert!(tracks.is_empty());
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(CatalogError::Status(503).is_retryable());
        assert!(!CatalogError::Status(404).is_retryable());
        let decode = serde_json::from_str::<u8>("x").unwrap_err();
        assert!(!CatalogError::Decode(decode).is_retryable());
    }

    #[test]
    fn test_status_accessors() {
        assert!(CatalogStatus::default().is_loading());
        assert!(CatalogStatus::Loading.tracks().is_empty());
        let failed = CatalogStatus::Failed("HTTP 404".into());
        assert_eq!(failed.error(), Some("HTTP 404"));
        assert!(failed.tracks().is_empty());
    }
}
