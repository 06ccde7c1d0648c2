//! Per-ring-kind fetch-and-install logic (spec.md §4.4 steps 1-3).

use std::time::Duration;

use reqwest::header;
use reqwest::StatusCode;
use ring_model::RingKind;
use tracing::{info, warn};

use crate::artifact::{digest, write_bytes, ArtifactStore};
use crate::builder::RingValidator;
use crate::error::{Result, RingError};
use crate::minion::config::MinionConfig;

/// What happened when the minion checked one ring kind this cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// `304 Not Modified`: local copy is current.
    Unchanged,
    /// Fetched, verified, and installed a new ring.
    Installed { digest: String },
}

/// Fetches and, if changed and valid, installs the ring for `kind`.
///
/// On any failure (network error, non-200/304 status, missing Etag, digest
/// mismatch, failed validation) the live file is left untouched, the temp
/// file is removed, and the error is returned for the caller to log — this
/// never panics and never leaves a partial file in place (spec.md §4.4 step 3).
pub async fn fetch_and_install(
    client: &reqwest::Client,
    config: &MinionConfig,
    store: &ArtifactStore,
    validator: &dyn RingValidator,
    kind: RingKind,
    cached_digest: Option<&str>,
) -> Result<FetchOutcome> {
    let url = config.ring_url(kind);
    let mut request = client
        .get(&url)
        .timeout(Duration::from_secs(config.ring_master_timeout));
    if let Some(etag) = cached_digest {
        request = request.header(header::IF_NONE_MATCH, etag);
    }

    let response = request.send().await?;

    if response.status() == StatusCode::NOT_MODIFIED {
        return Ok(FetchOutcome::Unchanged);
    }
    if response.status() != StatusCode::OK {
        return Err(RingError::Other(format!(
            "{kind}: unexpected status {} fetching {url}",
            response.status()
        )));
    }

    let advertised_digest = response
        .headers()
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| RingError::Other(format!("{kind}: response missing Etag")))?;

    let body = response.bytes().await?;
    let dest_path = config.ring_path(kind);

    store.publish_atomic(
        &dest_path,
        |temp_path| {
            write_bytes(temp_path, &body)?;
            let actual = digest(temp_path)?;
            if actual != advertised_digest {
                return Err(RingError::DigestMismatch {
                    expected: advertised_digest.clone(),
                    actual,
                });
            }
            if !validator.validate(temp_path) {
                return Err(RingError::RingValidationFailed(temp_path.to_path_buf()));
            }
            Ok(())
        },
        0o644,
    )?;

    info!(%kind, digest = %advertised_digest, "installed updated ring");
    Ok(FetchOutcome::Installed {
        digest: advertised_digest,
    })
}

/// Uniformly random startup jitter in `[0, start_delay_range)` seconds
/// (spec.md §4.4 step 5), to avoid a thundering herd of minions all polling
/// the master at the same instant after a fleet-wide restart.
pub fn startup_jitter(start_delay_range: u64) -> Duration {
    if start_delay_range == 0 {
        return Duration::ZERO;
    }
    let secs = rand::random::<u64>() % start_delay_range;
    Duration::from_secs(secs)
}

pub fn log_failure(kind: RingKind, err: &RingError) {
    warn!(%kind, error = %err, "ring fetch/install failed, retrying next cycle");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::fixture::FixtureValidator;
    use axum::http::{HeaderValue, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;

    async fn spawn_test_server(
        body: &'static [u8],
        etag: &'static str,
    ) -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new().route(
            "/ring/account.ring.gz",
            get(move |headers: axum::http::HeaderMap| async move {
                if let Some(inm) = headers.get(axum::http::header::IF_NONE_MATCH) {
                    if inm == HeaderValue::from_static(etag) {
                        return AxumStatus::NOT_MODIFIED.into_response();
                    }
                }
                (
                    AxumStatus::OK,
                    [
                        (axum::http::header::CONTENT_TYPE, "application/octet-stream"),
                        (axum::http::header::ETAG, etag),
                    ],
                    body,
                )
                    .into_response()
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/"), handle)
    }

    #[tokio::test]
    async fn installs_new_ring_and_then_reports_unchanged() {
        let (base_url, _server) = spawn_test_server(b"ring-bytes", "abc123").await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = MinionConfig::default();
        config.swiftdir = dir.path().to_path_buf();
        config.ring_master = base_url;
        let store = ArtifactStore::new(dir.path().join("backups"));
        let client = reqwest::Client::new();

        let outcome = fetch_and_install(
            &client,
            &config,
            &store,
            &FixtureValidator,
            RingKind::Account,
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::Installed {
                digest: "abc123".into()
            }
        );

        let outcome2 = fetch_and_install(
            &client,
            &config,
            &store,
            &FixtureValidator,
            RingKind::Account,
            Some("abc123"),
        )
        .await
        .unwrap();
        assert_eq!(outcome2, FetchOutcome::Unchanged);
    }

    #[tokio::test]
    async fn digest_mismatch_leaves_live_file_untouched() {
        let (base_url, _server) = spawn_test_server(b"ring-bytes", "wrong-etag").await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("account.ring.gz"), b"previous-good-ring").unwrap();
        let mut config = MinionConfig::default();
        config.swiftdir = dir.path().to_path_buf();
        config.ring_master = base_url;
        let store = ArtifactStore::new(dir.path().join("backups"));
        let client = reqwest::Client::new();

        let err = fetch_and_install(
            &client,
            &config,
            &store,
            &FixtureValidator,
            RingKind::Account,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RingError::DigestMismatch { .. }));
        assert_eq!(
            std::fs::read(dir.path().join("account.ring.gz")).unwrap(),
            b"previous-good-ring"
        );
    }
}
