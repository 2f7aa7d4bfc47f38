//! Archive download for the registry extract.
//!
//! One GET per run, held in memory. Retries are left to whoever triggers the
//! next run.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, info_span, Instrument};

pub const CRATE_NAME: &str = "rnc-fetch";

pub const DEFAULT_SOURCE_URL: &str =
    "https://www.dgii.gov.do/app/WebApps/Consultas/RNC/DGII_RNC.zip";

#[derive(Debug, Clone)]
pub struct FetchedArchive {
    pub final_url: String,
    pub bytes: Vec<u8>,
    pub sha256: String,
}

impl FetchedArchive {
    pub fn new(final_url: impl Into<String>, bytes: Vec<u8>) -> Self {
        let sha256 = sha256_hex(&bytes);
        Self {
            final_url: final_url.into(),
            bytes,
            sha256,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out after {after:?}: {source}")]
    Timeout {
        after: Duration,
        #[source]
        source: reqwest::Error,
    },
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Anything that can hand the pipeline one archive.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    fn location(&self) -> &str;

    async fn fetch(&self) -> Result<FetchedArchive, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            user_agent: None,
        }
    }
}

#[derive(Debug)]
pub struct HttpArchiveFetcher {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpArchiveFetcher {
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            url: url.into(),
            timeout: config.timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                after: self.timeout,
                source: err,
            }
        } else {
            FetchError::Request(err)
        }
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveFetcher {
    fn location(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<FetchedArchive, FetchError> {
        let span = info_span!("archive_fetch", url = %self.url);
        async {
            info!("downloading archive");
            let resp = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(|err| self.classify(err))?;

            let status = resp.status();
            let final_url = resp.url().to_string();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp.bytes().await.map_err(|err| self.classify(err))?;
            let archive = FetchedArchive::new(final_url, body.to_vec());
            info!(
                bytes = archive.byte_size(),
                sha256 = %archive.sha256,
                "archive downloaded"
            );
            Ok(archive)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route("/ok.zip", get(|| async { b"PK-not-really-a-zip".to_vec() }))
            .route(
                "/slow.zip",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    b"late".to_vec()
                }),
            )
            .route("/gone.zip", get(|| async { StatusCode::NOT_FOUND }));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{addr}")
    }

    fn fetcher(url: String, timeout: Duration) -> HttpArchiveFetcher {
        HttpArchiveFetcher::new(
            url,
            HttpClientConfig {
                timeout,
                user_agent: Some("rnc-test".into()),
            },
        )
        .expect("client")
    }

    #[test]
    fn archive_hashing_is_stable() {
        let archive = FetchedArchive::new("http://x", b"hello world".to_vec());
        assert_eq!(
            archive.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(archive.byte_size(), 11);
    }

    #[tokio::test]
    async fn successful_get_returns_body_bytes() {
        let base = spawn_upstream().await;
        let archive = fetcher(format!("{base}/ok.zip"), Duration::from_secs(5))
            .fetch()
            .await
            .expect("fetch");
        assert_eq!(archive.bytes, b"PK-not-really-a-zip");
        assert!(archive.final_url.ends_with("/ok.zip"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let base = spawn_upstream().await;
        let err = fetcher(format!("{base}/gone.zip"), Duration::from_secs(5))
            .fetch()
            .await
            .expect_err("404 upstream");
        match err {
            FetchError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let base = spawn_upstream().await;
        let err = fetcher(format!("{base}/slow.zip"), Duration::from_millis(200))
            .fetch()
            .await
            .expect_err("slow upstream");
        match err {
            FetchError::Timeout { after, source } => {
                assert_eq!(after, Duration::from_millis(200));
                assert!(source.is_timeout());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_a_request_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr")
        };
        let err = fetcher(format!("http://{addr}/DGII_RNC.zip"), Duration::from_secs(5))
            .fetch()
            .await
            .expect_err("nothing is listening");
        match err {
            FetchError::Request(source) => assert!(source.is_connect(), "got {source:?}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
