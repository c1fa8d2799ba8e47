use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode, Url};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

pub const TRANSLATION_HOST: &str = "https://traduction.circuspes.fr";

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const PROGRESS_TICK: Duration = Duration::from_millis(200);

/// Receives `(received, total)` while a download runs.
pub type ProgressFn = dyn Fn(u64, Option<u64>) + Send + Sync;

/// Where translation metadata and files come from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Base URL routes are resolved against.
    fn host(&self) -> &str;

    /// Body of `route` on HTTP 200, `None` on anything else.
    async fn get(&self, route: &str) -> Option<String>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path, progress: &ProgressFn)
    -> Result<u64, String>;

    fn absolute_url(&self, route: &str) -> String {
        format!("{}{}", self.host().trim_end_matches('/'), normalize_route(route))
    }
}

#[derive(Clone)]
pub struct RemoteContentClient {
    client: Client,
    download_client: Client,
    host: String,
}

impl RemoteContentClient {
    pub fn new() -> Self {
        Self::with_host(TRANSLATION_HOST)
    }

    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            client: build_client(QUERY_TIMEOUT),
            download_client: build_client(DOWNLOAD_TIMEOUT),
            host: host.into(),
        }
    }
}

impl Default for RemoteContentClient {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|err| {
            warn!("network client: falling back to default HTTP client configuration ({err})");
            Client::new()
        })
}

pub fn user_agent() -> String {
    format!("StarTrad/{}", env!("CARGO_PKG_VERSION"))
}

pub fn normalize_route(route: &str) -> String {
    if route.starts_with('/') {
        route.to_owned()
    } else {
        format!("/{route}")
    }
}

#[async_trait]
impl ContentSource for RemoteContentClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn get(&self, route: &str) -> Option<String> {
        let url = match Url::parse(&self.absolute_url(route)) {
            Ok(url) => url,
            Err(err) => {
                debug!("network client: invalid route {route}: {err}");
                return None;
            }
        };

        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, user_agent())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!("network client: GET {route} failed: {err}");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            debug!(
                "network client: GET {route} returned {}",
                response.status()
            );
            return None;
        }

        response.text().await.ok()
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: &ProgressFn,
    ) -> Result<u64, String> {
        let response = self
            .download_client
            .get(url)
            .header(USER_AGENT, user_agent())
            .send()
            .await
            .map_err(|e| format!("download request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("download status error: {e}"))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create download dir: {e}"))?;
        }
        let mut file = File::create(dest)
            .await
            .map_err(|e| format!("failed to create file: {e}"))?;

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_tick = Instant::now();

        progress(0, total);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("stream error: {e}"))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("write error: {e}"))?;
            downloaded += chunk.len() as u64;

            if last_tick.elapsed() > PROGRESS_TICK {
                progress(downloaded, total);
                last_tick = Instant::now();
            }
        }

        file.flush()
            .await
            .map_err(|e| format!("flush error: {e}"))?;
        progress(downloaded, total);

        if let Some(total) = total
            && downloaded < total
        {
            return Err(format!(
                "download incomplete: received {downloaded} of {total} bytes"
            ));
        }

        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_gain_a_leading_slash() {
        assert_eq!(normalize_route("download/version.html"), "/download/version.html");
        assert_eq!(normalize_route("/download/global.ini"), "/download/global.ini");
    }

    #[test]
    fn absolute_urls_join_host_and_route() {
        let client = RemoteContentClient::with_host("https://example.test/");
        assert_eq!(
            client.absolute_url("download/global.ini"),
            "https://example.test/download/global.ini"
        );
    }

    #[test]
    fn user_agent_names_the_product() {
        assert!(user_agent().starts_with("StarTrad/"));
    }

    #[tokio::test]
    async fn malformed_host_yields_none() {
        let client = RemoteContentClient::with_host("not a url");
        assert!(client.get("/download/version.html").await.is_none());
    }
}
