//! HTTP retrieval of collection pages.

use std::time::Duration;

use versereel_common::{SourceConfig, VersereelError, VersereelResult};
use versereel_project_model::{Collection, CollectionNumber};

use crate::parser::SourceDocumentParser;

/// Fetches and segments collection pages. Requests are never retried.
pub struct CollectionFetcher {
    client: reqwest::Client,
    base_url: String,
    parser: SourceDocumentParser,
}

impl CollectionFetcher {
    pub fn new(config: &SourceConfig) -> VersereelResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| VersereelError::retrieval(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            parser: SourceDocumentParser::new(),
        })
    }

    /// URL of a collection page: the base URL with the number appended.
    pub fn source_url(&self, collection: CollectionNumber) -> String {
        format!("{}{}", self.base_url, collection.get())
    }

    /// Download the raw page markup.
    pub async fn fetch_markup(&self, collection: CollectionNumber) -> VersereelResult<String> {
        let url = self.source_url(collection);
        tracing::info!(collection = collection.get(), url = %url, "Fetching collection page");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/html")
            .send()
            .await
            .map_err(|e| VersereelError::Retrieval {
                message: format!("Failed to fetch collection {}: {e}", collection.get()),
                collection: Some(collection.get()),
                status: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                collection = collection.get(),
                status = status.as_u16(),
                "Upstream returned non-success status"
            );
            return Err(VersereelError::upstream_status(
                collection.get(),
                status.as_u16(),
            ));
        }

        response.text().await.map_err(|e| VersereelError::Retrieval {
            message: format!("Failed to read collection {} body: {e}", collection.get()),
            collection: Some(collection.get()),
            status: Some(status.as_u16()),
        })
    }

    /// Fetch and parse one collection.
    pub async fn fetch(&self, collection: CollectionNumber) -> VersereelResult<Collection> {
        let markup = self.fetch_markup(collection).await?;
        let parsed =
            self.parser
                .parse_collection(collection, &markup, self.source_url(collection));
        tracing::info!(
            collection = parsed.number,
            sentences = parsed.len(),
            "Parsed collection"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return the base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: text/html; charset=utf-8\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/parts.php?part=")
    }

    fn config(base_url: String) -> SourceConfig {
        SourceConfig {
            base_url,
            ..SourceConfig::default()
        }
    }

    #[test]
    fn test_source_url() {
        let fetcher = CollectionFetcher::new(&config("https://example.org/p?part=".into())).unwrap();
        assert_eq!(
            fetcher.source_url(CollectionNumber::new(5).unwrap()),
            "https://example.org/p?part=5"
        );
    }

    #[tokio::test]
    async fn test_upstream_error_carries_status() {
        let base = serve_once("503 Service Unavailable", "down").await;
        let fetcher = CollectionFetcher::new(&config(base)).unwrap();
        let err = fetcher
            .fetch(CollectionNumber::new(2).unwrap())
            .await
            .unwrap_err();
        match err {
            VersereelError::Retrieval {
                collection, status, ..
            } => {
                assert_eq!(collection, Some(2));
                assert_eq!(status, Some(503));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_parses_page() {
        let base = serve_once(
            "200 OK",
            "<html><body><div>1 ▶</div><div>اللهم صل على محمد</div><div>O Allah, bless Muhammad</div></body></html>",
        )
        .await;
        let fetcher = CollectionFetcher::new(&config(base.clone())).unwrap();
        let collection = fetcher.fetch(CollectionNumber::new(1).unwrap()).await.unwrap();
        assert_eq!(collection.number, 1);
        assert_eq!(collection.title, "الحزب 1");
        assert_eq!(collection.source_url, format!("{base}1"));
        assert_eq!(collection.sentences.len(), 1);
        assert_eq!(
            collection.sentences[0].translation.as_deref(),
            Some("O Allah, bless Muhammad")
        );
    }

    #[tokio::test]
    async fn test_connection_failure_has_no_status() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let fetcher =
            CollectionFetcher::new(&config(format!("http://{addr}/?part="))).unwrap();
        let err = fetcher
            .fetch_markup(CollectionNumber::new(1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VersereelError::Retrieval { status: None, .. }
        ));
    }
}
