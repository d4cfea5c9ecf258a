// src/services/reader.rs

//! Full-text extraction through a reader proxy.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::error::{AppError, Result};
use crate::models::ReaderConfig;
use crate::utils::{http, url::reader_url};

/// Fetches the text of a paper given its link.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, link: &str) -> Result<String>;
}

/// Reader proxy that renders a PDF URL as plain text (`{base}/{pdf_url}`).
pub struct JinaReader {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl JinaReader {
    pub fn new(config: &ReaderConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_reader_client(config)?,
            base_url: config.base_url.clone(),
            api_token: config
                .api_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
        })
    }
}

#[async_trait]
impl ContentFetcher for JinaReader {
    async fn fetch(&self, link: &str) -> Result<String> {
        let url = reader_url(&self.base_url, link)?;
        log::debug!("Fetching {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited {
                service: "reader".into(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::status(
                "reader",
                status.as_u16(),
                crate::utils::text::truncate_chars(&body, 200),
            ));
        }

        // Decoding happens while streaming, so any failure here is the
        // connection dropping mid-body.
        response
            .text()
            .await
            .map_err(|e| AppError::transport(format!("reader body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn test_blank_token_is_ignored() {
        let config = ReaderConfig {
            api_token: Some("  ".into()),
            ..ReaderConfig::default()
        };
        let reader = JinaReader::new(&config).unwrap();
        assert!(reader.api_token.is_none());
    }

    /// Serve one response that promises more body than it sends.
    fn truncating_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 1000\r\n\r\npartial",
            );
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_cut_off_body_is_transient() {
        let config = ReaderConfig {
            base_url: truncating_server(),
            timeout_secs: 5,
            ..ReaderConfig::default()
        };
        let reader = JinaReader::new(&config).unwrap();

        let err = reader.fetch("2509.18083").await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }
}
