// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::time::Duration;

use async_trait::async_trait;

use super::{Error, Notification, Notifier};

/// Posts notifications as JSON, once, without retry.
#[derive(Debug, Clone)]
pub struct Webhook {
    client: reqwest::Client,
    /// Header name and shared secret
    secret: Option<(String, String)>,
}

impl Webhook {
    pub fn new(timeout: Duration, header: &str, secret: Option<&str>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self {
            client,
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| (header.to_string(), s.to_string())),
        })
    }

    pub fn from_config(config: &crate::config::Notification) -> Result<Self, Error> {
        Self::new(config.timeout, &config.header, config.secret.as_deref())
    }
}

#[async_trait]
impl Notifier for Webhook {
    async fn notify(&self, url: &str, notification: &Notification) -> Result<(), Error> {
        let mut request = self.client.post(url).json(notification);
        if let Some((header, secret)) = &self.secret {
            request = request.header(header.as_str(), secret.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }
        tracing::debug!(url, status = status.as_u16(), "notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;
    use crate::{
        models::Summary,
        notification::{ScannerType, Success},
    };

    /// Accepts one request, answers with `status` and returns head and body.
    async fn receive_one(listener: TcpListener, status: u16) -> (String, String) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        let (head_end, content_length) = loop {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before request was complete");
            data.extend_from_slice(&buf[..n]);
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..pos]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                break (pos + 4, length);
            }
        };
        while data.len() < head_end + content_length {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0);
            data.extend_from_slice(&buf[..n]);
        }
        let response =
            format!("HTTP/1.1 {status} X\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        stream.write_all(response.as_bytes()).await.unwrap();
        let head = String::from_utf8_lossy(&data[..head_end]).to_lowercase();
        let body = String::from_utf8_lossy(&data[head_end..]).to_string();
        (head, body)
    }

    fn notification() -> Notification {
        Notification::Success(Success::new(
            "scan-1",
            "user-1",
            ScannerType::Hybrid,
            Summary::default(),
        ))
    }

    #[tokio::test]
    async fn posts_json_with_secret() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let server = tokio::spawn(receive_one(listener, 200));
        let webhook =
            Webhook::new(Duration::from_secs(5), "x-webhook-secret", Some("s3cret")).unwrap();
        webhook.notify(&url, &notification()).await.unwrap();
        let (head, body) = server.await.unwrap();
        assert!(head.starts_with("post /hook"));
        assert!(head.contains("x-webhook-secret: s3cret"));
        assert!(head.contains("content-type: application/json"));
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["scanId"], "scan-1");
    }

    #[tokio::test]
    async fn no_secret_no_header() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let server = tokio::spawn(receive_one(listener, 204));
        let webhook = Webhook::new(Duration::from_secs(5), "x-webhook-secret", None).unwrap();
        webhook.notify(&url, &notification()).await.unwrap();
        let (head, _) = server.await.unwrap();
        assert!(!head.contains("x-webhook-secret"));
    }

    #[tokio::test]
    async fn error_status_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let server = tokio::spawn(receive_one(listener, 500));
        let webhook = Webhook::new(Duration::from_secs(5), "x-webhook-secret", None).unwrap();
        assert_eq!(
            webhook.notify(&url, &notification()).await,
            Err(Error::Status(500))
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn silent_callback_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(stream);
        });
        let webhook = Webhook::new(Duration::from_millis(100), "x-webhook-secret", None).unwrap();
        assert!(matches!(
            webhook.notify(&url, &notification()).await,
            Err(Error::Transport(_))
        ));
        server.abort();
    }
}
