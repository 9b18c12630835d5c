// ISAPI HTTP client for a single camera

use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::{CameraConfig, Credentials};
use crate::device_manager::digest_auth::{self, DigestChallenge};

pub const ALERT_STREAM_PATH: &str = "/ISAPI/Event/notification/alertStream";
pub const DEVICE_INFO_PATH: &str = "/ISAPI/System/deviceInfo";
pub const SNAPSHOT_PATH: &str = "/ISAPI/Streaming/channels/1/picture";

/// Transport faults talking to a camera
#[derive(Debug, Error)]
pub enum IsapiError {
    #[error("connection refused by {0}")]
    Refused(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("authentication rejected by {0}")]
    Unauthorized(String),

    #[error("unusable digest challenge from {0}")]
    Challenge(String),

    #[error("invalid camera URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("stream closed by camera")]
    Closed,

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for IsapiError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_timeout() {
            IsapiError::Timeout(url)
        } else if err.is_connect() {
            IsapiError::Refused(url)
        } else {
            IsapiError::Http(err)
        }
    }
}

impl From<IsapiError> for crate::error::Error {
    fn from(err: IsapiError) -> Self {
        crate::error::Error::Transport(err.to_string())
    }
}

pub struct IsapiClient {
    camera_id: String,
    base: Url,
    credentials: Option<Credentials>,
    http: reqwest::Client,
}

impl IsapiClient {
    pub fn new(camera: &CameraConfig, connect_timeout: Duration) -> Result<Self, IsapiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            camera_id: camera.id.clone(),
            base: Url::parse(&camera.base_url())?,
            credentials: camera.credentials(),
            http,
        })
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// GET `path`, answering one digest challenge when credentials are configured.
    /// `timeout` bounds the time until response headers arrive; the body is not covered.
    async fn get(&self, path: &str, timeout: Duration) -> Result<Response, IsapiError> {
        let url = self.base.join(path)?;
        let uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        let response = self.send(self.http.get(url.clone()), &url, timeout).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check(response, &url);
        }

        let Some(credentials) = &self.credentials else {
            return Err(IsapiError::Unauthorized(url.to_string()));
        };
        let challenge = response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(DigestChallenge::parse)
            .ok_or_else(|| IsapiError::Challenge(url.to_string()))?;

        debug!("[{}] Answering digest challenge for realm {}", self.camera_id, challenge.realm);
        let authorization =
            challenge.authorization(credentials, "GET", &uri, 1, &digest_auth::cnonce());
        let response = self
            .send(
                self.http.get(url.clone()).header(AUTHORIZATION, authorization),
                &url,
                timeout,
            )
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(IsapiError::Unauthorized(url.to_string()));
        }
        Self::check(response, &url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
        timeout: Duration,
    ) -> Result<Response, IsapiError> {
        match tokio::time::timeout(timeout, request.send()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(IsapiError::Timeout(url.to_string())),
        }
    }

    fn check(response: Response, url: &Url) -> Result<Response, IsapiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(IsapiError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            })
        }
    }

    /// Open the long-lived alert stream. The returned body is read without a timeout.
    pub async fn open_alert_stream(
        &self,
        path: &str,
        connect_timeout: Duration,
    ) -> Result<Response, IsapiError> {
        self.get(path, connect_timeout).await
    }

    /// Download the current JPEG from channel 1
    pub async fn fetch_snapshot(&self, timeout: Duration) -> Result<Vec<u8>, IsapiError> {
        let response = self.get(SNAPSHOT_PATH, timeout).await?;
        let bytes = match tokio::time::timeout(timeout, response.bytes()).await {
            Ok(bytes) => bytes?,
            Err(_) => return Err(IsapiError::Timeout(SNAPSHOT_PATH.to_string())),
        };
        if bytes.is_empty() {
            warn!("[{}] Camera returned an empty snapshot", self.camera_id);
        }
        Ok(bytes.to_vec())
    }

    /// Reachability check against the device info endpoint
    pub async fn probe_device_info(&self, timeout: Duration) -> Result<(), IsapiError> {
        self.get(DEVICE_INFO_PATH, timeout).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_head(socket: &mut TcpStream) -> Result<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        Ok(String::from_utf8_lossy(&buf).to_string())
    }

    /// Camera that challenges unauthenticated requests and serves a picture otherwise
    async fn fake_camera(requests: Arc<Mutex<Vec<String>>>) -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?.to_string();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let Ok(head) = read_head(&mut socket).await else {
                    continue;
                };
                let authorized = head.to_ascii_lowercase().contains("authorization: digest");
                if let Ok(mut seen) = requests.lock() {
                    seen.push(head);
                }

                let response: &[u8] = if authorized {
                    b"HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\nConnection: close\r\n\r\n\xff\xd8\xff\xd9"
                } else {
                    b"HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Digest realm=\"cam\", qop=\"auth\", nonce=\"n0nce\"\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                };
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            }
        });

        Ok(address)
    }

    fn camera(address: &str, with_credentials: bool) -> CameraConfig {
        CameraConfig {
            id: "CAM-T".to_string(),
            address: address.to_string(),
            username: with_credentials.then(|| "admin".to_string()),
            password: with_credentials.then(|| "secret".to_string()),
            gate: None,
            stream: true,
        }
    }

    #[tokio::test]
    async fn snapshot_answers_digest_challenge() -> Result<()> {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let address = fake_camera(requests.clone()).await?;
        let client = IsapiClient::new(&camera(&address, true), Duration::from_secs(2))?;

        let bytes = client.fetch_snapshot(Duration::from_secs(2)).await?;
        assert_eq!(bytes, vec![0xff, 0xd8, 0xff, 0xd9]);

        let seen = requests.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        assert_eq!(seen.len(), 2);
        assert!(seen[1].contains(r#"username="admin""#));
        assert!(seen[1].contains(r#"uri="/ISAPI/Streaming/channels/1/picture""#));
        assert!(seen[1].contains("qop=auth"));
        Ok(())
    }

    #[tokio::test]
    async fn challenge_without_credentials_is_unauthorized() -> Result<()> {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let address = fake_camera(requests).await?;
        let client = IsapiClient::new(&camera(&address, false), Duration::from_secs(2))?;

        let result = client.probe_device_info(Duration::from_secs(2)).await;
        assert!(matches!(result, Err(IsapiError::Unauthorized(_))));
        Ok(())
    }

    #[tokio::test]
    async fn closed_port_is_refused() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?.to_string();
        drop(listener);

        let client = IsapiClient::new(&camera(&address, false), Duration::from_secs(2))?;
        let result = client.probe_device_info(Duration::from_secs(2)).await;
        assert!(matches!(result, Err(IsapiError::Refused(_))));
        Ok(())
    }
}
