use futures::StreamExt;
use log::{debug, error, info, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{CameraConfig, StreamingConfig};
use crate::device_manager::isapi_client::{IsapiClient, IsapiError};
use crate::services::EventPipeline;
use crate::utils::frame::StreamBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Streaming => write!(f, "STREAMING"),
        }
    }
}

/// Exponential reconnect delay
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Delay to wait now; doubles the next one up to the ceiling
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Supervised pull connection to one camera's alert stream
pub struct AlertStreamConnector {
    camera: CameraConfig,
    client: IsapiClient,
    pipeline: Arc<EventPipeline>,
    config: StreamingConfig,
    backoff: Backoff,
    state: ConnectionState,
    transitions: broadcast::Sender<ConnectionState>,
}

impl AlertStreamConnector {
    pub fn new(
        camera: CameraConfig,
        pipeline: Arc<EventPipeline>,
        config: StreamingConfig,
    ) -> Result<Self, IsapiError> {
        let client = IsapiClient::new(&camera, config.connect_timeout())?;
        let (transitions, _) = broadcast::channel(16);
        Ok(Self {
            backoff: Backoff::new(config.min_backoff(), config.max_backoff()),
            camera,
            client,
            pipeline,
            config,
            state: ConnectionState::Disconnected,
            transitions,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Every state change from now on, including those made after `run` takes the connector
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionState> {
        self.transitions.subscribe()
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("[{}] {} -> {}", self.camera.id, self.state, state);
            self.state = state;
            // no subscribers is fine
            let _ = self.transitions.send(state);
        }
    }

    /// Reconnect loop; returns once `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "[{}] Starting alert stream to {}",
            self.camera.id,
            self.camera.base_url()
        );

        loop {
            self.set_state(ConnectionState::Connecting);
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.stream_once(&cancel) => result,
            };

            match result {
                Ok(()) => break,
                Err(IsapiError::Refused(_)) => {
                    warn!("[{}] Connection refused", self.camera.id)
                }
                Err(IsapiError::Timeout(_)) => warn!("[{}] Timed out", self.camera.id),
                Err(IsapiError::Closed) => warn!("[{}] Stream closed by camera", self.camera.id),
                Err(e) => error!("[{}] Alert stream failed: {}", self.camera.id, e),
            }
            self.set_state(ConnectionState::Disconnected);

            let delay = self.backoff.next_delay();
            info!(
                "[{}] Reconnecting in {:.1}s",
                self.camera.id,
                delay.as_secs_f64()
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("[{}] Alert stream stopped", self.camera.id);
    }

    /// One connection lifetime. `Ok` only when cancelled.
    async fn stream_once(&mut self, cancel: &CancellationToken) -> Result<(), IsapiError> {
        let response = self
            .client
            .open_alert_stream(&self.config.path, self.config.connect_timeout())
            .await?;

        self.set_state(ConnectionState::Streaming);
        self.backoff.reset();
        info!("[{}] Connected to alert stream", self.camera.id);

        let mut buffer = StreamBuffer::isapi(self.config.max_buffer_bytes);
        let mut body = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                chunk = body.next() => chunk,
            };
            let chunk = match chunk {
                Some(chunk) => chunk?,
                None => return Err(IsapiError::Closed),
            };

            for frame in buffer.push(&chunk) {
                if let Err(e) = self.pipeline.ingest_frame(&frame, &self.camera.address).await {
                    warn!(
                        "[{}] Dropped stream event ({} bytes): {:#}",
                        self.camera.id,
                        frame.bytes.len(),
                        e
                    );
                }
            }
        }
    }
}
