use crate::config::{EmbeddingConfig, HealthPolicy, ServiceSpawn};
use crate::error::{EmbeddingError, Result};
use crate::process::ServiceProcess;
use crate::repair::sanitize_non_finite_literals;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tokio::time::sleep;

/// Source of raw embeddings.
///
/// The pipeline only talks to this trait, so the HTTP client can be swapped
/// for an in-process double.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Raw vector components exactly as the service returned them
    async fn request_embedding(&self, text: &str) -> Result<Vec<Value>>;

    /// Bring the service to a ready state (start it and wait if needed)
    async fn recover(&mut self) -> Result<()>;

    /// Release anything the backend started
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Value,
}

/// HTTP client for the embedding service, optionally owning the service
/// process it started.
#[derive(Debug)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    health_http: reqwest::Client,
    base_url: String,
    policy: HealthPolicy,
    spawn: Option<ServiceSpawn>,
    process: Option<ServiceProcess>,
}

impl EmbeddingClient {
    /// Build the client. Nothing is contacted until [`connect`](Self::connect)
    /// or the first request.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        config.validate().map_err(EmbeddingError::InvalidConfig)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let health_http = reqwest::Client::builder()
            .timeout(config.health.check_timeout())
            .build()?;

        Ok(Self {
            http,
            health_http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            policy: config.health,
            spawn: config.spawn.clone(),
            process: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether this client started the service and it is still alive
    pub fn owns_running_service(&mut self) -> bool {
        self.process
            .as_mut()
            .is_some_and(ServiceProcess::is_running)
    }

    pub async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.health_http.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                debug!("Embedding service health check failed: {err}");
                false
            }
        }
    }

    /// Make sure the service answers health checks, starting it when it is
    /// unreachable and a spawn command is configured.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_healthy().await {
            return Ok(());
        }

        if let Some(process) = self.process.as_mut() {
            match process.exit_status()? {
                Some(status) => {
                    warn!("Embedding service exited unexpectedly ({status}), restarting");
                    self.process = None;
                }
                // ours, still warming up
                None => return self.wait_until_ready().await,
            }
        }

        let Some(spawn) = self.spawn.as_ref() else {
            return Err(EmbeddingError::ServiceUnavailable(format!(
                "{} is not reachable and no spawn command is configured",
                self.base_url
            )));
        };

        self.process = Some(ServiceProcess::spawn(spawn)?);
        sleep(self.policy.warmup()).await;
        self.wait_until_ready().await
    }

    async fn wait_until_ready(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.policy.ready_deadline();
        loop {
            if self.is_healthy().await {
                info!("Embedding service ready at {}", self.base_url);
                return Ok(());
            }

            if let Some(process) = self.process.as_mut()
                && let Some(status) = process.exit_status()?
            {
                self.process = None;
                return Err(EmbeddingError::Spawn(format!(
                    "service exited during start-up: {status}"
                )));
            }

            if Instant::now() >= deadline {
                break;
            }
            sleep(self.policy.poll_interval()).await;
        }

        Err(EmbeddingError::ServiceUnavailable(format!(
            "{} not ready after {:?}",
            self.base_url,
            self.policy.ready_deadline()
        )))
    }

    /// Stop the service if this client started it
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut process) = self.process.take() {
            process.stop().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingBackend for EmbeddingClient {
    async fn request_embedding(&self, text: &str) -> Result<Vec<Value>> {
        let url = format!("{}/embed", self.base_url);
        let resp = self
            .http
            .post(url)
            .json(&EmbedRequest { text })
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(EmbeddingError::ServiceUnavailable(format!(
                "service is warming up ({status})"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::Request {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let parsed: EmbedResponse = serde_json::from_str(&sanitize_non_finite_literals(&body))
            .map_err(|err| EmbeddingError::InvalidResponse(err.to_string()))?;
        match parsed.embedding {
            Value::Array(values) => Ok(values),
            other => Err(EmbeddingError::InvalidResponse(format!(
                "embedding is not an array: {other}"
            ))),
        }
    }

    async fn recover(&mut self) -> Result<()> {
        self.connect().await
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.close().await
    }
}
