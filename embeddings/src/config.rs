use crate::{DEFAULT_EMBEDDING_DIM, DEFAULT_SERVICE_PORT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the embedding pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Dimension D every stored embedding is repaired to
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Character budget per request, applied after preprocessing
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Chunks embedded between two inter-batch pauses
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub health: HealthPolicy,

    /// How to start the service when it is not reachable
    #[serde(default)]
    pub spawn: Option<ServiceSpawn>,
}

fn default_base_url() -> String {
    format!("http://127.0.0.1:{DEFAULT_SERVICE_PORT}")
}

fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIM
}

fn default_max_chars() -> usize {
    2000
}

fn default_batch_size() -> usize {
    4
}

fn default_batch_delay_ms() -> u64 {
    100
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dimension: default_dimension(),
            max_chars: default_max_chars(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            health: HealthPolicy::default(),
            spawn: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.dimension == 0 {
            return Err("dimension must be greater than 0".into());
        }
        if self.max_chars == 0 {
            return Err("max_chars must be greater than 0".into());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".into());
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!("base_url must be an http(s) URL, got {}", self.base_url));
        }
        self.health.validate()
    }
}

/// Readiness checks for the embedding service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// Timeout of a single `GET /health`
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    /// Blocking wait right after spawning, before the first poll
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting for readiness after this long
    #[serde(default = "default_ready_deadline_ms")]
    pub ready_deadline_ms: u64,
}

fn default_check_timeout_ms() -> u64 {
    2_000
}

fn default_warmup_ms() -> u64 {
    3_000
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_ready_deadline_ms() -> u64 {
    30_000
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            check_timeout_ms: default_check_timeout_ms(),
            warmup_ms: default_warmup_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            ready_deadline_ms: default_ready_deadline_ms(),
        }
    }
}

impl HealthPolicy {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ready_deadline(&self) -> Duration {
        Duration::from_millis(self.ready_deadline_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.check_timeout_ms == 0 {
            return Err("health.check_timeout_ms must be greater than 0".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("health.poll_interval_ms must be greater than 0".into());
        }
        if self.ready_deadline_ms < self.warmup_ms {
            return Err(format!(
                "health.ready_deadline_ms ({}) must not be shorter than warmup_ms ({})",
                self.ready_deadline_ms, self.warmup_ms
            ));
        }
        Ok(())
    }
}

/// Command that starts the embedding service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpawn {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

impl ServiceSpawn {
    /// `python3 <script> --port <port>`
    pub fn python_script(script: impl Into<PathBuf>, port: u16) -> Self {
        let script: PathBuf = script.into();
        Self {
            program: PathBuf::from("python3"),
            args: vec![
                script.to_string_lossy().into_owned(),
                "--port".to_string(),
                port.to_string(),
            ],
            env: Vec::new(),
        }
    }
}
