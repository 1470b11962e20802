use crate::config::ServiceSpawn;
use crate::error::{EmbeddingError, Result};
use log::{debug, info, warn};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};

/// A supervised embedding-service child process.
///
/// The child is killed when this handle is dropped, so the service never
/// outlives the pipeline that started it.
#[derive(Debug)]
pub struct ServiceProcess {
    child: Child,
    program: String,
}

impl ServiceProcess {
    pub fn spawn(spawn: &ServiceSpawn) -> Result<Self> {
        let program = spawn.program.to_string_lossy().into_owned();
        let mut cmd = Command::new(&spawn.program);
        cmd.args(&spawn.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in &spawn.env {
            cmd.env(key, value);
        }

        let child = cmd
            .spawn()
            .map_err(|err| EmbeddingError::Spawn(format!("{program}: {err}")))?;
        info!(
            "Spawned embedding service `{program}` (pid {})",
            child.id().map_or_else(|| "?".to_string(), |pid| pid.to_string())
        );

        Ok(Self { child, program })
    }

    /// `Some(status)` once the process has exited
    pub fn exit_status(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.exit_status(), Ok(None))
    }

    /// Kill the process if it is still running and reap it
    pub async fn stop(&mut self) -> Result<()> {
        match self.exit_status()? {
            Some(status) => {
                debug!("Embedding service `{}` already exited: {status}", self.program);
            }
            None => {
                if let Err(err) = self.child.kill().await {
                    warn!("Failed to stop embedding service `{}`: {err}", self.program);
                    return Err(err.into());
                }
                info!("Stopped embedding service `{}`", self.program);
            }
        }
        Ok(())
    }
}
