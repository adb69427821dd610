//! Sealing backend that delegates to an external `kubeseal` executable.
//!
//! The prepared secret is written to the child's stdin as YAML and the
//! sealed document is read back from stdout. The child inherits the
//! environment, so `SESSION_KEY_SEED` reaches it unchanged.

use super::discovery::ExecutableLocator;
use super::SealerBackend;
use crate::config::{KUBESEAL_BINARY, MAX_SEALER_OUTPUT_BYTES, MAX_SEALER_STDERR_BYTES};
use crate::errors::{Result, SealError};
use crate::resources::Resource;
use crate::secrets::prepare_for_sealing;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

pub struct KubesealSealer {
    binary: PathBuf,
    cert: Option<String>,
    timeout: Duration,
    max_output: usize,
}

impl KubesealSealer {
    pub fn new(binary: impl Into<PathBuf>, cert: Option<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            cert: cert.filter(|c| !c.is_empty()),
            timeout,
            max_output: MAX_SEALER_OUTPUT_BYTES,
        }
    }

    /// Find `kubeseal` on `PATH`, then above the working directory when
    /// `discovery` is set.
    pub fn locate(cert: Option<String>, discovery: bool, timeout: Duration) -> Result<Self> {
        let binary = ExecutableLocator::new(KUBESEAL_BINARY)
            .with_discovery(discovery)
            .locate()?;
        debug!("Using kubeseal at {}", binary.display());
        Ok(Self::new(binary, cert, timeout))
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "yaml".to_string()];
        if let Some(cert) = &self.cert {
            args.push("--cert".to_string());
            args.push(cert.clone());
        }
        args
    }

    async fn execute(&self, input: Vec<u8>) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args());
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| SealError::SealerExecution {
            message: format!("failed to start {}: {e}", self.binary.display()),
            stderr: String::new(),
        })?;
        let unavailable = |stream: &str| SealError::SealerExecution {
            message: format!("kubeseal {stream} unavailable"),
            stderr: String::new(),
        };
        let mut stdin = child.stdin.take().ok_or_else(|| unavailable("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| unavailable("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| unavailable("stderr"))?;

        let write = async move {
            let written = stdin.write_all(&input).await;
            // Closing stdin signals end of input.
            drop(stdin);
            written
        };

        let max_output = self.max_output;
        let run = async move {
            let (written, stdout, stderr) = tokio::join!(
                write,
                read_capped(stdout, max_output),
                read_capped(stderr, MAX_SEALER_STDERR_BYTES),
            );
            // An oversized stream is abandoned, so the child is not awaited.
            let status = match (&stdout, &stderr) {
                (Ok(Capped::Complete(_)), Ok(Capped::Complete(_))) => Some(child.wait().await),
                _ => None,
            };
            (written, stdout, stderr, status)
        };
        let (written, stdout, stderr, status) =
            match tokio::time::timeout(self.timeout, run).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(SealError::Timeout {
                        operation: "kubeseal".to_string(),
                        after: self.timeout,
                    })
                }
            };

        let read_failed = |e: std::io::Error| SealError::SealerExecution {
            message: format!("failed to read kubeseal output: {e}"),
            stderr: String::new(),
        };
        let stdout = match stdout.map_err(read_failed)? {
            Capped::Complete(bytes) => bytes,
            Capped::Exceeded => {
                return Err(SealError::MalformedSealerOutput(format!(
                    "kubeseal output exceeds {max_output} bytes"
                )))
            }
        };
        let stderr = match stderr.map_err(read_failed)? {
            Capped::Complete(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Capped::Exceeded => {
                return Err(SealError::SealerExecution {
                    message: format!("kubeseal diagnostics exceed {MAX_SEALER_STDERR_BYTES} bytes"),
                    stderr: String::new(),
                })
            }
        };

        let status = match status {
            Some(Ok(status)) => status,
            Some(Err(e)) => {
                return Err(SealError::SealerExecution {
                    message: format!("failed to wait for kubeseal: {e}"),
                    stderr,
                })
            }
            None => {
                return Err(SealError::SealerExecution {
                    message: "kubeseal did not finish".to_string(),
                    stderr,
                })
            }
        };

        if !status.success() {
            return Err(SealError::SealerExecution {
                message: format!("kubeseal exited with {status}"),
                stderr,
            });
        }
        if let Err(e) = written {
            return Err(SealError::SealerExecution {
                message: format!("failed to write secret to kubeseal: {e}"),
                stderr,
            });
        }
        if !stderr.trim().is_empty() {
            debug!("kubeseal stderr: {}", stderr.trim());
        }
        Ok(stdout)
    }
}

/// Result of reading a child stream under a byte limit.
enum Capped {
    Complete(Vec<u8>),
    Exceeded,
}

/// Read `reader` to the end, giving up once more than `limit` bytes arrive.
async fn read_capped<R>(reader: R, limit: usize) -> std::io::Result<Capped>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    reader.take(limit as u64 + 1).read_to_end(&mut bytes).await?;
    if bytes.len() > limit {
        return Ok(Capped::Exceeded);
    }
    Ok(Capped::Complete(bytes))
}

#[async_trait]
impl SealerBackend for KubesealSealer {
    fn name(&self) -> &str {
        "kubeseal"
    }

    async fn seal(&self, secret: &Resource) -> Result<Vec<u8>> {
        let prepared = prepare_for_sealing(secret)?;
        let input = prepared.to_yaml()?;
        self.execute(input.into_bytes()).await
    }
}
