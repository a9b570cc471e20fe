//! Podman container runtime
//!
//! Drives the `podman` CLI:
//! - create and start a long-lived container per build
//! - execute commands with streamed output
//! - copy files in and out through `podman exec`
//! - stop and remove the container
//! - look up images and check that the service answers

use async_trait::async_trait;
use std::pin::Pin;
use std::process::{Output, Stdio};
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, ReadBuf};
use tokio::process::{ChildStdout, Command};
use tracing::{debug, info};

use super::{ContainerRuntime, ExecSpec, FileStream, RuntimeError};
use crate::sink::OutputSink;

/// `ContainerRuntime` backed by the podman CLI
#[derive(Debug, Clone)]
pub struct PodmanRuntime {
    binary: String,
}

impl PodmanRuntime {
    pub fn new() -> Self {
        Self {
            binary: "podman".to_string(),
        }
    }

    /// Uses a different executable, e.g. a wrapper script
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Checks that the runtime binary is installed and working
    pub async fn check_available(&self) -> anyhow::Result<()> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Failed to execute '{} --version'. Is podman installed? {}",
                    self.binary,
                    e
                )
            })?;

        if !output.status.success() {
            anyhow::bail!("{} is not working correctly", self.binary);
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!("Container runtime is available: {}", version.trim());

        Ok(())
    }

    /// Runs podman to completion and fails on a nonzero exit
    async fn run(&self, args: &[String]) -> Result<Output, RuntimeError> {
        let command = self.describe(args);
        debug!("Running {}", command);

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        check_status(command, &output)?;
        Ok(output)
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.binary, args.join(" "))
    }
}

impl Default for PodmanRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for PodmanRuntime {
    async fn create_and_start(&self, name: &str, image: &str) -> Result<(), RuntimeError> {
        info!("Creating container {} from image {}", name, image);
        self.run(&create_args(name, image)).await?;

        info!("Starting container {}", name);
        self.run(&strings(&["start", name])).await?;

        Ok(())
    }

    async fn exec(
        &self,
        name: &str,
        spec: &ExecSpec<'_>,
        sink: &mut OutputSink,
    ) -> Result<(), RuntimeError> {
        let args = exec_args(name, spec);
        let command = spec.display();
        debug!("Executing in container {}: {}", name, command);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(RuntimeError::Io(std::io::Error::other(
                "podman exec output pipes unavailable",
            )));
        };

        // Output is forwarded as raw bytes; decoding is up to the sink
        let mut stdout = BufReader::new(stdout).split(b'\n');
        let mut stderr = BufReader::new(stderr).split(b'\n');
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut last_error_line = String::new();

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout.next_segment(), if stdout_open => match line? {
                    Some(mut line) => {
                        line.push(b'\n');
                        sink.consume(&line).await?;
                    }
                    None => stdout_open = false,
                },
                line = stderr.next_segment(), if stderr_open => match line? {
                    Some(mut line) => {
                        last_error_line = String::from_utf8_lossy(&line).trim_end().to_string();
                        line.push(b'\n');
                        sink.consume(&line).await?;
                    }
                    None => stderr_open = false,
                },
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(RuntimeError::CommandFailed {
                command,
                exit_code: status.code().unwrap_or(-1),
                stderr: last_error_line,
            });
        }

        debug!("Command completed successfully in container {}", name);
        Ok(())
    }

    async fn push_file(
        &self,
        name: &str,
        path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), RuntimeError> {
        let args = push_args(name, path, mode);
        let command = format!("push {} ({:o})", path, mode);
        debug!("Pushing {} bytes to {}:{}", content.len(), name, path);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(content).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        check_status(command, &output)
    }

    async fn pull_file(&self, name: &str, path: &str) -> Result<FileStream, RuntimeError> {
        let args = strings(&["exec", name, "cat", path]);
        let command = self.describe(&args);
        debug!("Pulling {}:{}", name, path);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            return Err(RuntimeError::Io(std::io::Error::other(
                "podman exec output pipe unavailable",
            )));
        };

        Ok(Box::new(PulledFile {
            stdout,
            exit: Some(Box::pin(async move {
                let output = child.wait_with_output().await?;
                check_status(command, &output).map_err(std::io::Error::other)
            })),
        }))
    }

    async fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        info!("Stopping container {}", name);
        self.run(&strings(&["stop", "--time", "0", name])).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), RuntimeError> {
        info!("Removing container {}", name);
        self.run(&strings(&["rm", name])).await?;
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        let args = strings(&["image", "exists", image]);
        let command = self.describe(&args);

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        // Exit status 1 means the image is unknown, anything else is a failure
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => check_status(command, &output).map(|()| false),
        }
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        self.run(&strings(&["info", "--format", "{{.Host.Arch}}"]))
            .await?;
        Ok(())
    }
}

/// Output of `cat` inside the container
///
/// Reaching the end of the stream waits for the command, so a failed copy
/// surfaces as a read error instead of a silently truncated file.
struct PulledFile {
    stdout: ChildStdout,
    exit: Option<Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>>,
}

impl AsyncRead for PulledFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = &mut *self;
        let filled = buf.filled().len();
        ready!(Pin::new(&mut this.stdout).poll_read(cx, buf))?;
        if buf.filled().len() > filled || buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        if let Some(exit) = this.exit.as_mut() {
            let result = ready!(exit.as_mut().poll(cx));
            this.exit = None;
            result?;
        }
        Poll::Ready(Ok(()))
    }
}

fn check_status(command: String, output: &Output) -> Result<(), RuntimeError> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !stdout.trim().is_empty() {
        debug!("podman stdout: {}", stdout.trim());
    }
    if !stderr.trim().is_empty() {
        debug!("podman stderr: {}", stderr.trim());
    }

    if !output.status.success() {
        return Err(RuntimeError::CommandFailed {
            command,
            exit_code: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(())
}

/// Container kept alive by a sleeping shell, whatever the image entrypoint
fn create_args(name: &str, image: &str) -> Vec<String> {
    strings(&[
        "create",
        "--name",
        name,
        "--entrypoint",
        "/bin/sh",
        image,
        "-c",
        "sleep infinity",
    ])
}

fn exec_args(name: &str, spec: &ExecSpec<'_>) -> Vec<String> {
    let mut args = strings(&["exec", "--workdir", spec.working_dir]);
    for (key, value) in spec.environment {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push(name.to_string());
    args.extend(spec.command.iter().cloned());
    args
}

/// The path travels as a positional parameter so it is never re-parsed by the shell
fn push_args(name: &str, path: &str, mode: u32) -> Vec<String> {
    let script = format!("cat > \"$1\" && chmod {:o} \"$1\"", mode);
    strings(&["exec", "-i", name, "sh", "-c", &script, "sh", path])
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
