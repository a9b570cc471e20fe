//! Scripted container runtime for tests

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use fabrica_core::domain::key::SshKey;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::runtime::{ContainerRuntime, ExecSpec, FileStream, RuntimeError};
use crate::sink::OutputSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateAndStart { name: String, image: String },
    Exec { command: String, working_dir: String },
    Push { path: String },
    Pull { path: String },
    Stop { name: String },
    Delete { name: String },
}

#[derive(Debug, Clone)]
pub struct PushedFile {
    pub path: String,
    pub content: Vec<u8>,
    pub mode: u32,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    pushed: Vec<PushedFile>,
    outputs: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    failing_pushes: HashSet<String>,
    files: HashMap<String, Vec<u8>>,
    offline_attempts: usize,
    fail_create: bool,
    fail_pull: bool,
    fail_delete: bool,
    missing_images: HashSet<String>,
    unreachable: bool,
}

/// Records every call and answers from a script
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines printed when `command` runs
    pub fn with_output(self, command: &str, lines: &[&str]) -> Self {
        self.state.lock().unwrap().outputs.insert(
            command.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// Makes `command` exit with status 1
    pub fn failing_command(self, command: &str) -> Self {
        self.state.lock().unwrap().failing.insert(command.to_string());
        self
    }

    /// Number of `ping` attempts that fail before the network comes up
    pub fn offline_attempts(self, attempts: usize) -> Self {
        self.state.lock().unwrap().offline_attempts = attempts;
        self
    }

    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_vec());
        self
    }

    /// Makes pushing a file to `path` fail
    pub fn failing_push(self, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_pushes
            .insert(path.to_string());
        self
    }

    pub fn failing_create(self) -> Self {
        self.state.lock().unwrap().fail_create = true;
        self
    }

    pub fn failing_pull(self) -> Self {
        self.state.lock().unwrap().fail_pull = true;
        self
    }

    pub fn failing_delete(self) -> Self {
        self.state.lock().unwrap().fail_delete = true;
        self
    }

    /// Makes `image_exists` answer false for `image`
    pub fn missing_image(self, image: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .missing_images
            .insert(image.to_string());
        self
    }

    /// Makes every request to the runtime itself fail
    pub fn unreachable(self) -> Self {
        self.state.lock().unwrap().unreachable = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn pushed(&self) -> Vec<PushedFile> {
        self.state.lock().unwrap().pushed.clone()
    }

    /// Executed command lines, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Exec { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn creates(&self) -> usize {
        self.count(|call| matches!(call, Call::CreateAndStart { .. }))
    }

    pub fn deletes(&self) -> usize {
        self.count(|call| matches!(call, Call::Delete { .. }))
    }
}

fn failure(command: &str) -> RuntimeError {
    RuntimeError::CommandFailed {
        command: command.to_string(),
        exit_code: 1,
        stderr: format!("{} failed", command),
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create_and_start(&self, name: &str, image: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateAndStart {
            name: name.to_string(),
            image: image.to_string(),
        });
        if state.fail_create {
            return Err(failure("create"));
        }
        Ok(())
    }

    async fn exec(
        &self,
        _name: &str,
        spec: &ExecSpec<'_>,
        sink: &mut OutputSink,
    ) -> Result<(), RuntimeError> {
        let command = spec.display();
        let (lines, fails) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Exec {
                command: command.clone(),
                working_dir: spec.working_dir.to_string(),
            });

            if command.starts_with("ping") {
                if state.offline_attempts > 0 {
                    state.offline_attempts -= 1;
                    (vec!["connect: Network is unreachable".to_string()], true)
                } else {
                    (
                        vec!["PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.".to_string()],
                        false,
                    )
                }
            } else {
                (
                    state.outputs.get(&command).cloned().unwrap_or_default(),
                    state.failing.contains(&command),
                )
            }
        };

        for line in lines {
            sink.consume(format!("{}\n", line).as_bytes()).await?;
        }

        if fails {
            return Err(failure(&command));
        }
        Ok(())
    }

    async fn push_file(
        &self,
        _name: &str,
        path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Push {
            path: path.to_string(),
        });
        state.pushed.push(PushedFile {
            path: path.to_string(),
            content: content.to_vec(),
            mode,
        });
        if state.failing_pushes.contains(path) {
            return Err(failure(&format!("push {}", path)));
        }
        Ok(())
    }

    async fn pull_file(&self, _name: &str, path: &str) -> Result<FileStream, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Pull {
            path: path.to_string(),
        });
        if state.fail_pull {
            return Err(failure(&format!("cat {}", path)));
        }
        match state.files.get(path) {
            Some(content) => Ok(Box::new(std::io::Cursor::new(content.clone()))),
            None => Err(failure(&format!("cat {}", path))),
        }
    }

    async fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Stop {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            name: name.to_string(),
        });
        if state.fail_delete {
            return Err(failure("rm"));
        }
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        let state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(failure("image exists"));
        }
        Ok(!state.missing_images.contains(image))
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        if self.state.lock().unwrap().unreachable {
            return Err(failure("info"));
        }
        Ok(())
    }
}

/// Stored key holding `material`, base64-encoded like an upload
pub fn key_with(material: &[u8], password: Option<&str>) -> SshKey {
    SshKey {
        id: Uuid::new_v4(),
        name: "deploy".to_string(),
        username: "git".to_string(),
        data: Base64::encode_string(material),
        password: password.map(str::to_string),
        created_at: chrono::Utc::now(),
    }
}
