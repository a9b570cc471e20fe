//! Output sinks for in-container commands
//!
//! Every command streams its combined output into an `OutputSink`. The three
//! variants share one entry point and differ only in their side effects:
//! - `Persist`: appends each chunk to the build log
//! - `Artifact`: persists, and remembers the artifact filename the build tool reports
//! - `Marker`: persists nothing, only watches for a fixed substring

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{BuildStore, StoreError};

/// Error raised when a sink cannot accept output
#[derive(Debug, Error)]
#[error("failed to record output for build {build_id}: {source}")]
pub struct SinkError {
    pub build_id: Uuid,
    #[source]
    pub source: StoreError,
}

/// Destination for the output of one command
pub enum OutputSink {
    Persist(PersistSink),
    Artifact(ArtifactSink),
    Marker(MarkerSink),
}

impl OutputSink {
    /// Sink writing every chunk to the build log
    pub fn persist(build_id: Uuid, store: Arc<dyn BuildStore>) -> Self {
        OutputSink::Persist(PersistSink { build_id, store })
    }

    /// Sink writing to the build log and capturing lines starting with `marker`
    pub fn artifact(build_id: Uuid, store: Arc<dyn BuildStore>, marker: &str) -> Self {
        OutputSink::Artifact(ArtifactSink {
            log: PersistSink { build_id, store },
            marker: marker.to_string(),
            filename: None,
        })
    }

    /// Sink detecting `marker` anywhere in the output
    pub fn marker(marker: &str) -> Self {
        OutputSink::Marker(MarkerSink {
            marker: marker.as_bytes().to_vec(),
            tail: Vec::new(),
            found: false,
        })
    }

    /// Consumes one chunk of output
    pub async fn consume(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        match self {
            OutputSink::Persist(sink) => sink.write(chunk).await,
            OutputSink::Artifact(sink) => sink.write(chunk).await,
            OutputSink::Marker(sink) => {
                sink.scan(chunk);
                Ok(())
            }
        }
    }

    /// Last artifact filename reported, for `Artifact` sinks
    pub fn artifact_filename(&self) -> Option<&str> {
        match self {
            OutputSink::Artifact(sink) => sink.filename(),
            _ => None,
        }
    }

    /// Whether the marker has been seen, for `Marker` sinks
    pub fn found(&self) -> bool {
        match self {
            OutputSink::Marker(sink) => sink.found(),
            _ => false,
        }
    }
}

/// Appends output to the build log
pub struct PersistSink {
    build_id: Uuid,
    store: Arc<dyn BuildStore>,
}

impl PersistSink {
    async fn write(&self, chunk: &[u8]) -> Result<(), SinkError> {
        let text = String::from_utf8_lossy(chunk);
        let text = text.trim_end();
        if text.trim().is_empty() {
            return Ok(());
        }

        self.store
            .append_log(self.build_id, text)
            .await
            .map_err(|source| SinkError {
                build_id: self.build_id,
                source,
            })
    }
}

/// Persists output and tracks the reported artifact filename
pub struct ArtifactSink {
    log: PersistSink,
    marker: String,
    filename: Option<String>,
}

impl ArtifactSink {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        let text = String::from_utf8_lossy(chunk);
        for line in text.lines() {
            if let Some(name) = parse_artifact_line(line, &self.marker) {
                self.filename = Some(name);
            }
        }

        self.log.write(chunk).await
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

/// Watches output for a fixed substring
pub struct MarkerSink {
    marker: Vec<u8>,
    // End of the previous chunk, so a marker split across chunks still matches
    tail: Vec<u8>,
    found: bool,
}

impl MarkerSink {
    fn scan(&mut self, chunk: &[u8]) {
        if self.found || self.marker.is_empty() {
            self.found = true;
            return;
        }

        let mut window = std::mem::take(&mut self.tail);
        window.extend_from_slice(chunk);

        if window
            .windows(self.marker.len())
            .any(|candidate| candidate == self.marker.as_slice())
        {
            self.found = true;
            return;
        }

        let keep = (self.marker.len() - 1).min(window.len());
        self.tail = window.split_off(window.len() - keep);
    }

    pub fn found(&self) -> bool {
        self.found
    }
}

/// Extracts the filename from a line such as `Snapped myapp_1.0_amd64.snap`
fn parse_artifact_line(line: &str, marker: &str) -> Option<String> {
    let rest = line.trim_start_matches('\r').trim_start().strip_prefix(marker)?;
    let name = rest.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
