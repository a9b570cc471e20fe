//! Network readiness
//!
//! A freshly started container may not have networking yet. The waiter runs
//! the connectivity probe until its output shows the marker.

use tracing::{debug, info};

use crate::config::RunnerConfig;
use crate::runtime::{ContainerRuntime, ExecSpec};
use crate::sink::OutputSink;

/// Probes connectivity inside `container` until the network answers
///
/// There is no timeout and no delay between attempts: a container whose
/// network never comes up keeps this loop running. Returns the number of
/// probes it took.
pub async fn wait_for_network(
    runtime: &dyn ContainerRuntime,
    container: &str,
    config: &RunnerConfig,
) -> usize {
    info!("Waiting for network in container {}", container);

    let spec = ExecSpec {
        command: &config.network_check,
        working_dir: &config.home_dir,
        environment: &config.environment,
    };
    let mut sink = OutputSink::marker(&config.network_marker);
    let mut attempts = 0;

    loop {
        attempts += 1;
        if let Err(e) = runtime.exec(container, &spec, &mut sink).await {
            debug!("Network probe {} in {} failed: {}", attempts, container, e);
        }

        if sink.found() {
            break;
        }

        tokio::task::yield_now().await;
    }

    info!(
        "Network ready in container {} after {} probe(s)",
        container, attempts
    );
    attempts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;

    #[tokio::test]
    async fn test_returns_after_first_successful_probe() {
        let runtime = FakeRuntime::new();
        let attempts = wait_for_network(&runtime, "fabrica-app-1", &RunnerConfig::default()).await;

        assert_eq!(attempts, 1);
        assert_eq!(runtime.commands(), vec!["ping -c1 8.8.8.8"]);
    }

    #[tokio::test]
    async fn test_keeps_probing_until_marker_seen() {
        let runtime = FakeRuntime::new().offline_attempts(3);
        let attempts = wait_for_network(&runtime, "fabrica-app-1", &RunnerConfig::default()).await;

        assert_eq!(attempts, 4);
        assert_eq!(runtime.commands().len(), 4);
    }
}
