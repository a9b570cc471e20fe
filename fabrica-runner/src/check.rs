//! Environment checks
//!
//! Reports whether the configured distro images exist and whether the
//! container runtime and build root are usable, without running a build.

use fabrica_core::domain::check::{ConnectionCheck, ImageCheck};
use tracing::warn;

use crate::config::RunnerConfig;
use crate::runtime::ContainerRuntime;

/// Looks up the image alias of every configured distro
///
/// A lookup failure counts as a missing image.
pub async fn check_images(runtime: &dyn ContainerRuntime, config: &RunnerConfig) -> Vec<ImageCheck> {
    let mut checks = Vec::with_capacity(config.distros.len());

    for distro in &config.distros {
        let alias = config.image_alias(distro);
        let available = match runtime.image_exists(&alias).await {
            Ok(available) => available,
            Err(e) => {
                warn!("Failed to look up image {}: {}", alias, e);
                false
            }
        };

        checks.push(ImageCheck {
            distro: distro.clone(),
            alias,
            available,
        });
    }

    checks
}

/// Checks that the container runtime answers
pub async fn check_runtime(runtime: &dyn ContainerRuntime) -> ConnectionCheck {
    match runtime.ping().await {
        Ok(()) => ConnectionCheck::ok("container-runtime"),
        Err(e) => ConnectionCheck::failed("container-runtime", e.to_string()),
    }
}

/// Checks that artifacts can be staged under the build root
pub async fn check_build_root(config: &RunnerConfig) -> ConnectionCheck {
    const NAME: &str = "build-root";

    match tokio::fs::metadata(&config.build_root).await {
        Ok(meta) if !meta.is_dir() => ConnectionCheck::failed(
            NAME,
            format!("{} is not a directory", config.build_root.display()),
        ),
        Ok(meta) if meta.permissions().readonly() => ConnectionCheck::failed(
            NAME,
            format!("{} is read-only", config.build_root.display()),
        ),
        Ok(_) => ConnectionCheck::ok(NAME),
        Err(e) => ConnectionCheck::failed(
            NAME,
            format!("{}: {}", config.build_root.display(), e),
        ),
    }
}
