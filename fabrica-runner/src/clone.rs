//! Clone script generation
//!
//! The repository is cloned by a small shell script pushed into the
//! container. When the SSH key needs a passphrase the script first starts
//! `ssh-agent` and loads the key through the askpass helper.

use crate::credentials::{KEY_PATH, PASSPHRASE_HELPER_PATH, shell_quote};

/// In-container path of the clone script
pub const CLONE_SCRIPT_PATH: &str = "/root/clone";

/// Permission of the clone script
pub const CLONE_SCRIPT_MODE: u32 = 0o700;

/// Builds the script that clones `branch` of `repo`
pub fn clone_script(repo: &str, branch: &str, passphrase_required: bool) -> String {
    let mut lines = vec!["#!/bin/sh".to_string()];

    if passphrase_required {
        lines.push("eval `ssh-agent`".to_string());
        lines.push("export DISPLAY=0".to_string());
        lines.push(format!("export SSH_ASKPASS={}", PASSPHRASE_HELPER_PATH));
        lines.push(format!("cat {} | ssh-add -", KEY_PATH));
    }

    lines.push(format!(
        "git clone -b {} --progress {}",
        shell_quote(branch),
        shell_quote(repo)
    ));

    lines.join("\n")
}
