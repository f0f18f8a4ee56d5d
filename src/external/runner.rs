use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Run an external tool and capture its stdout, trimmed.
///
/// A tool that fails to spawn, exits abnormally, or outlives `timeout_secs`
/// yields an empty string, never an error. A single broken tool must not
/// take the rest of the pipeline down with it; the stage simply contributes
/// no data.
pub async fn run_capture(bin: &str, args: &[&str], timeout_secs: u64) -> String {
    let child = Command::new(bin)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(%bin, error = %e, "failed to spawn external tool");
            return String::new();
        }
    };

    // On timeout the output future is dropped, which kills the child.
    match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(Ok(out)) => {
            if !out.status.success() {
                tracing::debug!(%bin, code = ?out.status.code(), "external tool exited non-zero");
            }
            String::from_utf8_lossy(&out.stdout).trim().to_string()
        }
        Ok(Err(e)) => {
            tracing::warn!(%bin, error = %e, "failed to collect external tool output");
            String::new()
        }
        Err(_) => {
            tracing::warn!(%bin, timeout_secs, "external tool timed out, killed");
            String::new()
        }
    }
}
