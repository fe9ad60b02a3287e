//! Periodic re-indexing of all configured targets.
//!
//! Each tick runs the incremental updater over every folder and git repo in
//! the configuration. Failures are logged and never stop the loop; indexes
//! are written back only when the updater reports a change, so an idle tree
//! costs one directory walk and some hashing per tick.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::models::IndexKind;
use crate::update;

/// Run the watch loop forever. The interval is clamped to at least one
/// second; cancellation happens via process signal at the sleep boundary.
pub async fn watch(config: &Config, app_dir: &Path, interval_secs: u64) -> anyhow::Result<()> {
    let interval = interval_secs.max(1);
    info!(
        "watching {} folder(s) and {} repo(s) every {interval}s",
        config.folders.len(),
        config.git_repos.len()
    );

    loop {
        run_cycle(config, app_dir).await;
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}

/// One pass over all targets with per-target error isolation.
pub async fn run_cycle(config: &Config, app_dir: &Path) {
    for folder in &config.folders {
        tick_target(config, app_dir, folder, IndexKind::Folder).await;
    }
    for repo in &config.git_repos {
        tick_target(config, app_dir, repo, IndexKind::GitRepo).await;
    }
}

async fn tick_target(config: &Config, app_dir: &Path, target: &Path, kind: IndexKind) {
    match update::update_target(config, app_dir, target, kind).await {
        Ok(outcome) if outcome.changed => info!(
            "updated {}: +{} ~{} -{} ({} fragments)",
            target.display(),
            outcome.added,
            outcome.modified,
            outcome.removed,
            outcome.fragments
        ),
        Ok(_) => debug!("{} unchanged", target.display()),
        Err(e) => error!("failed to update {}: {e}", target.display()),
    }
}
