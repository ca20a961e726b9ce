//! The mirror loop: settings resolution and scheduled passes

use colored::Colorize;
use mirror_core::{MirrorConfig, Reconciler, Scheduler, SystemClock, TracingSink};
use mirror_fs::LocalFs;
use tracing::info;

use crate::cli::Cli;
use crate::error::Result;
use crate::logging;

/// Merge the optional config file with command-line arguments.
///
/// Arguments win over file values. The result is validated before it is
/// returned.
pub fn resolve_config(cli: &Cli) -> Result<MirrorConfig> {
    let mut config = match &cli.config {
        Some(path) => MirrorConfig::load(path)?,
        None => MirrorConfig::default(),
    };

    if let Some(source) = &cli.source {
        config.source = source.clone();
    }
    if let Some(replica) = &cli.replica {
        config.replica = replica.clone();
    }
    if let Some(interval) = cli.interval {
        config.interval_secs = interval;
    }
    if let Some(log_file) = &cli.log_file {
        config.log_file = log_file.clone();
    }
    if let Some(symlinks) = cli.symlinks {
        config.symlinks = symlinks;
    }
    if cli.no_preserve_mtime {
        config.metadata.preserve_mtime = false;
    }
    if cli.no_preserve_permissions {
        config.metadata.preserve_permissions = false;
    }
    if cli.once {
        config.max_passes = Some(1);
    } else if cli.max_passes.is_some() {
        config.max_passes = cli.max_passes;
    }
    if cli.fail_fast {
        config.fail_fast = true;
    }

    config.validate()?;
    Ok(config)
}

/// Resolve settings, install logging and run passes until the loop ends.
pub fn run_mirror(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    logging::init(&config.log_file, cli.verbose)?;

    info!(
        source = %config.source.display(),
        replica = %config.replica.display(),
        interval_secs = config.interval_secs,
        log_file = %config.log_file.display(),
        symlinks = %config.symlinks,
        "Starting mirror"
    );

    let scheduler = Scheduler::from_config(&config);
    let mut reconciler =
        Reconciler::new(LocalFs, TracingSink).with_options(config.sync_options());

    let summary = scheduler.run(&SystemClock, || {
        reconciler.sync(&config.source, &config.replica, &config.log_file)
    })?;

    info!(
        passes = summary.passes,
        failed_passes = summary.failed_passes,
        events = summary.events,
        "Mirror stopped"
    );
    if summary.failed_passes > 0 {
        eprintln!(
            "{} {} of {} passes failed; see {}",
            "warning:".yellow().bold(),
            summary.failed_passes,
            summary.passes,
            config.log_file.display()
        );
    }
    Ok(())
}
