//! `depot fetch`: download, verify and stage catalog packages.

use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use depot::{
    DownloadService, InstallHandoff, ServiceConfig, TaskEvent, TaskState,
};

use super::{find_release, load_catalog};

#[derive(Args)]
pub struct FetchArgs {
    /// JSON catalog of downloadable releases.
    pub catalog: PathBuf,

    /// Packages to download; defaults to every catalog entry.
    pub packages: Vec<String>,

    /// Directory verified artifacts are cached in.
    #[arg(long, default_value = "depot-cache")]
    pub cache_dir: PathBuf,
}

/// Handoff that announces the verified artifact path on stdout.
struct AnnouncingInstaller;

impl InstallHandoff for AnnouncingInstaller {
    fn install(&self, package: &str, artifact: &Path) {
        info!(package, artifact = %artifact.display(), "ready to install");
        println!("{}  {}", package, artifact.display());
    }
}

pub fn run(args: FetchArgs) -> Result<(), Box<dyn Error>> {
    let catalog = load_catalog(&args.catalog)?;

    let selected: Vec<String> = if args.packages.is_empty() {
        catalog.iter().map(|release| release.package.clone()).collect()
    } else {
        // Fail fast on unknown package names.
        for package in &args.packages {
            find_release(&catalog, package)?;
        }
        args.packages.clone()
    };
    if selected.is_empty() {
        return Err("catalog contains no packages".into());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(drive_downloads(args.cache_dir, catalog, selected))
}

async fn drive_downloads(
    cache_dir: PathBuf,
    catalog: Vec<depot::ReleaseDescriptor>,
    selected: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let config = ServiceConfig::new(cache_dir);
    let service = DownloadService::with_installer(config, Arc::new(AnnouncingInstaller))?;

    // Cancel in-flight work on Ctrl-C; the event loop then drains the
    // Cancelled events and exits.
    let interrupt_target = service.clone();
    ctrlc::set_handler(move || {
        eprintln!("interrupted, cancelling downloads");
        interrupt_target.shutdown();
    })?;

    let mut events = service.subscribe();
    for package in &selected {
        let release = find_release(&catalog, package)?;
        service.enqueue(
            release.package.clone(),
            release.display_name.clone(),
            release.clone(),
        );
    }

    let mut pending: HashSet<String> = selected.into_iter().collect();
    let mut failures = Vec::new();
    let mut bar: Option<ProgressBar> = None;

    while !pending.is_empty() {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        render_event(&event, &mut bar);
        if event.state.is_terminal() {
            pending.remove(&event.package);
            if let TaskState::Error { kind } = &event.state {
                failures.push(format!("{}: {}", event.package, kind));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures.join("; ").into())
    }
}

fn render_event(event: &TaskEvent, bar: &mut Option<ProgressBar>) {
    match &event.state {
        TaskState::Pending => {}
        TaskState::Connecting => {
            let progress = ProgressBar::new_spinner();
            progress.set_message(format!("{}: connecting", event.display_name));
            *bar = Some(progress);
        }
        TaskState::Downloading { read, total } => {
            let progress = bar.get_or_insert_with(ProgressBar::new_spinner);
            if let Some(total) = total {
                if progress.length() != Some(*total) {
                    progress.set_length(*total);
                    progress.set_style(
                        ProgressStyle::with_template(
                            "{msg} {bytes}/{total_bytes} [{wide_bar}] {percent}%",
                        )
                        .expect("valid progress template"),
                    );
                }
            }
            progress.set_message(event.display_name.clone());
            progress.set_position(*read);
        }
        TaskState::Success { .. } => {
            finish_bar(bar, format!("{}: verified", event.display_name));
        }
        TaskState::Error { kind } => {
            finish_bar(bar, format!("{}: {}", event.display_name, kind));
        }
        TaskState::Cancelled => {
            finish_bar(bar, format!("{}: cancelled", event.display_name));
        }
    }
}

fn finish_bar(bar: &mut Option<ProgressBar>, message: String) {
    if let Some(progress) = bar.take() {
        progress.finish_with_message(message);
    } else {
        eprintln!("{}", message);
    }
}
