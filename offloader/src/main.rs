//! Jennov Offloader – pulls one day of recordings off Jennov IP cameras,
//! stores them locally and frees the cameras' SD cards.
//!
//! Cameras are processed one after another and recordings one at a time;
//! the devices are small embedded servers and never see two requests at
//! once.

mod client;
#[cfg(test)]
mod fake;
mod parser;
mod query;
mod storage;
mod transfer;

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::Parser;
use tracing::{error, info};

use jennov_common::camera::{CameraRegistry, Selection};
use jennov_common::config::{self, Config, Credentials, LogFormat};

use crate::client::{ClientContext, HttpCamera};
use crate::storage::LocalStore;
use crate::transfer::{CameraSummary, Mode};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Jennov camera video offloader.
#[derive(Debug, Parser)]
#[command(name = "jennov-offloader", version, about)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Date to process (YYYY-MM-DD), defaults to yesterday
    #[arg(short, long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,

    /// Only query recordings without downloading or deleting
    #[arg(short, long, conflicts_with_all = ["download_only", "delete_only"])]
    query_only: bool,

    /// Download files without deleting
    #[arg(long, conflicts_with = "delete_only")]
    download_only: bool,

    /// Delete files without downloading
    #[arg(long)]
    delete_only: bool,

    /// Camera name to process (e.g. marysville1)
    #[arg(short, long, value_name = "NAME")]
    camera: Option<String>,

    /// Process all configured cameras
    #[arg(short, long, conflicts_with = "camera")]
    all_cameras: bool,

    /// List all configured cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Config file
    #[arg(long, default_value = Config::default_path())]
    config: PathBuf,

    /// Secrets file with the device credentials
    #[arg(long, default_value = Credentials::default_path())]
    secrets: PathBuf,

    /// Override `download_directory` from the config file
    #[arg(long, value_name = "DIR")]
    download_dir: Option<PathBuf>,
}

impl Args {
    fn mode(&self) -> Mode {
        if self.query_only {
            Mode::QueryOnly
        } else if self.download_only {
            Mode::DownloadOnly
        } else if self.delete_only {
            Mode::DeleteOnly
        } else {
            Mode::DownloadAndDelete
        }
    }

    fn selection(&self) -> Selection {
        if self.all_cameras {
            Selection::All
        } else if let Some(name) = &self.camera {
            Selection::Named(name.clone())
        } else {
            Selection::Default
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // ── load config ──────────────────────────────────────────────────
    let config = config::load(&args.config).context("Config load failed")?;

    let default_level = if args.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());
    match config.log_format {
        LogFormat::Full => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .init(),
    }

    if args.list_cameras {
        list_cameras(&config.cameras);
        return Ok(());
    }

    info!("JennovOffloader starting...");

    // ── resolve cameras and credentials before touching any device ───
    let selected = config.cameras.select(&args.selection())?;
    let credentials = config::load_credentials(&args.secrets).context("Secrets load failed")?;

    let date = args.date.unwrap_or_else(yesterday);
    let mode = args.mode();
    let store = LocalStore::new(
        args.download_dir
            .clone()
            .unwrap_or_else(|| config.download_dir.clone()),
        &config.file_extension,
    );
    let http = client::build_http_client(Duration::from_secs(config.timeout_secs))?;

    // ── ctrl-c ───────────────────────────────────────────────────────
    ctrlc::set_handler(move || {
        SHUTDOWN.store(true, Ordering::Relaxed);
        info!("Shutdown signal received, finishing current recording");
    })
    .context("Cannot set Ctrl-C handler")?;

    info!(
        "Processing recordings for {} ({mode}) into {}",
        date.format("%Y-%m-%d"),
        store.root().display()
    );

    // ── process each selected camera ─────────────────────────────────
    let mut total = CameraSummary::default();
    for camera in selected {
        if SHUTDOWN.load(Ordering::Relaxed) {
            break;
        }

        let api = HttpCamera::new(http.clone(), ClientContext::new(camera, &credentials));

        // A panic inside one camera must not take the remaining cameras down.
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            transfer::process_camera(&api, camera, date, mode, &store, &SHUTDOWN)
        }));
        match result {
            Ok(summary) => total.merge(&summary),
            Err(_) => error!("Failed to process camera {}: processing aborted", camera.name),
        }
    }

    info!("JennovOffloader completed: {total}");
    Ok(())
}

fn yesterday() -> NaiveDate {
    Local::now().date_naive() - Days::new(1)
}

fn list_cameras(cameras: &CameraRegistry) {
    println!("Configured cameras:");
    for camera in cameras.iter() {
        println!("  {}: {} (ID: {})", camera.name, camera.address, camera.id);
    }
}
