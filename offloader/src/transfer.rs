//! Transfer orchestration: for every recording of a camera, download it
//! and then delete it from the device, according to the run [`Mode`].
//!
//! A recording is only ever deleted after its download succeeded (when
//! the mode downloads at all).  Failures are logged and stay local to the
//! recording; the loop always moves on to the next one.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};

use jennov_common::camera::CameraDescriptor;
use jennov_common::protocol::Recording;

use crate::client::{CameraApi, DeviceError};
use crate::query;
use crate::storage::LocalStore;

/// What to do with each discovered recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    QueryOnly,
    DownloadOnly,
    DeleteOnly,
    DownloadAndDelete,
}

impl Mode {
    pub fn downloads(self) -> bool {
        matches!(self, Mode::DownloadOnly | Mode::DownloadAndDelete)
    }

    pub fn deletes(self) -> bool {
        matches!(self, Mode::DeleteOnly | Mode::DownloadAndDelete)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::QueryOnly => "query only",
            Mode::DownloadOnly => "download only",
            Mode::DeleteOnly => "delete only",
            Mode::DownloadAndDelete => "download and delete",
        })
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device answered {0} instead of 202 Accepted")]
    DeleteRejected(StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Download,
    Delete,
}

/// Result of handling one recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    pub downloaded: bool,
    pub deleted: bool,
    pub error: Option<FailureKind>,
}

/// Per-camera counters, logged when the camera is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraSummary {
    pub discovered: usize,
    pub downloaded: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Left untouched because of a shutdown request.
    pub remaining: usize,
}

impl CameraSummary {
    fn record(&mut self, outcome: &TransferOutcome) {
        self.downloaded += usize::from(outcome.downloaded);
        self.deleted += usize::from(outcome.deleted);
        self.failed += usize::from(outcome.error.is_some());
    }

    pub fn merge(&mut self, other: &CameraSummary) {
        self.discovered += other.discovered;
        self.downloaded += other.downloaded;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.remaining += other.remaining;
    }
}

impl fmt::Display for CameraSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} found, {} downloaded, {} deleted, {} failed",
            self.discovered, self.downloaded, self.deleted, self.failed
        )?;
        if self.remaining > 0 {
            write!(f, ", {} not processed", self.remaining)?;
        }
        Ok(())
    }
}

/// Discover and transfer every recording of `camera` for `date`.
///
/// Returns early, between recordings, once `shutdown` is set.
pub fn process_camera(
    api: &impl CameraApi,
    camera: &CameraDescriptor,
    date: NaiveDate,
    mode: Mode,
    store: &LocalStore,
    shutdown: &AtomicBool,
) -> CameraSummary {
    info!("Processing camera: {camera}");

    let recordings = query::query_recordings(api, date);
    let mut summary = CameraSummary {
        discovered: recordings.len(),
        ..Default::default()
    };

    if recordings.is_empty() {
        info!("No recordings found for {}", camera.name);
        return summary;
    }
    info!("Found {} recordings for {}", recordings.len(), camera.name);

    for (i, rec) in recordings.iter().enumerate() {
        if shutdown.load(Ordering::Relaxed) {
            summary.remaining = recordings.len() - i;
            warn!(
                "Shutdown requested – leaving {} recording(s) on {}",
                summary.remaining, camera.name
            );
            break;
        }

        let outcome = transfer_recording(api, camera, rec, mode, store);
        summary.record(&outcome);
    }

    info!("Finished {}: {summary}", camera.name);
    summary
}

/// Run one recording through report / download / delete.
pub fn transfer_recording(
    api: &impl CameraApi,
    camera: &CameraDescriptor,
    rec: &Recording,
    mode: Mode,
    store: &LocalStore,
) -> TransferOutcome {
    let mut outcome = TransferOutcome::default();

    if mode == Mode::QueryOnly {
        info!(
            "{}: {} {} {} bytes",
            camera.name,
            rec.file_name(),
            rec.start_time,
            rec.size_bytes
        );
        return outcome;
    }

    if mode.downloads() {
        if let Err(e) = download_recording(api, camera, rec, store) {
            error!("Failed to download {}: {e}", rec.file_name());
            error!(
                "Skipping {} from {} due to download failure",
                rec.file_name(),
                camera.name
            );
            outcome.error = Some(FailureKind::Download);
            return outcome;
        }
        outcome.downloaded = true;
    }

    if mode.deletes() {
        match delete_recording(api, camera, rec) {
            Ok(()) => outcome.deleted = true,
            Err(e) => {
                error!(
                    "Failed to delete {} from {}: {e}",
                    rec.file_name(),
                    camera.name
                );
                outcome.error = Some(FailureKind::Delete);
            }
        }
    }

    outcome
}

/// Stream `rec` into the local store, replacing any earlier copy.
pub fn download_recording(
    api: &impl CameraApi,
    camera: &CameraDescriptor,
    rec: &Recording,
    store: &LocalStore,
) -> Result<PathBuf, TransferError> {
    info!(
        "Downloading {} from {} ({} bytes)",
        rec.file_name(),
        camera.name,
        rec.size_bytes
    );

    let (path, written) = store.write(camera, rec, |out| api.download(&rec.remote_path, out))?;

    info!(
        "Downloaded {} to {} ({written} bytes)",
        rec.file_name(),
        path.display()
    );
    Ok(path)
}

/// Remove `rec` from the device's SD card.
pub fn delete_recording(
    api: &impl CameraApi,
    camera: &CameraDescriptor,
    rec: &Recording,
) -> Result<(), TransferError> {
    info!("Deleting {} from {}", rec.file_name(), camera.name);

    let status = api.delete(&rec.remote_path)?;
    if !delete_accepted(status) {
        return Err(TransferError::DeleteRejected(status));
    }

    info!("Successfully deleted {} from {}", rec.file_name(), camera.name);
    Ok(())
}

/// The device acknowledges a delete with `202 Accepted` and nothing else.
pub fn delete_accepted(status: StatusCode) -> bool {
    status == StatusCode::ACCEPTED
}
