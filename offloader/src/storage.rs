//! Local download tree: `<root>/<camera id>/<camera>-<YYYYMMDD>-<HHMMSS>.<ext>`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use jennov_common::camera::CameraDescriptor;
use jennov_common::protocol::Recording;

use crate::client::DeviceError;
use crate::transfer::TransferError;

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    extension: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn camera_dir(&self, camera: &CameraDescriptor) -> PathBuf {
        self.root.join(&camera.id)
    }

    /// Deterministic local path of `rec`; the same recording always maps
    /// to the same file.
    pub fn path_for(&self, camera: &CameraDescriptor, rec: &Recording) -> PathBuf {
        self.camera_dir(camera)
            .join(rec.local_file_name(&camera.name, &self.extension))
    }

    /// Write a recording through `fill` and move it into place.
    ///
    /// Data goes to `<path>.part` first and is renamed over `<path>` only
    /// when `fill` succeeds, so an existing copy is replaced but never
    /// clobbered by a failed transfer.  The camera directory is created
    /// on demand.
    pub fn write<F>(
        &self,
        camera: &CameraDescriptor,
        rec: &Recording,
        fill: F,
    ) -> Result<(PathBuf, u64), TransferError>
    where
        F: FnOnce(&mut dyn Write) -> Result<u64, DeviceError>,
    {
        let dir = self.camera_dir(camera);
        std::fs::create_dir_all(&dir).map_err(|source| TransferError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = self.path_for(camera, rec);
        let part = part_path(&path);
        let file = File::create(&part).map_err(|source| TransferError::Io {
            path: part.clone(),
            source,
        })?;

        let mut out = BufWriter::new(file);
        let result = fill(&mut out).and_then(|written| {
            out.flush()?;
            Ok(written)
        });
        drop(out);

        match result {
            Ok(written) => {
                std::fs::rename(&part, &path).map_err(|source| TransferError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok((path, written))
            }
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&part) {
                    warn!("Cannot remove {}: {rm}", part.display());
                }
                Err(e.into())
            }
        }
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
