//! Camera registry – the validated set of cameras a run may process.
//!
//! The registry is built once at startup from the `[cameras.<name>]`
//! tables of the config file.  Every entry is checked eagerly so that a
//! bad entry fails the run before any device is contacted.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::info;

/// One configured camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDescriptor {
    /// Unique key, also used as the prefix of downloaded file names.
    pub name: String,
    /// Storage sub-directory under the download root.
    pub id: String,
    /// `host`, `host:port` or a full `http://` URL.
    pub address: String,
}

impl CameraDescriptor {
    /// HTTP base URL of the device, without a trailing slash.
    pub fn endpoint(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        }
    }
}

impl fmt::Display for CameraDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Configuration problems.  All of them are fatal and are raised before
/// any camera is processed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No cameras configured. Add [cameras.<name>] tables to the config file")]
    NoCameras,

    #[error("Camera '{name}' is invalid: {reason}")]
    InvalidCamera { name: String, reason: String },

    #[error("Camera '{name}' not found. Available cameras: {available}")]
    UnknownCamera { name: String, available: String },

    #[error(
        "Multiple cameras available. Please specify one with -c or use -a for all. \
         Available: {available}"
    )]
    AmbiguousSelection { available: String },

    #[error("Missing credential '{0}' in secrets file")]
    MissingCredential(&'static str),
}

/// Which cameras the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Named(String),
    /// Nothing specified: only valid when exactly one camera exists.
    Default,
}

/// Validated, non-empty set of cameras ordered by name.
#[derive(Debug, Clone)]
pub struct CameraRegistry {
    cameras: BTreeMap<String, CameraDescriptor>,
}

impl CameraRegistry {
    pub fn new(
        cameras: impl IntoIterator<Item = CameraDescriptor>,
    ) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for camera in cameras {
            validate(&camera)?;
            if map.contains_key(&camera.name) {
                return Err(ConfigError::InvalidCamera {
                    name: camera.name,
                    reason: "duplicate name".into(),
                });
            }
            map.insert(camera.name.clone(), camera);
        }

        if map.is_empty() {
            return Err(ConfigError::NoCameras);
        }
        Ok(Self { cameras: map })
    }

    // never empty once built
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn get(&self, name: &str) -> Option<&CameraDescriptor> {
        self.cameras.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CameraDescriptor> {
        self.cameras.values()
    }

    /// Resolve a [`Selection`] into the cameras to process, in name order.
    pub fn select(&self, selection: &Selection) -> Result<Vec<&CameraDescriptor>, ConfigError> {
        match selection {
            Selection::All => Ok(self.iter().collect()),
            Selection::Named(name) => match self.get(name) {
                Some(camera) => Ok(vec![camera]),
                None => Err(ConfigError::UnknownCamera {
                    name: name.clone(),
                    available: self.available(),
                }),
            },
            Selection::Default => {
                if self.len() == 1 {
                    let camera = self.iter().next().ok_or(ConfigError::NoCameras)?;
                    info!("No camera specified, using: {}", camera.name);
                    Ok(vec![camera])
                } else {
                    Err(ConfigError::AmbiguousSelection {
                        available: self.available(),
                    })
                }
            }
        }
    }

    fn available(&self) -> String {
        self.cameras.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn validate(camera: &CameraDescriptor) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidCamera {
        name: camera.name.clone(),
        reason: reason.to_string(),
    };

    // name and id end up in local file paths
    if !is_path_component(&camera.name) {
        return Err(invalid("name must be a plain file name component"));
    }
    if !is_path_component(&camera.id) {
        return Err(invalid("id must be a plain directory name"));
    }
    if camera.address.trim().is_empty() {
        return Err(invalid("ip_address is empty"));
    }
    Ok(())
}

fn is_path_component(s: &str) -> bool {
    !s.trim().is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(name: &str, id: &str) -> CameraDescriptor {
        CameraDescriptor {
            name: name.into(),
            id: id.into(),
            address: "192.168.1.50".into(),
        }
    }

    #[test]
    fn test_empty_registry_rejected() {
        let err = CameraRegistry::new(Vec::new()).unwrap_err();
        assert_eq!(err, ConfigError::NoCameras);
    }

    #[test]
    fn test_invalid_id_rejected() {
        let err = CameraRegistry::new(vec![camera("yard", "../etc")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCamera { .. }));

        let err = CameraRegistry::new(vec![camera("yard", "")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCamera { .. }));
    }

    #[test]
    fn test_default_selection_single_camera() {
        let reg = CameraRegistry::new(vec![camera("yard", "cam01")]).unwrap();
        let selected = reg.select(&Selection::Default).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "yard");
    }

    #[test]
    fn test_default_selection_ambiguous() {
        let reg =
            CameraRegistry::new(vec![camera("yard", "cam01"), camera("gate", "cam02")]).unwrap();
        let err = reg.select(&Selection::Default).unwrap_err();
        assert_eq!(
            err,
            ConfigError::AmbiguousSelection {
                available: "gate, yard".into()
            }
        );
    }

    #[test]
    fn test_named_and_all_selection() {
        let reg =
            CameraRegistry::new(vec![camera("yard", "cam01"), camera("gate", "cam02")]).unwrap();

        let named = reg.select(&Selection::Named("yard".into())).unwrap();
        assert_eq!(named[0].id, "cam01");

        let all: Vec<&str> = reg
            .select(&Selection::All)
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(all, ["gate", "yard"]);

        let err = reg.select(&Selection::Named("porch".into())).unwrap_err();
        assert!(err.to_string().contains("Available cameras: gate, yard"));
    }

    #[test]
    fn test_endpoint() {
        let mut c = camera("yard", "cam01");
        assert_eq!(c.endpoint(), "http://192.168.1.50");
        c.address = "http://10.0.0.2:8080/".into();
        assert_eq!(c.endpoint(), "http://10.0.0.2:8080");
    }
}
