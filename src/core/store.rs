//! Profile and settings persistence (pretty JSON files)
//!
//! Run-time binding state is never written. A freshly loaded set still has
//! to go through `BindingEngine::normalize` before its first frame.

use std::path::Path;
use tracing::{error, info, warn};
use crate::types::{ProfileError, ProfileSet, Settings};

/// Save profile set as pretty JSON; creates the parent directory
pub fn save_profiles(set: &ProfileSet, path: impl AsRef<Path>) -> Result<(), ProfileError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(set)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, json)?;

    info!(path = %path.display(), profiles = set.len(), "profiles saved");
    Ok(())
}

/// Load and validate a profile set
pub fn load_profiles(path: impl AsRef<Path>) -> Result<ProfileSet, ProfileError> {
    let json = std::fs::read_to_string(path.as_ref())?;
    let mut set: ProfileSet = serde_json::from_str(&json)?;
    set.validate()?;
    set.clamp_selection();
    Ok(set)
}

/// Load a profile set, falling back to an empty one on any error
pub fn load_profiles_or_default(path: impl AsRef<Path>) -> ProfileSet {
    let path = path.as_ref();
    match load_profiles(path) {
        Ok(set) => {
            info!(path = %path.display(), profiles = set.len(), "profiles loaded");
            set
        }
        Err(ProfileError::Io(ref err)) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "no profile file, starting empty");
            ProfileSet::new()
        }
        Err(err) => {
            error!(path = %path.display(), "cannot load profiles: {}", err);
            ProfileSet::new()
        }
    }
}

/// Load settings, falling back to defaults on any error
pub fn load_settings(path: impl AsRef<Path>) -> Settings {
    let path = path.as_ref();
    let loaded = std::fs::read_to_string(path)
        .map_err(ProfileError::from)
        .and_then(|json| serde_json::from_str(&json).map_err(ProfileError::from));

    match loaded {
        Ok(settings) => settings,
        Err(err) => {
            warn!(path = %path.display(), "using default settings: {}", err);
            Settings::default()
        }
    }
}
