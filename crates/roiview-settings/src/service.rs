//! Settings persistence behind a small service trait.

use crate::document::AppSettings;
use parking_lot::Mutex;
use roiview_core::{Result, RoiViewError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Saves and loads settings documents. The file-backed implementation is
/// the production one; the in-memory one exists for tests.
pub trait SettingsService: Send + Sync {
    fn save(&self, settings: &AppSettings, path: &Path) -> Result<()>;
    fn load(&self, path: &Path) -> Result<AppSettings>;
}

/// JSON files on disk.
#[derive(Debug, Default)]
pub struct JsonSettingsService;

impl SettingsService for JsonSettingsService {
    fn save(&self, settings: &AppSettings, path: &Path) -> Result<()> {
        let data = settings.to_json()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, data)?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<AppSettings> {
        let data = std::fs::read(path).map_err(|e| {
            RoiViewError::Settings(format!("cannot read {}: {e}", path.display()))
        })?;
        let settings = AppSettings::from_json(&data)?;
        info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }
}

/// Keeps documents in a map keyed by path.
#[derive(Debug, Default)]
pub struct MemorySettingsService {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl SettingsService for MemorySettingsService {
    fn save(&self, settings: &AppSettings, path: &Path) -> Result<()> {
        let data = settings.to_json()?;
        self.files.lock().insert(path.to_path_buf(), data);
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<AppSettings> {
        let files = self.files.lock();
        let data = files.get(path).ok_or_else(|| {
            RoiViewError::Settings(format!("no settings stored at {}", path.display()))
        })?;
        AppSettings::from_json(data)
    }
}
