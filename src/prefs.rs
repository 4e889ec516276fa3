use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::time::DateRange;
use crate::{AppError, AppResult};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Prefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_range: Option<DateRange>,
}

/// Handle to the persisted user preferences (currently the dashboard date
/// range). Constructed once at startup; the in-memory variant backs tests
/// and the demo binary.
#[derive(Debug, Clone)]
pub struct PrefsHandle {
    inner: Arc<Mutex<Prefs>>,
    path: Option<Arc<PathBuf>>,
}

impl PrefsHandle {
    pub fn in_memory() -> Self {
        PrefsHandle {
            inner: Arc::new(Mutex::new(Prefs::default())),
            path: None,
        }
    }

    /// Load preferences from `path`, tolerating a missing file.
    pub fn load_from(path: PathBuf) -> AppResult<Self> {
        let prefs = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "load_prefs")
                    .with_context("path", path.display().to_string())
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Prefs::default(),
            Err(err) => {
                return Err(AppError::from(err)
                    .with_context("operation", "load_prefs")
                    .with_context("path", path.display().to_string()))
            }
        };
        Ok(PrefsHandle {
            inner: Arc::new(Mutex::new(prefs)),
            path: Some(Arc::new(path)),
        })
    }

    /// Platform data directory location used by the binary.
    pub fn default_location() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("tallybook").join("prefs.json"))
    }

    pub fn date_range(&self) -> Option<DateRange> {
        let prefs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        prefs.date_range
    }

    pub fn set_date_range(&self, range: DateRange) -> AppResult<()> {
        {
            let mut prefs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            prefs.date_range = Some(range);
        }
        self.persist()
    }

    pub fn clear_date_range(&self) -> AppResult<()> {
        {
            let mut prefs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            prefs.date_range = None;
        }
        self.persist()
    }

    fn persist(&self) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = {
            let prefs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            prefs.clone()
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "persist_prefs")
                    .with_context("path", parent.display().to_string())
            })?;
        }
        let raw = serde_json::to_vec_pretty(&snapshot).map_err(AppError::from)?;
        fs::write(path.as_ref(), raw).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "persist_prefs")
                .with_context("path", path.display().to_string())
        })?;
        Ok(())
    }
}
