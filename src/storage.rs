//! # Bind Storage
//!
//! Persistence of session parameters between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::openlrs::bind_data::SessionParameters;

/// Load/save access to persisted session parameters
#[cfg_attr(test, mockall::automock)]
pub trait BindStore {
    /// Stored parameters, or `None` when nothing was saved yet
    fn load(&self) -> Result<Option<SessionParameters>>;

    /// Persist parameters after a successful bind
    fn save(&mut self, params: &SessionParameters) -> Result<()>;
}

/// On-disk record
#[derive(Debug, Serialize, Deserialize)]
struct BindRecord {
    saved_at: DateTime<Utc>,
    params: SessionParameters,
}

/// JSON file backed [`BindStore`]
#[derive(Debug, Clone)]
pub struct FileBindStore {
    path: PathBuf,
}

impl FileBindStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BindStore for FileBindStore {
    fn load(&self) -> Result<Option<SessionParameters>> {
        if !self.path.exists() {
            debug!("No bind file at {}", self.path.display());
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let record: BindRecord = serde_json::from_str(&contents)?;
        debug!("Loaded bind data saved at {}", record.saved_at);

        Ok(Some(record.params))
    }

    fn save(&mut self, params: &SessionParameters) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let record = BindRecord {
            saved_at: Utc::now(),
            params: *params,
        };
        fs::write(&self.path, serde_json::to_string_pretty(&record)?)?;
        info!("Bind data saved to {}", self.path.display());

        Ok(())
    }
}
