use crate::error::{PulseError, Result};
use crate::model::{DateRange, Granularity, TimeSeriesDocument};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

pub const DEFAULT_DATA_DIR: &str = "data";

/// `<repo>_<start>_to_<end>_<granularity>.json`; identical parameters always
/// produce the same name so re-runs replace the previous artifact.
pub fn artifact_filename(repo_name: &str, range: &DateRange, granularity: Granularity) -> String {
    format!(
        "{repo_name}_{}_to_{}_{granularity}.json",
        range.start().format("%Y-%m-%d"),
        range.end().format("%Y-%m-%d")
    )
}

/// Rejects anything that is not a bare file name.
pub fn validate_filename(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(PulseError::InvalidInput(format!("Invalid filename: '{name}'")));
    }
    Ok(())
}

/// A directory of collected artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact names, most recently modified first.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Err(PulseError::NotFound("data directory".to_string()));
        }

        let mut entries: Vec<(SystemTime, String)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(".json") || !entry.file_type()?.is_file() {
                continue;
            }
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((modified, name));
        }

        entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(entries.into_iter().map(|(_, name)| name).collect())
    }

    pub fn read_raw(&self, name: &str) -> Result<serde_json::Value> {
        validate_filename(name)?;
        let path = self.dir.join(name);
        debug!(artifact = name, "reading artifact");

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PulseError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub fn load(&self, name: &str) -> Result<TimeSeriesDocument> {
        let document = TimeSeriesDocument::from_value(self.read_raw(name)?)?;
        if !document.is_dense() {
            warn!(artifact = name, "artifact has missing or unexpected count keys");
        }
        Ok(document)
    }

    /// Writes through a temporary sibling and renames, so readers never see a
    /// half-written artifact.
    pub fn save(&self, name: &str, document: &TimeSeriesDocument) -> Result<PathBuf> {
        validate_filename(name)?;
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let json = serde_json::to_string_pretty(document)?;

        if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(path = %path.display(), "artifact written");
        Ok(path)
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}
