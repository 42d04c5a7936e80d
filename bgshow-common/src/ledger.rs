use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use crate::error::LedgerError;
use crate::playlist::ImageEntry;
use crate::Result;

/// Paths already displayed since the last reset, mirrored in an append-only
/// text file with one path per line.
#[derive(Debug, Clone)]
pub struct ShownLedger {
    path: PathBuf,
    shown: HashSet<String>,
}

impl ShownLedger {
    /// Default location: `$XDG_STATE_HOME/bgshow/shown.txt`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|dir| dir.join("bgshow").join("shown.txt"))
    }

    pub fn load(path: &Path) -> Self {
        let shown = match fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(contents) => contents
                    .lines()
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect(),
                Err(_) => {
                    log::warn!("Ledger {:?} is not valid UTF-8, treating it as empty", path);
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                log::warn!("Failed to read ledger {:?}, treating it as empty: {}", path, e);
                HashSet::new()
            }
        };

        log::debug!("Loaded {} shown images from {:?}", shown.len(), path);
        Self {
            path: path.to_path_buf(),
            shown,
        }
    }

    pub fn record_shown(&mut self, image: &Path) -> Result<()> {
        let key = image.to_string_lossy().to_string();
        if self.shown.contains(&key) {
            return Ok(());
        }

        self.append_line(&key).map_err(|e| LedgerError::Append {
            path: self.path.clone(),
            source: e,
        })?;
        self.shown.insert(key);
        Ok(())
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }

    pub fn reset(&mut self) -> Result<()> {
        log::info!("Resetting shown-image ledger {:?}", self.path);
        self.shown.clear();

        match File::create(&self.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LedgerError::Reset {
                path: self.path.clone(),
                source: e,
            }
            .into()),
        }
    }

    pub fn filter(&self, entries: Vec<ImageEntry>) -> Vec<ImageEntry> {
        if self.shown.is_empty() {
            return entries;
        }
        entries
            .into_iter()
            .filter(|entry| !self.contains(&entry.path))
            .collect()
    }

    pub fn contains(&self, image: &Path) -> bool {
        self.shown.contains(image.to_string_lossy().as_ref())
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
