//! Model files and external tools used by the recognizers.

// Model helpers are only reached when ocr-ocrs or ocr-paddle is enabled
#![cfg_attr(
    not(any(feature = "ocr-ocrs", feature = "ocr-paddle")),
    allow(dead_code)
)]

use std::path::{Path, PathBuf};
use std::process::Command;

use super::backend::RecognizerError;

/// Command-line downloaders, tried in order: (binary, args before `<dest> <url>`).
const DOWNLOADERS: &[(&str, &[&str])] = &[("curl", &["-fsSL", "-o"]), ("wget", &["-q", "-O"])];

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// One downloadable model file.
pub struct ModelSpec {
    pub url: &'static str,
    pub filename: &'static str,
    /// Approximate size, shown while downloading.
    pub size_hint: &'static str,
}

/// Where an engine keeps its models and which files make a complete set.
pub struct ModelStore {
    /// Directory name under the data dir, e.g. "ocrs".
    pub subdir: &'static str,
    pub required_files: &'static [&'static str],
}

impl ModelStore {
    /// `<data dir>/tilesolver/<subdir>`, where downloads land.
    pub fn default_dir(&self) -> PathBuf {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tilesolver")
            .join(self.subdir)
    }

    /// Directories searched for an existing model set, best first.
    pub fn search_dirs(&self, configured: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        dirs.extend(configured.cloned());
        dirs.push(self.default_dir());
        dirs.extend(dirs::data_dir().map(|d| d.join(self.subdir).join("models")));
        dirs.extend(dirs::home_dir().map(|d| d.join(format!(".{}", self.subdir)).join("models")));
        dirs.push(Path::new("models").join(self.subdir));
        dirs
    }

    /// True when `dir` holds every required file.
    pub fn is_complete(&self, dir: &Path) -> bool {
        self.required_files.iter().all(|file| dir.join(file).is_file())
    }

    /// First search directory holding a complete model set.
    pub fn locate(&self, configured: Option<&PathBuf>) -> Option<PathBuf> {
        self.search_dirs(configured)
            .into_iter()
            .find(|dir| self.is_complete(dir))
    }

    /// Return a directory with a complete model set, downloading into the
    /// default directory when none exists yet.
    pub fn ensure(
        &self,
        configured: Option<&PathBuf>,
        specs: &[&ModelSpec],
    ) -> Result<PathBuf, RecognizerError> {
        if let Some(dir) = self.locate(configured) {
            return Ok(dir);
        }

        let dir = self.default_dir();
        std::fs::create_dir_all(&dir)?;
        for spec in specs {
            let dest = dir.join(spec.filename);
            if dest.is_file() {
                continue;
            }
            tracing::info!("Downloading {} (~{})", spec.filename, spec.size_hint);
            download_file(spec.url, &dest)?;
        }

        if !self.is_complete(&dir) {
            return Err(RecognizerError::ModelNotFound(format!(
                "{} models incomplete in {}",
                self.subdir,
                dir.display()
            )));
        }
        Ok(dir)
    }

    /// Describe where models are, or where they will be downloaded.
    pub fn availability_hint(
        &self,
        configured: Option<&PathBuf>,
        engine_name: &str,
        total_size: &str,
    ) -> String {
        match self.locate(configured) {
            Some(dir) => format!("{} models found at {}", engine_name, dir.display()),
            None => format!(
                "{} models will be auto-downloaded on first use (~{}) to {}",
                engine_name,
                total_size,
                self.default_dir().display()
            ),
        }
    }
}

/// Download `url` to `dest` with the first available downloader.
pub fn download_file(url: &str, dest: &Path) -> Result<(), RecognizerError> {
    let (binary, args) = DOWNLOADERS
        .iter()
        .find(|(binary, _)| check_binary(binary))
        .ok_or_else(|| {
            RecognizerError::NotAvailable(
                "Neither curl nor wget found. Install one to download models.".to_string(),
            )
        })?;

    let status = Command::new(binary).args(*args).arg(dest).arg(url).status()?;
    if !status.success() {
        // Don't leave a truncated model behind for the next lookup
        let _ = std::fs::remove_file(dest);
        return Err(RecognizerError::OcrFailed(format!(
            "{} failed to download {}",
            binary, url
        )));
    }
    Ok(())
}
