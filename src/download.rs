//! Image download action of the detail screen.
//!
//! The image is the bundled placeholder, the same file whichever sheet is on
//! screen. Where it goes depends on [`DownloadTarget`]: the "browser" route
//! saves into the download directory and hands the file to the system opener,
//! the "gallery" route saves into the picture directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, DownloadTarget};

/// Bundled placeholder sheet image.
pub const PLACEHOLDER_IMAGE: &[u8] = include_bytes!("../assets/partitura.png");
const IMAGE_STEM: &str = "partitura";
const IMAGE_EXTENSION: &str = "png";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("no directory available to save the image")]
    NoTargetDirectory,
    #[error("could not write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Which route a download took, after `Auto` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    Browser,
    Gallery,
}

/// Result of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub path: PathBuf,
    pub target: ResolvedTarget,
}

impl SavedImage {
    /// Text for the confirmation alert.
    pub fn confirmation(&self) -> String {
        match self.target {
            ResolvedTarget::Browser => format!("Imagen descargada en {}", self.path.display()),
            ResolvedTarget::Gallery => {
                format!("Imagen descargada en la galería ({})", self.path.display())
            }
        }
    }
}

/// Saves the placeholder image. Directory lookup happens once at
/// construction so tests can point it anywhere.
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    target: ResolvedTarget,
    directory: Option<PathBuf>,
    open_after_save: bool,
}

impl ImageDownloader {
    /// Resolve the target and directory from configuration and the user's
    /// platform directories.
    pub fn from_config(config: &Config) -> Self {
        let user_dirs = UserDirs::new();
        let pictures = user_dirs
            .as_ref()
            .and_then(|dirs| dirs.picture_dir().map(Path::to_path_buf));
        let downloads = user_dirs
            .as_ref()
            .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf));
        let home = user_dirs.as_ref().map(|dirs| dirs.home_dir().to_path_buf());

        let target = match config.download_target {
            DownloadTarget::Browser => ResolvedTarget::Browser,
            DownloadTarget::Gallery => ResolvedTarget::Gallery,
            DownloadTarget::Auto if pictures.is_some() => ResolvedTarget::Gallery,
            DownloadTarget::Auto => ResolvedTarget::Browser,
        };
        let platform_dir = match target {
            ResolvedTarget::Gallery => pictures,
            ResolvedTarget::Browser => downloads,
        };
        let directory = config.download_dir.clone().or(platform_dir).or(home);

        Self {
            target,
            directory,
            open_after_save: target == ResolvedTarget::Browser,
        }
    }

    /// Downloader writing into `directory` and never launching the opener.
    pub fn with_directory(target: ResolvedTarget, directory: impl Into<PathBuf>) -> Self {
        Self {
            target,
            directory: Some(directory.into()),
            open_after_save: false,
        }
    }

    pub fn target(&self) -> ResolvedTarget {
        self.target
    }

    /// Write the placeholder into the target directory under a name that does
    /// not clash with earlier downloads.
    pub fn save_placeholder(&self) -> Result<SavedImage, MediaError> {
        let directory = self.directory.as_ref().ok_or(MediaError::NoTargetDirectory)?;
        fs::create_dir_all(directory).map_err(|source| MediaError::Write {
            path: directory.clone(),
            source,
        })?;

        let path = unique_path(directory, IMAGE_STEM, IMAGE_EXTENSION);
        fs::write(&path, PLACEHOLDER_IMAGE).map_err(|source| MediaError::Write {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), target = ?self.target, "saved sheet image");

        if self.open_after_save {
            if let Err(err) = open::that(&path) {
                warn!(path = %path.display(), error = %err, "failed to open downloaded image");
            }
        }

        Ok(SavedImage {
            path,
            target: self.target,
        })
    }
}

/// `stem.ext`, then `stem-1.ext`, `stem-2.ext`, ... until a free name is found.
pub(crate) fn unique_path(directory: &Path, stem: &str, extension: &str) -> PathBuf {
    let first = directory.join(format!("{stem}.{extension}"));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| directory.join(format!("{stem}-{n}.{extension}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
