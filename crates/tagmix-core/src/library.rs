//! Track library scanner
//!
//! A library is a plain directory tree, no database:
//!
//! ```text
//! <root>/
//!   sounds/track_<n>/   one folder per track, stems inside
//!   videos/             background clips, video_<n>.<ext> pairs with track n
//!   textures/           overlay images (logo)
//! ```
//!
//! Scanning happens once at startup and again is not needed: tracks are
//! selected by position in the scanned list, and stem order inside a track
//! fixes the marker IDs, so the listing must be deterministic (name-sorted).

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Stem formats the player can decode
pub const SOUND_EXTENSIONS: &[&str] = &["mp3", "wav", "flac"];
/// Background clip formats the render sink may play
pub const VIDEO_EXTENSIONS: &[&str] = &["avi", "wmv", "mpg", "mpeg", "mp4"];
/// Overlay image formats
pub const TEXTURE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Errors that make a library unusable
///
/// Everything below the root is soft: missing subdirectories or unreadable
/// entries shrink the listing instead of failing the scan.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("library root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// One stem file inside a track folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemAsset {
    /// Display name, the file name without its extension
    pub name: String,
    pub path: PathBuf,
}

/// One `track_<n>` folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFolder {
    /// The `<n>` from the folder name, used to pair background videos
    pub index: usize,
    pub path: PathBuf,
    /// Stems sorted by file name; position in this list is the marker ID
    pub stems: Vec<StemAsset>,
}

/// Scanned snapshot of a library root
#[derive(Debug, Clone)]
pub struct TrackLibrary {
    root: PathBuf,
    /// Track folders sorted by index (numeric, not lexicographic)
    tracks: Vec<TrackFolder>,
    /// Background clip file names, name-sorted
    videos: Vec<String>,
    /// Overlay texture file names, name-sorted
    textures: Vec<String>,
}

impl TrackLibrary {
    /// Scan `root` and build the library snapshot
    pub fn scan(root: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(LibraryError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(LibraryError::NotADirectory(root.to_path_buf()));
        }

        let tracks = scan_tracks(&root.join("sounds"));
        let videos = list_files_with_ext(&root.join("videos"), VIDEO_EXTENSIONS);
        let textures = list_files_with_ext(&root.join("textures"), TEXTURE_EXTENSIONS);

        if tracks.is_empty() {
            log::warn!("no track folders under {}", root.join("sounds").display());
        }
        log::info!(
            "library {}: {} tracks, {} videos, {} textures",
            root.display(),
            tracks.len(),
            videos.len(),
            textures.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            tracks,
            videos,
            textures,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Track at `position` in the scanned order
    pub fn track(&self, position: usize) -> Option<&TrackFolder> {
        self.tracks.get(position)
    }

    pub fn tracks(&self) -> &[TrackFolder] {
        &self.tracks
    }

    /// Background clip paired with track `index`, if one exists
    ///
    /// The pairing is by file stem: `video_<index>` with any recognized
    /// extension.
    pub fn background_video(&self, index: usize) -> Option<&str> {
        let want = format!("video_{index}");
        self.videos
            .iter()
            .find(|name| file_stem(name) == Some(want.as_str()))
            .map(String::as_str)
    }

    pub fn videos(&self) -> &[String] {
        &self.videos
    }

    /// Look up an overlay texture by exact file name
    pub fn texture(&self, file_name: &str) -> Option<&str> {
        self.textures
            .iter()
            .find(|name| name.as_str() == file_name)
            .map(String::as_str)
    }

    pub fn textures(&self) -> &[String] {
        &self.textures
    }
}

/// Collect `track_<n>` folders under the sounds directory, numerically sorted
fn scan_tracks(sounds_dir: &Path) -> Vec<TrackFolder> {
    let mut tracks: Vec<TrackFolder> = WalkDir::new(sounds_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| {
            let index = track_index(e.file_name().to_str()?)?;
            Some(TrackFolder {
                index,
                stems: scan_stems(e.path()),
                path: e.path().to_owned(),
            })
        })
        .collect();
    tracks.sort_by_key(|t| t.index);
    tracks
}

/// Stems of one track folder, name-sorted
fn scan_stems(track_dir: &Path) -> Vec<StemAsset> {
    let mut stems: Vec<StemAsset> = WalkDir::new(track_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| SOUND_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
                .unwrap_or(false)
        })
        .filter_map(|e| {
            let name = e.path().file_stem()?.to_str()?.to_string();
            Some(StemAsset {
                name,
                path: e.path().to_owned(),
            })
        })
        .collect();
    stems.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    stems
}

/// Files directly under `dir` carrying one of `exts`, name-sorted
fn list_files_with_ext(dir: &Path, exts: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_str()?;
            let ext = Path::new(name).extension()?.to_str()?;
            exts.iter()
                .any(|x| ext.eq_ignore_ascii_case(x))
                .then(|| name.to_string())
        })
        .collect();
    names.sort();
    names
}

fn track_index(folder_name: &str) -> Option<usize> {
    folder_name.strip_prefix("track_")?.parse().ok()
}

fn file_stem(file_name: &str) -> Option<&str> {
    Path::new(file_name).file_stem()?.to_str()
}
