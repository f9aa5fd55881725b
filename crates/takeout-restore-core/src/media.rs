use std::path::{Path, PathBuf};

use crate::extras;
use crate::matcher::MatcherConfig;

/// Raw-camera extensions mime_guess does not classify as images.
const RAW_EXTENSIONS: &[&str] = &[
    "raw", "cr2", "nef", "arw", "dng", "orf", "rw2", "pef", "srw",
];

/// Check if a path points at a supported media file.
pub fn is_media_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if let Some(mime) = mime_guess::from_path(name).first() {
        if mime.type_() == mime_guess::mime::IMAGE || mime.type_() == mime_guess::mime::VIDEO {
            return true;
        }
    }
    let lower = name.to_lowercase();
    lower.ends_with(".mts")
        || RAW_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// Check if a path points at a video file (needs QuickTime date tags).
pub fn is_video_file(path: &Path) -> bool {
    if let Some(mime) = mime_guess::from_path(path).first() {
        if mime.type_() == mime_guess::mime::VIDEO {
            return true;
        }
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("mts"))
}

/// A media file scheduled for metadata restoration.
#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub path: PathBuf,
    /// Full file name including extension.
    pub filename: String,
    /// File name minus the final extension.
    pub base_name: String,
    /// Final extension, lowercase, without the dot. Empty if none.
    pub extension: String,
    /// Base name with counters and edited suffixes stripped.
    pub logical_name: String,
}

impl MediaEntry {
    /// Build an entry from a path. Returns None if the path has no usable
    /// file name.
    pub fn new(path: PathBuf, config: &MatcherConfig) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        let base_name = Path::new(&filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&filename)
            .to_string();
        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let logical_name = extras::logical_name(&base_name, &config.edited_suffixes);
        Some(Self {
            path,
            filename,
            base_name,
            extension,
            logical_name,
        })
    }
}
