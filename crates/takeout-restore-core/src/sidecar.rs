use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::extras;
use crate::matcher::MatcherConfig;

/// Epoch seconds as Google writes them: sometimes a string, sometimes a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Epoch {
    Text(String),
    Number(i64),
}

impl Epoch {
    pub fn seconds(&self) -> Option<i64> {
        match self {
            Epoch::Text(s) => s.parse().ok(),
            Epoch::Number(n) => Some(*n),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TakeoutTimestamp {
    #[serde(default)]
    pub timestamp: Option<Epoch>,
    #[serde(default)]
    pub formatted: Option<String>,
}

impl TakeoutTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = self.timestamp.as_ref()?.seconds()?;
        DateTime::from_timestamp(secs, 0)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoData {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

impl GeoData {
    /// Google writes all-zero coordinates when no location was recorded.
    pub fn is_valid(&self) -> bool {
        !(self.latitude == 0.0 && self.longitude == 0.0)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Person {
    #[serde(default)]
    pub name: String,
}

/// Typed view of a Google Takeout sidecar. Only `title` is required;
/// absence of any other field is not an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoutMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photo_taken_time: Option<TakeoutTimestamp>,
    #[serde(default)]
    pub creation_time: Option<TakeoutTimestamp>,
    #[serde(default)]
    pub geo_data: Option<GeoData>,
    #[serde(default)]
    pub geo_data_exif: Option<GeoData>,
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub url: String,
}

impl TakeoutMetadata {
    pub fn parse(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Photo-taken time preferred over upload/creation time.
    pub fn best_date(&self) -> Option<DateTime<Utc>> {
        self.photo_taken_time
            .as_ref()
            .and_then(|t| t.to_datetime())
            .or_else(|| self.creation_time.as_ref().and_then(|t| t.to_datetime()))
    }

    /// EXIF-sourced coordinates preferred over Google's own geo data.
    pub fn best_geo(&self) -> Option<GeoData> {
        self.geo_data_exif
            .filter(|g| g.is_valid())
            .or(self.geo_data.filter(|g| g.is_valid()))
    }

    pub fn has_useful_metadata(&self) -> bool {
        self.best_date().is_some() || self.best_geo().is_some() || !self.description.is_empty()
    }
}

/// A sidecar JSON file with the media name it claims to describe.
#[derive(Debug, Clone)]
pub struct SidecarEntry {
    pub path: PathBuf,
    /// Full sidecar file name including `.json`.
    pub filename: String,
    /// Media file name derived from the sidecar name (suffix stripped),
    /// falling back to the JSON `title` field.
    pub media_name: String,
    /// Normalized form of the media base name, for fallback comparison.
    pub logical_name: String,
    pub metadata: TakeoutMetadata,
}

impl SidecarEntry {
    pub fn new(path: PathBuf, metadata: TakeoutMetadata, config: &MatcherConfig) -> Self {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let media_name = derive_media_name(&filename, &config.sidecar_suffixes)
            .map(|s| s.to_string())
            .unwrap_or_else(|| metadata.title.clone());
        let base = Path::new(&media_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&media_name);
        let logical_name = extras::logical_name(base, &config.edited_suffixes);
        Self {
            path,
            filename,
            media_name,
            logical_name,
            metadata,
        }
    }

    pub fn load(path: &Path, config: &MatcherConfig) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let metadata = TakeoutMetadata::parse(&bytes)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Self::new(path.to_path_buf(), metadata, config))
    }
}

/// Strip the first matching sidecar suffix from a sidecar file name.
/// `photo.jpg.supplemental-metadata.json` -> `photo.jpg`.
pub fn derive_media_name<'a>(sidecar_name: &'a str, suffixes: &[String]) -> Option<&'a str> {
    for suffix in suffixes {
        if let Some(head) = extras::strip_suffix_ascii_ci(sidecar_name, suffix) {
            if !head.is_empty() {
                return Some(head);
            }
        }
    }
    None
}

/// Load a batch of sidecars, turning unreadable or unparsable files into
/// diagnostics instead of aborting the batch.
pub fn load_sidecars(
    paths: &[PathBuf],
    config: &MatcherConfig,
) -> (Vec<SidecarEntry>, Vec<String>) {
    let mut entries = Vec::with_capacity(paths.len());
    let mut diagnostics = Vec::new();
    for path in paths {
        match SidecarEntry::load(path, config) {
            Ok(entry) => entries.push(entry),
            Err(e) => diagnostics.push(format!("unreadable sidecar: {e:#}")),
        }
    }
    (entries, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "title": "IMG_1234.jpg",
        "description": "sunset at the pier",
        "photoTakenTime": {"timestamp": "1609459200", "formatted": "Jan 1, 2021, 12:00:00 AM UTC"},
        "creationTime": {"timestamp": 1612137600},
        "geoData": {"latitude": 35.6812, "longitude": 139.7671, "altitude": 40.0},
        "geoDataExif": {"latitude": 0.0, "longitude": 0.0, "altitude": 0.0},
        "people": [{"name": "A"}],
        "url": "https://photos.google.com/photo/x"
    }"#;

    #[test]
    fn test_parse_full() {
        let m = TakeoutMetadata::parse(FULL.as_bytes()).unwrap();
        assert_eq!(m.title, "IMG_1234.jpg");
        assert_eq!(m.best_date().unwrap().timestamp(), 1609459200);
        // geoDataExif is all-zero, so geoData wins
        let geo = m.best_geo().unwrap();
        assert!((geo.latitude - 35.6812).abs() < 1e-9);
        assert!(m.has_useful_metadata());
    }

    #[test]
    fn test_parse_title_only() {
        let m = TakeoutMetadata::parse(br#"{"title": "clip.mp4"}"#).unwrap();
        assert_eq!(m.title, "clip.mp4");
        assert!(m.best_date().is_none());
        assert!(m.best_geo().is_none());
        assert!(!m.has_useful_metadata());
    }

    #[test]
    fn test_parse_numeric_timestamp() {
        let m = TakeoutMetadata::parse(
            br#"{"title": "a.jpg", "photoTakenTime": {"timestamp": 1609459200}}"#,
        )
        .unwrap();
        assert_eq!(m.best_date().unwrap().timestamp(), 1609459200);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(TakeoutMetadata::parse(b"{not json").is_err());
        assert!(TakeoutMetadata::parse(br#"{"description": "no title"}"#).is_err());
    }

    #[test]
    fn test_derive_media_name() {
        let suffixes: Vec<String> = extras::SIDECAR_SUFFIXES
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            derive_media_name("photo.jpg.json", &suffixes),
            Some("photo.jpg")
        );
        assert_eq!(
            derive_media_name("photo.jpg.supplemental-metadata.json", &suffixes),
            Some("photo.jpg")
        );
        assert_eq!(derive_media_name("metadata.csv", &suffixes), None);
    }

    #[test]
    fn test_entry_names() {
        let config = MatcherConfig::default();
        let meta = TakeoutMetadata::parse(br#"{"title": "photo-edited.jpg"}"#).unwrap();
        let e = SidecarEntry::new(
            PathBuf::from("album/photo-edited.jpg.json"),
            meta,
            &config,
        );
        assert_eq!(e.media_name, "photo-edited.jpg");
        assert_eq!(e.logical_name, "photo");
    }
}
