use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};

use crate::media;
use crate::sidecar::TakeoutMetadata;

/// Raised when ExifTool is required but cannot be located.
#[derive(Debug, thiserror::Error)]
#[error("exiftool not found; install it or pass --exiftool <path>")]
pub struct ExifToolNotFound;

/// Locate the ExifTool binary: explicit path, then `EXIFTOOL_PATH`, then `PATH`.
pub fn find_exiftool(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        return None;
    }

    if let Some(env_path) = env::var_os("EXIFTOOL_PATH") {
        let path = PathBuf::from(env_path);
        if path.is_file() {
            return Some(path);
        }
    }

    let exe = if cfg!(windows) {
        "exiftool.exe"
    } else {
        "exiftool"
    };
    for dir in env::split_paths(&env::var_os("PATH")?) {
        let candidate = dir.join(exe);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn format_exif_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y:%m:%d %H:%M:%S").to_string()
}

/// Build the ExifTool tag assignments for one media file. Pure, so the
/// argument set is testable without spawning anything.
pub fn exiftool_args(media_path: &Path, metadata: &TakeoutMetadata) -> Vec<String> {
    let mut args = vec!["-overwrite_original".to_string(), "-q".to_string()];

    if let Some(date) = metadata.best_date() {
        let stamp = format_exif_date(&date);
        args.push(format!("-DateTimeOriginal={stamp}"));
        args.push(format!("-CreateDate={stamp}"));
        args.push(format!("-ModifyDate={stamp}"));
        if media::is_video_file(media_path) {
            args.push(format!("-MediaCreateDate={stamp}"));
            args.push(format!("-MediaModifyDate={stamp}"));
            args.push(format!("-TrackCreateDate={stamp}"));
            args.push(format!("-TrackModifyDate={stamp}"));
        }
    }

    if let Some(geo) = metadata.best_geo() {
        let lat_ref = if geo.latitude >= 0.0 { "N" } else { "S" };
        let lon_ref = if geo.longitude >= 0.0 { "E" } else { "W" };
        args.push(format!("-GPSLatitude={}", geo.latitude.abs()));
        args.push(format!("-GPSLatitudeRef={lat_ref}"));
        args.push(format!("-GPSLongitude={}", geo.longitude.abs()));
        args.push(format!("-GPSLongitudeRef={lon_ref}"));
        if geo.altitude != 0.0 {
            args.push(format!("-GPSAltitude={}", geo.altitude.abs()));
            args.push(format!(
                "-GPSAltitudeRef={}",
                if geo.altitude >= 0.0 { 0 } else { 1 }
            ));
        }
    }

    if !metadata.description.is_empty() {
        args.push(format!("-ImageDescription={}", metadata.description));
        args.push(format!("-Description={}", metadata.description));
        args.push(format!("-Caption-Abstract={}", metadata.description));
        args.push(format!("-XPComment={}", metadata.description));
    }

    args.push(media_path.to_string_lossy().into_owned());
    args
}

/// Writes sidecar metadata into media files. When ExifTool is unavailable the
/// injector degrades to setting filesystem dates only.
pub struct Injector {
    exiftool: Option<PathBuf>,
    update_file_dates: bool,
    dry_run: bool,
}

impl Injector {
    pub fn new(exiftool: Option<PathBuf>, update_file_dates: bool, dry_run: bool) -> Self {
        Self {
            exiftool,
            update_file_dates,
            dry_run,
        }
    }

    /// Apply metadata to one file. Per-file failures surface as errors the
    /// caller collects into the batch warnings; they never abort the run.
    pub fn inject(&self, media_path: &Path, metadata: &TakeoutMetadata) -> anyhow::Result<()> {
        if self.dry_run {
            return Ok(());
        }

        if let Some(exiftool) = &self.exiftool {
            let args = exiftool_args(media_path, metadata);
            let output = Command::new(exiftool)
                .args(&args)
                .output()
                .with_context(|| format!("running {}", exiftool.display()))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                bail!(
                    "exiftool failed for {}: {}",
                    media_path.display(),
                    stderr.trim()
                );
            }
        }

        if self.update_file_dates {
            if let Some(date) = metadata.best_date() {
                let ft = filetime::FileTime::from_unix_time(date.timestamp(), 0);
                filetime::set_file_mtime(media_path, ft)
                    .with_context(|| format!("setting mtime on {}", media_path.display()))?;
            }
        }

        Ok(())
    }
}
