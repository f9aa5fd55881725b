use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use encoding_rs::SHIFT_JIS;

use crate::ThrottledProgress;

/// Result of the extraction stage.
#[derive(Debug, Default)]
pub struct ExtractResult {
    pub archives_extracted: u64,
    pub files_extracted: u64,
    pub warnings: Vec<String>,
}

/// Decode a raw ZIP entry name, trying UTF-8 first, then Shift_JIS.
fn decode_zip_name(raw: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_string();
    }

    let (decoded, _, had_errors) = SHIFT_JIS.decode(raw);
    if !had_errors {
        return decoded.into_owned();
    }

    String::from_utf8_lossy(raw).into_owned()
}

/// Find ZIP archives directly under `input` (or `input` itself), sorted.
pub fn find_zip_files(input: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut zips = Vec::new();

    if input.is_file() {
        if has_zip_extension(input) {
            zips.push(input.to_path_buf());
        }
    } else if input.is_dir() {
        for entry in fs::read_dir(input)
            .with_context(|| format!("listing {}", input.display()))?
            .flatten()
        {
            let path = entry.path();
            if path.is_file() && has_zip_extension(&path) {
                zips.push(path);
            }
        }
    }

    zips.sort();
    Ok(zips)
}

fn has_zip_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("zip"))
}

/// Extract all Takeout archives under `input` into `output`, preserving
/// internal structure. macOS resource forks are skipped; a corrupt archive
/// becomes a warning rather than aborting the run.
pub fn extract_all(
    input: &Path,
    output: &Path,
    delete_after: bool,
    progress: &ThrottledProgress,
) -> anyhow::Result<ExtractResult> {
    let zips = find_zip_files(input)?;
    let mut result = ExtractResult::default();

    if zips.is_empty() {
        result
            .warnings
            .push(format!("no zip archives found under {}", input.display()));
        return Ok(result);
    }

    fs::create_dir_all(output)?;

    for zip_path in &zips {
        match extract_one(zip_path, output, progress) {
            Ok(count) => {
                result.archives_extracted += 1;
                result.files_extracted += count;
                if delete_after {
                    if let Err(e) = fs::remove_file(zip_path) {
                        result
                            .warnings
                            .push(format!("could not delete {}: {e}", zip_path.display()));
                    }
                }
            }
            Err(e) => {
                result
                    .warnings
                    .push(format!("skipping {}: {e:#}", zip_path.display()));
            }
        }
    }

    Ok(result)
}

fn extract_one(
    zip_path: &Path,
    output: &Path,
    progress: &ThrottledProgress,
) -> anyhow::Result<u64> {
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("opening {}", zip_path.display()))?;
    let total = archive.len() as u64;
    let zip_name = zip_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("archive")
        .to_string();

    let mut count = 0u64;
    for i in 0..archive.len() {
        progress.report(
            "extract",
            i as u64,
            total,
            &format!("Extracting {zip_name}"),
        );
        let mut entry = archive.by_index(i)?;
        let entry_path = decode_zip_name(entry.name_raw());

        if entry.is_dir() {
            continue;
        }
        if entry_path.contains("__MACOSX")
            || Path::new(&entry_path)
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with("._"))
        {
            continue;
        }
        let Some(target) = sanitized_target(output, &entry_path) else {
            continue;
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)
            .with_context(|| format!("creating {}", target.display()))?;
        io::copy(&mut entry, &mut out)?;
        count += 1;
    }
    progress.report("extract", total, total, &format!("Extracted {zip_name}"));

    Ok(count)
}

/// Join an entry path under the output root, rejecting anything that would
/// escape it (absolute paths, `..` components).
fn sanitized_target(output: &Path, entry_path: &str) -> Option<PathBuf> {
    let mut target = output.to_path_buf();
    for component in Path::new(entry_path).components() {
        match component {
            Component::Normal(c) => target.push(c),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if target == output {
        None
    } else {
        Some(target)
    }
}
