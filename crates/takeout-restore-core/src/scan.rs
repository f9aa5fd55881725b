use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::matcher::MatcherConfig;
use crate::media::{self, MediaEntry};

/// Media files and sidecar paths of one album directory. Google Takeout
/// keeps sidecars next to their media, so matching is scoped per directory.
#[derive(Debug)]
pub struct AlbumBatch {
    pub directory: PathBuf,
    pub media: Vec<MediaEntry>,
    pub sidecar_paths: Vec<PathBuf>,
}

/// Walk the extracted tree and group media + sidecars per directory.
/// Entries are sorted by file name so results are deterministic regardless
/// of filesystem iteration order.
pub fn scan_tree(root: &Path, config: &MatcherConfig) -> anyhow::Result<Vec<AlbumBatch>> {
    let mut batches: BTreeMap<PathBuf, AlbumBatch> = BTreeMap::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(parent) = path.parent() else {
            continue;
        };

        let is_sidecar = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("json"));

        if is_sidecar {
            batch_for(&mut batches, parent)
                .sidecar_paths
                .push(path.to_path_buf());
        } else if media::is_media_file(path) {
            if let Some(m) = MediaEntry::new(path.to_path_buf(), config) {
                batch_for(&mut batches, parent).media.push(m);
            }
        }
    }

    Ok(batches.into_values().collect())
}

fn batch_for<'a>(
    batches: &'a mut BTreeMap<PathBuf, AlbumBatch>,
    dir: &Path,
) -> &'a mut AlbumBatch {
    batches
        .entry(dir.to_path_buf())
        .or_insert_with(|| AlbumBatch {
            directory: dir.to_path_buf(),
            media: Vec::new(),
            sidecar_paths: Vec::new(),
        })
}
