use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::extras;
use crate::media::{self, MediaEntry};
use crate::sidecar::SidecarEntry;

/// Pattern for numbered duplicates: `photo(1).jpg`.
static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)(\(\d+\))(\.[^.]+)$").unwrap());

/// Tunables Google has changed over time. Kept as data rather than constants.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Length (in chars) at which Google historically truncated names.
    pub truncation_limit: usize,
    /// Shortest recorded name the truncated strategy will compare by prefix;
    /// anything shorter aliases too easily.
    pub min_truncated_prefix: usize,
    /// Sidecar filename suffixes, longest first.
    pub sidecar_suffixes: Vec<String>,
    /// Localized edited-version suffixes (lowercase).
    pub edited_suffixes: Vec<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            truncation_limit: 46,
            min_truncated_prefix: 12,
            sidecar_suffixes: extras::SIDECAR_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            edited_suffixes: extras::EDITED_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Which heuristic produced a match. Recorded for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    Truncated,
    DuplicateSuffix,
    Edited,
    LogicalName,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Truncated => "truncated",
            MatchStrategy::DuplicateSuffix => "duplicate-suffix",
            MatchStrategy::Edited => "edited",
            MatchStrategy::LogicalName => "logical-name",
        }
    }
}

/// Outcome for one media entry. Indices refer to the input slices.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub media_index: usize,
    pub sidecar_index: Option<usize>,
    pub strategy: Option<MatchStrategy>,
}

/// Result of matching one album directory.
#[derive(Debug, Default)]
pub struct MatchReport {
    /// One entry per media input, in input order.
    pub results: Vec<MatchResult>,
    /// Sidecars no media file claimed, in input order.
    pub unclaimed_sidecars: Vec<usize>,
    /// Per-sidecar problems that excluded candidates from the pool.
    pub diagnostics: Vec<String>,
}

impl MatchReport {
    pub fn matched_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.sidecar_index.is_some())
            .count()
    }

    pub fn unmatched_media(&self) -> impl Iterator<Item = &MatchResult> {
        self.results.iter().filter(|r| r.sidecar_index.is_none())
    }
}

/// Candidate pool with claim enforcement: once a sidecar is claimed it is
/// gone for every later media file and strategy.
struct Pool<'a> {
    sidecars: &'a [SidecarEntry],
    by_name: HashMap<&'a str, usize>,
    claimed: Vec<bool>,
}

impl<'a> Pool<'a> {
    fn new(sidecars: &'a [SidecarEntry]) -> Self {
        let mut by_name = HashMap::with_capacity(sidecars.len());
        for (i, sc) in sidecars.iter().enumerate() {
            // First occurrence wins, matching directory-listing order.
            by_name.entry(sc.filename.as_str()).or_insert(i);
        }
        Self {
            sidecars,
            by_name,
            claimed: vec![false; sidecars.len()],
        }
    }

    fn lookup_unclaimed(&self, name: &str) -> Option<usize> {
        self.by_name
            .get(name)
            .copied()
            .filter(|&i| !self.claimed[i])
    }

    /// First unclaimed sidecar satisfying the predicate, in input order.
    fn first_unclaimed<F: Fn(&SidecarEntry) -> bool>(&self, pred: F) -> Option<usize> {
        self.sidecars
            .iter()
            .enumerate()
            .find(|(i, sc)| !self.claimed[*i] && pred(sc))
            .map(|(i, _)| i)
    }

    fn claim(&mut self, index: usize) {
        debug_assert!(!self.claimed[index]);
        self.claimed[index] = true;
    }
}

/// Pairs media files with their Takeout sidecars.
pub struct Matcher {
    config: MatcherConfig,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Match one album directory's media against its sidecars.
    ///
    /// Strategies that target the media file's own sidecar (exact, truncated,
    /// duplicate-suffix) run for every file before the derived-name strategies
    /// (edited, logical fallback), so an original file always outranks its
    /// edited variant as claimant regardless of listing order.
    pub fn match_batch(&self, media: &[MediaEntry], sidecars: &[SidecarEntry]) -> MatchReport {
        let mut pool = Pool::new(sidecars);
        let mut results: Vec<MatchResult> = media
            .iter()
            .enumerate()
            .map(|(i, _)| MatchResult {
                media_index: i,
                sidecar_index: None,
                strategy: None,
            })
            .collect();

        for (i, m) in media.iter().enumerate() {
            let hit = self
                .try_exact(m, &pool)
                .map(|s| (s, MatchStrategy::Exact))
                .or_else(|| {
                    self.try_truncated(m, &pool)
                        .map(|s| (s, MatchStrategy::Truncated))
                })
                .or_else(|| {
                    self.try_duplicate_suffix(m, &pool)
                        .map(|s| (s, MatchStrategy::DuplicateSuffix))
                });
            if let Some((sc, strategy)) = hit {
                pool.claim(sc);
                results[i].sidecar_index = Some(sc);
                results[i].strategy = Some(strategy);
            }
        }

        for (i, m) in media.iter().enumerate() {
            if results[i].sidecar_index.is_some() {
                continue;
            }
            let hit = self
                .try_edited(m, &pool)
                .map(|s| (s, MatchStrategy::Edited))
                .or_else(|| {
                    self.try_logical(m, &pool)
                        .map(|s| (s, MatchStrategy::LogicalName))
                });
            if let Some((sc, strategy)) = hit {
                pool.claim(sc);
                results[i].sidecar_index = Some(sc);
                results[i].strategy = Some(strategy);
            }
        }

        let unclaimed_sidecars = (0..sidecars.len())
            .filter(|&i| !pool.claimed[i])
            .collect();

        MatchReport {
            results,
            unclaimed_sidecars,
            diagnostics: Vec::new(),
        }
    }

    /// Strategy 1: `photo.jpg` -> `photo.jpg.json` (or a supplemental suffix).
    fn try_exact(&self, media: &MediaEntry, pool: &Pool) -> Option<usize> {
        for suffix in &self.config.sidecar_suffixes {
            let candidate = format!("{}{}", media.filename, suffix);
            if let Some(i) = pool.lookup_unclaimed(&candidate) {
                return Some(i);
            }
        }
        None
    }

    /// Strategy 2: truncated names. Google caps sidecar filenames, so the
    /// recorded media name can be a prefix of the real one (possibly cut
    /// mid-extension). Only media names long enough to have been cut enter
    /// the prefix scan, and only sidecars whose stem sits at or past the
    /// configured limit qualify as truncated.
    fn try_truncated(&self, media: &MediaEntry, pool: &Pool) -> Option<usize> {
        let limit = self.config.truncation_limit;
        if media.filename.chars().count() < limit {
            return None;
        }

        // Cheap candidate first: the media name itself cut to the limit.
        if media.filename.chars().count() > limit {
            let truncated: String = media.filename.chars().take(limit).collect();
            for suffix in &self.config.sidecar_suffixes {
                let candidate = format!("{}{}", truncated, suffix);
                if let Some(i) = pool.lookup_unclaimed(&candidate) {
                    return Some(i);
                }
            }
        }

        let min_prefix = self.config.min_truncated_prefix;
        pool.first_unclaimed(|sc| {
            let stem = sc
                .filename
                .strip_suffix(".json")
                .unwrap_or(&sc.filename);
            stem.chars().count() >= limit
                && sc.media_name.chars().count() >= min_prefix
                && sc.media_name != media.filename
                && media.filename.starts_with(&sc.media_name)
                && extension_agrees(media, &sc.media_name)
        })
    }

    /// Strategy 3: `name(1).ext` tries the numbered sidecar variants Google
    /// produces, then falls back to the un-suffixed sidecar if still free.
    fn try_duplicate_suffix(&self, media: &MediaEntry, pool: &Pool) -> Option<usize> {
        let caps = NUMBERED_RE.captures(&media.filename)?;
        let base = caps.get(1).map_or("", |m| m.as_str());
        let counter = caps.get(2).map_or("", |m| m.as_str());
        let ext = caps.get(3).map_or("", |m| m.as_str());

        for suffix in &self.config.sidecar_suffixes {
            // name(1).json
            if let Some(i) = pool.lookup_unclaimed(&format!("{base}{counter}{suffix}")) {
                return Some(i);
            }
            // name(1).ext.json
            if let Some(i) = pool.lookup_unclaimed(&format!("{base}{counter}{ext}{suffix}")) {
                return Some(i);
            }
            // name.ext(1).json (Google sometimes re-attaches the counter here)
            if let Some(i) = pool.lookup_unclaimed(&format!("{base}{ext}{counter}{suffix}")) {
                return Some(i);
            }
        }
        for suffix in &self.config.sidecar_suffixes {
            // Fall back to the un-numbered sidecar if nobody claimed it yet.
            if let Some(i) = pool.lookup_unclaimed(&format!("{base}{ext}{suffix}")) {
                return Some(i);
            }
        }
        None
    }

    /// Strategy 4: `name-edited.ext` borrows the original's sidecar. The
    /// original media file, if present, has already had its chance to claim
    /// it in the first pass.
    fn try_edited(&self, media: &MediaEntry, pool: &Pool) -> Option<usize> {
        let original_base = extras::strip_edited(&media.base_name, &self.config.edited_suffixes)?;
        let original_name = if media.extension.is_empty() {
            original_base.clone()
        } else {
            format!("{}.{}", original_base, media.extension)
        };
        for suffix in &self.config.sidecar_suffixes {
            if let Some(i) = pool.lookup_unclaimed(&format!("{original_name}{suffix}")) {
                return Some(i);
            }
        }
        // Extension case can differ between the media file and the name
        // Google recorded; fall back to comparing derived media names.
        pool.first_unclaimed(|sc| {
            sc.media_name.eq_ignore_ascii_case(&original_name)
        })
    }

    /// Strategy 5: normalized-name fallback.
    fn try_logical(&self, media: &MediaEntry, pool: &Pool) -> Option<usize> {
        if media.logical_name.is_empty() {
            return None;
        }
        pool.first_unclaimed(|sc| sc.logical_name == media.logical_name)
    }
}

/// A recorded name that still ends in a complete media extension was not cut
/// there, so that extension must agree with the media file's own. A name cut
/// before (or inside) its extension carries no recognizable one and passes.
fn extension_agrees(media: &MediaEntry, recorded: &str) -> bool {
    if !media::is_media_file(Path::new(recorded)) {
        return true;
    }
    Path::new(recorded)
        .extension()
        .and_then(|e| e.to_str())
        .map_or(true, |e| e.eq_ignore_ascii_case(&media.extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidecar::TakeoutMetadata;
    use std::path::PathBuf;

    fn media(names: &[&str]) -> Vec<MediaEntry> {
        let config = MatcherConfig::default();
        names
            .iter()
            .map(|n| MediaEntry::new(PathBuf::from(*n), &config).unwrap())
            .collect()
    }

    fn sidecars(names: &[&str]) -> Vec<SidecarEntry> {
        let config = MatcherConfig::default();
        names
            .iter()
            .map(|n| {
                let title = n.strip_suffix(".json").unwrap_or(n);
                let meta =
                    TakeoutMetadata::parse(format!(r#"{{"title": "{title}"}}"#).as_bytes())
                        .unwrap();
                SidecarEntry::new(PathBuf::from(*n), meta, &config)
            })
            .collect()
    }

    fn strategies(report: &MatchReport) -> Vec<Option<MatchStrategy>> {
        report.results.iter().map(|r| r.strategy).collect()
    }

    #[test]
    fn test_exact_match() {
        let m = media(&["photo.jpg"]);
        let s = sidecars(&["photo.jpg.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, Some(0));
        assert_eq!(report.results[0].strategy, Some(MatchStrategy::Exact));
        assert!(report.unclaimed_sidecars.is_empty());
    }

    #[test]
    fn test_exact_supplemental() {
        let m = media(&["photo.jpg"]);
        let s = sidecars(&["photo.jpg.supplemental-metadata.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].strategy, Some(MatchStrategy::Exact));
    }

    #[test]
    fn test_no_sidecar_assigned_twice() {
        // Two media files that would both fall back to the same sidecar.
        let m = media(&["photo(1).jpg", "photo(2).jpg"]);
        let s = sidecars(&["photo.jpg.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, Some(0));
        assert_eq!(report.results[1].sidecar_index, None);
        assert!(report.unclaimed_sidecars.is_empty());
    }

    #[test]
    fn test_duplicate_suffix_prefers_numbered() {
        let m = media(&["photo(1).jpg", "photo.jpg"]);
        let s = sidecars(&["photo.jpg.json", "photo(1).json"]);
        let report = Matcher::default().match_batch(&m, &s);
        // photo(1).jpg takes photo(1).json, leaving photo.jpg.json free.
        assert_eq!(report.results[0].sidecar_index, Some(1));
        assert_eq!(
            report.results[0].strategy,
            Some(MatchStrategy::DuplicateSuffix)
        );
        assert_eq!(report.results[1].sidecar_index, Some(0));
        assert_eq!(report.results[1].strategy, Some(MatchStrategy::Exact));
    }

    #[test]
    fn test_duplicate_suffix_counter_after_extension() {
        let m = media(&["photo(1).jpg"]);
        let s = sidecars(&["photo.jpg(1).json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(
            report.results[0].strategy,
            Some(MatchStrategy::DuplicateSuffix)
        );
    }

    #[test]
    fn test_edited_without_original() {
        let m = media(&["photo-edited.jpg"]);
        let s = sidecars(&["photo.jpg.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, Some(0));
        assert_eq!(report.results[0].strategy, Some(MatchStrategy::Edited));
    }

    #[test]
    fn test_original_outranks_edited_claimant() {
        // Edited file listed first must not steal the original's sidecar.
        let m = media(&["photo-edited.jpg", "photo.jpg"]);
        let s = sidecars(&["photo.jpg.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, None);
        assert_eq!(report.results[1].sidecar_index, Some(0));
        assert_eq!(report.results[1].strategy, Some(MatchStrategy::Exact));
    }

    #[test]
    fn test_truncated_prefix_match() {
        let m = media(&["this_is_a_very_long_filename_that_gets_cut.jpg"]);
        let s = sidecars(&["this_is_a_very_long_filenam.supplemental-metadata.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, Some(0));
        assert_eq!(report.results[0].strategy, Some(MatchStrategy::Truncated));
    }

    #[test]
    fn test_truncated_requires_long_sidecar() {
        // Short names must not alias by prefix.
        let m = media(&["photograph.jpg"]);
        let s = sidecars(&["photo.jpg.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_ne!(report.results[0].strategy, Some(MatchStrategy::Truncated));
    }

    #[test]
    fn test_thumbnail_does_not_steal_video_sidecar() {
        // A `.mp4.jpg` thumbnail extends the video's recorded name, but the
        // recorded name ends in a complete video extension, so prefix
        // matching must leave the sidecar to the video itself.
        let m = media(&[
            "VID_20210101_123456_long_trip_recording.mp4.jpg",
            "VID_20210101_123456_long_trip_recording.mp4",
        ]);
        let s = sidecars(&[
            "VID_20210101_123456_long_trip_recording.mp4.supplemental-metadata.json",
        ]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, None);
        assert_eq!(report.results[1].sidecar_index, Some(0));
        assert_eq!(report.results[1].strategy, Some(MatchStrategy::Exact));
    }

    #[test]
    fn test_truncated_honors_min_prefix_floor() {
        // Raising the floor above the recorded name's length disables the
        // prefix scan for it.
        let m = media(&["this_is_a_very_long_filename_that_gets_cut.jpg"]);
        let s = sidecars(&["this_is_a_very_long_filenam.supplemental-metadata.json"]);
        let config = MatcherConfig {
            min_truncated_prefix: 30,
            ..MatcherConfig::default()
        };
        let report = Matcher::new(config).match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, None);
    }

    #[test]
    fn test_logical_fallback() {
        let m = media(&["vacation-edited(1).jpg"]);
        let s = sidecars(&["vacation.jpg.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, Some(0));
        assert_eq!(
            report.results[0].strategy,
            Some(MatchStrategy::LogicalName)
        );
    }

    #[test]
    fn test_unmatched_is_not_an_error() {
        let m = media(&["lonely.jpg"]);
        let s = sidecars(&["other.jpg.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, None);
        assert_eq!(report.unclaimed_sidecars, vec![0]);
    }

    #[test]
    fn test_tie_break_by_listing_order() {
        // Both sidecars normalize to the same logical name; the earliest wins.
        let m = media(&["trip-edited.png"]);
        let s = sidecars(&["trip(1).png.json", "trip(2).png.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        assert_eq!(report.results[0].sidecar_index, Some(0));
    }

    #[test]
    fn test_determinism() {
        let m = media(&[
            "photo(1).jpg",
            "photo.jpg",
            "photo-edited.jpg",
            "this_is_a_very_long_filename_that_gets_cut.jpg",
            "lonely.jpg",
        ]);
        let s = sidecars(&[
            "photo.jpg.json",
            "photo(1).json",
            "this_is_a_very_long_filenam.supplemental-metadata.json",
        ]);
        let matcher = Matcher::default();
        let a = matcher.match_batch(&m, &s);
        let b = matcher.match_batch(&m, &s);
        assert_eq!(strategies(&a), strategies(&b));
        let pairs_a: Vec<_> = a.results.iter().map(|r| r.sidecar_index).collect();
        let pairs_b: Vec<_> = b.results.iter().map(|r| r.sidecar_index).collect();
        assert_eq!(pairs_a, pairs_b);
        assert_eq!(a.unclaimed_sidecars, b.unclaimed_sidecars);
    }

    #[test]
    fn test_claim_set_shrinks_monotonically() {
        let m = media(&["a.jpg", "a(1).jpg", "a(2).jpg"]);
        let s = sidecars(&["a.jpg.json"]);
        let report = Matcher::default().match_batch(&m, &s);
        let claimed: Vec<_> = report
            .results
            .iter()
            .filter_map(|r| r.sidecar_index)
            .collect();
        assert_eq!(claimed.len(), 1);
    }
}
