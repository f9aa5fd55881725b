use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Localized "edited" suffixes Google appends to derivative files (lowercase).
pub const EDITED_SUFFIXES: &[&str] = &[
    "-edited",      // EN
    "-effects",     // EN
    "-smile",       // EN
    "-mix",         // EN
    "-animation",   // EN
    "-collage",     // EN
    "-pano",        // EN
    "-motion",      // EN
    "-edytowane",   // PL
    "-bearbeitet",  // DE
    "-bewerkt",     // NL
    "-編集済み",     // JA
    "-modificato",  // IT
    "-modifié",     // FR
    "-editado",     // ES
    "-ha editado",  // ES (alternate)
    "-editat",      // CA
];

/// Sidecar filename suffixes Google Takeout uses, longest first so that
/// stripping never stops at a bare `.json` when a longer form applies.
pub const SIDECAR_SUFFIXES: &[&str] = &[
    ".supplemental-metadata.json",
    ".supplemental-met.json",
    ".json",
];

static COUNTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d+\)$").unwrap());

/// Strip an ASCII suffix case-insensitively. Returns the remaining prefix.
pub fn strip_suffix_ascii_ci<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    if name.len() < suffix.len() {
        return None;
    }
    let split = name.len() - suffix.len();
    let tail = &name.as_bytes()[split..];
    if tail.eq_ignore_ascii_case(suffix.as_bytes()) {
        // The suffix region is ASCII, so `split` is a char boundary.
        Some(&name[..split])
    } else {
        None
    }
}

/// Remove the edited suffix from a base name if present.
pub fn strip_edited(base: &str, suffixes: &[String]) -> Option<String> {
    let normalized: String = base.nfc().collect();
    let lower = normalized.to_lowercase();
    for suffix in suffixes {
        if lower.ends_with(suffix.as_str()) {
            let keep = normalized.chars().count() - suffix.chars().count();
            return Some(normalized.chars().take(keep).collect());
        }
    }
    None
}

/// Split a trailing duplicate counter: "photo(1)" -> ("photo", "(1)").
pub fn split_counter(base: &str) -> Option<(&str, &str)> {
    let m = COUNTER_RE.find(base)?;
    Some((&base[..m.start()], m.as_str()))
}

/// Normalize a base name for fallback comparison: NFC, lowercase, all known
/// counters and edited suffixes stripped.
pub fn logical_name(base: &str, edited_suffixes: &[String]) -> String {
    let mut name: String = base.nfc().collect::<String>().to_lowercase();
    loop {
        let mut changed = false;
        if let Some((head, _)) = split_counter(name.trim_end()) {
            name = head.trim_end().to_string();
            changed = true;
        }
        for suffix in edited_suffixes {
            if let Some(head) = name.strip_suffix(suffix.as_str()) {
                name = head.to_string();
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    name.trim_end().to_string()
}
