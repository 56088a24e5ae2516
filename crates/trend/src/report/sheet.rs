//! Collision-safe sheet names

use std::collections::HashSet;

/// Longest sheet name spreadsheet applications accept
pub const MAX_SHEET_NAME_CHARS: usize = 31;

/// Name of the rollup sheet, never handed out for a folder
pub const SUMMARY_SHEET: &str = "Summary";

/// Name used when a path sanitizes to nothing
const FALLBACK_NAME: &str = "Folder";

/// Excel keeps this name for itself
const RESERVED_NAME: &str = "History";

fn is_illegal(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '?' | '*' | '[' | ']')
}

/// Hands out unique sheet names for folder paths
///
/// Names are compared case-insensitively, as spreadsheet applications do.
/// The same sequence of paths always yields the same names.
#[derive(Debug)]
pub struct SheetNamer {
    taken: HashSet<String>,
}

impl Default for SheetNamer {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetNamer {
    pub fn new() -> Self {
        let mut taken = HashSet::new();
        taken.insert(SUMMARY_SHEET.to_lowercase());
        taken.insert(RESERVED_NAME.to_lowercase());
        Self { taken }
    }

    /// Replace runs of illegal characters with `_` and cap the length
    ///
    /// A leading or trailing apostrophe is replaced too.
    pub fn sanitize(path: &str) -> String {
        let mut cleaned = String::with_capacity(path.len());
        let mut in_run = false;
        for c in path.chars() {
            if is_illegal(c) {
                if !in_run {
                    cleaned.push('_');
                }
                in_run = true;
            } else {
                cleaned.push(c);
                in_run = false;
            }
        }

        let mut capped: String = cleaned.chars().take(MAX_SHEET_NAME_CHARS).collect();
        if capped.starts_with('\'') {
            capped.replace_range(..1, "_");
        }
        if capped.ends_with('\'') {
            capped.replace_range(capped.len() - 1.., "_");
        }
        if capped.is_empty() {
            FALLBACK_NAME.to_string()
        } else {
            capped
        }
    }

    /// A name for `path` not handed out before
    ///
    /// Collisions get `~2`, `~3`, ... with the base shortened so the
    /// result still fits.
    pub fn name_for(&mut self, path: &str) -> String {
        let base = Self::sanitize(path);
        if self.taken.insert(base.to_lowercase()) {
            return base;
        }

        let mut n = 2u32;
        loop {
            let suffix = format!("~{}", n);
            let keep = MAX_SHEET_NAME_CHARS - suffix.chars().count();
            let candidate: String = base.chars().take(keep).chain(suffix.chars()).collect();
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}
