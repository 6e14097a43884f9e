//! Glob expansion on top of globset + walkdir
//!
//! Wildcards never match `/`. The literal directory prefix of the pattern is
//! used as the walk root, so only the part of the tree the pattern can reach
//! is scanned. Plain expansion is limited to the pattern's depth and follows
//! symlinked directories; `**` there means the same as `*`. Recursive
//! expansion walks the whole subtree without following links so `**` can
//! match any number of levels.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use walkdir::WalkDir;

use super::errors::{FsError, FsResult};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Expand `pattern` against the local filesystem.
///
/// Entries that cannot be read while scanning are skipped, not reported.
pub(crate) fn expand(pattern: &str, recursive: bool) -> FsResult<Vec<PathBuf>> {
    let effective = if recursive {
        Cow::Borrowed(pattern)
    } else {
        collapse_stars(pattern)
    };

    let matcher = GlobBuilder::new(&effective)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|e| FsError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.kind().to_string(),
        })?
        .compile_matcher();

    let (base, depth) = split_pattern(pattern);

    if depth == 0 {
        let path = PathBuf::from(pattern);
        return Ok(if path.symlink_metadata().is_ok() {
            vec![path]
        } else {
            Vec::new()
        });
    }

    let relative = base.as_os_str().is_empty();
    let root = if relative { Path::new(".") } else { base.as_path() };

    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(depth).follow_links(true);
    }

    let mut matches = Vec::new();
    for entry in walker.into_iter().filter_map(Result::ok) {
        let candidate = if relative {
            entry.path().strip_prefix(".").unwrap_or(entry.path())
        } else {
            entry.path()
        };

        if matcher.is_match(candidate) {
            matches.push(candidate.to_path_buf());
        }
    }

    Ok(matches)
}

/// Replace every unescaped run of `*` with a single `*`, so `**` cannot
/// cross directory boundaries.
fn collapse_stars(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains("**") {
        return Cow::Borrowed(pattern);
    }

    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    let mut prev_star = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                prev_star = false;
            }
            '*' if prev_star => {}
            '*' => {
                out.push(c);
                prev_star = true;
            }
            _ => {
                out.push(c);
                prev_star = false;
            }
        }
    }
    Cow::Owned(out)
}

/// Split a pattern into its literal directory prefix and the number of
/// components after it. A depth of zero means the pattern has no wildcards.
fn split_pattern(pattern: &str) -> (PathBuf, usize) {
    let mut base = PathBuf::new();
    if pattern.starts_with('/') {
        base.push("/");
    }

    let components: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();

    match components.iter().position(|c| c.contains(GLOB_META)) {
        Some(idx) => {
            for component in &components[..idx] {
                base.push(component);
            }
            (base, components.len() - idx)
        }
        None => (base, 0),
    }
}
