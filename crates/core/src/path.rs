//! Lexical path handling
//!
//! Paths in modlink come from configuration templates and may be written for
//! either Windows or Unix. Everything here works on strings and never touches
//! the filesystem, so the same configuration normalizes identically on every
//! platform.
//!
//! # Examples
//!
//! ```
//! use modlink_core::path::{PathStyle, normalize, relative_path};
//!
//! let source = normalize("/apps//app1/./models/../models", PathStyle::Unix);
//! assert_eq!(source, "/apps/app1/models");
//!
//! // The link target seen from the directory that holds the link
//! assert_eq!(relative_path("/lib", "/apps/app1", PathStyle::Unix), "../../lib");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator convention used when normalizing paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    /// Backslash separators
    Windows,
    /// Forward slash separators
    Unix,
    /// Separators of the host platform
    #[default]
    Mixed,
}

impl PathStyle {
    /// Separator emitted by [`normalize`] for this style
    pub const fn separator(self) -> char {
        match self {
            Self::Windows => '\\',
            Self::Unix => '/',
            Self::Mixed => std::path::MAIN_SEPARATOR,
        }
    }

    /// Whether `\` separates components under this style
    ///
    /// Mixed style follows the host: on Unix a backslash is a legal file
    /// name character and is kept verbatim.
    pub const fn splits_backslash(self) -> bool {
        match self {
            Self::Windows | Self::Unix => true,
            Self::Mixed => cfg!(windows),
        }
    }

    /// Configuration name of the style
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Unix => "unix",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for PathStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leading part of a path that `..` can never climb above
#[derive(Debug, Clone, PartialEq, Eq)]
struct Prefix {
    drive: Option<char>,
    rooted: bool,
    unc: bool,
}

fn is_sep(c: char) -> bool {
    c == '/' || c == '\\'
}

fn is_slash(c: char) -> bool {
    c == '/'
}

fn separators(style: PathStyle) -> fn(char) -> bool {
    if style.splits_backslash() {
        is_sep
    } else {
        is_slash
    }
}

fn split_prefix(raw: &str, is_sep: fn(char) -> bool) -> (Prefix, &str) {
    let drive = drive_letter(raw);
    let rest = if drive.is_some() { &raw[2..] } else { raw };
    let unc = drive.is_none() && rest.chars().take(2).filter(|c| is_sep(*c)).count() == 2;
    let rooted = rest.starts_with(is_sep);
    (Prefix { drive, rooted, unc }, rest)
}

fn components(rest: &str, rooted: bool, is_sep: fn(char) -> bool) -> Vec<&str> {
    let mut stack: Vec<&str> = Vec::new();
    for part in rest.split(is_sep) {
        match part {
            "" | "." => {}
            ".." => match stack.last() {
                Some(last) if *last != ".." => {
                    stack.pop();
                }
                // `..` at the root stays at the root
                _ if rooted => {}
                _ => stack.push(".."),
            },
            other => stack.push(other),
        }
    }
    stack
}

/// Return the drive letter of a `X:`-prefixed path
///
/// ```
/// use modlink_core::path::drive_letter;
///
/// assert_eq!(drive_letter("D:\\models"), Some('D'));
/// assert_eq!(drive_letter("/mnt/d/models"), None);
/// ```
pub fn drive_letter(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => Some(letter),
        _ => None,
    }
}

/// Whether the path is absolute under either convention
pub fn is_absolute(raw: &str) -> bool {
    let (prefix, rest) = split_prefix(raw, is_sep);
    match prefix.drive {
        Some(_) => rest.starts_with(is_sep),
        None => prefix.rooted,
    }
}

/// Normalize a path lexically
///
/// Collapses repeated separators and `.` segments, resolves `..` against
/// preceding segments, and rewrites every separator to the style's one.
/// An empty path normalizes to `.`.
pub fn normalize(raw: &str, style: PathStyle) -> String {
    let sep = style.separator();
    let seps = separators(style);
    let (prefix, rest) = split_prefix(raw, seps);
    let parts = components(rest, prefix.rooted, seps);

    let mut out = String::with_capacity(raw.len());
    if let Some(drive) = prefix.drive {
        out.push(drive);
        out.push(':');
    }
    if prefix.unc {
        out.push(sep);
        out.push(sep);
    } else if prefix.rooted {
        out.push(sep);
    }
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// Express `target` relative to the directory `base`
///
/// Paths on different drives have no relative form; the normalized target
/// is returned unchanged in that case.
pub fn relative_path(target: &str, base: &str, style: PathStyle) -> String {
    let seps = separators(style);
    let (target_prefix, target_rest) = split_prefix(target, seps);
    let (base_prefix, base_rest) = split_prefix(base, seps);
    if target_prefix != base_prefix {
        return normalize(target, style);
    }

    let target_parts = components(target_rest, target_prefix.rooted, seps);
    let base_parts = components(base_rest, base_prefix.rooted, seps);
    let common = target_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = std::iter::repeat_n("..", base_parts.len() - common).collect();
    parts.extend_from_slice(&target_parts[common..]);
    if parts.is_empty() {
        return ".".to_string();
    }
    parts.join(&style.separator().to_string())
}

/// Parent directory of a normalized path, if it has one
///
/// ```
/// use modlink_core::path::{PathStyle, parent};
///
/// assert_eq!(parent("/apps/app1/models", PathStyle::Unix).as_deref(), Some("/apps/app1"));
/// assert_eq!(parent("/", PathStyle::Unix), None);
/// ```
pub fn parent(raw: &str, style: PathStyle) -> Option<String> {
    let normalized = normalize(raw, style);
    let seps = separators(style);
    let (prefix, rest) = split_prefix(&normalized, seps);
    let mut parts = components(rest, prefix.rooted, seps);
    parts.pop()?;
    let head = &normalized[..normalized.len() - rest.len()];
    let mut out = head.to_string();
    if prefix.unc {
        out.push(style.separator());
        out.push(style.separator());
    } else if prefix.rooted {
        out.push(style.separator());
    }
    out.push_str(&parts.join(&style.separator().to_string()));
    if out.is_empty() {
        out.push('.');
    }
    Some(out)
}
