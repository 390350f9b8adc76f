//! Canonical path form.
//!
//! Two spellings of the same location must compare equal: `/private/var/x`
//! and `/var/x`, `a/./b` and `a/b`, decomposed and precomposed file names.
//! Normalization is lexical only and never touches the filesystem.

use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Top-level directories that macOS exposes through a `/private` symlink.
const PRIVATE_ALIASED: &[&str] = &["var", "tmp", "etc"];

/// Collapse a path to its canonical form.
pub fn normalize_path(path: &Path) -> PathBuf {
    let simplified = dunce::simplified(path);
    let mut out = PathBuf::new();
    for component in simplified.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => out.push(nfc(name)),
            other => out.push(other.as_os_str()),
        }
    }
    strip_private_alias(out)
}

fn nfc(name: &OsStr) -> OsString {
    match name.to_str() {
        Some(s) => OsString::from(s.nfc().collect::<String>()),
        None => name.to_os_string(),
    }
}

fn strip_private_alias(path: PathBuf) -> PathBuf {
    let mut components = path.components();
    if components.next() != Some(Component::RootDir) {
        return path;
    }
    if components.next() != Some(Component::Normal(OsStr::new("private"))) {
        return path;
    }
    let rest = components.as_path();
    match rest.components().next() {
        Some(Component::Normal(first))
            if PRIVATE_ALIASED.iter().any(|alias| first == OsStr::new(alias)) =>
        {
            Path::new("/").join(rest)
        }
        _ => path,
    }
}
