//! Path normalization.
//!
//! Paths travel over the wire and get compared on the server, so both sides
//! agree on one spelling: forward slashes, no empty or `.` components, no
//! leading slash.  Case is preserved.  `..` components are kept verbatim;
//! deciding whether they are allowed is up to whoever resolves the path.

use std::path::{Component, Path, PathBuf};

/// Returns the canonical spelling of `path`.
///
/// # Examples
///
/// ```rust
/// use filedev_core::path::normalize;
///
/// assert_eq!(normalize("\\models\\.\\tree.msh"), "models/tree.msh");
/// assert_eq!(normalize("a//b/"), "a/b");
/// ```
pub fn normalize(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins a normalized relative `path` onto `root`, resolving `..` lexically.
///
/// Returns `None` when the path climbs above `root`, names `root` itself, or
/// has a component that is not a plain name (a drive like `C:`, a verbatim
/// prefix, anything with a `:`).
pub fn resolve_under(root: &Path, path: &str) -> Option<PathBuf> {
    let normalized = normalize(path);
    let mut parts: Vec<&str> = Vec::new();
    for part in normalized.split('/') {
        match part {
            "" => {}
            ".." => {
                parts.pop()?;
            }
            other if !is_plain_name(other) => return None,
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return None;
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(parts);
    Some(resolved)
}

/// True when pushing `part` onto a path appends it instead of replacing the
/// path.  `:` is refused on every platform so the answer does not depend on
/// the host.
fn is_plain_name(part: &str) -> bool {
    if part.contains(':') {
        return false;
    }
    let mut components = Path::new(part).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
