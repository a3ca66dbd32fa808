//! Path helpers shared by the manifest parser and the transfer engine.

use std::path::{Path, PathBuf};

/// Resolve an absolute manifest path against a different root.
///
/// `rebase("/mnt/image", "/etc/foo.conf")` is `/mnt/image/etc/foo.conf`.
/// With `root` = `/` this is the identity mapping the firmware uses.
pub fn rebase(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

/// Strip one trailing `/` from a manifest entry, leaving `/` itself alone.
pub fn strip_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebase_joins_under_root() {
        assert_eq!(
            rebase(Path::new("/mnt/image"), "/etc/foo.conf"),
            PathBuf::from("/mnt/image/etc/foo.conf")
        );
        assert_eq!(rebase(Path::new("/"), "/etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn trailing_slash_stripped_once() {
        assert_eq!(strip_trailing_slash("/var/tuxbox/"), "/var/tuxbox");
        assert_eq!(strip_trailing_slash("/var/tuxbox"), "/var/tuxbox");
        assert_eq!(strip_trailing_slash("/"), "/");
    }
}
