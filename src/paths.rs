//! Small path helpers shared by the config layer and the services.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Resolve `path` against `base` unless it is already absolute.
///
/// The result is lexically normalized (`.` dropped, `..` folded) so that
/// paths coming from the rc file and from the command line compare equal.
pub fn resolve(base: &Utf8Path, path: impl AsRef<Utf8Path>) -> Utf8PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Lexically normalize a path without touching the filesystem.
pub fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match out.components().next_back() {
                Some(Utf8Component::Normal(_)) => {
                    out.pop();
                }
                // `..` above the root is the root
                Some(Utf8Component::RootDir | Utf8Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_str()),
        }
    }
    out
}

/// Convert a std path into a UTF-8 path, replacing invalid sequences.
pub fn utf8_lossy(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative() {
        let base = Utf8Path::new("/work/project");
        assert_eq!(resolve(base, "mods"), Utf8PathBuf::from("/work/project/mods"));
        assert_eq!(resolve(base, "./mods/../other"), Utf8PathBuf::from("/work/project/other"));
    }

    #[test]
    fn test_resolve_absolute_is_kept() {
        let base = Utf8Path::new("/work/project");
        assert_eq!(resolve(base, "/opt/mods"), Utf8PathBuf::from("/opt/mods"));
    }

    #[test]
    fn test_normalize_leading_parent() {
        assert_eq!(normalize(Utf8Path::new("../a/./b")), Utf8PathBuf::from("../a/b"));
        assert_eq!(normalize(Utf8Path::new("../../a")), Utf8PathBuf::from("../../a"));
        assert_eq!(normalize(Utf8Path::new("a/../../b")), Utf8PathBuf::from("../b"));
        assert_eq!(normalize(Utf8Path::new("/../a")), Utf8PathBuf::from("/a"));
    }
}
