use std::path::{Component, Path, PathBuf};

/// Lexically normalizes a path without touching the filesystem.
///
/// `.` segments are dropped and `..` removes the preceding normal segment. A `..` that
/// would climb above the root of an absolute path is discarded, while leading `..`
/// segments of a relative path are kept so the result never silently moves inward.
pub fn normalize_path(input: &Path) -> PathBuf {
    let mut new_path = PathBuf::new();

    for component in input.components() {
        match component {
            // Skip the current-dir marker "."
            Component::CurDir => {}

            Component::ParentDir => match new_path.components().next_back() {
                Some(Component::Normal(_)) => {
                    new_path.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => new_path.push(".."),
            },

            // For normal components, push them
            other => new_path.push(other.as_os_str()),
        }
    }

    new_path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_resolves_parent_segments() {
        assert_eq!(
            normalize_path(Path::new("/tmp/dest/./a/../b")),
            PathBuf::from("/tmp/dest/b")
        );
        assert_eq!(
            normalize_path(Path::new("/../../etc")),
            PathBuf::from("/etc")
        );
        assert_eq!(
            normalize_path(Path::new("../x/../y")),
            PathBuf::from("../y")
        );
    }
}
