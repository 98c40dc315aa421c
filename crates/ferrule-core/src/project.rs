use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::BridgeError;
use crate::types::DocumentKey;

/// Canonical root of the open project. Every bridge path must resolve inside it.
#[derive(Debug, Clone)]
pub struct ProjectRoot {
    root: PathBuf,
}

impl ProjectRoot {
    pub fn new(root: &Path) -> anyhow::Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| anyhow::anyhow!("cannot open project root {}: {e}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("project root {} is not a directory", root.display());
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a client-supplied path to a [`DocumentKey`] inside the project.
    ///
    /// Relative paths are taken relative to the root. The file itself need not
    /// exist: the walk goes up to the nearest existing ancestor, canonicalizes
    /// that, and re-attaches the missing tail. The walk is bounded by the
    /// number of components in the input. A missing tail may not contain `..`
    /// and the result may not be a directory.
    pub fn resolve(&self, file: &str) -> Result<DocumentKey, BridgeError> {
        let rejected = || BridgeError::PathRejected(file.to_string());

        if file.trim().is_empty() {
            return Err(rejected());
        }
        let raw = Path::new(file);
        let input = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.root.join(raw)
        };

        let mut existing = input.as_path();
        let mut tail: Vec<OsString> = Vec::new();
        let bound = input.components().count();
        let mut found = false;
        for _ in 0..=bound {
            // symlink_metadata so a dangling link counts as existing and then
            // fails to canonicalize, instead of being written through.
            if std::fs::symlink_metadata(existing).is_ok() {
                found = true;
                break;
            }
            match (existing.file_name(), existing.parent()) {
                (Some(name), Some(parent)) => {
                    tail.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Err(rejected()),
            }
        }
        if !found {
            return Err(rejected());
        }

        // `file_name` skips `..`, so any parent hop left in the missing part
        // shows up here and could climb out once directories are created.
        let existing_depth = existing.components().count();
        if input
            .components()
            .skip(existing_depth)
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(rejected());
        }

        let canonical = existing.canonicalize().map_err(|_| rejected())?;
        if !canonical.starts_with(&self.root) {
            return Err(rejected());
        }

        let mut resolved = canonical;
        for part in tail.iter().rev() {
            resolved.push(part);
        }
        if resolved == self.root || resolved.is_dir() {
            return Err(rejected());
        }
        Ok(DocumentKey::from_canonical(resolved))
    }

    /// Convenience predicate over [`ProjectRoot::resolve`].
    pub fn contains(&self, file: &str) -> bool {
        self.resolve(file).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> (tempfile::TempDir, ProjectRoot) {
        let tmp = tempfile::tempdir().unwrap();
        let root = ProjectRoot::new(tmp.path()).unwrap();
        (tmp, root)
    }

    #[test]
    fn existing_file_resolves_to_canonical_path() {
        let (_tmp, root) = project();
        let file = root.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        let key = root.resolve(file.to_str().unwrap()).unwrap();
        assert_eq!(key.as_path(), file);
    }

    #[test]
    fn missing_file_in_missing_dirs_is_inside() {
        let (_tmp, root) = project();
        let file = root.path().join("src/main/new/View.java");
        let key = root.resolve(file.to_str().unwrap()).unwrap();
        assert_eq!(key.as_path(), file);
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let (_tmp, root) = project();
        let key = root.resolve("docs/readme.md").unwrap();
        assert_eq!(key.as_path(), root.path().join("docs/readme.md"));
    }

    #[test]
    fn outside_path_is_rejected() {
        let (_tmp, root) = project();
        let other = tempfile::tempdir().unwrap();
        let file = other.path().join("evil.txt");
        let err = root.resolve(file.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, BridgeError::PathRejected(_)));
    }

    #[test]
    fn parent_hops_through_missing_dirs_are_rejected() {
        let (_tmp, root) = project();
        let sneaky = root.path().join("nope/../../escape.txt");
        assert!(!root.contains(sneaky.to_str().unwrap()));
    }

    #[test]
    fn parent_hops_over_existing_dirs_are_resolved() {
        let (_tmp, root) = project();
        std::fs::create_dir_all(root.path().join("a/b")).unwrap();
        let inside = root.path().join("a/b/../c.txt");
        let key = root.resolve(inside.to_str().unwrap()).unwrap();
        assert_eq!(key.as_path(), root.path().join("a/c.txt"));

        let outside = root.path().join("a/../../c.txt");
        assert!(!root.contains(outside.to_str().unwrap()));
    }

    #[test]
    fn root_and_directories_are_not_documents() {
        let (_tmp, root) = project();
        std::fs::create_dir_all(root.path().join("dir")).unwrap();
        assert!(!root.contains(root.path().to_str().unwrap()));
        assert!(!root.contains("dir"));
        assert!(!root.contains(""));
    }

    #[test]
    fn sibling_with_common_prefix_is_outside() {
        let parent = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(parent.path().join("app")).unwrap();
        std::fs::create_dir_all(parent.path().join("app-other")).unwrap();
        let root = ProjectRoot::new(&parent.path().join("app")).unwrap();
        let file = parent.path().join("app-other/x.txt");
        assert!(!root.contains(file.to_str().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_project_is_rejected() {
        let (_tmp, root) = project();
        let other = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(other.path(), root.path().join("link")).unwrap();
        let file = root.path().join("link/secret.txt");
        assert!(!root.contains(file.to_str().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_rejected() {
        let (_tmp, root) = project();
        let other = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(other.path().join("missing"), root.path().join("dangling"))
            .unwrap();
        assert!(!root.contains("dangling"));
    }
}
