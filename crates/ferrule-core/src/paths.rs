use std::path::{Path, PathBuf};

/// Files that mark a directory as a project root when walking up.
const ROOT_MARKERS: &[&str] = &[".ferrule", ".vscode", "pom.xml", "build.gradle", "build.gradle.kts"];

/// All well-known paths for a project.
#[derive(Debug, Clone)]
pub struct FerrulePaths {
    pub root: PathBuf,
    pub ferrule_dir: PathBuf,
    pub config_json: PathBuf,
    pub lock_file: PathBuf,
    pub discovery_dir: PathBuf,
    pub discovery_file: PathBuf,
}

impl FerrulePaths {
    /// Derive all paths from a project root. Pure computation, no I/O.
    pub fn discover(project_root: impl Into<PathBuf>) -> Self {
        let root = project_root.into();
        let ferrule_dir = root.join(".ferrule");
        // The bridge client polls this exact location.
        let discovery_dir = root.join(".vscode");
        Self {
            config_json: ferrule_dir.join("config.json"),
            lock_file: ferrule_dir.join("server.lock"),
            discovery_file: discovery_dir.join(".copilot-plugin"),
            discovery_dir,
            ferrule_dir,
            root,
        }
    }

    /// Create `.ferrule/`. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.ferrule_dir)?;
        Ok(())
    }

    /// Walk up from `start` looking for a directory that looks like a project root.
    /// Returns `None` if not found.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut cur = start.to_path_buf();
        loop {
            if ROOT_MARKERS.iter().any(|m| cur.join(m).exists()) {
                return Some(cur);
            }
            if !cur.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_builds_correct_paths() {
        let p = FerrulePaths::discover("/tmp/app");
        assert_eq!(p.ferrule_dir, PathBuf::from("/tmp/app/.ferrule"));
        assert_eq!(p.config_json, PathBuf::from("/tmp/app/.ferrule/config.json"));
        assert_eq!(p.lock_file, PathBuf::from("/tmp/app/.ferrule/server.lock"));
        assert_eq!(
            p.discovery_file,
            PathBuf::from("/tmp/app/.vscode/.copilot-plugin")
        );
    }

    #[test]
    fn find_root_walks_up_to_marker() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("pom.xml"), "<project/>").unwrap();
        let nested = tmp.path().join("src/main/java");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(FerrulePaths::find_root(&nested), Some(tmp.path().to_path_buf()));
    }

    #[test]
    fn ensure_layout_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let p = FerrulePaths::discover(tmp.path());
        p.ensure_layout().unwrap();
        p.ensure_layout().unwrap();
        assert!(p.ferrule_dir.is_dir());
    }
}
