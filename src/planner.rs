//! Collision-free destination naming inside the output root.

use std::path::{Component, Path, PathBuf};

use path_jail::Jail;

use crate::error::Error;

/// Picks destination directories for extracted archives.
///
/// `resolve(base, "data")` yields `base/data` when nothing exists there,
/// otherwise the first free name of `data_1`, `data_2`, ... The result
/// depends only on what is on disk, so identical runs plan identical
/// paths.
pub struct PathPlanner {
    root: PathBuf,
    jail: Jail,
}

impl PathPlanner {
    /// Create a planner confined to `root`, which must already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref();
        let jail = Jail::new(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            jail,
        })
    }

    /// Return a path under `base` named `desired` (or a suffixed variant)
    /// that does not exist yet.
    ///
    /// Fails with [`Error::PathEscape`] if `desired` is not a single plain
    /// name or if `base` lies outside the output root.
    pub fn resolve(&self, base: &Path, desired: &str) -> Result<PathBuf, Error> {
        let mut components = Path::new(desired).components();
        let single_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_name {
            return Err(Error::PathEscape {
                entry: desired.to_string(),
                detail: "destination name must be a single path component".into(),
            });
        }

        let relative_base = base.strip_prefix(&self.root).map_err(|_| Error::PathEscape {
            entry: base.display().to_string(),
            detail: format!("outside output root '{}'", self.root.display()),
        })?;

        let mut counter = 0usize;
        loop {
            let name = if counter == 0 {
                desired.to_string()
            } else {
                format!("{}_{}", desired, counter)
            };

            self.jail
                .join(relative_base.join(&name))
                .map_err(|e| Error::PathEscape {
                    entry: name.clone(),
                    detail: e.to_string(),
                })?;

            let candidate = base.join(&name);
            // symlink_metadata so a dangling link still counts as taken.
            if std::fs::symlink_metadata(&candidate).is_err() {
                return Ok(candidate);
            }
            counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_free_name_is_used_as_is() {
        let root = tempdir().unwrap();
        let planner = PathPlanner::new(root.path()).unwrap();
        let path = planner.resolve(root.path(), "data").unwrap();
        assert_eq!(path, root.path().join("data"));
    }

    #[test]
    fn test_collisions_get_counter_suffix() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("data")).unwrap();
        fs::write(root.path().join("data_1"), b"taken by a file").unwrap();

        let planner = PathPlanner::new(root.path()).unwrap();
        let path = planner.resolve(root.path(), "data").unwrap();
        assert_eq!(path, root.path().join("data_2"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("data")).unwrap();
        let planner = PathPlanner::new(root.path()).unwrap();

        let first = planner.resolve(root.path(), "data").unwrap();
        let second = planner.resolve(root.path(), "data").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_nested_base() {
        let root = tempdir().unwrap();
        let base = root.path().join("a/b");
        fs::create_dir_all(&base).unwrap();
        let planner = PathPlanner::new(root.path()).unwrap();
        assert_eq!(planner.resolve(&base, "x").unwrap(), base.join("x"));
    }

    #[test]
    fn test_rejects_escaping_names() {
        let root = tempdir().unwrap();
        let planner = PathPlanner::new(root.path()).unwrap();

        for bad in ["..", "../up", "a/b", ""] {
            assert!(
                matches!(
                    planner.resolve(root.path(), bad),
                    Err(Error::PathEscape { .. })
                ),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_base_outside_root() {
        let root = tempdir().unwrap();
        let other = tempdir().unwrap();
        let planner = PathPlanner::new(root.path()).unwrap();
        assert!(matches!(
            planner.resolve(other.path(), "data"),
            Err(Error::PathEscape { .. })
        ));
    }
}
