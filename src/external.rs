//! Resolution of external command names to executable files.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Order-preserving split of the `PATH` value, kept until the value changes.
#[derive(Debug, Clone, Default)]
pub struct PathCache {
    source: Option<String>,
    dirs: Vec<PathBuf>,
    refreshes: usize,
}

impl PathCache {
    /// Directories to search for the given `PATH` value.
    ///
    /// The value is split again only if it differs from the one seen on the
    /// previous call. Empty components are skipped.
    pub fn dirs(&mut self, search_paths: &str) -> &[PathBuf] {
        if self.source.as_deref() != Some(search_paths) {
            self.dirs = std::env::split_paths(search_paths)
                .filter(|dir| !dir.as_os_str().is_empty())
                .collect();
            self.source = Some(search_paths.to_owned());
            self.refreshes += 1;
            log::debug!("PATH split into {} directories", self.dirs.len());
        }
        &self.dirs
    }

    /// How many times the cached split has been recomputed.
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }
}

/// Resolve a command name the way the shell does before forking.
///
/// Behavior:
/// - Name containing `/`: returned as-is if it is an executable regular file.
/// - Bare name: each directory of `search_paths` is tried left to right and
///   the first executable regular file wins.
/// - Empty name, or no `PATH` for a bare name: `None`.
pub fn find_command_path(
    cache: &mut PathCache,
    search_paths: Option<&str>,
    name: &str,
) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        let path = Path::new(name);
        return is_executable(path).then(|| path.to_owned());
    }
    cache
        .dirs(search_paths?)
        .iter()
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
}

/// Whether `path` is a regular file with the owner-execute bit set.
pub fn is_executable(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o100 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").expect("write file");
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod");
        path
    }

    fn search(dirs: &[&Path]) -> String {
        std::env::join_paths(dirs).unwrap().into_string().unwrap()
    }

    #[test]
    fn absolute_existing_executable() {
        let path = find_command_path(&mut PathCache::default(), Some("/nonexistent"), "/bin/sh");
        assert_eq!(path.as_deref(), Some(Path::new("/bin/sh")));
    }

    #[test]
    fn absolute_nonexisting() {
        let res = find_command_path(&mut PathCache::default(), Some("/bin"), "/bin/nonexisting");
        assert!(res.is_none(), "Expected not to find /bin/nonexisting");
    }

    #[test]
    fn path_with_separator_must_be_executable() {
        let tmp = TempDir::new().unwrap();
        let plain = make_file(tmp.path(), "plain", 0o644);
        let script = make_file(tmp.path(), "script", 0o755);
        let mut cache = PathCache::default();
        assert!(find_command_path(&mut cache, None, plain.to_str().unwrap()).is_none());
        assert_eq!(
            find_command_path(&mut cache, None, script.to_str().unwrap()),
            Some(script)
        );
        // Directories never qualify.
        assert!(find_command_path(&mut cache, None, tmp.path().to_str().unwrap()).is_none());
    }

    #[test]
    fn single_component_found_in_path() {
        let found = find_command_path(&mut PathCache::default(), Some("/nonexistent:/bin"), "sh")
            .expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found, Path::new("/bin/sh"));
    }

    #[test]
    fn single_component_not_found_in_path() {
        let mut cache = PathCache::default();
        assert!(find_command_path(&mut cache, Some("/bin"), "nonexisting").is_none());
        assert!(find_command_path(&mut cache, None, "sh").is_none());
    }

    #[test]
    fn empty_name_is_none() {
        assert!(find_command_path(&mut PathCache::default(), Some("/bin"), "").is_none());
    }

    #[test]
    fn first_directory_wins_and_skips_non_executables() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        make_file(first.path(), "tool", 0o644);
        let expected = make_file(second.path(), "tool", 0o755);
        let value = search(&[first.path(), second.path()]);
        let found = find_command_path(&mut PathCache::default(), Some(&value), "tool");
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn cache_follows_path_changes() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let in_a = make_file(a.path(), "tool", 0o755);
        let in_b = make_file(b.path(), "tool", 0o755);
        let mut cache = PathCache::default();

        let a_first = search(&[a.path(), b.path()]);
        assert_eq!(find_command_path(&mut cache, Some(&a_first), "tool"), Some(in_a.clone()));
        assert_eq!(find_command_path(&mut cache, Some(&a_first), "tool"), Some(in_a));
        assert_eq!(cache.refreshes(), 1);

        let b_first = search(&[b.path(), a.path()]);
        assert_eq!(find_command_path(&mut cache, Some(&b_first), "tool"), Some(in_b));
        assert_eq!(cache.refreshes(), 2);
    }

    #[test]
    fn empty_components_are_skipped() {
        let mut cache = PathCache::default();
        assert_eq!(
            cache.dirs("::/bin::/usr/bin:"),
            [PathBuf::from("/bin"), PathBuf::from("/usr/bin")]
        );
    }
}
