use crate::command::ExitCode;
use crate::external::{PathCache, find_command_path};
use nix::unistd::{Uid, User};
use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::CString;
use std::path::PathBuf;

/// Mutable, shell-level execution context.
///
/// The environment contains:
/// - `vars`: the variables visible to `$NAME` substitution and passed to
///   executed programs. Seeded from the process environment; `export` and
///   `unset` edit this table, not the process environment.
/// - `previous_dir`: the directory `cd -` returns to.
/// - `should_exit`: set by the `exit` builtin; the interpreter checks it after
///   each builtin and stops.
/// - a cached split of `PATH` used for command lookup.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// Working directory before the last successful `cd`.
    pub previous_dir: Option<PathBuf>,
    /// When set, the shell should terminate with this code.
    pub should_exit: Option<ExitCode>,
    path_cache: PathCache,
}

impl Environment {
    /// Capture the current process environment into a new `Environment` instance.
    pub fn new() -> Self {
        Self {
            vars: stdenv::vars().collect(),
            ..Self::default()
        }
    }

    /// Build an environment from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..Self::default()
        }
    }

    /// Get the value of a variable.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Remove a variable. Returns its previous value.
    pub fn unset_var(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Home directory: `HOME`, or the user database entry of the current user.
    pub fn home_dir(&self) -> Option<PathBuf> {
        if let Some(home) = self.vars.get("HOME") {
            return Some(PathBuf::from(home));
        }
        match User::from_uid(Uid::current()) {
            Ok(Some(user)) => Some(user.dir),
            Ok(None) => None,
            Err(errno) => {
                log::warn!("user database lookup failed: {errno}");
                None
            }
        }
    }

    /// Resolve a command name to an executable using the current `PATH`.
    pub fn resolve_command(&mut self, name: &str) -> Option<PathBuf> {
        let search_paths = self.vars.get("PATH").map(String::as_str);
        find_command_path(&mut self.path_cache, search_paths, name)
    }

    pub fn path_cache(&self) -> &PathCache {
        &self.path_cache
    }

    /// Variables as `NAME=value` strings for `execve`. Entries that cannot be
    /// represented (embedded NUL) are left out.
    pub fn envp(&self) -> Vec<CString> {
        self.vars
            .iter()
            .filter_map(|(k, v)| CString::new(format!("{k}={v}")).ok())
            .collect()
    }
}
