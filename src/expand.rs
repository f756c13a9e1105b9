//! Environment substitution and home-directory expansion of words.

use crate::env::Environment;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// `\$`, `${NAME}` or `$NAME`, tried in that order at each position.
static PARAMETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\\$|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("parameter pattern is valid")
});

/// Substitute variable references in one word.
///
/// `$NAME` and `${NAME}` become the variable's value, or nothing when it is
/// unset. `\$` stands for a literal dollar sign. Substituted text is not
/// scanned again. Words without a `$` are returned borrowed.
pub fn substitute<'a>(word: &'a str, env: &Environment) -> Cow<'a, str> {
    if !word.contains('$') {
        return Cow::Borrowed(word);
    }
    PARAMETER.replace_all(word, |caps: &Captures<'_>| {
        match caps.get(1).or_else(|| caps.get(2)) {
            Some(name) => env.get_var(name.as_str()).unwrap_or_default(),
            None => "$".to_owned(),
        }
    })
}

/// Substitute variable references in every word of an argument vector.
pub fn substitute_all(words: &[String], env: &Environment) -> Vec<String> {
    words
        .iter()
        .map(|word| substitute(word, env).into_owned())
        .collect()
}

/// Expand a leading `~` or `~/` to the home directory.
pub fn expand_tilde<'a>(path: &'a str, env: &Environment) -> Cow<'a, str> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return Cow::Borrowed(path),
    };
    match env.home_dir() {
        Some(home) => Cow::Owned(format!("{}{}", home.display(), rest)),
        None => Cow::Borrowed(path),
    }
}
