//! Environment variable substitution for configuration file text.

use regex::{Captures, Regex};
use std::sync::OnceLock;

#[cfg(test)]
#[path = "expand_tests.rs"]
mod tests;

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("variable pattern is a valid regex")
    })
}

/// Replace `${NAME}` and `$NAME` references using `lookup`.
///
/// Unset variables expand to the empty string. `$$` produces a literal `$`.
/// A `$` that does not start a reference is left untouched.
pub fn expand_variables<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    variable_pattern()
        .replace_all(text, |caps: &Captures<'_>| {
            match caps.get(1).or_else(|| caps.get(2)) {
                Some(name) => lookup(name.as_str()).unwrap_or_default(),
                None => "$".to_string(),
            }
        })
        .into_owned()
}
