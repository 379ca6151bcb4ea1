//! Configuration value interpolation
//!
//! Expands `~`, `$VAR` and `${VAR}` in config values through `shellexpand`.
//! Unset variables expand to an empty string.

use std::borrow::Cow;

/// Expand `~` and environment variables in a string
///
/// # Examples
///
/// ```
/// use procrun::config::interpolate::interpolate_string;
///
/// std::env::set_var("PROCRUN_DOC_VAR", "hello");
/// let result = interpolate_string("Value: $PROCRUN_DOC_VAR");
/// assert_eq!(result, "Value: hello");
/// std::env::remove_var("PROCRUN_DOC_VAR");
/// ```
pub fn interpolate_string(s: &str) -> String {
    match shellexpand::full_with_context_no_errors(s, home_dir, lookup_var) {
        Cow::Borrowed(unchanged) => unchanged.to_string(),
        Cow::Owned(expanded) => {
            tracing::trace!("Expanded '{}' to '{}'", s, expanded);
            expanded
        }
    }
}

fn home_dir() -> Option<String> {
    dirs::home_dir().map(|p| p.to_string_lossy().into_owned())
}

fn lookup_var(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::debug!("Environment variable '{}' not set", var);
            Some(String::new())
        }
    }
}

/// Interpolate env values and working directories in a Config
pub fn interpolate_config(config: &mut super::model::Config) {
    for value in config.env.values_mut() {
        *value = interpolate_string(value);
    }

    for profile in config.profiles.values_mut() {
        if let Some(ref mut dir) = profile.working_dir {
            *dir = interpolate_string(dir);
        }
        for value in profile.env.values_mut() {
            *value = interpolate_string(value);
        }
    }
}
