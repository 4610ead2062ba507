//! Environment variable expansion for config values.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in a config value.
///
/// A plain `${VAR}` errors when the variable is unset; the `:-` form falls
/// back to its default instead. `field` names the config field for the
/// error message.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    let expanded = shellexpand::env_with_context(value, |name: &str| {
        if let Some((var, default)) = name.split_once(":-") {
            return Ok(Some(
                std::env::var(var).unwrap_or_else(|_| default.to_owned()),
            ));
        }
        match std::env::var(name) {
            Ok(found) => Ok(Some(found)),
            Err(_) => Err(format!("${{{name}}} not set")),
        }
    });

    match expanded {
        Ok(result) => Ok(result.into_owned()),
        Err(err) => Err(ConfigError::EnvVar {
            field: field.to_owned(),
            message: err.cause,
        }),
    }
}
