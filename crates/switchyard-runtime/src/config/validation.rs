//! Configuration validation.

use switchyard_relay::MAX_RELAY_NAME_LENGTH;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, SwitchyardConfig};

/// Checks values the schema alone cannot express.
pub fn validate_config(config: &SwitchyardConfig) -> ConfigResult<()> {
    if config.bot.name.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.name"));
    }
    if config.bot.name.contains(char::is_whitespace) {
        return Err(ConfigError::validation("Bot name cannot contain spaces"));
    }

    if config.database.url.is_empty() {
        return Err(ConfigError::missing_field("database.url"));
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::validation(
            "database.max_connections must be greater than 0",
        ));
    }

    validate_color(&config.routing.default_system_color)?;

    let max = config.relay.max_name_length;
    if max == 0 || max > MAX_RELAY_NAME_LENGTH {
        return Err(ConfigError::validation(format!(
            "relay.max_name_length must be between 1 and {MAX_RELAY_NAME_LENGTH}, {max} given"
        )));
    }

    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

/// Six hex digits, no leading `#`.
fn validate_color(color: &str) -> ConfigResult<()> {
    if color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ConfigError::validation(format!(
            "routing.default_system_color must be a hex color like 89D2E8, '{color}' given"
        )))
    }
}
