use super::{types::Config, ConfigError, TransferBackend};

/// Validate configuration
/// Currently validates:
/// - The selected transfer backend has its section
/// - Media limits are non-zero
/// - Retry and attempt caps are non-zero
/// - Tool commands and remote prefixes are non-empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    match config.transfer.backend {
        TransferBackend::Http => {
            let Some(http) = &config.transfer.http else {
                return Err(ConfigError::ValidationError(
                    "transfer.backend = \"http\" requires a [transfer.http] section".to_string(),
                ));
            };
            if http.url.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "transfer.http.url cannot be empty".to_string(),
                ));
            }
            if http.username.is_some() != http.password.is_some() {
                return Err(ConfigError::ValidationError(
                    "transfer.http.username and transfer.http.password must be set together"
                        .to_string(),
                ));
            }
        }
        TransferBackend::LocalMirror => {
            if config.transfer.local_mirror.is_none() {
                return Err(ConfigError::ValidationError(
                    "transfer.backend = \"local_mirror\" requires a [transfer.local_mirror] section"
                        .to_string(),
                ));
            }
        }
    }

    if config.transfer.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "transfer.retry.max_attempts cannot be 0".to_string(),
        ));
    }

    if config.media.max_short_side == 0 {
        return Err(ConfigError::ValidationError(
            "media.max_short_side cannot be 0".to_string(),
        ));
    }

    if config.media.max_frame_rate == 0 {
        return Err(ConfigError::ValidationError(
            "media.max_frame_rate cannot be 0".to_string(),
        ));
    }

    if !config.media.compressed_extension.starts_with('.') {
        return Err(ConfigError::ValidationError(
            "media.compressed_extension must start with '.'".to_string(),
        ));
    }

    if config.pipeline.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_attempts cannot be 0".to_string(),
        ));
    }

    for (name, tool) in config.tools.iter() {
        if tool.program.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "tools.{}.program cannot be empty",
                name
            )));
        }
    }

    for (name, prefix) in [
        ("remote.originals_dir", &config.remote.originals_dir),
        ("remote.compressed_dir", &config.remote.compressed_dir),
        ("remote.thumbnails_dir", &config.remote.thumbnails_dir),
    ] {
        if prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                name
            )));
        }
    }

    Ok(())
}
