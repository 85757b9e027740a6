use super::models::ReaderConfig;
use super::tables::ConfigTables;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> ReaderConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return ReaderConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err:#}");
            ReaderConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<ReaderConfig> {
    let tables: ConfigTables = toml::from_str(contents).context("Parsing config tables")?;
    Ok(ReaderConfig::from(tables).sanitized())
}

pub fn serialize_config(config: &ReaderConfig) -> Result<String> {
    toml::to_string(&ConfigTables::from(config)).context("Serializing config tables")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogLevel, Orientation, ThemeMode};

    #[test]
    fn parses_tables_and_fills_defaults() {
        let config = parse_config(
            r#"
            [appearance]
            theme = "night"
            font_size = 20

            [layout]
            orientation = "landscape"

            [reading]
            chunk_size = 3

            [logging]
            log_level = "warn"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.theme, ThemeMode::Night);
        assert_eq!(config.font_size, 20);
        assert_eq!(config.orientation, Orientation::Landscape);
        assert_eq!(config.chunk_size, 3);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert!(config.auto_advance);
        assert!((config.tts_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = parse_config("[appearance]\nfont_size = 2\n[tts]\nrate = 9.0\n")
            .expect("valid config");
        assert_eq!(config.font_size, crate::config::MIN_FONT_SIZE);
        assert!((config.tts_rate - crate::config::MAX_TTS_RATE).abs() < f32::EPSILON);
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = ReaderConfig::default();
        config.tts_voice = Some("it-IT".to_string());
        config.font_size = 18;
        let text = serialize_config(&config).expect("serializable");
        assert_eq!(parse_config(&text).expect("parses"), config);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/definitely/not/here/config.toml"));
        assert_eq!(config, ReaderConfig::default());
    }
}
