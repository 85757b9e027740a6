use super::defaults;
use super::models::{LogLevel, Orientation, ReaderConfig, ThemeMode};
use serde::{Deserialize, Serialize};

/// On-disk shape of `conf/config.toml`: settings grouped by concern.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    appearance: AppearanceConfig,
    #[serde(default)]
    layout: LayoutTable,
    #[serde(default)]
    reading: ReadingConfig,
    #[serde(default)]
    tts: TtsConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    storage: StorageConfig,
}

impl From<ConfigTables> for ReaderConfig {
    fn from(tables: ConfigTables) -> Self {
        ReaderConfig {
            theme: tables.appearance.theme,
            font_size: tables.appearance.font_size,
            viewport_width: tables.layout.viewport_width,
            viewport_height: tables.layout.viewport_height,
            orientation: tables.layout.orientation,
            page_separator_width: tables.layout.page_separator_width,
            chunk_size: tables.reading.chunk_size,
            auto_advance: tables.reading.auto_advance,
            tts_rate: tables.tts.rate,
            tts_voice: tables.tts.voice,
            tts_model_path: tables.tts.model_path,
            tts_espeak_path: tables.tts.espeak_path,
            log_level: tables.logging.log_level,
            position_store: tables.storage.position_store,
        }
    }
}

impl From<&ReaderConfig> for ConfigTables {
    fn from(config: &ReaderConfig) -> Self {
        ConfigTables {
            appearance: AppearanceConfig {
                theme: config.theme,
                font_size: config.font_size,
            },
            layout: LayoutTable {
                viewport_width: config.viewport_width,
                viewport_height: config.viewport_height,
                orientation: config.orientation,
                page_separator_width: config.page_separator_width,
            },
            reading: ReadingConfig {
                chunk_size: config.chunk_size,
                auto_advance: config.auto_advance,
            },
            tts: TtsConfig {
                rate: config.tts_rate,
                voice: config.tts_voice.clone(),
                model_path: config.tts_model_path.clone(),
                espeak_path: config.tts_espeak_path.clone(),
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            storage: StorageConfig {
                position_store: config.position_store.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct AppearanceConfig {
    #[serde(default = "defaults::default_theme")]
    theme: ThemeMode,
    #[serde(default = "defaults::default_font_size")]
    font_size: u32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        AppearanceConfig {
            theme: defaults::default_theme(),
            font_size: defaults::default_font_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct LayoutTable {
    #[serde(default = "defaults::default_viewport_width")]
    viewport_width: f32,
    #[serde(default = "defaults::default_viewport_height")]
    viewport_height: f32,
    #[serde(default = "defaults::default_orientation")]
    orientation: Orientation,
    #[serde(default = "defaults::default_page_separator_width")]
    page_separator_width: f32,
}

impl Default for LayoutTable {
    fn default() -> Self {
        LayoutTable {
            viewport_width: defaults::default_viewport_width(),
            viewport_height: defaults::default_viewport_height(),
            orientation: defaults::default_orientation(),
            page_separator_width: defaults::default_page_separator_width(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ReadingConfig {
    #[serde(default = "defaults::default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "defaults::default_auto_advance")]
    auto_advance: bool,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        ReadingConfig {
            chunk_size: defaults::default_chunk_size(),
            auto_advance: defaults::default_auto_advance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct TtsConfig {
    #[serde(default = "defaults::default_tts_rate")]
    rate: f32,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default = "defaults::default_tts_model")]
    model_path: String,
    #[serde(default = "defaults::default_tts_espeak_path")]
    espeak_path: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        TtsConfig {
            rate: defaults::default_tts_rate(),
            voice: None,
            model_path: defaults::default_tts_model(),
            espeak_path: defaults::default_tts_espeak_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct StorageConfig {
    #[serde(default = "defaults::default_position_store")]
    position_store: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            position_store: defaults::default_position_store(),
        }
    }
}
