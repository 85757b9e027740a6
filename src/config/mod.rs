//! Reader settings.
//!
//! One [`ReaderConfig`] is threaded through the session; nothing reads
//! settings from ambient storage. The file form is a set of TOML tables
//! (`[layout]`, `[reading]`, `[tts]`, ...) with per-field defaults, so a
//! partial or broken file still yields a usable config.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{
    LogLevel, MAX_FONT_SIZE, MAX_TTS_RATE, MIN_FONT_SIZE, MIN_TTS_RATE, Orientation,
    ReaderConfig, SettingsChange, ThemeMode, approx_chars_per_page,
};
