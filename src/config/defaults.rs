use super::models::{LogLevel, Orientation, ThemeMode};

pub(crate) fn default_theme() -> ThemeMode {
    ThemeMode::Day
}

pub(crate) fn default_font_size() -> u32 {
    14
}

pub(crate) fn default_viewport_width() -> f32 {
    1080.0
}

pub(crate) fn default_viewport_height() -> f32 {
    1920.0
}

pub(crate) fn default_orientation() -> Orientation {
    Orientation::Portrait
}

pub(crate) fn default_page_separator_width() -> f32 {
    8.0
}

pub(crate) fn default_chunk_size() -> usize {
    5
}

pub(crate) fn default_auto_advance() -> bool {
    true
}

pub(crate) fn default_tts_rate() -> f32 {
    1.0
}

pub(crate) fn default_tts_model() -> String {
    "/usr/share/piper-voices/en/en_US/ryan/high/en_US-ryan-high.onnx".to_string()
}

pub(crate) fn default_tts_espeak_path() -> String {
    "/usr/share".to_string()
}

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}

pub(crate) fn default_position_store() -> String {
    ".cache/positions.toml".to_string()
}
