use serde::{Deserialize, Serialize};

/// Limits for reader controls.
pub const MIN_FONT_SIZE: u32 = 10;
pub const MAX_FONT_SIZE: u32 = 36;
pub const MIN_TTS_RATE: f32 = 0.1;
pub const MAX_TTS_RATE: f32 = 3.0;

/// Explicit reader configuration; threaded into layout and playback instead
/// of being read ad hoc from storage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReaderConfig {
    #[serde(default = "crate::config::defaults::default_theme")]
    pub theme: ThemeMode,
    #[serde(default = "crate::config::defaults::default_font_size")]
    pub font_size: u32,
    #[serde(default = "crate::config::defaults::default_viewport_width")]
    pub viewport_width: f32,
    #[serde(default = "crate::config::defaults::default_viewport_height")]
    pub viewport_height: f32,
    #[serde(default = "crate::config::defaults::default_orientation")]
    pub orientation: Orientation,
    #[serde(default = "crate::config::defaults::default_page_separator_width")]
    pub page_separator_width: f32,
    #[serde(default = "crate::config::defaults::default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "crate::config::defaults::default_auto_advance")]
    pub auto_advance: bool,
    #[serde(default = "crate::config::defaults::default_tts_rate")]
    pub tts_rate: f32,
    #[serde(default)]
    pub tts_voice: Option<String>,
    #[serde(default = "crate::config::defaults::default_tts_model")]
    pub tts_model_path: String,
    #[serde(default = "crate::config::defaults::default_tts_espeak_path")]
    pub tts_espeak_path: String,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_position_store")]
    pub position_store: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            theme: crate::config::defaults::default_theme(),
            font_size: crate::config::defaults::default_font_size(),
            viewport_width: crate::config::defaults::default_viewport_width(),
            viewport_height: crate::config::defaults::default_viewport_height(),
            orientation: crate::config::defaults::default_orientation(),
            page_separator_width: crate::config::defaults::default_page_separator_width(),
            chunk_size: crate::config::defaults::default_chunk_size(),
            auto_advance: crate::config::defaults::default_auto_advance(),
            tts_rate: crate::config::defaults::default_tts_rate(),
            tts_voice: None,
            tts_model_path: crate::config::defaults::default_tts_model(),
            tts_espeak_path: crate::config::defaults::default_tts_espeak_path(),
            log_level: crate::config::defaults::default_log_level(),
            position_store: crate::config::defaults::default_position_store(),
        }
    }
}

/// What a settings update invalidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    /// Font size or viewport changed: reflowable content must be re-paginated.
    pub relayout: bool,
    /// Orientation changed: screen composition toggles.
    pub recompose: bool,
    /// Rate or voice changed: the speech engine must be updated.
    pub speech: bool,
    /// Chunk size changed: the controller's chunk boundaries move.
    pub chunking: bool,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        !(self.relayout || self.recompose || self.speech || self.chunking)
    }
}

impl ReaderConfig {
    /// Clamp every user-tunable value into its supported range.
    pub fn sanitized(mut self) -> Self {
        self.font_size = self.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self.tts_rate = self.tts_rate.clamp(MIN_TTS_RATE, MAX_TTS_RATE);
        self.chunk_size = self.chunk_size.max(1);
        self.viewport_width = self.viewport_width.max(1.0);
        self.viewport_height = self.viewport_height.max(1.0);
        self.page_separator_width = self.page_separator_width.max(0.0);
        self
    }

    pub fn diff(&self, next: &ReaderConfig) -> SettingsChange {
        SettingsChange {
            relayout: self.font_size != next.font_size
                || (self.viewport_width - next.viewport_width).abs() > f32::EPSILON
                || (self.viewport_height - next.viewport_height).abs() > f32::EPSILON
                || (self.page_separator_width - next.page_separator_width).abs() > f32::EPSILON,
            recompose: self.orientation != next.orientation,
            speech: (self.tts_rate - next.tts_rate).abs() > f32::EPSILON
                || self.tts_voice != next.tts_voice,
            chunking: self.chunk_size != next.chunk_size,
        }
    }

    pub fn night_mode(&self) -> bool {
        self.theme == ThemeMode::Night
    }
}

/// Host policy mapping font size to the paginator's page budget: larger
/// type leaves room for fewer characters.
pub fn approx_chars_per_page(font_size: u32) -> usize {
    if font_size > 18 {
        800
    } else if font_size > 16 {
        1200
    } else {
        1500
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeMode {
    #[default]
    Day,
    Sepia,
    Night,
}

impl std::fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ThemeMode::Day => "Day",
            ThemeMode::Sepia => "Sepia",
            ThemeMode::Night => "Night",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        };
        write!(f, "{}", label)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_clamps_font_rate_and_chunk() {
        let config = ReaderConfig {
            font_size: 90,
            tts_rate: 12.0,
            chunk_size: 0,
            ..ReaderConfig::default()
        }
        .sanitized();
        assert_eq!(config.font_size, MAX_FONT_SIZE);
        assert!((config.tts_rate - MAX_TTS_RATE).abs() < f32::EPSILON);
        assert_eq!(config.chunk_size, 1);
    }

    #[test]
    fn diff_reports_each_kind_of_change() {
        let base = ReaderConfig::default();
        assert!(base.diff(&base).is_empty());

        let mut next = base.clone();
        next.font_size = 20;
        next.orientation = Orientation::Landscape;
        let change = base.diff(&next);
        assert!(change.relayout);
        assert!(change.recompose);
        assert!(!change.speech);

        let mut voiced = base.clone();
        voiced.tts_voice = Some("en_GB".to_string());
        assert!(base.diff(&voiced).speech);
    }

    #[test]
    fn larger_fonts_get_smaller_pages() {
        assert_eq!(approx_chars_per_page(14), 1500);
        assert_eq!(approx_chars_per_page(17), 1200);
        assert_eq!(approx_chars_per_page(24), 800);
    }
}
