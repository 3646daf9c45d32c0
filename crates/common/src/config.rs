//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding readers.json and persisted timings.
    pub data_dir: PathBuf,

    /// Reader catalog location. Defaults to `<data_dir>/readers.json`.
    #[serde(default)]
    pub readers_file: Option<PathBuf>,

    /// Where collection text is retrieved from.
    pub source: SourceConfig,

    /// Default rendering and export settings.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Text retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL prefix; the collection number is appended.
    pub base_url: String,

    /// User-Agent header sent upstream (some hosts reject requests without one).
    pub user_agent: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Default rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// AAC bitrate for the trimmed audio.
    pub audio_bitrate_kbps: u32,

    /// Font faces used by the frame renderer.
    pub fonts: FontConfig,

    /// Parent directory for export workspaces (system temp dir when unset).
    pub work_dir: Option<PathBuf>,
}

/// Font files for each text role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Face for the primary-language sentence text.
    pub primary: PathBuf,

    /// Face for the corner labels.
    pub label: PathBuf,

    /// Face for translation lines.
    pub translation: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "versereel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs_default_data(),
            readers_file: None,
            source: SourceConfig::default(),
            render: RenderDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.dalailalkhayrat.com/parts.php?part=".to_string(),
            user_agent: "Mozilla/5.0 (compatible; Versereel/0.1)".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            audio_bitrate_kbps: 192,
            fonts: FontConfig::default(),
            work_dir: None,
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        let base = PathBuf::from("/usr/share/fonts/truetype");
        Self {
            primary: base.join("amiri").join("Amiri-Regular.ttf"),
            label: base.join("cairo").join("Cairo-Bold.ttf"),
            translation: base.join("cairo").join("Cairo-Regular.ttf"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Effective reader catalog path.
    pub fn readers_path(&self) -> PathBuf {
        self.readers_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("readers.json"))
    }

    /// Directory holding persisted timing sets.
    pub fn timings_dir(&self) -> PathBuf {
        self.data_dir.join("timings")
    }

    /// Parent directory for export workspaces.
    pub fn work_dir(&self) -> PathBuf {
        self.render
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("versereel").join("config.json")
}

/// Default data directory.
fn dirs_default_data() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("versereel")
}
