// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every field has a default, so a missing or partial config.toml still
// yields a complete Config. AppSettings is the frozen view the driver
// consumes once at startup.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub gui: GuiConfig,
    pub debug: DebugConfig,
    pub demo: DemoConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Dear ImGui winit+Vulkan example".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub min_image_count: u32,
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            min_image_count: 2,
            clear_color: [0.45, 0.55, 0.60, 1.00],
        }
    }
}

/// GUI overlay settings
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct GuiConfig {
    pub show_demo: bool,
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
        }
    }
}

/// What the demo frame renderer draws
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub widgets: bool,
    pub bar_plot: bool,
    pub line_plot: bool,
    /// Bars in the bar plot
    pub bars: usize,
    /// Points in the line plot
    pub samples: usize,
    pub amplitude: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            widgets: true,
            bar_plot: false,
            line_plot: false,
            bars: 10,
            samples: 100,
            amplitude: 1.0,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get present mode as Vulkan enum
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                vk::PresentModeKHR::FIFO
            }
        }
    }

    /// Freeze the parts of the config the driver needs at startup.
    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            width: self.window.width,
            height: self.window.height,
            title: self.window.title.clone(),
            show_demo: self.gui.show_demo,
            clear_color: self.graphics.clear_color,
            min_image_count: self.graphics.min_image_count,
            present_mode: self.present_mode(),
            validation: cfg!(debug_assertions) && self.debug.validation_layers,
        }
    }
}

/// Startup settings, immutable once the driver has been constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub show_demo: bool,
    pub clear_color: [f32; 4],
    pub min_image_count: u32,
    pub present_mode: vk::PresentModeKHR,
    pub validation: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Config::default().app_settings()
    }
}

impl AppSettings {
    /// Clear color with RGB premultiplied by alpha.
    pub fn clear_value(&self) -> vk::ClearValue {
        let [r, g, b, a] = self.clear_color;
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [r * a, g * a, b * a, a],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.width, 1280);
        assert_eq!(settings.height, 720);
        assert_eq!(settings.title, "Dear ImGui winit+Vulkan example");
        assert!(!settings.show_demo);
        assert_eq!(settings.min_image_count, 2);
        assert_eq!(settings.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [window]
            title = "My Vulkan+ImGui App"

            [gui]
            show_demo = true

            [demo]
            line_plot = true
            bars = 24
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "My Vulkan+ImGui App");
        assert_eq!(config.window.width, 1280);
        assert!(config.gui.show_demo);
        assert!(config.demo.widgets);
        assert!(config.demo.line_plot);
        assert!(!config.demo.bar_plot);
        assert_eq!(config.demo.bars, 24);
        assert_eq!(config.demo.samples, 100);
    }

    #[test]
    fn test_present_mode_parsing() {
        let mut config = Config::default();
        config.graphics.present_mode = "Mailbox".to_string();
        assert_eq!(config.present_mode(), vk::PresentModeKHR::MAILBOX);

        config.graphics.present_mode = "vsync-ish".to_string();
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(Config::from_toml("[window\nwidth = 3").is_err());
        assert!(Config::from_toml("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_from_path("definitely/not/here/config.toml").unwrap();
        assert_eq!(config.window.height, 720);
    }

    #[test]
    fn test_clear_value_premultiplies_alpha() {
        let settings = AppSettings {
            clear_color: [1.0, 0.5, 0.25, 0.5],
            ..AppSettings::default()
        };
        let color = unsafe { settings.clear_value().color.float32 };
        assert_eq!(color, [0.5, 0.25, 0.125, 0.5]);
    }
}
