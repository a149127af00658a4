use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::model::{OwnerMode, WindowOptions};

pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dockyard")
        .join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("dockyard")
}

pub fn layout_file() -> PathBuf { data_dir().join("layout.ron") }

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub drag: DragSettings,
    #[serde(default)]
    pub windows: WindowSettings,
    #[serde(default)]
    pub docks: DockSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    /// Thickness of every splitter along its container's axis.
    #[serde(default = "default_splitter_thickness")]
    pub splitter_thickness: u32,
    /// Minimum extent of a pane when dragging a splitter, unless the dockable sets its own.
    #[serde(default)]
    pub default_min_size: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DragSettings {
    /// Pointer travel before a press becomes a drag.
    #[serde(default = "default_min_drag_distance")]
    pub min_drag_distance: f64,
    /// Fraction of a target's extent that counts as an edge (split) zone.
    #[serde(default = "default_edge_zone_fraction")]
    pub edge_zone_fraction: f64,
    /// Width in units of the band along the root's border that docks globally.
    #[serde(default = "default_global_band")]
    pub global_band: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct WindowSettings {
    #[serde(default = "default_window_width")]
    pub default_width: f64,
    #[serde(default = "default_window_height")]
    pub default_height: f64,
    #[serde(default)]
    pub owner_mode: OwnerMode,
    #[serde(default = "yes")]
    pub show_in_taskbar: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DockSettings {
    /// Default for `can_close_last_dockable` on newly created containers.
    #[serde(default = "yes")]
    pub can_close_last_dockable: bool,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            splitter_thickness: default_splitter_thickness(),
            default_min_size: 0.0,
        }
    }
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            min_drag_distance: default_min_drag_distance(),
            edge_zone_fraction: default_edge_zone_fraction(),
            global_band: default_global_band(),
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            default_width: default_window_width(),
            default_height: default_window_height(),
            owner_mode: OwnerMode::default(),
            show_in_taskbar: true,
        }
    }
}

impl Default for DockSettings {
    fn default() -> Self { Self { can_close_last_dockable: true } }
}

fn yes() -> bool { true }
fn default_splitter_thickness() -> u32 { 4 }
fn default_min_drag_distance() -> f64 { 4.0 }
fn default_edge_zone_fraction() -> f64 { 0.25 }
fn default_global_band() -> f64 { 16.0 }
fn default_window_width() -> f64 { 400.0 }
fn default_window_height() -> f64 { 300.0 }

impl LayoutSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.splitter_thickness > 64 {
            issues.push(format!(
                "layout.splitter_thickness ({}) is unreasonably large",
                self.splitter_thickness
            ));
        }
        if !self.default_min_size.is_finite() || self.default_min_size < 0.0 {
            issues.push("layout.default_min_size must be a non-negative number".to_string());
        }
        issues
    }
}

impl DragSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.min_drag_distance < 0.0 {
            issues.push("drag.min_drag_distance must not be negative".to_string());
        }
        if !(0.0..0.5).contains(&self.edge_zone_fraction) {
            issues.push(format!(
                "drag.edge_zone_fraction ({}) must be in [0, 0.5)",
                self.edge_zone_fraction
            ));
        }
        if self.global_band < 0.0 {
            issues.push("drag.global_band must not be negative".to_string());
        }
        issues
    }
}

impl WindowSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.default_width <= 0.0 || self.default_height <= 0.0 {
            issues.push("windows.default_width and default_height must be positive".to_string());
        }
        issues
    }

    pub fn default_options(&self) -> WindowOptions {
        WindowOptions {
            owner_mode: self.owner_mode,
            is_modal: false,
            show_in_taskbar: self.show_in_taskbar,
        }
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&buf)
    }

    /// Reads the user's config file, falling back to the embedded defaults when absent.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Ok(Self::embedded()) }
    }

    pub fn embedded() -> Config {
        Self::parse(include_str!("../../dockyard.default.toml")).unwrap_or_default()
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        let config: Config = toml::from_str(buf).context("parsing config")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.layout.validate());
        issues.extend(self.drag.validate());
        issues.extend(self.windows.validate());
        issues
    }
}
