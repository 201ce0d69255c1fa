//! Configuration system for sill
//!
//! Loads configuration from TOML file at `~/.config/sill/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub colors: ColorConfig,
    pub commands: CommandsConfig,
    pub windows: WindowRulesConfig,
    pub keybindings: KeybindingsConfig,
    pub mousebindings: MousebindingsConfig,
    pub groups: GroupsConfig,
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults; the default file is written only for
    /// the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, is_default_path) = match path {
            Some(path) => (path.to_path_buf(), false),
            None => (Self::config_path()?, true),
        };

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if is_default_path {
                if let Err(e) = Self::save_default(&config_path) {
                    warn!("Failed to create default config file: {}", e);
                }
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config = Self::parse(&content)?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("sill");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string)
            .context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }

    /// Whether a window name matches the ignore list (case-insensitive prefix)
    pub fn is_ignored(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.windows
            .ignore
            .iter()
            .any(|prefix| name.starts_with(&prefix.to_lowercase()))
    }
}

/// Reserved space at the screen edges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gap {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

/// General behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// New windows without an autogroup match join the active group
    pub sticky_groups: bool,
    /// Overlay font (core X font name)
    pub font: String,
    /// Border width in pixels
    pub border_width: u32,
    /// Edge snap distance in pixels, 0 disables snapping
    pub snap_distance: u32,
    /// Keyboard move/resize step in pixels
    pub move_amount: u32,
    /// Number of remembered window names
    pub name_history: usize,
    pub gap: Gap,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            sticky_groups: false,
            font: "fixed".to_string(),
            border_width: 1,
            snap_distance: 0,
            move_amount: 1,
            name_history: crate::wm::client::NAME_HISTORY_LEN,
            gap: Gap::default(),
        }
    }
}

/// Border and overlay colors (hex: 0xRRGGBB)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub active: u32,
    pub inactive: u32,
    pub urgent: u32,
    /// Border of a client in the group being edited
    pub group: u32,
    /// Border of a client just removed from the group being edited
    pub ungroup: u32,
    pub menu_foreground: u32,
    pub menu_background: u32,
    pub menu_selection: u32,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            active: 0xcccccc,
            inactive: 0x666666,
            urgent: 0xfc8814,
            group: 0x0000ff,
            ungroup: 0xff0000,
            menu_foreground: 0x000000,
            menu_background: 0xffffff,
            menu_selection: 0xcccccc,
        }
    }
}

/// A fixed command-menu entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub name: String,
    pub path: String,
}

/// External programs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub terminal: String,
    pub lock: String,
    /// Directory whose executables are offered in the command menu
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub entries: Vec<CommandEntry>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            terminal: "xterm".to_string(),
            lock: "xlock".to_string(),
            directory: None,
            entries: Vec::new(),
        }
    }
}

/// Maps windows with a class (and optionally an instance) to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutogroupRule {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub group: String,
}

/// Per-window rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowRulesConfig {
    /// Window name prefixes that get no border and are skipped when cycling
    pub ignore: Vec<String>,
    pub autogroup: Vec<AutogroupRule>,
}

/// One key or button binding; `action = "unbind"` removes an existing one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEntry {
    pub key: String,
    pub action: String,
    /// Command line for `exec-command`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Keyboard shortcuts configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybindingsConfig {
    /// Start from the built-in bindings
    pub defaults: bool,
    pub bind: Vec<BindingEntry>,
}

impl Default for KeybindingsConfig {
    fn default() -> Self {
        Self {
            defaults: true,
            bind: Vec::new(),
        }
    }
}

/// Mouse button configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MousebindingsConfig {
    pub defaults: bool,
    pub bind: Vec<BindingEntry>,
}

impl Default for MousebindingsConfig {
    fn default() -> Self {
        Self {
            defaults: true,
            bind: Vec::new(),
        }
    }
}

/// Group naming
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    /// Names for the numbered groups, in order; missing entries use defaults
    pub names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.general.border_width, 1);
        assert!(config.keybindings.defaults);
        assert_eq!(config.commands.terminal, "xterm");
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = Config::parse(
            r#"
            [general]
            sticky_groups = true
            gap = { top = 18 }

            [windows]
            ignore = ["XClock"]

            [[windows.autogroup]]
            class = "Firefox"
            group = "two"

            [[keybindings.bind]]
            key = "CM-Return"
            action = "unbind"
            "#,
        )
        .unwrap();

        assert!(config.general.sticky_groups);
        assert_eq!(config.general.gap.top, 18);
        assert_eq!(config.general.snap_distance, 0);
        assert_eq!(
            config.windows.autogroup,
            vec![AutogroupRule {
                class: "Firefox".to_string(),
                instance: None,
                group: "two".to_string(),
            }]
        );
        assert_eq!(config.keybindings.bind[0].action, "unbind");
    }

    #[test]
    fn ignore_list_is_case_insensitive_prefix() {
        let mut config = Config::default();
        config.windows.ignore = vec!["xclock".to_string()];
        assert!(config.is_ignored("XClock - 12:00"));
        assert!(!config.is_ignored("my xclock"));
    }

    #[test]
    fn missing_explicit_file_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert!(!path.exists());
        assert_eq!(config.general.move_amount, 1);
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[colors]\nactive = 0x123456\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.colors.active, 0x123456);
        assert_eq!(config.colors.inactive, 0x666666);
    }

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::parse(&text).unwrap();
        assert_eq!(parsed.general.font, "fixed");
    }
}
