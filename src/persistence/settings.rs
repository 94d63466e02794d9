use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::gui::render::DEFAULT_LABEL_BUDGET;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    // If None, use OS default data directory
    pub autosave_override: Option<PathBuf>,
    // Read and write the parallel backup table set instead of the primary one
    #[serde(default)]
    pub use_backup_tables: bool,
    #[serde(default = "AppSettings::default_label_budget")]
    pub label_char_budget: usize,
    // Open on the session view rather than the full graph
    #[serde(default)]
    pub show_session_view: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            autosave_override: None,
            use_backup_tables: false,
            label_char_budget: Self::default_label_budget(),
            show_session_view: false,
        }
    }
}

impl AppSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Note-Loom
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Note-Loom");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Note-Loom
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Note-Loom");
            }
            return PathBuf::from("Note-Loom");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/Note-Loom or ~/.config/Note-Loom
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("Note-Loom");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("Note-Loom");
        }
    }

    fn data_default_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Ok(local) = std::env::var("LOCALAPPDATA") {
                return PathBuf::from(local).join("Note-Loom").join("Data");
            }
            return std::env::temp_dir().join("Note-Loom");
        }
        #[cfg(not(target_os = "windows"))]
        {
            // $XDG_DATA_HOME/note-loom or ~/.local/share/note-loom, else temp
            if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
                return PathBuf::from(xdg).join("note-loom");
            }
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(".local").join("share").join("note-loom");
            }
            return std::env::temp_dir().join("Note-Loom");
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_dir().join("settings.json"))
    }

    /// Read settings from `path`; a missing file gives the defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut f = fs::File::open(path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        let v: Self = serde_json::from_str(&s)?;
        Ok(v)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_dir().join("settings.json"))
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Directory holding the node/link table files.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(p) = &self.autosave_override { return p.clone(); }
        Self::data_default_dir()
    }

    pub(crate) fn default_label_budget() -> usize { DEFAULT_LABEL_BUDGET }
}
