use std::path::{Path, PathBuf};

use log::{info, warn};
use picoboy_core::audio::{DEFAULT_ATTENUATION, MAX_ATTENUATION};
use picoboy_core::channel::{DEFAULT_DEPTH, MAX_DEPTH};
use picoboy_core::palette::{Palette, PalettePreset};
use picoboy_core::render::TransferMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PaletteChoice {
    #[default]
    DmgGreen,
    Pocket,
    /// OBJ0, OBJ1 and BG shades as 0xRRGGBB, lightest first.
    Custom([u32; 12]),
}

impl PaletteChoice {
    pub fn palette(&self) -> Palette {
        match self {
            Self::DmgGreen => PalettePreset::DmgGreen.palette(),
            Self::Pocket => PalettePreset::Pocket.palette(),
            Self::Custom(c) => Palette::from_rgb888(
                [c[0], c[1], c[2], c[3]],
                [c[4], c[5], c[6], c[7]],
                [c[8], c[9], c[10], c[11]],
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransferModeConfig {
    #[default]
    Synchronous,
    Asynchronous,
}

impl From<TransferModeConfig> for TransferMode {
    fn from(mode: TransferModeConfig) -> Self {
        match mode {
            TransferModeConfig::Synchronous => TransferMode::Synchronous,
            TransferModeConfig::Asynchronous => TransferMode::Asynchronous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub palette: PaletteChoice,
    pub transfer_mode: TransferModeConfig,
    pub channel_depth: usize,
    /// Attenuation shift, 0 (loudest) to 16 (silent).
    pub volume: u8,
    pub audio: bool,
    pub limit_speed: bool,
    pub snapshot: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            palette: PaletteChoice::default(),
            transfer_mode: TransferModeConfig::default(),
            channel_depth: DEFAULT_DEPTH,
            volume: DEFAULT_ATTENUATION,
            audio: true,
            limit_speed: true,
            snapshot: None,
        }
    }
}

impl HostConfig {
    /// Clamp out-of-range values instead of rejecting the whole file.
    fn sanitized(mut self) -> Self {
        if self.volume > MAX_ATTENUATION {
            warn!("volume {} out of range, using {MAX_ATTENUATION}", self.volume);
            self.volume = MAX_ATTENUATION;
        }
        let depth = self.channel_depth.clamp(1, MAX_DEPTH);
        if depth != self.channel_depth {
            warn!("channel_depth {} out of range, using {depth}", self.channel_depth);
            self.channel_depth = depth;
        }
        self
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("picoboy").join("picoboy.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("picoboy").join("picoboy.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("picoboy")
            .join("picoboy.toml");
    }

    PathBuf::from("picoboy.toml")
}

pub fn load_from_file(path: &Path) -> HostConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return HostConfig::default(),
    };

    match toml::from_str::<HostConfig>(&text) {
        Ok(cfg) => {
            info!("Loaded config from {}", path.display());
            cfg.sanitized()
        }
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            HostConfig::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &HostConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}
