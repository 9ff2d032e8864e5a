use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub light: LightConfig,
    #[serde(default)]
    pub mesh: MeshConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_true")]
    pub vsync: bool,
}

#[derive(Debug, Deserialize)]
pub struct CameraConfig {
    /// Vertical field of view, used at startup and on every resize.
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    #[serde(default = "default_eye")]
    pub eye: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
}

#[derive(Debug, Deserialize)]
pub struct LightConfig {
    #[serde(default = "default_light_position")]
    pub position: [f32; 3],
}

#[derive(Debug, Deserialize)]
pub struct MeshConfig {
    #[serde(default = "default_one")]
    pub radius: f32,
    #[serde(default = "default_tessellation")]
    pub rings: u32,
    #[serde(default = "default_tessellation")]
    pub sectors: u32,
    #[serde(default = "default_one")]
    pub scale: f32,
    #[serde(default)]
    pub deduplicate: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnimationConfig {
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default = "default_tilt")]
    pub tilt_degrees: f32,
    /// Radians per second around the local Y axis.
    #[serde(default = "default_rotation_speed")]
    pub rotation_speed: f32,
    #[serde(default = "default_one")]
    pub amplitude_gain: f32,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_true")]
    pub looping: bool,
    /// 0.0 uses the raw per-frame amplitude.
    #[serde(default)]
    pub smoothing: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            vsync: default_true(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
            eye: default_eye(),
            target: [0.0; 3],
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: default_light_position(),
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            radius: default_one(),
            rings: default_tessellation(),
            sectors: default_tessellation(),
            scale: default_one(),
            deduplicate: false,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            tilt_degrees: default_tilt(),
            rotation_speed: default_rotation_speed(),
            amplitude_gain: default_one(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            looping: default_true(),
            smoothing: 0.0,
        }
    }
}

fn default_width() -> u32 { 1024 }
fn default_height() -> u32 { 768 }
fn default_title() -> String { "pulsemesh".into() }
fn default_true() -> bool { true }
fn default_fov() -> f32 { 45.0 }
fn default_near() -> f32 { 0.1 }
fn default_far() -> f32 { 300.0 }
fn default_eye() -> [f32; 3] { [0.0, 0.0, 3.0] }
fn default_light_position() -> [f32; 3] { [1.2, 1.0, 2.0] }
fn default_one() -> f32 { 1.0 }
fn default_tessellation() -> u32 { 48 }
fn default_tilt() -> f32 { -20.0 }
fn default_rotation_speed() -> f32 { 0.5 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path, then ./pulsemesh.toml, then the user config directories.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("pulsemesh.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("pulsemesh").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("pulsemesh").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

impl Config {
    /// Flags given on the command line win over the file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(width) = cli.width {
            self.window.width = width;
        }
        if let Some(height) = cli.height {
            self.window.height = height;
        }
        if let Some(fov) = cli.fov {
            self.camera.fov_degrees = fov;
        }
        if let Some(scale) = cli.scale {
            self.mesh.scale = scale;
        }
        if cli.no_loop {
            self.audio.looping = false;
        }
        self.audio.smoothing = self.audio.smoothing.clamp(0.0, 0.99);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.window.width, 1024);
        assert_eq!(cfg.camera.fov_degrees, 45.0);
        assert_eq!(cfg.mesh.rings, 48);
        assert!(cfg.audio.looping);
        assert_eq!(cfg.audio.smoothing, 0.0);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [camera]
            fov_degrees = 60.0

            [mesh]
            rings = 12
            deduplicate = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.camera.fov_degrees, 60.0);
        assert_eq!(cfg.camera.far, 300.0);
        assert_eq!(cfg.mesh.rings, 12);
        assert_eq!(cfg.mesh.sectors, 48);
        assert!(cfg.mesh.deduplicate);
    }

    #[test]
    fn cli_overrides_file() {
        let mut cfg: Config = toml::from_str("[window]\nwidth = 640\n[audio]\nsmoothing = 5.0\n").unwrap();
        let cli = Cli::parse_from([
            "pulsemesh", "track.ogg", "--height", "480", "--fov", "70", "--no-loop",
        ]);
        cfg.apply_cli(&cli);
        assert_eq!(cfg.window.width, 640);
        assert_eq!(cfg.window.height, 480);
        assert_eq!(cfg.camera.fov_degrees, 70.0);
        assert!(!cfg.audio.looping);
        assert_eq!(cfg.audio.smoothing, 0.99);
    }
}
