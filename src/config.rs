// config.rs

use crate::clock::ClockSchedule;
use crate::sink::{GattConfig, MeshConfig, MeshMode, DEFAULT_MESH_PORT};
use config::{Config, Environment, File, FileFormat};
use log::{debug, info};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const MIN_TEMPO_BPM: u32 = 20;
pub const MAX_TEMPO_BPM: u32 = 300;
pub const ENV_PREFIX: &str = "CLOCKCAST";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("tempo {0} BPM is outside 20..=300")]
    TempoOutOfRange(u32),
    #[error("invalid mesh peer address '{0}'")]
    InvalidPeer(String),
    #[error("router queue depth must be at least 1")]
    ZeroQueueDepth,
}

/// Which side owns the clock. Only one master per network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockSource {
    #[default]
    Internal,
    Mesh,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WiredSettings {
    pub enabled: bool,
    /// Output port name (substring match). `None` picks the first port.
    pub port: Option<String>,
}

impl Default for WiredSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            port: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsbSettings {
    pub enabled: bool,
    pub port: Option<String>,
    pub virtual_port: bool,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            port: None,
            virtual_port: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WirelessSettings {
    pub enabled: bool,
    pub device_name: String,
    pub passkey: u32,
}

impl Default for WirelessSettings {
    fn default() -> Self {
        let gatt = GattConfig::default();
        Self {
            enabled: true,
            device_name: gatt.device_name,
            passkey: gatt.passkey,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    pub mode: MeshMode,
    pub port: u16,
    pub encrypt: bool,
    pub low_latency: bool,
    pub peers: Vec<String>,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            mode: MeshMode::default(),
            port: DEFAULT_MESH_PORT,
            encrypt: false,
            low_latency: true,
            peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    pub queue_depth: usize,
    pub write_timeout_us: u64,
    pub slow_send_warn_us: u64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            write_timeout_us: 0,
            slow_send_warn_us: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tempo_bpm: u32,
    pub clock_source: ClockSource,
    pub wired: WiredSettings,
    pub usb: UsbSettings,
    pub wireless: WirelessSettings,
    pub mesh: MeshSettings,
    pub router: RouterSettings,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tempo_bpm: 120,
            clock_source: ClockSource::default(),
            wired: WiredSettings::default(),
            usb: UsbSettings::default(),
            wireless: WirelessSettings::default(),
            mesh: MeshSettings::default(),
            router: RouterSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    /// Layers an optional TOML file under `CLOCKCAST__*` environment
    /// variables. A missing file is not an error. Not validated: command-line
    /// overrides still apply, call [`Settings::validate`] after them.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Reading configuration from {}", path.display());
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("mesh.peers"),
            )
            .build()?
            .try_deserialize()?;
        info!(
            "Loaded settings: {} BPM, clock source {:?}, mesh {:?}",
            settings.tempo_bpm, settings.clock_source, settings.mesh.mode
        );
        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(&self.tempo_bpm) {
            return Err(ConfigError::TempoOutOfRange(self.tempo_bpm));
        }
        if self.router.queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        self.mesh_peers()?;
        Ok(())
    }

    pub fn schedule(&self) -> ClockSchedule {
        ClockSchedule::new(self.tempo_bpm)
    }

    pub fn mesh_config(&self) -> MeshConfig {
        MeshConfig {
            mode: self.mesh.mode,
            port: self.mesh.port,
            encrypt: self.mesh.encrypt,
            low_latency: self.mesh.low_latency,
        }
    }

    pub fn mesh_peers(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.mesh
            .peers
            .iter()
            .map(|peer| {
                peer.parse::<SocketAddr>()
                    .map_err(|_| ConfigError::InvalidPeer(peer.clone()))
            })
            .collect()
    }

    pub fn gatt_config(&self) -> GattConfig {
        GattConfig {
            device_name: self.wireless.device_name.clone(),
            passkey: self.wireless.passkey,
            ..GattConfig::default()
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_micros(self.router.write_timeout_us)
    }

    pub fn slow_send_warning(&self) -> Duration {
        Duration::from_micros(self.router.slow_send_warn_us)
    }
}
