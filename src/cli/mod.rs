use crate::config::{ClockSource, Settings};
use crate::sink::MeshMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClockSourceArg {
    Internal,
    Mesh,
}

impl From<ClockSourceArg> for ClockSource {
    fn from(arg: ClockSourceArg) -> Self {
        match arg {
            ClockSourceArg::Internal => ClockSource::Internal,
            ClockSourceArg::Mesh => ClockSource::Mesh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MeshModeArg {
    Off,
    Broadcast,
    Peer,
}

impl From<MeshModeArg> for MeshMode {
    fn from(arg: MeshModeArg) -> Self {
        match arg {
            MeshModeArg::Off => MeshMode::Off,
            MeshModeArg::Broadcast => MeshMode::Broadcast,
            MeshModeArg::Peer => MeshMode::Peer,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "MIDI clock and transport broadcaster", long_about = None)]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tempo in beats per minute
    #[arg(short, long, value_name = "BPM")]
    pub tempo: Option<u32>,

    /// Which side owns the clock
    #[arg(short, long, value_enum)]
    pub clock_source: Option<ClockSourceArg>,

    /// Wired MIDI output port (substring match)
    #[arg(long, value_name = "PORT")]
    pub wired_port: Option<String>,

    /// USB MIDI port to bind instead of creating a virtual one
    #[arg(long, value_name = "PORT")]
    pub usb_port: Option<String>,

    /// Mesh operating mode
    #[arg(long, value_enum)]
    pub mesh_mode: Option<MeshModeArg>,

    /// List available MIDI ports and exit
    #[arg(long)]
    pub list_ports: bool,

    /// Pick the wired output port interactively
    #[arg(long)]
    pub select_ports: bool,

    /// Disable the status display
    #[arg(long)]
    pub no_ui: bool,
}

impl Args {
    /// Command-line values override the loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(tempo) = self.tempo {
            settings.tempo_bpm = tempo;
        }
        if let Some(source) = self.clock_source {
            settings.clock_source = source.into();
        }
        if let Some(port) = &self.wired_port {
            settings.wired.enabled = true;
            settings.wired.port = Some(port.clone());
        }
        if let Some(port) = &self.usb_port {
            settings.usb.enabled = true;
            settings.usb.port = Some(port.clone());
            settings.usb.virtual_port = false;
        }
        if let Some(mode) = self.mesh_mode {
            settings.mesh.mode = mode.into();
        }
    }
}

pub fn validate_device(device_name: &str, devices: &[String]) -> Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}
