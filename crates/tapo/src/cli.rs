use std::time::Duration;

use clap::{Parser, Subcommand};

pub fn parse_duration(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = arg.parse()?;
    Ok(Duration::from_secs(seconds))
}

/// TP-Link Tapo smart plug client
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Device hostname or IP address, optionally with a port.
    /// Can also be set via TAPO_IP environment variable.
    #[arg(long, global = true, env = "TAPO_IP")]
    pub host: Option<String>,

    /// TP-Link cloud account username (email).
    /// Can also be set via TAPO_EMAIL environment variable.
    #[arg(short, long, global = true, env = "TAPO_EMAIL")]
    pub username: Option<String>,

    /// Read password from stdin.
    /// Useful for scripting: echo "password" | tapo --host 192.168.1.100 -u user@example.com --password-stdin info
    #[arg(long, global = true)]
    pub password_stdin: bool,

    /// Timeout in seconds for each request to the device
    #[arg(long, global = true, value_parser = parse_duration, default_value = "2")]
    pub timeout: Duration,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Get device status
    Info,
    /// Get energy meter readings
    Energy,
    /// Get usage totals for today, the past 7 and the past 30 days
    Usage,
    /// Turn relay on
    On,
    /// Turn relay off
    Off,
    /// Set device properties from a JSON object
    Set {
        /// JSON object, e.g. '{"device_on":true}'
        json: String,
    },
    /// Show version information for CLI and core library
    Version,
}

impl Command {
    /// Returns true if the command talks to a device.
    pub fn needs_device(&self) -> bool {
        !matches!(self, Command::Version)
    }
}
