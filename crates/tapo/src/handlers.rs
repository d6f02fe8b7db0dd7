use std::time::Duration;

use serde_json::json;
use tapo_core::{Device, DeviceConfig};
use tracing::{debug, error};

use crate::cli::Command;
use crate::utils::{get_credentials, parse_properties, print_json};

/// Handle the version command.
pub fn handle_version() {
    println!("tapo {}", env!("CARGO_PKG_VERSION"));
    println!("tapo-core {}", tapo_core::VERSION);
}

/// Handle a command that talks to a device.
pub async fn handle_device(
    host: Option<String>,
    username: Option<String>,
    password_stdin: bool,
    timeout: Duration,
    command: Command,
) {
    let Some(host) = host.filter(|h| !h.is_empty()) else {
        eprintln!("Error: No device address provided. Use --host or set TAPO_IP.");
        std::process::exit(1);
    };

    // Validate input before prompting for a password.
    let properties = match &command {
        Command::Set { json } => match parse_properties(json) {
            Ok(map) => Some(map),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        _ => None,
    };

    let credentials = match get_credentials(username, password_stdin) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let config = DeviceConfig::new(host.clone(), credentials).with_timeout(timeout);
    let mut device = Device::new(config);

    if let Err(e) = run(&mut device, command, properties).await {
        error!(host = %host, error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(
    device: &mut Device,
    command: Command,
    properties: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<(), String> {
    device
        .login()
        .await
        .map_err(|e| format!("Could not log in to {}: {}", device.host(), e))?;
    debug!(host = device.host(), command = ?command, "logged in");

    match command {
        Command::Info => {
            let status = device.get_status().await.map_err(|e| e.to_string())?;
            print_json(&status)
        }
        Command::Energy => {
            let energy = device.get_energy_usage().await.map_err(|e| e.to_string())?;
            print_json(&energy)
        }
        Command::Usage => {
            let usage = device.get_device_usage().await.map_err(|e| e.to_string())?;
            print_json(&usage)
        }
        Command::On | Command::Off => {
            let on = command == Command::On;
            device.set_power(on).await.map_err(|e| e.to_string())?;
            print_json(&json!({"device_on": on}))
        }
        Command::Set { .. } => {
            let properties = properties.unwrap_or_default();
            device
                .set_device_properties(properties.clone())
                .await
                .map_err(|e| e.to_string())?;
            print_json(&properties)
        }
        Command::Version => {
            handle_version();
            Ok(())
        }
    }
}
