//! Collects metrics from one device.

use tapo_core::{Device, Error, SessionStage};
use tracing::{debug, error};

use crate::metrics::DeviceMetrics;

/// Reads status (and energy usage when supported) into `metrics`.
///
/// Logs in first unless the handle already holds a token.
pub async fn collect(device: &mut Device, metrics: &DeviceMetrics) -> Result<(), Error> {
    if device.stage() != SessionStage::Authenticated {
        device.login().await?;
    }

    let status = device.get_status().await?;
    debug!(
        host = device.host(),
        nickname = %status.nickname,
        model = %status.model,
        "Collected status"
    );

    // Fetch energy before touching metrics so a failure leaves no partial set.
    let energy = if status.supports_energy_monitoring() {
        Some(device.get_energy_usage().await?)
    } else {
        None
    };

    metrics.set_status(&status);
    if let Some(energy) = energy {
        metrics.set_energy(&status, &energy);
    }
    Ok(())
}

/// Collects from `device` and records whether it succeeded.
pub async fn scrape(device: &mut Device, metrics: &DeviceMetrics) -> bool {
    let online = match collect(device, metrics).await {
        Ok(()) => true,
        Err(e) => {
            error!(host = device.host(), "Error collecting: {}", e);
            false
        }
    };
    metrics.set_online(device.host(), online);
    online
}
