//! Prometheus metrics definitions for Tapo devices.

use std::{sync::atomic::AtomicU64, time::Duration};

use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{family::Family, gauge::Gauge},
    registry::Registry,
};
use tapo_core::{DeviceStatus, EnergyUsage};

/// Labels identifying a device (used on most metrics).
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DeviceLabels {
    pub nickname: String,
    pub id: String,
}

/// Labels for the metadata metric.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MetadataLabels {
    pub nickname: String,
    pub hw_ver: String,
    pub sw_ver: String,
    pub model: String,
}

/// Labels for the online metric, keyed by the configured address since a
/// device that cannot be reached has no nickname or id.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TargetLabels {
    pub target: String,
}

impl From<&DeviceStatus> for DeviceLabels {
    fn from(status: &DeviceStatus) -> Self {
        Self {
            nickname: status.nickname.clone(),
            id: status.device_id.clone(),
        }
    }
}

impl From<&DeviceStatus> for MetadataLabels {
    fn from(status: &DeviceStatus) -> Self {
        Self {
            nickname: status.nickname.clone(),
            hw_ver: status.hw_ver.clone(),
            sw_ver: status.fw_ver.clone(),
            model: status.model.clone(),
        }
    }
}

/// Per-device metrics.
pub struct DeviceMetrics {
    online: Family<TargetLabels, Gauge>,
    metadata: Family<MetadataLabels, Gauge>,

    relay_state: Family<DeviceLabels, Gauge>,
    on_time: Family<DeviceLabels, Gauge>,
    rssi: Family<DeviceLabels, Gauge>,
    signal_level: Family<DeviceLabels, Gauge>,
    overheated: Family<DeviceLabels, Gauge>,

    // Energy metrics (only populated for devices that support it)
    current: Family<DeviceLabels, Gauge>,
    today_energy: Family<DeviceLabels, Gauge>,
    month_energy: Family<DeviceLabels, Gauge>,
    today_runtime: Family<DeviceLabels, Gauge>,
    month_runtime: Family<DeviceLabels, Gauge>,
}

impl DeviceMetrics {
    /// Create new metrics and register them with the provided registry.
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            online: Family::default(),
            metadata: Family::default(),
            relay_state: Family::default(),
            on_time: Family::default(),
            rssi: Family::default(),
            signal_level: Family::default(),
            overheated: Family::default(),
            current: Family::default(),
            today_energy: Family::default(),
            month_energy: Family::default(),
            today_runtime: Family::default(),
            month_runtime: Family::default(),
        };

        registry.register(
            "tapo_online",
            "Device online (1 = last collection succeeded)",
            metrics.online.clone(),
        );
        registry.register(
            "tapo_metadata",
            "Device metadata (value is always 1)",
            metrics.metadata.clone(),
        );
        registry.register(
            "tapo_relay_state",
            "Relay state (1 = on, 0 = off)",
            metrics.relay_state.clone(),
        );
        registry.register(
            "tapo_on_time",
            "Seconds since the last relay state change",
            metrics.on_time.clone(),
        );
        registry.register(
            "tapo_rssi",
            "WiFi received signal strength indicator in dBm",
            metrics.rssi.clone(),
        );
        registry.register(
            "tapo_signal_level",
            "WiFi signal level (0-3)",
            metrics.signal_level.clone(),
        );
        registry.register(
            "tapo_overheated",
            "Overheat protection tripped (1 = yes)",
            metrics.overheated.clone(),
        );
        registry.register(
            "tapo_current",
            "Current power draw in milliwatts (mW)",
            metrics.current.clone(),
        );
        registry.register(
            "tapo_today_energy",
            "Energy used today in watt-hours",
            metrics.today_energy.clone(),
        );
        registry.register(
            "tapo_month_energy",
            "Energy used this month in watt-hours",
            metrics.month_energy.clone(),
        );
        registry.register(
            "tapo_today_runtime",
            "Minutes on today",
            metrics.today_runtime.clone(),
        );
        registry.register(
            "tapo_month_runtime",
            "Minutes on this month",
            metrics.month_runtime.clone(),
        );

        metrics
    }

    /// Set whether the last collection from `target` succeeded
    pub fn set_online(&self, target: &str, online: bool) {
        self.online
            .get_or_create(&TargetLabels {
                target: target.to_string(),
            })
            .set(online as i64);
    }

    /// Set metadata and state metrics from a status snapshot
    pub fn set_status(&self, status: &DeviceStatus) {
        self.metadata
            .get_or_create(&MetadataLabels::from(status))
            .set(1);

        let labels = DeviceLabels::from(status);
        self.relay_state
            .get_or_create(&labels)
            .set(status.device_on as i64);
        self.on_time.get_or_create(&labels).set(status.on_time);
        self.rssi.get_or_create(&labels).set(status.rssi);
        self.signal_level
            .get_or_create(&labels)
            .set(status.signal_level);
        self.overheated
            .get_or_create(&labels)
            .set(status.overheated as i64);
    }

    /// Set energy meter metrics
    pub fn set_energy(&self, status: &DeviceStatus, energy: &EnergyUsage) {
        let labels = DeviceLabels::from(status);
        self.current.get_or_create(&labels).set(energy.current_power);
        self.today_energy
            .get_or_create(&labels)
            .set(energy.today_energy);
        self.month_energy
            .get_or_create(&labels)
            .set(energy.month_energy);
        self.today_runtime
            .get_or_create(&labels)
            .set(energy.today_runtime);
        self.month_runtime
            .get_or_create(&labels)
            .set(energy.month_runtime);
    }
}

/// Metrics about the background poller itself.
pub struct PollerMetrics {
    poll_duration_seconds: Gauge<f64, AtomicU64>,
    targets: Gauge,
    targets_online: Gauge,
}

impl PollerMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            poll_duration_seconds: Gauge::default(),
            targets: Gauge::default(),
            targets_online: Gauge::default(),
        };

        registry.register(
            "tapo_exporter_poll_duration_seconds",
            "Duration of the last poll cycle in seconds",
            metrics.poll_duration_seconds.clone(),
        );
        registry.register(
            "tapo_exporter_targets",
            "Number of configured targets",
            metrics.targets.clone(),
        );
        registry.register(
            "tapo_exporter_targets_online",
            "Number of targets collected successfully in the last poll",
            metrics.targets_online.clone(),
        );

        metrics
    }

    /// Record the outcome of one poll cycle
    pub fn set_poll(&self, duration: Duration, targets: usize, online: usize) {
        self.poll_duration_seconds.set(duration.as_secs_f64());
        self.targets.set(targets as i64);
        self.targets_online.set(online as i64);
    }
}
