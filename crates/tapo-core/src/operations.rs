//! Typed device operations.
//!
//! Thin wrappers over [`Device::send_secure_request`], one per supported
//! method.

use serde::de::IgnoredAny;
use serde_json::{Map, Value};

use crate::{
    device::Device,
    envelope::methods,
    error::Error,
    response::{DeviceStatus, DeviceUsage, EnergyUsage},
};

impl Device {
    /// Reads the device status.
    ///
    /// `nickname` and `ssid` are returned Base64-decoded. If either fails to
    /// decode the whole call fails with [`Error::Decode`].
    pub async fn get_status(&mut self) -> Result<DeviceStatus, Error> {
        let mut status: DeviceStatus = self
            .send_secure_request::<(), _>(methods::GET_DEVICE_INFO, None)
            .await?;
        status.decode_text_fields()?;
        Ok(status)
    }

    /// Reads the energy meter. Only meaningful for devices where
    /// [`DeviceStatus::supports_energy_monitoring`] holds.
    pub async fn get_energy_usage(&mut self) -> Result<EnergyUsage, Error> {
        self.send_secure_request::<(), _>(methods::GET_ENERGY_USAGE, None)
            .await
    }

    /// Reads usage totals for today and the past 7 and 30 days.
    pub async fn get_device_usage(&mut self) -> Result<DeviceUsage, Error> {
        self.send_secure_request::<(), _>(methods::GET_DEVICE_USAGE, None)
            .await
    }

    /// Sets arbitrary device properties.
    pub async fn set_device_properties(&mut self, properties: Map<String, Value>) -> Result<(), Error> {
        let _: IgnoredAny = self
            .send_secure_request(methods::SET_DEVICE_INFO, Some(properties))
            .await?;
        Ok(())
    }

    /// Switches the relay on or off.
    pub async fn set_power(&mut self, on: bool) -> Result<(), Error> {
        let mut properties = Map::new();
        properties.insert("device_on".to_string(), Value::Bool(on));
        self.set_device_properties(properties).await
    }
}
