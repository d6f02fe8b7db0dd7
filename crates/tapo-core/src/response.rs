//! Typed response structures for Tapo device results.
//!
//! Each structure is decoded from the `result` object of a decrypted inner
//! response. Missing fields fall back to their defaults since firmware
//! versions differ in what they report.
//!
//! # Example
//!
//! ```
//! use tapo_core::response::DeviceUsage;
//!
//! let json = r#"{"power_usage":{"today":12,"past7":80,"past30":300}}"#;
//! let usage: DeviceUsage = serde_json::from_str(json).unwrap();
//! assert_eq!(usage.power_usage.past7, 80);
//! ```

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Device type that carries an energy meter.
pub const ENERGY_MONITORING_DEVICE_TYPE: &str = "SMART.TAPOPLUG";

/// Format of `local_time` as reported by the device (always UTC).
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Device status as returned by `get_device_info`.
///
/// `nickname` and `ssid` arrive Base64-encoded; [`crate::Device::get_status`]
/// decodes them before handing the status out.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DeviceStatus {
    /// User-assigned name.
    #[serde(default)]
    pub nickname: String,

    /// Wi-Fi network the device is joined to.
    #[serde(default)]
    pub ssid: String,

    /// Unique device ID.
    #[serde(default)]
    pub device_id: String,

    /// Model name (e.g., "P110").
    #[serde(default)]
    pub model: String,

    /// Device type (e.g., "SMART.TAPOPLUG").
    #[serde(default, rename = "type")]
    pub device_type: String,

    #[serde(default)]
    pub hw_ver: String,

    #[serde(default)]
    pub hw_id: String,

    #[serde(default)]
    pub fw_ver: String,

    #[serde(default)]
    pub fw_id: String,

    #[serde(default)]
    pub oem_id: String,

    #[serde(default)]
    pub mac: String,

    #[serde(default)]
    pub ip: String,

    /// Relay state.
    #[serde(default)]
    pub device_on: bool,

    /// Seconds since the last relay state change.
    #[serde(default)]
    pub on_time: i64,

    #[serde(default)]
    pub overheated: bool,

    /// Wi-Fi signal strength in dBm.
    #[serde(default)]
    pub rssi: i64,

    /// Coarse signal quality (0-3).
    #[serde(default)]
    pub signal_level: i64,

    /// Timezone region, passed through as reported.
    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub lang: String,

    #[serde(default)]
    pub latitude: i64,

    #[serde(default)]
    pub longitude: i64,

    #[serde(default)]
    pub location: String,

    /// Offset from UTC in minutes.
    #[serde(default)]
    pub time_diff: i64,

    #[serde(default)]
    pub specs: String,

    #[serde(default)]
    pub avatar: String,

    #[serde(default)]
    pub has_set_location_info: bool,

    #[serde(default)]
    pub power_protection_status: String,

    /// Power-on behaviour; the shape differs between models.
    #[serde(default)]
    pub default_states: serde_json::Value,
}

impl DeviceStatus {
    /// Decodes the Base64 `nickname` and `ssid` fields in place.
    ///
    /// Leaves `self` unchanged if either field fails to decode.
    pub fn decode_text_fields(&mut self) -> Result<(), Error> {
        let nickname = decode_base64_text("nickname", &self.nickname)?;
        let ssid = decode_base64_text("ssid", &self.ssid)?;
        self.nickname = nickname;
        self.ssid = ssid;
        Ok(())
    }

    /// Returns true if this device reports energy usage.
    pub fn supports_energy_monitoring(&self) -> bool {
        supports_energy_monitoring(self)
    }
}

/// Returns true if `status` describes a device with an energy meter.
///
/// Only an exact match on the device type counts.
pub fn supports_energy_monitoring(status: &DeviceStatus) -> bool {
    status.device_type == ENERGY_MONITORING_DEVICE_TYPE
}

fn decode_base64_text(field: &str, value: &str) -> Result<String, Error> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| Error::Decode(format!("{} is not valid base64: {}", field, e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Decode(format!("{} is not valid UTF-8: {}", field, e)))
}

/// Energy meter readings as returned by `get_energy_usage`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EnergyUsage {
    /// Current power draw in milliwatts.
    #[serde(default)]
    pub current_power: i64,

    #[serde(default)]
    pub electricity_charge: Vec<i64>,

    /// Device clock at the time of the reading.
    #[serde(default)]
    pub local_time: LocalTime,

    /// Energy used this month in watt-hours.
    #[serde(default)]
    pub month_energy: i64,

    /// Minutes on this month.
    #[serde(default)]
    pub month_runtime: i64,

    /// Energy used today in watt-hours.
    #[serde(default)]
    pub today_energy: i64,

    /// Minutes on today.
    #[serde(default)]
    pub today_runtime: i64,
}

/// Timestamp reported by the device.
///
/// Devices send `"YYYY-MM-DD HH:MM:SS"` in UTC, but some send `null`, an
/// empty string or the literal `"null"`. All of those decode to the zero
/// timestamp, which holds no instant and is checked with [`LocalTime::is_zero`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalTime(pub Option<DateTime<Utc>>);

impl LocalTime {
    /// Parses a device timestamp.
    pub fn parse(value: &str) -> Result<Self, Error> {
        match value.trim() {
            "" | "null" => Ok(Self::default()),
            s => NaiveDateTime::parse_from_str(s, LOCAL_TIME_FORMAT)
                .map(|naive| Self(Some(naive.and_utc())))
                .map_err(|e| Error::Decode(format!("invalid local_time {:?}: {}", s, e))),
        }
    }

    /// Returns true for the placeholder value of a missing timestamp.
    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.0
    }
}

impl<'de> Deserialize<'de> for LocalTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Self::default()),
            Some(s) => Self::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

impl Serialize for LocalTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            Some(t) => serializer.collect_str(&t.format(LOCAL_TIME_FORMAT)),
            None => serializer.serialize_none(),
        }
    }
}

/// Usage totals as returned by `get_device_usage`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceUsage {
    /// Energy used, in watt-hours.
    #[serde(default)]
    pub power_usage: UsageWindows,

    /// Energy saved, in watt-hours.
    #[serde(default)]
    pub saved_power: UsageWindows,

    /// Time on, in minutes.
    #[serde(default)]
    pub time_usage: UsageWindows,
}

/// Totals over the three reporting windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UsageWindows {
    #[serde(default)]
    pub today: i64,
    #[serde(default)]
    pub past7: i64,
    #[serde(default)]
    pub past30: i64,
}

impl UsageWindows {
    /// Returns the totals keyed by window name.
    pub fn windows(&self) -> BTreeMap<&'static str, i64> {
        BTreeMap::from([
            ("today", self.today),
            ("past7", self.past7),
            ("past30", self.past30),
        ])
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    const STATUS_JSON: &str = r#"{
        "device_id": "8022ABCDEF",
        "fw_ver": "1.0.7 Build 210629 Rel.174901",
        "hw_ver": "1.0",
        "type": "SMART.TAPOPLUG",
        "model": "P110",
        "mac": "AA-BB-CC-DD-EE-FF",
        "hw_id": "HW1",
        "fw_id": "FW1",
        "oem_id": "OEM1",
        "specs": "UK",
        "device_on": true,
        "on_time": 3600,
        "overheated": false,
        "nickname": "VGVzdA==",
        "location": "home",
        "avatar": "plug",
        "time_diff": 60,
        "ssid": "TXlXaUZp",
        "rssi": -52,
        "signal_level": 2,
        "latitude": 0,
        "longitude": 0,
        "lang": "en_GB",
        "region": "Europe/London",
        "has_set_location_info": true,
        "ip": "192.168.1.20",
        "power_protection_status": "normal",
        "default_states": {"type": "last_states", "state": {}}
    }"#;

    #[test]
    fn test_parse_status() {
        let mut status: DeviceStatus = serde_json::from_str(STATUS_JSON).unwrap();
        assert_eq!(status.device_type, "SMART.TAPOPLUG");
        assert_eq!(status.region, "Europe/London");
        assert_eq!(status.rssi, -52);
        assert!(status.device_on);
        assert_eq!(status.default_states["type"], "last_states");

        status.decode_text_fields().unwrap();
        assert_eq!(status.nickname, "Test");
        assert_eq!(status.ssid, "MyWiFi");
    }

    #[test]
    fn test_decode_text_fields_rejects_bad_base64() {
        let mut status = DeviceStatus {
            nickname: "VGVzdA==".into(),
            ssid: "not base64!".into(),
            ..Default::default()
        };
        let err = status.decode_text_fields().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        // Nothing decoded on failure.
        assert_eq!(status.nickname, "VGVzdA==");
    }

    #[test]
    fn test_supports_energy_monitoring_is_exact() {
        let mut status = DeviceStatus {
            device_type: "SMART.TAPOPLUG".into(),
            ..Default::default()
        };
        assert!(supports_energy_monitoring(&status));
        assert!(status.supports_energy_monitoring());

        for other in ["SMART.TAPOBULB", "smart.tapoplug", "SMART.TAPOPLUG ", ""] {
            status.device_type = other.into();
            assert!(!supports_energy_monitoring(&status), "{:?}", other);
        }
    }

    #[test]
    fn test_parse_energy_usage() {
        let json = r#"{
            "today_runtime": 306,
            "month_runtime": 8921,
            "today_energy": 61,
            "month_energy": 1702,
            "local_time": "2022-03-14 12:30:05",
            "electricity_charge": [0, 0, 0],
            "current_power": 11500
        }"#;
        let usage: EnergyUsage = serde_json::from_str(json).unwrap();
        assert_eq!(usage.current_power, 11500);
        assert_eq!(usage.month_energy, 1702);
        assert_eq!(usage.electricity_charge, vec![0, 0, 0]);

        let t = usage.local_time.as_datetime().unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2022, 3, 14));
        assert_eq!((t.hour(), t.minute(), t.second()), (12, 30, 5));
        assert!(!usage.local_time.is_zero());
    }

    #[test]
    fn test_local_time_placeholders() {
        for json in [
            r#"{}"#,
            r#"{"local_time": null}"#,
            r#"{"local_time": ""}"#,
            r#"{"local_time": "null"}"#,
        ] {
            let usage: EnergyUsage = serde_json::from_str(json).unwrap();
            assert!(usage.local_time.is_zero(), "{}", json);
        }
    }

    #[test]
    fn test_local_time_rejects_garbage() {
        let result: Result<EnergyUsage, _> =
            serde_json::from_str(r#"{"local_time": "yesterday"}"#);
        assert!(result.is_err());
        assert!(matches!(LocalTime::parse("14/03/2022"), Err(Error::Decode(_))));
    }

    #[test]
    fn test_local_time_serialization() {
        let t = LocalTime::parse("2022-03-14 12:30:05").unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), r#""2022-03-14 12:30:05""#);
        assert_eq!(serde_json::to_string(&LocalTime::default()).unwrap(), "null");
    }

    #[test]
    fn test_local_time_epoch_is_a_real_timestamp() {
        let epoch = LocalTime::parse("1970-01-01 00:00:00").unwrap();
        assert!(!epoch.is_zero());
        assert_eq!(epoch.as_datetime(), Some(DateTime::<Utc>::UNIX_EPOCH));
        assert_eq!(serde_json::to_string(&epoch).unwrap(), r#""1970-01-01 00:00:00""#);
    }

    #[test]
    fn test_device_usage_windows() {
        let json = r#"{
            "time_usage": {"today": 30, "past7": 200, "past30": 900},
            "power_usage": {"today": 5, "past7": 40, "past30": 160},
            "saved_power": {"today": 1, "past7": 2, "past30": 3}
        }"#;
        let usage: DeviceUsage = serde_json::from_str(json).unwrap();
        let windows = usage.time_usage.windows();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows["today"], 30);
        assert_eq!(windows["past7"], 200);
        assert_eq!(windows["past30"], 900);
        assert_eq!(usage.saved_power.past30, 3);
    }
}
