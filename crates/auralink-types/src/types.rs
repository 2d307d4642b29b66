//! Core types for AuraLink sensor data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

/// Air-quality classification computed by the device firmware.
///
/// Any label the client does not recognise decodes to [`AirQualityStatus::Unknown`]
/// instead of failing the whole reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AirQualityStatus {
    Excellent,
    Good,
    Moderate,
    Poor,
    Hazardous,
    #[default]
    Unknown,
}

impl AirQualityStatus {
    /// Every classification, best to worst, followed by `Unknown`.
    pub const ALL: [AirQualityStatus; 6] = [
        AirQualityStatus::Excellent,
        AirQualityStatus::Good,
        AirQualityStatus::Moderate,
        AirQualityStatus::Poor,
        AirQualityStatus::Hazardous,
        AirQualityStatus::Unknown,
    ];

    /// Map a wire label onto a classification.
    ///
    /// Matching is exact; the firmware always sends capitalised labels.
    ///
    /// # Examples
    ///
    /// ```
    /// use auralink_types::AirQualityStatus;
    ///
    /// assert_eq!(AirQualityStatus::from_label("Poor"), AirQualityStatus::Poor);
    /// assert_eq!(AirQualityStatus::from_label("poor"), AirQualityStatus::Unknown);
    /// ```
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "Excellent" => AirQualityStatus::Excellent,
            "Good" => AirQualityStatus::Good,
            "Moderate" => AirQualityStatus::Moderate,
            "Poor" => AirQualityStatus::Poor,
            "Hazardous" => AirQualityStatus::Hazardous,
            _ => AirQualityStatus::Unknown,
        }
    }

    /// The wire label for this classification.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AirQualityStatus::Excellent => "Excellent",
            AirQualityStatus::Good => "Good",
            AirQualityStatus::Moderate => "Moderate",
            AirQualityStatus::Poor => "Poor",
            AirQualityStatus::Hazardous => "Hazardous",
            AirQualityStatus::Unknown => "Unknown",
        }
    }

    /// Indicator colour used by the dashboard, as an RGB hex string.
    #[must_use]
    pub fn color_hex(&self) -> &'static str {
        match self {
            AirQualityStatus::Excellent => "#4caf50",
            AirQualityStatus::Good => "#8bc34a",
            AirQualityStatus::Moderate => "#ffeb3b",
            AirQualityStatus::Poor => "#ff9800",
            AirQualityStatus::Hazardous => "#f44336",
            AirQualityStatus::Unknown => "#9e9e9e",
        }
    }

    /// Whether the classification warrants drawing the user's attention.
    #[must_use]
    pub fn is_alarming(&self) -> bool {
        matches!(self, AirQualityStatus::Poor | AirQualityStatus::Hazardous)
    }
}

impl fmt::Display for AirQualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl Serialize for AirQualityStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for AirQualityStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // A missing or null label is treated the same as an unrecognised one.
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label
            .as_deref()
            .map(AirQualityStatus::from_label)
            .unwrap_or_default())
    }
}

/// One timestamped measurement pushed by one device.
///
/// Readings are append-only facts; the pair `(device_id, timestamp)` is the
/// only identity they have.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SensorReading {
    /// Identifier of the producing device.
    pub device_id: String,
    /// Producer clock, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Temperature in °C.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Raw analog air-quality value, when the firmware reports it.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub air_quality_raw: Option<i32>,
    /// CO₂ concentration in ppm.
    pub co2: i32,
    /// Ammonia concentration in ppm.
    pub nh3: i32,
    /// Methane concentration in ppm.
    pub ch4: i32,
    /// Carbon monoxide concentration in ppm.
    pub co: i32,
    /// Firmware classification of the air quality.
    #[cfg_attr(feature = "serde", serde(default))]
    pub air_quality_status: AirQualityStatus,
    /// Whether the motion sensor fired.
    #[cfg_attr(feature = "serde", serde(default, alias = "isLight", alias = "light"))]
    pub motion_detected: bool,
    /// Ingestion time assigned by the server.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub received_at: Option<String>,
}

impl SensorReading {
    /// Identity of the reading: `(device_id, timestamp)`.
    #[must_use]
    pub fn identity(&self) -> (&str, i64) {
        (&self.device_id, self.timestamp)
    }

    /// Whether two readings describe the same measurement.
    #[must_use]
    pub fn same_measurement(&self, other: &SensorReading) -> bool {
        self.identity() == other.identity()
    }
}

/// Side-channel notification published on the device status topic.
///
/// Not merged into sensor history. All fields default when absent because the
/// backend publishes several differently-shaped notices on the same topic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct DeviceStatusEvent {
    /// Notice kind, e.g. `connection_ack`.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: String,
    pub message: String,
    pub client_id: String,
    pub timestamp: i64,
}

impl DeviceStatusEvent {
    /// Kind the backend uses to acknowledge a client handshake.
    pub const CONNECTION_ACK: &'static str = "connection_ack";

    /// Whether this notice acknowledges the handshake of `client_id`.
    #[must_use]
    pub fn acknowledges(&self, client_id: &str) -> bool {
        self.kind == Self::CONNECTION_ACK && self.client_id == client_id
    }
}

/// Announcement a client publishes after every (re)connect.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Handshake {
    pub client_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Email priority assigned by the AI classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Upper-case wire form, as used in `/priority/{priority}`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    /// Parse a priority, ignoring case.
    ///
    /// # Examples
    ///
    /// ```
    /// use auralink_types::Priority;
    ///
    /// assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
    /// assert!("urgent".parse::<Priority>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            _ => Err(ParseError::UnknownPriority(s.to_string())),
        }
    }
}

#[cfg(feature = "serde")]
impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
