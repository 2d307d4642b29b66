//! Platform-agnostic types for the AuraLink air-quality monitor.
//!
//! This crate holds the data model shared by the client library
//! (auralink-core) and the command-line front end (auralink-cli).
//!
//! # Features
//!
//! - Sensor readings and the air-quality classification
//! - Device status notices and the client handshake
//! - Email messages, requests and statistics
//! - Generated quotes
//! - Error types for data parsing
//!
//! # Example
//!
//! ```
//! use auralink_types::{AirQualityStatus, Priority};
//!
//! assert_eq!(AirQualityStatus::from_label("Good").as_str(), "Good");
//! assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
//! ```

pub mod email;
pub mod error;
pub mod quote;
pub mod types;

pub use email::{ApiMessage, EmailMessage, EmailRequest, EmailStats, HealthStatus};
pub use error::{ParseError, ParseResult};
pub use quote::Quote;
pub use types::{AirQualityStatus, DeviceStatusEvent, Handshake, Priority, SensorReading};
