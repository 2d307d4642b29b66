//! Reading-inspired quotes produced by the backend's `/api/quotes` resource.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::SensorReading;

/// A generated quote and the reading it was written for.
///
/// When the backend's text generator is unavailable it still answers, with a
/// canned quote chosen from the same reading.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Quote {
    pub text: String,
    /// Short description of the conditions, e.g. "Comfortable temperature, good air".
    pub context: String,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub sensor_data: Option<SensorReading>,
    /// Backend-local timestamp without offset.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub generated_at: Option<String>,
    pub device_id: String,
}
