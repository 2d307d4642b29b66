//! Topic subscriptions and payload routing.
//!
//! The router owns the two server-side subscriptions. It builds the frames
//! sent after every successful CONNECT (two SUBSCRIBEs and the handshake) and
//! turns each inbound MESSAGE into a typed [`RoutedEvent`].
//!
//! Routing is structural: the topic is determined by the subscription a
//! message arrived on, never by inspecting the payload.

use std::fmt;

use auralink_types::{DeviceStatusEvent, Handshake, SensorReading};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{Error, Result};
use crate::stomp::{Command, Frame};

/// Prefix of generated client identifiers.
pub const CLIENT_ID_PREFIX: &str = "auralink-client-";

/// One of the two logical push topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    SensorReadings,
    DeviceStatus,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::SensorReadings, Topic::DeviceStatus];

    /// Logical topic name.
    pub fn name(&self) -> &'static str {
        match self {
            Topic::SensorReadings => "sensor-readings",
            Topic::DeviceStatus => "device-status",
        }
    }

    /// STOMP subscription id used for this topic.
    pub fn subscription_id(&self) -> &'static str {
        match self {
            Topic::SensorReadings => "sub-0",
            Topic::DeviceStatus => "sub-1",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Broker destinations for the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    /// Destination carrying sensor readings.
    pub sensors: String,
    /// Destination carrying device status notices.
    pub status: String,
    /// Application destination receiving the client handshake.
    pub handshake: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            sensors: "/topic/sensors".to_string(),
            status: "/topic/status".to_string(),
            handshake: "/app/connect".to_string(),
        }
    }
}

impl TopicConfig {
    /// Destination for a topic.
    pub fn destination(&self, topic: Topic) -> &str {
        match topic {
            Topic::SensorReadings => &self.sensors,
            Topic::DeviceStatus => &self.status,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("sensors", &self.sensors),
            ("status", &self.status),
            ("handshake", &self.handshake),
        ] {
            if !value.starts_with('/') {
                return Err(Error::invalid_config(format!(
                    "{} destination must start with '/', got: {}",
                    name, value
                )));
            }
        }
        if self.sensors == self.status {
            return Err(Error::invalid_config(
                "sensor and status destinations must differ",
            ));
        }
        Ok(())
    }
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedEvent {
    Reading(SensorReading),
    Status(DeviceStatusEvent),
}

/// Builds subscription frames and decodes inbound messages.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    config: TopicConfig,
    client_id: String,
}

impl TopicRouter {
    pub fn new(config: TopicConfig, client_id: impl Into<String>) -> Self {
        Self {
            config,
            client_id: client_id.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn config(&self) -> &TopicConfig {
        &self.config
    }

    /// SUBSCRIBE frames for both topics.
    pub fn subscribe_frames(&self) -> Vec<Frame> {
        Topic::ALL
            .iter()
            .map(|topic| {
                Frame::new(Command::Subscribe)
                    .header("id", topic.subscription_id())
                    .header("destination", self.config.destination(*topic))
                    .header("ack", "auto")
            })
            .collect()
    }

    /// UNSUBSCRIBE frames releasing both topics.
    pub fn unsubscribe_frames(&self) -> Vec<Frame> {
        Topic::ALL
            .iter()
            .map(|topic| Frame::new(Command::Unsubscribe).header("id", topic.subscription_id()))
            .collect()
    }

    /// SEND frame announcing this client, stamped with `now_ms`.
    pub fn handshake_frame(&self, now_ms: i64) -> Result<Frame> {
        let handshake = Handshake {
            client_id: self.client_id.clone(),
            timestamp: now_ms,
        };
        let body = serde_json::to_string(&handshake)
            .map_err(|e| Error::Frame(format!("cannot encode handshake: {}", e)))?;
        Ok(Frame::new(Command::Send)
            .header("destination", self.config.handshake.as_str())
            .header("content-type", "application/json")
            .with_body(body))
    }

    /// Which topic a MESSAGE frame belongs to.
    ///
    /// Uses the `subscription` header, falling back to `destination`.
    pub fn topic_for(&self, frame: &Frame) -> Option<Topic> {
        if let Some(id) = frame.get("subscription") {
            if let Some(topic) = Topic::ALL.into_iter().find(|t| t.subscription_id() == id) {
                return Some(topic);
            }
        }
        let destination = frame.get("destination")?;
        Topic::ALL
            .into_iter()
            .find(|t| self.config.destination(*t) == destination)
    }

    /// Decode a MESSAGE frame.
    ///
    /// Returns `None` for frames that are not messages on one of our topics,
    /// and `Some(Err(Error::Decode))` for malformed payloads.
    pub fn route(&self, frame: &Frame) -> Option<Result<RoutedEvent>> {
        if frame.command != Command::Message {
            return None;
        }
        let Some(topic) = self.topic_for(frame) else {
            debug!("Ignoring message for unknown subscription: {}", frame);
            return None;
        };
        let decoded = match topic {
            Topic::SensorReadings => {
                serde_json::from_str::<SensorReading>(&frame.body).map(RoutedEvent::Reading)
            }
            Topic::DeviceStatus => {
                serde_json::from_str::<DeviceStatusEvent>(&frame.body).map(RoutedEvent::Status)
            }
        };
        Some(decoded.map_err(|source| Error::Decode {
            topic: topic.name(),
            source,
        }))
    }
}

/// Generate a fresh client identifier.
pub fn generate_client_id() -> String {
    format!("{}{}", CLIENT_ID_PREFIX, uuid::Uuid::new_v4())
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> TopicRouter {
        TopicRouter::new(TopicConfig::default(), "auralink-client-test")
    }

    fn message(headers: &[(&str, &str)], body: &str) -> Frame {
        let mut frame = Frame::new(Command::Message).with_body(body);
        for (k, v) in headers {
            frame = frame.header(*k, *v);
        }
        frame
    }

    const READING: &str = r#"{"deviceId":"esp32-a","timestamp":10,"temperature":21.5,
        "humidity":40.0,"co2":500,"nh3":1,"ch4":2,"co":0,"airQualityStatus":"Good",
        "motionDetected":false}"#;

    #[test]
    fn test_subscribe_frames() {
        let frames = router().subscribe_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].get("id"), Some("sub-0"));
        assert_eq!(frames[0].get("destination"), Some("/topic/sensors"));
        assert_eq!(frames[1].get("id"), Some("sub-1"));
        assert_eq!(frames[1].get("destination"), Some("/topic/status"));
    }

    #[test]
    fn test_unsubscribe_frames_release_both() {
        let ids: Vec<_> = router()
            .unsubscribe_frames()
            .iter()
            .map(|f| f.get("id").unwrap_or_default().to_string())
            .collect();
        assert_eq!(ids, ["sub-0", "sub-1"]);
    }

    #[test]
    fn test_handshake_frame() {
        let frame = router().handshake_frame(1_700_000_000_000).unwrap();
        assert_eq!(frame.command, Command::Send);
        assert_eq!(frame.get("destination"), Some("/app/connect"));
        let body: serde_json::Value = serde_json::from_str(&frame.body).unwrap();
        assert_eq!(body["clientId"], "auralink-client-test");
        assert_eq!(body["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_route_reading_by_subscription() {
        let frame = message(
            &[("subscription", "sub-0"), ("destination", "/topic/sensors")],
            READING,
        );
        match router().route(&frame) {
            Some(Ok(RoutedEvent::Reading(r))) => assert_eq!(r.device_id, "esp32-a"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_route_status_by_destination_fallback() {
        let frame = message(
            &[("destination", "/topic/status")],
            r#"{"type":"connection_ack","message":"ok","clientId":"x","timestamp":1}"#,
        );
        assert!(matches!(
            router().route(&frame),
            Some(Ok(RoutedEvent::Status(_)))
        ));
    }

    #[test]
    fn test_route_is_structural() {
        // A reading body delivered on the status subscription decodes as status.
        let frame = message(&[("subscription", "sub-1")], READING);
        assert!(matches!(
            router().route(&frame),
            Some(Ok(RoutedEvent::Status(_)))
        ));
    }

    #[test]
    fn test_route_malformed_payload() {
        let frame = message(&[("subscription", "sub-0")], "{not json");
        match router().route(&frame) {
            Some(Err(Error::Decode { topic, .. })) => assert_eq!(topic, "sensor-readings"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_route_ignores_other_frames() {
        assert!(router().route(&Frame::new(Command::Receipt)).is_none());
        let frame = message(&[("subscription", "sub-9")], READING);
        assert!(router().route(&frame).is_none());
    }

    #[test]
    fn test_topic_config_validation() {
        assert!(TopicConfig::default().validate().is_ok());
        let config = TopicConfig {
            status: "/topic/sensors".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = TopicConfig {
            handshake: "app/connect".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_generated_client_ids_are_unique() {
        let a = generate_client_id();
        let b = generate_client_id();
        assert!(a.starts_with(CLIENT_ID_PREFIX));
        assert_ne!(a, b);
        assert!(now_millis() > 1_600_000_000_000);
    }
}
