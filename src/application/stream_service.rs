// Stream adapter - Push-based ingestion from the broker feed
use crate::application::errors::PayloadError;
use crate::application::store_handle::StoreHandle;
use crate::domain::dashboard::{DashboardPhase, LinkState};
use crate::domain::sample::{DeviceId, DeviceStatus, SensorType};
use crate::infrastructure::payload::decode_sensor_payload;
use chrono::Utc;

/// Where an inbound message belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Status { device_id: DeviceId },
    Sensor { device_id: DeviceId, sensor_type: SensorType },
}

/// `{prefix}/{device}/status` and `{prefix}/{device}/sensors/{type}`
#[derive(Debug, Clone)]
pub struct TopicScheme {
    prefix: String,
}

impl TopicScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn status_topic(&self, device_id: &str) -> String {
        format!("{}/{}/status", self.prefix, device_id)
    }

    pub fn sensor_topic(&self, device_id: &str, sensor_type: &str) -> String {
        format!("{}/{}/sensors/{}", self.prefix, device_id, sensor_type)
    }

    pub fn parse(&self, topic: &str) -> Option<Topic> {
        let rest = topic.strip_prefix(&self.prefix)?.strip_prefix('/')?;
        let parts: Vec<&str> = rest.split('/').collect();
        match parts.as_slice() {
            [device, "status"] if !device.is_empty() => Some(Topic::Status {
                device_id: device.to_string(),
            }),
            [device, "sensors", sensor] if !device.is_empty() && !sensor.is_empty() => {
                Some(Topic::Sensor {
                    device_id: device.to_string(),
                    sensor_type: sensor.to_string(),
                })
            }
            _ => None,
        }
    }
}

pub struct StreamAdapter {
    store: StoreHandle,
    topics: TopicScheme,
    devices: Vec<DeviceId>,
    sensor_types: Vec<SensorType>,
}

impl StreamAdapter {
    pub fn new(
        store: StoreHandle,
        topics: TopicScheme,
        devices: Vec<DeviceId>,
        sensor_types: Vec<SensorType>,
    ) -> Self {
        // Tracked devices render (offline, no data) before any message arrives.
        store.write(|s| {
            for device in &devices {
                for sensor in &sensor_types {
                    s.ensure_entry(device, sensor);
                }
            }
            s.set_phase(DashboardPhase::Ready);
        });

        Self {
            store,
            topics,
            devices,
            sensor_types,
        }
    }

    /// Every topic to (re)subscribe after a connection is established.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics = Vec::with_capacity(self.devices.len() * (self.sensor_types.len() + 1));
        for device in &self.devices {
            topics.push(self.topics.status_topic(device));
            for sensor in &self.sensor_types {
                topics.push(self.topics.sensor_topic(device, sensor));
            }
        }
        topics
    }

    /// Decode one message and apply it. The store is untouched on error.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> Result<(), PayloadError> {
        match self.topics.parse(topic) {
            Some(Topic::Status { device_id }) => {
                self.check_device(&device_id)?;
                let token = String::from_utf8_lossy(payload);
                let status = DeviceStatus::from_token(&token)
                    .ok_or_else(|| PayloadError::BadStatus(token.trim().to_string()))?;
                tracing::debug!("{} status: {}", device_id, status);
                self.store.write(|s| s.set_status(&device_id, status));
                Ok(())
            }
            Some(Topic::Sensor {
                device_id,
                sensor_type,
            }) => {
                self.check_device(&device_id)?;
                if !self.sensor_types.contains(&sensor_type) {
                    return Err(PayloadError::UnknownSensor(sensor_type));
                }
                let sample = decode_sensor_payload(payload, Utc::now())?;
                tracing::debug!("{}/{}: {} {}", device_id, sensor_type, sample.value, sample.unit);
                self.store
                    .write(|s| s.ingest_sample(&device_id, &sensor_type, sample));
                Ok(())
            }
            None => Err(PayloadError::UnknownTopic(topic.to_string())),
        }
    }

    /// Transport callback: never fails, drops bad messages with a warning.
    pub fn on_message(&self, topic: &str, payload: &[u8]) {
        if let Err(e) = self.handle_message(topic, payload) {
            tracing::warn!("Dropping message on {}: {}", topic, e);
        }
    }

    pub fn on_link(&self, link: LinkState) {
        self.store.write(|s| s.set_link(link));
    }

    fn check_device(&self, device_id: &str) -> Result<(), PayloadError> {
        if self.devices.iter().any(|d| d == device_id) {
            Ok(())
        } else {
            Err(PayloadError::UnknownDevice(device_id.to_string()))
        }
    }
}
