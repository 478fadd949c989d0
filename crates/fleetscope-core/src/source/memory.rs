//! In-memory reading source, loadable from a JSON array of readings

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{ReadingSource, SourceError};
use crate::range::TimeRange;
use crate::reading::{Reading, ReadingField};

/// Readings held in memory, grouped by device
#[derive(Debug, Clone, Default)]
pub struct MemoryReadingSource {
    devices: HashMap<String, Vec<Reading>>,
}

impl MemoryReadingSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source holding the given readings
    pub fn from_readings(readings: impl IntoIterator<Item = Reading>) -> Self {
        let mut source = Self::new();
        source.extend(readings);
        source
    }

    /// Parse a JSON array of readings
    pub fn from_json(content: &str) -> Result<Self, SourceError> {
        let readings: Vec<Reading> = serde_json::from_str(content)?;
        Ok(Self::from_readings(readings))
    }

    /// Load a JSON array of readings from a file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Add one reading
    pub fn insert(&mut self, reading: Reading) {
        self.devices
            .entry(reading.device_id.clone())
            .or_default()
            .push(reading);
    }

    /// Add many readings
    pub fn extend(&mut self, readings: impl IntoIterator<Item = Reading>) {
        for reading in readings {
            self.insert(reading);
        }
    }

    /// Register a device that has not reported yet
    pub fn register_device(&mut self, device_id: impl Into<String>) {
        self.devices.entry(device_id.into()).or_default();
    }

    /// Known device ids, sorted
    pub fn device_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.devices.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Total readings held
    pub fn len(&self) -> usize {
        self.devices.values().map(Vec::len).sum()
    }

    /// Check if no readings are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadingSource for MemoryReadingSource {
    async fn find(
        &self,
        device_id: &str,
        range: &TimeRange,
        fields: &[ReadingField],
    ) -> Result<Vec<Reading>, SourceError> {
        let Some(readings) = self.devices.get(device_id) else {
            return Ok(Vec::new());
        };

        let mut found: Vec<Reading> = readings
            .iter()
            .filter(|r| range.contains(r.timestamp) && r.has_any(fields))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.timestamp);
        Ok(found)
    }

    async fn device_exists(&self, device_id: &str) -> Result<bool, SourceError> {
        Ok(self.devices.contains_key(device_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(device: &str, secs: i64) -> Reading {
        Reading::new(device, Utc.timestamp_opt(1_704_096_000 + secs, 0).unwrap())
    }

    #[tokio::test]
    async fn test_find_filters_by_device_range_and_field() {
        let mut source = MemoryReadingSource::new();
        source.insert(Reading {
            speed: Some(10.0),
            ..reading("truck-1", 120)
        });
        source.insert(Reading {
            voltage: Some(12.5),
            ..reading("truck-1", 60)
        });
        source.insert(Reading {
            speed: Some(20.0),
            ..reading("truck-2", 60)
        });
        source.insert(Reading {
            speed: Some(30.0),
            ..reading("truck-1", 90_000)
        });

        let range = TimeRange::parse("2024-01-01", "2024-01-01").unwrap();
        let found = source
            .find("truck-1", &range, &[ReadingField::Speed])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].speed, Some(10.0));

        let all = source.find("truck-1", &range, &[]).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].timestamp < all[1].timestamp);
    }

    #[tokio::test]
    async fn test_device_exists() {
        let mut source = MemoryReadingSource::from_readings(vec![reading("truck-1", 0)]);
        source.register_device("trailer-9");

        assert!(source.device_exists("truck-1").await.unwrap());
        assert!(source.device_exists("trailer-9").await.unwrap());
        assert!(!source.device_exists("truck-404").await.unwrap());
        assert_eq!(source.device_ids(), vec!["trailer-9", "truck-1"]);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.json");
        fs::write(
            &path,
            r#"[
                { "deviceId": "truck-1", "timestamp": "2024-01-01T08:00:00Z", "speed": 42.0 },
                { "deviceId": "truck-1", "timestamp": "2024-01-01T08:01:00Z", "fuelLevel": 63.5 },
                { "deviceId": "van-3", "timestamp": "2024-01-01T08:00:00Z", "tirePressures": [230, 231, 229, 230] }
            ]"#,
        )
        .unwrap();

        let source = MemoryReadingSource::load_json(&path).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.device_ids(), vec!["truck-1", "van-3"]);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let result = MemoryReadingSource::from_json("[{ \"deviceId\": 5 }]");
        assert!(matches!(result, Err(SourceError::ParseError(_))));
    }
}
