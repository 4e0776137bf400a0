use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::connection::repair_connection_config;

/// Operational status an administrator assigns to a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

impl SensorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Active => "active",
            SensorStatus::Inactive => "inactive",
            SensorStatus::Maintenance => "maintenance",
        }
    }

    /// Only sensors explicitly switched off are left alone.
    pub fn is_pollable(&self) -> bool {
        !matches!(self, SensorStatus::Inactive)
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sensor status `{0}`")]
pub struct UnknownSensorStatus(pub String);

impl FromStr for SensorStatus {
    type Err = UnknownSensorStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(SensorStatus::Active),
            "inactive" => Ok(SensorStatus::Inactive),
            "maintenance" => Ok(SensorStatus::Maintenance),
            other => Err(UnknownSensorStatus(other.to_string())),
        }
    }
}

/// Sensors commissioned before per-id paths existed, with the path their
/// firmware still writes to.
pub const LEGACY_DEFAULT_PATHS: [(&str, &str); 1] = [("SPD-01", "sensor1/live/speed")];

/// What a dashboard view knows about the sensor it is watching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    pub id: String,
    #[serde(default)]
    pub status: SensorStatus,
    #[serde(default)]
    pub connection_config: Option<String>,
    #[serde(default)]
    pub resource_path: Option<String>,
}

impl SensorDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: SensorStatus::Active,
            connection_config: None,
            resource_path: None,
        }
    }

    pub fn with_status(mut self, status: SensorStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_resource_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = Some(path.into());
        self
    }

    /// Store a pasted config after the edit-time repair. Blank input clears it.
    pub fn with_connection_config(mut self, raw: &str) -> Self {
        let repaired = repair_connection_config(raw.trim());
        self.connection_config = (!repaired.trim().is_empty()).then_some(repaired);
        self
    }

    /// Resource path to request. Without an explicit path this is the
    /// sensor's entry in [`LEGACY_DEFAULT_PATHS`], else `<id>/live/speed`.
    pub fn effective_resource_path(&self) -> String {
        self.resource_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_resource_path())
    }

    fn default_resource_path(&self) -> String {
        LEGACY_DEFAULT_PATHS
            .iter()
            .find(|(id, _)| *id == self.id)
            .map(|(_, path)| path.to_string())
            .unwrap_or_else(|| format!("{}/live/speed", self.id))
    }

    /// True when a change between `self` and `other` alters the upstream request.
    pub fn same_connection(&self, other: &SensorDescriptor) -> bool {
        self.id == other.id
            && self.connection_config == other.connection_config
            && self.effective_resource_path() == other.effective_resource_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resource_path_uses_sensor_id() {
        let sensor = SensorDescriptor::new("SPD-02");
        assert_eq!(sensor.effective_resource_path(), "SPD-02/live/speed");

        let sensor = sensor.with_resource_path("  ");
        assert_eq!(sensor.effective_resource_path(), "SPD-02/live/speed");

        let sensor = sensor.with_resource_path("line3/sack/width");
        assert_eq!(sensor.effective_resource_path(), "line3/sack/width");
    }

    #[test]
    fn first_speed_sensor_keeps_its_legacy_path() {
        let sensor = SensorDescriptor::new("SPD-01");
        assert_eq!(sensor.effective_resource_path(), "sensor1/live/speed");

        let sensor = sensor.with_resource_path("line1/live/speed");
        assert_eq!(sensor.effective_resource_path(), "line1/live/speed");
    }

    #[test]
    fn repeated_edits_leave_repaired_config_unchanged() {
        let raw = "const cfg = { databaseURL: 'https://x', apiKey: 'y' };";
        let once = SensorDescriptor::new("KWH-02").with_connection_config(raw);
        let stored = once.connection_config.clone().expect("config stored");

        let twice = once.with_connection_config(&stored);
        assert_eq!(twice.connection_config.as_deref(), Some(stored.as_str()));
    }

    #[test]
    fn pasted_config_is_repaired_on_edit() {
        let sensor = SensorDescriptor::new("KWH-01")
            .with_connection_config("{ databaseURL: 'https://db.example', }");
        assert_eq!(
            sensor.connection_config.as_deref(),
            Some("{ \"databaseURL\": \"https://db.example\"}")
        );

        let cleared = sensor.with_connection_config("   ");
        assert_eq!(cleared.connection_config, None);
    }

    #[test]
    fn maintenance_sensors_are_still_polled() {
        assert!(SensorStatus::Active.is_pollable());
        assert!(SensorStatus::Maintenance.is_pollable());
        assert!(!SensorStatus::Inactive.is_pollable());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Inactive".parse(), Ok(SensorStatus::Inactive));
        assert_eq!(
            "broken".parse::<SensorStatus>(),
            Err(UnknownSensorStatus("broken".into()))
        );
    }
}
