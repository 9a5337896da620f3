//! Sensor reading payload

use serde::{Deserialize, Serialize};

/// One periodic reading from the producer device
///
/// Field names on the wire follow the producer firmware's JSON keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Soil moisture (percent)
    #[serde(rename = "Soil_Moisture")]
    pub soil_moisture: f64,

    /// Soil temperature (degrees Celsius)
    #[serde(rename = "Soil_Temperature")]
    pub soil_temperature: f64,

    /// Ambient humidity (percent)
    #[serde(rename = "Humidity")]
    pub humidity: f64,
}

impl SensorReading {
    /// Create a new reading
    pub fn new(soil_moisture: f64, soil_temperature: f64, humidity: f64) -> Self {
        Self {
            soil_moisture,
            soil_temperature,
            humidity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_wire_keys() {
        let reading: SensorReading =
            serde_json::from_str(r#"{"Soil_Moisture":30,"Soil_Temperature":20,"Humidity":50}"#)
                .unwrap();

        assert_eq!(reading, SensorReading::new(30.0, 20.0, 50.0));

        let json = serde_json::to_value(reading).unwrap();
        assert_eq!(json["Soil_Moisture"], 30.0);
        assert_eq!(json["Humidity"], 50.0);
    }

    #[test]
    fn test_reading_missing_field_rejected() {
        let result: Result<SensorReading, _> =
            serde_json::from_str(r#"{"Soil_Moisture":30,"Humidity":50}"#);
        assert!(result.is_err());
    }
}
