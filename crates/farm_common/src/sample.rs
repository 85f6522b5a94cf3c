//! Sensor samples as received from the device and as kept in history.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Full-scale reading of the light sensor ADC
pub const LIGHT_RAW_MAX: f64 = 4095.0;

/// Exponent of the perceptual light curve
const LIGHT_CURVE_EXPONENT: f64 = 0.6;

/// Display bucket width for light percentages
const LIGHT_BUCKET: f64 = 10.0;

/// Body of `GET /sensors`, exactly as the firmware sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub temperature: f64,
    pub humidity: f64,
    pub steam: f64,
    /// Raw ADC value in `[0, 4095]`
    pub light: f64,
    pub soil: f64,
    pub water: f64,
}

impl RawReading {
    /// Parse a decoded JSON body, rejecting missing or non-numeric fields.
    pub fn from_json(value: serde_json::Value) -> Result<Self, FetchError> {
        serde_json::from_value(value).map_err(|e| FetchError::Validation(e.to_string()))
    }
}

/// One validated, normalized reading. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    pub temperature: f64,
    pub humidity: f64,
    pub steam: f64,
    /// Normalized light percentage, a multiple of 10 in `[0, 100]`
    pub light: f64,
    pub soil_moisture: f64,
    pub water_level: f64,
}

impl SensorSample {
    /// Validate a raw reading and normalize its light value.
    pub fn from_raw(raw: &RawReading) -> Result<Self, FetchError> {
        for (name, value) in [
            ("temperature", raw.temperature),
            ("humidity", raw.humidity),
            ("steam", raw.steam),
            ("light", raw.light),
            ("soil", raw.soil),
            ("water", raw.water),
        ] {
            if !value.is_finite() {
                return Err(FetchError::Validation(format!(
                    "field '{}' is not a finite number",
                    name
                )));
            }
        }

        Ok(Self {
            temperature: raw.temperature,
            humidity: raw.humidity,
            steam: raw.steam,
            light: normalize_light(raw.light),
            soil_moisture: raw.soil,
            water_level: raw.water,
        })
    }

    /// Value of a single field
    pub fn get(&self, field: SampleField) -> f64 {
        match field {
            SampleField::Temperature => self.temperature,
            SampleField::Humidity => self.humidity,
            SampleField::Steam => self.steam,
            SampleField::Light => self.light,
            SampleField::SoilMoisture => self.soil_moisture,
            SampleField::WaterLevel => self.water_level,
        }
    }
}

/// Convert a raw light reading into a stable display percentage.
///
/// The sensor response is non-linear, so the reading goes through a power
/// curve before being snapped to 10% buckets.
pub fn normalize_light(raw: f64) -> f64 {
    let raw = raw.clamp(0.0, LIGHT_RAW_MAX);
    let pct = (raw / LIGHT_RAW_MAX).powf(LIGHT_CURVE_EXPONENT) * 100.0;
    let bucketed = (pct / LIGHT_BUCKET).round() * LIGHT_BUCKET;
    bucketed.clamp(0.0, 100.0)
}

/// Chartable fields of a [`SensorSample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SampleField {
    Temperature,
    Humidity,
    Steam,
    Light,
    SoilMoisture,
    WaterLevel,
}

impl SampleField {
    pub const ALL: [SampleField; 6] = [
        SampleField::Temperature,
        SampleField::Humidity,
        SampleField::Steam,
        SampleField::Light,
        SampleField::SoilMoisture,
        SampleField::WaterLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleField::Temperature => "temperature",
            SampleField::Humidity => "humidity",
            SampleField::Steam => "steam",
            SampleField::Light => "light",
            SampleField::SoilMoisture => "soilMoisture",
            SampleField::WaterLevel => "waterLevel",
        }
    }

    /// Unit suffix used by renderers
    pub fn unit(&self) -> &'static str {
        match self {
            SampleField::Temperature => "°C",
            _ => "%",
        }
    }
}

impl fmt::Display for SampleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleField {
    type Err = String;

    /// Accepts both the sample names and the device wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" | "temp" => Ok(SampleField::Temperature),
            "humidity" => Ok(SampleField::Humidity),
            "steam" => Ok(SampleField::Steam),
            "light" => Ok(SampleField::Light),
            "soilMoisture" | "soil_moisture" | "soil" => Ok(SampleField::SoilMoisture),
            "waterLevel" | "water_level" | "water" => Ok(SampleField::WaterLevel),
            other => Err(format!("unknown sample field: {}", other)),
        }
    }
}
