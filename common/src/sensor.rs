use std::fmt::Debug;

use log::{info, warn};
use thiserror::Error;

use crate::types::Reading;

/// Analog input sampled over the full 16-bit range.
pub trait AnalogChannel {
    type Error: Debug;

    fn read_u16(&mut self) -> Result<u16, Self::Error>;
}

/// Single-wire temperature/humidity sensor. `measure` performs the bus
/// transaction; the value reads return what it captured.
pub trait ClimateSensor {
    type Error: Debug;

    fn measure(&mut self) -> Result<(), Self::Error>;
    fn temperature(&mut self) -> Result<i32, Self::Error>;
    fn humidity(&mut self) -> Result<i32, Self::Error>;
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("{channel} channel read failed: {detail}")]
    Analog {
        channel: &'static str,
        detail: String,
    },
}

pub struct SensorReader<S, L, C> {
    soil: S,
    light: L,
    climate: C,
}

impl<S, L, C> SensorReader<S, L, C>
where
    S: AnalogChannel,
    L: AnalogChannel,
    C: ClimateSensor,
{
    pub fn new(soil: S, light: L, climate: C) -> Self {
        Self {
            soil,
            light,
            climate,
        }
    }

    pub fn read(&mut self) -> Result<Reading, SensorError> {
        let soil_moisture = self.soil.read_u16().map_err(|err| SensorError::Analog {
            channel: "soil",
            detail: format!("{err:?}"),
        })?;
        let light = self.light.read_u16().map_err(|err| SensorError::Analog {
            channel: "light",
            detail: format!("{err:?}"),
        })?;

        let (temperature, humidity) = self.read_climate();

        Ok(Reading {
            soil_moisture,
            light,
            temperature,
            humidity,
        })
    }

    fn read_climate(&mut self) -> (Option<i32>, Option<i32>) {
        if let Err(err) = self.climate.measure() {
            warn!("climate sensor measure failed: {err:?}");
            return (None, None);
        }

        let temperature = match self.climate.temperature() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("climate sensor temperature read failed: {err:?}");
                None
            }
        };

        let humidity = match self.climate.humidity() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("climate sensor humidity read failed: {err:?}");
                None
            }
        };

        if let (Some(t), Some(h)) = (temperature, humidity) {
            info!("[climate] temperature {t}C humidity {h}%");
        }

        (temperature, humidity)
    }

    pub fn into_parts(self) -> (S, L, C) {
        (self.soil, self.light, self.climate)
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn healthy_read_returns_all_metrics() {
        let mut reader = SensorReader::new(
            FixedChannel(Ok(35_000)),
            FixedChannel(Ok(30_000)),
            ScriptedClimate::healthy(24, 60),
        );

        let reading = reader.read().unwrap();

        assert_eq!(
            reading,
            Reading {
                soil_moisture: 35_000,
                light: 30_000,
                temperature: Some(24),
                humidity: Some(60),
            }
        );
    }

    #[test]
    fn measure_fault_blanks_both_climate_values() {
        let mut climate = ScriptedClimate::healthy(24, 60);
        climate.measures.push_back(Err(FakeFault("checksum mismatch")));
        let mut reader =
            SensorReader::new(FixedChannel(Ok(12_345)), FixedChannel(Ok(54_321)), climate);

        let reading = reader.read().unwrap();

        assert_eq!(reading.soil_moisture, 12_345);
        assert_eq!(reading.light, 54_321);
        assert_eq!(reading.temperature, None);
        assert_eq!(reading.humidity, None);

        let (_, _, climate) = reader.into_parts();
        assert_eq!(climate.value_reads, 0);
    }

    #[test]
    fn temperature_fault_keeps_humidity() {
        let climate = ScriptedClimate {
            temperature: Some(Err(FakeFault("timeout"))),
            humidity: Some(Ok(65)),
            ..ScriptedClimate::default()
        };
        let mut reader =
            SensorReader::new(FixedChannel(Ok(35_000)), FixedChannel(Ok(30_000)), climate);

        let reading = reader.read().unwrap();

        assert_eq!(reading.temperature, None);
        assert_eq!(reading.humidity, Some(65));
        assert!(reading.is_degraded());
    }

    #[test]
    fn fault_does_not_carry_into_next_read() {
        let mut climate = ScriptedClimate::healthy(22, 55);
        climate.measures.push_back(Err(FakeFault("timeout")));
        let mut reader =
            SensorReader::new(FixedChannel(Ok(35_000)), FixedChannel(Ok(30_000)), climate);

        assert_eq!(reader.read().unwrap().temperature, None);
        assert_eq!(reader.read().unwrap().temperature, Some(22));
    }

    #[test]
    fn analog_fault_is_reported() {
        let mut reader = SensorReader::new(
            FixedChannel(Ok(35_000)),
            FixedChannel(Err(FakeFault("adc busy"))),
            ScriptedClimate::healthy(24, 60),
        );

        let err = reader.read().unwrap_err();

        assert!(matches!(err, SensorError::Analog { channel: "light", .. }));
        assert!(err.to_string().contains("adc busy"));
    }

    #[test]
    fn zero_analog_value_is_valid() {
        let mut reader = SensorReader::new(
            FixedChannel(Ok(0)),
            FixedChannel(Ok(0)),
            ScriptedClimate::healthy(0, 0),
        );

        let reading = reader.read().unwrap();

        assert_eq!(reading.temperature, Some(0));
        assert!(!reading.is_degraded());
    }
}
