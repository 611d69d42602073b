use crate::types::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Low,
    Optimal,
    High,
}

/// Inclusive window in which a metric needs no attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimalRange {
    pub min: i32,
    pub max: i32,
}

impl OptimalRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn band(&self, value: i32) -> Band {
        if value < self.min {
            Band::Low
        } else if value > self.max {
            Band::High
        } else {
            Band::Optimal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeTable {
    soil_moisture: OptimalRange,
    light: OptimalRange,
    temperature: OptimalRange,
    humidity: OptimalRange,
}

impl RangeTable {
    pub const DEFAULT: RangeTable = RangeTable {
        soil_moisture: OptimalRange::new(30_000, 45_000),
        light: OptimalRange::new(20_000, 50_000),
        temperature: OptimalRange::new(20, 28),
        humidity: OptimalRange::new(50, 80),
    };

    pub fn get(&self, metric: Metric) -> OptimalRange {
        match metric {
            Metric::SoilMoisture => self.soil_moisture,
            Metric::Light => self.light,
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
        }
    }
}

impl Default for RangeTable {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let range = RangeTable::DEFAULT.get(Metric::Humidity);
        assert_eq!(range.band(49), Band::Low);
        assert_eq!(range.band(50), Band::Optimal);
        assert_eq!(range.band(80), Band::Optimal);
        assert_eq!(range.band(81), Band::High);
    }

    #[test]
    fn default_table_matches_plant_profile() {
        let table = RangeTable::default();
        assert_eq!(
            table.get(Metric::SoilMoisture),
            OptimalRange::new(30_000, 45_000)
        );
        assert_eq!(table.get(Metric::Light), OptimalRange::new(20_000, 50_000));
        assert_eq!(table.get(Metric::Temperature), OptimalRange::new(20, 28));
    }
}
