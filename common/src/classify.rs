use crate::{
    ranges::{Band, RangeTable},
    types::{Metric, Reading, StatusMessages},
};

pub fn classify(reading: &Reading, ranges: &RangeTable) -> StatusMessages {
    let mut messages = Vec::new();

    for metric in Metric::ALL {
        // Absent temperature/humidity never produce a message.
        let Some(value) = reading.value(metric) else {
            continue;
        };

        match ranges.get(metric).band(value) {
            Band::Low => messages.push(metric.low_message()),
            Band::High => messages.push(metric.high_message()),
            Band::Optimal => {}
        }
    }

    StatusMessages::from_messages(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn optimal_reading() -> Reading {
        Reading {
            soil_moisture: 35_000,
            light: 30_000,
            temperature: Some(24),
            humidity: Some(65),
        }
    }

    fn with_value(metric: Metric, value: i32) -> Reading {
        let mut reading = optimal_reading();
        match metric {
            Metric::SoilMoisture => reading.soil_moisture = value as u16,
            Metric::Light => reading.light = value as u16,
            Metric::Temperature => reading.temperature = Some(value),
            Metric::Humidity => reading.humidity = Some(value),
        }
        reading
    }

    #[test]
    fn boundary_values_for_every_metric() {
        let ranges = RangeTable::DEFAULT;

        for metric in Metric::ALL {
            let range = ranges.get(metric);
            let cases = [
                (range.min - 1, vec![metric.low_message()]),
                (range.min, vec!["All good"]),
                (range.max, vec!["All good"]),
                (range.max + 1, vec![metric.high_message()]),
            ];

            for (value, expected) in cases {
                let messages = classify(&with_value(metric, value), &ranges);
                assert_eq!(
                    messages.as_slice(),
                    expected.as_slice(),
                    "{} = {value}",
                    metric.as_str()
                );
            }
        }
    }

    #[test]
    fn absent_climate_values_are_skipped() {
        let ranges = RangeTable::DEFAULT;
        for (soil, light) in [(0, 0), (35_000, 30_000), (u16::MAX, u16::MAX)] {
            let reading = Reading {
                soil_moisture: soil,
                light,
                temperature: None,
                humidity: None,
            };
            let messages = classify(&reading, &ranges);
            assert!(messages
                .as_slice()
                .iter()
                .all(|m| !m.starts_with("Temperature") && !m.starts_with("Humidity")));
        }
    }

    #[test]
    fn nothing_triggered_is_all_good() {
        let messages = classify(&optimal_reading(), &RangeTable::DEFAULT);
        assert_eq!(messages.as_slice(), &["All good"]);
    }

    #[test]
    fn dry_soil_and_bright_light() {
        let reading = Reading {
            soil_moisture: 20_000,
            light: 60_000,
            temperature: Some(25),
            humidity: Some(65),
        };

        let messages = classify(&reading, &RangeTable::DEFAULT);

        assert_eq!(messages.as_slice(), &["Soil too dry", "Too much light"]);
        assert_eq!(messages.joined(), "Soil too dry, Too much light");
    }

    #[test]
    fn messages_follow_fixed_metric_order() {
        let reading = Reading {
            soil_moisture: 50_000,
            light: 10_000,
            temperature: Some(35),
            humidity: Some(10),
        };

        let messages = classify(&reading, &RangeTable::DEFAULT);

        assert_eq!(
            messages.as_slice(),
            &[
                "Soil too wet",
                "Not enough light",
                "Temperature too high",
                "Humidity too low"
            ]
        );
    }
}
