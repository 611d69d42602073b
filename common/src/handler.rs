use log::{error, info};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::{
    classify::classify,
    config::ResponseFormat,
    ranges::RangeTable,
    sensor::{AnalogChannel, ClimateSensor, SensorError, SensorReader},
    types::{Reading, StatusMessages},
};

pub const NOT_AVAILABLE: &str = "N/A";
pub const REFRESH_SECONDS: u32 = 5;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("sensor acquisition failed: {0}")]
    Acquisition(#[from] SensorError),
    #[error("response rendering failed: {0}")]
    Render(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Debug, Serialize)]
struct ReadingsView {
    soil_moisture: u16,
    ldr: u16,
    #[serde(serialize_with = "value_or_na")]
    temperature: Option<i32>,
    #[serde(serialize_with = "value_or_na")]
    humidity: Option<i32>,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    readings: ReadingsView,
    status: String,
}

fn value_or_na<S: Serializer>(value: &Option<i32>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.serialize_i32(*value),
        None => serializer.serialize_str(NOT_AVAILABLE),
    }
}

pub struct RequestHandler<S, L, C> {
    reader: SensorReader<S, L, C>,
    ranges: RangeTable,
    format: ResponseFormat,
}

impl<S, L, C> RequestHandler<S, L, C>
where
    S: AnalogChannel,
    L: AnalogChannel,
    C: ClimateSensor,
{
    pub fn new(reader: SensorReader<S, L, C>, ranges: RangeTable, format: ResponseFormat) -> Self {
        Self {
            reader,
            ranges,
            format,
        }
    }

    /// One acquisition, classification and render cycle. Internal faults
    /// become a 500 error body; degraded readings are still a 200.
    pub fn handle(&mut self) -> Response {
        match self.cycle() {
            Ok(response) => response,
            Err(err) => {
                error!("request cycle failed: {err}");
                render_error(self.format, &err)
            }
        }
    }

    fn cycle(&mut self) -> Result<Response, HandlerError> {
        let reading = self.reader.read()?;
        let messages = classify(&reading, &self.ranges);

        info!("readings: {reading:?}, status: {}", messages.joined());

        let body = match self.format {
            ResponseFormat::Json => render_json(&reading, &messages)?,
            ResponseFormat::Html => render_html(&reading, &messages),
        };

        Ok(Response {
            status: 200,
            content_type: self.format.content_type(),
            body,
        })
    }
}

pub fn render_json(reading: &Reading, messages: &StatusMessages) -> Result<String, HandlerError> {
    let payload = StatusBody {
        readings: ReadingsView {
            soil_moisture: reading.soil_moisture,
            ldr: reading.light,
            temperature: reading.temperature,
            humidity: reading.humidity,
        },
        status: messages.joined(),
    };
    Ok(serde_json::to_string(&payload)?)
}

pub fn render_html(reading: &Reading, messages: &StatusMessages) -> String {
    format!(
        r#"<meta http-equiv="refresh" content="{refresh}">
<h1>Plant Monitor</h1>
<ul>
  <li>Soil moisture: {soil}</li>
  <li>Light: {light}</li>
  <li>Temperature (C): {temperature}</li>
  <li>Humidity (%): {humidity}</li>
</ul>
<p>Status: {status}</p>
"#,
        refresh = REFRESH_SECONDS,
        soil = reading.soil_moisture,
        light = reading.light,
        temperature = display_value(reading.temperature),
        humidity = display_value(reading.humidity),
        status = escape_html(&messages.joined()),
    )
}

fn render_error(format: ResponseFormat, err: &HandlerError) -> Response {
    let message = err.to_string();
    let body = match format {
        ResponseFormat::Json => serde_json::to_string(&serde_json::json!({ "error": message }))
            .unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string()),
        ResponseFormat::Html => format!(
            "<meta http-equiv=\"refresh\" content=\"{REFRESH_SECONDS}\">\n<h1>Plant Monitor</h1>\n<p>Error: {}</p>\n",
            escape_html(&message)
        ),
    };

    Response {
        status: 500,
        content_type: format.content_type(),
        body,
    }
}

fn display_value(value: Option<i32>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
