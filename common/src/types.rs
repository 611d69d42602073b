use std::{fmt, net::Ipv4Addr};

use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_SSID: &str = "CHANGE_ME";
pub const ALL_GOOD: &str = "All good";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    SoilMoisture,
    Light,
    Temperature,
    Humidity,
}

impl Metric {
    /// Fixed evaluation order; message order depends on it.
    pub const ALL: [Metric; 4] = [
        Self::SoilMoisture,
        Self::Light,
        Self::Temperature,
        Self::Humidity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SoilMoisture => "soil_moisture",
            Self::Light => "ldr",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
        }
    }

    pub fn low_message(self) -> &'static str {
        match self {
            Self::SoilMoisture => "Soil too dry",
            Self::Light => "Not enough light",
            Self::Temperature => "Temperature too low",
            Self::Humidity => "Humidity too low",
        }
    }

    pub fn high_message(self) -> &'static str {
        match self {
            Self::SoilMoisture => "Soil too wet",
            Self::Light => "Too much light",
            Self::Temperature => "Temperature too high",
            Self::Humidity => "Humidity too high",
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        let ssid = self.ssid.trim();
        !ssid.is_empty() && ssid != PLACEHOLDER_SSID
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password_set", &!self.password.is_empty())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected { ip: Ipv4Addr },
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn ip_address(self) -> Option<Ipv4Addr> {
        match self {
            Self::Connected { ip } => Some(ip),
            _ => None,
        }
    }
}

/// Raw association status reported by a wireless station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Joining,
    NoIp,
    Up,
    Failed,
    NoApFound,
    BadAuth,
}

impl LinkStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Idle,
            1 => Self::Joining,
            2 => Self::NoIp,
            3 => Self::Up,
            -2 => Self::NoApFound,
            -3 => Self::BadAuth,
            c if c < 0 => Self::Failed,
            _ => Self::Joining,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Idle => 0,
            Self::Joining => 1,
            Self::NoIp => 2,
            Self::Up => 3,
            Self::Failed => -1,
            Self::NoApFound => -2,
            Self::BadAuth => -3,
        }
    }

    pub fn is_error(self) -> bool {
        self.code() < 0
    }

    /// Polling stops on success or on any error.
    pub fn is_terminal(self) -> bool {
        self == Self::Up || self.is_error()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reading {
    pub soil_moisture: u16,
    pub light: u16,
    pub temperature: Option<i32>,
    pub humidity: Option<i32>,
}

impl Reading {
    pub fn value(&self, metric: Metric) -> Option<i32> {
        match metric {
            Metric::SoilMoisture => Some(i32::from(self.soil_moisture)),
            Metric::Light => Some(i32::from(self.light)),
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.temperature.is_none() || self.humidity.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessages(Vec<&'static str>);

impl StatusMessages {
    pub fn from_messages(messages: Vec<&'static str>) -> Self {
        if messages.is_empty() {
            Self(vec![ALL_GOOD])
        } else {
            Self(messages)
        }
    }

    pub fn as_slice(&self) -> &[&'static str] {
        &self.0
    }

    pub fn is_all_good(&self) -> bool {
        self.0 == [ALL_GOOD]
    }

    pub fn joined(&self) -> String {
        self.0.join(", ")
    }
}
