use std::{
    convert::Infallible,
    io::ErrorKind,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use embedded_hal::delay::DelayNs;
use monitor_common::{
    AnalogChannel, ClimateSensor, ConnectionManager, Credentials, LinkStatus, RangeTable,
    RequestHandler, RuntimeConfig, SensorReader, WifiStation,
};
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{info, warn};

use crate::{build_credentials, build_response_format};

const SIM_NETWORK_SSID: &str = "monitor-sim";
const SIM_JOIN_POLLS: u32 = 3;
const SIM_CLIMATE_FAULT_EVERY: u64 = 7;

type SimHandler = RequestHandler<SimulatedChannel, SimulatedChannel, SimulatedClimate>;

#[derive(Clone)]
struct AppState {
    handler: Arc<Mutex<SimHandler>>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    apply_credential_overrides(&mut runtime);

    let mut station = SimulatedStation::new();
    if std::env::var("MONITOR_SIM_PRIMARY_DOWN").is_ok_and(|value| value == "1") {
        station.take_down(&runtime.network.primary.ssid);
    }

    let network = runtime.network.clone();
    let policy = runtime.retry.clone();
    let ip = tokio::task::spawn_blocking(move || {
        let mut manager = ConnectionManager::new(station, StdDelay);
        manager.establish(&network, &policy)
    })
    .await
    .context("connection task panicked")?
    .context("wifi startup failed")?;
    info!("network ready, device ip {ip}");

    let reader = SensorReader::new(
        SimulatedChannel::new(28_000, 1_000, 12),
        SimulatedChannel::new(18_000, 4_000, 10),
        SimulatedClimate::new(SIM_CLIMATE_FAULT_EVERY),
    );
    let handler = RequestHandler::new(reader, RangeTable::DEFAULT, build_response_format());

    let app = Router::new()
        .route("/", get(handle_index))
        .with_state(AppState {
            handler: Arc::new(Mutex::new(handler)),
        });

    let port = std::env::var("MONITOR_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind monitor server at {addr}"))?;

    info!("monitor listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_index(State(state): State<AppState>) -> impl IntoResponse {
    let response = {
        let mut handler = state.handler.lock().await;
        handler.handle()
    };
    into_http(response)
}

fn into_http(response: monitor_common::Response) -> axum::response::Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, response.content_type)],
        response.body,
    )
        .into_response()
}

async fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let path = std::env::var("MONITOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.monitor/runtime.json"));

    match tokio::fs::read_to_string(&path).await {
        Ok(raw) => Ok(RuntimeConfig::from_json(&raw)
            .with_context(|| format!("invalid config at {}", path.display()))?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}

fn apply_credential_overrides(runtime: &mut RuntimeConfig) {
    let (primary, fallback) = build_credentials();
    runtime.network.apply_build_defaults(primary, fallback);

    let network = &mut runtime.network;
    for (var, slot) in [
        ("WIFI_SSID", &mut network.primary.ssid),
        ("WIFI_PASS", &mut network.primary.password),
        ("WIFI_SSID_FALLBACK", &mut network.fallback.ssid),
        ("WIFI_PASS_FALLBACK", &mut network.fallback.password),
    ] {
        if let Ok(value) = std::env::var(var) {
            *slot = value;
        }
    }

    if !network.primary.is_configured() && !network.fallback.is_configured() {
        warn!("no wifi credentials configured; joining simulated network `{SIM_NETWORK_SSID}`");
        network.primary = Credentials::new(SIM_NETWORK_SSID, "");
    }
}

struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Joins any network after a few polls unless it has been taken down.
struct SimulatedStation {
    down: Vec<String>,
    target: Option<String>,
    polls: u32,
}

impl SimulatedStation {
    fn new() -> Self {
        Self {
            down: Vec::new(),
            target: None,
            polls: 0,
        }
    }

    fn take_down(&mut self, ssid: &str) {
        self.down.push(ssid.to_string());
    }

    fn is_up(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|ssid| !self.down.contains(ssid) && self.polls >= SIM_JOIN_POLLS)
    }
}

impl WifiStation for SimulatedStation {
    type Error = Infallible;

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.target = None;
        self.polls = 0;
        Ok(())
    }

    fn begin_connect(&mut self, credentials: &Credentials) -> Result<(), Self::Error> {
        self.target = Some(credentials.ssid.clone());
        self.polls = 0;
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        let Some(ssid) = self.target.as_ref() else {
            return LinkStatus::Idle;
        };
        if self.down.contains(ssid) {
            return LinkStatus::NoApFound;
        }

        self.polls = self.polls.saturating_add(1);
        if self.is_up() {
            LinkStatus::Up
        } else {
            LinkStatus::Joining
        }
    }

    fn ip_address(&mut self) -> Option<Ipv4Addr> {
        self.is_up().then_some(Ipv4Addr::LOCALHOST)
    }
}

/// Slow sawtooth standing in for an ADC input.
struct SimulatedChannel {
    base: u16,
    step: u16,
    period: u16,
    tick: u16,
}

impl SimulatedChannel {
    fn new(base: u16, step: u16, period: u16) -> Self {
        Self {
            base,
            step,
            period: period.max(1),
            tick: 0,
        }
    }
}

impl AnalogChannel for SimulatedChannel {
    type Error = Infallible;

    fn read_u16(&mut self) -> Result<u16, Self::Error> {
        self.tick = self.tick.wrapping_add(1);
        let offset = (self.tick % self.period).saturating_mul(self.step);
        Ok(self.base.saturating_add(offset))
    }
}

#[derive(Debug)]
enum SimulatedFault {
    Timeout,
    NoSample,
}

/// DHT-style sensor that times out on every `fault_every`-th measurement.
struct SimulatedClimate {
    tick: u64,
    fault_every: u64,
    sample: Option<(i32, i32)>,
}

impl SimulatedClimate {
    fn new(fault_every: u64) -> Self {
        Self {
            tick: 0,
            fault_every: fault_every.max(2),
            sample: None,
        }
    }
}

impl ClimateSensor for SimulatedClimate {
    type Error = SimulatedFault;

    fn measure(&mut self) -> Result<(), Self::Error> {
        self.tick = self.tick.saturating_add(1);
        if self.tick % self.fault_every == 0 {
            self.sample = None;
            return Err(SimulatedFault::Timeout);
        }

        let temperature = 22 + (self.tick % 8) as i32;
        let humidity = 55 + (self.tick % 6) as i32 * 5;
        self.sample = Some((temperature, humidity));
        Ok(())
    }

    fn temperature(&mut self) -> Result<i32, Self::Error> {
        self.sample
            .map(|(temperature, _)| temperature)
            .ok_or(SimulatedFault::NoSample)
    }

    fn humidity(&mut self) -> Result<i32, Self::Error> {
        self.sample
            .map(|(_, humidity)| humidity)
            .ok_or(SimulatedFault::NoSample)
    }
}

#[cfg(test)]
mod tests {
    use monitor_common::{ConnectionState, NetworkConfig, ResponseFormat, RetryPolicy};

    use super::*;

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn simulated_station_joins_after_polls() {
        let mut manager = ConnectionManager::new(SimulatedStation::new(), NoDelay);

        let state = manager.connect(&Credentials::new(SIM_NETWORK_SSID, ""));

        assert_eq!(
            state,
            ConnectionState::Connected {
                ip: Ipv4Addr::LOCALHOST
            }
        );
    }

    #[test]
    fn downed_primary_falls_back() {
        let mut station = SimulatedStation::new();
        station.take_down("greenhouse");
        let mut manager = ConnectionManager::new(station, NoDelay);
        let network = NetworkConfig {
            primary: Credentials::new("greenhouse", "pw"),
            fallback: Credentials::new("shed", "pw"),
        };

        let ip = manager.establish(&network, &RetryPolicy::default()).unwrap();

        assert_eq!(ip, Ipv4Addr::LOCALHOST);
        assert_eq!(manager.station().target.as_deref(), Some("shed"));
    }

    #[test]
    fn simulated_climate_faults_periodically() {
        let mut reader = SensorReader::new(
            SimulatedChannel::new(30_000, 100, 4),
            SimulatedChannel::new(20_000, 100, 4),
            SimulatedClimate::new(3),
        );

        let readings: Vec<_> = (0..3).map(|_| reader.read().unwrap()).collect();

        assert!(readings[0].temperature.is_some());
        assert!(readings[1].humidity.is_some());
        assert_eq!(readings[2].temperature, None);
        assert_eq!(readings[2].humidity, None);
    }

    #[test]
    fn server_errors_keep_their_status() {
        let response = into_http(monitor_common::Response {
            status: 500,
            content_type: ResponseFormat::Json.content_type(),
            body: r#"{"error":"boom"}"#.to_string(),
        });

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
    }
}
