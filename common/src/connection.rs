use std::{fmt::Debug, net::Ipv4Addr};

use embedded_hal::delay::DelayNs;
use log::{info, warn};
use thiserror::Error;

use crate::{
    config::{NetworkConfig, RetryPolicy},
    types::{ConnectionState, Credentials, LinkStatus},
};

pub const CONNECT_POLL_LIMIT: u32 = 30;
pub const CONNECT_POLL_INTERVAL_MS: u32 = 1_000;

/// Wireless station driver in client mode.
pub trait WifiStation {
    type Error: Debug;

    fn disconnect(&mut self) -> Result<(), Self::Error>;
    fn begin_connect(&mut self, credentials: &Credentials) -> Result<(), Self::Error>;
    fn status(&mut self) -> LinkStatus;
    fn ip_address(&mut self) -> Option<Ipv4Addr>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("wifi link not established after {attempts} attempt(s)")]
    GaveUp { attempts: u32 },
}

pub struct ConnectionManager<W, D> {
    station: W,
    delay: D,
    state: ConnectionState,
}

impl<W, D> ConnectionManager<W, D>
where
    W: WifiStation,
    D: DelayNs,
{
    pub fn new(station: W, delay: D) -> Self {
        Self {
            station,
            delay,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn station(&self) -> &W {
        &self.station
    }

    pub fn connect(&mut self, credentials: &Credentials) -> ConnectionState {
        if !credentials.is_configured() {
            warn!("skipping wifi network `{}`: not configured", credentials.ssid);
            self.state = ConnectionState::Failed;
            return self.state;
        }

        self.state = ConnectionState::Connecting;

        if let Err(err) = self.station.disconnect() {
            warn!("wifi disconnect before connect failed: {err:?}");
        }

        if let Err(err) = self.station.begin_connect(credentials) {
            warn!("wifi connect to `{}` failed to start: {err:?}", credentials.ssid);
            self.state = ConnectionState::Failed;
            return self.state;
        }

        info!("wifi connecting to `{}`", credentials.ssid);
        let status = self.poll_until_terminal();

        self.state = match (status, self.station.ip_address()) {
            (LinkStatus::Up, Some(ip)) => ConnectionState::Connected { ip },
            (LinkStatus::Up, None) => {
                warn!("wifi `{}` reported up without an address", credentials.ssid);
                ConnectionState::Failed
            }
            (status, _) => {
                warn!(
                    "wifi `{}` did not connect (status {:?}, code {})",
                    credentials.ssid,
                    status,
                    status.code()
                );
                ConnectionState::Failed
            }
        };
        self.state
    }

    fn poll_until_terminal(&mut self) -> LinkStatus {
        for _ in 0..CONNECT_POLL_LIMIT {
            let status = self.station.status();
            if status.is_terminal() {
                return status;
            }
            self.delay.delay_ms(CONNECT_POLL_INTERVAL_MS);
        }

        self.station.status()
    }

    pub fn init(&mut self, primary: &Credentials, fallback: &Credentials) -> ConnectionState {
        let state = self.connect(primary);
        if state.is_connected() {
            return state;
        }

        info!("primary wifi unavailable; trying fallback `{}`", fallback.ssid);
        self.connect(fallback)
    }

    /// Repeats `init` under `policy` until connected or the policy gives up.
    pub fn establish(
        &mut self,
        network: &NetworkConfig,
        policy: &RetryPolicy,
    ) -> Result<Ipv4Addr, LinkError> {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let wait_ms = policy.delay_for(attempt);
            self.delay
                .delay_ms(u32::try_from(wait_ms).unwrap_or(u32::MAX));

            if let ConnectionState::Connected { ip } =
                self.init(&network.primary, &network.fallback)
            {
                info!("wifi connected on attempt {attempt}, ip {ip}");
                return Ok(ip);
            }

            if policy.exhausted(attempt) {
                warn!("giving up on wifi after {attempt} attempt(s)");
                self.state = ConnectionState::Failed;
                return Err(LinkError::GaveUp { attempts: attempt });
            }

            warn!(
                "wifi attempt {attempt} failed; retrying in {}ms",
                policy.delay_for(attempt.saturating_add(1))
            );
        }
    }
}
