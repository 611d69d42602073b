pub mod classify;
pub mod config;
pub mod connection;
pub mod handler;
pub mod ranges;
pub mod sensor;
pub mod types;

pub use classify::classify;
pub use config::{ConfigError, NetworkConfig, ResponseFormat, RetryPolicy, RuntimeConfig};
pub use connection::{ConnectionManager, LinkError, WifiStation};
pub use handler::{HandlerError, RequestHandler, Response};
pub use ranges::{OptimalRange, RangeTable};
pub use sensor::{AnalogChannel, ClimateSensor, SensorError, SensorReader};
pub use types::{ConnectionState, Credentials, LinkStatus, Metric, Reading, StatusMessages};
