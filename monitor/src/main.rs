#[cfg(feature = "esp32")]
mod esp;
#[cfg(not(feature = "esp32"))]
mod host;

use monitor_common::{Credentials, ResponseFormat};

pub(crate) fn build_response_format() -> ResponseFormat {
    ResponseFormat::from_build_env(option_env!("MONITOR_RESPONSE_FORMAT"))
}

pub(crate) fn build_credentials() -> (Credentials, Credentials) {
    (
        Credentials::new(
            option_env!("WIFI_SSID").unwrap_or("CHANGE_ME"),
            option_env!("WIFI_PASS").unwrap_or("CHANGE_ME"),
        ),
        Credentials::new(
            option_env!("WIFI_SSID_FALLBACK").unwrap_or("CHANGE_ME"),
            option_env!("WIFI_PASS_FALLBACK").unwrap_or("CHANGE_ME"),
        ),
    )
}

#[cfg(not(feature = "esp32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}

#[cfg(feature = "esp32")]
fn main() -> anyhow::Result<()> {
    esp::run()
}
