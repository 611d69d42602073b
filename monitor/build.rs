fn main() {
    println!("cargo:rerun-if-env-changed=MONITOR_RESPONSE_FORMAT");
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASS");
    println!("cargo:rerun-if-env-changed=WIFI_SSID_FALLBACK");
    println!("cargo:rerun-if-env-changed=WIFI_PASS_FALLBACK");

    if std::env::var_os("CARGO_FEATURE_ESP32").is_some() {
        embuild::espidf::sysenv::output();
    }
}
