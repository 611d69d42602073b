use std::{
    net::Ipv4Addr,
    rc::Rc,
    sync::mpsc::{self, SyncSender},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context};
use dht_sensor::dht11;
use embedded_svc::{
    http::Method,
    io::Write,
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    adc::{
        attenuation::DB_11,
        oneshot::{config::AdcChannelConfig, AdcChannelDriver, AdcDriver},
        ADC1,
    },
    delay::{Ets, FreeRtos},
    gpio::{ADCPin, AnyIOPin, IOPin, InputOutput, PinDriver, Pull},
    sys::EspError,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    http::server::{Configuration as HttpConfiguration, EspHttpServer},
    log::EspLogger,
    nvs::{EspDefaultNvsPartition, EspNvs},
    wifi::EspWifi,
};
use log::{error, info, warn};
use monitor_common::{
    AnalogChannel, ClimateSensor, ConnectionManager, Credentials, LinkStatus, RangeTable,
    RequestHandler, Response, RuntimeConfig, SensorReader, WifiStation,
};

use crate::{build_credentials, build_response_format};

const NVS_NAMESPACE: &str = "monitor";
const NVS_RUNTIME_KEY: &str = "runtime_json";

const SOIL_ADC_PIN: i32 = 34;
const LIGHT_ADC_PIN: i32 = 35;
const DHT11_PIN: i32 = 16;

const ADC_MAX_RAW: u16 = 4_095;

type Reply = SyncSender<Response>;

struct EspStation {
    wifi: EspWifi<'static>,
}

impl EspStation {
    fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs_partition: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let wifi = EspWifi::new(modem, sys_loop, Some(nvs_partition))?;
        Ok(Self { wifi })
    }
}

impl WifiStation for EspStation {
    type Error = anyhow::Error;

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        if self.wifi.is_started()? && self.wifi.is_connected()? {
            self.wifi.disconnect()?;
        }
        Ok(())
    }

    fn begin_connect(&mut self, credentials: &Credentials) -> Result<(), Self::Error> {
        let auth_method = if credentials.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: credentials
                    .ssid
                    .as_str()
                    .try_into()
                    .map_err(|_| anyhow!("wifi ssid too long"))?,
                password: credentials
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| anyhow!("wifi password too long"))?,
                auth_method,
                ..Default::default()
            }))?;

        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        self.wifi.connect()?;
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        match (self.wifi.is_connected(), self.wifi.is_up()) {
            (Ok(true), Ok(true)) => LinkStatus::Up,
            (Ok(true), _) => LinkStatus::NoIp,
            (Err(err), _) => {
                warn!("wifi status query failed: {err:?}");
                LinkStatus::Failed
            }
            _ => LinkStatus::Joining,
        }
    }

    fn ip_address(&mut self) -> Option<Ipv4Addr> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }
}

/// ADC1 input whose 12-bit sample is expanded to the 16-bit range.
struct AdcInput<T: ADCPin<Adc = ADC1>> {
    channel: AdcChannelDriver<'static, T, Rc<AdcDriver<'static, ADC1>>>,
}

impl<T: ADCPin<Adc = ADC1>> AnalogChannel for AdcInput<T> {
    type Error = EspError;

    fn read_u16(&mut self) -> Result<u16, Self::Error> {
        let raw = self.channel.read_raw()?.min(ADC_MAX_RAW);
        Ok((u32::from(raw) * u32::from(u16::MAX) / u32::from(ADC_MAX_RAW)) as u16)
    }
}

#[derive(Debug)]
enum DhtFault {
    Pin(EspError),
    Bus(String),
    NoSample,
}

struct Dht11Sensor {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
    sample: Option<(i32, i32)>,
}

impl Dht11Sensor {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;
        Ok(Self {
            pin,
            delay: Ets,
            sample: None,
        })
    }
}

impl ClimateSensor for Dht11Sensor {
    type Error = DhtFault;

    fn measure(&mut self) -> Result<(), Self::Error> {
        self.sample = None;
        self.pin.set_high().map_err(DhtFault::Pin)?;

        let reading = dht11::blocking::read(&mut self.delay, &mut self.pin)
            .map_err(|err| DhtFault::Bus(format!("GPIO{DHT11_PIN}: {err:?}")))?;
        self.sample = Some((
            i32::from(reading.temperature),
            i32::from(reading.relative_humidity),
        ));
        Ok(())
    }

    fn temperature(&mut self) -> Result<i32, Self::Error> {
        self.sample
            .map(|(temperature, _)| temperature)
            .ok_or(DhtFault::NoSample)
    }

    fn humidity(&mut self) -> Result<i32, Self::Error> {
        self.sample
            .map(|(_, humidity)| humidity)
            .ok_or(DhtFault::NoSample)
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let mut runtime = load_runtime_config(&nvs_partition).unwrap_or_else(|err| {
        warn!("failed to load runtime config from NVS: {err:#}");
        RuntimeConfig::default()
    });
    let (primary, fallback) = build_credentials();
    runtime.network.apply_build_defaults(primary, fallback);

    let Peripherals {
        modem, pins, adc1, ..
    } = Peripherals::take()?;

    let station = EspStation::new(modem, sys_loop, nvs_partition)?;
    let mut manager = ConnectionManager::new(station, FreeRtos);
    let ip = match manager.establish(&runtime.network, &runtime.retry) {
        Ok(ip) => ip,
        Err(err) => {
            error!("{err}; restarting device for recovery");
            restart_device();
            return Err(err.into());
        }
    };
    info!("wifi connected, serving on http://{ip}:{}", runtime.http_port);

    let adc = Rc::new(AdcDriver::new(adc1)?);
    let adc_config = AdcChannelConfig {
        attenuation: DB_11,
        ..Default::default()
    };
    let soil = AdcInput {
        channel: AdcChannelDriver::new(adc.clone(), pins.gpio34, &adc_config)
            .with_context(|| format!("failed to configure soil ADC on GPIO{SOIL_ADC_PIN}"))?,
    };
    let light = AdcInput {
        channel: AdcChannelDriver::new(adc, pins.gpio35, &adc_config)
            .with_context(|| format!("failed to configure light ADC on GPIO{LIGHT_ADC_PIN}"))?,
    };
    let climate = Dht11Sensor::new(pins.gpio16.downgrade())
        .with_context(|| format!("failed to configure DHT11 on GPIO{DHT11_PIN}"))?;

    let mut handler = RequestHandler::new(
        SensorReader::new(soil, light, climate),
        RangeTable::DEFAULT,
        build_response_format(),
    );

    let (request_tx, request_rx) = mpsc::channel::<Reply>();
    let _server = create_http_server(runtime.http_port, request_tx)?;
    // Keeps the station alive for the program lifetime.
    let _manager = manager;

    // Requests are served one at a time on this thread, which owns the sensors.
    for reply in request_rx {
        let response = handler.handle();
        if reply.send(response).is_err() {
            warn!("http handler went away before the response was ready");
        }
    }

    Ok(())
}

fn create_http_server(
    port: u16,
    requests: mpsc::Sender<Reply>,
) -> anyhow::Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        http_port: port,
        stack_size: 12 * 1024,
        ..Default::default()
    };

    let mut server = EspHttpServer::new(&conf)?;

    server.fn_handler::<anyhow::Error, _>("/", Method::Get, move |req| {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        requests
            .send(reply_tx)
            .map_err(|_| anyhow!("acquisition loop stopped"))?;
        let response = reply_rx
            .recv()
            .context("acquisition loop dropped the request")?;

        req.into_response(
            response.status,
            None,
            &[("Content-Type", response.content_type)],
        )?
        .write_all(response.body.as_bytes())?;
        Ok(())
    })?;

    Ok(server)
}

fn load_runtime_config(partition: &EspDefaultNvsPartition) -> anyhow::Result<RuntimeConfig> {
    let nvs = EspNvs::new(partition.clone(), NVS_NAMESPACE, true)?;
    let mut buffer = vec![0_u8; 2048];

    match nvs.get_str(NVS_RUNTIME_KEY, &mut buffer)? {
        Some(value) => Ok(RuntimeConfig::from_json(value)?),
        None => Ok(RuntimeConfig::default()),
    }
}

fn restart_device() {
    thread::sleep(Duration::from_millis(100));
    unsafe { esp_idf_svc::sys::esp_restart() };
}
