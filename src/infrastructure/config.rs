use crate::application::polling_service::FetchStrategy;
use crate::application::telemetry_api::TimeRange;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub dashboard: DashboardSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub stream: StreamSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    #[default]
    Polling,
    Stream,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardSettings {
    pub mode: AcquisitionMode,
    pub sensor_types: Vec<String>,
    pub buffer_capacity: usize,
    pub clock_secs: u64,
    pub listen: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            mode: AcquisitionMode::Polling,
            sensor_types: ["CT1", "CT2", "IR", "K-Type"].map(String::from).to_vec(),
            buffer_capacity: 100,
            clock_secs: 1,
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

impl DashboardSettings {
    pub fn clock_period(&self) -> Duration {
        Duration::from_secs(self.clock_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_secs: u64,
    pub strategy: FetchStrategy,
    pub hours: u32,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub quota_limit: Option<u32>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            strategy: FetchStrategy::Optimized,
            hours: 24,
            start_date: None,
            end_date: None,
            quota_limit: None,
        }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// A custom date range wins over `hours` when both ends are set.
    pub fn time_range(&self) -> TimeRange {
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => TimeRange::Between {
                start_date: start.clone(),
                end_date: end.clone(),
                quota_limit: self.quota_limit,
            },
            _ => TimeRange::LastHours(self.hours),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerTransport {
    #[default]
    Tcp,
    Ws,
    Wss,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StreamSettings {
    pub host: String,
    pub port: u16,
    pub transport: BrokerTransport,
    pub ws_path: String,
    pub topic_prefix: String,
    pub client_id: String,
    pub devices: Vec<String>,
    pub reconnect_secs: u64,
    pub keep_alive_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            host: "broker.hivemq.com".to_string(),
            port: 1883,
            transport: BrokerTransport::Tcp,
            ws_path: "/mqtt".to_string(),
            topic_prefix: "sensegrid".to_string(),
            client_id: format!("mqtt_dashboard_{:08x}", rand::random::<u32>()),
            devices: ["LR1", "LR2"].map(String::from).to_vec(),
            reconnect_secs: 5,
            keep_alive_secs: 30,
        }
    }
}

impl StreamSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_secs.max(1))
    }
}

/// Optional `config/dashboard.*` file, overridden by `SENSEGRID__SECTION__KEY`
/// environment variables.
pub fn load_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("SENSEGRID")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("dashboard.sensor_types")
                .with_list_parse_key("stream.devices")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace `{name}` placeholders in an endpoint path with percent-encoded values
pub fn expand_endpoint(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{}}}", key);
        result = result.replace(&placeholder, &urlencoding::encode(value));
    }
    result
}
