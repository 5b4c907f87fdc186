use anyhow::Context;
use reqwest::header::{self, HeaderMap};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_tracing::TracingMiddleware;
use serde::Deserialize;
use serde_json::json;
use veolia::ConsumptionState;

#[derive(Debug, Clone, Deserialize)]
pub struct StateStoreConfig {
    pub url: String,
    pub token: String,
}

/// One dashboard sensor derived from a refresh.
#[derive(Debug, PartialEq)]
pub struct SensorState {
    pub entity_id: &'static str,
    pub state: i64,
    pub attributes: serde_json::Value,
}

/// Pushes sensor states to the dashboard's state store.
pub struct StateStoreClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl StateStoreClient {
    pub fn new(config: &StateStoreConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth_value = header::HeaderValue::from_str(format!("Bearer {}", config.token).as_str())
            .context("Invalid state store token")?;
        auth_value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        let client = reqwest_middleware::ClientBuilder::new(client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            client,
            base_url: config.url.clone(),
        })
    }

    pub async fn publish(&self, sensor: &SensorState) -> anyhow::Result<()> {
        let url = format!("{}/api/states/{}", self.base_url, sensor.entity_id);

        let response = self
            .client
            .post(url)
            .json(&json!({
                "state": sensor.state,
                "attributes": sensor.attributes,
            }))
            .send()
            .await?;

        tracing::info!("State sent to {}: {}", sensor.entity_id, response.status());
        response.error_for_status_ref()?;
        Ok(())
    }
}

/// Sensor states the dashboard shows after a refresh.
///
/// A sensor whose value is not strictly positive is skipped, as is one with
/// no data yet.
pub fn dashboard_sensors(state: &ConsumptionState) -> Vec<SensorState> {
    let mut sensors = Vec::new();

    if let Some(reading) = state.daily.history.first() {
        if reading.volume > 0 {
            sensors.push(SensorState {
                entity_id: "sensor.veolia_daily_consumption",
                state: reading.volume,
                attributes: json!({
                    "device_class": "water",
                    "state_class": "total_increasing",
                    "unit_of_measurement": "L",
                    "friendly_name": "Veolia Daily Consumption",
                    "historyConsumption": state.daily.history,
                }),
            });
        }
    }

    if let Some(reading) = state.monthly.history.first() {
        if reading.volume > 0 {
            sensors.push(SensorState {
                entity_id: "sensor.veolia_monthly_consumption",
                state: reading.volume,
                attributes: json!({
                    "device_class": "water",
                    "state_class": "total_increasing",
                    "unit_of_measurement": "L",
                    "friendly_name": "Veolia Monthly Consumption",
                    "historyConsumption": state.monthly.history,
                }),
            });
        }
    }

    if let Some(last_index) = state.last_index {
        if last_index > 0 {
            sensors.push(SensorState {
                entity_id: "sensor.veolia_last_index",
                state: last_index,
                attributes: json!({
                    "device_class": "water",
                    "state_class": "total_increasing",
                    "unit_of_measurement": "L",
                    "friendly_name": "Veolia Last Index",
                }),
            });
        }
    }

    sensors
}
