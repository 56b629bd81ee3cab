use super::{StateChange, StateStore, StateValue};
use crate::config::StoreConfig;
use crate::error::{HeliosError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Subset of the state object returned by `GET /get/<id>`
#[derive(Debug, Clone, Deserialize)]
struct DatapointState {
    #[serde(default)]
    val: serde_json::Value,
    #[serde(default)]
    ts: Option<i64>,
}

impl DatapointState {
    fn value(&self) -> Option<StateValue> {
        StateValue::from_json(&self.val)
    }
}

/// State store backed by the ioBroker simple-api adapter
#[derive(Clone)]
pub struct SimpleApiStateStore {
    base_url: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
    watch_interval: Duration,
    logger: StructuredLogger,
}

impl SimpleApiStateStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|e| HeliosError::config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let logger =
            get_logger_with_context(LogContext::new("store").with_field("url", base_url.clone()));

        Ok(Self {
            base_url,
            client,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            watch_interval: Duration::from_millis(config.watch_interval_ms.max(1)),
            logger,
        })
    }

    async fn fetch(&self, key: &str) -> Result<Option<DatapointState>> {
        let url = format!("{}/get/{}", self.base_url, key);
        self.logger.trace(&format!("GET {}", url));

        let response = self
            .retry_request(|| async { self.client.get(&url).send().await })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                // simple-api answers unknown ids with a text body on some versions
                match serde_json::from_str::<DatapointState>(&body) {
                    Ok(state) => Ok(Some(state)),
                    Err(_) => Ok(None),
                }
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(HeliosError::store(format!(
                    "GET {} failed with status {}: {}",
                    key, status, text
                )))
            }
        }
    }

    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> Result<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    self.logger.error(&format!(
                        "Request failed after {} attempts: {}",
                        attempts, e
                    ));
                    return Err(e.into());
                }
                Err(e) => {
                    self.logger.warn(&format!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    ));
                    tokio::time::sleep(delay).await;
                    delay = next_backoff(delay);
                }
            }
        }
    }
}

/// Doubles the delay, capped so long outages keep polling at a steady pace
fn next_backoff(delay: Duration) -> Duration {
    delay.saturating_mul(2).min(MAX_RETRY_DELAY)
}

#[async_trait::async_trait]
impl StateStore for SimpleApiStateStore {
    async fn get(&self, key: &str) -> Result<Option<StateValue>> {
        Ok(self.fetch(key).await?.and_then(|s| s.value()))
    }

    async fn set(&self, key: &str, value: StateValue) -> Result<()> {
        let url = format!("{}/set/{}", self.base_url, key);
        let rendered = value.to_string();
        self.logger.debug(&format!("SET {} = {}", key, rendered));

        let response = self
            .retry_request(|| async {
                self.client
                    .get(&url)
                    .query(&[("value", rendered.as_str())])
                    .send()
                    .await
            })
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(HeliosError::store(format!(
                "SET {} failed with status {}: {}",
                key, status, text
            )))
        }
    }

    async fn create(&self, key: &str, initial: StateValue) -> Result<bool> {
        if self.get(key).await?.is_some() {
            return Ok(false);
        }
        self.set(key, initial).await.map_err(|e| {
            HeliosError::store(format!(
                "Datapoint {} does not exist and could not be seeded: {}",
                key, e
            ))
        })?;
        self.logger.info(&format!("Seeded datapoint {}", key));
        Ok(true)
    }

    async fn watch(&self, key: &str) -> Result<mpsc::UnboundedReceiver<StateChange>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = self.clone();
        let key = key.to_string();

        // Baseline first so only later updates are reported
        let mut last = store.fetch(&key).await.ok().flatten().map(|s| (s.ts, s.val));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.watch_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }
                let state = match store.fetch(&key).await {
                    Ok(Some(state)) => state,
                    Ok(None) => continue,
                    Err(e) => {
                        store
                            .logger
                            .debug(&format!("Watch poll of {} failed: {}", key, e));
                        continue;
                    }
                };
                // `ts` moves on every write, even when the value repeats
                let marker = (state.ts, state.val.clone());
                let changed = match (&last, state.ts) {
                    (Some((prev_ts, _)), Some(ts)) => *prev_ts != Some(ts),
                    (Some((_, prev_val)), None) => *prev_val != state.val,
                    (None, _) => true,
                };
                last = Some(marker);
                if changed {
                    let change = StateChange {
                        key: key.clone(),
                        value: state.value(),
                        ts: state.ts,
                    };
                    if tx.send(change).is_err() {
                        break;
                    }
                }
            }
            store.logger.debug(&format!("Stopped watching {}", key));
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn config_for(url: &str) -> StoreConfig {
        StoreConfig {
            kind: crate::config::StoreKind::SimpleApi,
            base_url: url.to_string(),
            watch_interval_ms: 20,
            request_timeout_ms: 1000,
            max_retries: 1,
            retry_delay_ms: 1,
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        assert_eq!(
            next_backoff(Duration::from_millis(250)),
            Duration::from_millis(500)
        );
        assert_eq!(next_backoff(Duration::from_secs(20)), MAX_RETRY_DELAY);
        assert_eq!(next_backoff(Duration::MAX), MAX_RETRY_DELAY);

        let mut delay = Duration::from_millis(1);
        for _ in 0..200 {
            delay = next_backoff(delay);
        }
        assert_eq!(delay, MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn get_parses_typed_values() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/get/meter.export")
            .with_status(200)
            .with_body(r#"{"val": 912.5, "ack": true, "ts": 1700000000000}"#)
            .create_async()
            .await;

        let store = SimpleApiStateStore::new(&config_for(&server.url())).unwrap();
        let value = store.get("meter.export").await.unwrap();
        assert_eq!(value, Some(StateValue::Number(912.5)));
    }

    #[tokio::test]
    async fn get_treats_not_found_and_null_as_absent() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/get/car.soc")
            .with_status(404)
            .with_body("error: datapoint \"car.soc\" not found")
            .create_async()
            .await;
        let _null = server
            .mock("GET", "/get/car.limit")
            .with_status(200)
            .with_body(r#"{"val": null, "ts": 1}"#)
            .create_async()
            .await;

        let store = SimpleApiStateStore::new(&config_for(&server.url())).unwrap();
        assert_eq!(store.get("car.soc").await.unwrap(), None);
        assert_eq!(store.get("car.limit").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_surfaces_server_errors() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/get/broken")
            .with_status(500)
            .create_async()
            .await;

        let store = SimpleApiStateStore::new(&config_for(&server.url())).unwrap();
        let err = store.get("broken").await.unwrap_err();
        assert!(matches!(err, HeliosError::Store { .. }));
    }

    #[tokio::test]
    async fn set_sends_rendered_value() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/set/tesla-motors.0.VIN.remote.set_charging_amps-charging_amps")
            .match_query(Matcher::UrlEncoded("value".into(), "7".into()))
            .with_status(200)
            .with_body(r#"{"id":"x","value":7}"#)
            .create_async()
            .await;

        let store = SimpleApiStateStore::new(&config_for(&server.url())).unwrap();
        store
            .set(
                "tesla-motors.0.VIN.remote.set_charging_amps-charging_amps",
                StateValue::from(7),
            )
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn create_skips_existing_datapoints() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/get/local.Amps")
            .with_status(200)
            .with_body(r#"{"val": 10, "ts": 5}"#)
            .create_async()
            .await;
        let set = server
            .mock("GET", "/set/local.Amps")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let store = SimpleApiStateStore::new(&config_for(&server.url())).unwrap();
        assert!(!store.create("local.Amps", StateValue::from(0)).await.unwrap());
        set.assert_async().await;
    }
}
