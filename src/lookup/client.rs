use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error};

use super::{LookupCache, LookupError, make_cache_key};
use crate::config::{IntakeConfig, LookupCacheConfig};

const FEDERAL_AGENCIES: &[(&str, &str)] = &[("field", "gov_agency"), ("dependentOnValue", "Federal")];
const AGENCY_TYPES: &[(&str, &str)] = &[("field", "gov_agency_type")];

/// Cached client for the lookup endpoint.
pub struct LookupClient {
    client: Client,
    url: String,
    api_key: String,
    cache: LookupCache,
}

impl LookupClient {
    pub fn new(intake: &IntakeConfig, cache: &LookupCacheConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(intake.request_timeout())
            .build()?;
        Ok(Self {
            client,
            url: intake.lookup_url.clone(),
            api_key: intake.api_key.clone(),
            cache: LookupCache::from_config(cache),
        })
    }

    /// Values for the given query, from cache when fresh.
    ///
    /// Only successful responses are cached.
    pub async fn lookup(&self, params: &[(&str, &str)]) -> Result<Vec<Value>, LookupError> {
        let key = make_cache_key(params);
        if let Some(values) = self.cache.get(&key) {
            debug!(key = %key, "lookup served from cache");
            return Ok(values);
        }

        debug!(key = %key, "looking up values");
        let response = self
            .client
            .get(&self.url)
            .query(params)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "lookup request failed");
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut payload: Value = serde_json::from_str(&response.text().await?)?;
        let values = match payload.get_mut("list").map(Value::take) {
            Some(Value::Array(values)) => values,
            _ => return Err(LookupError::MissingList),
        };
        self.cache.put(key, values.clone());
        Ok(values)
    }

    pub async fn federal_agencies(&self) -> Result<Vec<Value>, LookupError> {
        self.lookup(FEDERAL_AGENCIES).await
    }

    pub async fn agency_types(&self) -> Result<Vec<Value>, LookupError> {
        self.lookup(AGENCY_TYPES).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LookupClient {
        let intake = IntakeConfig {
            lookup_url: format!("{}/lookup", server.uri()),
            api_key: "regs-key".into(),
            request_timeout_secs: 5,
            ..IntakeConfig::default()
        };
        LookupClient::new(&intake, &LookupCacheConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn federal_agencies_are_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lookup"))
            .and(query_param("field", "gov_agency"))
            .and(query_param("dependentOnValue", "Federal"))
            .and(header("X-Api-Key", "regs-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": [{"value": "CFPB", "label": "Consumer Financial Protection Bureau"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let first = client.federal_agencies().await.unwrap();
        let second = client.federal_agencies().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0]["value"], "CFPB");
    }

    #[tokio::test]
    async fn different_queries_use_different_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("field", "gov_agency_type"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": ["Federal", "State"]})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("field", "gov_agency"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": ["CFPB"]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.agency_types().await.unwrap(), vec![json!("Federal"), json!("State")]);
        assert_eq!(client.federal_agencies().await.unwrap(), vec![json!("CFPB")]);
        assert_eq!(client.agency_types().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for _ in 0..2 {
            let err = client.agency_types().await.unwrap_err();
            assert!(matches!(err, LookupError::Status { status: 503, .. }));
        }
    }

    #[tokio::test]
    async fn only_ok_responses_are_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(203).set_body_json(json!({"list": ["Federal"]})))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for _ in 0..2 {
            let err = client.agency_types().await.unwrap_err();
            assert!(matches!(err, LookupError::Status { status: 203, .. }));
        }
    }

    #[tokio::test]
    async fn missing_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).agency_types().await.unwrap_err();
        assert!(matches!(err, LookupError::MissingList));
    }
}
