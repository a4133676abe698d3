use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Config,
    error::GatewayError,
    gateway::openweather::OpenWeatherGateway,
    model::{CityWeather, ForecastQuery, ForecastSeries, LocationQuery},
};

pub mod openweather;

/// Read-only access to the remote weather provider.
///
/// Implementations construct requests and type responses; retry policy
/// belongs to the caller.
#[async_trait]
pub trait WeatherGateway: Send + Sync + Debug {
    async fn fetch_city_weather(
        &self,
        query: &LocationQuery,
    ) -> Result<CityWeather, GatewayError>;

    async fn fetch_forecast(
        &self,
        query: &ForecastQuery,
    ) -> Result<ForecastSeries, GatewayError>;
}

/// Construct the production gateway from config.
pub fn gateway_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherGateway>> {
    let api_key = config.api_key()?;

    let gateway = OpenWeatherGateway::with_base_url(
        api_key.to_owned(),
        config.base_url.clone(),
        config.request_timeout(),
    )?;

    Ok(Arc::new(gateway))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX { format!("{}...", &body[..MAX]) } else { body.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = gateway_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn gateway_from_config_works_when_key_is_set() {
        let cfg = Config { api_key: Some("KEY".into()), ..Config::default() };
        assert!(gateway_from_config(&cfg).is_ok());
    }

    #[test]
    fn truncate_body_caps_long_bodies() {
        let long = "x".repeat(500);
        let truncated = truncate_body(&long);
        assert!(truncated.len() < long.len());
        assert!(truncated.ends_with("..."));

        assert_eq!(truncate_body("short"), "short");
    }
}
