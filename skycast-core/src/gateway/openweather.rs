use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::{
    error::GatewayError,
    model::{
        CityWeather, Coordinates, ForecastEntry, ForecastQuery, ForecastSeries, LocationQuery,
    },
};

use super::{WeatherGateway, truncate_body};

const DT_TXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Gateway to the OpenWeather `data/2.5` endpoints.
#[derive(Debug, Clone)]
pub struct OpenWeatherGateway {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherGateway {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, GatewayError> {
        Self::with_base_url(api_key, "https://api.openweathermap.org", timeout)
    }

    /// Same as [`new`](Self::new) with an explicit host, for proxies and
    /// mock servers.
    pub fn with_base_url(
        api_key: String,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::from_transport)?;

        Ok(Self { api_key, base_url: base_url.into(), http })
    }

    /// Checks the status, classifies failures, and returns the raw body.
    async fn read_success_body(
        res: Response,
        subject: &str,
    ) -> Result<String, GatewayError> {
        let status = res.status();
        let body = res.text().await.map_err(GatewayError::from_transport)?;

        if status.is_success() {
            return Ok(body);
        }

        Err(match status {
            StatusCode::NOT_FOUND => GatewayError::NotFound(subject.to_string()),
            StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited,
            _ => GatewayError::NetworkFailure(format!(
                "provider returned status {status}: {}",
                truncate_body(&body),
            )),
        })
    }
}

fn parse_json<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|err| GatewayError::MalformedResponse(err.to_string()))
}

fn first_condition(weather: Vec<OwCondition>) -> Result<OwCondition, GatewayError> {
    weather.into_iter().next().ok_or_else(|| {
        GatewayError::MalformedResponse("response carried no weather condition entry".into())
    })
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    icon: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    coord: OwCoord,
    main: OwMain,
    weather: Vec<OwCondition>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt_txt: String,
    main: OwForecastMain,
    weather: Vec<OwCondition>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

#[async_trait]
impl WeatherGateway for OpenWeatherGateway {
    async fn fetch_city_weather(
        &self,
        query: &LocationQuery,
    ) -> Result<CityWeather, GatewayError> {
        let url = format!("{}/data/2.5/weather", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", query.city.as_str()),
                ("units", query.unit.as_str()),
                ("APPID", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(GatewayError::from_transport)?;

        let body = Self::read_success_body(res, &query.city).await?;
        let parsed: OwCurrentResponse = parse_json(&body)?;

        let condition = first_condition(parsed.weather)?;

        Ok(CityWeather {
            name: parsed.name,
            coordinates: Coordinates { lat: parsed.coord.lat, lon: parsed.coord.lon },
            temperature: parsed.main.temp,
            feels_like: parsed.main.feels_like,
            temp_max: parsed.main.temp_max,
            temp_min: parsed.main.temp_min,
            humidity: parsed.main.humidity,
            wind_speed: parsed.wind.speed,
            pressure: parsed.main.pressure,
            condition_icon: condition.icon,
            condition_description: condition.description,
        })
    }

    async fn fetch_forecast(
        &self,
        query: &ForecastQuery,
    ) -> Result<ForecastSeries, GatewayError> {
        let url = format!("{}/data/2.5/forecast", self.base_url);
        let lat = query.coordinates.lat.to_string();
        let lon = query.coordinates.lon.to_string();

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("units", query.unit.as_str()),
                ("APPID", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(GatewayError::from_transport)?;

        let subject = format!("{lat},{lon}");
        let body = Self::read_success_body(res, &subject).await?;
        let parsed: OwForecastResponse = parse_json(&body)?;

        let mut series = Vec::with_capacity(parsed.list.len());
        for raw in parsed.list {
            let timestamp = NaiveDateTime::parse_from_str(&raw.dt_txt, DT_TXT_FORMAT)
                .map_err(|err| {
                    GatewayError::MalformedResponse(format!(
                        "bad forecast timestamp '{}': {err}",
                        raw.dt_txt
                    ))
                })?;
            let condition = first_condition(raw.weather)?;

            series.push(ForecastEntry {
                timestamp,
                temp_max: raw.main.temp_max,
                temp_min: raw.main.temp_min,
                condition_icon: condition.icon,
                condition_description: condition.description,
            });
        }

        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Unit;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> OpenWeatherGateway {
        OpenWeatherGateway::with_base_url(
            "test-key".into(),
            server.uri(),
            Duration::from_secs(5),
        )
        .expect("client must build")
    }

    fn current_body() -> serde_json::Value {
        serde_json::json!({
            "coord": {"lon": -0.1257, "lat": 51.5085},
            "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
            "main": {
                "temp": 11.2,
                "feels_like": 10.6,
                "temp_min": 9.8,
                "temp_max": 12.4,
                "pressure": 1012,
                "humidity": 81
            },
            "wind": {"speed": 4.1, "deg": 250},
            "name": "London"
        })
    }

    #[tokio::test]
    async fn city_weather_request_carries_credentials_and_units() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .and(query_param("units", "metric"))
            .and(query_param("APPID", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .expect(1)
            .mount(&server)
            .await;

        let query = LocationQuery::new("London", Unit::Metric);
        let weather = gateway(&server).fetch_city_weather(&query).await.unwrap();

        assert_eq!(weather.name, "London");
        assert_eq!(weather.coordinates.lat, 51.5085);
        assert_eq!(weather.coordinates.lon, -0.1257);
        assert_eq!(weather.temperature, 11.2);
        assert_eq!(weather.feels_like, 10.6);
        assert_eq!(weather.humidity, 81);
        assert_eq!(weather.pressure, 1012.0);
        assert_eq!(weather.condition_icon, "10d");
        assert_eq!(weather.condition_description, "light rain");
    }

    #[tokio::test]
    async fn missing_city_maps_to_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"cod": "404", "message": "city not found"})),
            )
            .mount(&server)
            .await;

        let query = LocationQuery::new("Atlantis", Unit::Metric);
        let err = gateway(&server).fetch_city_weather(&query).await.unwrap_err();

        assert_eq!(err, GatewayError::NotFound("Atlantis".into()));
    }

    #[tokio::test]
    async fn throttled_request_maps_to_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let query = LocationQuery::new("London", Unit::Metric);
        let err = gateway(&server).fetch_city_weather(&query).await.unwrap_err();

        assert_eq!(err, GatewayError::RateLimited);
    }

    #[tokio::test]
    async fn server_error_maps_to_network_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let query = LocationQuery::new("London", Unit::Metric);
        let err = gateway(&server).fetch_city_weather(&query).await.unwrap_err();

        match err {
            GatewayError::NetworkFailure(detail) => {
                assert!(detail.contains("500"));
                assert!(detail.contains("boom"));
            }
            other => panic!("expected NetworkFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_body_maps_to_malformed_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let query = LocationQuery::new("London", Unit::Metric);
        let err = gateway(&server).fetch_city_weather(&query).await.unwrap_err();

        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn empty_condition_list_maps_to_malformed_response() {
        let server = MockServer::start().await;

        let mut body = current_body();
        body["weather"] = serde_json::json!([]);

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let query = LocationQuery::new("London", Unit::Metric);
        let err = gateway(&server).fetch_city_weather(&query).await.unwrap_err();

        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn forecast_request_uses_coordinates_and_keeps_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("lat", "51.5085"))
            .and(query_param("lon", "-0.1257"))
            .and(query_param("units", "imperial"))
            .and(query_param("APPID", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [
                    {
                        "dt_txt": "2024-01-01 09:00:00",
                        "main": {"temp": 4.2, "temp_min": 3.1, "temp_max": 5.6},
                        "weather": [{"icon": "04d", "description": "overcast clouds"}]
                    },
                    {
                        "dt_txt": "2024-01-01 12:00:00",
                        "main": {"temp": 6.0, "temp_min": 4.9, "temp_max": 6.8},
                        "weather": [{"icon": "03d", "description": "scattered clouds"}]
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = ForecastQuery {
            coordinates: Coordinates { lat: 51.5085, lon: -0.1257 },
            unit: Unit::Imperial,
        };
        let series = gateway(&server).fetch_forecast(&query).await.unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].condition_icon, "04d");
        assert_eq!(series[0].temp_min, 3.1);
        assert_eq!(series[1].condition_description, "scattered clouds");
        assert!(series[0].timestamp < series[1].timestamp);
    }

    #[tokio::test]
    async fn bad_forecast_timestamp_maps_to_malformed_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [
                    {
                        "dt_txt": "yesterday-ish",
                        "main": {"temp_min": 3.1, "temp_max": 5.6},
                        "weather": [{"icon": "04d", "description": "overcast clouds"}]
                    }
                ]
            })))
            .mount(&server)
            .await;

        let query = ForecastQuery {
            coordinates: Coordinates { lat: 51.5085, lon: -0.1257 },
            unit: Unit::Metric,
        };
        let err = gateway(&server).fetch_forecast(&query).await.unwrap_err();

        match err {
            GatewayError::MalformedResponse(detail) => {
                assert!(detail.contains("yesterday-ish"));
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }
}
