use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Unit system sent to the provider and used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Metric,
    #[default]
    Imperial,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    /// The other unit system, for the UI toggle.
    pub fn toggled(&self) -> Self {
        match self {
            Unit::Metric => Unit::Imperial,
            Unit::Imperial => Unit::Metric,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Unit {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "metric" => Ok(Unit::Metric),
            "imperial" => Ok(Unit::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit '{value}'. Supported units: metric, imperial."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Identity of a city-weather request. Two queries with equal fields are
/// the same logical request and share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationQuery {
    pub city: String,
    pub unit: Unit,
}

impl LocationQuery {
    pub fn new(city: impl Into<String>, unit: Unit) -> Self {
        Self { city: city.into(), unit }
    }
}

/// Current conditions for a resolved city. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityWeather {
    pub name: String,
    pub coordinates: Coordinates,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_max: f64,
    pub temp_min: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub pressure: f64,
    pub condition_icon: String,
    pub condition_description: String,
}

/// Identity of a forecast request. Only constructed from a resolved
/// [`CityWeather`]; the forecast endpoint is keyed by coordinates rather
/// than city name, so an ambiguous name cannot resolve differently
/// between the two requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastQuery {
    pub coordinates: Coordinates,
    pub unit: Unit,
}

impl ForecastQuery {
    pub fn for_city(weather: &CityWeather, unit: Unit) -> Self {
        Self { coordinates: weather.coordinates, unit }
    }

    pub fn key(&self) -> ForecastKey {
        ForecastKey {
            lat_bits: self.coordinates.lat.to_bits(),
            lon_bits: self.coordinates.lon.to_bits(),
            unit: self.unit,
        }
    }
}

/// Cache key for forecast results. `f64` is neither `Eq` nor `Hash`, so
/// the key captures the exact bit patterns of the coordinates the city
/// lookup returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForecastKey {
    lat_bits: u64,
    lon_bits: u64,
    unit: Unit,
}

/// One 3-hour slot of the 5-day forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub timestamp: NaiveDateTime,
    pub temp_max: f64,
    pub temp_min: f64,
    pub condition_icon: String,
    pub condition_description: String,
}

/// Forecast entries in provider order; the provider emits them
/// chronologically and that order is preserved end to end.
pub type ForecastSeries = Vec<ForecastEntry>;
