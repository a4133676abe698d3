//! Core library for the `skycast` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather gateway and its error taxonomy
//! - The query store orchestrating the dependent city → forecast chain
//! - The daily forecast selector
//!
//! It is used by `skycast-cli`, but can also be reused by other binaries
//! or services.

pub mod config;
pub mod error;
pub mod forecast;
pub mod gateway;
pub mod model;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{GatewayError, QueryError};
pub use forecast::select_daily;
pub use gateway::{WeatherGateway, gateway_from_config, openweather::OpenWeatherGateway};
pub use model::{
    CityWeather, Coordinates, ForecastEntry, ForecastQuery, ForecastSeries, LocationQuery, Unit,
};
pub use state::RequestState;
pub use store::{Snapshot, WeatherStore};
