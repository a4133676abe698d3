//! The query store: request lifecycle, caching, and the dependent
//! city → forecast fetch chain.
//!
//! The store is the sole mutator of query state. Subscribers observe it
//! through a [`watch`] channel carrying [`Snapshot`] values; every state
//! transition publishes exactly one new snapshot, sent while the state
//! lock is held so transitions cannot reorder.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    error::{GatewayError, QueryError},
    forecast::select_daily,
    gateway::WeatherGateway,
    model::{
        CityWeather, ForecastEntry, ForecastKey, ForecastQuery, ForecastSeries, LocationQuery,
        Unit,
    },
    state::RequestState,
};

/// What subscribers see: both query slots plus the derived daily view.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub city: RequestState<CityWeather>,
    pub forecast: RequestState<ForecastSeries>,
    /// One representative forecast entry per calendar day; empty unless
    /// the forecast slot holds a result.
    pub daily: Vec<ForecastEntry>,
}

#[derive(Debug)]
struct Slots {
    unit: Unit,
    city_query: Option<LocationQuery>,
    city: RequestState<CityWeather>,
    forecast: RequestState<ForecastSeries>,
    forecast_key: Option<ForecastKey>,
    // Generation tags disambiguate stale async completions: a fetch
    // commits only if its captured tag still matches the slot.
    city_generation: u64,
    forecast_generation: u64,
    city_cache: HashMap<LocationQuery, CityWeather>,
    forecast_cache: HashMap<ForecastKey, ForecastSeries>,
}

struct Inner {
    gateway: Arc<dyn WeatherGateway>,
    state: Mutex<Slots>,
    updates: watch::Sender<Snapshot>,
}

/// Orchestrates the two dependent queries behind the weather view.
///
/// Cloning is cheap; clones share the same state and subscriber channel.
#[derive(Clone)]
pub struct WeatherStore {
    inner: Arc<Inner>,
}

impl WeatherStore {
    pub fn new(gateway: Arc<dyn WeatherGateway>, unit: Unit) -> Self {
        let (updates, _) = watch::channel(Snapshot::default());

        Self {
            inner: Arc::new(Inner {
                gateway,
                state: Mutex::new(Slots {
                    unit,
                    city_query: None,
                    city: RequestState::Idle,
                    forecast: RequestState::Idle,
                    forecast_key: None,
                    city_generation: 0,
                    forecast_generation: 0,
                    city_cache: HashMap::new(),
                    forecast_cache: HashMap::new(),
                }),
                updates,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.updates.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.updates.borrow().clone()
    }

    pub fn unit(&self) -> Unit {
        self.inner.state.lock().unit
    }

    /// User-initiated search: replaces the query identity, then forces a
    /// fetch. The forced fetch still deduplicates against an identical
    /// request already in flight.
    pub fn search(&self, city: impl Into<String>) {
        let unit = self.unit();
        self.set_city_query(LocationQuery::new(city, unit));
        self.trigger_city_fetch();
    }

    /// Flip the unit system, re-issuing both queries under their new
    /// identities. Results cached under the previous unit stay cached.
    pub fn toggle_unit(&self) {
        let unit = self.unit().toggled();
        self.set_unit(unit);
    }

    /// Replace the active city query identity.
    ///
    /// A cached result for the new identity is served without a network
    /// call; otherwise the slot goes to `Loading` and a fetch is spawned.
    /// The dependent forecast slot resets to `Idle` either way; it is
    /// only meaningful for the city that produced the coordinates.
    pub fn set_city_query(&self, query: LocationQuery) {
        let mut slots = self.inner.state.lock();

        if let Err(err) = validate(&query) {
            slots.unit = query.unit;
            slots.city_query = Some(query);
            slots.city_generation += 1;
            slots.forecast_generation += 1;
            slots.city = RequestState::Error(err);
            slots.forecast = RequestState::Idle;
            slots.forecast_key = None;
            self.publish(&slots);
            return;
        }

        let identical = slots.city_query.as_ref() == Some(&query);
        if identical && matches!(slots.city, RequestState::Loading | RequestState::Success(_)) {
            // Same identity, already in flight or already resolved.
            return;
        }

        slots.unit = query.unit;
        slots.city_query = Some(query.clone());
        slots.city_generation += 1;
        slots.forecast_generation += 1;
        slots.forecast = RequestState::Idle;
        slots.forecast_key = None;

        if let Some(cached) = slots.city_cache.get(&query).cloned() {
            tracing::debug!(city = %query.city, unit = %query.unit, "serving city from cache");
            slots.city = RequestState::Success(cached.clone());
            self.publish(&slots);
            let unit = query.unit;
            self.issue_forecast(&mut slots, &cached, unit);
            return;
        }

        slots.city = RequestState::Loading;
        self.publish(&slots);

        let generation = slots.city_generation;
        drop(slots);
        self.spawn_city_fetch(query, generation);
    }

    /// Re-fetch the current city query, bypassing the cache.
    pub fn trigger_city_fetch(&self) {
        let mut slots = self.inner.state.lock();

        let Some(query) = slots.city_query.clone() else {
            return;
        };

        if let Err(err) = validate(&query) {
            slots.city = RequestState::Error(err);
            slots.forecast = RequestState::Idle;
            slots.forecast_key = None;
            self.publish(&slots);
            return;
        }

        if slots.city.is_loading() {
            // An identical request is already in flight; share its outcome.
            return;
        }

        slots.city_generation += 1;
        slots.forecast_generation += 1;
        slots.forecast = RequestState::Idle;
        slots.forecast_key = None;
        slots.city = RequestState::Loading;
        self.publish(&slots);

        let generation = slots.city_generation;
        drop(slots);
        self.spawn_city_fetch(query, generation);
    }

    /// Switch units for both active queries. The unit is part of each
    /// query identity, so this re-issues them as new queries; toggling
    /// back to a unit with cached results serves those without a fetch.
    pub fn set_unit(&self, unit: Unit) {
        let current = {
            let mut slots = self.inner.state.lock();
            if slots.unit == unit {
                return;
            }
            match slots.city_query.clone() {
                Some(query) => query,
                None => {
                    slots.unit = unit;
                    return;
                }
            }
        };

        self.set_city_query(LocationQuery::new(current.city, unit));
    }

    fn spawn_city_fetch(&self, query: LocationQuery, generation: u64) {
        tracing::debug!(city = %query.city, unit = %query.unit, "fetching current weather");
        let store = self.clone();

        tokio::spawn(async move {
            let result = store.inner.gateway.fetch_city_weather(&query).await;
            store.commit_city(&query, generation, result);
        });
    }

    fn commit_city(
        &self,
        query: &LocationQuery,
        generation: u64,
        result: Result<CityWeather, GatewayError>,
    ) {
        let mut slots = self.inner.state.lock();

        if generation != slots.city_generation {
            tracing::debug!(city = %query.city, "discarding superseded city response");
            return;
        }

        match result {
            Ok(weather) => {
                slots.city_cache.insert(query.clone(), weather.clone());
                slots.city = RequestState::Success(weather.clone());
                self.publish(&slots);

                // The dependent fetch chain: a forecast query exists only
                // as a function of a current city success.
                let unit = slots.unit;
                self.issue_forecast(&mut slots, &weather, unit);
            }
            Err(err) => {
                tracing::warn!(city = %query.city, error = %err, "city lookup failed");
                slots.city = RequestState::Error(err.into());
                slots.forecast = RequestState::Idle;
                slots.forecast_key = None;
                slots.forecast_generation += 1;
                self.publish(&slots);
            }
        }
    }

    fn issue_forecast(&self, slots: &mut Slots, weather: &CityWeather, unit: Unit) {
        let query = ForecastQuery::for_city(weather, unit);
        let key = query.key();

        if slots.forecast.is_loading() && slots.forecast_key == Some(key) {
            return;
        }

        slots.forecast_key = Some(key);
        slots.forecast_generation += 1;

        if let Some(cached) = slots.forecast_cache.get(&key).cloned() {
            tracing::debug!(city = %weather.name, unit = %unit, "serving forecast from cache");
            slots.forecast = RequestState::Success(cached);
            self.publish(slots);
            return;
        }

        slots.forecast = RequestState::Loading;
        self.publish(slots);

        let generation = slots.forecast_generation;
        tracing::debug!(
            city = %weather.name,
            lat = query.coordinates.lat,
            lon = query.coordinates.lon,
            "fetching forecast"
        );
        let store = self.clone();

        tokio::spawn(async move {
            let result = store.inner.gateway.fetch_forecast(&query).await;
            store.commit_forecast(generation, result);
        });
    }

    fn commit_forecast(&self, generation: u64, result: Result<ForecastSeries, GatewayError>) {
        let mut slots = self.inner.state.lock();

        if generation != slots.forecast_generation {
            tracing::debug!("discarding superseded forecast response");
            return;
        }

        match result {
            Ok(series) => {
                if let Some(key) = slots.forecast_key {
                    slots.forecast_cache.insert(key, series.clone());
                }
                slots.forecast = RequestState::Success(series);
            }
            Err(err) => {
                tracing::warn!(error = %err, "forecast lookup failed");
                slots.forecast = RequestState::Error(err.into());
            }
        }

        self.publish(&slots);
    }

    fn publish(&self, slots: &Slots) {
        let daily = match &slots.forecast {
            RequestState::Success(series) => select_daily(series),
            _ => Vec::new(),
        };

        self.inner.updates.send_replace(Snapshot {
            city: slots.city.clone(),
            forecast: slots.forecast.clone(),
            daily,
        });
    }
}

fn validate(query: &LocationQuery) -> Result<(), QueryError> {
    if query.city.trim().is_empty() {
        return Err(QueryError::Validation("city name must not be empty".into()));
    }
    Ok(())
}
