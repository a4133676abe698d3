use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use skycast_core::{
    Config, RequestState, Snapshot, Unit, WeatherStore, gateway_from_config,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "City weather and 5-day forecast")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and lookup defaults.
    Configure,

    /// Show current weather and the extended forecast for a city.
    Show {
        /// City name; falls back to the configured default city.
        city: Option<String>,

        /// Unit system, "metric" or "imperial".
        #[arg(long)]
        unit: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, unit } => show(city, unit).await,
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.api_key = Some(api_key);

    config.default_city = inquire::Text::new("Default city:")
        .with_default(&config.default_city)
        .prompt()
        .context("Failed to read default city")?;

    let unit = inquire::Select::new("Default units:", vec!["imperial", "metric"])
        .prompt()
        .context("Failed to read default units")?;
    config.default_unit = Unit::try_from(unit)?;

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());

    Ok(())
}

async fn show(city: Option<String>, unit: Option<String>) -> Result<()> {
    let config = Config::load()?;

    let unit = match unit {
        Some(raw) => Unit::try_from(raw.as_str())?,
        None => config.default_unit,
    };
    let city = city.unwrap_or_else(|| config.default_city.clone());

    let gateway = gateway_from_config(&config)?;
    let store = WeatherStore::new(gateway, unit);
    let mut updates = store.subscribe();

    store.search(city.as_str());

    let snapshot = loop {
        {
            let snap = updates.borrow_and_update();
            if is_settled(&snap) {
                break snap.clone();
            }
        }
        updates.changed().await.context("weather store closed unexpectedly")?;
    };

    render(&snapshot, unit)
}

/// Both slots have reached an outcome: a city error settles the whole
/// view (the forecast never starts), a city success waits on the
/// forecast either way.
fn is_settled(snapshot: &Snapshot) -> bool {
    match &snapshot.city {
        RequestState::Error(_) => true,
        RequestState::Success(_) => snapshot.forecast.is_settled(),
        _ => false,
    }
}

fn render(snapshot: &Snapshot, unit: Unit) -> Result<()> {
    let weather = match &snapshot.city {
        RequestState::Success(weather) => weather,
        RequestState::Error(err) => bail!("{}", err.user_message()),
        _ => bail!("No weather data received"),
    };

    println!("{}", weather.name);
    println!(
        "  {}  {}",
        format_temp(weather.temperature, unit),
        weather.condition_description
    );
    println!("  Feels like {}", format_temp(weather.feels_like, unit));
    println!(
        "  High {} / low {}",
        format_temp(weather.temp_max, unit),
        format_temp(weather.temp_min, unit)
    );
    println!("  Humidity {}%", weather.humidity);
    println!("  Wind {}", format_speed(weather.wind_speed, unit));
    println!("  Pressure {} hPa", weather.pressure);

    match &snapshot.forecast {
        RequestState::Success(_) if snapshot.daily.is_empty() => {
            println!("\nNo forecast data found");
        }
        RequestState::Success(_) => {
            println!("\nExtended forecast:");
            for entry in &snapshot.daily {
                println!(
                    "  {}  {} / {}  {}",
                    entry.timestamp.format("%a"),
                    format_temp(entry.temp_max, unit),
                    format_temp(entry.temp_min, unit),
                    entry.condition_description
                );
            }
        }
        RequestState::Error(err) => {
            println!("\nForecast unavailable: {}", err.user_message());
        }
        _ => {}
    }

    Ok(())
}

fn format_temp(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Metric => format!("{value:.0}°C"),
        Unit::Imperial => format!("{value:.0}°F"),
    }
}

fn format_speed(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Metric => format!("{value:.1} m/s"),
        Unit::Imperial => format!("{value:.1} mph"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_core::QueryError;

    #[test]
    fn city_error_settles_the_view() {
        let snapshot = Snapshot {
            city: RequestState::Error(QueryError::Validation("empty".into())),
            ..Snapshot::default()
        };
        assert!(is_settled(&snapshot));
    }

    #[test]
    fn city_success_waits_for_the_forecast() {
        let weather = sample_city();

        let pending = Snapshot {
            city: RequestState::Success(weather.clone()),
            forecast: RequestState::Loading,
            daily: Vec::new(),
        };
        assert!(!is_settled(&pending));

        let done = Snapshot {
            city: RequestState::Success(weather),
            forecast: RequestState::Success(Vec::new()),
            daily: Vec::new(),
        };
        assert!(is_settled(&done));
    }

    #[test]
    fn idle_and_loading_do_not_settle() {
        assert!(!is_settled(&Snapshot::default()));
        assert!(!is_settled(&Snapshot {
            city: RequestState::Loading,
            ..Snapshot::default()
        }));
    }

    #[test]
    fn temperatures_format_per_unit() {
        assert_eq!(format_temp(11.4, Unit::Metric), "11°C");
        assert_eq!(format_temp(52.6, Unit::Imperial), "53°F");
    }

    fn sample_city() -> skycast_core::CityWeather {
        skycast_core::CityWeather {
            name: "London".into(),
            coordinates: skycast_core::Coordinates { lat: 51.5, lon: -0.1 },
            temperature: 11.2,
            feels_like: 10.6,
            temp_max: 12.4,
            temp_min: 9.8,
            humidity: 81,
            wind_speed: 4.1,
            pressure: 1012.0,
            condition_icon: "10d".into(),
            condition_description: "light rain".into(),
        }
    }
}
