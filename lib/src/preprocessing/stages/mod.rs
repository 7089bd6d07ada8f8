//! Concrete feature-engineering stages for flight records.

mod aircraft;
mod airport;
mod clean;
mod derived;
mod fuel_price;
mod pax_flow;
mod runway;
mod trajectory;
mod weather;

pub use aircraft::{AircraftPerformancePreprocessor, AIRCRAFT_KEY};
pub use airport::{AirportPreprocessor, AIRPORT_FIELDS, AIRPORT_KEY};
pub use clean::{CleanDatasetPreprocessor, DATETIME_COLUMNS};
pub use derived::DerivedFeaturePreprocessor;
pub use fuel_price::{FuelPricePreprocessor, COUNTRY_KEY, PRICE_FIELD};
pub use pax_flow::{
    PaxFlowPreprocessor, STATS_AIRPORT, STATS_DIMENSIONS, STATS_PERIOD, STATS_VALUE,
};
pub use runway::{RunwayPreprocessor, RUNWAY_CLOSED, RUNWAY_FIELDS, RUNWAY_KEY};
pub use trajectory::TrajectoryPreprocessor;
pub use weather::{
    CsvObservationSource, ObservationSource, WeatherPreprocessor, DEFAULT_WEATHER_FIELDS,
    OBSERVATION_TIME,
};
