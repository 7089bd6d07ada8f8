//! Reproducible synthetic flight tables.
//!
//! The target is a noisy linear function of distance and aircraft type, so
//! the supervised models have something to learn.

use atow::dataset::Dataset;
use atow::error::Result;
use atow::table::{Column, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const AIRPORTS: [&str; 6] = ["EGLL", "LFPG", "EDDF", "EHAM", "LEMD", "LIRF"];

/// (type, base weight in kg, kg per km)
const AIRCRAFT: [(&str, f64, f64); 4] = [
    ("A320", 55_000.0, 4.0),
    ("B738", 58_000.0, 4.5),
    ("A333", 170_000.0, 12.0),
    ("B77W", 230_000.0, 15.0),
];

/// `n` flights with `flight_id`, `callsign`, `date`, `adep`, `ades`,
/// `aircraft_type`, `flown_distance`, `flight_duration` and `tow`.
pub fn synthetic_flights(n: usize, seed: u64) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ids = Vec::with_capacity(n);
    let mut callsigns = Vec::with_capacity(n);
    let mut dates = Vec::with_capacity(n);
    let mut adep = Vec::with_capacity(n);
    let mut ades = Vec::with_capacity(n);
    let mut types = Vec::with_capacity(n);
    let mut distance = Vec::with_capacity(n);
    let mut duration = Vec::with_capacity(n);
    let mut tow = Vec::with_capacity(n);

    for i in 0..n {
        let (ac, base, per_km) = AIRCRAFT[rng.random_range(0..AIRCRAFT.len())];
        let from = AIRPORTS[rng.random_range(0..AIRPORTS.len())];
        let to = AIRPORTS[rng.random_range(0..AIRPORTS.len())];
        let km: f64 = rng.random_range(300.0..3000.0);
        let noise: f64 = rng.random_range(-0.02..0.02);

        ids.push(Some(format!("{}", 248_000_000 + i)));
        callsigns.push(Some(format!("CS{:04}", rng.random_range(0..10_000))));
        dates.push(Some(format!(
            "2022-{:02}-{:02}",
            rng.random_range(1..=12),
            rng.random_range(1..=28)
        )));
        adep.push(Some(from.to_string()));
        ades.push(Some(to.to_string()));
        types.push(Some(ac.to_string()));
        distance.push(Some(km));
        duration.push(Some(km / 12.0 + rng.random_range(0.0..15.0)));
        tow.push(Some((base + per_km * km) * (1.0 + noise)));
    }

    let table = Table::from_columns(vec![
        Column::str("flight_id", ids),
        Column::str("callsign", callsigns),
        Column::str("date", dates),
        Column::str("adep", adep),
        Column::str("ades", ades),
        Column::str("aircraft_type", types),
        Column::float("flown_distance", distance),
        Column::float("flight_duration", duration),
        Column::float("tow", tow),
    ])?;
    Ok(Dataset::new(table, format!("synthetic[{}]", n)))
}
