use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::TVError;

/// One country of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    pub display_name: String,
    pub capital: Vec<String>,
    pub population: u64,
    pub area: f64,
    pub flag_image_url: String,
}

/// Immutable snapshot of all countries of a session. Replaced as a whole on refetch.
pub type Dataset = Arc<Vec<Country>>;

// Shape of one element of the REST Countries response
#[derive(Deserialize)]
struct WireCountry {
    name: WireName,
    #[serde(default)]
    capital: Option<Vec<String>>,
    population: u64,
    area: f64,
    flags: WireFlags,
}

#[derive(Deserialize)]
struct WireName {
    common: String,
}

#[derive(Deserialize)]
struct WireFlags {
    png: String,
}

/// Result of decoding a payload. Malformed records are dropped and counted.
#[derive(Debug, Default)]
pub struct Parsed {
    pub countries: Vec<Country>,
    pub rejected: usize,
}

impl Parsed {
    pub fn into_dataset(self) -> Dataset {
        Arc::new(self.countries)
    }
}

impl TryFrom<WireCountry> for Country {
    type Error = String;

    fn try_from(wire: WireCountry) -> Result<Self, Self::Error> {
        if !wire.area.is_finite() || wire.area < 0.0 {
            return Err(format!("invalid area {}", wire.area));
        }
        Ok(Country {
            display_name: wire.name.common,
            capital: wire.capital.unwrap_or_default(),
            population: wire.population,
            area: wire.area,
            flag_image_url: wire.flags.png,
        })
    }
}

/// Decode a payload that must be a JSON array of countries.
pub fn parse_countries(payload: &str) -> Result<Parsed, TVError> {
    let values: Vec<Value> = serde_json::from_str(payload)?;
    Ok(from_values(values))
}

pub fn from_values(values: Vec<Value>) -> Parsed {
    let mut parsed = Parsed {
        countries: Vec::with_capacity(values.len()),
        rejected: 0,
    };

    for (idx, value) in values.into_iter().enumerate() {
        let country = serde_json::from_value::<WireCountry>(value)
            .map_err(|e| e.to_string())
            .and_then(Country::try_from);
        match country {
            Ok(c) => parsed.countries.push(c),
            Err(reason) => {
                warn!("Skipping malformed record #{idx}: {reason}");
                parsed.rejected += 1;
            }
        }
    }
    debug!(
        "Decoded {} countries, rejected {}",
        parsed.countries.len(),
        parsed.rejected
    );
    parsed
}
