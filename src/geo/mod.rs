//! Geo Catalog: pure lookup over a static country/state/city dataset.
//!
//! Returns states for a country, cities for a country+state, and validates
//! codes. Each city carries an optional population figure consumed by the
//! job runner's phased Big/Mid/Small/Unknown traversal.

mod data;

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A single city entry in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub name: String,
    pub population: Option<u64>,
}

/// A state/province within a country.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub code: String,
    pub name: String,
    pub cities: Vec<City>,
}

/// A country in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    pub code: String,
    pub name: String,
    pub states: Vec<State>,
}

struct Catalog {
    by_country: HashMap<String, Country>,
}

static CATALOG: Lazy<Catalog> = Lazy::new(|| {
    let countries = data::build_catalog();
    let mut by_country = HashMap::with_capacity(countries.len());
    for country in countries {
        by_country.insert(country.code.clone(), country);
    }
    Catalog { by_country }
});

/// Error returned when a code does not resolve in the catalog.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeoError {
    #[error("unknown country code: {0}")]
    UnknownCountry(String),
    #[error("unknown state code {state} for country {country}")]
    UnknownState { country: String, state: String },
    #[error("unknown city {city} in {country}/{state}")]
    UnknownCity { country: String, state: String, city: String },
}

/// Validate a country code and return the matching `Country`.
pub fn country(code: &str) -> Result<&'static Country, GeoError> {
    CATALOG
        .by_country
        .get(&code.to_uppercase())
        .ok_or_else(|| GeoError::UnknownCountry(code.to_string()))
}

/// Validate a country+state code pair and return the matching `State`.
pub fn state<'a>(country_code: &str, state_code: &'a str) -> Result<&'static State, GeoError> {
    let country = country(country_code)?;
    country
        .states
        .iter()
        .find(|s| s.code.eq_ignore_ascii_case(state_code))
        .ok_or_else(|| GeoError::UnknownState {
            country: country_code.to_string(),
            state: state_code.to_string(),
        })
}

/// List all states for a country, in catalog order.
pub fn states_for_country(country_code: &str) -> Result<&'static [State], GeoError> {
    Ok(&country(country_code)?.states)
}

/// List all cities for a country+state, in catalog order.
pub fn cities_for_state(country_code: &str, state_code: &str) -> Result<&'static [City], GeoError> {
    Ok(&state(country_code, state_code)?.cities)
}

/// Validate that a specific city exists under a country+state.
pub fn validate_city(country_code: &str, state_code: &str, city_name: &str) -> Result<(), GeoError> {
    let st = state(country_code, state_code)?;
    if st.cities.iter().any(|c| c.name.eq_ignore_ascii_case(city_name)) {
        Ok(())
    } else {
        Err(GeoError::UnknownCity {
            country: country_code.to_string(),
            state: state_code.to_string(),
            city: city_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_country() {
        assert!(country("US").is_ok());
        assert!(country("us").is_ok(), "country lookup is case-insensitive");
    }

    #[test]
    fn rejects_unknown_country() {
        assert!(matches!(country("ZZ"), Err(GeoError::UnknownCountry(_))));
    }

    #[test]
    fn lists_cities_for_known_state() {
        let cities = cities_for_state("US", "CA").expect("CA should exist");
        assert!(cities.iter().any(|c| c.name == "Los Angeles"));
    }

    #[test]
    fn validates_known_city() {
        assert!(validate_city("US", "CA", "San Francisco").is_ok());
        assert!(validate_city("US", "CA", "Gotham").is_err());
    }
}
