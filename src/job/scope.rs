//! Scope expansion: turns a job's `(country, state?, city?)` request into an
//! ordered sequence of concrete `(country, state, city)` locations to visit.

use rand::seq::SliceRandom;

use crate::errors::JobRunnerError;
use crate::geo;
use crate::model::JobScope;

/// Population threshold for the "Big" bucket.
const BIG_THRESHOLD: u64 = 1_000_000;
/// Population threshold for the "Mid" bucket.
const MID_THRESHOLD: u64 = 100_000;

/// A single resolved location to search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub country: String,
    pub state: String,
    pub city: String,
}

/// Expand a job's scope into the full ordered list of locations to visit.
/// Single pinned locations pass straight through; state- and country-level
/// scopes enumerate their children shuffled, then bucket by population into
/// Big/Mid/Small/Unknown (processed in that order) whenever more than one
/// city results, so population-dense cities are attempted first.
pub fn expand_scope(scope: &JobScope, min_population: u64) -> Result<Vec<Location>, JobRunnerError> {
    let mut rng = rand::rng();

    let raw_locations = match (&scope.state, &scope.city) {
        (Some(state_code), Some(city)) => {
            geo::validate_city(&scope.country, state_code, city)
                .map_err(|e| JobRunnerError::InvalidScope(e.to_string()))?;
            vec![RawLocation {
                state_code: state_code.clone(),
                city: city.clone(),
                population: None,
            }]
        }
        (Some(state_code), None) => {
            let cities = geo::cities_for_state(&scope.country, state_code)
                .map_err(|e| JobRunnerError::InvalidScope(e.to_string()))?;
            let mut locations: Vec<RawLocation> = cities
                .iter()
                .map(|c| RawLocation {
                    state_code: state_code.clone(),
                    city: c.name.clone(),
                    population: c.population,
                })
                .collect();
            locations.shuffle(&mut rng);
            locations
        }
        (None, _) => {
            let states = geo::states_for_country(&scope.country)
                .map_err(|e| JobRunnerError::InvalidScope(e.to_string()))?;
            let mut state_order: Vec<usize> = (0..states.len()).collect();
            state_order.shuffle(&mut rng);

            let mut locations = Vec::new();
            for idx in state_order {
                let state = &states[idx];
                let mut cities: Vec<RawLocation> = state
                    .cities
                    .iter()
                    .map(|c| RawLocation {
                        state_code: state.code.clone(),
                        city: c.name.clone(),
                        population: c.population,
                    })
                    .collect();
                cities.shuffle(&mut rng);
                locations.extend(cities);
            }
            locations
        }
    };

    let ordered = if raw_locations.len() > 1 {
        bucket_by_population(raw_locations, min_population, &mut rng)
    } else {
        raw_locations
    };

    Ok(ordered
        .into_iter()
        .map(|raw| Location {
            country: scope.country.clone(),
            state: raw.state_code,
            city: raw.city,
        })
        .collect())
}

struct RawLocation {
    state_code: String,
    city: String,
    population: Option<u64>,
}

enum Bucket {
    Big,
    Mid,
    Small,
    Unknown,
}

fn classify(population: Option<u64>, min_population: u64) -> Bucket {
    match population {
        Some(p) if p >= BIG_THRESHOLD => Bucket::Big,
        Some(p) if p >= MID_THRESHOLD => Bucket::Mid,
        Some(p) if p >= min_population => Bucket::Small,
        Some(_) => Bucket::Small,
        None => Bucket::Unknown,
    }
}

fn bucket_by_population(
    locations: Vec<RawLocation>,
    min_population: u64,
    rng: &mut impl rand::Rng,
) -> Vec<RawLocation> {
    let mut big = Vec::new();
    let mut mid = Vec::new();
    let mut small = Vec::new();
    let mut unknown = Vec::new();

    for loc in locations {
        match classify(loc.population, min_population) {
            Bucket::Big => big.push(loc),
            Bucket::Mid => mid.push(loc),
            Bucket::Small => small.push(loc),
            Bucket::Unknown => unknown.push(loc),
        }
    }

    big.shuffle(rng);
    mid.shuffle(rng);
    small.shuffle(rng);
    unknown.shuffle(rng);

    big.into_iter().chain(mid).chain(small).chain(unknown).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pinned_location_passes_through() {
        let scope = JobScope {
            country: "US".to_string(),
            state: Some("CA".to_string()),
            city: Some("San Francisco".to_string()),
        };
        let locations = expand_scope(&scope, 0).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].city, "San Francisco");
    }

    #[test]
    fn invalid_city_is_rejected() {
        let scope = JobScope {
            country: "US".to_string(),
            state: Some("CA".to_string()),
            city: Some("Gotham".to_string()),
        };
        assert!(expand_scope(&scope, 0).is_err());
    }

    #[test]
    fn state_scope_enumerates_all_cities() {
        let scope = JobScope {
            country: "US".to_string(),
            state: Some("CA".to_string()),
            city: None,
        };
        let expected = geo::cities_for_state("US", "CA").unwrap().len();
        let locations = expand_scope(&scope, 0).unwrap();
        assert_eq!(locations.len(), expected);
    }

    #[test]
    fn bucketing_orders_big_before_unknown() {
        let locations = vec![
            RawLocation { state_code: "CA".into(), city: "Unknownville".into(), population: None },
            RawLocation { state_code: "CA".into(), city: "Megacity".into(), population: Some(5_000_000) },
        ];
        let mut rng = rand::rng();
        let ordered = bucket_by_population(locations, 0, &mut rng);
        assert_eq!(ordered[0].city, "Megacity");
        assert_eq!(ordered[1].city, "Unknownville");
    }
}
