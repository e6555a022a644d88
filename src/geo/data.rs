//! Static country/state/city dataset backing the Geo Catalog.
//!
//! This is a representative slice, not an exhaustive gazetteer: enough
//! coverage to exercise the scope-expansion and phased-traversal logic in
//! `job::scope` against realistic Big/Mid/Small/Unknown population buckets.

use super::{City, Country, State};

fn city(name: &str, population: Option<u64>) -> City {
    City {
        name: name.to_string(),
        population,
    }
}

pub(super) fn build_catalog() -> Vec<Country> {
    vec![
        Country {
            code: "US".to_string(),
            name: "United States".to_string(),
            states: vec![
                State {
                    code: "CA".to_string(),
                    name: "California".to_string(),
                    cities: vec![
                        city("Los Angeles", Some(3_900_000)),
                        city("San Diego", Some(1_380_000)),
                        city("San Francisco", Some(815_000)),
                        city("Sacramento", Some(525_000)),
                        city("Fresno", Some(545_000)),
                        city("Modesto", None),
                    ],
                },
                State {
                    code: "NY".to_string(),
                    name: "New York".to_string(),
                    cities: vec![
                        city("New York City", Some(8_400_000)),
                        city("Buffalo", Some(278_000)),
                        city("Rochester", Some(211_000)),
                        city("Albany", Some(99_000)),
                        city("Ithaca", None),
                    ],
                },
                State {
                    code: "TX".to_string(),
                    name: "Texas".to_string(),
                    cities: vec![
                        city("Houston", Some(2_300_000)),
                        city("Austin", Some(965_000)),
                        city("El Paso", Some(678_000)),
                        city("Waco", Some(138_000)),
                        city("Marfa", None),
                    ],
                },
            ],
        },
        Country {
            code: "IN".to_string(),
            name: "India".to_string(),
            states: vec![
                State {
                    code: "MH".to_string(),
                    name: "Maharashtra".to_string(),
                    cities: vec![
                        city("Mumbai", Some(12_400_000)),
                        city("Pune", Some(3_100_000)),
                        city("Nagpur", Some(2_400_000)),
                        city("Nashik", Some(1_480_000)),
                        city("Satara", None),
                    ],
                },
                State {
                    code: "KA".to_string(),
                    name: "Karnataka".to_string(),
                    cities: vec![
                        city("Bengaluru", Some(8_400_000)),
                        city("Mysuru", Some(920_000)),
                        city("Hubballi", Some(943_000)),
                        city("Gokak", None),
                    ],
                },
            ],
        },
        Country {
            code: "GB".to_string(),
            name: "United Kingdom".to_string(),
            states: vec![State {
                code: "ENG".to_string(),
                name: "England".to_string(),
                cities: vec![
                    city("London", Some(8_900_000)),
                    city("Manchester", Some(552_000)),
                    city("Bristol", Some(467_000)),
                    city("York", Some(210_000)),
                    city("Hebden Bridge", None),
                ],
            }],
        },
    ]
}
