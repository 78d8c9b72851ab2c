//! Static, read-only definitions of everything a player can buy.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::{
    geo::Coordinates,
    models::{CityState, JobType, PlaneState},
};

/// Purchasable city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityDef {
    /// Catalog identifier, also the key in a player's city map.
    pub city_id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Purchase price in currency units.
    pub cost: u64,
    /// Airport location.
    pub coordinates: Coordinates,
    /// Size tier, 1 being the largest hubs.
    pub city_class: u8,
    /// Inhabitants.
    pub population: u64,
    /// Planes that can wait at the airport at once.
    pub layover_size: u32,
}

impl CityDef {
    /// Fresh owned-city record with an empty, already expired board.
    pub fn to_state(&self) -> CityState {
        CityState {
            city_id: self.city_id.to_string(),
            name: self.name.to_string(),
            coordinates: self.coordinates,
            city_class: self.city_class,
            population: self.population,
            layover_size: self.layover_size,
            jobs: BTreeMap::new(),
            jobs_expire: 0,
        }
    }
}

/// Purchasable plane model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneDef {
    /// Catalog identifier.
    pub plane_id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Purchase price in currency units.
    pub cost: u64,
    /// Cruise speed in km/h.
    pub speed: u32,
    /// Weight class.
    pub weight: u32,
    /// The only job type this model carries.
    pub capacity_type: JobType,
    /// Jobs that fit in the hold.
    pub capacity: u32,
    /// Longest leg in km.
    pub flight_range: u32,
    /// Size tier.
    pub size_class: u8,
}

impl PlaneDef {
    /// Grounded, empty plane parked at `current_city_id`.
    pub fn to_state(&self, current_city_id: &str) -> PlaneState {
        PlaneState {
            model_id: self.plane_id.to_string(),
            name: self.name.to_string(),
            speed: self.speed,
            weight: self.weight,
            capacity: self.capacity,
            capacity_type: self.capacity_type,
            flight_range: self.flight_range,
            size_class: self.size_class,
            current_city_id: current_city_id.to_string(),
            destination_city_id: None,
            eta: 0,
            loaded_jobs: BTreeMap::new(),
        }
    }
}

static CITIES: Lazy<BTreeMap<&'static str, CityDef>> = Lazy::new(|| {
    [
        CityDef {
            city_id: "c1001",
            name: "Chicago",
            cost: 10000,
            coordinates: Coordinates::new(41.9742, -87.9073),
            city_class: 1,
            population: 2_700_000,
            layover_size: 20,
        },
        CityDef {
            city_id: "c1002",
            name: "Boston",
            cost: 2778,
            coordinates: Coordinates::new(42.3656, -71.0096),
            city_class: 2,
            population: 690_000,
            layover_size: 10,
        },
        CityDef {
            city_id: "c1003",
            name: "Detroit",
            cost: 2500,
            coordinates: Coordinates::new(42.2162, -83.3554),
            city_class: 2,
            population: 640_000,
            layover_size: 10,
        },
        CityDef {
            city_id: "c1004",
            name: "Milwaukee",
            cost: 1200,
            coordinates: Coordinates::new(42.9476, -87.8966),
            city_class: 3,
            population: 580_000,
            layover_size: 6,
        },
        CityDef {
            city_id: "c1005",
            name: "Minneapolis",
            cost: 3000,
            coordinates: Coordinates::new(44.8848, -93.2223),
            city_class: 2,
            population: 430_000,
            layover_size: 10,
        },
        CityDef {
            city_id: "c1006",
            name: "New York",
            cost: 25000,
            coordinates: Coordinates::new(40.6413, -73.7781),
            city_class: 1,
            population: 8_300_000,
            layover_size: 30,
        },
        CityDef {
            city_id: "c1007",
            name: "Atlanta",
            cost: 9000,
            coordinates: Coordinates::new(33.6407, -84.4277),
            city_class: 1,
            population: 500_000,
            layover_size: 25,
        },
        CityDef {
            city_id: "c1008",
            name: "Denver",
            cost: 6000,
            coordinates: Coordinates::new(39.8561, -104.6737),
            city_class: 2,
            population: 710_000,
            layover_size: 15,
        },
        CityDef {
            city_id: "c1009",
            name: "Seattle",
            cost: 7500,
            coordinates: Coordinates::new(47.4502, -122.3088),
            city_class: 2,
            population: 740_000,
            layover_size: 15,
        },
        CityDef {
            city_id: "c1010",
            name: "Los Angeles",
            cost: 20000,
            coordinates: Coordinates::new(33.9416, -118.4085),
            city_class: 1,
            population: 3_900_000,
            layover_size: 30,
        },
    ]
    .into_iter()
    .map(|city| (city.city_id, city))
    .collect()
});

static PLANES: Lazy<BTreeMap<&'static str, PlaneDef>> = Lazy::new(|| {
    [
        PlaneDef {
            plane_id: "a0",
            name: "Skyhopper",
            cost: 200,
            speed: 300,
            weight: 1,
            capacity_type: JobType::Passenger,
            capacity: 4,
            flight_range: 1500,
            size_class: 1,
        },
        PlaneDef {
            plane_id: "a1",
            name: "Packrunner",
            cost: 200,
            speed: 330,
            weight: 1,
            capacity_type: JobType::Cargo,
            capacity: 4,
            flight_range: 1500,
            size_class: 1,
        },
        PlaneDef {
            plane_id: "a2",
            name: "Regional 50",
            cost: 4500,
            speed: 650,
            weight: 3,
            capacity_type: JobType::Passenger,
            capacity: 12,
            flight_range: 2800,
            size_class: 2,
        },
        PlaneDef {
            plane_id: "a3",
            name: "Freightliner 200",
            cost: 6000,
            speed: 600,
            weight: 4,
            capacity_type: JobType::Cargo,
            capacity: 10,
            flight_range: 3200,
            size_class: 2,
        },
        PlaneDef {
            plane_id: "a4",
            name: "Continental 300",
            cost: 40000,
            speed: 850,
            weight: 8,
            capacity_type: JobType::Passenger,
            capacity: 40,
            flight_range: 6500,
            size_class: 3,
        },
    ]
    .into_iter()
    .map(|plane| (plane.plane_id, plane))
    .collect()
});

/// Look up a city definition.
pub fn city(city_id: &str) -> Option<&'static CityDef> {
    CITIES.get(city_id)
}

/// Look up a plane definition.
pub fn plane(plane_id: &str) -> Option<&'static PlaneDef> {
    PLANES.get(plane_id)
}

/// All cities ordered by id.
pub fn cities() -> impl Iterator<Item = &'static CityDef> {
    CITIES.values()
}

/// All plane models ordered by id.
pub fn planes() -> impl Iterator<Item = &'static PlaneDef> {
    PLANES.values()
}
