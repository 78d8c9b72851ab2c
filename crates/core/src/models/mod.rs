#![allow(missing_docs)]

//! Player aggregate and the records nested inside it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geo::Coordinates;

/// Stored value of `destination_city_id` while a plane is on the ground.
pub const NO_DESTINATION: &str = "none";

/// Kind of load a job represents and a plane carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Passengers.
    #[serde(rename = "P")]
    Passenger,
    /// Cargo.
    #[serde(rename = "C")]
    Cargo,
}

impl JobType {
    /// Single-letter code used on the wire.
    pub fn code(self) -> &'static str {
        match self {
            JobType::Passenger => "P",
            JobType::Cargo => "C",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A transport task offered by a city and carried by a plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub origin_city_id: String,
    pub destination_city_id: String,
    pub revenue: u64,
    pub job_type: JobType,
}

/// A city owned by a player: catalog fields copied at purchase plus its job board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityState {
    pub city_id: String,
    pub name: String,
    pub coordinates: Coordinates,
    pub city_class: u8,
    pub population: u64,
    pub layover_size: u32,
    #[serde(default)]
    pub jobs: BTreeMap<String, Job>,
    /// Unix seconds after which `jobs` is stale. Zero before the first refresh.
    #[serde(default)]
    pub jobs_expire: i64,
}

impl CityState {
    /// True while the cached board may still be served and loaded from.
    pub fn board_is_live(&self, now: i64) -> bool {
        now < self.jobs_expire
    }
}

/// A plane owned by a player: catalog fields copied at purchase plus flight state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneState {
    /// Catalog definition the plane was bought from.
    pub model_id: String,
    pub name: String,
    pub speed: u32,
    pub weight: u32,
    pub capacity: u32,
    pub capacity_type: JobType,
    pub flight_range: u32,
    pub size_class: u8,
    pub current_city_id: String,
    #[serde(
        default,
        serialize_with = "serialize_destination",
        deserialize_with = "deserialize_destination"
    )]
    pub destination_city_id: Option<String>,
    #[serde(default)]
    pub eta: i64,
    #[serde(default)]
    pub loaded_jobs: BTreeMap<String, Job>,
}

impl PlaneState {
    /// Grounded planes have neither a destination nor an ETA.
    pub fn is_grounded(&self) -> bool {
        self.eta == 0 && self.destination_city_id.is_none()
    }

    /// Free slots left in the hold.
    pub fn free_capacity(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.loaded_jobs.len())
    }
}

/// Per-player aggregate; the unit of every conditional mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: String,
    pub balance: u64,
    #[serde(default)]
    pub cities: BTreeMap<String, CityState>,
    #[serde(default)]
    pub planes: BTreeMap<String, PlaneState>,
}

impl Player {
    pub fn new(player_id: impl Into<String>, balance: u64) -> Self {
        Self {
            player_id: player_id.into(),
            balance,
            cities: BTreeMap::new(),
            planes: BTreeMap::new(),
        }
    }
}

fn serialize_destination<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or(NO_DESTINATION))
}

fn deserialize_destination<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.is_empty() && value != NO_DESTINATION))
}
