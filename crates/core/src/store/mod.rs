#![allow(missing_docs)]

//! Persistence gateway: one aggregate per player, changed only through
//! conditional atomic updates.
//!
//! Callers describe a state change as a list of [`Condition`]s that must all
//! hold against the value currently stored and a list of [`Mutation`]s that
//! are applied together. A backend either commits every mutation or none of
//! them. Identifiers travel as data inside the descriptors, never as parts of
//! an expression string.

use std::collections::BTreeMap;

use crate::{
    error::StoreError,
    models::{CityState, Job, PlaneState, Player},
};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage contract consumed by every engine component.
pub trait PlayerStore: Send + Sync {
    /// Current aggregate, if any. Unsynchronised read.
    fn get(&self, player_id: &str) -> Result<Option<Player>, StoreError>;

    /// Insert `player` iff nothing is stored under its id.
    fn create(&self, player: Player) -> Result<(), StoreError>;

    /// Apply `mutations` iff every condition holds over the stored value.
    /// Returns the aggregate as committed.
    fn update(
        &self,
        player_id: &str,
        conditions: &[Condition],
        mutations: &[Mutation],
    ) -> Result<Player, StoreError>;
}

/// Predicate evaluated against the stored aggregate at commit time.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Balance is at least the amount.
    BalanceAtLeast(u64),
    /// No city is stored under the id.
    CityAbsent(String),
    /// A city is stored under the id.
    CityOwned(String),
    /// No plane is stored under the id.
    PlaneAbsent(String),
    /// The plane exists and is on the ground.
    PlaneGrounded(String),
    /// The plane exists and is parked or based at the city.
    PlaneAt { plane_id: String, city_id: String },
    /// The plane exists and is flying the given leg.
    PlaneInFlight {
        plane_id: String,
        destination_city_id: String,
        eta: i64,
    },
    /// The city's board is still valid at `now`.
    BoardLive { city_id: String, now: i64 },
    /// Every listed job is on the city's board.
    JobsOnBoard { city_id: String, job_ids: Vec<String> },
    /// Every listed job is in the plane's hold.
    JobsLoaded { plane_id: String, job_ids: Vec<String> },
    /// The plane has at least this many free slots.
    FreeCapacity { plane_id: String, at_least: usize },
}

impl Condition {
    /// Whether the predicate holds for `player`.
    pub fn holds(&self, player: &Player) -> bool {
        match self {
            Condition::BalanceAtLeast(amount) => player.balance >= *amount,
            Condition::CityAbsent(city_id) => !player.cities.contains_key(city_id),
            Condition::CityOwned(city_id) => player.cities.contains_key(city_id),
            Condition::PlaneAbsent(plane_id) => !player.planes.contains_key(plane_id),
            Condition::PlaneGrounded(plane_id) => player
                .planes
                .get(plane_id)
                .map(PlaneState::is_grounded)
                .unwrap_or(false),
            Condition::PlaneAt { plane_id, city_id } => player
                .planes
                .get(plane_id)
                .map(|plane| &plane.current_city_id == city_id)
                .unwrap_or(false),
            Condition::PlaneInFlight {
                plane_id,
                destination_city_id,
                eta,
            } => player
                .planes
                .get(plane_id)
                .map(|plane| {
                    plane.eta == *eta
                        && plane.destination_city_id.as_deref() == Some(destination_city_id)
                })
                .unwrap_or(false),
            Condition::BoardLive { city_id, now } => player
                .cities
                .get(city_id)
                .map(|city| city.board_is_live(*now))
                .unwrap_or(false),
            Condition::JobsOnBoard { city_id, job_ids } => player
                .cities
                .get(city_id)
                .map(|city| job_ids.iter().all(|id| city.jobs.contains_key(id)))
                .unwrap_or(false),
            Condition::JobsLoaded { plane_id, job_ids } => player
                .planes
                .get(plane_id)
                .map(|plane| job_ids.iter().all(|id| plane.loaded_jobs.contains_key(id)))
                .unwrap_or(false),
            Condition::FreeCapacity { plane_id, at_least } => player
                .planes
                .get(plane_id)
                .map(|plane| plane.free_capacity() >= *at_least)
                .unwrap_or(false),
        }
    }
}

/// New record to insert into a nested map.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Owned city, keyed by its `city_id`.
    City(CityState),
    /// Owned plane under a freshly generated id.
    Plane { plane_id: String, plane: PlaneState },
    /// Job placed in a plane's hold.
    LoadedJob { plane_id: String, job: Job },
}

/// Keys to delete from a nested map.
#[derive(Debug, Clone, PartialEq)]
pub enum Keys {
    /// Jobs on a city board.
    BoardJobs { city_id: String, job_ids: Vec<String> },
    /// Jobs in a plane's hold.
    LoadedJobs { plane_id: String, job_ids: Vec<String> },
}

/// Field replaced wholesale.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// A city's job board and its expiry.
    JobBoard {
        city_id: String,
        jobs: BTreeMap<String, Job>,
        jobs_expire: i64,
    },
    /// Where a plane is parked.
    PlaneLocation { plane_id: String, city_id: String },
    /// Flight leg; `None` with eta 0 grounds the plane.
    PlaneFlight {
        plane_id: String,
        destination_city_id: Option<String>,
        eta: i64,
    },
}

/// Structured change to a player aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Credit (positive) or debit (negative) the balance.
    AddToBalance(i64),
    /// Insert a record that must not exist yet.
    InsertEntry(Entry),
    /// Remove records that must exist.
    RemoveKeys(Keys),
    /// Overwrite a field.
    SetField(Field),
}

/// Evaluate `conditions` and apply `mutations` to a copy of `current`.
///
/// Shared by every backend so the contract is identical regardless of where
/// the aggregate lives.
pub fn apply_update(
    current: &Player,
    conditions: &[Condition],
    mutations: &[Mutation],
) -> Result<Player, StoreError> {
    if let Some(failed) = conditions.iter().find(|condition| !condition.holds(current)) {
        tracing::debug!(player_id = %current.player_id, ?failed, "condition rejected");
        return Err(StoreError::ConditionFailed(current.player_id.clone()));
    }

    let mut next = current.clone();
    for mutation in mutations {
        apply_mutation(&mut next, mutation)?;
    }
    Ok(next)
}

fn apply_mutation(player: &mut Player, mutation: &Mutation) -> Result<(), StoreError> {
    match mutation {
        Mutation::AddToBalance(delta) => {
            let updated = i128::from(player.balance) + i128::from(*delta);
            player.balance = u64::try_from(updated).map_err(|_| {
                StoreError::InvalidMutation(format!(
                    "balance {} cannot change by {delta}",
                    player.balance
                ))
            })?;
        }
        Mutation::InsertEntry(Entry::City(city)) => {
            if player.cities.contains_key(&city.city_id) {
                return Err(StoreError::InvalidMutation(format!(
                    "city {} already owned",
                    city.city_id
                )));
            }
            player.cities.insert(city.city_id.clone(), city.clone());
        }
        Mutation::InsertEntry(Entry::Plane { plane_id, plane }) => {
            if player.planes.contains_key(plane_id) {
                return Err(StoreError::InvalidMutation(format!(
                    "plane id {plane_id} already assigned"
                )));
            }
            player.planes.insert(plane_id.clone(), plane.clone());
        }
        Mutation::InsertEntry(Entry::LoadedJob { plane_id, job }) => {
            let plane = plane_mut(player, plane_id)?;
            if job.job_type != plane.capacity_type {
                return Err(StoreError::InvalidMutation(format!(
                    "job {} is type {}, plane {plane_id} carries {}",
                    job.id, job.job_type, plane.capacity_type
                )));
            }
            if !plane.loaded_jobs.contains_key(&job.id) && plane.free_capacity() == 0 {
                return Err(StoreError::InvalidMutation(format!(
                    "plane {plane_id} is full"
                )));
            }
            plane.loaded_jobs.insert(job.id.clone(), job.clone());
        }
        Mutation::RemoveKeys(Keys::BoardJobs { city_id, job_ids }) => {
            let city = player.cities.get_mut(city_id).ok_or_else(|| {
                StoreError::InvalidMutation(format!("city {city_id} not owned"))
            })?;
            for job_id in job_ids {
                if city.jobs.remove(job_id).is_none() {
                    return Err(StoreError::InvalidMutation(format!(
                        "job {job_id} not on board of {city_id}"
                    )));
                }
            }
        }
        Mutation::RemoveKeys(Keys::LoadedJobs { plane_id, job_ids }) => {
            let plane = plane_mut(player, plane_id)?;
            for job_id in job_ids {
                if plane.loaded_jobs.remove(job_id).is_none() {
                    return Err(StoreError::InvalidMutation(format!(
                        "job {job_id} not loaded on {plane_id}"
                    )));
                }
            }
        }
        Mutation::SetField(Field::JobBoard {
            city_id,
            jobs,
            jobs_expire,
        }) => {
            let city = player.cities.get_mut(city_id).ok_or_else(|| {
                StoreError::InvalidMutation(format!("city {city_id} not owned"))
            })?;
            city.jobs = jobs.clone();
            city.jobs_expire = *jobs_expire;
        }
        Mutation::SetField(Field::PlaneLocation { plane_id, city_id }) => {
            plane_mut(player, plane_id)?.current_city_id = city_id.clone();
        }
        Mutation::SetField(Field::PlaneFlight {
            plane_id,
            destination_city_id,
            eta,
        }) => {
            if destination_city_id.is_none() != (*eta == 0) {
                return Err(StoreError::InvalidMutation(format!(
                    "plane {plane_id}: eta {eta} inconsistent with destination {destination_city_id:?}"
                )));
            }
            let plane = plane_mut(player, plane_id)?;
            plane.destination_city_id = destination_city_id.clone();
            plane.eta = *eta;
        }
    }
    Ok(())
}

fn plane_mut<'a>(player: &'a mut Player, plane_id: &str) -> Result<&'a mut PlaneState, StoreError> {
    player
        .planes
        .get_mut(plane_id)
        .ok_or_else(|| StoreError::InvalidMutation(format!("plane {plane_id} not owned")))
}
