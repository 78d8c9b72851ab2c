//! Plane ownership and loading jobs from a city board into a plane's hold.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    catalog,
    error::{EngineError, EngineResult},
    ledger::{Ledger, Purchase},
    models::{Job, PlaneState, Player},
    rng::GameRng,
    store::{Condition, Entry, Keys, Mutation, PlayerStore},
};

/// Result of buying a plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanePurchase {
    /// Id the new plane is stored under.
    pub plane_id: String,
    /// Balance after the purchase.
    pub balance: u64,
}

/// Validated loading step ready to be committed, alone or with a departure.
#[derive(Debug, Clone)]
pub(crate) struct LoadPlan {
    pub conditions: Vec<Condition>,
    pub mutations: Vec<Mutation>,
    pub jobs: Vec<Job>,
}

/// Check a load request against `player` and describe the commit.
///
/// Checks run in a fixed order: plane, board expiry, job ids, free capacity,
/// job type. A repeated id counts as invalid. The first failure wins and nothing is written.
pub(crate) fn plan_load(
    player: &Player,
    plane_id: &str,
    job_ids: &[String],
    now: i64,
) -> EngineResult<LoadPlan> {
    let plane = player
        .planes
        .get(plane_id)
        .ok_or_else(|| EngineError::InvalidPlane(plane_id.to_string()))?;
    if !plane.is_grounded() {
        return Err(EngineError::AlreadyInFlight(plane_id.to_string()));
    }
    let city_id = plane.current_city_id.as_str();
    let city = player
        .cities
        .get(city_id)
        .ok_or_else(|| EngineError::CityNotOwned(city_id.to_string()))?;
    if !city.board_is_live(now) {
        return Err(EngineError::JobsExpired(city_id.to_string()));
    }
    if job_ids.is_empty() {
        return Err(EngineError::NoJobsSpecified);
    }

    let mut seen = BTreeSet::new();
    let jobs = job_ids
        .iter()
        .map(|id| match city.jobs.get(id) {
            Some(job) if seen.insert(id.as_str()) => Ok(job.clone()),
            _ => Err(EngineError::InvalidJobId(id.clone())),
        })
        .collect::<EngineResult<Vec<Job>>>()?;
    let unique: Vec<String> = seen.into_iter().map(str::to_string).collect();

    let available = plane.free_capacity();
    if jobs.len() > available {
        return Err(EngineError::CapacityExceeded {
            requested: jobs.len(),
            available,
        });
    }
    if let Some(job) = jobs.iter().find(|job| job.job_type != plane.capacity_type) {
        return Err(EngineError::TypeMismatch {
            job_id: job.id.clone(),
            expected: plane.capacity_type,
            found: job.job_type,
        });
    }

    let conditions = vec![
        Condition::PlaneGrounded(plane_id.to_string()),
        Condition::PlaneAt {
            plane_id: plane_id.to_string(),
            city_id: city_id.to_string(),
        },
        Condition::BoardLive {
            city_id: city_id.to_string(),
            now,
        },
        Condition::JobsOnBoard {
            city_id: city_id.to_string(),
            job_ids: unique.clone(),
        },
        Condition::FreeCapacity {
            plane_id: plane_id.to_string(),
            at_least: jobs.len(),
        },
    ];
    let mut mutations: Vec<Mutation> = jobs
        .iter()
        .map(|job| {
            Mutation::InsertEntry(Entry::LoadedJob {
                plane_id: plane_id.to_string(),
                job: job.clone(),
            })
        })
        .collect();
    mutations.push(Mutation::RemoveKeys(Keys::BoardJobs {
        city_id: city_id.to_string(),
        job_ids: unique,
    }));

    Ok(LoadPlan {
        conditions,
        mutations,
        jobs,
    })
}

/// Plane operations over a [`PlayerStore`].
pub struct Fleet<'a, S: ?Sized> {
    store: &'a S,
    rng: &'a GameRng,
}

impl<'a, S: PlayerStore + ?Sized> Fleet<'a, S> {
    /// View over `store`; plane ids are drawn from `rng`.
    pub fn new(store: &'a S, rng: &'a GameRng) -> Self {
        Self { store, rng }
    }

    /// Buy a plane parked at one of the player's cities.
    pub fn purchase_plane(
        &self,
        player_id: &str,
        plane_def_id: &str,
        starting_city_id: &str,
    ) -> EngineResult<PlanePurchase> {
        let def = catalog::plane(plane_def_id)
            .ok_or_else(|| EngineError::UnknownPlane(plane_def_id.to_string()))?;
        if catalog::city(starting_city_id).is_none() {
            return Err(EngineError::UnknownCity(starting_city_id.to_string()));
        }
        let player = self
            .store
            .get(player_id)?
            .ok_or_else(|| EngineError::PlayerNotFound(player_id.to_string()))?;
        if !player.cities.contains_key(starting_city_id) {
            return Err(EngineError::CityNotOwned(starting_city_id.to_string()));
        }

        let plane_id = self.rng.random_id();
        let balance = Ledger::new(self.store).purchase(
            player_id,
            def.cost,
            Purchase::Plane {
                plane_id: plane_id.clone(),
                plane: def.to_state(starting_city_id),
            },
        )?;
        info!(player_id, %plane_id, model = def.plane_id, city_id = starting_city_id, "plane bought");
        Ok(PlanePurchase { plane_id, balance })
    }

    /// Move jobs from the board of the plane's current city into its hold.
    pub fn load_jobs(
        &self,
        player_id: &str,
        plane_id: &str,
        job_ids: &[String],
        now: i64,
    ) -> EngineResult<PlaneState> {
        let player = self
            .store
            .get(player_id)?
            .ok_or_else(|| EngineError::PlayerNotFound(player_id.to_string()))?;
        let plan = match plan_load(&player, plane_id, job_ids, now) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(player_id, plane_id, %err, "load rejected");
                return Err(err);
            }
        };

        let updated = self
            .store
            .update(player_id, &plan.conditions, &plan.mutations)?;
        info!(player_id, plane_id, jobs = plan.jobs.len(), "jobs loaded");
        updated
            .planes
            .get(plane_id)
            .cloned()
            .ok_or_else(|| EngineError::InvalidPlane(plane_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::JobBoardSettings,
        jobs::JobBoard,
        models::JobType,
        store::MemoryStore,
    };

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        store: MemoryStore,
        rng: GameRng,
        settings: JobBoardSettings,
    }

    impl Fixture {
        fn new(balance: u64) -> Self {
            let store = MemoryStore::new();
            let ledger = Ledger::new(&store);
            ledger.create_player("p1", balance).expect("create");
            Self {
                store,
                rng: GameRng::from_seed_u64(11),
                settings: JobBoardSettings::default(),
            }
        }

        fn with_cities(self, cities: &[&str]) -> Self {
            for city_id in cities {
                Ledger::new(&self.store)
                    .purchase_city("p1", city_id)
                    .expect("buy city");
            }
            self
        }

        fn fleet(&self) -> Fleet<'_, MemoryStore> {
            Fleet::new(&self.store, &self.rng)
        }

        fn board(&self) -> JobBoard<'_, MemoryStore> {
            JobBoard::new(&self.store, &self.rng, &self.settings)
        }

        fn jobs_of_type(&self, city_id: &str, job_type: JobType) -> Vec<String> {
            self.board()
                .get_or_generate("p1", city_id, NOW)
                .expect("board")
                .jobs
                .values()
                .filter(|job| job.job_type == job_type)
                .map(|job| job.id.clone())
                .collect()
        }
    }

    #[test]
    fn plane_purchase_debits_and_grounds() {
        let fixture = Fixture::new(10_000).with_cities(&["c1004"]);
        let fleet = fixture.fleet();
        let bought = fleet
            .purchase_plane("p1", "a0", "c1004")
            .expect("affordable");
        assert_eq!(bought.balance, 10_000 - 1_200 - 200);

        let player = Ledger::new(&fixture.store).player("p1").expect("exists");
        let plane = &player.planes[&bought.plane_id];
        assert!(plane.is_grounded());
        assert_eq!(plane.current_city_id, "c1004");
        assert!(plane.loaded_jobs.is_empty());
    }

    #[test]
    fn second_plane_fails_once_funds_run_out() {
        let fixture = Fixture::new(1_500).with_cities(&["c1004"]);
        let fleet = fixture.fleet();
        assert_eq!(
            fleet.purchase_plane("p1", "a0", "c1004").map(|p| p.balance).ok(),
            Some(100)
        );
        assert!(matches!(
            fleet.purchase_plane("p1", "a0", "c1004"),
            Err(EngineError::Conflict)
        ));
        assert_eq!(Ledger::new(&fixture.store).balance("p1").ok(), Some(100));
    }

    #[test]
    fn plane_needs_catalog_entry_and_owned_city() {
        let fixture = Fixture::new(10_000).with_cities(&["c1004"]);
        let fleet = fixture.fleet();
        assert!(matches!(
            fleet.purchase_plane("p1", "zz", "c1004"),
            Err(EngineError::UnknownPlane(_))
        ));
        assert!(matches!(
            fleet.purchase_plane("p1", "a0", "c1002"),
            Err(EngineError::CityNotOwned(_))
        ));
    }

    #[test]
    fn capacity_is_enforced_and_loading_moves_jobs_off_the_board() {
        let fixture = Fixture::new(1_000_000).with_cities(&["c1001", "c1002", "c1003"]);
        let plane_id = fixture
            .fleet()
            .purchase_plane("p1", "a0", "c1001")
            .expect("plane")
            .plane_id;
        let passenger_jobs = fixture.jobs_of_type("c1001", JobType::Passenger);
        assert!(passenger_jobs.len() >= 5);

        let five = passenger_jobs[..5].to_vec();
        assert!(matches!(
            fixture.fleet().load_jobs("p1", &plane_id, &five, NOW + 1),
            Err(EngineError::CapacityExceeded {
                requested: 5,
                available: 4
            })
        ));

        let four = passenger_jobs[..4].to_vec();
        let plane = fixture
            .fleet()
            .load_jobs("p1", &plane_id, &four, NOW + 1)
            .expect("four fit");
        assert_eq!(plane.loaded_jobs.len(), 4);

        let board = fixture
            .board()
            .get_or_generate("p1", "c1001", NOW + 2)
            .expect("cached");
        assert_eq!(board.jobs.len(), 26);
        assert!(four.iter().all(|id| !board.jobs.contains_key(id)));
        assert!(passenger_jobs[4..]
            .iter()
            .all(|id| board.jobs.contains_key(id)));
    }

    #[test]
    fn repeated_job_id_is_rejected() {
        let fixture = Fixture::new(1_000_000).with_cities(&["c1001", "c1002"]);
        let plane_id = fixture
            .fleet()
            .purchase_plane("p1", "a0", "c1001")
            .expect("plane")
            .plane_id;
        let passenger_jobs = fixture.jobs_of_type("c1001", JobType::Passenger);
        assert!(passenger_jobs.len() >= 4);

        let mut batch = vec![passenger_jobs[0].clone()];
        batch.extend(passenger_jobs[..4].iter().cloned());
        assert!(matches!(
            fixture.fleet().load_jobs("p1", &plane_id, &batch, NOW + 1),
            Err(EngineError::InvalidJobId(id)) if id == passenger_jobs[0]
        ));

        let player = Ledger::new(&fixture.store).player("p1").expect("exists");
        assert!(player.planes[&plane_id].loaded_jobs.is_empty());
        assert_eq!(player.cities["c1001"].jobs.len(), 30);
    }

    #[test]
    fn type_mismatch_rejects_whole_batch() {
        let fixture = Fixture::new(1_000_000).with_cities(&["c1001", "c1002"]);
        let plane_id = fixture
            .fleet()
            .purchase_plane("p1", "a0", "c1001")
            .expect("plane")
            .plane_id;
        let mut batch = fixture.jobs_of_type("c1001", JobType::Passenger)[..2].to_vec();
        batch.push(fixture.jobs_of_type("c1001", JobType::Cargo)[0].clone());

        assert!(matches!(
            fixture.fleet().load_jobs("p1", &plane_id, &batch, NOW + 1),
            Err(EngineError::TypeMismatch {
                expected: JobType::Passenger,
                found: JobType::Cargo,
                ..
            })
        ));
        let player = Ledger::new(&fixture.store).player("p1").expect("exists");
        assert!(player.planes[&plane_id].loaded_jobs.is_empty());
        assert_eq!(player.cities["c1001"].jobs.len(), 30);
    }

    #[test]
    fn unknown_job_or_plane_or_expired_board_fail() {
        let fixture = Fixture::new(1_000_000).with_cities(&["c1001", "c1002"]);
        let plane_id = fixture
            .fleet()
            .purchase_plane("p1", "a1", "c1001")
            .expect("plane")
            .plane_id;
        let cargo = fixture.jobs_of_type("c1001", JobType::Cargo);
        let fleet = fixture.fleet();

        assert!(matches!(
            fleet.load_jobs("p1", "nope", &cargo[..1], NOW + 1),
            Err(EngineError::InvalidPlane(_))
        ));
        assert!(matches!(
            fleet.load_jobs("p1", &plane_id, &["bogus".to_string()], NOW + 1),
            Err(EngineError::InvalidJobId(_))
        ));
        assert!(matches!(
            fleet.load_jobs("p1", &plane_id, &cargo[..1], NOW + 240),
            Err(EngineError::JobsExpired(_))
        ));
        assert!(matches!(
            fleet.load_jobs("p1", &plane_id, &[], NOW + 1),
            Err(EngineError::NoJobsSpecified)
        ));
    }

    #[test]
    fn repeated_loads_never_exceed_capacity() {
        let fixture = Fixture::new(1_000_000).with_cities(&["c1001", "c1002"]);
        let plane_id = fixture
            .fleet()
            .purchase_plane("p1", "a1", "c1001")
            .expect("plane")
            .plane_id;
        let cargo = fixture.jobs_of_type("c1001", JobType::Cargo);
        let fleet = fixture.fleet();

        for id in &cargo {
            let _ = fleet.load_jobs("p1", &plane_id, std::slice::from_ref(id), NOW + 1);
        }
        let player = Ledger::new(&fixture.store).player("p1").expect("exists");
        assert_eq!(player.planes[&plane_id].loaded_jobs.len(), 4);
    }
}
