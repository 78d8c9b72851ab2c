//! Per-city job boards: generation, caching within the validity window, removal.

use std::collections::BTreeMap;

use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    config::JobBoardSettings,
    error::{EngineError, EngineResult},
    models::{Job, JobType},
    rng::{random_id, GameRng},
    store::{Condition, Field, Keys, Mutation, PlayerStore},
};

/// A city's board as served to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    /// Jobs keyed by id.
    pub jobs: BTreeMap<String, Job>,
    /// Unix seconds at which the board is regenerated.
    pub jobs_expire: i64,
}

/// Generate `count` jobs leaving `origin_city_id` for one of `destinations`.
///
/// Returns an empty board when `destinations` is empty.
pub fn generate_jobs<R: Rng + ?Sized>(
    rng: &mut R,
    origin_city_id: &str,
    destinations: &[&str],
    count: usize,
    revenue: u64,
) -> BTreeMap<String, Job> {
    let mut jobs = BTreeMap::new();
    if destinations.is_empty() {
        return jobs;
    }
    while jobs.len() < count {
        let Some(destination) = destinations.choose(rng) else {
            break;
        };
        let job_type = if rng.gen_bool(0.5) {
            JobType::Passenger
        } else {
            JobType::Cargo
        };
        let id = random_id(rng);
        if jobs.contains_key(&id) {
            continue;
        }
        jobs.insert(
            id.clone(),
            Job {
                id,
                origin_city_id: origin_city_id.to_string(),
                destination_city_id: destination.to_string(),
                revenue,
                job_type,
            },
        );
    }
    jobs
}

/// Job board operations over a [`PlayerStore`].
pub struct JobBoard<'a, S: ?Sized> {
    store: &'a S,
    rng: &'a GameRng,
    settings: &'a JobBoardSettings,
}

impl<'a, S: PlayerStore + ?Sized> JobBoard<'a, S> {
    /// View over `store` drawing randomness from `rng`.
    pub fn new(store: &'a S, rng: &'a GameRng, settings: &'a JobBoardSettings) -> Self {
        Self {
            store,
            rng,
            settings,
        }
    }

    /// Serve the cached board while it is live, otherwise replace it wholesale.
    ///
    /// Two callers racing past expiry both regenerate; the last write wins.
    pub fn get_or_generate(
        &self,
        player_id: &str,
        city_id: &str,
        now: i64,
    ) -> EngineResult<BoardSnapshot> {
        let player = self
            .store
            .get(player_id)?
            .ok_or_else(|| EngineError::PlayerNotFound(player_id.to_string()))?;
        let city = player
            .cities
            .get(city_id)
            .ok_or_else(|| EngineError::CityNotOwned(city_id.to_string()))?;

        if city.board_is_live(now) {
            debug!(player_id, city_id, expires = city.jobs_expire, "serving cached board");
            return Ok(BoardSnapshot {
                jobs: city.jobs.clone(),
                jobs_expire: city.jobs_expire,
            });
        }

        let destinations: Vec<&str> = player
            .cities
            .keys()
            .map(String::as_str)
            .filter(|id| *id != city_id)
            .collect();
        if destinations.is_empty() {
            return Err(EngineError::NotEnoughCities);
        }

        let jobs = self.rng.with(|rng| {
            generate_jobs(
                rng,
                city_id,
                &destinations,
                self.settings.count,
                self.settings.revenue,
            )
        });
        let jobs_expire = now + self.settings.window_secs;

        self.store.update(
            player_id,
            &[Condition::CityOwned(city_id.to_string())],
            &[Mutation::SetField(Field::JobBoard {
                city_id: city_id.to_string(),
                jobs: jobs.clone(),
                jobs_expire,
            })],
        )?;
        info!(player_id, city_id, jobs = jobs.len(), jobs_expire, "job board refreshed");

        Ok(BoardSnapshot { jobs, jobs_expire })
    }

    /// Delete `job_ids` from the city's board; all or nothing.
    pub fn remove(&self, player_id: &str, city_id: &str, job_ids: &[String]) -> EngineResult<()> {
        if job_ids.is_empty() {
            return Err(EngineError::NoJobsSpecified);
        }
        let player = self
            .store
            .get(player_id)?
            .ok_or_else(|| EngineError::PlayerNotFound(player_id.to_string()))?;
        let city = player
            .cities
            .get(city_id)
            .ok_or_else(|| EngineError::CityNotOwned(city_id.to_string()))?;
        if let Some(missing) = job_ids.iter().find(|id| !city.jobs.contains_key(*id)) {
            return Err(EngineError::InvalidJobId(missing.clone()));
        }

        let mut unique = job_ids.to_vec();
        unique.sort();
        unique.dedup();
        self.store.update(
            player_id,
            &[Condition::JobsOnBoard {
                city_id: city_id.to_string(),
                job_ids: unique.clone(),
            }],
            &[Mutation::RemoveKeys(Keys::BoardJobs {
                city_id: city_id.to_string(),
                job_ids: unique,
            })],
        )?;
        debug!(player_id, city_id, removed = job_ids.len(), "jobs removed from board");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::{ledger::Ledger, store::MemoryStore};

    const NOW: i64 = 1_700_000_000;

    fn setup(cities: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        let ledger = Ledger::new(&store);
        ledger.create_player("p1", 1_000_000).expect("create");
        for city_id in cities {
            ledger.purchase_city("p1", city_id).expect("buy city");
        }
        store
    }

    #[test]
    fn generation_uses_other_cities_and_both_types() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let jobs = generate_jobs(&mut rng, "c1001", &["c1002", "c1003", "c1004"], 30, 1000);
        assert_eq!(jobs.len(), 30);
        assert!(jobs.values().all(|job| job.origin_city_id == "c1001"));
        assert!(jobs.values().all(|job| job.destination_city_id != "c1001"));
        assert!(jobs.values().all(|job| job.revenue == 1000));

        let passengers = jobs
            .values()
            .filter(|job| job.job_type == JobType::Passenger)
            .count();
        assert!(passengers > 5, "passengers {passengers}");
        assert!(30 - passengers > 5, "cargo {}", 30 - passengers);
    }

    #[test]
    fn same_seed_yields_same_board() {
        let a = generate_jobs(&mut ChaCha8Rng::seed_from_u64(9), "c1001", &["c1002"], 10, 5);
        let b = generate_jobs(&mut ChaCha8Rng::seed_from_u64(9), "c1001", &["c1002"], 10, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn board_is_cached_within_window() {
        let store = setup(&["c1001", "c1002"]);
        let rng = GameRng::from_seed_u64(3);
        let settings = JobBoardSettings::default();
        let board = JobBoard::new(&store, &rng, &settings);

        let first = board.get_or_generate("p1", "c1001", NOW).expect("generate");
        assert_eq!(first.jobs.len(), 30);
        assert_eq!(first.jobs_expire, NOW + 240);

        let second = board
            .get_or_generate("p1", "c1001", NOW + 239)
            .expect("cached");
        assert_eq!(first, second);

        let third = board
            .get_or_generate("p1", "c1001", NOW + 240)
            .expect("regenerated");
        assert_eq!(third.jobs_expire, NOW + 480);
        assert!(third.jobs.keys().all(|id| !first.jobs.contains_key(id)));
    }

    #[test]
    fn single_city_cannot_generate() {
        let store = setup(&["c1001"]);
        let rng = GameRng::from_seed_u64(3);
        let settings = JobBoardSettings::default();
        let result = JobBoard::new(&store, &rng, &settings).get_or_generate("p1", "c1001", NOW);
        assert!(matches!(result, Err(EngineError::NotEnoughCities)));
    }

    #[test]
    fn unowned_city_is_rejected() {
        let store = setup(&["c1001", "c1002"]);
        let rng = GameRng::from_seed_u64(3);
        let settings = JobBoardSettings::default();
        let result = JobBoard::new(&store, &rng, &settings).get_or_generate("p1", "c1003", NOW);
        assert!(matches!(result, Err(EngineError::CityNotOwned(_))));
    }

    #[test]
    fn remove_deletes_only_named_jobs() {
        let store = setup(&["c1001", "c1002", "c1003"]);
        let rng = GameRng::from_seed_u64(5);
        let settings = JobBoardSettings::default();
        let board = JobBoard::new(&store, &rng, &settings);
        let snapshot = board.get_or_generate("p1", "c1001", NOW).expect("generate");
        let doomed: Vec<String> = snapshot.jobs.keys().take(3).cloned().collect();

        board.remove("p1", "c1001", &doomed).expect("remove");
        let after = board.get_or_generate("p1", "c1001", NOW + 1).expect("cached");
        assert_eq!(after.jobs.len(), 27);
        assert!(doomed.iter().all(|id| !after.jobs.contains_key(id)));
    }

    #[test]
    fn remove_with_unknown_id_changes_nothing() {
        let store = setup(&["c1001", "c1002"]);
        let rng = GameRng::from_seed_u64(5);
        let settings = JobBoardSettings::default();
        let board = JobBoard::new(&store, &rng, &settings);
        let snapshot = board.get_or_generate("p1", "c1001", NOW).expect("generate");
        let mut ids: Vec<String> = snapshot.jobs.keys().take(2).cloned().collect();
        ids.push("bogus".to_string());

        assert!(matches!(
            board.remove("p1", "c1001", &ids),
            Err(EngineError::InvalidJobId(id)) if id == "bogus"
        ));
        assert!(matches!(
            board.remove("p1", "c1001", &[]),
            Err(EngineError::NoJobsSpecified)
        ));
        let after = board.get_or_generate("p1", "c1001", NOW + 1).expect("cached");
        assert_eq!(after.jobs.len(), 30);
    }
}
