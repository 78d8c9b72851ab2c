//! Facade binding the engine components to one store, clock and RNG.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    clock::{Clock, SystemClock},
    config::{AppConfig, JobBoardSettings},
    error::{EngineError, EngineResult},
    fleet::{Fleet, PlanePurchase},
    flight::{FlightScheduler, Settlement},
    jobs::{BoardSnapshot, JobBoard},
    ledger::Ledger,
    models::{CityState, PlaneState, Player},
    rng::GameRng,
    store::PlayerStore,
};

/// Entry point for every player-facing operation.
pub struct Airline<S> {
    store: S,
    clock: Arc<dyn Clock>,
    rng: GameRng,
    jobs: JobBoardSettings,
    starting_balance: u64,
}

impl<S: PlayerStore> Airline<S> {
    /// Wall clock, seed and settings taken from `config`.
    pub fn from_config(store: S, config: &AppConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            rng: GameRng::from_optional_seed(config.rng_seed),
            jobs: config.jobs.clone(),
            starting_balance: config.starting_balance,
        }
    }

    /// Fully injected constructor.
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        rng: GameRng,
        jobs: JobBoardSettings,
        starting_balance: u64,
    ) -> Self {
        Self {
            store,
            clock,
            rng,
            jobs,
            starting_balance,
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Balance given to newly created players.
    pub fn starting_balance(&self) -> u64 {
        self.starting_balance
    }

    /// Balance and purchase operations.
    pub fn ledger(&self) -> Ledger<'_, S> {
        Ledger::new(&self.store)
    }

    /// Job board operations.
    pub fn job_board(&self) -> JobBoard<'_, S> {
        JobBoard::new(&self.store, &self.rng, &self.jobs)
    }

    /// Plane operations.
    pub fn fleet(&self) -> Fleet<'_, S> {
        Fleet::new(&self.store, &self.rng)
    }

    /// Flight operations.
    pub fn flights(&self) -> FlightScheduler<'_, S> {
        FlightScheduler::new(&self.store)
    }

    /// Create `player_id` with the configured starting balance.
    pub fn create_player(&self, player_id: &str) -> EngineResult<u64> {
        self.ledger()
            .create_player(player_id, self.starting_balance)?;
        Ok(self.starting_balance)
    }

    /// Full aggregate for `player_id`.
    pub fn player(&self, player_id: &str) -> EngineResult<Player> {
        self.ledger().player(player_id)
    }

    /// Cities owned by `player_id`.
    pub fn cities(&self, player_id: &str) -> EngineResult<BTreeMap<String, CityState>> {
        Ok(self.player(player_id)?.cities)
    }

    /// Planes owned by `player_id`.
    pub fn planes(&self, player_id: &str) -> EngineResult<BTreeMap<String, PlaneState>> {
        Ok(self.player(player_id)?.planes)
    }

    /// Buy a catalog city.
    pub fn purchase_city(&self, player_id: &str, city_id: &str) -> EngineResult<u64> {
        self.ledger().purchase_city(player_id, city_id)
    }

    /// Buy a catalog plane parked at an owned city.
    pub fn purchase_plane(
        &self,
        player_id: &str,
        plane_def_id: &str,
        city_id: &str,
    ) -> EngineResult<PlanePurchase> {
        self.fleet().purchase_plane(player_id, plane_def_id, city_id)
    }

    /// Current job board of an owned city, regenerated when stale.
    pub fn city_jobs(&self, player_id: &str, city_id: &str) -> EngineResult<BoardSnapshot> {
        self.job_board()
            .get_or_generate(player_id, city_id, self.now())
    }

    /// Load jobs into a grounded plane from its current city.
    pub fn load_jobs(
        &self,
        player_id: &str,
        plane_id: &str,
        job_ids: &[String],
    ) -> EngineResult<PlaneState> {
        self.fleet()
            .load_jobs(player_id, plane_id, job_ids, self.now())
    }

    /// Depart a grounded plane.
    pub fn depart(
        &self,
        player_id: &str,
        plane_id: &str,
        destination_city_id: &str,
    ) -> EngineResult<i64> {
        self.flights()
            .depart(player_id, plane_id, destination_city_id, self.now(), None)
    }

    /// Load and depart in one commit.
    pub fn load_and_depart(
        &self,
        player_id: &str,
        plane_id: &str,
        job_ids: &[String],
        destination_city_id: &str,
    ) -> EngineResult<i64> {
        self.flights().load_and_depart(
            player_id,
            plane_id,
            job_ids,
            destination_city_id,
            self.now(),
        )
    }

    /// Settle an arrived plane.
    pub fn arrive(&self, player_id: &str, plane_id: &str) -> EngineResult<Settlement> {
        self.flights()
            .handle_arrival(player_id, plane_id, self.now())
    }

    /// Settle every plane of `player_id` whose ETA has passed.
    ///
    /// Planes with nothing to deliver stay in flight and are skipped.
    pub fn settle_due(&self, player_id: &str) -> EngineResult<Vec<(String, Settlement)>> {
        let now = self.now();
        let due: Vec<String> = self
            .planes(player_id)?
            .into_iter()
            .filter(|(_, plane)| plane.eta > 0 && plane.eta <= now)
            .map(|(plane_id, _)| plane_id)
            .collect();

        let mut settled = Vec::new();
        for plane_id in due {
            match self.flights().handle_arrival(player_id, &plane_id, now) {
                Ok(settlement) => settled.push((plane_id, settlement)),
                Err(EngineError::NoCompletedJobs) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(settled)
    }
}
