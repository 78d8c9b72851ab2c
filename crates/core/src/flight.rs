//! Flight dispatch and arrival settlement.
//!
//! A plane is either grounded (`eta == 0`, no destination) or in flight
//! (`eta > 0`, destination set). Departure moves it into flight; arrival
//! credits the jobs delivered to the destination and grounds it there.

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    catalog,
    error::{EngineError, EngineResult},
    fleet::plan_load,
    geo::{flight_seconds, great_circle_distance_km},
    models::{Job, Player},
    store::{Condition, Field, Keys, Mutation, PlayerStore},
};

/// Outcome of a successful arrival.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    /// Revenue credited by this arrival.
    pub credited: u64,
    /// Balance after the credit.
    pub balance: u64,
    /// Jobs delivered and removed from the hold.
    pub completed: Vec<Job>,
}

struct DeparturePlan {
    conditions: Vec<Condition>,
    mutations: Vec<Mutation>,
    eta: i64,
    distance_km: f64,
}

fn plan_departure(
    player: &Player,
    plane_id: &str,
    destination_city_id: &str,
    now: i64,
    eta_override: Option<i64>,
) -> EngineResult<DeparturePlan> {
    let plane = player
        .planes
        .get(plane_id)
        .ok_or_else(|| EngineError::InvalidPlane(plane_id.to_string()))?;
    if !plane.is_grounded() {
        return Err(EngineError::AlreadyInFlight(plane_id.to_string()));
    }
    if destination_city_id.is_empty() {
        return Err(EngineError::MissingField("destination_city_id"));
    }
    if plane.current_city_id == destination_city_id {
        return Err(EngineError::SameCity(destination_city_id.to_string()));
    }
    let origin = catalog::city(&plane.current_city_id)
        .ok_or_else(|| EngineError::UnknownCity(plane.current_city_id.clone()))?;
    let destination = catalog::city(destination_city_id)
        .ok_or_else(|| EngineError::UnknownCity(destination_city_id.to_string()))?;

    let distance_km = great_circle_distance_km(origin.coordinates, destination.coordinates);
    if distance_km > f64::from(plane.flight_range) {
        return Err(EngineError::OutOfRange {
            distance_km,
            range_km: plane.flight_range,
        });
    }

    let eta = eta_override
        .unwrap_or_else(|| now.saturating_add(flight_seconds(distance_km, plane.speed)))
        .max(1);

    Ok(DeparturePlan {
        conditions: vec![
            Condition::PlaneGrounded(plane_id.to_string()),
            Condition::PlaneAt {
                plane_id: plane_id.to_string(),
                city_id: plane.current_city_id.clone(),
            },
        ],
        mutations: vec![Mutation::SetField(Field::PlaneFlight {
            plane_id: plane_id.to_string(),
            destination_city_id: Some(destination_city_id.to_string()),
            eta,
        })],
        eta,
        distance_km,
    })
}

/// Require at least one job bound for `destination_city_id`, either already
/// in the hold or among `incoming`. Arrival settles only delivered jobs, so a
/// flight without one would never land.
///
/// When the hold already carries a match, the returned condition pins it until
/// the departure commits.
fn require_deliverable(
    player: &Player,
    plane_id: &str,
    destination_city_id: &str,
    incoming: &[Job],
) -> EngineResult<Option<Condition>> {
    let held: Vec<String> = player
        .planes
        .get(plane_id)
        .map(|plane| {
            plane
                .loaded_jobs
                .values()
                .filter(|job| job.destination_city_id == destination_city_id)
                .map(|job| job.id.clone())
                .collect()
        })
        .unwrap_or_default();
    if !held.is_empty() {
        return Ok(Some(Condition::JobsLoaded {
            plane_id: plane_id.to_string(),
            job_ids: held,
        }));
    }
    if incoming
        .iter()
        .any(|job| job.destination_city_id == destination_city_id)
    {
        return Ok(None);
    }
    Err(EngineError::NoJobsForDestination(
        destination_city_id.to_string(),
    ))
}

/// Departure and arrival over a [`PlayerStore`].
pub struct FlightScheduler<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: PlayerStore + ?Sized> FlightScheduler<'a, S> {
    /// View over `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn player(&self, player_id: &str) -> EngineResult<Player> {
        self.store
            .get(player_id)?
            .ok_or_else(|| EngineError::PlayerNotFound(player_id.to_string()))
    }

    /// Send a grounded plane towards `destination_city_id`; returns the ETA.
    ///
    /// `eta_override` replaces the computed arrival time, for replays and tests.
    pub fn depart(
        &self,
        player_id: &str,
        plane_id: &str,
        destination_city_id: &str,
        now: i64,
        eta_override: Option<i64>,
    ) -> EngineResult<i64> {
        let player = self.player(player_id)?;
        let plan = plan_departure(&player, plane_id, destination_city_id, now, eta_override)
            .and_then(|plan| {
                let held = require_deliverable(&player, plane_id, destination_city_id, &[])?;
                Ok(DeparturePlan {
                    conditions: plan.conditions.into_iter().chain(held).collect(),
                    ..plan
                })
            })
            .map_err(|err| {
                warn!(player_id, plane_id, %err, "departure rejected");
                err
            })?;
        self.store
            .update(player_id, &plan.conditions, &plan.mutations)?;
        info!(
            player_id,
            plane_id,
            destination = destination_city_id,
            distance_km = plan.distance_km,
            eta = plan.eta,
            "plane departed"
        );
        Ok(plan.eta)
    }

    /// Load `job_ids` from the current city and depart, as one commit.
    ///
    /// Range is checked before anything is written; an empty job list departs
    /// with the hold as it is. Either way something aboard must be bound for
    /// the destination.
    pub fn load_and_depart(
        &self,
        player_id: &str,
        plane_id: &str,
        job_ids: &[String],
        destination_city_id: &str,
        now: i64,
    ) -> EngineResult<i64> {
        let player = self.player(player_id)?;
        let departure = plan_departure(&player, plane_id, destination_city_id, now, None)
            .map_err(|err| {
                warn!(player_id, plane_id, %err, "departure rejected");
                err
            })?;

        let mut conditions = departure.conditions;
        let mut mutations = Vec::new();
        let mut incoming = Vec::new();
        if !job_ids.is_empty() {
            let load = plan_load(&player, plane_id, job_ids, now).map_err(|err| {
                warn!(player_id, plane_id, %err, "load rejected");
                err
            })?;
            conditions.extend(load.conditions);
            mutations.extend(load.mutations);
            incoming = load.jobs;
        }
        let held = require_deliverable(&player, plane_id, destination_city_id, &incoming)
            .map_err(|err| {
                warn!(player_id, plane_id, %err, "departure rejected");
                err
            })?;
        conditions.extend(held);
        mutations.extend(departure.mutations);
        let loaded = incoming.len();

        self.store.update(player_id, &conditions, &mutations)?;
        info!(
            player_id,
            plane_id,
            loaded,
            destination = destination_city_id,
            eta = departure.eta,
            "plane loaded and departed"
        );
        Ok(departure.eta)
    }

    /// Settle an arrived flight: credit delivered jobs and ground the plane.
    pub fn handle_arrival(
        &self,
        player_id: &str,
        plane_id: &str,
        now: i64,
    ) -> EngineResult<Settlement> {
        let player = self.player(player_id)?;
        let plane = player
            .planes
            .get(plane_id)
            .ok_or_else(|| EngineError::InvalidPlane(plane_id.to_string()))?;

        let destination = match (&plane.destination_city_id, plane.eta) {
            (Some(destination), eta) if eta > 0 => destination.clone(),
            _ => return Err(EngineError::NotDeparted(plane_id.to_string())),
        };
        if now < plane.eta {
            return Err(EngineError::NotYetArrived {
                eta: plane.eta,
                now,
            });
        }

        let completed: Vec<Job> = plane
            .loaded_jobs
            .values()
            .filter(|job| job.destination_city_id == destination)
            .cloned()
            .collect();
        if completed.is_empty() {
            warn!(player_id, plane_id, %destination, "arrival with no deliverable jobs");
            return Err(EngineError::NoCompletedJobs);
        }

        let credited: u64 = completed.iter().map(|job| job.revenue).sum();
        let credit = i64::try_from(credited).map_err(|_| EngineError::Conflict)?;
        let job_ids: Vec<String> = completed.iter().map(|job| job.id.clone()).collect();

        let conditions = [
            Condition::PlaneInFlight {
                plane_id: plane_id.to_string(),
                destination_city_id: destination.clone(),
                eta: plane.eta,
            },
            Condition::JobsLoaded {
                plane_id: plane_id.to_string(),
                job_ids: job_ids.clone(),
            },
        ];
        let mutations = [
            Mutation::AddToBalance(credit),
            Mutation::RemoveKeys(Keys::LoadedJobs {
                plane_id: plane_id.to_string(),
                job_ids,
            }),
            Mutation::SetField(Field::PlaneLocation {
                plane_id: plane_id.to_string(),
                city_id: destination.clone(),
            }),
            Mutation::SetField(Field::PlaneFlight {
                plane_id: plane_id.to_string(),
                destination_city_id: None,
                eta: 0,
            }),
        ];

        let updated = self.store.update(player_id, &conditions, &mutations)?;
        info!(
            player_id,
            plane_id,
            city_id = %destination,
            credited,
            balance = updated.balance,
            "flight settled"
        );
        Ok(Settlement {
            credited,
            balance: updated.balance,
            completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::JobBoardSettings,
        fleet::Fleet,
        jobs::JobBoard,
        ledger::Ledger,
        models::JobType,
        rng::GameRng,
        store::MemoryStore,
    };

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        store: MemoryStore,
        rng: GameRng,
        settings: JobBoardSettings,
        plane_id: String,
    }

    fn fixture(plane_model: &str) -> Fixture {
        let store = MemoryStore::new();
        let ledger = Ledger::new(&store);
        ledger.create_player("p1", 1_000_000).expect("create");
        for city_id in ["c1001", "c1002", "c1003"] {
            ledger.purchase_city("p1", city_id).expect("buy city");
        }
        let rng = GameRng::from_seed_u64(21);
        let plane_id = Fleet::new(&store, &rng)
            .purchase_plane("p1", plane_model, "c1001")
            .expect("plane")
            .plane_id;
        Fixture {
            store,
            rng,
            settings: JobBoardSettings::default(),
            plane_id,
        }
    }

    impl Fixture {
        fn scheduler(&self) -> FlightScheduler<'_, MemoryStore> {
            FlightScheduler::new(&self.store)
        }

        fn player(&self) -> Player {
            Ledger::new(&self.store).player("p1").expect("exists")
        }

        fn board_jobs(&self, job_type: JobType) -> Vec<Job> {
            JobBoard::new(&self.store, &self.rng, &self.settings)
                .get_or_generate("p1", "c1001", NOW)
                .expect("board")
                .jobs
                .into_values()
                .filter(|job| job.job_type == job_type)
                .collect()
        }

        /// Load up to four jobs with at least one bound for `destination`.
        fn load_mixed(&self, destination: &str) -> Vec<Job> {
            let jobs = self.board_jobs(JobType::Passenger);
            let mut chosen: Vec<Job> = jobs
                .iter()
                .filter(|job| job.destination_city_id == destination)
                .take(2)
                .cloned()
                .collect();
            chosen.extend(
                jobs.iter()
                    .filter(|job| job.destination_city_id != destination)
                    .take(2)
                    .cloned(),
            );
            let ids: Vec<String> = chosen.iter().map(|job| job.id.clone()).collect();
            Fleet::new(&self.store, &self.rng)
                .load_jobs("p1", &self.plane_id, &ids, NOW + 1)
                .expect("load");
            chosen
        }
    }

    #[test]
    fn departure_computes_eta_from_distance_and_speed() {
        let fx = fixture("a0");
        fx.load_mixed("c1003");
        let eta = fx
            .scheduler()
            .depart("p1", &fx.plane_id, "c1003", NOW, None)
            .expect("detroit is in range");

        let chicago = catalog::city("c1001").map(|c| c.coordinates);
        let detroit = catalog::city("c1003").map(|c| c.coordinates);
        let distance = great_circle_distance_km(
            chicago.expect("chicago"),
            detroit.expect("detroit"),
        );
        assert_eq!(eta, NOW + (distance / 300.0 * 3600.0).ceil() as i64);

        let plane = &fx.player().planes[&fx.plane_id];
        assert_eq!(plane.destination_city_id.as_deref(), Some("c1003"));
        assert_eq!(plane.eta, eta);
    }

    #[test]
    fn out_of_range_departure_leaves_plane_grounded() {
        let fx = fixture("a0");
        let result = fx
            .scheduler()
            .depart("p1", &fx.plane_id, "c1010", NOW, None);
        assert!(matches!(result, Err(EngineError::OutOfRange { range_km: 1500, .. })));
        assert!(fx.player().planes[&fx.plane_id].is_grounded());
    }

    #[test]
    fn departure_requires_grounded_plane_and_new_city() {
        let fx = fixture("a0");
        let scheduler = fx.scheduler();
        assert!(matches!(
            scheduler.depart("p1", &fx.plane_id, "c1001", NOW, None),
            Err(EngineError::SameCity(_))
        ));
        fx.load_mixed("c1002");
        scheduler
            .depart("p1", &fx.plane_id, "c1002", NOW, Some(NOW + 10))
            .expect("first departure");
        assert!(matches!(
            scheduler.depart("p1", &fx.plane_id, "c1003", NOW, None),
            Err(EngineError::AlreadyInFlight(_))
        ));
        assert!(matches!(
            scheduler.depart("p1", "missing", "c1003", NOW, None),
            Err(EngineError::InvalidPlane(_))
        ));
    }

    #[test]
    fn arrival_before_departure_or_eta_changes_nothing() {
        let fx = fixture("a0");
        let scheduler = fx.scheduler();
        assert!(matches!(
            scheduler.handle_arrival("p1", &fx.plane_id, NOW),
            Err(EngineError::NotDeparted(_))
        ));

        fx.load_mixed("c1002");
        scheduler
            .depart("p1", &fx.plane_id, "c1002", NOW + 1, Some(NOW + 100))
            .expect("depart");
        let before = fx.player();
        assert!(matches!(
            scheduler.handle_arrival("p1", &fx.plane_id, NOW + 99),
            Err(EngineError::NotYetArrived { eta, .. }) if eta == NOW + 100
        ));
        assert_eq!(fx.player(), before);
    }

    #[test]
    fn arrival_credits_delivered_jobs_and_keeps_the_rest() {
        let fx = fixture("a0");
        let loaded = fx.load_mixed("c1002");
        let delivered: Vec<&Job> = loaded
            .iter()
            .filter(|job| job.destination_city_id == "c1002")
            .collect();
        assert!(!delivered.is_empty());
        let expected: u64 = delivered.iter().map(|job| job.revenue).sum();

        let scheduler = fx.scheduler();
        scheduler
            .depart("p1", &fx.plane_id, "c1002", NOW + 1, Some(NOW + 50))
            .expect("depart");
        let before = fx.player().balance;

        let settlement = scheduler
            .handle_arrival("p1", &fx.plane_id, NOW + 50)
            .expect("arrived");
        assert_eq!(settlement.credited, expected);
        assert_eq!(settlement.balance, before + expected);
        assert_eq!(settlement.completed.len(), delivered.len());

        let plane = &fx.player().planes[&fx.plane_id];
        assert!(plane.is_grounded());
        assert_eq!(plane.current_city_id, "c1002");
        assert_eq!(plane.loaded_jobs.len(), loaded.len() - delivered.len());
        assert!(plane
            .loaded_jobs
            .values()
            .all(|job| job.destination_city_id != "c1002"));
    }

    #[test]
    fn departure_without_jobs_for_destination_is_rejected() {
        let fx = fixture("a0");
        let scheduler = fx.scheduler();
        let before = fx.player();
        assert!(matches!(
            scheduler.depart("p1", &fx.plane_id, "c1002", NOW, None),
            Err(EngineError::NoJobsForDestination(city)) if city == "c1002"
        ));
        assert_eq!(fx.player(), before);

        let elsewhere: Vec<String> = fx
            .board_jobs(JobType::Passenger)
            .into_iter()
            .filter(|job| job.destination_city_id == "c1003")
            .take(2)
            .map(|job| job.id)
            .collect();
        assert!(!elsewhere.is_empty());
        assert!(matches!(
            scheduler.load_and_depart("p1", &fx.plane_id, &elsewhere, "c1002", NOW + 1),
            Err(EngineError::NoJobsForDestination(_))
        ));
        let player = fx.player();
        assert!(player.planes[&fx.plane_id].is_grounded());
        assert!(player.planes[&fx.plane_id].loaded_jobs.is_empty());
        assert!(elsewhere
            .iter()
            .all(|id| player.cities["c1001"].jobs.contains_key(id)));
    }

    #[test]
    fn every_departure_can_be_settled() {
        let fx = fixture("a0");
        let scheduler = fx.scheduler();
        fx.load_mixed("c1002");
        let eta = scheduler
            .depart("p1", &fx.plane_id, "c1002", NOW + 1, Some(NOW + 5))
            .expect("depart");
        scheduler
            .handle_arrival("p1", &fx.plane_id, eta)
            .expect("settled");

        let plane = &fx.player().planes[&fx.plane_id];
        assert!(plane.is_grounded());
        assert!(plane
            .loaded_jobs
            .values()
            .all(|job| job.destination_city_id == "c1003"));
        assert!(matches!(
            scheduler.depart("p1", &fx.plane_id, "c1001", NOW + 10, None),
            Err(EngineError::NoJobsForDestination(_))
        ));
        scheduler
            .depart("p1", &fx.plane_id, "c1003", NOW + 10, Some(NOW + 20))
            .expect("leftover jobs fly on");
        assert!(scheduler.handle_arrival("p1", &fx.plane_id, NOW + 20).is_ok());
    }

    #[test]
    fn load_and_depart_commits_both_or_neither() {
        let fx = fixture("a0");
        let mut jobs = fx.board_jobs(JobType::Passenger);
        jobs.sort_by_key(|job| job.destination_city_id != "c1002");
        let ids: Vec<String> = jobs.iter().take(3).map(|job| job.id.clone()).collect();

        let far = fx
            .scheduler()
            .load_and_depart("p1", &fx.plane_id, &ids, "c1010", NOW + 1);
        assert!(matches!(far, Err(EngineError::OutOfRange { .. })));
        let player = fx.player();
        assert!(player.planes[&fx.plane_id].loaded_jobs.is_empty());
        assert!(ids.iter().all(|id| player.cities["c1001"].jobs.contains_key(id)));

        let eta = fx
            .scheduler()
            .load_and_depart("p1", &fx.plane_id, &ids, "c1002", NOW + 1)
            .expect("in range");
        let player = fx.player();
        let plane = &player.planes[&fx.plane_id];
        assert_eq!(plane.eta, eta);
        assert_eq!(plane.loaded_jobs.len(), 3);
        assert!(ids.iter().all(|id| !player.cities["c1001"].jobs.contains_key(id)));
    }
}
