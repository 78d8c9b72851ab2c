//! Error types for the persistence boundary and the engine operations.

use thiserror::Error;

use crate::models::JobType;

/// Failures reported by a [`PlayerStore`](crate::store::PlayerStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No aggregate is stored under the id.
    #[error("player {0} does not exist")]
    PlayerNotFound(String),
    /// `create` found an aggregate already stored under the id.
    #[error("player {0} already exists")]
    PlayerExists(String),
    /// A condition did not hold against the current value; nothing was applied.
    #[error("conditional update rejected for player {0}")]
    ConditionFailed(String),
    /// A mutation could not be applied without breaking an invariant.
    #[error("mutation rejected: {0}")]
    InvalidMutation(String),
    /// The backend itself failed (IO, encoding).
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A player, city, plane or job is absent.
    NotFound,
    /// Solvency or exclusivity rejected at the storage layer.
    Conflict,
    /// The request itself is invalid.
    Validation,
    /// The plane is not in the state the request requires.
    Precondition,
    /// The backend failed.
    Internal,
}

/// Every distinguishable reason an engine operation can fail.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No player record for the id.
    #[error("Player does not exist")]
    PlayerNotFound(String),
    /// A player record already exists for the id.
    #[error("Player \"{0}\" already exists")]
    PlayerExists(String),
    /// Requested city is not in the catalog.
    #[error("Requested city does not exist")]
    UnknownCity(String),
    /// Requested plane model is not in the catalog.
    #[error("Requested plane does not exist")]
    UnknownPlane(String),
    /// The player does not own the city.
    #[error("City {0} is not owned by the player")]
    CityNotOwned(String),
    /// The player does not own a plane with that id.
    #[error("Invalid plane id {0}")]
    InvalidPlane(String),
    /// The conditional mutation was rejected: insufficient funds, already
    /// owned, or state changed concurrently.
    #[error("Purchase failed")]
    Conflict,
    /// Job generation needs a second owned city as destination.
    #[error("At least two cities are required to generate jobs")]
    NotEnoughCities,
    /// The city's job board has expired.
    #[error("Jobs for city {0} have expired")]
    JobsExpired(String),
    /// A requested job is not on the city board.
    #[error("Invalid job id {0}")]
    InvalidJobId(String),
    /// An empty job list was supplied.
    #[error("No job ids were provided")]
    NoJobsSpecified,
    /// More jobs than free slots.
    #[error("Plane capacity exceeded: {requested} requested, {available} available")]
    CapacityExceeded {
        /// Jobs in the request.
        requested: usize,
        /// Free slots on the plane.
        available: usize,
    },
    /// Job type does not match the plane's capacity type.
    #[error("Job {job_id} is type {found}, plane carries {expected}")]
    TypeMismatch {
        /// Offending job.
        job_id: String,
        /// The plane's capacity type.
        expected: JobType,
        /// The job's type.
        found: JobType,
    },
    /// Destination is beyond the plane's range.
    #[error("Destination is {distance_km:.0} km away, range is {range_km} km")]
    OutOfRange {
        /// Great-circle distance of the leg.
        distance_km: f64,
        /// The plane's range.
        range_km: u32,
    },
    /// Departure requested for a plane already in the air.
    #[error("Plane {0} is already in flight")]
    AlreadyInFlight(String),
    /// Departure to the city the plane is parked at.
    #[error("Plane is already at city {0}")]
    SameCity(String),
    /// Departure with nothing in the hold bound for the destination.
    #[error("No loaded jobs are bound for city {0}")]
    NoJobsForDestination(String),
    /// Arrival requested for a grounded plane.
    #[error("Plane {0} has not departed")]
    NotDeparted(String),
    /// Arrival requested before the ETA.
    #[error("Plane has not arrived yet, eta {eta}")]
    NotYetArrived {
        /// Absolute arrival time.
        eta: i64,
        /// Time of the request.
        now: i64,
    },
    /// No loaded job ends at the arrival city.
    #[error("No jobs completed by this flight")]
    NoCompletedJobs,
    /// A required request field was absent.
    #[error("Field \"{0}\" is required")]
    MissingField(&'static str),
    /// Backend failure surfaced from the store.
    #[error("Storage failure: {0}")]
    Store(#[source] StoreError),
}

impl EngineError {
    /// Classify for transport mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::PlayerNotFound(_)
            | EngineError::CityNotOwned(_)
            | EngineError::InvalidPlane(_) => ErrorKind::NotFound,
            EngineError::PlayerExists(_) | EngineError::Conflict => ErrorKind::Conflict,
            EngineError::UnknownCity(_)
            | EngineError::UnknownPlane(_)
            | EngineError::NotEnoughCities
            | EngineError::JobsExpired(_)
            | EngineError::InvalidJobId(_)
            | EngineError::NoJobsSpecified
            | EngineError::CapacityExceeded { .. }
            | EngineError::TypeMismatch { .. }
            | EngineError::OutOfRange { .. }
            | EngineError::SameCity(_)
            | EngineError::NoJobsForDestination(_)
            | EngineError::MissingField(_) => ErrorKind::Validation,
            EngineError::AlreadyInFlight(_)
            | EngineError::NotDeparted(_)
            | EngineError::NotYetArrived { .. }
            | EngineError::NoCompletedJobs => ErrorKind::Precondition,
            EngineError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PlayerNotFound(id) => EngineError::PlayerNotFound(id),
            StoreError::PlayerExists(id) => EngineError::PlayerExists(id),
            StoreError::ConditionFailed(_) | StoreError::InvalidMutation(_) => {
                EngineError::Conflict
            }
            other @ StoreError::Backend(_) => EngineError::Store(other),
        }
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_collapse_to_one_class() {
        let rejected: EngineError = StoreError::ConditionFailed("p1".to_string()).into();
        assert!(matches!(rejected, EngineError::Conflict));
        assert_eq!(rejected.kind(), ErrorKind::Conflict);

        let invalid: EngineError = StoreError::InvalidMutation("overdraft".to_string()).into();
        assert!(matches!(invalid, EngineError::Conflict));
    }

    #[test]
    fn backend_failures_are_internal() {
        let err: EngineError = StoreError::Backend(anyhow::anyhow!("disk full")).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn arrival_errors_are_preconditions() {
        assert_eq!(
            EngineError::NotYetArrived { eta: 10, now: 5 }.kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            EngineError::NotDeparted("x".to_string()).kind(),
            ErrorKind::Precondition
        );
    }

    #[test]
    fn undeliverable_departure_is_a_validation_error() {
        let err = EngineError::NoJobsForDestination("c1002".to_string());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "No loaded jobs are bound for city c1002");
    }
}
