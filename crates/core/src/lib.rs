#![warn(clippy::all, missing_docs)]

//! Core engine for the microair airline game.
//!
//! Players buy cities and planes from a static catalog, cities offer
//! time-limited job boards, and planes carry jobs between owned cities for
//! revenue. Every state change is a single conditional update against a
//! [`store::PlayerStore`], so concurrent requests cannot overdraw a balance or
//! double-assign a slot.

pub mod airline;
pub mod api;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod fleet;
pub mod flight;
pub mod geo;
pub mod jobs;
pub mod ledger;
pub mod models;
pub mod rng;
pub mod store;

pub use airline::Airline;
pub use api::{Api, ApiResponse};
pub use config::AppConfig;
pub use error::{EngineError, EngineResult, ErrorKind, StoreError};
pub use models::{CityState, Job, JobType, PlaneState, Player};
pub use store::{FileStore, MemoryStore, PlayerStore};
