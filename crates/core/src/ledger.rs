//! Player balances and the atomic purchase primitive.

use tracing::{info, warn};

use crate::{
    catalog,
    error::{EngineError, EngineResult},
    models::{CityState, PlaneState, Player},
    store::{Condition, Entry, Mutation, PlayerStore},
};

/// Something a player can buy, already materialised into its stored form.
#[derive(Debug, Clone, PartialEq)]
pub enum Purchase {
    /// City keyed by its catalog id; the slot must be free.
    City(CityState),
    /// Plane under a freshly generated id.
    Plane {
        /// Id the plane will be stored under.
        plane_id: String,
        /// Initial plane record.
        plane: PlaneState,
    },
}

impl Purchase {
    fn into_parts(self) -> (Condition, Entry) {
        match self {
            Purchase::City(city) => (Condition::CityAbsent(city.city_id.clone()), Entry::City(city)),
            Purchase::Plane { plane_id, plane } => (
                Condition::PlaneAbsent(plane_id.clone()),
                Entry::Plane { plane_id, plane },
            ),
        }
    }
}

/// Balance bookkeeping over a [`PlayerStore`].
pub struct Ledger<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: PlayerStore + ?Sized> Ledger<'a, S> {
    /// View over `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create a player iff none exists under `player_id`.
    pub fn create_player(&self, player_id: &str, initial_balance: u64) -> EngineResult<()> {
        self.store
            .create(Player::new(player_id, initial_balance))
            .map_err(EngineError::from)?;
        info!(player_id, balance = initial_balance, "player created");
        Ok(())
    }

    /// Current aggregate.
    pub fn player(&self, player_id: &str) -> EngineResult<Player> {
        self.store
            .get(player_id)?
            .ok_or_else(|| EngineError::PlayerNotFound(player_id.to_string()))
    }

    /// Current balance.
    pub fn balance(&self, player_id: &str) -> EngineResult<u64> {
        Ok(self.player(player_id)?.balance)
    }

    /// Debit `cost` and store the purchased record in one conditional update.
    ///
    /// Insufficient funds and an occupied slot are reported alike as
    /// [`EngineError::Conflict`].
    pub fn purchase(&self, player_id: &str, cost: u64, purchase: Purchase) -> EngineResult<u64> {
        let debit = i64::try_from(cost).map_err(|_| EngineError::Conflict)?;
        let (slot_free, entry) = purchase.into_parts();
        let conditions = [Condition::BalanceAtLeast(cost), slot_free];
        let mutations = [Mutation::AddToBalance(-debit), Mutation::InsertEntry(entry)];

        match self.store.update(player_id, &conditions, &mutations) {
            Ok(player) => {
                info!(player_id, cost, balance = player.balance, "purchase committed");
                Ok(player.balance)
            }
            Err(err) => {
                warn!(player_id, cost, %err, "purchase rejected");
                Err(err.into())
            }
        }
    }

    /// Buy a catalog city.
    pub fn purchase_city(&self, player_id: &str, city_id: &str) -> EngineResult<u64> {
        let def =
            catalog::city(city_id).ok_or_else(|| EngineError::UnknownCity(city_id.to_string()))?;
        self.purchase(player_id, def.cost, Purchase::City(def.to_state()))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;
    use crate::store::MemoryStore;

    fn store_with(balance: u64) -> MemoryStore {
        let store = MemoryStore::new();
        Ledger::new(&store)
            .create_player("p1", balance)
            .expect("fresh player");
        store
    }

    #[test]
    fn city_purchase_debits_cost() {
        let store = store_with(11_000);
        let ledger = Ledger::new(&store);
        let balance = ledger.purchase_city("p1", "c1001").expect("affordable");
        assert_eq!(balance, 1_000);
        let player = ledger.player("p1").expect("exists");
        assert!(player.cities.contains_key("c1001"));
    }

    #[test]
    fn second_purchase_of_same_city_conflicts() {
        let store = store_with(50_000);
        let ledger = Ledger::new(&store);
        assert_eq!(ledger.purchase_city("p1", "c1001").ok(), Some(40_000));
        assert!(matches!(
            ledger.purchase_city("p1", "c1001"),
            Err(EngineError::Conflict)
        ));
        assert_eq!(ledger.balance("p1").ok(), Some(40_000));
    }

    #[test]
    fn insufficient_funds_conflicts_and_keeps_balance() {
        let store = store_with(1_000);
        let ledger = Ledger::new(&store);
        assert!(matches!(
            ledger.purchase_city("p1", "c1001"),
            Err(EngineError::Conflict)
        ));
        let player = ledger.player("p1").expect("exists");
        assert_eq!(player.balance, 1_000);
        assert!(player.cities.is_empty());
    }

    #[test]
    fn unknown_city_is_rejected_before_storage() {
        let store = store_with(1_000);
        assert!(matches!(
            Ledger::new(&store).purchase_city("p1", "c9999"),
            Err(EngineError::UnknownCity(_))
        ));
    }

    #[test]
    fn duplicate_player_is_reported() {
        let store = store_with(10);
        assert!(matches!(
            Ledger::new(&store).create_player("p1", 10),
            Err(EngineError::PlayerExists(_))
        ));
    }

    #[test]
    fn missing_player_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            Ledger::new(&store).balance("ghost"),
            Err(EngineError::PlayerNotFound(_))
        ));
    }

    #[test]
    fn concurrent_purchases_of_one_city_admit_one_winner() {
        let store = Arc::new(store_with(1_000_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || Ledger::new(store.as_ref()).purchase_city("p1", "c1001"))
            })
            .collect();

        let wins = handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .filter(|result| result.is_ok())
            .count();
        assert_eq!(wins, 1);
        assert_eq!(
            Ledger::new(store.as_ref()).balance("p1").ok(),
            Some(1_000_000 - 10_000)
        );
    }

    #[test]
    fn concurrent_purchases_never_overdraw() {
        let store = Arc::new(store_with(25_000));
        let handles: Vec<_> = ["c1001", "c1007", "c1008", "c1009"]
            .into_iter()
            .map(|city_id| {
                let store = Arc::clone(&store);
                thread::spawn(move || Ledger::new(store.as_ref()).purchase_city("p1", city_id))
            })
            .collect();
        for handle in handles {
            let _ = handle.join();
        }

        let player = Ledger::new(store.as_ref()).player("p1").expect("exists");
        let spent: u64 = player
            .cities
            .keys()
            .filter_map(|id| catalog::city(id))
            .map(|def| def.cost)
            .sum();
        assert_eq!(player.balance + spent, 25_000);
    }
}
