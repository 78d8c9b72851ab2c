use std::collections::HashMap;

use parking_lot::Mutex;

use super::{apply_update, Condition, Mutation, PlayerStore};
use crate::{error::StoreError, models::Player};

/// In-process store; the mutex makes each update atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    players: Mutex<HashMap<String, Player>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerStore for MemoryStore {
    fn get(&self, player_id: &str) -> Result<Option<Player>, StoreError> {
        Ok(self.players.lock().get(player_id).cloned())
    }

    fn create(&self, player: Player) -> Result<(), StoreError> {
        let mut players = self.players.lock();
        if players.contains_key(&player.player_id) {
            return Err(StoreError::PlayerExists(player.player_id));
        }
        players.insert(player.player_id.clone(), player);
        Ok(())
    }

    fn update(
        &self,
        player_id: &str,
        conditions: &[Condition],
        mutations: &[Mutation],
    ) -> Result<Player, StoreError> {
        let mut players = self.players.lock();
        let current = players
            .get(player_id)
            .ok_or_else(|| StoreError::PlayerNotFound(player_id.to_string()))?;
        let next = apply_update(current, conditions, mutations)?;
        players.insert(player_id.to_string(), next.clone());
        Ok(next)
    }
}
