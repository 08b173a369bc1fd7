//! Racing world: race registry and the single waiting lobby.

use crate::config::Config;
use crate::racing::Race;
use crate::server::racing::RacingHandle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

struct Inner {
    races: HashMap<String, Arc<Race>>,
    /// There is exactly one lobby at any time; when it starts its
    /// countdown a fresh empty lobby replaces it.
    waiting_lobby: Arc<Race>,
}

/// Owner of all race sessions.
pub struct RacingWorld {
    config: Arc<Config>,
    inner: RwLock<Inner>,
}

impl RacingWorld {
    pub fn new(config: Arc<Config>) -> Arc<Self> {
        Arc::new_cyclic(|world| {
            let lobby = Race::new(config.clone(), world.clone());
            let mut races = HashMap::new();
            races.insert(lobby.id.clone(), lobby.clone());
            Self {
                config,
                inner: RwLock::new(Inner {
                    races,
                    waiting_lobby: lobby,
                }),
            }
        })
    }

    /// Place a player into the current waiting lobby and return the race.
    /// The caller sends the welcome message and the lobby-state broadcast
    /// after this returns.
    pub async fn join(
        &self,
        handle: Arc<RacingHandle>,
        name: String,
        model: String,
    ) -> Arc<Race> {
        let inner = self.inner.read().await;
        let race = inner.waiting_lobby.clone();
        let id = handle.id.clone();
        race.add_player(id, name, model, Some(handle)).await;
        race
    }

    /// Install a fresh empty lobby; the outgoing lobby keeps running as a
    /// regular race.
    pub(crate) async fn replace_lobby(self: &Arc<Self>) {
        let lobby = Race::new(self.config.clone(), Arc::downgrade(self));
        let mut inner = self.inner.write().await;
        info!(
            "Created new waiting lobby: {} (old lobby {} starting countdown)",
            lobby.id, inner.waiting_lobby.id
        );
        inner.races.insert(lobby.id.clone(), lobby.clone());
        inner.waiting_lobby = lobby;
    }

    /// Drop a finished, empty race from the registry.
    pub(crate) async fn remove_race(&self, id: &str) {
        let mut inner = self.inner.write().await;
        if inner.races.remove(id).is_some() {
            info!("Race {} finished and empty - cleaning up", id);
        }
    }

    /// The race currently accepting joiners.
    pub async fn waiting_lobby(&self) -> Arc<Race> {
        self.inner.read().await.waiting_lobby.clone()
    }

    pub async fn race_count(&self) -> usize {
        self.inner.read().await.races.len()
    }
}
