//! The process-wide phase timer

use crate::state::AppState;
use std::sync::Arc;

/// Spawn the background loop that ticks every lobby once per timer unit
pub fn spawn_phase_timer(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.tick_interval);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            state.tick_all().await;
        }
    });
}

impl AppState {
    /// One timer unit for every lobby with a running game, then a sweep for
    /// abandoned games. Each lobby is locked on its own, so a slow lobby
    /// never holds up the registry.
    pub async fn tick_all(&self) {
        let handles: Vec<_> = self.lobbies.read().await.values().cloned().collect();

        for handle in handles {
            let mut lobby = handle.lock().await;
            if lobby.game.is_none() {
                continue;
            }
            if lobby.has_active_game() {
                let out = lobby.tick();
                self.flush(&lobby, out);
            }
            self.settle(&handle, lobby).await;
        }
    }
}
