use std::sync::Arc;

use tracing::{info, warn};

use crate::driver::{flush, Broadcaster};
use crate::error::{GameError, Result};
use crate::registry::{SharedRegistry, SharedRoom};
use crate::types::{Direction, HealthReport, JoinMode, PlayerView, RoomInfo};

/// Applies inbound intents to rooms and flushes what they emit.
///
/// Lock order is registry, then room. The tick driver only ever holds one
/// room at a time.
#[derive(Clone)]
pub struct GameService {
    registry: SharedRegistry,
    broadcaster: Arc<dyn Broadcaster>,
}

impl GameService {
    pub fn new(registry: SharedRegistry, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    pub async fn join(
        &self,
        room_id: &str,
        member_id: &str,
        name: &str,
        mode: JoinMode,
    ) -> Result<PlayerView> {
        let mut registry = self.registry.lock().await;
        let existed = registry.get(room_id).is_some();
        let handle = registry.get_or_create(room_id);
        let mut room = handle.lock().await;

        let result = room.join(member_id, name, mode);
        if let Err(err) = &result {
            warn!("join to room {} by {} rejected: {}", room_id, member_id, err);
            if !existed && !room.has_audience() && !registry.is_default(room_id) {
                room.shutdown();
                registry.remove(room_id);
            }
        }
        flush(&mut room, self.broadcaster.as_ref());
        result
    }

    /// Movement intents for unknown rooms or members are dropped.
    pub async fn set_direction(&self, room_id: &str, member_id: &str, direction: Direction) -> bool {
        let Some(room) = self.room(room_id).await else {
            return false;
        };
        let applied = room.lock().await.set_direction(member_id, direction);
        applied
    }

    pub async fn restart(&self, room_id: &str) -> Result<()> {
        let room = self.require_room(room_id).await?;
        let mut room = room.lock().await;
        room.restart();
        flush(&mut room, self.broadcaster.as_ref());
        Ok(())
    }

    pub async fn set_duration(&self, room_id: &str, seconds: i64) -> Result<()> {
        let room = self.require_room(room_id).await?;
        let mut room = room.lock().await;
        let result = room.set_duration(seconds);
        flush(&mut room, self.broadcaster.as_ref());
        result
    }

    pub async fn start_clock(&self, room_id: &str) -> Result<()> {
        let room = self.require_room(room_id).await?;
        room.lock().await.start_clock();
        Ok(())
    }

    pub async fn stop_clock(&self, room_id: &str) -> Result<()> {
        let room = self.require_room(room_id).await?;
        room.lock().await.stop_clock();
        Ok(())
    }

    /// Disconnect handling. A non-default room left without an audience is
    /// shut down and unregistered.
    pub async fn leave(&self, room_id: &str, member_id: &str) {
        let mut registry = self.registry.lock().await;
        let Some(handle) = registry.get(room_id) else {
            return;
        };
        let mut room = handle.lock().await;
        room.leave(member_id);
        flush(&mut room, self.broadcaster.as_ref());

        if !room.has_audience() && !registry.is_default(room_id) {
            room.shutdown();
            drop(room);
            registry.remove(room_id);
            info!("room {} torn down after last member left", room_id);
        }
    }

    pub async fn health(&self) -> HealthReport {
        let handles = self.registry.lock().await.handles();
        let mut players = 0;
        for (_, room) in &handles {
            players += room.lock().await.roster_len();
        }
        HealthReport {
            status: "ok",
            rooms: handles.len(),
            players,
        }
    }

    pub async fn room_infos(&self) -> Vec<RoomInfo> {
        let handles = self.registry.lock().await.handles();
        let mut infos = Vec::with_capacity(handles.len());
        for (_, room) in handles {
            infos.push(room.lock().await.info());
        }
        infos
    }

    async fn room(&self, room_id: &str) -> Option<SharedRoom> {
        self.registry.lock().await.get(room_id)
    }

    async fn require_room(&self, room_id: &str) -> Result<SharedRoom> {
        self.room(room_id)
            .await
            .ok_or_else(|| GameError::UnknownRoom(room_id.to_string()))
    }
}
