use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::constants::tick_ms_for_rate;
use crate::registry::SharedRegistry;
use crate::room::{Recipient, Room};
use crate::types::ServerEvent;

/// Outbound fan-out. Implementations must not block.
pub trait Broadcaster: Send + Sync {
    fn deliver(&self, recipients: &[String], event: &ServerEvent);
}

/// Hands every buffered room event to the broadcaster.
pub fn flush(room: &mut Room, broadcaster: &dyn Broadcaster) {
    let audience = room.audience();
    for outbound in room.drain_events() {
        match outbound.recipient {
            Recipient::Room => broadcaster.deliver(&audience, &outbound.event),
            Recipient::Member(member_id) => {
                broadcaster.deliver(std::slice::from_ref(&member_id), &outbound.event)
            }
        }
    }
}

/// One driver period for one room: timers, step, events, then a snapshot
/// while a match is running.
pub fn step_room(room: &mut Room, dt_ms: u64, broadcaster: &dyn Broadcaster) {
    room.tick(dt_ms);
    flush(room, broadcaster);
    if room.is_active() {
        let snapshot = room.snapshot();
        broadcaster.deliver(&room.audience(), &ServerEvent::StateSnapshot { snapshot });
    }
}

/// Turns wall-clock progress into whole milliseconds of room time. The
/// sub-millisecond remainder carries over to the next call.
#[derive(Debug)]
struct ElapsedCredit {
    origin: Instant,
    credited_ms: u64,
}

impl ElapsedCredit {
    fn new(origin: Instant) -> Self {
        Self {
            origin,
            credited_ms: 0,
        }
    }

    fn take(&mut self, now: Instant) -> u64 {
        let total_ms = now.saturating_duration_since(self.origin).as_millis() as u64;
        let due = total_ms.saturating_sub(self.credited_ms);
        self.credited_ms += due;
        due
    }
}

/// Fixed-rate scheduler advancing every registered room.
///
/// Each room steps on its own task. A room whose previous step has not
/// finished is skipped for the period and owed the time on its next step, so
/// one slow room never holds back the others.
pub struct TickDriver {
    registry: SharedRegistry,
    broadcaster: Arc<dyn Broadcaster>,
    period: Duration,
    in_flight: HashMap<String, JoinHandle<()>>,
    owed_ms: HashMap<String, u64>,
}

impl TickDriver {
    pub fn new(registry: SharedRegistry, broadcaster: Arc<dyn Broadcaster>, tick_rate: u32) -> Self {
        Self {
            registry,
            broadcaster,
            period: Duration::from_millis(tick_ms_for_rate(tick_rate)),
            in_flight: HashMap::new(),
            owed_ms: HashMap::new(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut credit = ElapsedCredit::new(Instant::now());
        loop {
            interval.tick().await;
            // Skipped periods still count: rooms are owed real elapsed time.
            let elapsed_ms = credit.take(Instant::now());
            if elapsed_ms > 0 {
                self.advance(elapsed_ms).await;
            }
        }
    }

    /// Advances every room by one nominal period.
    pub async fn tick_once(&mut self) {
        let period_ms = self.period.as_millis() as u64;
        self.advance(period_ms).await;
    }

    pub async fn advance(&mut self, elapsed_ms: u64) {
        let handles = self.registry.lock().await.handles();
        self.in_flight
            .retain(|id, _| handles.iter().any(|(room_id, _)| room_id == id));
        self.owed_ms
            .retain(|id, _| handles.iter().any(|(room_id, _)| room_id == id));

        for (room_id, room) in handles {
            let owed = self.owed_ms.entry(room_id.clone()).or_insert(0);
            *owed += elapsed_ms;
            if self
                .in_flight
                .get(&room_id)
                .is_some_and(|task| !task.is_finished())
            {
                debug!("room {} still stepping; deferring {}ms", room_id, owed);
                continue;
            }

            let dt_ms = std::mem::take(owed);
            let broadcaster = Arc::clone(&self.broadcaster);
            let task = tokio::spawn(async move {
                let mut room = room.lock().await;
                step_room(&mut room, dt_ms, broadcaster.as_ref());
            });
            self.in_flight.insert(room_id, task);
        }
    }

    /// Waits for every in-flight room step.
    pub async fn settle(&mut self) {
        for (room_id, task) in self.in_flight.drain() {
            if let Err(err) = task.await {
                debug!("step task for room {} failed: {}", room_id, err);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::Broadcaster;
    use crate::types::ServerEvent;

    /// Records every delivery for inspection.
    #[derive(Default)]
    pub(crate) struct RecordingBroadcaster {
        pub(crate) sent: Mutex<Vec<(Vec<String>, ServerEvent)>>,
    }

    impl RecordingBroadcaster {
        pub(crate) fn types_for(&self, member_id: &str) -> Vec<String> {
            self.sent
                .lock()
                .expect("recording lock")
                .iter()
                .filter(|(to, _)| to.iter().any(|id| id == member_id))
                .map(|(_, event)| {
                    serde_json::to_value(event).expect("serializable")["type"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        }

        pub(crate) fn clear(&self) {
            self.sent.lock().expect("recording lock").clear();
        }
    }

    impl Broadcaster for RecordingBroadcaster {
        fn deliver(&self, recipients: &[String], event: &ServerEvent) {
            self.sent
                .lock()
                .expect("recording lock")
                .push((recipients.to_vec(), event.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::RecordingBroadcaster;
    use super::*;
    use crate::config::GameRules;
    use crate::registry::RoomRegistry;
    use crate::types::JoinMode;

    async fn setup() -> (SharedRegistry, Arc<RecordingBroadcaster>) {
        let registry = RoomRegistry::new("default", GameRules::seeded(5)).shared();
        {
            let mut guard = registry.lock().await;
            let lobby = guard.get_or_create("lobby");
            lobby
                .lock()
                .await
                .join("m1", "Ana", JoinMode::Player)
                .expect("join");
            let arena = guard.get_or_create("arena");
            let mut arena = arena.lock().await;
            arena.join("m2", "Bia", JoinMode::Player).expect("join");
            arena.restart();
        }
        (registry, Arc::new(RecordingBroadcaster::default()))
    }

    #[tokio::test]
    async fn only_running_rooms_receive_snapshots() {
        let (registry, recorder) = setup().await;
        let mut driver = TickDriver::new(registry.clone(), recorder.clone(), 20);
        assert_eq!(driver.period(), Duration::from_millis(50));

        driver.tick_once().await;
        driver.settle().await;

        let arena = recorder.types_for("m2");
        assert!(arena.contains(&"state-snapshot".to_string()));
        let lobby = recorder.types_for("m1");
        assert!(!lobby.contains(&"state-snapshot".to_string()));
        // Buffered join traffic is flushed even for idle rooms.
        assert!(lobby.contains(&"room-state".to_string()));
    }

    #[tokio::test]
    async fn busy_room_is_skipped_and_catches_up() {
        let (registry, recorder) = setup().await;
        let arena = registry.lock().await.get("arena").expect("arena");
        let lobby = registry.lock().await.get("lobby").expect("lobby");
        let mut driver = TickDriver::new(registry.clone(), recorder, 20);

        let guard = arena.lock().await;
        driver.tick_once().await;
        driver.tick_once().await;
        drop(guard);
        driver.settle().await;

        // Both rooms stepped once; the second period is still owed.
        assert_eq!(lobby.lock().await.now_ms(), 50);
        assert_eq!(arena.lock().await.now_ms(), 50);

        driver.tick_once().await;
        driver.settle().await;
        assert_eq!(lobby.lock().await.now_ms(), 150);
        assert_eq!(arena.lock().await.now_ms(), 150);
    }

    #[test]
    fn elapsed_credit_covers_late_ticks_without_drift() {
        let origin = Instant::now();
        let mut credit = ElapsedCredit::new(origin);
        assert_eq!(credit.take(origin), 0);
        assert_eq!(credit.take(origin + Duration::from_micros(50_400)), 50);
        // Three periods late: all of it is credited at once.
        assert_eq!(credit.take(origin + Duration::from_millis(200)), 150);
        assert_eq!(credit.take(origin + Duration::from_micros(200_600)), 0);
        assert_eq!(credit.take(origin + Duration::from_micros(251_000)), 51);
    }

    #[tokio::test]
    async fn late_driver_credits_rooms_the_real_elapsed_time() {
        let (registry, recorder) = setup().await;
        let lobby = registry.lock().await.get("lobby").expect("lobby");
        let arena = registry.lock().await.get("arena").expect("arena");
        let mut driver = TickDriver::new(registry.clone(), recorder, 20);

        driver.tick_once().await;
        driver.settle().await;
        driver.advance(170).await;
        driver.settle().await;

        assert_eq!(lobby.lock().await.now_ms(), 220);
        assert_eq!(arena.lock().await.now_ms(), 220);
    }

    #[tokio::test]
    async fn removed_rooms_are_forgotten() {
        let (registry, recorder) = setup().await;
        let mut driver = TickDriver::new(registry.clone(), recorder, 20);
        driver.tick_once().await;
        registry.lock().await.remove("arena");
        driver.tick_once().await;
        assert!(!driver.in_flight.contains_key("arena"));
        assert!(!driver.owed_ms.contains_key("arena"));
        driver.settle().await;
    }
}
