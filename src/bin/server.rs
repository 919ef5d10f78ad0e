use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use maze_chase_server::config::{GameRules, ServerConfig};
use maze_chase_server::driver::{Broadcaster, TickDriver};
use maze_chase_server::error::GameError;
use maze_chase_server::registry::RoomRegistry;
use maze_chase_server::server_protocol::{parse_client_message, ParsedClientMessage};
use maze_chase_server::server_utils::{make_id, normalize_room_id};
use maze_chase_server::service::GameService;
use maze_chase_server::types::ServerEvent;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const CLIENT_QUEUE: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

impl QueuePolicy {
    /// Snapshots are superseded every tick, so a slow reader may miss some.
    /// Losing any other event would desync the client.
    fn for_event(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::StateSnapshot { .. } => Self::DropOnFull,
            _ => Self::DisconnectOnFull,
        }
    }
}

/// Outbound queues of every connected client, keyed by member id.
///
/// Removing a client drops its sender, which ends the socket's writer task
/// and with it the session.
#[derive(Default)]
struct ClientHub {
    clients: Mutex<HashMap<String, mpsc::Sender<String>>>,
}

impl ClientHub {
    fn clients(&self) -> MutexGuard<'_, HashMap<String, mpsc::Sender<String>>> {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, client_id: &str, tx: mpsc::Sender<String>) {
        self.clients().insert(client_id.to_string(), tx);
    }

    fn unregister(&self, client_id: &str) {
        self.clients().remove(client_id);
    }

    fn send(&self, client_id: &str, event: &ServerEvent) {
        self.deliver(std::slice::from_ref(&client_id.to_string()), event);
    }
}

impl Broadcaster for ClientHub {
    fn deliver(&self, recipients: &[String], event: &ServerEvent) {
        if recipients.is_empty() {
            return;
        }
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("dropping unserializable event: {}", err);
                return;
            }
        };
        let policy = QueuePolicy::for_event(event);

        let mut clients = self.clients();
        let mut failed = Vec::new();
        for client_id in recipients {
            let Some(tx) = clients.get(client_id) else {
                continue;
            };
            if tx.try_send(payload.clone()).is_err() && policy == QueuePolicy::DisconnectOnFull {
                failed.push(client_id.clone());
            }
        }
        for client_id in failed {
            warn!("client {} cannot keep up; disconnecting", client_id);
            clients.remove(&client_id);
        }
    }
}

#[derive(Clone)]
struct AppState {
    service: GameService,
    hub: Arc<ClientHub>,
    config: Arc<ServerConfig>,
}

/// What one connection has done so far.
struct Session {
    client_id: String,
    room_id: Option<String>,
    host: bool,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env();
    let registry = RoomRegistry::new(config.default_room.clone(), GameRules::default()).shared();
    registry
        .lock()
        .await
        .get_or_create(&config.default_room);

    let hub = Arc::new(ClientHub::default());
    let broadcaster: Arc<dyn Broadcaster> = hub.clone();
    TickDriver::new(registry.clone(), broadcaster.clone(), config.tick_rate).spawn();

    let port = config.port;
    let state = AppState {
        service: GameService::new(registry, broadcaster),
        hub,
        config: Arc::new(config),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    info!("listening on :{}", port);
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.health().await)
}

async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "rooms": state.service.room_infos().await }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let mut session = Session {
        client_id: make_id("client"),
        room_id: None,
        host: false,
    };
    let (tx, mut rx) = mpsc::channel::<String>(CLIENT_QUEUE);
    state.hub.register(&session.client_id, tx);
    debug!("client {} connected", session.client_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            received = ws_receiver.next() => {
                let Some(Ok(message)) = received else {
                    break;
                };
                match message {
                    Message::Text(raw) => {
                        handle_client_message(&state, &mut session, raw.as_str()).await;
                    }
                    Message::Binary(raw) => match std::str::from_utf8(&raw) {
                        Ok(text) => handle_client_message(&state, &mut session, text).await,
                        Err(_) => state
                            .hub
                            .send(&session.client_id, &ServerEvent::error("invalid utf8 message")),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    handle_disconnect(&state, &session).await;
    if !writer_done {
        writer.abort();
    }
}

async fn handle_client_message(state: &AppState, session: &mut Session, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        state
            .hub
            .send(&session.client_id, &ServerEvent::error("invalid message"));
        return;
    };

    if message.requires_host() && !session.host {
        state
            .hub
            .send(&session.client_id, &ServerEvent::error(GameError::NotHost.to_string()));
        return;
    }

    match message {
        ParsedClientMessage::Join {
            name,
            room_id,
            mode,
        } => {
            let room_id = normalize_room_id(room_id.as_deref(), &state.config.default_room);
            // The old room is only left once the new one has accepted us.
            let previous = session
                .room_id
                .clone()
                .filter(|previous| *previous != room_id);
            match state
                .service
                .join(&room_id, &session.client_id, &name, mode)
                .await
            {
                Ok(_) => {
                    if let Some(previous) = previous {
                        state.service.leave(&previous, &session.client_id).await;
                    }
                    session.room_id = Some(room_id);
                }
                Err(err) => state
                    .hub
                    .send(&session.client_id, &ServerEvent::error(err.to_string())),
            }
        }
        ParsedClientMessage::Move { direction } => {
            if let Some(room_id) = session.room_id.as_deref() {
                state
                    .service
                    .set_direction(room_id, &session.client_id, direction)
                    .await;
            }
        }
        ParsedClientMessage::LoginHost { login, password } => {
            let granted = state
                .config
                .host
                .as_ref()
                .is_some_and(|host| host.matches(&login, &password));
            session.host = granted;
            if granted {
                info!("client {} authenticated as host", session.client_id);
            } else {
                warn!("client {} failed host login", session.client_id);
            }
            state
                .hub
                .send(&session.client_id, &ServerEvent::HostAuth { granted });
        }
        control => {
            let Some(room_id) = session.room_id.clone() else {
                state
                    .hub
                    .send(&session.client_id, &ServerEvent::error("join a room first"));
                return;
            };
            let result = match control {
                ParsedClientMessage::Restart => state.service.restart(&room_id).await,
                ParsedClientMessage::SetDuration { seconds } => {
                    state.service.set_duration(&room_id, seconds).await
                }
                ParsedClientMessage::StartClock => state.service.start_clock(&room_id).await,
                ParsedClientMessage::StopClock => state.service.stop_clock(&room_id).await,
                _ => Ok(()),
            };
            if let Err(err) = result {
                state
                    .hub
                    .send(&session.client_id, &ServerEvent::error(err.to_string()));
            }
        }
    }
}

async fn handle_disconnect(state: &AppState, session: &Session) {
    state.hub.unregister(&session.client_id);
    if let Some(room_id) = session.room_id.as_deref() {
        state.service.leave(room_id, &session.client_id).await;
    }
    debug!("client {} disconnected", session.client_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_and_error_events_are_lossless() {
        assert_eq!(
            QueuePolicy::for_event(&ServerEvent::PowerWindowEnded),
            QueuePolicy::DisconnectOnFull
        );
        assert_eq!(
            QueuePolicy::for_event(&ServerEvent::error("x")),
            QueuePolicy::DisconnectOnFull
        );
    }

    #[test]
    fn full_queue_disconnects_on_lossless_event() {
        let hub = ClientHub::default();
        let (tx, mut rx) = mpsc::channel::<String>(1);
        hub.register("c1", tx);

        hub.send("c1", &ServerEvent::PowerWindowEnded);
        assert!(hub.clients().contains_key("c1"));
        hub.send("c1", &ServerEvent::HostAuth { granted: false });
        assert!(!hub.clients().contains_key("c1"));

        let first = rx.try_recv().expect("first event queued");
        assert!(first.contains("power-window-ended"));
    }

    fn app_state() -> AppState {
        let config = ServerConfig::default();
        let registry =
            RoomRegistry::new(config.default_room.clone(), GameRules::seeded(3)).shared();
        let hub = Arc::new(ClientHub::default());
        AppState {
            service: GameService::new(registry, hub.clone()),
            hub,
            config: Arc::new(config),
        }
    }

    fn session(state: &AppState, client_id: &str) -> (Session, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel::<String>(CLIENT_QUEUE);
        state.hub.register(client_id, tx);
        let session = Session {
            client_id: client_id.to_string(),
            room_id: None,
            host: false,
        };
        (session, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            out.push(payload);
        }
        out
    }

    async fn in_roster(state: &AppState, room_id: &str, member_id: &str) -> bool {
        let room = state
            .service
            .registry()
            .lock()
            .await
            .get(room_id)
            .expect("room exists");
        let present = room.lock().await.player(member_id).is_some();
        present
    }

    #[tokio::test]
    async fn rejected_rejoin_keeps_player_in_running_match() {
        let state = app_state();
        let (mut ana, mut ana_rx) = session(&state, "c1");
        let (mut bia, _bia_rx) = session(&state, "c2");
        let join_ana = r#"{"type":"join","name":"Ana","roomId":"sala"}"#;
        handle_client_message(&state, &mut ana, join_ana).await;
        handle_client_message(&state, &mut bia, r#"{"type":"join","name":"Bia","roomId":"sala"}"#)
            .await;
        ana.host = true;
        handle_client_message(&state, &mut ana, r#"{"type":"restart"}"#).await;
        drain(&mut ana_rx);

        handle_client_message(&state, &mut ana, join_ana).await;

        assert_eq!(ana.room_id.as_deref(), Some("sala"));
        assert!(in_roster(&state, "sala", "c1").await);
        assert!(in_roster(&state, "sala", "c2").await);
        let replies = drain(&mut ana_rx);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("\"type\":\"error\""));
        assert!(replies[0].contains("match in progress"));
    }

    #[tokio::test]
    async fn switching_rooms_leaves_the_old_room_after_joining() {
        let state = app_state();
        let (mut ana, _ana_rx) = session(&state, "c1");
        let (mut bia, _bia_rx) = session(&state, "c2");
        handle_client_message(&state, &mut ana, r#"{"type":"join","name":"Ana","roomId":"sala"}"#)
            .await;
        handle_client_message(&state, &mut bia, r#"{"type":"join","name":"Bia","roomId":"sala"}"#)
            .await;

        handle_client_message(&state, &mut ana, r#"{"type":"join","name":"Ana","roomId":"outra"}"#)
            .await;

        assert_eq!(ana.room_id.as_deref(), Some("outra"));
        assert!(in_roster(&state, "outra", "c1").await);
        assert!(!in_roster(&state, "sala", "c1").await);
        assert!(in_roster(&state, "sala", "c2").await);
    }

    #[test]
    fn unknown_recipients_are_skipped() {
        let hub = ClientHub::default();
        hub.deliver(&["ghost".to_string()], &ServerEvent::PowerWindowEnded);
        assert!(hub.clients().is_empty());
    }
}
