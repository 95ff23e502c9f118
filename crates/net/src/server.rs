//! TCP coordinator server
//!
//! Accepts client connections and routes their messages into room tasks.
//! One connection can sit in several rooms at once; each joined room holds
//! a clone of the connection's outbound queue for broadcasts.
//!
//! A connection's identity is bound by its first join and every later
//! message claiming a participant id must match it. Room semantics live in
//! the room task; this layer only authenticates, routes, and cleans up.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::RoomRegistry;
use crate::room::{ConnId, RoomCommand, RoomConfig, RoomHandle, SharedDb};

/// Default coordinator port
pub const DEFAULT_PORT: u16 = 7420;

/// Outbound queue depth per connection
const CONN_QUEUE_DEPTH: usize = 64;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Coordinator server handle
pub struct Server {
    addr: SocketAddr,
    registry: Arc<RoomRegistry>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind and start accepting connections
    pub async fn start(port: u16, db: SharedDb, config: RoomConfig) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Coordinator started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(RoomRegistry::new(db, config));

        tokio::spawn(accept_loop(
            listener,
            registry.clone(),
            shutdown_tx.subscribe(),
        ));

        Ok(Server {
            addr: bound_addr,
            registry,
            shutdown_tx,
        })
    }

    /// The server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Stop accepting new connections
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Coordinator shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    registry: Arc<RoomRegistry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let registry = registry.clone();
                        tokio::spawn(handle_connection(stream, addr, registry));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Per-connection routing state
struct Connection {
    conn_id: ConnId,
    /// Bound by the first join; all later claims must match
    identity: Option<String>,
    joined: HashMap<String, RoomHandle>,
    out_tx: mpsc::Sender<ServerMessage>,
}

impl Connection {
    /// Verify a claimed participant id against the bound identity
    fn claims(&self, participant_id: &str) -> bool {
        self.identity.as_deref() == Some(participant_id)
    }

    async fn reject(&self, reason: impl Into<String>) {
        let _ = self
            .out_tx
            .send(ServerMessage::Rejected {
                reason: reason.into(),
                retryable: false,
            })
            .await;
    }

    /// Forward a command into a joined room, rejecting if not a member
    async fn forward(&self, room_id: &str, cmd: RoomCommand) {
        match self.joined.get(room_id) {
            Some(handle) => {
                if !handle.send(cmd).await {
                    self.reject("Room is gone").await;
                }
            }
            None => self.reject("Not in room").await,
        }
    }
}

/// Handle a single client connection
async fn handle_connection(stream: TcpStream, addr: SocketAddr, registry: Arc<RoomRegistry>) {
    let (mut reader, writer) = tokio::io::split(stream);

    let (out_tx, out_rx) = mpsc::channel(CONN_QUEUE_DEPTH);
    let writer_handle = tokio::spawn(writer_task(writer, out_rx));

    let mut conn = Connection {
        conn_id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
        identity: None,
        joined: HashMap::new(),
        out_tx,
    };

    loop {
        match read_frame(&mut reader).await {
            Ok(msg) => route(&mut conn, msg, &registry).await,
            Err(Error::ConnectionClosed) => {
                debug!(conn_id = conn.conn_id, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(conn_id = conn.conn_id, addr = %addr, error = %e, "Read error");
                break;
            }
        }
    }

    // A dropped connection leaves every room it sat in
    for handle in conn.joined.values() {
        handle
            .send(RoomCommand::Leave {
                conn_id: conn.conn_id,
            })
            .await;
    }
    writer_handle.abort();

    debug!(conn_id = conn.conn_id, "Connection cleaned up");
}

/// Map one client message onto a room command
async fn route(conn: &mut Connection, msg: ClientMessage, registry: &RoomRegistry) {
    match msg {
        ClientMessage::Join {
            room_id,
            participant_id,
        } => {
            match &conn.identity {
                None => conn.identity = Some(participant_id.clone()),
                Some(bound) if *bound != participant_id => {
                    conn.reject("Identity mismatch").await;
                    return;
                }
                Some(_) => {}
            }

            let handle = registry.get_or_create(&room_id).await;
            handle
                .send(RoomCommand::Join {
                    conn_id: conn.conn_id,
                    participant_id,
                    tx: conn.out_tx.clone(),
                })
                .await;
            conn.joined.insert(room_id, handle);
        }

        ClientMessage::Leave { room_id } => {
            if let Some(handle) = conn.joined.remove(&room_id) {
                handle
                    .send(RoomCommand::Leave {
                        conn_id: conn.conn_id,
                    })
                    .await;
            }
        }

        ClientMessage::ProfileUpdate {
            room_id,
            participant_id,
            nickname,
            avatar_url,
        } => {
            if !conn.claims(&participant_id) {
                conn.reject("Identity mismatch").await;
                return;
            }
            conn.forward(
                &room_id,
                RoomCommand::ProfileUpdate {
                    participant_id,
                    nickname,
                    avatar_url,
                },
            )
            .await;
        }

        ClientMessage::CursorMove {
            room_id,
            participant_id,
            position,
        } => {
            if !conn.claims(&participant_id) {
                conn.reject("Identity mismatch").await;
                return;
            }
            conn.forward(
                &room_id,
                RoomCommand::CursorMove {
                    participant_id,
                    position,
                },
            )
            .await;
        }

        ClientMessage::DrawAction {
            room_id,
            participant_id,
            kind,
            payload,
        } => {
            if !conn.claims(&participant_id) {
                conn.reject("Identity mismatch").await;
                return;
            }
            conn.forward(
                &room_id,
                RoomCommand::Draw {
                    participant_id,
                    kind,
                    payload,
                },
            )
            .await;
        }

        ClientMessage::UndoRequest { room_id } => {
            let Some(participant_id) = conn.identity.clone() else {
                conn.reject("Not joined").await;
                return;
            };
            conn.forward(&room_id, RoomCommand::UndoRequest { participant_id })
                .await;
        }

        ClientMessage::TripCreate { room_id, title } => {
            let Some(participant_id) = conn.identity.clone() else {
                conn.reject("Not joined").await;
                return;
            };
            conn.forward(
                &room_id,
                RoomCommand::TripCreate {
                    participant_id,
                    title,
                },
            )
            .await;
        }

        ClientMessage::PinCreate {
            room_id,
            trip_id,
            name,
            lat,
            lng,
        } => {
            let Some(participant_id) = conn.identity.clone() else {
                conn.reject("Not joined").await;
                return;
            };
            conn.forward(
                &room_id,
                RoomCommand::PinCreate {
                    participant_id,
                    trip_id,
                    name,
                    lat,
                    lng,
                },
            )
            .await;
        }

        ClientMessage::PinList { room_id, trip_id } => {
            let Some(participant_id) = conn.identity.clone() else {
                conn.reject("Not joined").await;
                return;
            };
            conn.forward(
                &room_id,
                RoomCommand::PinList {
                    participant_id,
                    trip_id,
                },
            )
            .await;
        }

        ClientMessage::DragStart {
            room_id,
            pin_id,
            participant_id,
        } => {
            if !conn.claims(&participant_id) {
                conn.reject("Identity mismatch").await;
                return;
            }
            conn.forward(
                &room_id,
                RoomCommand::DragStart {
                    participant_id,
                    pin_id,
                },
            )
            .await;
        }

        ClientMessage::DuelChoice {
            room_id,
            duel_id,
            participant_id,
            choice,
        } => {
            if !conn.claims(&participant_id) {
                conn.reject("Identity mismatch").await;
                return;
            }
            conn.forward(
                &room_id,
                RoomCommand::DuelChoice {
                    participant_id,
                    duel_id,
                    choice,
                },
            )
            .await;
        }

        ClientMessage::DuelResult {
            room_id,
            duel_id,
            winner_id,
            ..
        } => {
            let Some(participant_id) = conn.identity.clone() else {
                conn.reject("Not joined").await;
                return;
            };
            conn.forward(
                &room_id,
                RoomCommand::DuelResultClaim {
                    participant_id,
                    duel_id,
                    winner_id,
                },
            )
            .await;
        }

        ClientMessage::SchedulePropose {
            room_id,
            pin_id,
            participant_id,
            target_day,
        } => {
            if !conn.claims(&participant_id) {
                conn.reject("Identity mismatch").await;
                return;
            }
            conn.forward(
                &room_id,
                RoomCommand::SchedulePropose {
                    participant_id,
                    pin_id,
                    target_day,
                },
            )
            .await;
        }

        ClientMessage::BallotSubmit {
            room_id,
            vote_id,
            participant_id,
            agree,
        } => {
            if !conn.claims(&participant_id) {
                conn.reject("Identity mismatch").await;
                return;
            }
            conn.forward(
                &room_id,
                RoomCommand::BallotSubmit {
                    participant_id,
                    vote_id,
                    agree,
                },
            )
            .await;
        }

        ClientMessage::ScheduleDirectSet {
            room_id,
            pin_id,
            participant_id,
            day,
            time_slot,
        } => {
            if !conn.claims(&participant_id) {
                conn.reject("Identity mismatch").await;
                return;
            }
            conn.forward(
                &room_id,
                RoomCommand::ScheduleDirectSet {
                    participant_id,
                    pin_id,
                    day,
                    time_slot,
                },
            )
            .await;
        }

        ClientMessage::AssistantStatus { room_id, thinking } => {
            conn.forward(&room_id, RoomCommand::AssistantStatus { thinking })
                .await;
        }
    }
}

/// Writer task, drains the connection's outbound queue onto the socket
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<ServerMessage>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;
    use waypoint_core::Database;

    fn test_db() -> SharedDb {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_server_start() {
        let server = Server::start(0, test_db(), RoomConfig::default())
            .await
            .unwrap();

        assert!(server.addr().port() > 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn join_over_tcp_yields_snapshot() {
        let server = Server::start(0, test_db(), RoomConfig::default())
            .await
            .unwrap();

        let stream = TcpStream::connect(server.addr()).await.unwrap();
        let (mut reader, mut writer) = tokio::io::split(stream);

        write_frame(
            &mut writer,
            &ClientMessage::Join {
                room_id: "room-1".to_string(),
                participant_id: "alice".to_string(),
            },
        )
        .await
        .unwrap();

        let msg: ServerMessage = read_frame(&mut reader).await.unwrap();
        match msg {
            ServerMessage::RoomSnapshot(snapshot) => {
                assert_eq!(snapshot.room_id, "room-1");
                assert_eq!(snapshot.members.len(), 1);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
        server.shutdown();
    }

    #[tokio::test]
    async fn mismatched_identity_is_rejected() {
        let server = Server::start(0, test_db(), RoomConfig::default())
            .await
            .unwrap();

        let stream = TcpStream::connect(server.addr()).await.unwrap();
        let (mut reader, mut writer) = tokio::io::split(stream);

        write_frame(
            &mut writer,
            &ClientMessage::Join {
                room_id: "room-1".to_string(),
                participant_id: "alice".to_string(),
            },
        )
        .await
        .unwrap();
        let _snapshot: ServerMessage = read_frame(&mut reader).await.unwrap();

        // Forged sender id on a cursor update
        write_frame(
            &mut writer,
            &ClientMessage::CursorMove {
                room_id: "room-1".to_string(),
                participant_id: "bob".to_string(),
                position: waypoint_core::CursorPosition { x: 0.0, y: 0.0 },
            },
        )
        .await
        .unwrap();

        let msg: ServerMessage = read_frame(&mut reader).await.unwrap();
        assert!(matches!(
            msg,
            ServerMessage::Rejected {
                retryable: false,
                ..
            }
        ));
        server.shutdown();
    }
}
