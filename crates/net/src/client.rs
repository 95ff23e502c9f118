//! TCP client for talking to a coordinator
//!
//! Thin wrapper: a connection task owns the socket and shuttles frames both
//! ways. Server messages surface as-is through `next_event`; the caller
//! drives all protocol logic.

use std::net::SocketAddr;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{ClientMessage, ServerMessage};

/// Client handle for a coordinator connection
pub struct Client {
    event_rx: mpsc::Receiver<ServerMessage>,
    cmd_tx: mpsc::Sender<Command>,
}

enum Command {
    Send(ClientMessage),
    Disconnect,
}

impl Client {
    /// Connect to a coordinator
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to coordinator");

        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(connection_task(reader, writer, event_tx, cmd_rx));

        Ok(Client { event_rx, cmd_tx })
    }

    /// Send a message to the coordinator
    pub async fn send(&self, msg: ClientMessage) -> Result<()> {
        self.cmd_tx
            .send(Command::Send(msg))
            .await
            .map_err(|_| Error::NotConnected)
    }

    /// Join a room
    pub async fn join(&self, room_id: impl Into<String>, participant_id: impl Into<String>) -> Result<()> {
        self.send(ClientMessage::Join {
            room_id: room_id.into(),
            participant_id: participant_id.into(),
        })
        .await
    }

    /// Next message from the coordinator; None once disconnected
    pub async fn next_event(&mut self) -> Option<ServerMessage> {
        self.event_rx.recv().await
    }

    /// Close the connection
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect).await;
    }
}

async fn connection_task(
    mut reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    event_tx: mpsc::Sender<ServerMessage>,
    mut cmd_rx: mpsc::Receiver<Command>,
) {
    loop {
        tokio::select! {
            result = read_frame::<_, ServerMessage>(&mut reader) => {
                match result {
                    Ok(msg) => {
                        if event_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!("Coordinator closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(msg)) => {
                        if let Err(e) = write_frame(&mut writer, &msg).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    info!("Disconnected from coordinator");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::{RoomConfig, SharedDb};
    use crate::server::Server;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use waypoint_core::Database;

    fn test_db() -> SharedDb {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_client_join() {
        let server = Server::start(0, test_db(), RoomConfig::default())
            .await
            .unwrap();

        let mut client = Client::connect(server.addr()).await.unwrap();
        client.join("room-1", "alice").await.unwrap();

        match client.next_event().await {
            Some(ServerMessage::RoomSnapshot(snapshot)) => {
                assert_eq!(snapshot.room_id, "room-1");
            }
            other => panic!("expected snapshot, got {:?}", other),
        }

        client.disconnect().await;
        server.shutdown();
    }
}
