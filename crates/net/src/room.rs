//! Per-room coordinator actor
//!
//! Each room is owned by one spawned task. All mutations to a room's state
//! (membership, canvas, pins, arbitration slots) flow through its command
//! queue, so they are serialized; different rooms run independently.
//!
//! Arbitration deadlines are server-owned: a spawned sleep posts a deadline
//! command carrying the arbitration id back into the queue. Resolving early
//! bumps or clears the slot, so a late-firing timer sees a stale id and does
//! nothing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use waypoint_core::invariants;
use waypoint_core::{
    CanvasEvent, Choice, CursorPosition, Database, Duel, DuelProgress, EventLog, Participant,
    ParticipantRepository, Pin, PinRepository, StrokeKind, StrokePayload, Trip, TripRepository,
    Vote, DRAG_COLLISION_WINDOW, DUEL_DEADLINE, VOTE_DEADLINE,
};

use crate::protocol::{RoomSnapshot, ServerMessage};

/// Shared database handle
pub type SharedDb = Arc<Mutex<Database>>;

/// Connection identifier assigned by the server
pub type ConnId = u64;

/// Command queue depth per room
const ROOM_QUEUE_DEPTH: usize = 256;

/// Protocol timing knobs. Defaults are the production constants; tests
/// shrink them.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub duel_deadline: Duration,
    pub vote_deadline: Duration,
    pub drag_window: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            duel_deadline: DUEL_DEADLINE,
            vote_deadline: VOTE_DEADLINE,
            drag_window: DRAG_COLLISION_WINDOW,
        }
    }
}

/// Commands accepted by a room task
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        conn_id: ConnId,
        participant_id: String,
        tx: mpsc::Sender<ServerMessage>,
    },
    Leave {
        conn_id: ConnId,
    },
    ProfileUpdate {
        participant_id: String,
        nickname: String,
        avatar_url: String,
    },
    CursorMove {
        participant_id: String,
        position: CursorPosition,
    },
    Draw {
        participant_id: String,
        kind: StrokeKind,
        payload: StrokePayload,
    },
    UndoRequest {
        participant_id: String,
    },
    TripCreate {
        participant_id: String,
        title: String,
    },
    PinCreate {
        participant_id: String,
        trip_id: Uuid,
        name: String,
        lat: f64,
        lng: f64,
    },
    PinList {
        participant_id: String,
        trip_id: Uuid,
    },
    DragStart {
        participant_id: String,
        pin_id: Uuid,
    },
    DuelChoice {
        participant_id: String,
        duel_id: Uuid,
        choice: Choice,
    },
    /// Client-asserted outcome; advisory only, never applied
    DuelResultClaim {
        participant_id: String,
        duel_id: Uuid,
        winner_id: String,
    },
    SchedulePropose {
        participant_id: String,
        pin_id: Uuid,
        target_day: u32,
    },
    BallotSubmit {
        participant_id: String,
        vote_id: Uuid,
        agree: bool,
    },
    ScheduleDirectSet {
        participant_id: String,
        pin_id: Uuid,
        day: u32,
        time_slot: Option<String>,
    },
    AssistantStatus {
        thinking: bool,
    },
    /// Posted by the duel deadline timer; stale (id, round) pairs are no-ops
    DuelDeadline {
        pin_id: Uuid,
        duel_id: Uuid,
        round: u32,
    },
    /// Posted by the vote deadline timer; stale ids are no-ops
    VoteDeadline {
        pin_id: Uuid,
        vote_id: Uuid,
    },
}

/// Handle for sending commands to a room task
#[derive(Clone)]
pub struct RoomHandle {
    room_id: String,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Queue a command; returns false if the room task has stopped
    pub async fn send(&self, cmd: RoomCommand) -> bool {
        self.tx.send(cmd).await.is_ok()
    }

    /// True once the room task has stopped (last member left)
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A connected room member
struct Member {
    conn_id: ConnId,
    participant: Participant,
    cursor: Option<CursorPosition>,
    tx: mpsc::Sender<ServerMessage>,
}

/// A lone drag claim waiting for either completion or a collision
struct DragClaim {
    participant_id: String,
    at: Instant,
}

/// Room state, owned exclusively by the room task
pub struct Room {
    room_id: String,
    db: SharedDb,
    config: RoomConfig,
    self_tx: mpsc::Sender<RoomCommand>,
    members: HashMap<String, Member>,
    drag_claims: HashMap<Uuid, DragClaim>,
    duels: HashMap<Uuid, Duel>,
    votes: HashMap<Uuid, Vote>,
    ai_thinking: bool,
    /// Clamp so canvas timestamps never run backwards within a room
    last_canvas_at: Option<DateTime<Utc>>,
    stopping: bool,
}

impl Room {
    /// Spawn a room task and return its handle
    pub fn spawn(room_id: impl Into<String>, db: SharedDb, config: RoomConfig) -> RoomHandle {
        let room_id = room_id.into();
        let (tx, rx) = mpsc::channel(ROOM_QUEUE_DEPTH);

        let room = Room {
            room_id: room_id.clone(),
            db,
            config,
            self_tx: tx.clone(),
            members: HashMap::new(),
            drag_claims: HashMap::new(),
            duels: HashMap::new(),
            votes: HashMap::new(),
            ai_thinking: false,
            last_canvas_at: None,
            stopping: false,
        };

        info!(room_id = %room_id, "Room task started");
        tokio::spawn(room.run(rx));

        RoomHandle { room_id, tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd).await;
            if self.stopping {
                break;
            }
        }
        info!(room_id = %self.room_id, "Room task stopped");
    }

    async fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                conn_id,
                participant_id,
                tx,
            } => self.on_join(conn_id, participant_id, tx).await,
            RoomCommand::Leave { conn_id } => self.on_leave(conn_id),
            RoomCommand::ProfileUpdate {
                participant_id,
                nickname,
                avatar_url,
            } => self.on_profile(participant_id, nickname, avatar_url).await,
            RoomCommand::CursorMove {
                participant_id,
                position,
            } => self.on_cursor(participant_id, position).await,
            RoomCommand::Draw {
                participant_id,
                kind,
                payload,
            } => self.on_draw(participant_id, kind, payload).await,
            RoomCommand::UndoRequest { participant_id } => self.on_undo(participant_id).await,
            RoomCommand::TripCreate {
                participant_id,
                title,
            } => self.on_trip_create(participant_id, title).await,
            RoomCommand::PinCreate {
                participant_id,
                trip_id,
                name,
                lat,
                lng,
            } => self.on_pin_create(participant_id, trip_id, name, lat, lng).await,
            RoomCommand::PinList {
                participant_id,
                trip_id,
            } => self.on_pin_list(participant_id, trip_id).await,
            RoomCommand::DragStart {
                participant_id,
                pin_id,
            } => self.on_drag_start(participant_id, pin_id).await,
            RoomCommand::DuelChoice {
                participant_id,
                duel_id,
                choice,
            } => self.on_duel_choice(participant_id, duel_id, choice).await,
            RoomCommand::DuelResultClaim {
                participant_id,
                duel_id,
                winner_id,
            } => self.on_duel_result_claim(participant_id, duel_id, winner_id),
            RoomCommand::SchedulePropose {
                participant_id,
                pin_id,
                target_day,
            } => self.on_propose(participant_id, pin_id, target_day).await,
            RoomCommand::BallotSubmit {
                participant_id,
                vote_id,
                agree,
            } => self.on_ballot(participant_id, vote_id, agree).await,
            RoomCommand::ScheduleDirectSet {
                participant_id,
                pin_id,
                day,
                time_slot,
            } => self.on_direct_set(participant_id, pin_id, day, time_slot).await,
            RoomCommand::AssistantStatus { thinking } => self.on_assistant(thinking).await,
            RoomCommand::DuelDeadline {
                pin_id,
                duel_id,
                round,
            } => self.on_duel_deadline(pin_id, duel_id, round).await,
            RoomCommand::VoteDeadline { pin_id, vote_id } => {
                self.on_vote_deadline(pin_id, vote_id).await
            }
        }
    }

    // --- membership and presence ---

    async fn on_join(
        &mut self,
        conn_id: ConnId,
        participant_id: String,
        tx: mpsc::Sender<ServerMessage>,
    ) {
        // Room must be readable before the member counts as joined
        let loaded = {
            let db = self.db.lock().await;
            load_snapshot_data(&db, &self.room_id, &participant_id)
        };
        let (trips, canvas, stored_profile) = match loaded {
            Ok(data) => data,
            Err(e) => {
                error!(room_id = %self.room_id, error = %e, "Join failed to load room state");
                let _ = tx
                    .send(ServerMessage::Rejected {
                        reason: "room state unavailable".to_string(),
                        retryable: true,
                    })
                    .await;
                // A task spawned solely for this failed join must not linger
                if self.members.is_empty() {
                    self.stopping = true;
                }
                return;
            }
        };
        invariants::assert_replay_invariants(&canvas);

        // Restore the monotonic canvas clock from the replay tail
        if let Some(last) = canvas.last() {
            if self.last_canvas_at.map_or(true, |t| t < last.created_at) {
                self.last_canvas_at = Some(last.created_at);
            }
        }

        let participant =
            stored_profile.unwrap_or_else(|| Participant::new(participant_id.clone()));

        // A reconnect replaces the previous presence entry for this identity
        self.members.insert(
            participant_id.clone(),
            Member {
                conn_id,
                participant,
                cursor: None,
                tx: tx.clone(),
            },
        );
        debug!(room_id = %self.room_id, participant_id = %participant_id, "Participant joined");

        // Identity only; nickname/avatar follow via profile-updated
        self.broadcast_except(
            &participant_id,
            ServerMessage::PresenceJoined {
                room_id: self.room_id.clone(),
                participant_id: participant_id.clone(),
            },
        )
        .await;

        let snapshot = RoomSnapshot {
            room_id: self.room_id.clone(),
            members: self.members.values().map(|m| m.participant.clone()).collect(),
            trips,
            canvas,
            ai_thinking: self.ai_thinking,
        };
        let _ = tx.send(ServerMessage::RoomSnapshot(snapshot)).await;
    }

    fn on_leave(&mut self, conn_id: ConnId) {
        let departed = self
            .members
            .iter()
            .find(|(_, m)| m.conn_id == conn_id)
            .map(|(id, _)| id.clone());

        if let Some(participant_id) = departed {
            self.members.remove(&participant_id);
            // No departure broadcast: accepted gap carried from the source app
            debug!(room_id = %self.room_id, participant_id = %participant_id, "Participant left");

            if self.members.is_empty() {
                self.stopping = true;
            }
        }
    }

    async fn on_profile(&mut self, participant_id: String, nickname: String, avatar_url: String) {
        if !self.members.contains_key(&participant_id) {
            warn!(room_id = %self.room_id, participant_id = %participant_id, "Profile update from non-member");
            return;
        }

        let participant = Participant {
            id: participant_id.clone(),
            nickname,
            avatar_url,
        };

        // Confirmed-persisted before any client (including the sender) sees it
        let persisted = {
            let db = self.db.lock().await;
            db.upsert_participant(&participant)
        };
        if let Err(e) = persisted {
            error!(room_id = %self.room_id, error = %e, "Profile persist failed");
            self.reject(&participant_id, "profile not saved", true).await;
            return;
        }

        if let Some(member) = self.members.get_mut(&participant_id) {
            member.participant = participant.clone();
        }
        self.broadcast(ServerMessage::ProfileUpdated {
            room_id: self.room_id.clone(),
            participant,
        })
        .await;
    }

    async fn on_cursor(&mut self, participant_id: String, position: CursorPosition) {
        let Some(member) = self.members.get_mut(&participant_id) else {
            return;
        };
        member.cursor = Some(position);

        // Sender excluded: clients render their own cursor locally
        let msg = ServerMessage::CursorMoved {
            room_id: self.room_id.clone(),
            participant_id: participant_id.clone(),
            position,
        };
        self.broadcast_except(&participant_id, msg).await;
    }

    // --- canvas ---

    async fn on_draw(&mut self, participant_id: String, kind: StrokeKind, payload: StrokePayload) {
        if !self.members.contains_key(&participant_id) {
            warn!(room_id = %self.room_id, participant_id = %participant_id, "Draw from non-member");
            return;
        }

        let mut event = CanvasEvent::new(&self.room_id, &participant_id, kind, payload);
        if let Some(last) = self.last_canvas_at {
            if event.created_at < last {
                event.created_at = last;
            }
        }

        let persisted = {
            let db = self.db.lock().await;
            db.append_event(&event)
        };
        if let Err(e) = persisted {
            error!(room_id = %self.room_id, error = %e, "Canvas append failed");
            self.reject(&participant_id, "stroke not recorded", true).await;
            return;
        }
        self.last_canvas_at = Some(event.created_at);

        // Author included: all clients share one source of truth
        self.broadcast(ServerMessage::DrawApplied { event }).await;
    }

    async fn on_undo(&mut self, participant_id: String) {
        if !self.members.contains_key(&participant_id) {
            return;
        }

        let result = {
            let db = self.db.lock().await;
            match db.latest_active_event(&self.room_id) {
                Ok(Some(event)) => db.mark_event_undone(event.id).map(|()| Some(event.id)),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            }
        };

        match result {
            // Nothing left to undo: a no-op, not an error, and no broadcast
            Ok(None) => {
                debug!(room_id = %self.room_id, "Undo requested on empty canvas");
            }
            Ok(Some(event_id)) => {
                self.broadcast(ServerMessage::UndoApplied {
                    room_id: self.room_id.clone(),
                    event_id,
                })
                .await;
            }
            Err(e) => {
                error!(room_id = %self.room_id, error = %e, "Undo persist failed");
                self.reject(&participant_id, "undo not recorded", true).await;
            }
        }
    }

    // --- trips and pins ---

    async fn on_trip_create(&mut self, participant_id: String, title: String) {
        if !self.members.contains_key(&participant_id) {
            return;
        }

        let trip = Trip::new(&self.room_id, title);
        let persisted = {
            let db = self.db.lock().await;
            db.create_trip(&trip)
        };
        if let Err(e) = persisted {
            error!(room_id = %self.room_id, error = %e, "Trip persist failed");
            self.reject(&participant_id, "trip not saved", true).await;
            return;
        }
        self.broadcast(ServerMessage::TripCreated { trip }).await;
    }

    async fn on_pin_create(
        &mut self,
        participant_id: String,
        trip_id: Uuid,
        name: String,
        lat: f64,
        lng: f64,
    ) {
        if !self.members.contains_key(&participant_id) {
            return;
        }

        let pin = Pin::new(trip_id, &self.room_id, name, lat, lng);
        let persisted = {
            let db = self.db.lock().await;
            match db.find_trip_by_id(trip_id) {
                Ok(Some(_)) => db.create_pin(&pin).map(|()| true),
                Ok(None) => Ok(false),
                Err(e) => Err(e),
            }
        };
        match persisted {
            Ok(true) => self.broadcast(ServerMessage::PinCreated { pin }).await,
            Ok(false) => self.reject(&participant_id, "unknown trip", false).await,
            Err(e) => {
                error!(room_id = %self.room_id, error = %e, "Pin persist failed");
                self.reject(&participant_id, "pin not saved", true).await;
            }
        }
    }

    async fn on_pin_list(&mut self, participant_id: String, trip_id: Uuid) {
        let Some(member) = self.members.get(&participant_id) else {
            return;
        };

        let listed = {
            let db = self.db.lock().await;
            db.list_pins_for_trip(trip_id)
        };
        match listed {
            Ok(pins) => {
                // Requester only; pin changes reach the room via broadcasts
                let _ = member
                    .tx
                    .send(ServerMessage::PinList {
                        room_id: self.room_id.clone(),
                        trip_id,
                        pins,
                    })
                    .await;
            }
            Err(e) => {
                error!(room_id = %self.room_id, error = %e, "Pin list failed");
                self.reject(&participant_id, "room state unavailable", true).await;
            }
        }
    }

    // --- duel protocol ---

    async fn on_drag_start(&mut self, participant_id: String, pin_id: Uuid) {
        if !self.members.contains_key(&participant_id) {
            warn!(room_id = %self.room_id, participant_id = %participant_id, "Drag from non-member");
            return;
        }
        if self.has_arbitration(pin_id) {
            self.reject(&participant_id, "pin is under arbitration", false).await;
            return;
        }

        let now = Instant::now();
        // Claims older than the window are dead; drop them all so the map
        // stays bounded by pins currently being dragged
        let window = self.config.drag_window;
        self.drag_claims
            .retain(|_, claim| now.duration_since(claim.at) <= window);

        let collision = match self.drag_claims.get(&pin_id) {
            Some(claim) if claim.participant_id != participant_id => {
                Some(claim.participant_id.clone())
            }
            _ => None,
        };

        match collision {
            Some(challenger) => {
                self.drag_claims.remove(&pin_id);
                let duel = Duel::new(pin_id, challenger.clone(), participant_id.clone());
                invariants::assert_duel_invariants(&duel);
                let (duel_id, round) = (duel.id, duel.round);
                self.duels.insert(pin_id, duel);

                info!(
                    room_id = %self.room_id,
                    %pin_id,
                    %duel_id,
                    challenger = %challenger,
                    defender = %participant_id,
                    "Drag collision; duel opened"
                );
                // Whole room gets the challenge so non-parties can spectate
                self.broadcast(ServerMessage::ChallengeOpened {
                    room_id: self.room_id.clone(),
                    duel_id,
                    pin_id,
                    challenger,
                    defender: participant_id,
                    round,
                    deadline_ms: self.config.duel_deadline.as_millis() as u64,
                })
                .await;
                self.schedule_duel_deadline(pin_id, duel_id, round);
            }
            None => {
                // Lone claim: remember it for the collision window and record
                // the advisory soft lock (never enforced)
                self.drag_claims.insert(
                    pin_id,
                    DragClaim {
                        participant_id: participant_id.clone(),
                        at: now,
                    },
                );
                let locked_until = Utc::now()
                    + chrono::Duration::milliseconds(self.config.drag_window.as_millis() as i64);
                let db = self.db.lock().await;
                if let Err(e) =
                    db.set_pin_soft_lock(pin_id, Some(participant_id.as_str()), Some(locked_until))
                {
                    // Advisory state only; the claim itself lives in memory
                    warn!(room_id = %self.room_id, error = %e, "Soft lock not recorded");
                }
            }
        }
    }

    async fn on_duel_choice(&mut self, participant_id: String, duel_id: Uuid, choice: Choice) {
        if !self.members.contains_key(&participant_id) {
            warn!(room_id = %self.room_id, participant_id = %participant_id, "Choice from non-member");
            return;
        }

        let submitted = {
            let Some(duel) = self.duels.values_mut().find(|d| d.id == duel_id) else {
                // Already resolved or expired: stale reference, no-op
                debug!(room_id = %self.room_id, %duel_id, "Choice for unknown duel ignored");
                return;
            };
            let result = duel.submit(&participant_id, choice);
            (result, duel.pin_id, duel.round)
        };
        let (result, pin_id, round) = submitted;

        match result {
            Err(e) => {
                warn!(room_id = %self.room_id, %duel_id, error = %e, "Duel choice rejected");
                self.reject(&participant_id, "not your duel", false).await;
            }
            Ok(progress) => {
                self.broadcast(ServerMessage::ChoiceReceived {
                    room_id: self.room_id.clone(),
                    duel_id,
                    participant_id,
                })
                .await;

                match progress {
                    DuelProgress::Waiting => {}
                    DuelProgress::Tie => {
                        // Never silently broken: rethrow with a fresh deadline
                        info!(room_id = %self.room_id, %duel_id, round, "Duel tied; restarting");
                        let (challenger, defender) = {
                            // Duel is still in the slot; round was bumped by submit
                            match self.duels.get(&pin_id) {
                                Some(d) => (d.challenger.clone(), d.defender.clone()),
                                None => return,
                            }
                        };
                        self.broadcast(ServerMessage::ChallengeOpened {
                            room_id: self.room_id.clone(),
                            duel_id,
                            pin_id,
                            challenger,
                            defender,
                            round,
                            deadline_ms: self.config.duel_deadline.as_millis() as u64,
                        })
                        .await;
                        self.schedule_duel_deadline(pin_id, duel_id, round);
                    }
                    DuelProgress::Won { winner, loser } => {
                        self.duels.remove(&pin_id);
                        self.clear_soft_lock(pin_id).await;
                        info!(room_id = %self.room_id, %duel_id, winner = %winner, "Duel resolved");
                        self.broadcast(ServerMessage::DuelResolved {
                            room_id: self.room_id.clone(),
                            duel_id,
                            pin_id,
                            winner_id: winner,
                            loser_id: loser,
                        })
                        .await;
                    }
                }
            }
        }
    }

    /// The coordinator is the sole authority on outcomes; a client-announced
    /// result is logged and dropped, whether or not the duel is still live.
    fn on_duel_result_claim(&mut self, participant_id: String, duel_id: Uuid, winner_id: String) {
        debug!(
            room_id = %self.room_id,
            %duel_id,
            claimed_by = %participant_id,
            claimed_winner = %winner_id,
            "Ignoring client-asserted duel result"
        );
    }

    async fn on_duel_deadline(&mut self, pin_id: Uuid, duel_id: Uuid, round: u32) {
        let expired = matches!(
            self.duels.get(&pin_id),
            Some(d) if d.id == duel_id && d.round == round
        );
        if !expired {
            // Resolved or restarted before the timer fired
            return;
        }

        self.duels.remove(&pin_id);
        self.clear_soft_lock(pin_id).await;
        info!(room_id = %self.room_id, %pin_id, %duel_id, "Duel expired without choices");
        self.broadcast(ServerMessage::DuelExpired {
            room_id: self.room_id.clone(),
            duel_id,
            pin_id,
        })
        .await;
    }

    // --- vote protocol ---

    async fn on_propose(&mut self, participant_id: String, pin_id: Uuid, target_day: u32) {
        if !self.members.contains_key(&participant_id) {
            warn!(room_id = %self.room_id, participant_id = %participant_id, "Proposal from non-member");
            return;
        }
        if self.has_arbitration(pin_id) {
            // The pre-existing arbitration is unaffected
            self.reject(&participant_id, "pin is under arbitration", false).await;
            return;
        }

        let known_pin = {
            let db = self.db.lock().await;
            db.find_pin_by_id(pin_id)
        };
        match known_pin {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.reject(&participant_id, "unknown pin", false).await;
                return;
            }
            Err(e) => {
                error!(room_id = %self.room_id, error = %e, "Pin lookup failed");
                self.reject(&participant_id, "room state unavailable", true).await;
                return;
            }
        }

        // Quorum is the membership size at vote start
        let vote = Vote::new(pin_id, target_day, participant_id, self.members.len());
        invariants::assert_vote_invariants(&vote);
        let (vote_id, initiator, quorum) = (vote.id, vote.initiator.clone(), vote.quorum);
        self.votes.insert(pin_id, vote);

        info!(room_id = %self.room_id, %pin_id, %vote_id, target_day, quorum, "Vote opened");
        self.broadcast(ServerMessage::VoteOpened {
            room_id: self.room_id.clone(),
            vote_id,
            pin_id,
            target_day,
            initiator_id: initiator,
            quorum,
            deadline_ms: self.config.vote_deadline.as_millis() as u64,
        })
        .await;
        self.schedule_vote_deadline(pin_id, vote_id);
    }

    async fn on_ballot(&mut self, participant_id: String, vote_id: Uuid, agree: bool) {
        if !self.members.contains_key(&participant_id) {
            warn!(room_id = %self.room_id, participant_id = %participant_id, "Ballot from non-member");
            return;
        }

        let cast = {
            let Some(vote) = self.votes.values_mut().find(|v| v.id == vote_id) else {
                // Finalized or expired: a late ballot has no effect
                debug!(room_id = %self.room_id, %vote_id, "Ballot for unknown vote ignored");
                return;
            };
            vote.cast(&participant_id, agree);
            invariants::assert_vote_invariants(vote);
            (vote.pin_id, vote.ballot_count(), vote.is_complete())
        };
        let (pin_id, ballots, complete) = cast;

        self.broadcast(ServerMessage::BallotReceived {
            room_id: self.room_id.clone(),
            vote_id,
            participant_id,
            ballots,
        })
        .await;

        // All expected ballots in: finalize early rather than waiting out the clock
        if complete {
            self.finalize_vote(pin_id).await;
        }
    }

    async fn on_vote_deadline(&mut self, pin_id: Uuid, vote_id: Uuid) {
        let live = matches!(self.votes.get(&pin_id), Some(v) if v.id == vote_id);
        if live {
            self.finalize_vote(pin_id).await;
        }
    }

    async fn finalize_vote(&mut self, pin_id: Uuid) {
        let Some(vote) = self.votes.remove(&pin_id) else {
            return;
        };
        let outcome = vote.tally();
        let mut passed = outcome.passed;
        let mut time_slot = None;

        if passed {
            // The vote moves the day only; the pin's time slot is preserved
            // and the broadcast must carry the slot as committed
            let applied = {
                let db = self.db.lock().await;
                match db.find_pin_by_id(vote.pin_id) {
                    Ok(Some(pin)) => {
                        let slot = pin.time_slot;
                        db.set_pin_schedule(vote.pin_id, vote.target_day, slot.as_deref())
                            .map(|()| slot)
                    }
                    Ok(None) => Err(waypoint_core::Error::NotFound(format!(
                        "pin {}",
                        vote.pin_id
                    ))),
                    Err(e) => Err(e),
                }
            };
            match applied {
                Ok(slot) => time_slot = slot,
                Err(e) => {
                    // Not durable, so not applied: degrade to no state change
                    // and tell the initiator it can be retried
                    error!(room_id = %self.room_id, %pin_id, error = %e, "Vote result persist failed");
                    self.reject(&vote.initiator, "schedule not saved", true).await;
                    passed = false;
                }
            }
        }

        info!(
            room_id = %self.room_id,
            vote_id = %vote.id,
            %pin_id,
            passed,
            agree = outcome.agree,
            disagree = outcome.disagree,
            "Vote finalized"
        );
        self.broadcast(ServerMessage::VoteResolved {
            room_id: self.room_id.clone(),
            vote_id: vote.id,
            pin_id,
            passed,
            agree: outcome.agree,
            disagree: outcome.disagree,
        })
        .await;

        if passed {
            self.broadcast(ServerMessage::ScheduleUpdated {
                room_id: self.room_id.clone(),
                pin_id,
                day: vote.target_day,
                time_slot,
                participant_id: vote.initiator,
            })
            .await;
        }
    }

    // --- direct scheduling ---

    async fn on_direct_set(
        &mut self,
        participant_id: String,
        pin_id: Uuid,
        day: u32,
        time_slot: Option<String>,
    ) {
        if !self.members.contains_key(&participant_id) {
            return;
        }
        if self.has_arbitration(pin_id) {
            // Contested pins change only through their arbitration
            self.reject(&participant_id, "pin is under arbitration", false).await;
            return;
        }

        // A completed drag supersedes the pending claim
        self.drag_claims.remove(&pin_id);

        let persisted = {
            let db = self.db.lock().await;
            match db.find_pin_by_id(pin_id) {
                Ok(Some(_)) => db
                    .set_pin_schedule(pin_id, day, time_slot.as_deref())
                    .and_then(|()| db.set_pin_soft_lock(pin_id, None, None))
                    .map(|()| true),
                Ok(None) => Ok(false),
                Err(e) => Err(e),
            }
        };
        match persisted {
            Ok(true) => {
                self.broadcast(ServerMessage::ScheduleUpdated {
                    room_id: self.room_id.clone(),
                    pin_id,
                    day,
                    time_slot,
                    participant_id,
                })
                .await;
            }
            Ok(false) => self.reject(&participant_id, "unknown pin", false).await,
            Err(e) => {
                error!(room_id = %self.room_id, %pin_id, error = %e, "Schedule persist failed");
                self.reject(&participant_id, "schedule not saved", true).await;
            }
        }
    }

    // --- assistant flag ---

    async fn on_assistant(&mut self, thinking: bool) {
        self.ai_thinking = thinking;
        self.broadcast(ServerMessage::AssistantStatus {
            room_id: self.room_id.clone(),
            thinking,
        })
        .await;
    }

    // --- plumbing ---

    fn has_arbitration(&self, pin_id: Uuid) -> bool {
        self.duels.contains_key(&pin_id) || self.votes.contains_key(&pin_id)
    }

    fn schedule_duel_deadline(&self, pin_id: Uuid, duel_id: Uuid, round: u32) {
        let tx = self.self_tx.clone();
        let deadline = self.config.duel_deadline;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let _ = tx.send(RoomCommand::DuelDeadline {
                pin_id,
                duel_id,
                round,
            })
            .await;
        });
    }

    fn schedule_vote_deadline(&self, pin_id: Uuid, vote_id: Uuid) {
        let tx = self.self_tx.clone();
        let deadline = self.config.vote_deadline;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let _ = tx.send(RoomCommand::VoteDeadline { pin_id, vote_id }).await;
        });
    }

    async fn clear_soft_lock(&self, pin_id: Uuid) {
        let db = self.db.lock().await;
        if let Err(e) = db.set_pin_soft_lock(pin_id, None, None) {
            warn!(room_id = %self.room_id, %pin_id, error = %e, "Soft lock not cleared");
        }
    }

    async fn broadcast(&self, msg: ServerMessage) {
        for member in self.members.values() {
            if member.tx.send(msg.clone()).await.is_err() {
                debug!(room_id = %self.room_id, participant_id = %member.participant.id, "Failed to queue message");
            }
        }
    }

    async fn broadcast_except(&self, except: &str, msg: ServerMessage) {
        for (id, member) in &self.members {
            if id != except && member.tx.send(msg.clone()).await.is_err() {
                debug!(room_id = %self.room_id, participant_id = %id, "Failed to queue message");
            }
        }
    }

    async fn reject(&self, participant_id: &str, reason: &str, retryable: bool) {
        if let Some(member) = self.members.get(participant_id) {
            let _ = member
                .tx
                .send(ServerMessage::Rejected {
                    reason: reason.to_string(),
                    retryable,
                })
                .await;
        }
    }
}

fn load_snapshot_data(
    db: &Database,
    room_id: &str,
    participant_id: &str,
) -> waypoint_core::Result<(Vec<Trip>, Vec<CanvasEvent>, Option<Participant>)> {
    Ok((
        db.list_trips_for_room(room_id)?,
        db.active_events(room_id)?,
        db.find_participant_by_id(participant_id)?,
    ))
}
