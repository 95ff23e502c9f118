//! Wire protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire. The
//! `type` tag carries the event name; payload fields sit beside it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use waypoint_core::{
    CanvasEvent, Choice, CursorPosition, Participant, Pin, StrokeKind, StrokePayload, Trip,
};

/// Everything a client needs to render a room on join: current members,
/// trips (pins are fetched per-trip on demand), the non-undone canvas
/// events in replay order, and the assistant flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub members: Vec<Participant>,
    pub trips: Vec<Trip>,
    pub canvas: Vec<CanvasEvent>,
    pub ai_thinking: bool,
}

/// Messages from client to coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join a room, subscribing this connection to its broadcasts
    Join {
        room_id: String,
        participant_id: String,
    },

    /// Leave a room
    Leave { room_id: String },

    /// Upsert nickname/avatar; broadcast to the whole room including sender
    ProfileUpdate {
        room_id: String,
        participant_id: String,
        nickname: String,
        avatar_url: String,
    },

    /// Latest cursor position; relayed to everyone but the sender
    CursorMove {
        room_id: String,
        participant_id: String,
        position: CursorPosition,
    },

    /// A drawing action to append to the room canvas
    DrawAction {
        room_id: String,
        participant_id: String,
        kind: StrokeKind,
        payload: StrokePayload,
    },

    /// Undo the most recent non-undone stroke in the room
    UndoRequest { room_id: String },

    /// Create a trip container in the room
    TripCreate { room_id: String, title: String },

    /// Drop a new pin on the map
    PinCreate {
        room_id: String,
        trip_id: Uuid,
        name: String,
        lat: f64,
        lng: f64,
    },

    /// Fetch a trip's pins (the join snapshot carries trips, not pins)
    PinList { room_id: String, trip_id: Uuid },

    /// Participant started dragging a pin
    DragStart {
        room_id: String,
        pin_id: Uuid,
        participant_id: String,
    },

    /// A duelist's rock/paper/scissors throw
    DuelChoice {
        room_id: String,
        duel_id: Uuid,
        participant_id: String,
        choice: Choice,
    },

    /// Client-asserted duel outcome. Advisory only: the coordinator derives
    /// the result from submitted choices and never applies this.
    DuelResult {
        room_id: String,
        duel_id: Uuid,
        winner_id: String,
        pin_id: Uuid,
    },

    /// Propose moving a pin to a day, opening a room vote
    SchedulePropose {
        room_id: String,
        pin_id: Uuid,
        participant_id: String,
        target_day: u32,
    },

    /// Cast (or overwrite) a ballot in an open vote
    BallotSubmit {
        room_id: String,
        vote_id: Uuid,
        participant_id: String,
        agree: bool,
    },

    /// Uncontested direct schedule assignment
    ScheduleDirectSet {
        room_id: String,
        pin_id: Uuid,
        participant_id: String,
        day: u32,
        time_slot: Option<String>,
    },

    /// Toggle the room's assistant-thinking flag
    AssistantStatus { room_id: String, thinking: bool },
}

/// Messages from coordinator to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent to a joiner after a successful join
    RoomSnapshot(RoomSnapshot),

    /// A participant joined; profile arrives later via profile-updated
    PresenceJoined {
        room_id: String,
        participant_id: String,
    },

    /// Confirmed, persisted profile fields
    ProfileUpdated {
        room_id: String,
        participant: Participant,
    },

    /// Another participant's cursor moved
    CursorMoved {
        room_id: String,
        participant_id: String,
        position: CursorPosition,
    },

    /// A drawing action was committed; echoed to everyone including the author
    DrawApplied { event: CanvasEvent },

    /// An event was flagged undone
    UndoApplied { room_id: String, event_id: Uuid },

    /// A trip was created
    TripCreated { trip: Trip },

    /// A pin was dropped
    PinCreated { pin: Pin },

    /// Reply to pin-list, sent to the requester only
    PinList {
        room_id: String,
        trip_id: Uuid,
        pins: Vec<Pin>,
    },

    /// Two participants grabbed the same pin; duel is on (spectators included)
    ChallengeOpened {
        room_id: String,
        duel_id: Uuid,
        pin_id: Uuid,
        challenger: String,
        defender: String,
        round: u32,
        deadline_ms: u64,
    },

    /// A duelist's choice is in (the choice itself stays hidden)
    ChoiceReceived {
        room_id: String,
        duel_id: Uuid,
        participant_id: String,
    },

    /// Decisive duel outcome
    DuelResolved {
        room_id: String,
        duel_id: Uuid,
        pin_id: Uuid,
        winner_id: String,
        loser_id: String,
    },

    /// Duel deadline passed with choices missing; arbitration abandoned
    DuelExpired {
        room_id: String,
        duel_id: Uuid,
        pin_id: Uuid,
    },

    /// A schedule vote opened
    VoteOpened {
        room_id: String,
        vote_id: Uuid,
        pin_id: Uuid,
        target_day: u32,
        initiator_id: String,
        quorum: usize,
        deadline_ms: u64,
    },

    /// A ballot was recorded
    BallotReceived {
        room_id: String,
        vote_id: Uuid,
        participant_id: String,
        ballots: usize,
    },

    /// Final vote outcome; on success the schedule change is already persisted
    VoteResolved {
        room_id: String,
        vote_id: Uuid,
        pin_id: Uuid,
        passed: bool,
        agree: usize,
        disagree: usize,
    },

    /// A pin's schedule assignment changed
    ScheduleUpdated {
        room_id: String,
        pin_id: Uuid,
        day: u32,
        time_slot: Option<String>,
        participant_id: String,
    },

    /// Room assistant flag changed
    AssistantStatus { room_id: String, thinking: bool },

    /// The action was not applied. `retryable` distinguishes transient
    /// persistence failures from protocol violations.
    Rejected { reason: String, retryable: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_uses_kebab_case_tags() {
        let msg = ClientMessage::ScheduleDirectSet {
            room_id: "room-1".to_string(),
            pin_id: Uuid::new_v4(),
            participant_id: "alice".to_string(),
            day: 2,
            time_slot: Some("morning".to_string()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"schedule-direct-set\""));

        let decoded: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(decoded, ClientMessage::ScheduleDirectSet { day: 2, .. }));
    }

    #[test]
    fn server_message_roundtrip() {
        let msg = ServerMessage::ChallengeOpened {
            room_id: "room-1".to_string(),
            duel_id: Uuid::new_v4(),
            pin_id: Uuid::new_v4(),
            challenger: "alice".to_string(),
            defender: "bob".to_string(),
            round: 1,
            deadline_ms: 7000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"challenge-opened\""));

        let decoded: ServerMessage = serde_json::from_str(&json).unwrap();
        match decoded {
            ServerMessage::ChallengeOpened { challenger, round, .. } => {
                assert_eq!(challenger, "alice");
                assert_eq!(round, 1);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }
}
