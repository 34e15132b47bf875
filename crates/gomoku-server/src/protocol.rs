//! WebSocket protocol messages between a connection and its room.

use gomoku_core::{Move, Player, RuleMode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a connection currently is in a room. Spectator is a first-class
/// state, not an absent seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "B")]
    Black,
    #[serde(rename = "W")]
    White,
    #[serde(rename = "S")]
    Spectator,
}

impl Role {
    pub fn is_seated(self) -> bool {
        self != Role::Spectator
    }

    /// The seat color, if seated.
    pub fn as_player(self) -> Option<Player> {
        match self {
            Role::Black => Some(Player::Black),
            Role::White => Some(Player::White),
            Role::Spectator => None,
        }
    }
}

impl From<Player> for Role {
    fn from(player: Player) -> Role {
        match player {
            Player::Black => Role::Black,
            Player::White => Role::White,
        }
    }
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Request a full state snapshot
    #[serde(rename = "sync:ask")]
    SyncAsk,

    /// Place a stone
    #[serde(rename = "move")]
    Move { x: usize, y: usize },

    /// Change the ruleset (only before the first move)
    #[serde(rename = "rule:set")]
    RuleSet { rule: RuleMode },

    /// Take a seat
    #[serde(rename = "seat:join")]
    SeatJoin { role: Player },

    /// Give up the current seat
    #[serde(rename = "seat:leave")]
    SeatLeave,

    /// Offer to swap colors with the opponent
    #[serde(rename = "swap:ask")]
    SwapAsk,

    /// Accept a pending swap offer
    #[serde(rename = "swap:accept")]
    SwapAccept { from: Uuid },

    /// Decline a pending swap offer
    #[serde(rename = "swap:decline")]
    SwapDecline,

    /// Reset the board for another game
    #[serde(rename = "rematch")]
    Rematch,
}

/// Messages sent from server to client.
///
/// Internally tagged so `state` can carry its `you` sibling next to the
/// payload, matching the wire shape clients expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full room snapshot; `you` is present when the snapshot is a direct
    /// reply to the receiving connection
    #[serde(rename = "state")]
    State {
        payload: RoomSnapshot,
        #[serde(skip_serializing_if = "Option::is_none")]
        you: Option<YouInfo>,
    },

    /// The receiving connection's own role changed (or was confirmed)
    #[serde(rename = "you:role")]
    YouRole { payload: RolePayload },

    /// The room's player list changed
    #[serde(rename = "players")]
    Players { payload: PlayersPayload },

    /// A stone was placed
    #[serde(rename = "move")]
    MovePlayed { payload: MovePayload },

    /// The ruleset changed
    #[serde(rename = "rule")]
    Rule { payload: RulePayload },

    /// Someone offered the receiver a color swap
    #[serde(rename = "swap:offer")]
    SwapOffer { payload: SwapOfferPayload },

    /// A swap offer was resolved
    #[serde(rename = "swap:result")]
    SwapResult { payload: SwapResultPayload },

    /// Request failed; sent to the offending connection only
    #[serde(rename = "error")]
    Error { message: String },
}

/// Public room state, safe to show to every connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: String,
    /// Rows of cell codes: 0 empty, 1 black, 2 white
    pub board: Vec<Vec<u8>>,
    pub size: usize,
    pub turn: Player,
    pub winner: Option<Player>,
    pub last_move: Option<Move>,
    pub rule_mode: RuleMode,
    pub players: Vec<SeatInfo>,
    /// Unix millis of the snapshot
    pub updated_at: u64,
}

/// One entry of the public player list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatInfo {
    pub name: String,
    pub role: Role,
}

/// The receiving connection's own identity within a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouInfo {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePayload {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayersPayload {
    pub players: Vec<SeatInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub x: usize,
    pub y: usize,
    pub player: Player,
    pub turn: Player,
    pub winner: Option<Player>,
    pub last_move: Option<Move>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePayload {
    pub rule_mode: RuleMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapOfferPayload {
    pub from: Uuid,
    pub from_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResultPayload {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_shapes() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"move","payload":{"x":7,"y":8}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Move { x: 7, y: 8 }));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"sync:ask"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::SyncAsk));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"rule:set","payload":{"rule":"taraguchi10"}}"#)
                .unwrap();
        assert!(matches!(msg, ClientMessage::RuleSet { rule: RuleMode::Taraguchi10 }));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"seat:join","payload":{"role":"W"}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::SeatJoin { role: Player::White }));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"chat","payload":{}}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
        // Spectator is not a joinable seat.
        assert!(serde_json::from_str::<ClientMessage>(
            r#"{"type":"seat:join","payload":{"role":"S"}}"#
        )
        .is_err());
    }

    #[test]
    fn test_server_message_wire_shapes() {
        let msg = ServerMessage::YouRole {
            payload: RolePayload { role: Role::Spectator },
        };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"you:role","payload":{"role":"S"}}"#
        );

        let msg = ServerMessage::Error { message: "not your turn".into() };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"error","message":"not your turn"}"#
        );

        let msg = ServerMessage::SwapResult { payload: SwapResultPayload { ok: false } };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"swap:result","payload":{"ok":false}}"#
        );
    }

    #[test]
    fn test_move_payload_uses_camel_case() {
        let payload = MovePayload {
            x: 7,
            y: 7,
            player: Player::Black,
            turn: Player::White,
            winner: None,
            last_move: Some(Move { x: 7, y: 7, player: Player::Black }),
        };
        let json = serde_json::to_string(&ServerMessage::MovePlayed { payload }).unwrap();
        assert!(json.contains(r#""lastMove":{"#));
        assert!(json.contains(r#""winner":null"#));
        assert!(json.contains(r#""player":"B""#));
    }
}
