//! Room session state machine.
//!
//! A `GameRoom` holds the authoritative state for one room: board, turn,
//! seats, and any pending swap offer. Every mutating method validates
//! against the current state before touching anything, so a rejected
//! request leaves the room exactly as it was. The methods are synchronous;
//! the server serializes access per room through the registry's entry lock.

use gomoku_core::{
    apply_move, check_win, legality_check, Board, IllegalMove, Move, Player, RuleMode,
};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{Role, RoomSnapshot, SeatInfo};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("you are not in this room")]
    NotAttached,

    #[error("spectators cannot move")]
    SpectatorCannotMove,

    #[error("the game is already over")]
    GameConcluded,

    #[error("not your turn")]
    NotYourTurn,

    #[error(transparent)]
    Illegal(#[from] IllegalMove),

    #[error("that seat is taken")]
    SeatTaken,

    #[error("you are not seated")]
    NotSeated,

    #[error("rules are locked once the first move is played")]
    RuleLockedAfterFirstMove,

    #[error("the opposite seat is empty")]
    OpponentSeatEmpty,

    #[error("at least one side is not seated")]
    PeerNotSeated,

    #[error("the other player has disconnected")]
    PeerDisconnected,
}

/// A connection's record in a room.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub name: String,
    pub role: Role,
}

/// The one pending color-swap offer, if any. Superseded by a newer offer,
/// cleared on accept or decline, never persisted across teardown.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOffer {
    pub from: Uuid,
    pub from_name: String,
}

/// Authoritative state for one room.
pub struct GameRoom {
    pub id: String,
    board: Board,
    pub rule_mode: RuleMode,
    pub turn: Player,
    pub winner: Option<Player>,
    pub last_move: Option<Move>,
    pub players: HashMap<Uuid, RoomPlayer>,
    swap_offer: Option<SwapOffer>,
}

impl GameRoom {
    /// A fresh room: empty board, Black to move, freestyle rules.
    pub fn new(id: String) -> Self {
        Self {
            id,
            board: Board::standard(),
            rule_mode: RuleMode::Freestyle,
            turn: Player::Black,
            winner: None,
            last_move: None,
            players: HashMap::new(),
            swap_offer: None,
        }
    }

    pub fn occupant_count(&self) -> usize {
        self.players.len()
    }

    /// Register a new connection as a spectator.
    pub fn attach(&mut self, conn_id: Uuid, name: String) {
        self.players.insert(conn_id, RoomPlayer { name, role: Role::Spectator });
    }

    /// Remove a connection. Returns true when the room is now empty and
    /// should be discarded.
    pub fn detach(&mut self, conn_id: Uuid) -> bool {
        self.players.remove(&conn_id);
        if matches!(&self.swap_offer, Some(offer) if offer.from == conn_id) {
            self.swap_offer = None;
        }
        self.players.is_empty()
    }

    pub fn player(&self, conn_id: Uuid) -> Option<&RoomPlayer> {
        self.players.get(&conn_id)
    }

    /// The connection currently holding a seat color, if any.
    pub fn seat_holder(&self, seat: Player) -> Option<Uuid> {
        self.players
            .iter()
            .find(|(_, p)| p.role == Role::from(seat))
            .map(|(id, _)| *id)
    }

    /// Claim a seat. Re-claiming one's own seat is a no-op success.
    pub fn seat_join(&mut self, conn_id: Uuid, seat: Player) -> Result<Role, RoomError> {
        if matches!(self.seat_holder(seat), Some(holder) if holder != conn_id) {
            return Err(RoomError::SeatTaken);
        }
        let role = Role::from(seat);
        let player = self.players.get_mut(&conn_id).ok_or(RoomError::NotAttached)?;
        player.role = role;
        Ok(role)
    }

    /// Give up a seat and return to spectating.
    pub fn seat_leave(&mut self, conn_id: Uuid) -> Result<(), RoomError> {
        let player = self.players.get_mut(&conn_id).ok_or(RoomError::NotAttached)?;
        if !player.role.is_seated() {
            return Err(RoomError::NotSeated);
        }
        player.role = Role::Spectator;
        Ok(())
    }

    /// Change the ruleset. Allowed only while no stone has been played.
    pub fn set_rule(&mut self, rule: RuleMode) -> Result<(), RoomError> {
        if self.last_move.is_some() {
            return Err(RoomError::RuleLockedAfterFirstMove);
        }
        self.rule_mode = rule;
        Ok(())
    }

    /// Validate and apply a stone placement. On success the move is folded
    /// into the board, `last_move` updated, and either the winner is set or
    /// the turn flips.
    pub fn play_move(&mut self, conn_id: Uuid, x: usize, y: usize) -> Result<Move, RoomError> {
        let player = self.players.get(&conn_id).ok_or(RoomError::NotAttached)?;
        let color = player.role.as_player().ok_or(RoomError::SpectatorCannotMove)?;
        if self.winner.is_some() {
            return Err(RoomError::GameConcluded);
        }
        if self.turn != color {
            return Err(RoomError::NotYourTurn);
        }

        // Authoritative re-check; the client's pre-validation may be stale.
        legality_check(&self.board, x, y, color, self.rule_mode)?;

        let mv = Move { x, y, player: color };
        self.board = apply_move(&self.board, mv);
        self.last_move = Some(mv);

        if check_win(&self.board, mv, self.rule_mode) {
            self.winner = Some(color);
        } else {
            self.turn = self.turn.opponent();
        }
        Ok(mv)
    }

    /// Record a swap offer toward the opposite seat's occupant. Returns the
    /// target connection and the offer to deliver.
    pub fn request_swap(&mut self, conn_id: Uuid) -> Result<(Uuid, SwapOffer), RoomError> {
        let player = self.players.get(&conn_id).ok_or(RoomError::NotAttached)?;
        let color = player.role.as_player().ok_or(RoomError::NotSeated)?;
        let target = self
            .seat_holder(color.opponent())
            .ok_or(RoomError::OpponentSeatEmpty)?;

        let offer = SwapOffer { from: conn_id, from_name: player.name.clone() };
        self.swap_offer = Some(offer.clone());
        Ok((target, offer))
    }

    /// Exchange the two seats atomically. Returns the accepter's and the
    /// offerer's new roles.
    pub fn accept_swap(&mut self, conn_id: Uuid, from: Uuid) -> Result<(Role, Role), RoomError> {
        let my_role = self.players.get(&conn_id).ok_or(RoomError::NotAttached)?.role;
        let peer_role = self.players.get(&from).ok_or(RoomError::PeerDisconnected)?.role;
        if !my_role.is_seated() || !peer_role.is_seated() {
            return Err(RoomError::PeerNotSeated);
        }

        if let Some(p) = self.players.get_mut(&conn_id) {
            p.role = peer_role;
        }
        if let Some(p) = self.players.get_mut(&from) {
            p.role = my_role;
        }
        self.swap_offer = None;
        Ok((peer_role, my_role))
    }

    /// Clear any pending offer; returns whoever asked, so they can be told.
    /// Declining with nothing pending is a no-op.
    pub fn decline_swap(&mut self) -> Option<Uuid> {
        self.swap_offer.take().map(|offer| offer.from)
    }

    /// Fresh board, same ruleset, same seats.
    pub fn rematch(&mut self) {
        self.board = Board::standard();
        self.turn = Player::Black;
        self.winner = None;
        self.last_move = None;
        self.swap_offer = None;
    }

    /// Player list in public form.
    pub fn players_info(&self) -> Vec<SeatInfo> {
        self.players
            .values()
            .map(|p| SeatInfo { name: p.name.clone(), role: p.role })
            .collect()
    }

    /// Roles per connection, for private role notifications.
    pub fn roles(&self) -> Vec<(Uuid, Role)> {
        self.players.iter().map(|(id, p)| (*id, p.role)).collect()
    }

    /// Full public snapshot of the room.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            board: self.board.rows(),
            size: self.board.size(),
            turn: self.turn,
            winner: self.winner,
            last_move: self.last_move,
            rule_mode: self.rule_mode,
            players: self.players_info(),
            updated_at: unix_millis(),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
