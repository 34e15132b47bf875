//! WebSocket server and connection handling.
//!
//! Each room's state lives in a `DashMap` entry; every mutating handler
//! runs synchronously while holding that entry's exclusive guard, so two
//! operations against the same room never interleave, no matter how many
//! connections feed it. Outbound messages go through per-connection
//! channels and never suspend a handler.

use crate::presence::PresenceRegistry;
use crate::protocol::{
    ClientMessage, MovePayload, PlayersPayload, Role, RolePayload, RulePayload, ServerMessage,
    SwapOfferPayload, SwapResultPayload, YouInfo,
};
use crate::room::{GameRoom, RoomError};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    /// All active rooms, created on first attach, removed on last detach
    pub rooms: DashMap<String, GameRoom>,
    /// Mapping from connection ID to its outbound message sender
    pub senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    /// Advisory occupancy registry for lobby listings
    pub presence: PresenceRegistry,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            senders: DashMap::new(),
            presence: PresenceRegistry::new(),
        }
    }

    /// Send a message to a single connection.
    pub fn send_to(&self, conn_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&conn_id) {
            let _ = sender.send(msg);
        }
    }

    /// Send a message to every connection in a room, spectators included.
    /// Must not be called while holding the room's mutable guard.
    pub fn broadcast_to_room(&self, room_id: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            for conn_id in room.players.keys() {
                self.send_to(*conn_id, msg.clone());
            }
        }
    }

    fn send_error(&self, conn_id: Uuid, err: &RoomError) {
        self.send_to(conn_id, ServerMessage::Error { message: err.to_string() });
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Gomoku server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection for its whole lifetime.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let mut uri: Option<Uri> = None;
    let ws_stream = accept_hdr_async(stream, |req: &Request, resp: Response| {
        uri = Some(req.uri().clone());
        Ok(resp)
    })
    .await?;

    let (room_id, name) = uri
        .as_ref()
        .and_then(parse_connect_uri)
        .ok_or_else(|| anyhow::anyhow!("rejected {}: expected /room/{{id}} path", addr))?;

    info!("New connection from {} to room {}", addr, room_id);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.senders.insert(conn_id, tx);

    // Forward messages from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    handle_attach(conn_id, &room_id, name, &state);

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(conn_id, &room_id, client_msg, &state),
                Err(_) => {
                    warn!("Malformed message from {}: {}", conn_id, text);
                    state.send_to(
                        conn_id,
                        ServerMessage::Error { message: "unknown or malformed message".into() },
                    );
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", conn_id);
                break;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", conn_id, e);
                break;
            }
            // Ping/Pong are answered at the protocol level
            _ => {}
        }
    }

    handle_disconnect(conn_id, &room_id, &state);
    state.senders.remove(&conn_id);
    send_task.abort();

    info!("Connection closed for {}", conn_id);
    Ok(())
}

/// Register a connection with its room and bring it up to date.
fn handle_attach(conn_id: Uuid, room_id: &str, name: String, state: &Arc<ServerState>) {
    let (snapshot, players, count) = {
        let mut room = state
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!("Creating room {}", room_id);
                GameRoom::new(room_id.to_string())
            });
        room.attach(conn_id, name.clone());
        (room.snapshot(), room.players_info(), room.occupant_count())
    };

    state.presence.report(room_id, count);
    state.send_to(
        conn_id,
        ServerMessage::State {
            payload: snapshot,
            you: Some(YouInfo { id: conn_id, name, role: Role::Spectator }),
        },
    );
    state.send_to(
        conn_id,
        ServerMessage::YouRole { payload: RolePayload { role: Role::Spectator } },
    );
    state.broadcast_to_room(room_id, ServerMessage::Players { payload: PlayersPayload { players } });
}

/// Handle one client message. Runs to completion before the connection's
/// next message is looked at; room mutations happen under the entry guard.
fn handle_message(conn_id: Uuid, room_id: &str, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::SyncAsk => {
            let reply = {
                let Some(room) = state.rooms.get(room_id) else { return };
                let you = room
                    .player(conn_id)
                    .map(|p| (p.name.clone(), p.role))
                    .unwrap_or_else(|| ("guest".into(), Role::Spectator));
                (room.snapshot(), you)
            };
            let (snapshot, (name, role)) = reply;
            state.send_to(
                conn_id,
                ServerMessage::State {
                    payload: snapshot,
                    you: Some(YouInfo { id: conn_id, name, role }),
                },
            );
            state.send_to(conn_id, ServerMessage::YouRole { payload: RolePayload { role } });
        }

        ClientMessage::Move { x, y } => {
            let result = {
                let Some(mut room) = state.rooms.get_mut(room_id) else { return };
                room.play_move(conn_id, x, y).map(|mv| MovePayload {
                    x: mv.x,
                    y: mv.y,
                    player: mv.player,
                    turn: room.turn,
                    winner: room.winner,
                    last_move: room.last_move,
                })
            };
            match result {
                Ok(payload) => {
                    debug!(
                        "Room {}: {:?} played ({}, {})",
                        room_id, payload.player, payload.x, payload.y
                    );
                    if let Some(winner) = payload.winner {
                        info!("Room {}: {:?} wins", room_id, winner);
                    }
                    state.broadcast_to_room(room_id, ServerMessage::MovePlayed { payload });
                }
                Err(e) => state.send_error(conn_id, &e),
            }
        }

        ClientMessage::RuleSet { rule } => {
            let result = {
                let Some(mut room) = state.rooms.get_mut(room_id) else { return };
                room.set_rule(rule)
            };
            match result {
                Ok(()) => state.broadcast_to_room(
                    room_id,
                    ServerMessage::Rule { payload: RulePayload { rule_mode: rule } },
                ),
                Err(e) => state.send_error(conn_id, &e),
            }
        }

        ClientMessage::SeatJoin { role } => {
            let result = {
                let Some(mut room) = state.rooms.get_mut(room_id) else { return };
                room.seat_join(conn_id, role)
                    .map(|r| (r, room.players_info(), room.occupant_count()))
            };
            match result {
                Ok((role, players, count)) => {
                    state.broadcast_to_room(
                        room_id,
                        ServerMessage::Players { payload: PlayersPayload { players } },
                    );
                    state.send_to(conn_id, ServerMessage::YouRole { payload: RolePayload { role } });
                    state.presence.report(room_id, count);
                }
                Err(e) => state.send_error(conn_id, &e),
            }
        }

        ClientMessage::SeatLeave => {
            let result = {
                let Some(mut room) = state.rooms.get_mut(room_id) else { return };
                room.seat_leave(conn_id)
                    .map(|_| (room.players_info(), room.occupant_count()))
            };
            match result {
                Ok((players, count)) => {
                    state.broadcast_to_room(
                        room_id,
                        ServerMessage::Players { payload: PlayersPayload { players } },
                    );
                    state.send_to(
                        conn_id,
                        ServerMessage::YouRole { payload: RolePayload { role: Role::Spectator } },
                    );
                    state.presence.report(room_id, count);
                }
                Err(e) => state.send_error(conn_id, &e),
            }
        }

        ClientMessage::SwapAsk => {
            let result = {
                let Some(mut room) = state.rooms.get_mut(room_id) else { return };
                room.request_swap(conn_id)
            };
            match result {
                Ok((target, offer)) => state.send_to(
                    target,
                    ServerMessage::SwapOffer {
                        payload: SwapOfferPayload { from: offer.from, from_name: offer.from_name },
                    },
                ),
                Err(e) => state.send_error(conn_id, &e),
            }
        }

        ClientMessage::SwapAccept { from } => {
            let result = {
                let Some(mut room) = state.rooms.get_mut(room_id) else { return };
                room.accept_swap(conn_id, from)
                    .map(|(my_role, peer_role)| (my_role, peer_role, room.players_info()))
            };
            match result {
                Ok((my_role, peer_role, players)) => {
                    state.send_to(conn_id, ServerMessage::YouRole { payload: RolePayload { role: my_role } });
                    state.send_to(from, ServerMessage::YouRole { payload: RolePayload { role: peer_role } });
                    state.broadcast_to_room(
                        room_id,
                        ServerMessage::Players { payload: PlayersPayload { players } },
                    );
                    state.broadcast_to_room(
                        room_id,
                        ServerMessage::SwapResult { payload: SwapResultPayload { ok: true } },
                    );
                }
                Err(e) => state.send_error(conn_id, &e),
            }
        }

        ClientMessage::SwapDecline => {
            let asker = {
                let Some(mut room) = state.rooms.get_mut(room_id) else { return };
                room.decline_swap()
            };
            if let Some(asker) = asker {
                state.send_to(
                    asker,
                    ServerMessage::SwapResult { payload: SwapResultPayload { ok: false } },
                );
            }
        }

        ClientMessage::Rematch => {
            let (snapshot, roles, count) = {
                let Some(mut room) = state.rooms.get_mut(room_id) else { return };
                room.rematch();
                (room.snapshot(), room.roles(), room.occupant_count())
            };
            info!("Room {}: rematch", room_id);
            state.presence.report(room_id, count);
            state.broadcast_to_room(room_id, ServerMessage::State { payload: snapshot, you: None });
            for (id, role) in roles {
                state.send_to(id, ServerMessage::YouRole { payload: RolePayload { role } });
            }
        }
    }
}

/// Detach a connection from its room, discarding the room when it empties.
fn handle_disconnect(conn_id: Uuid, room_id: &str, state: &Arc<ServerState>) {
    let remaining = {
        let Some(mut room) = state.rooms.get_mut(room_id) else { return };
        if room.detach(conn_id) {
            None
        } else {
            Some((room.players_info(), room.occupant_count()))
        }
    };

    match remaining {
        None => {
            state.rooms.remove(room_id);
            state.presence.report(room_id, 0);
            info!("Room {} is empty, discarding state", room_id);
        }
        Some((players, count)) => {
            state.presence.report(room_id, count);
            state.broadcast_to_room(
                room_id,
                ServerMessage::Players { payload: PlayersPayload { players } },
            );
        }
    }
}

/// Extract the room id and display name from the connect URI
/// (`/room/{id}?name=...`).
fn parse_connect_uri(uri: &Uri) -> Option<(String, String)> {
    let mut segments = uri.path().trim_matches('/').split('/');
    if segments.next()? != "room" {
        return None;
    }
    let room_id = segments.next()?;
    if room_id.is_empty() || segments.next().is_some() {
        return None;
    }

    let name = uri
        .query()
        .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("name=")))
        .map(decode_query_value)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "guest".to_string());

    Some((room_id.to_string(), name))
}

/// Form-style decoding of a query value: `+` is a space, then percent
/// escapes are resolved.
fn decode_query_value(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    percent_encoding::percent_decode_str(&raw)
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_uri() {
        let uri: Uri = "/room/abc123?name=Ann".parse().unwrap();
        assert_eq!(parse_connect_uri(&uri), Some(("abc123".into(), "Ann".into())));

        let uri: Uri = "/room/abc123".parse().unwrap();
        assert_eq!(parse_connect_uri(&uri), Some(("abc123".into(), "guest".into())));

        let uri: Uri = "/room/abc?theme=dark&name=Bob".parse().unwrap();
        assert_eq!(parse_connect_uri(&uri), Some(("abc".into(), "Bob".into())));
    }

    #[test]
    fn test_parse_connect_uri_decodes_names() {
        let uri: Uri = "/room/abc?name=Ann%20Lee".parse().unwrap();
        assert_eq!(parse_connect_uri(&uri), Some(("abc".into(), "Ann Lee".into())));

        let uri: Uri = "/room/abc?name=Ann+Lee".parse().unwrap();
        assert_eq!(parse_connect_uri(&uri), Some(("abc".into(), "Ann Lee".into())));

        // Multibyte names come through intact.
        let uri: Uri = "/room/abc?name=%E7%8E%A9%E5%AE%B6".parse().unwrap();
        assert_eq!(parse_connect_uri(&uri), Some(("abc".into(), "玩家".into())));

        // An encoded plus stays a plus.
        let uri: Uri = "/room/abc?name=C%2B%2B".parse().unwrap();
        assert_eq!(parse_connect_uri(&uri), Some(("abc".into(), "C++".into())));
    }

    #[test]
    fn test_parse_connect_uri_rejects_bad_paths() {
        for raw in ["/", "/room", "/room/", "/lobby/abc", "/room/a/b"] {
            let uri: Uri = raw.parse().unwrap();
            assert_eq!(parse_connect_uri(&uri), None, "{raw} should be rejected");
        }
    }

}
