//! Gomoku rule engine: legality checking, forbidden-move analysis, and win
//! detection under multiple rulesets.
//!
//! Everything in this crate is pure. Boards are owned by the caller (a game
//! room, a solo client), the engine only reads snapshots and returns fresh
//! values, so it can be invoked from any number of rooms concurrently.
//!
//! # Modules
//!
//! - [`board`]: the grid, stones, and move types
//! - [`rules`]: rulesets and forbidden-move analysis for Black
//! - [`judge`]: legality checks, move application, win detection

pub mod board;
pub mod judge;
pub mod rules;

// Re-export commonly used types
pub use board::{Board, Cell, Move, Player, BOARD_SIZE};
pub use judge::{apply_move, check_win, forbidden_cells, legality_check, IllegalMove};
pub use rules::{analyze_forbidden, ForbiddenAnalysis, ForbiddenReason, RuleMode};
