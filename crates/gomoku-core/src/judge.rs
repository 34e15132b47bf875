//! Move legality, board application, and win detection.
//!
//! Everything here is pure: boards come in by reference and leave as fresh
//! values or verdicts. The authoritative session re-runs these checks on
//! every request, even when a client already pre-validated, since the
//! client's snapshot may be stale.

use crate::board::{Board, Cell, Move, Player};
use crate::rules::{analyze_forbidden, run_length, ForbiddenReason, RuleMode, DIRECTIONS};
use std::collections::HashSet;
use thiserror::Error;

/// Why a requested placement is illegal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IllegalMove {
    #[error("coordinates are off the board")]
    OutOfRange,

    #[error("that cell is already occupied")]
    CellOccupied,

    #[error("forbidden move: overline")]
    Overline,

    #[error("forbidden move: double four")]
    DoubleFour,

    #[error("forbidden move: double three")]
    DoubleThree,
}

impl From<ForbiddenReason> for IllegalMove {
    fn from(reason: ForbiddenReason) -> IllegalMove {
        match reason {
            ForbiddenReason::Overline => IllegalMove::Overline,
            ForbiddenReason::DoubleFour => IllegalMove::DoubleFour,
            ForbiddenReason::DoubleThree => IllegalMove::DoubleThree,
        }
    }
}

/// Check whether `player` may place at `(x, y)` under `rule_mode`.
///
/// Range and occupancy apply to everyone; forbidden-move analysis only to
/// Black under rulesets that restrict it.
pub fn legality_check(
    board: &Board,
    x: usize,
    y: usize,
    player: Player,
    rule_mode: RuleMode,
) -> Result<(), IllegalMove> {
    if !board.in_bounds(x, y) {
        return Err(IllegalMove::OutOfRange);
    }
    if !board.is_empty_at(x, y) {
        return Err(IllegalMove::CellOccupied);
    }
    if rule_mode.restricts_black() && player == Player::Black {
        if let Some(reason) = analyze_forbidden(board, x, y, player).reason {
            return Err(reason.into());
        }
    }
    Ok(())
}

/// A new board with the move folded in; the input board is untouched, so
/// callers may keep the previous snapshot with no aliasing risk.
pub fn apply_move(board: &Board, mv: Move) -> Board {
    debug_assert!(board.in_bounds(mv.x, mv.y));
    let mut next = board.clone();
    next.set(mv.x, mv.y, mv.player.into());
    next
}

/// Whether the just-played move wins under `rule_mode`.
///
/// Scans the four line directions through the played cell. In renju-family
/// rulesets a Black overline is re-checked here and never a win, even
/// though legality should have rejected it already.
pub fn check_win(board: &Board, mv: Move, rule_mode: RuleMode) -> bool {
    let Move { x, y, player } = mv;

    if rule_mode.restricts_black() && player == Player::Black {
        for &(dx, dy) in &DIRECTIONS {
            if run_length(board, x, y, player, dx, dy) >= 6 {
                return false;
            }
        }
    }

    for &(dx, dy) in &DIRECTIONS {
        let len = run_length(board, x, y, player, dx, dy);
        let won = match rule_mode {
            RuleMode::Freestyle => len >= 5,
            RuleMode::Renju => {
                if player == Player::Black {
                    len == 5
                } else {
                    len >= 5
                }
            }
            RuleMode::Taraguchi10 => len >= 5,
        };
        if won {
            return true;
        }
    }
    false
}

/// Every empty cell currently forbidden for Black. Advisory, for clients
/// that want to mark forbidden points; recomputed per call since any move
/// invalidates an unbounded subset of the previous answer.
pub fn forbidden_cells(board: &Board, rule_mode: RuleMode) -> HashSet<(usize, usize)> {
    let mut cells = HashSet::new();
    if !rule_mode.restricts_black() {
        return cells;
    }
    for y in 0..board.size() {
        for x in 0..board.size() {
            if board.is_empty_at(x, y)
                && analyze_forbidden(board, x, y, Player::Black).forbidden
            {
                cells.insert((x, y));
            }
        }
    }
    cells
}
