//! Forbidden-move analysis for the restricted side (Black) under
//! renju-family rulesets.
//!
//! All pattern counting happens on a 9-cell window centered on the
//! candidate cell, one window per scan direction. A "four" is any 5-cell
//! sub-window holding exactly four Black stones and one empty cell with no
//! White stone or board edge inside it. An "open three" is a 5-cell
//! sub-window with three Black stones and two empties where at least two
//! of the empties, filled individually, line the four stones up into a
//! contiguous run.

use crate::board::{Board, Cell, Player};
use serde::{Deserialize, Serialize};

/// The four scan directions: horizontal, vertical, and both diagonals.
pub(crate) const DIRECTIONS: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// Ruleset governing legality and win thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    /// No restrictions; five or more in a row wins for either side.
    Freestyle,
    /// Black is subject to forbidden moves and wins only on exactly five.
    Renju,
    /// Same restrictions as renju; the opening swap procedure is not
    /// enforced here.
    Taraguchi10,
}

impl RuleMode {
    /// Whether Black is subject to forbidden-move restrictions.
    pub fn restricts_black(self) -> bool {
        matches!(self, RuleMode::Renju | RuleMode::Taraguchi10)
    }
}

/// Why a candidate cell is forbidden for Black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForbiddenReason {
    Overline,
    DoubleFour,
    DoubleThree,
}

/// Outcome of evaluating one candidate cell.
///
/// Recomputed on demand, never stored; the verdict (`forbidden`/`reason`)
/// only ever binds Black, White placements always come back unforbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForbiddenAnalysis {
    pub overline: bool,
    pub exact_five: bool,
    pub four_count: u32,
    pub open_three_count: u32,
    pub forbidden: bool,
    pub reason: Option<ForbiddenReason>,
}

/// Contiguous same-color run length through `(x, y)` along one direction,
/// counting the stone at `(x, y)` itself.
pub(crate) fn run_length(
    board: &Board,
    x: usize,
    y: usize,
    player: Player,
    dx: isize,
    dy: isize,
) -> usize {
    let stone = Cell::from(player);
    let (x, y) = (x as isize, y as isize);
    let mut len = 1;
    let mut i = 1;
    while board.probe(x + i * dx, y + i * dy) == Some(stone) {
        len += 1;
        i += 1;
    }
    i = 1;
    while board.probe(x - i * dx, y - i * dy) == Some(stone) {
        len += 1;
        i += 1;
    }
    len
}

/// One cell of a scan window, relative to the analyzed player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineCell {
    Empty,
    Own,
    Foe,
    /// Off the board; blocks patterns like an opposing stone.
    Edge,
}

/// The 9-cell window centered on `(x, y)` along one direction.
fn line_window(board: &Board, x: usize, y: usize, player: Player, dx: isize, dy: isize) -> [LineCell; 9] {
    let own = Cell::from(player);
    let (x, y) = (x as isize, y as isize);
    let mut window = [LineCell::Edge; 9];
    for (slot, k) in (-4..=4).enumerate() {
        window[slot] = match board.probe(x + k * dx, y + k * dy) {
            None => LineCell::Edge,
            Some(Cell::Empty) => LineCell::Empty,
            Some(c) if c == own => LineCell::Own,
            Some(_) => LineCell::Foe,
        };
    }
    window
}

/// Whether filling `fill` in a three-stone segment lines all four stones
/// up contiguously (the segment becomes a straight four candidate).
fn fill_straightens(seg: &[LineCell], fill: usize) -> bool {
    let mut first = None;
    let mut last = 0;
    for (i, c) in seg.iter().enumerate() {
        if *c == LineCell::Own || i == fill {
            if first.is_none() {
                first = Some(i);
            }
            last = i;
        }
    }
    matches!(first, Some(f) if last - f == 3)
}

/// Count fours and open threes over one window's 5-cell sub-windows.
fn count_patterns(window: &[LineCell; 9]) -> (u32, u32) {
    let mut fours = 0;
    let mut open_threes = 0;

    for i in 0..=4 {
        let seg = &window[i..i + 5];
        if seg.iter().any(|c| matches!(c, LineCell::Foe | LineCell::Edge)) {
            continue;
        }
        let own = seg.iter().filter(|c| **c == LineCell::Own).count();

        // own + empty == 5 here, no foe or edge survives the guard above
        if own == 4 {
            fours += 1;
            continue;
        }
        if own == 3 {
            let extensions = seg
                .iter()
                .enumerate()
                .filter(|(k, c)| **c == LineCell::Empty && fill_straightens(seg, *k))
                .count();
            if extensions >= 2 {
                open_threes += 1;
            }
        }
    }

    (fours, open_threes)
}

/// Evaluate a candidate placement at an empty in-bounds cell.
///
/// Works on a scoped scratch copy of the board, so the caller's snapshot is
/// never observably mutated.
pub fn analyze_forbidden(board: &Board, x: usize, y: usize, player: Player) -> ForbiddenAnalysis {
    debug_assert!(board.in_bounds(x, y) && board.is_empty_at(x, y));

    let mut scratch = board.clone();
    scratch.set(x, y, player.into());

    let mut exact_five = false;
    let mut overline = false;
    let mut four_count = 0;
    let mut open_three_count = 0;

    for &(dx, dy) in &DIRECTIONS {
        let len = run_length(&scratch, x, y, player, dx, dy);
        if len == 5 {
            exact_five = true;
        }
        if len >= 6 {
            overline = true;
        }
        let (fours, threes) = count_patterns(&line_window(&scratch, x, y, player, dx, dy));
        four_count += fours;
        open_three_count += threes;
    }

    // Strict precedence: overline > exact five (allowed) > double four >
    // double three > allowed. Only Black is ever forbidden.
    let reason = if player == Player::Black {
        if overline {
            Some(ForbiddenReason::Overline)
        } else if exact_five {
            None
        } else if four_count >= 2 {
            Some(ForbiddenReason::DoubleFour)
        } else if open_three_count >= 2 {
            Some(ForbiddenReason::DoubleThree)
        } else {
            None
        }
    } else {
        None
    };

    ForbiddenAnalysis {
        overline,
        exact_five,
        four_count,
        open_three_count,
        forbidden: reason.is_some(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn board_with_black(stones: &[(usize, usize)]) -> Board {
        let mut board = Board::standard();
        for &(x, y) in stones {
            board.set(x, y, Cell::Black);
        }
        board
    }

    #[test]
    fn test_run_length_counts_both_sides() {
        let board = board_with_black(&[(5, 7), (6, 7), (8, 7), (9, 7)]);
        // Through (7,7) after an imagined placement the run would be 5; on
        // the raw board the run through (6,7) is just the pair.
        assert_eq!(run_length(&board, 6, 7, Player::Black, 1, 0), 2);

        let board = board_with_black(&[(4, 4), (5, 5), (6, 6)]);
        assert_eq!(run_length(&board, 5, 5, Player::Black, 1, 1), 3);
    }

    #[test]
    fn test_straight_four_is_two_fours() {
        // Placing at (6,7) makes B at 4..=7 on row 7, open on both sides.
        // Both the left-shifted and right-shifted sub-windows count.
        let board = board_with_black(&[(4, 7), (5, 7), (7, 7)]);
        let analysis = analyze_forbidden(&board, 6, 7, Player::Black);
        assert_eq!(analysis.four_count, 2);
        assert_eq!(analysis.reason, Some(ForbiddenReason::DoubleFour));
    }

    #[test]
    fn test_gapped_four_counts_once() {
        // Placing at (7,3) makes B B . B B across x=3..7: one four, since
        // only the sub-window spanning the whole shape qualifies.
        let board = board_with_black(&[(3, 3), (4, 3), (6, 3)]);
        let analysis = analyze_forbidden(&board, 7, 3, Player::Black);
        assert_eq!(analysis.four_count, 1);
        assert!(!analysis.forbidden);
    }

    #[test]
    fn test_filling_the_gap_is_exact_five() {
        let mut board = board_with_black(&[(3, 3), (4, 3), (6, 3), (7, 3)]);
        board.set(2, 3, Cell::White);
        board.set(8, 3, Cell::White);
        let analysis = analyze_forbidden(&board, 5, 3, Player::Black);
        assert!(analysis.exact_five);
        assert!(!analysis.forbidden);
    }

    #[test]
    fn test_single_open_three_is_allowed() {
        let board = board_with_black(&[(5, 5), (6, 5)]);
        let analysis = analyze_forbidden(&board, 7, 5, Player::Black);
        assert_eq!(analysis.open_three_count, 1);
        assert!(!analysis.forbidden);
    }

    #[test]
    fn test_blocked_three_is_not_open() {
        let mut board = board_with_black(&[(5, 5), (6, 5)]);
        board.set(4, 5, Cell::White);
        let analysis = analyze_forbidden(&board, 7, 5, Player::Black);
        assert_eq!(analysis.open_three_count, 0);
    }

    #[test]
    fn test_double_three_forbidden() {
        // Placing (7,5) completes an open three on row 5 and another down
        // column 7.
        let board = board_with_black(&[(5, 5), (6, 5), (7, 3), (7, 4)]);
        let analysis = analyze_forbidden(&board, 7, 5, Player::Black);
        assert_eq!(analysis.open_three_count, 2);
        assert_eq!(analysis.reason, Some(ForbiddenReason::DoubleThree));
    }

    #[test]
    fn test_overline_detected() {
        let board = board_with_black(&[(3, 7), (4, 7), (5, 7), (7, 7), (8, 7)]);
        let analysis = analyze_forbidden(&board, 6, 7, Player::Black);
        assert!(analysis.overline);
        assert_eq!(analysis.reason, Some(ForbiddenReason::Overline));
    }

    #[test]
    fn test_white_never_forbidden() {
        let mut board = Board::standard();
        for &(x, y) in &[(5, 5), (6, 5), (5, 3), (5, 4)] {
            board.set(x, y, Cell::White);
        }
        let analysis = analyze_forbidden(&board, 7, 5, Player::White);
        assert!(!analysis.forbidden);
        assert_eq!(analysis.reason, None);
    }

    #[test]
    fn test_wire_tokens() {
        assert_eq!(
            serde_json::to_string(&RuleMode::Taraguchi10).unwrap(),
            r#""taraguchi10""#
        );
        assert_eq!(
            serde_json::to_string(&ForbiddenReason::DoubleFour).unwrap(),
            r#""double-four""#
        );
        assert_eq!(
            serde_json::from_str::<RuleMode>(r#""renju""#).unwrap(),
            RuleMode::Renju
        );
    }

    #[test]
    fn test_analysis_leaves_board_untouched() {
        let board = board_with_black(&[(5, 5), (6, 5)]);
        let before = board.clone();
        let _ = analyze_forbidden(&board, 7, 5, Player::Black);
        assert_eq!(board, before);
    }
}
