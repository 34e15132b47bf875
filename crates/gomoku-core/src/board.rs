//! Board representation for a square gomoku grid.
//!
//! The board is owned by whoever runs the game; the rule engine only ever
//! receives references and returns fresh values, so it is safe to share
//! snapshots across rooms.

use serde::{Deserialize, Serialize};

/// Standard board side length.
pub const BOARD_SIZE: usize = 15;

/// The two stone colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    #[serde(rename = "B")]
    Black,
    #[serde(rename = "W")]
    White,
}

impl Player {
    /// The other color.
    pub fn opponent(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }
}

/// Contents of a single intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Black,
    White,
}

impl Cell {
    /// Numeric code used in serialized board snapshots (0 empty, 1 black, 2 white).
    pub fn code(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Black => 1,
            Cell::White => 2,
        }
    }
}

impl From<Player> for Cell {
    fn from(player: Player) -> Cell {
        match player {
            Player::Black => Cell::Black,
            Player::White => Cell::White,
        }
    }
}

/// One placed stone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub x: usize,
    pub y: usize,
    pub player: Player,
}

/// A square grid of cells, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// An empty board of the given side length.
    pub fn new(size: usize) -> Board {
        Board {
            size,
            cells: vec![Cell::Empty; size * size],
        }
    }

    /// An empty board of the standard 15x15 size.
    pub fn standard() -> Board {
        Board::new(BOARD_SIZE)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size
    }

    /// Cell contents at `(x, y)`. Caller must stay in bounds.
    pub fn cell(&self, x: usize, y: usize) -> Cell {
        debug_assert!(self.in_bounds(x, y));
        self.cells[y * self.size + x]
    }

    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        debug_assert!(self.in_bounds(x, y));
        self.cells[y * self.size + x] = cell;
    }

    pub fn is_empty_at(&self, x: usize, y: usize) -> bool {
        self.cell(x, y) == Cell::Empty
    }

    /// Cell at a possibly off-board coordinate; `None` means "off the edge".
    /// Line scans treat the edge like an opponent wall.
    pub(crate) fn probe(&self, x: isize, y: isize) -> Option<Cell> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if self.in_bounds(x, y) {
            Some(self.cell(x, y))
        } else {
            None
        }
    }

    /// Numeric rows (0 empty, 1 black, 2 white) for wire snapshots.
    pub fn rows(&self) -> Vec<Vec<u8>> {
        (0..self.size)
            .map(|y| (0..self.size).map(|x| self.cell(x, y).code()).collect())
            .collect()
    }
}
