//! Board bookkeeping for validated moves, plus the win/draw helper.
//!
//! The plain relay path never looks at a board. A room only keeps one so
//! that `validatedMove` can reject occupied cells and out-of-turn moves;
//! [`Board::outcome`] is pure and can be run by anyone over relayed moves.

use tandem_protocol::{CellIndex, ConnectionId, MovePayload, Symbol};

/// Number of cells on the board (3×3, row-major).
pub const CELLS: usize = 9;

/// Every row, column and diagonal.
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Why a validated move was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    #[error("cell {0} is outside the board")]
    CellOutOfRange(CellIndex),

    #[error("the game is already over")]
    GameOver,

    #[error("it is {expected}'s turn")]
    WrongSymbol { expected: Symbol },

    #[error("the same connection cannot move twice in a row")]
    OutOfTurn,

    #[error("cell {0} is already taken")]
    CellOccupied(CellIndex),
}

/// How a finished board ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(Symbol),
    Draw,
}

/// A 3×3 board and the connection that made the last validated move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Symbol>; CELLS],
    last_mover: Option<ConnectionId>,
}

impl Board {
    /// An empty board. X moves first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from cells a client reconstructed from relayed moves.
    pub fn from_cells(cells: [Option<Symbol>; CELLS]) -> Self {
        Self {
            cells,
            last_mover: None,
        }
    }

    /// Returns the mark in a cell, or `None` if empty or out of range.
    pub fn cell(&self, index: CellIndex) -> Option<Symbol> {
        self.cells.get(usize::from(index)).copied().flatten()
    }

    /// The symbol whose turn it is: X unless X has more marks than O.
    pub fn next_symbol(&self) -> Symbol {
        let count = |s: Symbol| {
            self.cells.iter().filter(|c| **c == Some(s)).count()
        };
        if count(Symbol::X) > count(Symbol::O) {
            Symbol::O
        } else {
            Symbol::X
        }
    }

    /// Returns the winner, a draw on a full board, or `None` while the
    /// game is still open.
    pub fn outcome(&self) -> Option<Outcome> {
        for [a, b, c] in LINES {
            if let Some(symbol) = self.cells[a] {
                if self.cells[b] == Some(symbol) && self.cells[c] == Some(symbol)
                {
                    return Some(Outcome::Winner(symbol));
                }
            }
        }
        if self.cells.iter().all(Option::is_some) {
            Some(Outcome::Draw)
        } else {
            None
        }
    }

    /// Checks a move without applying it.
    ///
    /// # Errors
    /// Returns the first [`MoveRejection`] that applies, in the order:
    /// range, finished game, wrong symbol, repeat mover, occupied cell.
    pub fn check(
        &self,
        mover: ConnectionId,
        mv: &MovePayload,
    ) -> Result<(), MoveRejection> {
        let index = usize::from(mv.cell_index);
        if index >= CELLS {
            return Err(MoveRejection::CellOutOfRange(mv.cell_index));
        }
        if self.outcome().is_some() {
            return Err(MoveRejection::GameOver);
        }
        let expected = self.next_symbol();
        if mv.symbol != expected {
            return Err(MoveRejection::WrongSymbol { expected });
        }
        if self.last_mover == Some(mover) {
            return Err(MoveRejection::OutOfTurn);
        }
        if self.cells[index].is_some() {
            return Err(MoveRejection::CellOccupied(mv.cell_index));
        }
        Ok(())
    }

    /// Checks and applies a move.
    ///
    /// # Errors
    /// Same as [`check`](Self::check); the board is untouched on error.
    pub fn apply(
        &mut self,
        mover: ConnectionId,
        mv: &MovePayload,
    ) -> Result<(), MoveRejection> {
        self.check(mover, mv)?;
        self.cells[usize::from(mv.cell_index)] = Some(mv.symbol);
        self.last_mover = Some(mover);
        Ok(())
    }

    /// Clears every cell and forgets the last mover.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
