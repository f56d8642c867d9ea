//! Connect Four board used by every bracket match.
//!
//! The grid is [`ROWS`] x [`COLS`]; row `0` is the top row. A move names a column and the piece
//! falls to the lowest empty cell of that column.
//!
//! The board also defines the text form sent to process agents (see [`Board`]'s `Display`
//! and `FromStr` implementations): rows from top to bottom separated by `/`, with `0` for an
//! empty cell and `1`/`2` for the sides.

use std::{fmt, str::FromStr};

use anyhow::bail;
use thiserror::Error;

/// Number of rows of the grid.
pub const ROWS: usize = 6;
/// Number of columns of the grid.
pub const COLS: usize = 7;

const WIN_LENGTH: usize = 4;

/// One of the two sides of a match. Side one always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// First listed entrant of a match (left child in the bracket).
    One,
    /// Second listed entrant of a match (right child in the bracket).
    Two,
}

impl Side {
    /// The opposing side.
    pub fn other(self) -> Side {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }

    /// `0` for side one, `1` for side two. Handy for per-side arrays.
    pub fn index(self) -> usize {
        match self {
            Side::One => 0,
            Side::Two => 1,
        }
    }

    /// Player number as printed on the board (`1` or `2`).
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Reasons for rejecting a move. Any of them is an illegal move by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    /// Every cell of the column is already occupied.
    #[error("column {0} is full")]
    ColumnFull(usize),
    /// The column does not exist.
    #[error("column {0} is out of range (0..{COLS})")]
    OutOfRange(usize),
}

/// The game grid. Exclusively owned by the match being played.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[Option<Side>; COLS]; ROWS],
}

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of a cell, `None` when empty.
    ///
    /// # Panics
    /// Panics if `row` or `column` are out of the grid.
    pub fn cell(&self, row: usize, column: usize) -> Option<Side> {
        self.cells[row][column]
    }

    /// Drop a piece of `side` in `column`. Returns the row the piece landed on.
    pub fn apply_move(&mut self, column: usize, side: Side) -> Result<usize, MoveError> {
        if column >= COLS {
            return Err(MoveError::OutOfRange(column));
        }
        let row = (0..ROWS)
            .rev()
            .find(|&row| self.cells[row][column].is_none())
            .ok_or(MoveError::ColumnFull(column))?;
        self.cells[row][column] = Some(side);
        Ok(row)
    }

    /// True if the column exists and still has an empty cell.
    pub fn is_legal(&self, column: usize) -> bool {
        column < COLS && self.cells[0][column].is_none()
    }

    /// Columns that can still receive a piece, in increasing order.
    pub fn legal_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..COLS).filter(|&column| self.is_legal(column))
    }

    /// True if `side` owns four contiguous cells in a row, a column or a diagonal.
    ///
    /// The whole grid is scanned, not only the neighbourhood of the last move.
    pub fn is_win(&self, side: Side) -> bool {
        const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

        (0..ROWS).any(|row| {
            (0..COLS).any(|column| {
                DIRECTIONS
                    .iter()
                    .any(|&(dr, dc)| self.run_from(row, column, dr, dc, side))
            })
        })
    }

    fn run_from(&self, row: usize, column: usize, dr: isize, dc: isize, side: Side) -> bool {
        (0..WIN_LENGTH as isize).all(|k| {
            let r = row as isize + k * dr;
            let c = column as isize + k * dc;
            (0..ROWS as isize).contains(&r)
                && (0..COLS as isize).contains(&c)
                && self.cells[r as usize][c as usize] == Some(side)
        })
    }

    /// True when every cell is occupied.
    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(Option::is_some)
    }

    /// Number of pieces on the board.
    pub fn piece_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            for cell in row {
                let c = match cell {
                    None => '0',
                    Some(side) => char::from(b'0' + side.number()),
                };
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Board {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows = s.trim().split('/').collect::<Vec<_>>();
        if rows.len() != ROWS {
            bail!("expected {ROWS} rows, got {}", rows.len());
        }
        let mut board = Board::new();
        for (r, row) in rows.into_iter().enumerate() {
            let chars = row.chars().collect::<Vec<_>>();
            if chars.len() != COLS {
                bail!("row {r}: expected {COLS} cells, got {}", chars.len());
            }
            for (c, ch) in chars.into_iter().enumerate() {
                board.cells[r][c] = match ch {
                    '0' => None,
                    '1' => Some(Side::One),
                    '2' => Some(Side::Two),
                    other => bail!("row {r}, column {c}: invalid cell '{other}'"),
                };
            }
        }
        Ok(board)
    }
}

#[cfg(test)]
mod board_tests {
    use super::*;

    /// Rows alternate between a pattern and its complement: never four in a row.
    const DRAWN_BOARD: &str = "1122112/2211221/1122112/2211221/1122112/2211221";

    #[test]
    fn pieces_fall_to_lowest_empty_cell() {
        let mut board = Board::new();
        assert_eq!(board.apply_move(3, Side::One), Ok(ROWS - 1));
        assert_eq!(board.apply_move(3, Side::Two), Ok(ROWS - 2));
        assert_eq!(board.cell(ROWS - 1, 3), Some(Side::One));
        assert_eq!(board.cell(ROWS - 2, 3), Some(Side::Two));
        assert_eq!(board.piece_count(), 2);
    }

    #[test]
    fn full_column_is_rejected() {
        let mut board = Board::new();
        for i in 0..ROWS {
            let side = if i % 2 == 0 { Side::One } else { Side::Two };
            board.apply_move(0, side).unwrap();
        }
        assert!(!board.is_legal(0));
        assert_eq!(board.apply_move(0, Side::One), Err(MoveError::ColumnFull(0)));
        assert_eq!(board.legal_columns().collect::<Vec<_>>(), (1..COLS).collect::<Vec<_>>());
    }

    #[test]
    fn out_of_range_column_is_rejected() {
        let mut board = Board::new();
        assert_eq!(board.apply_move(COLS, Side::Two), Err(MoveError::OutOfRange(COLS)));
        assert_eq!(board.piece_count(), 0);
    }

    #[test]
    fn horizontal_win() {
        let board: Board = "0000000/0000000/0000000/0000000/0000000/0022220"
            .parse()
            .unwrap();
        assert!(board.is_win(Side::Two));
        assert!(!board.is_win(Side::One));
    }

    #[test]
    fn vertical_win() {
        let board: Board = "0000000/0000000/0000001/0000001/0000001/0000001"
            .parse()
            .unwrap();
        assert!(board.is_win(Side::One));
        assert!(!board.is_win(Side::Two));
    }

    #[test]
    fn diagonal_wins_in_both_directions() {
        // top-left to bottom-right, away from the main diagonal
        let down_right: Board = "0001000/0000100/0000010/0000001/0000000/0000000"
            .parse()
            .unwrap();
        assert!(down_right.is_win(Side::One));

        // bottom-left to top-right
        let up_right: Board = "0000000/0000000/0002000/0020000/0200000/2000000"
            .parse()
            .unwrap();
        assert!(up_right.is_win(Side::Two));
    }

    #[test]
    fn three_in_a_row_is_not_a_win() {
        let board: Board = "0000000/0000000/0000000/0000000/0000000/1110222"
            .parse()
            .unwrap();
        assert!(!board.is_win(Side::One));
        assert!(!board.is_win(Side::Two));
    }

    #[test]
    fn full_board_without_four_is_a_draw() {
        let board: Board = DRAWN_BOARD.parse().unwrap();
        assert!(board.is_full());
        assert!(!board.is_win(Side::One));
        assert!(!board.is_win(Side::Two));
        assert_eq!(board.legal_columns().count(), 0);
    }

    #[test]
    fn text_form_is_stable() {
        let mut board = Board::new();
        board.apply_move(0, Side::One).unwrap();
        board.apply_move(6, Side::Two).unwrap();
        let text = board.to_string();
        assert_eq!(text, "0000000/0000000/0000000/0000000/0000000/1000002");
        assert_eq!(text.parse::<Board>().unwrap(), board);
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert!("0000000".parse::<Board>().is_err());
        assert!("000000x/0000000/0000000/0000000/0000000/0000000"
            .parse::<Board>()
            .is_err());
    }

    #[test]
    fn sides() {
        assert_eq!(Side::One.other(), Side::Two);
        assert_eq!(Side::Two.number(), 2);
        assert_eq!(Side::Two.to_string(), "2");
    }
}
