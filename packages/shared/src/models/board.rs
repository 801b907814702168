use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::game::Move;
use crate::services::errors::damas_service_errors::DamasServiceError;

pub const BOARD_SIZE: u8 = 8;

const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// A square such as `A1`. Rows are letters `A`..`H`, columns are `1`..`8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    row: u8,
    col: u8,
}

impl Position {
    pub fn new(row: u8, col: u8) -> Option<Self> {
        if row < BOARD_SIZE && col < BOARD_SIZE {
            Some(Position { row, col })
        } else {
            None
        }
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn col(&self) -> u8 {
        self.col
    }

    pub fn offset(&self, d_row: i8, d_col: i8) -> Option<Position> {
        let row = self.row as i8 + d_row;
        let col = self.col as i8 + d_col;
        if row < 0 || col < 0 {
            return None;
        }
        Position::new(row as u8, col as u8)
    }

    pub fn all() -> impl Iterator<Item = Position> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Position { row, col }))
    }
}

impl FromStr for Position {
    type Err = DamasServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 || !bytes[0].is_ascii_uppercase() || !bytes[1].is_ascii_digit() {
            return Err(DamasServiceError::MalformedPosition(s.to_string()));
        }
        let row = bytes[0] - b'A';
        let col = bytes[1] - b'0';
        if col == 0 {
            return Err(DamasServiceError::OutOfBounds(s.to_string()));
        }
        Position::new(row, col - 1).ok_or_else(|| DamasServiceError::OutOfBounds(s.to_string()))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", (b'A' + self.row) as char, self.col + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceColor {
    #[serde(rename = "b")]
    Black,
    #[serde(rename = "w")]
    White,
}

impl PieceColor {
    /// Black starts on rows A-C and moves toward H; white the opposite.
    pub fn direction(self) -> i8 {
        match self {
            PieceColor::Black => 1,
            PieceColor::White => -1,
        }
    }

    pub fn promotion_row(self) -> u8 {
        match self {
            PieceColor::Black => BOARD_SIZE - 1,
            PieceColor::White => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    #[serde(rename = "type")]
    pub color: PieceColor,
    pub player_id: String,
    pub is_kinged: bool,
    pub piece_id: String,
}

impl Piece {
    pub fn new(color: PieceColor, player_id: &str) -> Self {
        Piece {
            color,
            player_id: player_id.to_string(),
            is_kinged: false,
            piece_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn king(color: PieceColor, player_id: &str) -> Self {
        Piece {
            is_kinged: true,
            ..Piece::new(color, player_id)
        }
    }
}

/// What a legal move did to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub captured: Option<Position>,
    pub kinged: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<String, Option<Piece>>",
    try_from = "BTreeMap<String, Option<Piece>>"
)]
pub struct Board {
    grid: [[Option<Piece>; BOARD_SIZE as usize]; BOARD_SIZE as usize],
}

impl Board {
    pub fn empty() -> Self {
        Board::default()
    }

    /// Twelve pieces a side on the dark squares.
    pub fn standard(black_id: &str, white_id: &str) -> Self {
        let mut board = Board::empty();
        for pos in Position::all() {
            if (pos.row + pos.col) % 2 != 1 {
                continue;
            }
            if pos.row < 3 {
                board.place(pos, Piece::new(PieceColor::Black, black_id));
            } else if pos.row > 4 {
                board.place(pos, Piece::new(PieceColor::White, white_id));
            }
        }
        board
    }

    pub fn get(&self, pos: Position) -> Option<&Piece> {
        self.grid[pos.row as usize][pos.col as usize].as_ref()
    }

    pub fn place(&mut self, pos: Position, piece: Piece) {
        self.grid[pos.row as usize][pos.col as usize] = Some(piece);
    }

    pub fn take(&mut self, pos: Position) -> Option<Piece> {
        self.grid[pos.row as usize][pos.col as usize].take()
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Position, &Piece)> {
        Position::all().filter_map(move |pos| self.get(pos).map(|piece| (pos, piece)))
    }

    pub fn find_piece(&self, piece_id: &str) -> Option<Position> {
        self.pieces()
            .find(|(_, piece)| piece.piece_id == piece_id)
            .map(|(pos, _)| pos)
    }

    pub fn count_pieces(&self, player_id: &str) -> u32 {
        self.pieces()
            .filter(|(_, piece)| piece.player_id == player_id)
            .count() as u32
    }

    pub fn can_piece_capture(&self, pos: Position) -> bool {
        let Some(piece) = self.get(pos) else {
            return false;
        };

        if piece.is_kinged {
            return self.can_king_capture(pos, piece);
        }

        let dir = piece.color.direction();
        [1, -1].iter().any(|&d_col| {
            let (Some(mid), Some(land)) = (pos.offset(dir, d_col), pos.offset(2 * dir, 2 * d_col))
            else {
                return false;
            };
            let enemy_in_middle = self
                .get(mid)
                .is_some_and(|other| other.player_id != piece.player_id);
            enemy_in_middle && self.get(land).is_none()
        })
    }

    fn can_king_capture(&self, pos: Position, piece: &Piece) -> bool {
        for (d_row, d_col) in DIAGONALS {
            let mut found_enemy = false;
            let mut current = pos.offset(d_row, d_col);
            while let Some(square) = current {
                match self.get(square) {
                    None if found_enemy => return true,
                    None => {}
                    Some(other) if other.player_id == piece.player_id => break,
                    Some(_) if found_enemy => break,
                    Some(_) => found_enemy = true,
                }
                current = square.offset(d_row, d_col);
            }
        }
        false
    }

    pub fn pieces_that_can_capture(&self, player_id: &str) -> Vec<Position> {
        self.pieces()
            .filter(|(_, piece)| piece.player_id == player_id)
            .map(|(pos, _)| pos)
            .filter(|pos| self.can_piece_capture(*pos))
            .collect()
    }

    /// Checks a move against the board alone. Returns the square of the piece it
    /// would capture, if any.
    pub fn check_move(&self, mv: &Move) -> Result<Option<Position>, DamasServiceError> {
        let from: Position = mv.from.parse()?;
        let to: Position = mv.to.parse()?;

        let piece = self
            .get(from)
            .ok_or_else(|| DamasServiceError::NoPieceAtSource(mv.from.clone()))?;
        if piece.player_id != mv.player_id {
            return Err(DamasServiceError::NotYourPiece);
        }
        if piece.piece_id != mv.piece_id {
            return Err(DamasServiceError::PieceMismatch(mv.piece_id.clone()));
        }
        if self.get(to).is_some() {
            return Err(DamasServiceError::DestinationOccupied(mv.to.clone()));
        }

        if piece.is_kinged {
            self.check_king_move(piece, from, to, mv.is_capture)
        } else {
            self.check_man_move(piece, from, to, mv.is_capture)
        }
    }

    fn check_man_move(
        &self,
        piece: &Piece,
        from: Position,
        to: Position,
        is_capture: bool,
    ) -> Result<Option<Position>, DamasServiceError> {
        let d_row = to.row as i8 - from.row as i8;
        let d_col = to.col as i8 - from.col as i8;

        if d_row * piece.color.direction() <= 0 {
            return Err(DamasServiceError::WrongDirection);
        }

        match (d_row.abs(), d_col.abs()) {
            (1, 1) if is_capture => Err(DamasServiceError::CaptureFlagMismatch),
            (1, 1) => Ok(None),
            (2, 2) if !is_capture => Err(DamasServiceError::CaptureFlagMismatch),
            (2, 2) => {
                let mid = from
                    .offset(d_row / 2, d_col / 2)
                    .ok_or(DamasServiceError::NotDiagonal)?;
                match self.get(mid) {
                    Some(other) if other.player_id != piece.player_id => Ok(Some(mid)),
                    _ => Err(DamasServiceError::InvalidCapture(format!(
                        "no opponent piece at {}",
                        mid
                    ))),
                }
            }
            _ => Err(DamasServiceError::NotDiagonal),
        }
    }

    fn check_king_move(
        &self,
        piece: &Piece,
        from: Position,
        to: Position,
        is_capture: bool,
    ) -> Result<Option<Position>, DamasServiceError> {
        let d_row = to.row as i8 - from.row as i8;
        let d_col = to.col as i8 - from.col as i8;

        if d_row == 0 || d_row.abs() != d_col.abs() {
            return Err(DamasServiceError::NotDiagonal);
        }

        let step = (d_row.signum(), d_col.signum());
        let mut enemy: Option<Position> = None;
        let mut current = from.offset(step.0, step.1);
        while let Some(square) = current {
            if square == to {
                break;
            }
            if let Some(other) = self.get(square) {
                if other.player_id == piece.player_id {
                    return Err(DamasServiceError::PathBlocked(square.to_string()));
                }
                if enemy.is_some() {
                    return Err(DamasServiceError::InvalidCapture(
                        "more than one piece on the path".to_string(),
                    ));
                }
                enemy = Some(square);
            }
            current = square.offset(step.0, step.1);
        }

        if enemy.is_some() != is_capture {
            return Err(DamasServiceError::CaptureFlagMismatch);
        }
        Ok(enemy)
    }

    /// Validates then applies a move. Kinging is decided after the piece lands.
    pub fn apply_move(&mut self, mv: &Move) -> Result<AppliedMove, DamasServiceError> {
        let captured = self.check_move(mv)?;
        let from: Position = mv.from.parse()?;
        let to: Position = mv.to.parse()?;

        let mut piece = self
            .take(from)
            .ok_or_else(|| DamasServiceError::NoPieceAtSource(mv.from.clone()))?;
        if let Some(square) = captured {
            self.take(square);
        }

        let kinged = !piece.is_kinged && to.row == piece.color.promotion_row();
        if kinged {
            piece.is_kinged = true;
        }
        self.place(to, piece);

        Ok(AppliedMove { captured, kinged })
    }
}

impl From<Board> for BTreeMap<String, Option<Piece>> {
    fn from(board: Board) -> Self {
        let mut grid = BTreeMap::new();
        for pos in Position::all() {
            grid.insert(pos.to_string(), board.get(pos).cloned());
        }
        grid
    }
}

impl TryFrom<BTreeMap<String, Option<Piece>>> for Board {
    type Error = DamasServiceError;

    fn try_from(grid: BTreeMap<String, Option<Piece>>) -> Result<Self, Self::Error> {
        let mut board = Board::empty();
        for (square, piece) in grid {
            let pos: Position = square.parse()?;
            if let Some(piece) = piece {
                board.place(pos, piece);
            }
        }
        Ok(board)
    }
}
