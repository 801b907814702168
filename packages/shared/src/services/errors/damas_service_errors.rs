use std::fmt;

/// Every way a move can be turned down. None of these mutate the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DamasServiceError {
    MalformedPosition(String),
    OutOfBounds(String),
    NoPieceAtSource(String),
    PieceMismatch(String),
    NotYourPiece,
    NotYourTurn,
    DestinationOccupied(String),
    WrongDirection,
    NotDiagonal,
    InvalidCapture(String),
    CaptureFlagMismatch,
    PathBlocked(String),
    ForcedCapture,
    ChainNotFinished(String),
    GameOver,
}

impl fmt::Display for DamasServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DamasServiceError::MalformedPosition(pos) => write!(f, "Malformed position: {}", pos),
            DamasServiceError::OutOfBounds(pos) => write!(f, "Position out of bounds: {}", pos),
            DamasServiceError::NoPieceAtSource(pos) => write!(f, "No piece at {}", pos),
            DamasServiceError::PieceMismatch(id) => {
                write!(f, "Piece {} is not on the source square", id)
            }
            DamasServiceError::NotYourPiece => write!(f, "Piece does not belong to the player"),
            DamasServiceError::NotYourTurn => write!(f, "Not your turn"),
            DamasServiceError::DestinationOccupied(pos) => {
                write!(f, "Destination {} is not empty", pos)
            }
            DamasServiceError::WrongDirection => {
                write!(f, "Move is not in the piece's forward direction")
            }
            DamasServiceError::NotDiagonal => write!(f, "Move is not diagonal"),
            DamasServiceError::InvalidCapture(msg) => write!(f, "Invalid capture: {}", msg),
            DamasServiceError::CaptureFlagMismatch => {
                write!(f, "Capture flag does not match the move")
            }
            DamasServiceError::PathBlocked(pos) => write!(f, "Path blocked by own piece at {}", pos),
            DamasServiceError::ForcedCapture => {
                write!(f, "A capture is available and must be played")
            }
            DamasServiceError::ChainNotFinished(piece_id) => {
                write!(f, "Piece {} must finish its capture chain", piece_id)
            }
            DamasServiceError::GameOver => write!(f, "Game is already over"),
        }
    }
}

impl std::error::Error for DamasServiceError {}
