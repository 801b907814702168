use crate::{
    models::{
        board::Position,
        game::{Game, Move},
    },
    services::errors::damas_service_errors::DamasServiceError,
};

/// What the game loop should do after an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    AdvanceTurn,
    /// The same piece has another capture; the mover keeps the turn.
    ContinueCapture,
    GameOver { winner: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The move as appended to the game log.
    pub recorded: Move,
    pub turn: TurnOutcome,
}

#[derive(Clone, Default)]
pub struct DamasService;

impl DamasService {
    pub fn new() -> Self {
        DamasService
    }

    /// Validate and make a move on the game.
    /// On rejection the game is left untouched.
    pub fn validate_and_make_move(
        &self,
        game: &mut Game,
        mv: &Move,
    ) -> Result<MoveOutcome, DamasServiceError> {
        if game.is_over() {
            return Err(DamasServiceError::GameOver);
        }
        if game.current_player_id != mv.player_id {
            return Err(DamasServiceError::NotYourTurn);
        }
        if let Some(chain_piece) = &game.chain_piece {
            if *chain_piece != mv.piece_id {
                return Err(DamasServiceError::ChainNotFinished(chain_piece.clone()));
            }
        }

        let from: Position = mv.from.parse()?;
        let to: Position = mv.to.parse()?;

        let capturers = game.board.pieces_that_can_capture(&mv.player_id);
        if !capturers.is_empty() && (!capturers.contains(&from) || !mv.is_capture) {
            return Err(DamasServiceError::ForcedCapture);
        }

        let applied = game.board.apply_move(mv)?;
        game.update_player_pieces();

        let recorded = Move {
            is_kinged: applied.kinged,
            ..mv.clone()
        };
        game.moves.push(recorded.clone());

        let turn = if game.player_out_of_pieces().is_some() {
            TurnOutcome::GameOver {
                winner: mv.player_id.clone(),
            }
        } else if applied.captured.is_none()
            || applied.kinged
            || !game.board.can_piece_capture(to)
        {
            TurnOutcome::AdvanceTurn
        } else {
            TurnOutcome::ContinueCapture
        };
        game.chain_piece = match turn {
            TurnOutcome::ContinueCapture => Some(mv.piece_id.clone()),
            _ => None,
        };

        Ok(MoveOutcome { recorded, turn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::board::{Board, Piece, PieceColor};
    use crate::models::game::tests::game;
    use crate::models::game::TimerSetting;

    const BLACK: &str = "black";
    const WHITE: &str = "white";

    fn setup(pieces: &[(&str, PieceColor, bool)]) -> Game {
        let mut g = game(BLACK, WHITE, TimerSetting::Reset);
        g.board = Board::empty();
        for (square, color, king) in pieces {
            let owner = match color {
                PieceColor::Black => BLACK,
                PieceColor::White => WHITE,
            };
            let piece = if *king {
                Piece::king(*color, owner)
            } else {
                Piece::new(*color, owner)
            };
            g.board.place(square.parse().unwrap(), piece);
        }
        g.update_player_pieces();
        g
    }

    fn mv(g: &Game, player: &str, from: &str, to: &str, capture: bool) -> Move {
        Move {
            player_id: player.to_string(),
            piece_id: g
                .board
                .get(from.parse().unwrap())
                .map(|p| p.piece_id.clone())
                .unwrap_or_default(),
            from: from.to_string(),
            to: to.to_string(),
            is_capture: capture,
            is_kinged: false,
        }
    }

    #[test]
    fn test_valid_opening_move() {
        let mut g = game(BLACK, WHITE, TimerSetting::Reset);
        let m = mv(&g, BLACK, "C2", "D3", false);

        let outcome = DamasService::new().validate_and_make_move(&mut g, &m).unwrap();

        assert_eq!(outcome.turn, TurnOutcome::AdvanceTurn);
        assert_eq!(g.moves.len(), 1);
        assert!(g.board.get("D3".parse().unwrap()).is_some());
        assert!(g.board.get("C2".parse().unwrap()).is_none());
    }

    #[test]
    fn test_wrong_turn_rejected() {
        let mut g = game(BLACK, WHITE, TimerSetting::Reset);
        let before = g.clone();
        let m = mv(&g, WHITE, "F2", "E3", false);

        let result = DamasService::new().validate_and_make_move(&mut g, &m);

        assert_eq!(result, Err(DamasServiceError::NotYourTurn));
        assert_eq!(g, before);
    }

    #[test]
    fn test_forced_capture_rejects_plain_move() {
        let mut g = setup(&[
            ("B4", PieceColor::Black, false),
            ("C5", PieceColor::White, false),
            ("A8", PieceColor::Black, false),
            ("G1", PieceColor::White, false),
        ]);
        let before = g.clone();
        let plain = mv(&g, BLACK, "A8", "B7", false);

        let result = DamasService::new().validate_and_make_move(&mut g, &plain);

        assert_eq!(result, Err(DamasServiceError::ForcedCapture));
        assert_eq!(g, before);
    }

    #[test]
    fn test_forced_capture_rejects_plain_move_by_capturer() {
        let mut g = setup(&[
            ("B4", PieceColor::Black, false),
            ("C5", PieceColor::White, false),
            ("G1", PieceColor::White, false),
        ]);
        let plain = mv(&g, BLACK, "B4", "C3", false);

        let result = DamasService::new().validate_and_make_move(&mut g, &plain);

        assert_eq!(result, Err(DamasServiceError::ForcedCapture));
    }

    #[test]
    fn test_capture_then_advance() {
        let mut g = setup(&[
            ("B4", PieceColor::Black, false),
            ("C5", PieceColor::White, false),
            ("G1", PieceColor::White, false),
        ]);
        let m = mv(&g, BLACK, "B4", "D6", true);

        let outcome = DamasService::new().validate_and_make_move(&mut g, &m).unwrap();

        assert_eq!(outcome.turn, TurnOutcome::AdvanceTurn);
        assert!(g.board.get("C5".parse().unwrap()).is_none());
        assert!(g.board.get("B4".parse().unwrap()).is_none());
        assert_eq!(g.player(WHITE).unwrap().num_pieces, 1);
    }

    #[test]
    fn test_multi_capture_keeps_turn() {
        let mut g = setup(&[
            ("B2", PieceColor::Black, false),
            ("C3", PieceColor::White, false),
            ("E5", PieceColor::White, false),
            ("H8", PieceColor::White, false),
        ]);
        let first = mv(&g, BLACK, "B2", "D4", true);

        let outcome = DamasService::new()
            .validate_and_make_move(&mut g, &first)
            .unwrap();

        assert_eq!(outcome.turn, TurnOutcome::ContinueCapture);
        assert_eq!(g.current_player_id, BLACK);
        assert_eq!(g.turn, 1);

        let second = mv(&g, BLACK, "D4", "F6", true);
        let outcome = DamasService::new()
            .validate_and_make_move(&mut g, &second)
            .unwrap();
        assert_eq!(outcome.turn, TurnOutcome::AdvanceTurn);
    }

    #[test]
    fn test_capture_chain_belongs_to_one_piece() {
        let mut g = setup(&[
            ("B2", PieceColor::Black, false),
            ("C3", PieceColor::White, false),
            ("E5", PieceColor::White, false),
            ("B8", PieceColor::Black, false),
            ("C7", PieceColor::White, false),
            ("H8", PieceColor::White, false),
        ]);
        let first = mv(&g, BLACK, "B2", "D4", true);
        let chaining = first.piece_id.clone();
        DamasService::new()
            .validate_and_make_move(&mut g, &first)
            .unwrap();
        assert_eq!(g.chain_piece.as_deref(), Some(chaining.as_str()));

        let other = mv(&g, BLACK, "B8", "D6", true);
        let before = g.clone();
        assert_eq!(
            DamasService::new().validate_and_make_move(&mut g, &other),
            Err(DamasServiceError::ChainNotFinished(chaining))
        );
        assert_eq!(g, before);

        let second = mv(&g, BLACK, "D4", "F6", true);
        let outcome = DamasService::new()
            .validate_and_make_move(&mut g, &second)
            .unwrap();
        assert_eq!(outcome.turn, TurnOutcome::AdvanceTurn);
        assert!(g.chain_piece.is_none());
    }

    #[test]
    fn test_turn_pass_clears_capture_chain() {
        let mut g = setup(&[
            ("B2", PieceColor::Black, false),
            ("C3", PieceColor::White, false),
            ("E5", PieceColor::White, false),
            ("H8", PieceColor::White, false),
        ]);
        let first = mv(&g, BLACK, "B2", "D4", true);
        DamasService::new()
            .validate_and_make_move(&mut g, &first)
            .unwrap();

        // A timed-out chain hands the turn over like any other.
        g.next_player();

        assert_eq!(g.current_player_id, WHITE);
        assert!(g.chain_piece.is_none());
    }

    #[test]
    fn test_kinging_ends_capture_chain() {
        // Black lands on H after a capture and could keep jumping as a king.
        let mut g = setup(&[
            ("F2", PieceColor::Black, false),
            ("G3", PieceColor::White, false),
            ("F6", PieceColor::White, false),
            ("A1", PieceColor::White, false),
        ]);
        let m = mv(&g, BLACK, "F2", "H4", true);

        let outcome = DamasService::new().validate_and_make_move(&mut g, &m).unwrap();

        assert!(outcome.recorded.is_kinged);
        assert!(g.moves[0].is_kinged);
        assert_eq!(outcome.turn, TurnOutcome::AdvanceTurn);
        assert!(g.board.can_piece_capture("H4".parse().unwrap()));
    }

    #[test]
    fn test_last_capture_wins() {
        let mut g = setup(&[
            ("B4", PieceColor::Black, false),
            ("C5", PieceColor::White, false),
        ]);
        let m = mv(&g, BLACK, "B4", "D6", true);

        let outcome = DamasService::new().validate_and_make_move(&mut g, &m).unwrap();

        assert_eq!(
            outcome.turn,
            TurnOutcome::GameOver {
                winner: BLACK.to_string()
            }
        );
        assert_eq!(g.player(WHITE).unwrap().num_pieces, 0);
    }

    #[test]
    fn test_finished_game_rejects_moves() {
        let mut g = game(BLACK, WHITE, TimerSetting::Reset);
        g.finish(WHITE);
        let m = mv(&g, BLACK, "C3", "D4", false);

        assert_eq!(
            DamasService::new().validate_and_make_move(&mut g, &m),
            Err(DamasServiceError::GameOver)
        );
    }

    #[test]
    fn test_malformed_move_rejected() {
        let mut g = game(BLACK, WHITE, TimerSetting::Reset);
        let mut m = mv(&g, BLACK, "C3", "D4", false);
        m.to = "D".to_string();

        assert_eq!(
            DamasService::new().validate_and_make_move(&mut g, &m),
            Err(DamasServiceError::MalformedPosition("D".to_string()))
        );
        assert!(g.moves.is_empty());
    }
}
