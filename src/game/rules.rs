use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    session::{GameEvent, VictoryState},
    state::{GameState, IntegrityError, Move, PlayerId, ROWS},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the game is already finished")]
    GameFinished,
    #[error("no legal move: the board is empty")]
    NoLegalMoves,
    #[error("it is not this player's turn")]
    NotPlayerTurn,
    #[error("player {player_id} does not exist")]
    PlayerNotFound { player_id: PlayerId },
    #[error("the player to move is not controlled by the AI")]
    NotAiTurn,
    #[error("row {row} does not exist")]
    InvalidRow { row: usize },
    #[error("cannot remove {count} sticks from row {row} holding {available}")]
    InvalidCount { row: usize, count: u8, available: u8 },
    #[error("corrupted state: {error}")]
    IntegrityViolation { error: IntegrityError },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victory: Option<VictoryState>,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>, victory: Option<VictoryState>) -> Self {
        Self {
            state,
            events,
            victory,
        }
    }
}

/// 规则引擎：校验并执行取子，不持有任何状态。
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn ensure_legal(state: &GameState, mv: Move) -> Result<(), RuleError> {
        if mv.row >= ROWS {
            return Err(RuleError::InvalidRow { row: mv.row });
        }
        let available = state.piles[mv.row];
        if mv.count == 0 || mv.count > available {
            return Err(RuleError::InvalidCount {
                row: mv.row,
                count: mv.count,
                available,
            });
        }
        Ok(())
    }

    pub fn legal_moves(state: &GameState) -> Vec<Move> {
        state.legal_moves()
    }

    /// 执行一次取子并返回新的状态；原状态保持不变。
    pub fn apply_move(&self, state: &GameState, mv: Move) -> Result<GameState, RuleError> {
        if state.is_terminal() {
            return Err(RuleError::GameFinished);
        }
        Self::ensure_integrity(state)?;
        Self::ensure_legal(state, mv)?;
        Ok(state.after_unchecked(mv))
    }

    /// 棋盘取空即终局；输家是取走最后一根的一方，由会话记录。
    pub fn is_game_over(state: &GameState) -> bool {
        state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_move_returns_new_state_and_keeps_input() {
        let engine = RuleEngine::new();
        let state = GameState::initial();

        let next = engine
            .apply_move(&state, Move::new(0, 3))
            .expect("removing a whole row should succeed");

        assert_eq!(next.piles, [0, 5, 7]);
        assert_eq!(state.piles, [3, 5, 7], "input state must not change");
    }

    #[test]
    fn apply_move_rejects_out_of_range_moves() {
        let engine = RuleEngine::new();
        let state = GameState::new([1, 0, 4]);

        assert_eq!(
            engine.apply_move(&state, Move::new(3, 1)),
            Err(RuleError::InvalidRow { row: 3 })
        );
        assert_eq!(
            engine.apply_move(&state, Move::new(1, 1)),
            Err(RuleError::InvalidCount {
                row: 1,
                count: 1,
                available: 0
            })
        );
        assert_eq!(
            engine.apply_move(&state, Move::new(2, 0)),
            Err(RuleError::InvalidCount {
                row: 2,
                count: 0,
                available: 4
            })
        );
        assert_eq!(
            engine.apply_move(&state, Move::new(2, 5)),
            Err(RuleError::InvalidCount {
                row: 2,
                count: 5,
                available: 4
            })
        );
    }

    #[test]
    fn apply_move_on_empty_board_fails() {
        let engine = RuleEngine::new();
        assert_eq!(
            engine.apply_move(&GameState::new([0, 0, 0]), Move::new(0, 1)),
            Err(RuleError::GameFinished)
        );
    }

    #[test]
    fn apply_move_rejects_corrupted_state() {
        let engine = RuleEngine::new();
        let result = engine.apply_move(&GameState::new([4, 0, 0]), Move::new(0, 1));
        assert!(matches!(
            result,
            Err(RuleError::IntegrityViolation {
                error: IntegrityError::PileOverflow { row: 0, .. }
            })
        ));
    }

    #[test]
    fn rule_error_serializes_with_type_tag() {
        let json = serde_json::to_string(&RuleError::InvalidRow { row: 5 }).expect("serialize");
        assert_eq!(json, r#"{"type":"InvalidRow","row":5}"#);
        assert_eq!(
            RuleError::NoLegalMoves.to_string(),
            "no legal move: the board is empty"
        );
    }
}
