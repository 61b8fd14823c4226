use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 棋盘行数（固定为三行）。
pub const ROWS: usize = 3;
/// 每行的初始火柴数。
pub const INITIAL_PILES: [u8; ROWS] = [3, 5, 7];

/// 玩家标识。0 号玩家总是先手。
pub type PlayerId = u8;

/// 一次取子：从第 `row` 行（从 0 开始）取走 `count` 根火柴。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Move {
    pub row: usize,
    pub count: u8,
}

impl Move {
    pub fn new(row: usize, count: u8) -> Self {
        Self { row, count }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("row {row} holds {value} sticks but starts with only {max}")]
    PileOverflow { row: usize, value: u8, max: u8 },
    #[error("player {player_id} does not exist")]
    InvalidPlayerIndex { player_id: PlayerId },
    #[error("player slot {index} carries id {player_id}")]
    PlayerSlotMismatch { index: usize, player_id: PlayerId },
    #[error("finished flag {finished} disagrees with an empty board flag {empty}")]
    OutcomeMismatch { finished: bool, empty: bool },
    #[error("winner {winner} and loser {loser} are not opponents")]
    InvalidOutcome { winner: PlayerId, loser: PlayerId },
}

/// 棋盘状态：三行火柴的剩余数量。值语义，任何转移都会产生新的状态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GameState {
    pub piles: [u8; ROWS],
}

impl GameState {
    pub fn new(piles: [u8; ROWS]) -> Self {
        Self { piles }
    }

    pub fn initial() -> Self {
        Self::new(INITIAL_PILES)
    }

    pub fn total(&self) -> u32 {
        self.piles.iter().map(|&pile| u32::from(pile)).sum()
    }

    pub fn is_terminal(&self) -> bool {
        self.total() == 0
    }

    pub fn pile(&self, row: usize) -> Option<u8> {
        self.piles.get(row).copied()
    }

    /// 按固定顺序枚举所有合法走法：先按行（0 起），同一行内按取子数递增。
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(self.total() as usize);
        for (row, &pile) in self.piles.iter().enumerate() {
            for count in 1..=pile {
                moves.push(Move { row, count });
            }
        }
        moves
    }

    pub fn is_legal(&self, mv: Move) -> bool {
        self.pile(mv.row)
            .map(|pile| mv.count >= 1 && mv.count <= pile)
            .unwrap_or(false)
    }

    /// 对已知合法的走法直接求后继状态，仅供搜索使用（走法均来自 `legal_moves`）。
    pub(crate) fn after_unchecked(&self, mv: Move) -> GameState {
        let mut piles = self.piles;
        piles[mv.row] -= mv.count;
        GameState { piles }
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        for (row, (&value, &max)) in self.piles.iter().zip(INITIAL_PILES.iter()).enumerate() {
            if value > max {
                return Err(IntegrityError::PileOverflow { row, value, max });
            }
        }
        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::initial()
    }
}
