//! 游戏核心逻辑模块（棋盘状态、规则引擎、对局会话）。

pub mod rules;
pub mod session;
pub mod state;

pub use rules::{RuleEngine, RuleError, RuleResolution};
pub use session::{human_move_log_line, GameEvent, GameMode, GameSession, PlayerSlot, VictoryState};
pub use state::{GameState, IntegrityError, Move, PlayerId, INITIAL_PILES, ROWS};
