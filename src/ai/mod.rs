//! AI 算法模块（带 alpha-beta 剪枝的极小化极大搜索与难度策略）。

pub mod minimax;

pub use minimax::{
    evaluate, evaluate_position, AiAgent, AiConfig, AiDecision, AiDifficulty, Score, SearchStats,
    LOSS, NEG_INF, POS_INF, WIN,
};
