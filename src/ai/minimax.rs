use std::fmt;
use std::str::FromStr;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game::{GameState, Move, PlayerId, RuleError, ROWS};
use crate::utils::WasmInstant;

/// 搜索值：+1 表示极大方获胜，-1 表示极大方失败。
pub type Score = i32;

pub const WIN: Score = 1;
pub const LOSS: Score = -1;
/// alpha-beta 窗口的 -inf / +inf。
pub const NEG_INF: Score = Score::MIN;
pub const POS_INF: Score = Score::MAX;

const DEFAULT_THINK_DELAY_MS: u64 = 750;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    Medium,
    Hard,
}

impl AiDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiDifficulty::Easy => "easy",
            AiDifficulty::Medium => "medium",
            AiDifficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for AiDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "medium" | "normal" => Ok(AiDifficulty::Medium),
            "hard" => Ok(AiDifficulty::Hard),
            _ => Err(()),
        }
    }
}

impl Default for AiDifficulty {
    fn default() -> Self {
        AiDifficulty::Hard
    }
}

/// 难度决定的选子策略。搜索本身在所有难度下都是完整的精确搜索。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    /// 放弃最优解、改走随机合法步的概率。
    pub random_move_chance: f64,
    /// 选子前是否对每个合法走法做完整搜索评分。
    pub score_all_moves: bool,
    /// AI 落子前的等待时间（毫秒），仅异步接口使用。
    pub think_delay_ms: u64,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        match difficulty {
            AiDifficulty::Easy => Self {
                difficulty,
                random_move_chance: 1.0,
                score_all_moves: false,
                think_delay_ms: DEFAULT_THINK_DELAY_MS,
            },
            AiDifficulty::Medium => Self {
                difficulty,
                random_move_chance: 0.3,
                score_all_moves: true,
                think_delay_ms: DEFAULT_THINK_DELAY_MS,
            },
            AiDifficulty::Hard => Self {
                difficulty,
                random_move_chance: 0.0,
                score_all_moves: true,
                think_delay_ms: DEFAULT_THINK_DELAY_MS,
            },
        }
    }

    pub fn with_think_delay_ms(mut self, delay_ms: u64) -> Self {
        self.think_delay_ms = delay_ms;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiDecision {
    pub action: Move,
    pub evaluation: Score,
    pub nodes: u64,
    pub duration_ms: f64,
    pub difficulty: AiDifficulty,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub best_moves: Vec<Move>,
}

impl AiDecision {
    /// 控制台日志行。行号与玩家编号均按 1 起显示。
    pub fn log_line(&self, player_id: PlayerId) -> String {
        format!(
            "AI Move (Difficulty: {}, Player: {}) → Row {}, Remove {} | Value: {} | Nodes: {} | Time: {:.4}s",
            self.difficulty,
            u32::from(player_id) + 1,
            self.action.row + 1,
            self.action.count,
            self.evaluation,
            self.nodes,
            self.duration_ms / 1000.0
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
}

impl SearchStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 带 alpha-beta 剪枝的极小化极大搜索。
///
/// 棋盘为空说明上一手取走了最后一根火柴，本次调用所代表的一方获胜：
/// `maximizing` 时返回 `WIN`，否则返回 `LOSS`。走法按行、再按取子数递增枚举。
/// 每次调用（含终局）在 `stats` 中计一个节点。
pub fn evaluate(
    state: &GameState,
    maximizing: bool,
    mut alpha: Score,
    mut beta: Score,
    stats: &mut SearchStats,
) -> Score {
    stats.nodes += 1;

    if state.is_terminal() {
        return if maximizing { WIN } else { LOSS };
    }

    if maximizing {
        let mut value = NEG_INF;
        for row in 0..ROWS {
            for count in 1..=state.piles[row] {
                let child = state.after_unchecked(Move { row, count });
                let score = evaluate(&child, false, alpha, beta, stats);
                value = value.max(score);
                alpha = alpha.max(value);
                if alpha >= beta {
                    return value;
                }
            }
        }
        value
    } else {
        let mut value = POS_INF;
        for row in 0..ROWS {
            for count in 1..=state.piles[row] {
                let child = state.after_unchecked(Move { row, count });
                let score = evaluate(&child, true, alpha, beta, stats);
                value = value.min(score);
                beta = beta.min(value);
                if alpha >= beta {
                    return value;
                }
            }
        }
        value
    }
}

/// 全窗口搜索，不关心节点数。
pub fn evaluate_position(state: &GameState, maximizing: bool) -> Score {
    evaluate(state, maximizing, NEG_INF, POS_INF, &mut SearchStats::new())
}

pub struct AiAgent<R = SmallRng> {
    config: AiConfig,
    rng: R,
}

impl AiAgent<SmallRng> {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> AiAgent<R> {
    pub fn with_rng(config: AiConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// 走 `mv` 一方的得分：从对手回合开始做全窗口搜索。
    fn score_move(&self, state: &GameState, mv: Move, stats: &mut SearchStats) -> Score {
        let child = state.after_unchecked(mv);
        evaluate(&child, false, NEG_INF, POS_INF, stats)
    }

    /// 为当前局面选择一步棋，并返回评估值与搜索统计。
    pub fn select_move(&mut self, state: &GameState) -> Result<AiDecision, RuleError> {
        let start = WasmInstant::now();
        let mut stats = SearchStats::new();

        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })?;

        let moves = state.legal_moves();
        if moves.is_empty() {
            return Err(RuleError::NoLegalMoves);
        }

        let scores: Vec<Score> = if self.config.score_all_moves {
            moves
                .iter()
                .map(|&mv| self.score_move(state, mv, &mut stats))
                .collect()
        } else {
            Vec::new()
        };

        let best_indices: Vec<usize> = match scores.iter().max() {
            Some(&best) => (0..moves.len()).filter(|&i| scores[i] == best).collect(),
            None => Vec::new(),
        };

        let random_index = self.rng.gen_range(0..moves.len());
        let chance = self.config.random_move_chance.clamp(0.0, 1.0);
        let play_random = best_indices.is_empty() || (chance > 0.0 && self.rng.gen_bool(chance));

        let chosen = if play_random {
            random_index
        } else {
            best_indices
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(random_index)
        };

        let action = moves[chosen];
        let evaluation = match scores.get(chosen) {
            Some(&score) => score,
            None => self.score_move(state, action, &mut stats),
        };

        Ok(AiDecision {
            action,
            evaluation,
            nodes: stats.nodes,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            difficulty: self.config.difficulty,
            best_moves: best_indices.iter().map(|&i| moves[i]).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::INITIAL_PILES;
    use std::collections::HashMap;

    fn all_states() -> Vec<GameState> {
        let mut states = Vec::new();
        for a in 0..=INITIAL_PILES[0] {
            for b in 0..=INITIAL_PILES[1] {
                for c in 0..=INITIAL_PILES[2] {
                    states.push(GameState::new([a, b, c]));
                }
            }
        }
        states
    }

    /// 不剪枝的极小化极大（按局面与回合记忆化）。
    fn reference_value(
        state: GameState,
        maximizing: bool,
        memo: &mut HashMap<(GameState, bool), Score>,
    ) -> Score {
        if let Some(&value) = memo.get(&(state, maximizing)) {
            return value;
        }
        let value = if state.is_terminal() {
            if maximizing {
                WIN
            } else {
                LOSS
            }
        } else {
            let children = state
                .legal_moves()
                .into_iter()
                .map(|mv| reference_value(state.after_unchecked(mv), !maximizing, memo));
            if maximizing {
                children.max().unwrap_or(NEG_INF)
            } else {
                children.min().unwrap_or(POS_INF)
            }
        };
        memo.insert((state, maximizing), value);
        value
    }

    /// Misère 规则的解析解：轮到的一方是否必胜。
    fn mover_wins(state: &GameState) -> bool {
        if state.piles.iter().all(|&pile| pile <= 1) {
            state.piles.iter().filter(|&&pile| pile == 1).count() % 2 == 0
        } else {
            state.piles.iter().fold(0, |acc, &pile| acc ^ pile) != 0
        }
    }

    fn hard_agent(seed: u64) -> AiAgent {
        AiAgent::with_seed(AiConfig::from_difficulty(AiDifficulty::Hard), seed)
    }

    #[test]
    fn known_endgame_values() {
        assert_eq!(evaluate_position(&GameState::new([0, 0, 1]), true), LOSS);
        assert_eq!(evaluate_position(&GameState::new([0, 0, 0]), true), WIN);
        assert_eq!(evaluate_position(&GameState::new([0, 0, 0]), false), LOSS);
        assert_eq!(evaluate_position(&GameState::new([1, 1, 0]), true), WIN);
    }

    #[test]
    fn node_counts_are_deterministic() {
        let mut stats = SearchStats::new();
        evaluate(&GameState::new([0, 0, 1]), true, NEG_INF, POS_INF, &mut stats);
        assert_eq!(stats.nodes, 2);

        let mut stats = SearchStats::new();
        evaluate(&GameState::new([1, 2, 3]), true, NEG_INF, POS_INF, &mut stats);
        assert_eq!(stats.nodes, 226);

        let mut again = SearchStats::new();
        evaluate(&GameState::new([1, 2, 3]), true, NEG_INF, POS_INF, &mut again);
        assert_eq!(stats, again);
    }

    #[test]
    fn pruned_search_matches_unpruned_minimax_everywhere() {
        let mut memo = HashMap::new();
        for state in all_states() {
            for maximizing in [true, false] {
                let pruned = evaluate_position(&state, maximizing);
                assert!(pruned == WIN || pruned == LOSS, "{state:?} gave {pruned}");
                assert_eq!(
                    pruned,
                    reference_value(state, maximizing, &mut memo),
                    "mismatch at {state:?} maximizing={maximizing}"
                );
            }
        }
    }

    #[test]
    fn search_agrees_with_closed_form_and_is_symmetric() {
        let mut memo = HashMap::new();
        for state in all_states() {
            let as_max = reference_value(state, true, &mut memo);
            let as_min = reference_value(state, false, &mut memo);
            assert_eq!(as_max, -as_min, "{state:?}");
            assert_eq!(as_max == WIN, mover_wins(&state), "{state:?}");
        }
        assert_eq!(evaluate_position(&GameState::initial(), true), WIN);
    }

    #[test]
    fn evaluate_leaves_input_untouched() {
        let state = GameState::new([2, 3, 4]);
        let before = state;
        evaluate_position(&state, true);
        evaluate_position(&state, false);
        assert_eq!(state, before);
    }

    #[test]
    fn select_move_on_empty_board_has_no_move() {
        for difficulty in [AiDifficulty::Easy, AiDifficulty::Medium, AiDifficulty::Hard] {
            let mut agent = AiAgent::with_seed(AiConfig::from_difficulty(difficulty), 1);
            assert_eq!(
                agent.select_move(&GameState::new([0, 0, 0])),
                Err(RuleError::NoLegalMoves)
            );
        }
    }

    #[test]
    fn select_move_rejects_corrupted_state() {
        let mut agent = hard_agent(3);
        assert!(matches!(
            agent.select_move(&GameState::new([0, 9, 0])),
            Err(RuleError::IntegrityViolation { .. })
        ));
    }

    #[test]
    fn every_difficulty_returns_a_legal_opening_move() {
        let state = GameState::initial();
        for difficulty in [AiDifficulty::Easy, AiDifficulty::Medium, AiDifficulty::Hard] {
            let mut agent = AiAgent::with_seed(AiConfig::from_difficulty(difficulty), 11);
            let decision = agent.select_move(&state).expect("opening has moves");
            assert!(decision.action.row < ROWS);
            assert!(decision.action.count >= 1);
            assert!(decision.action.count <= state.piles[decision.action.row]);
            assert!(decision.nodes > 0);
            assert_eq!(decision.difficulty, difficulty);
        }
    }

    #[test]
    fn forced_last_stick_is_reported_as_a_loss() {
        let mut agent = hard_agent(5);
        let decision = agent
            .select_move(&GameState::new([0, 0, 1]))
            .expect("one move left");
        assert_eq!(decision.action, Move::new(2, 1));
        assert_eq!(decision.evaluation, LOSS);
        assert_eq!(decision.nodes, 1);
    }

    #[test]
    fn hard_always_plays_a_best_move() {
        let mut agent = hard_agent(42);
        for state in all_states().into_iter().filter(|s| !s.is_terminal()) {
            let best = state
                .legal_moves()
                .into_iter()
                .map(|mv| evaluate_position(&state.after_unchecked(mv), false))
                .max()
                .expect("non-terminal state has moves");

            let repeats = if state.total() <= 10 { 3 } else { 1 };
            for _ in 0..repeats {
                let decision = agent.select_move(&state).expect("has moves");
                assert_eq!(decision.evaluation, best, "{state:?}");
                assert_eq!(
                    evaluate_position(&state.after_unchecked(decision.action), false),
                    best
                );
                assert!(decision.best_moves.contains(&decision.action));
            }
        }
    }

    #[test]
    fn hard_reply_after_clearing_first_row_wins() {
        let state = GameState::new([0, 5, 7]);
        let mut agent = hard_agent(9);
        let decision = agent.select_move(&state).expect("has moves");

        assert_eq!(decision.action, Move::new(2, 2));
        assert_eq!(decision.evaluation, WIN);
        assert_eq!(decision.best_moves, vec![Move::new(2, 2)]);
        assert_eq!(decision.nodes, 50_793);
    }

    #[test]
    fn hard_breaks_ties_randomly() {
        // Every reply loses from [1,2,3], so all six moves tie.
        let state = GameState::new([1, 2, 3]);
        let mut agent = hard_agent(21);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let decision = agent.select_move(&state).expect("has moves");
            assert_eq!(decision.evaluation, LOSS);
            assert_eq!(decision.best_moves.len(), 6);
            seen.insert(decision.action);
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn easy_picks_moves_uniformly() {
        let state = GameState::new([1, 2, 3]);
        let moves = state.legal_moves();
        let mut agent = AiAgent::with_seed(AiConfig::from_difficulty(AiDifficulty::Easy), 1234);
        let mut counts: HashMap<Move, u32> = HashMap::new();

        let trials = 6_000;
        for _ in 0..trials {
            let decision = agent.select_move(&state).expect("has moves");
            assert!(decision.best_moves.is_empty());
            assert!(decision.nodes > 0, "easy still searches its own move");
            *counts.entry(decision.action).or_default() += 1;
        }

        let expected = trials / moves.len() as u32;
        for mv in moves {
            let count = counts.get(&mv).copied().unwrap_or(0);
            assert!(
                count > expected * 85 / 100 && count < expected * 115 / 100,
                "{mv:?} picked {count} times, expected about {expected}"
            );
        }
    }

    #[test]
    fn easy_value_matches_search_of_chosen_move() {
        let state = GameState::new([0, 2, 3]);
        let mut agent = AiAgent::with_seed(AiConfig::from_difficulty(AiDifficulty::Easy), 77);
        for _ in 0..20 {
            let decision = agent.select_move(&state).expect("has moves");
            assert_eq!(
                decision.evaluation,
                evaluate_position(&state.after_unchecked(decision.action), false)
            );
        }
    }

    #[test]
    fn medium_mixes_random_and_best_moves() {
        // Only (row 2, remove 1) wins from [0,2,3].
        let state = GameState::new([0, 2, 3]);
        let mut agent = AiAgent::with_seed(AiConfig::from_difficulty(AiDifficulty::Medium), 8);
        let trials = 2_000;
        let mut off_best = 0;
        for _ in 0..trials {
            let decision = agent.select_move(&state).expect("has moves");
            assert_eq!(decision.best_moves, vec![Move::new(2, 1)]);
            assert_eq!(decision.nodes, 72);
            if decision.action != Move::new(2, 1) {
                off_best += 1;
                assert_eq!(decision.evaluation, LOSS);
            }
        }
        // Expected share of non-best moves: 0.3 * 4/5 = 0.24.
        assert!(off_best > 300 && off_best < 700, "off_best = {off_best}");
    }

    #[test]
    fn seeded_agents_reproduce_decisions() {
        let state = GameState::new([2, 3, 1]);
        let config = AiConfig::from_difficulty(AiDifficulty::Medium);
        let mut first = AiAgent::with_seed(config.clone(), 99);
        let mut second = AiAgent::with_seed(config, 99);
        for _ in 0..25 {
            let a = first.select_move(&state).expect("has moves");
            let b = second.select_move(&state).expect("has moves");
            assert_eq!(a.action, b.action);
            assert_eq!(a.evaluation, b.evaluation);
            assert_eq!(a.nodes, b.nodes);
        }
    }

    #[test]
    fn difficulty_parsing_and_log_line() {
        assert_eq!("Hard".parse::<AiDifficulty>(), Ok(AiDifficulty::Hard));
        assert_eq!("normal".parse::<AiDifficulty>(), Ok(AiDifficulty::Medium));
        assert!("expert".parse::<AiDifficulty>().is_err());

        let decision = AiDecision {
            action: Move::new(1, 3),
            evaluation: WIN,
            nodes: 4821,
            duration_ms: 12.3,
            difficulty: AiDifficulty::Hard,
            best_moves: Vec::new(),
        };
        assert_eq!(
            decision.log_line(1),
            "AI Move (Difficulty: hard, Player: 2) → Row 2, Remove 3 | Value: 1 | Nodes: 4821 | Time: 0.0123s"
        );
    }
}
