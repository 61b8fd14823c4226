use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{
    rules::{RuleEngine, RuleError, RuleResolution},
    state::{GameState, IntegrityError, Move, PlayerId},
};
use crate::ai::{AiAgent, AiDecision, AiDifficulty};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    HumanVsAi,
    Hotseat,
    AiVsAi,
}

impl GameMode {
    fn slots(self) -> [PlayerSlot; 2] {
        match self {
            GameMode::HumanVsAi => [
                PlayerSlot::new(0, "Human", true),
                PlayerSlot::new(1, "AI", false),
            ],
            GameMode::Hotseat => [
                PlayerSlot::new(0, "Player 1", true),
                PlayerSlot::new(1, "Player 2", true),
            ],
            GameMode::AiVsAi => [
                PlayerSlot::new(0, "AI 1", false),
                PlayerSlot::new(1, "AI 2", false),
            ],
        }
    }

    pub fn has_ai(self) -> bool {
        !matches!(self, GameMode::Hotseat)
    }
}

impl FromStr for GameMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human_vs_ai" | "human-vs-ai" | "pve" => Ok(GameMode::HumanVsAi),
            "hotseat" | "human_vs_human" | "pvp" => Ok(GameMode::Hotseat),
            "ai_vs_ai" | "ai-vs-ai" | "eve" => Ok(GameMode::AiVsAi),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerSlot {
    pub id: PlayerId,
    pub name: String,
    pub is_human: bool,
}

impl PlayerSlot {
    pub fn new(id: PlayerId, name: impl Into<String>, is_human: bool) -> Self {
        Self {
            id,
            name: name.into(),
            is_human,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VictoryState {
    pub winner: PlayerId,
    pub loser: PlayerId,
}

/// 对局事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    GameStarted {
        mode: GameMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        difficulty: Option<AiDifficulty>,
    },
    SticksRemoved {
        player_id: PlayerId,
        row: usize,
        count: u8,
        remaining: u32,
    },
    GameWon {
        winner: PlayerId,
        loser: PlayerId,
    },
}

/// 一局（及多局累计）的会话状态：模式、玩家、胜场计数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub state: GameState,
    pub mode: GameMode,
    pub difficulty: AiDifficulty,
    pub current_player: PlayerId,
    pub players: [PlayerSlot; 2],
    pub wins: [u32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VictoryState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

impl GameSession {
    pub fn new(mode: GameMode, difficulty: AiDifficulty) -> Self {
        let mut session = Self {
            state: GameState::initial(),
            mode,
            difficulty,
            current_player: 0,
            players: mode.slots(),
            wins: [0, 0],
            outcome: None,
            event_log: Vec::new(),
        };
        session.start_game();
        session
    }

    fn start_game(&mut self) {
        self.state = GameState::initial();
        self.current_player = 0;
        self.outcome = None;
        let difficulty = self.mode.has_ai().then_some(self.difficulty);
        self.event_log.push(GameEvent::GameStarted {
            mode: self.mode,
            difficulty,
        });
    }

    pub fn opponent_of(player_id: PlayerId) -> Option<PlayerId> {
        match player_id {
            0 => Some(1),
            1 => Some(0),
            _ => None,
        }
    }

    /// 校验外部载入的会话：玩家编号、当前玩家以及终局标记须与棋盘一致。
    pub fn validate(&self) -> Result<(), RuleError> {
        let violation = |error| RuleError::IntegrityViolation { error };
        self.state.integrity_check().map_err(violation)?;

        for (index, slot) in self.players.iter().enumerate() {
            if usize::from(slot.id) != index {
                return Err(violation(IntegrityError::PlayerSlotMismatch {
                    index,
                    player_id: slot.id,
                }));
            }
        }

        if Self::opponent_of(self.current_player).is_none() {
            return Err(violation(IntegrityError::InvalidPlayerIndex {
                player_id: self.current_player,
            }));
        }

        let finished = self.outcome.is_some();
        let empty = self.state.is_terminal();
        if finished != empty {
            return Err(violation(IntegrityError::OutcomeMismatch { finished, empty }));
        }

        if let Some(outcome) = &self.outcome {
            if Self::opponent_of(outcome.loser) != Some(outcome.winner) {
                return Err(violation(IntegrityError::InvalidOutcome {
                    winner: outcome.winner,
                    loser: outcome.loser,
                }));
            }
        }
        Ok(())
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerSlot> {
        self.players.get(usize::from(id))
    }

    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.outcome.as_ref().map(|outcome| outcome.winner)
    }

    pub fn wins(&self, player_id: PlayerId) -> u32 {
        self.wins.get(usize::from(player_id)).copied().unwrap_or(0)
    }

    pub fn is_ai_turn(&self) -> bool {
        !self.is_finished()
            && self
                .player(self.current_player)
                .map(|player| !player.is_human)
                .unwrap_or(false)
    }

    /// 执行当前玩家的一步。取走最后一根火柴的一方判负。
    pub fn apply_move(&mut self, player_id: PlayerId, mv: Move) -> Result<RuleResolution, RuleError> {
        if self.is_finished() {
            return Err(RuleError::GameFinished);
        }
        let opponent =
            Self::opponent_of(player_id).ok_or(RuleError::PlayerNotFound { player_id })?;
        if player_id != self.current_player {
            return Err(RuleError::NotPlayerTurn);
        }

        let next = RuleEngine::new().apply_move(&self.state, mv)?;
        self.state = next;

        let mut events = vec![GameEvent::SticksRemoved {
            player_id,
            row: mv.row,
            count: mv.count,
            remaining: next.total(),
        }];

        if RuleEngine::is_game_over(&next) {
            let winner = opponent;
            let victory = VictoryState {
                winner,
                loser: player_id,
            };
            self.wins[usize::from(winner)] += 1;
            self.outcome = Some(victory);
            events.push(GameEvent::GameWon {
                winner,
                loser: player_id,
            });
        } else {
            self.current_player = opponent;
        }

        self.event_log.extend(events.iter().cloned());
        Ok(RuleResolution::new(self.state, events, self.outcome.clone()))
    }

    /// 轮到 AI 时，选择并执行一步。
    pub fn ai_move<R: Rng>(
        &mut self,
        agent: &mut AiAgent<R>,
    ) -> Result<(AiDecision, RuleResolution), RuleError> {
        if self.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if !self.is_ai_turn() {
            return Err(RuleError::NotAiTurn);
        }
        let decision = agent.select_move(&self.state)?;
        let resolution = self.apply_move(self.current_player, decision.action)?;
        Ok((decision, resolution))
    }

    /// 再来一局：玩家不变，保留胜场计数。
    pub fn restart(&mut self) {
        self.start_game();
    }

    pub fn change_mode(&mut self, mode: GameMode, difficulty: AiDifficulty) {
        self.mode = mode;
        self.difficulty = difficulty;
        self.players = mode.slots();
        self.start_game();
    }

    fn player_name(&self, id: PlayerId) -> &str {
        self.player(id).map(|player| player.name.as_str()).unwrap_or("?")
    }

    pub fn start_log_line(&self) -> String {
        let difficulty = if self.mode.has_ai() {
            self.difficulty.as_str()
        } else {
            "N/A"
        };
        format!(
            "New game started: Mode - {} vs {}, Difficulty: {}",
            self.player_name(0),
            self.player_name(1),
            difficulty
        )
    }

    pub fn end_log_line(&self) -> Option<String> {
        self.winner()
            .map(|winner| format!("Game ended, Winner: {}", self.player_name(winner)))
    }

    /// 终局提示语。
    pub fn result_message(&self) -> Option<String> {
        self.outcome.as_ref().map(|outcome| {
            format!(
                "{} took the last stick! {} wins!",
                self.player_name(outcome.loser),
                self.player_name(outcome.winner)
            )
        })
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GameMode::HumanVsAi => "Human vs AI",
            GameMode::Hotseat => "Hotseat",
            GameMode::AiVsAi => "AI vs AI",
        };
        f.write_str(label)
    }
}

/// 人类玩家走子的日志行（无搜索数据）。玩家编号按 1 起显示。
pub fn human_move_log_line(player_id: PlayerId, mv: Move, elapsed: Option<Duration>) -> String {
    let time = elapsed
        .map(|duration| format!("{:.4}s", duration.as_secs_f64()))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "Human Move (Player: {}) → Row {}, Remove {} | Value: N/A | Nodes: N/A | Time: {}",
        u32::from(player_id) + 1,
        mv.row + 1,
        mv.count,
        time
    )
}
