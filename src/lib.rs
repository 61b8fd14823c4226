pub mod ai;
pub mod game;
pub mod utils;

use std::str::FromStr;
use std::time::Duration;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{
    evaluate, evaluate_position, AiAgent, AiConfig, AiDecision, AiDifficulty, Score, SearchStats,
    LOSS, NEG_INF, POS_INF, WIN,
};
pub use game::{
    human_move_log_line, GameEvent, GameMode, GameSession, GameState, IntegrityError, Move,
    PlayerId, PlayerSlot, RuleEngine, RuleError, RuleResolution, VictoryState, INITIAL_PILES, ROWS,
};
use utils::{log_line, set_panic_hook, WasmInstant};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn parse_difficulty(difficulty: Option<&str>) -> AiDifficulty {
    difficulty
        .and_then(|value| AiDifficulty::from_str(value).ok())
        .unwrap_or_default()
}

fn parse_mode(mode: Option<&str>) -> GameMode {
    mode.and_then(|value| GameMode::from_str(value).ok())
        .unwrap_or(GameMode::HumanVsAi)
}

#[derive(Serialize)]
struct AiMoveResponse {
    decision: AiDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<RuleResolution>,
}

#[derive(Serialize)]
struct EvaluationReport {
    value: Score,
    nodes: u64,
}

/// 前端持有的对局引擎：封装会话、AI 与日志输出。
#[wasm_bindgen]
pub struct NimEngine {
    session: GameSession,
    agent: AiAgent,
    turn_started: Option<WasmInstant>,
}

#[wasm_bindgen]
impl NimEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(mode: Option<String>, difficulty: Option<String>) -> NimEngine {
        let difficulty = parse_difficulty(difficulty.as_deref());
        let session = GameSession::new(parse_mode(mode.as_deref()), difficulty);
        log_line(&session.start_log_line());
        let mut engine = NimEngine {
            session,
            agent: AiAgent::new(AiConfig::from_difficulty(difficulty)),
            turn_started: None,
        };
        engine.mark_turn_start();
        engine
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.state).map_err(serde_to_js_error)
    }

    pub fn session_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session).map_err(serde_to_js_error)
    }

    pub fn set_session_json(&mut self, json: &str) -> Result<(), JsValue> {
        let session: GameSession = serde_json::from_str(json).map_err(serde_to_js_error)?;
        session.validate().map_err(to_js_error)?;
        self.agent = AiAgent::new(AiConfig::from_difficulty(session.difficulty));
        self.session = session;
        self.mark_turn_start();
        Ok(())
    }

    pub fn is_ai_turn(&self) -> bool {
        self.session.is_ai_turn()
    }

    pub fn current_player(&self) -> u8 {
        self.session.current_player()
    }

    pub fn result_message(&self) -> Option<String> {
        self.session.result_message()
    }

    /// 人类玩家取子，`move_json` 形如 `{"row":0,"count":2}`。
    pub fn apply_move_json(&mut self, player_id: u8, move_json: &str) -> Result<String, JsValue> {
        let mv: Move = serde_json::from_str(move_json).map_err(serde_to_js_error)?;
        let resolution = self
            .session
            .apply_move(player_id, mv)
            .map_err(to_js_error)?;

        let elapsed = self.turn_started.map(|start| start.elapsed());
        log_line(&human_move_log_line(player_id, mv, elapsed));
        self.after_move();
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }

    pub fn apply_ai_move(&mut self) -> Result<String, JsValue> {
        let player_id = self.session.current_player();
        let (decision, resolution) = self
            .session
            .ai_move(&mut self.agent)
            .map_err(to_js_error)?;

        log_line(&decision.log_line(player_id));
        self.after_move();

        let response = AiMoveResponse {
            decision,
            applied: Some(resolution),
        };
        serde_json::to_string(&response).map_err(serde_to_js_error)
    }

    /// 异步计算 AI 的下一步（不落子），先等待 `delay_ms` 毫秒，默认 750ms。
    pub fn think_ai(&self, delay_ms: Option<u32>) -> Promise {
        let state = self.session.state;
        let config = AiConfig::from_difficulty(self.session.difficulty);
        let delay = delay_ms
            .map(|ms| Duration::from_millis(u64::from(ms)))
            .unwrap_or(Duration::from_millis(config.think_delay_ms));

        future_to_promise(async move {
            if !delay.is_zero() {
                TimeoutFuture::new(delay.as_millis().min(u128::from(u32::MAX)) as u32).await;
            }
            let mut agent = AiAgent::new(config);
            let decision = agent.select_move(&state).map_err(to_js_error)?;
            let response = AiMoveResponse {
                decision,
                applied: None,
            };
            let json = serde_json::to_string(&response).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn restart(&mut self) -> Result<String, JsValue> {
        self.session.restart();
        log_line(&self.session.start_log_line());
        self.mark_turn_start();
        self.session_json()
    }

    pub fn change_mode(&mut self, mode: &str, difficulty: Option<String>) -> Result<String, JsValue> {
        let mode = GameMode::from_str(mode)
            .map_err(|_| JsValue::from_str(&format!("unknown game mode: {mode}")))?;
        let difficulty = parse_difficulty(difficulty.as_deref());
        self.session.change_mode(mode, difficulty);
        self.agent = AiAgent::new(AiConfig::from_difficulty(difficulty));
        log_line(&self.session.start_log_line());
        self.mark_turn_start();
        self.session_json()
    }

    fn after_move(&mut self) {
        if let Some(line) = self.session.end_log_line() {
            log_line(&line);
        }
        self.mark_turn_start();
    }

    fn mark_turn_start(&mut self) {
        self.turn_started = if self.session.is_finished() || self.session.is_ai_turn() {
            None
        } else {
            Some(WasmInstant::now())
        };
    }
}

/// 返回初始棋盘 `[3, 5, 7]`。
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state() -> Result<JsValue, JsValue> {
    to_value(&GameState::initial()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}

#[wasm_bindgen(js_name = "legalMoves")]
pub fn legal_moves(state: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    to_value(&RuleEngine::legal_moves(&state)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "applyMove")]
pub fn apply_move(state: JsValue, mv: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let mv: Move = from_value(mv).map_err(JsValue::from)?;
    match RuleEngine::new().apply_move(&state, mv) {
        Ok(next) => to_value(&next).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "evaluatePosition")]
pub fn evaluate_position_js(state: JsValue, maximizing: bool) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    let mut stats = SearchStats::new();
    let value = evaluate(&state, maximizing, NEG_INF, POS_INF, &mut stats);
    to_value(&EvaluationReport {
        value,
        nodes: stats.nodes,
    })
    .map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(
    state: JsValue,
    difficulty: Option<String>,
    seed: Option<u32>,
) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let config = AiConfig::from_difficulty(parse_difficulty(difficulty.as_deref()));
    let mut agent = match seed {
        Some(seed) => AiAgent::with_seed(config, u64::from(seed)),
        None => AiAgent::new(config),
    };
    let decision = agent.select_move(&state).map_err(to_js_error)?;
    to_value(&decision).map_err(JsValue::from)
}
