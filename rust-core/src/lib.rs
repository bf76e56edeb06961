pub mod game;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub use game::{
    create_initial_game_state, step, update_game_state, CardCatalog, CardDefinition, CardId,
    CardType, GameEvent, GameInput, GamePhase, GameState, IntegrityError, PlayerId, PlayerSetup,
    RuleEngine, RuleError, RulesConfig, StepOutcome, Target,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

type Catalog = BTreeMap<CardId, CardDefinition>;

/// 开局参数：双方配置与可选的规则覆盖。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSetup {
    pub player_a: PlayerSetup,
    pub player_b: PlayerSetup,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    init_logger();
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

#[derive(Debug)]
enum SetupError {
    Json(serde_json::Error),
    Rule(RuleError),
}

impl From<SetupError> for JsValue {
    fn from(error: SetupError) -> Self {
        match error {
            SetupError::Json(error) => serde_to_js_error(error),
            SetupError::Rule(error) => to_js_error(error),
        }
    }
}

fn build_match(catalog_json: &str, setup_json: &str, seed: u64) -> Result<(Catalog, GameState), SetupError> {
    let definitions: Vec<CardDefinition> = serde_json::from_str(catalog_json).map_err(SetupError::Json)?;
    let setup: MatchSetup = serde_json::from_str(setup_json).map_err(SetupError::Json)?;
    let catalog = game::catalog_from_definitions(definitions);
    let state = create_initial_game_state(setup.player_a, setup.player_b, &catalog, seed, setup.rules)
        .map_err(SetupError::Rule)?;
    Ok((catalog, state))
}

/// 持有卡牌目录与当前状态的对局句柄，供浏览器端逐帧驱动。
#[wasm_bindgen]
pub struct BattleEngine {
    catalog: Catalog,
    state: GameState,
}

#[wasm_bindgen]
impl BattleEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(catalog_json: &str, setup_json: &str, seed: u64) -> Result<BattleEngine, JsValue> {
        let (catalog, state) = build_match(catalog_json, setup_json, seed)?;
        Ok(BattleEngine { catalog, state })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    /// 推进一步并返回 `StepOutcome` 的 JSON。`input_json` 为空时是时钟推进。
    pub fn update(&mut self, input_json: Option<String>, dt_ms: u32) -> Result<String, JsValue> {
        let input: Option<GameInput> = input_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(serde_to_js_error)?;
        let outcome = step(&self.state, input.as_ref(), dt_ms, &self.catalog);
        self.state = outcome.state.clone();
        serde_json::to_string(&outcome).map_err(serde_to_js_error)
    }
}

#[wasm_bindgen(js_name = "createInitialGameState")]
pub fn create_initial_game_state_js(catalog: JsValue, setup: JsValue, seed: u64) -> Result<JsValue, JsValue> {
    let definitions: Vec<CardDefinition> = from_value(catalog).map_err(JsValue::from)?;
    let setup: MatchSetup = from_value(setup).map_err(JsValue::from)?;
    let catalog = game::catalog_from_definitions(definitions);
    let state = create_initial_game_state(setup.player_a, setup.player_b, &catalog, seed, setup.rules)
        .map_err(to_js_error)?;
    to_value(&state).map_err(JsValue::from)
}

/// 纯函数接口：非法输入返回原状态。`input` 可为 `null`。
#[wasm_bindgen(js_name = "updateGameState")]
pub fn update_game_state_js(
    state: JsValue,
    input: JsValue,
    dt_ms: u32,
    catalog: JsValue,
) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let input: Option<GameInput> = from_value(input).map_err(JsValue::from)?;
    let definitions: Vec<CardDefinition> = from_value(catalog).map_err(JsValue::from)?;
    let catalog = game::catalog_from_definitions(definitions);
    to_value(&update_game_state(&state, input.as_ref(), dt_ms, &catalog)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state.integrity_check().map_err(serde_to_js_error)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}

#[cfg(feature = "console_log")]
fn init_logger() {
    // 重复初始化只会返回错误，忽略即可
    let _ = console_log::init_with_level(log::Level::Info);
}

#[cfg(not(feature = "console_log"))]
fn init_logger() {}
