//! 对战核心逻辑（状态、规则引擎、战斗与效果结算）。

pub mod catalog;
pub mod combat;
pub mod config;
pub mod effects;
pub mod resources;
pub mod response;
pub mod rules;
pub mod state;
pub mod tokens;

#[cfg(test)]
pub mod testing;

pub use catalog::{catalog_from_definitions, Attribute, CardCatalog, CardDefinition, CardId, CardType, UnitStats};
pub use config::RulesConfig;
pub use effects::EffectContext;
pub use rules::{
    create_initial_game_state, step, update_game_state, GameInput, PlayerSetup, RuleEngine,
    RuleError, StepOutcome,
};
pub use state::{
    AbilityKind, ActiveResponseState, GameEvent, GamePhase, GameState, HeroAbility, HeroDefinition,
    IntegrityError, Outcome, PlayerId, PlayerState, StatusEffect, Target, Unit, UnitId,
};
pub use tokens::{parse_card, parse_effect_tokens, requires_target, target_type, EffectTokens, Keyword, TargetKind};
