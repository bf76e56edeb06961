//! 测试用的状态与卡牌构造器。

use std::collections::BTreeMap;

use super::catalog::{catalog_from_definitions, Attribute, CardDefinition, CardId, UnitStats};
use super::config::RulesConfig;
use super::state::{GamePhase, GameState, HeroDefinition, PlayerState, Unit, UnitId};

pub fn unit_card(id: CardId, attack: u32, hp: u32, attack_interval: u32) -> CardDefinition {
    CardDefinition::unit(
        id,
        format!("Unit {id}"),
        2,
        Attribute::Red,
        UnitStats {
            attack,
            hp,
            attack_interval,
        },
    )
}

pub fn action_card(id: CardId, cost: u32, effects: &str) -> CardDefinition {
    CardDefinition::action(id, format!("Action {id}"), cost, Attribute::Purple).with_effects(effects)
}

pub fn hero(name: &str) -> HeroDefinition {
    HeroDefinition::new(name, Attribute::Black)
}

/// 已进入对战阶段、双方满法力、手牌与牌库为空的状态。
pub fn playing_state() -> GameState {
    let rules = RulesConfig::default();
    let mut players = [
        PlayerState::new(0, hero("Aster"), Vec::new(), &rules),
        PlayerState::new(1, hero("Vesper"), Vec::new(), &rules),
    ];
    for player in &mut players {
        player.mp = player.max_mp;
        player.mulligan_submitted = true;
    }
    GameState::new(players, rules).with_phase(GamePhase::Playing)
}

/// 直接把单位放到指定座位的路上，返回单位 id。
pub fn place(state: &mut GameState, seat: usize, definition: &CardDefinition, lane: u8) -> UnitId {
    let id = state.allocate_unit_id();
    let unit = Unit::spawn(id, definition, lane).expect("unit card");
    state.players[seat].place_unit(unit);
    id
}

pub fn catalog(definitions: Vec<CardDefinition>) -> BTreeMap<CardId, CardDefinition> {
    catalog_from_definitions(definitions)
}
