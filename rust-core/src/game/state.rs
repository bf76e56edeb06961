use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::catalog::{Attribute, CardDefinition, CardId};
use super::config::RulesConfig;
use super::tokens::{parse_card, FULL_RUSH};

/// 玩家标识。
pub type PlayerId = u8;
/// 单位实例标识，每次上场分配新值，不复用。
pub type UnitId = u32;

/// 游戏阶段。`Ended` 为终态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Mulligan,
    Playing,
    Ended,
}

impl Default for GamePhase {
    fn default() -> Self {
        Self::Mulligan
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusEffect {
    Flight,
    Shield,
    Agility,
    Veil,
    HeavyPierce,
    AntiAir,
    Indestructible,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Winner { player_id: PlayerId },
    Draw,
}

/// 效果或技能选择的目标。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    Unit { unit_id: UnitId },
    Hero { player_id: PlayerId },
}

/// 英雄技能（必杀技或伙伴技），效果沿用卡牌词条语法。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeroAbility {
    pub name: String,
    pub cost: u32,
    #[serde(default)]
    pub requires_target: bool,
    pub effect: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeroDefinition {
    pub name: String,
    pub attribute: Attribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_art: Option<HeroAbility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion: Option<HeroAbility>,
}

impl HeroDefinition {
    pub fn new(name: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            name: name.into(),
            attribute,
            hero_art: None,
            companion: None,
        }
    }

    pub fn with_hero_art(mut self, ability: HeroAbility) -> Self {
        self.hero_art = Some(ability);
        self
    }

    pub fn with_companion(mut self, ability: HeroAbility) -> Self {
        self.companion = Some(ability);
        self
    }
}

/// 单次受击的结算结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitResult {
    pub absorbed: bool,
    pub dealt: u32,
    /// 超出剩余生命的伤害，仅在单位被击破时非零。
    pub overflow: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    pub id: UnitId,
    pub card_id: CardId,
    pub hp: u32,
    pub max_hp: u32,
    pub attack: u32,
    pub attack_gauge: f64,
    pub attack_interval: u32,
    pub lane: u8,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub status_effects: BTreeSet<StatusEffect>,
}

impl Unit {
    /// 按卡牌定义生成单位；非单位卡返回 `None`。
    pub fn spawn(id: UnitId, definition: &CardDefinition, lane: u8) -> Option<Self> {
        let stats = definition.unit_stats?;
        let tokens = parse_card(definition);
        let attack_gauge = tokens
            .rush()
            .map(|amount| f64::from(amount.min(FULL_RUSH)) / f64::from(FULL_RUSH))
            .unwrap_or(0.0);
        Some(Self {
            id,
            card_id: definition.id,
            hp: stats.hp,
            max_hp: stats.hp,
            attack: stats.attack,
            attack_gauge,
            attack_interval: stats.attack_interval.max(1),
            lane,
            status_effects: tokens.statuses().collect(),
        })
    }

    pub fn has(&self, status: StatusEffect) -> bool {
        self.status_effects.contains(&status)
    }

    pub fn is_defeated(&self) -> bool {
        self.hp == 0
    }

    /// 承受一次攻击。护盾吸收整次攻击（即使伤害为 0）后消失。
    pub fn take_hit(&mut self, amount: u32) -> HitResult {
        if self.status_effects.remove(&StatusEffect::Shield) {
            return HitResult {
                absorbed: true,
                ..HitResult::default()
            };
        }
        let floor = if self.has(StatusEffect::Indestructible) { 1 } else { 0 };
        let dealt = amount.min(self.hp.saturating_sub(floor));
        self.hp -= dealt;
        let overflow = if self.is_defeated() {
            amount - dealt
        } else {
            0
        };
        HitResult {
            absorbed: false,
            dealt,
            overflow,
        }
    }

    pub fn heal(&mut self, amount: u32) -> u32 {
        let healed = amount.min(self.max_hp - self.hp);
        self.hp += healed;
        healed
    }
}

/// 玩家状态：英雄、资源、手牌、牌库、墓地与各路单位。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerState {
    pub player_id: PlayerId,
    pub hero: HeroDefinition,
    pub hp: u32,
    pub max_hp: u32,
    pub mp: u32,
    pub blue_mp: u32,
    pub max_mp: u32,
    /// 距下一点法力回复已累计的毫秒数。
    #[serde(default)]
    pub mp_regen_progress_ms: u32,
    pub ap: u32,
    pub max_ap: u32,
    #[serde(default)]
    pub hand: Vec<CardId>,
    /// 牌库顶在末尾。
    #[serde(default)]
    pub deck: Vec<CardId>,
    #[serde(default)]
    pub graveyard: Vec<CardId>,
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub mulligan_submitted: bool,
    /// 对手上次出牌以来本方连续打出的牌数，用于连击判定。
    #[serde(default)]
    pub chain: u32,
}

impl PlayerState {
    pub fn new(player_id: PlayerId, hero: HeroDefinition, deck: Vec<CardId>, rules: &RulesConfig) -> Self {
        Self {
            player_id,
            hero,
            hp: rules.starting_hp,
            max_hp: rules.starting_hp,
            mp: rules.starting_mp.min(rules.max_mp),
            blue_mp: 0,
            max_mp: rules.max_mp,
            mp_regen_progress_ms: 0,
            ap: rules.starting_ap.min(rules.max_ap),
            max_ap: rules.max_ap,
            hand: Vec::new(),
            deck,
            graveyard: Vec::new(),
            units: Vec::new(),
            mulligan_submitted: false,
            chain: 0,
        }
    }

    pub fn available_mp(&self) -> u32 {
        self.mp + self.blue_mp
    }

    pub fn find_card_in_hand_index(&self, card_id: CardId) -> Option<usize> {
        self.hand.iter().position(|card| *card == card_id)
    }

    pub fn draw_card(&mut self) -> Option<CardId> {
        let card_id = self.deck.pop()?;
        self.hand.push(card_id);
        Some(card_id)
    }

    pub fn put_card_on_bottom_of_deck(&mut self, card_id: CardId) {
        self.deck.insert(0, card_id);
    }

    pub fn unit_in_lane(&self, lane: u8) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.lane == lane)
    }

    pub fn find_unit(&self, unit_id: UnitId) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.id == unit_id)
    }

    pub fn find_unit_mut(&mut self, unit_id: UnitId) -> Option<&mut Unit> {
        self.units.iter_mut().find(|unit| unit.id == unit_id)
    }

    /// 放置单位并保持按路排序。
    pub fn place_unit(&mut self, unit: Unit) {
        debug_assert!(
            self.unit_in_lane(unit.lane).is_none(),
            "lane {} already occupied",
            unit.lane
        );
        let position = self
            .units
            .iter()
            .position(|existing| existing.lane > unit.lane)
            .unwrap_or(self.units.len());
        self.units.insert(position, unit);
    }

    /// 移除单位并把卡牌送入墓地。
    pub fn remove_unit(&mut self, unit_id: UnitId) -> Option<Unit> {
        let position = self.units.iter().position(|unit| unit.id == unit_id)?;
        let unit = self.units.remove(position);
        self.graveyard.push(unit.card_id);
        Some(unit)
    }

    /// 英雄受到伤害，生命不低于 0。返回实际伤害。
    pub fn damage_hero(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.hp);
        self.hp -= dealt;
        dealt
    }

    pub fn heal_hero(&mut self, amount: u32) -> u32 {
        let healed = amount.min(self.max_hp - self.hp);
        self.hp += healed;
        healed
    }

    pub fn is_defeated(&self) -> bool {
        self.hp == 0
    }
}

/// 应答窗口（Active Response）状态。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveResponseState {
    pub is_active: bool,
    /// 剩余毫秒数，仅在激活时有意义。
    pub timer: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_player_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passed: Vec<PlayerId>,
}

impl ActiveResponseState {
    pub fn has_passed(&self, player_id: PlayerId) -> bool {
        self.passed.contains(&player_id)
    }
}

/// 英雄技能的种类。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    HeroArt,
    Companion,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCloseReason {
    AllPassed,
    TimerExpired,
}

/// 对局事件流，仅供展示，不回读。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    CardDrawn {
        player_id: PlayerId,
        card_id: CardId,
    },
    MulliganApplied {
        player_id: PlayerId,
        replaced: Vec<CardId>,
    },
    PhaseChanged {
        phase: GamePhase,
    },
    CardPlayed {
        player_id: PlayerId,
        card_id: CardId,
        #[serde(skip_serializing_if = "Option::is_none")]
        lane: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
        combo: bool,
    },
    UnitSpawned {
        player_id: PlayerId,
        unit_id: UnitId,
        card_id: CardId,
        lane: u8,
    },
    UnitAttacked {
        player_id: PlayerId,
        unit_id: UnitId,
        lane: u8,
    },
    UnitDamaged {
        player_id: PlayerId,
        unit_id: UnitId,
        amount: u32,
        remaining_hp: u32,
    },
    ShieldConsumed {
        player_id: PlayerId,
        unit_id: UnitId,
    },
    UnitDestroyed {
        player_id: PlayerId,
        unit_id: UnitId,
        card_id: CardId,
        lane: u8,
    },
    HeroDamaged {
        player_id: PlayerId,
        amount: u32,
        remaining_hp: u32,
    },
    HeroHealed {
        player_id: PlayerId,
        amount: u32,
    },
    UnitHealed {
        player_id: PlayerId,
        unit_id: UnitId,
        amount: u32,
    },
    UnitBuffed {
        player_id: PlayerId,
        unit_id: UnitId,
        attack: u32,
    },
    StatusGranted {
        player_id: PlayerId,
        unit_id: UnitId,
        status: StatusEffect,
    },
    BlueMpGained {
        player_id: PlayerId,
        amount: u32,
    },
    ApGained {
        player_id: PlayerId,
        amount: u32,
    },
    AbilityUsed {
        player_id: PlayerId,
        ability: AbilityKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
    },
    ResponseOpened {
        responder: PlayerId,
        timer: u32,
    },
    ResponsePassed {
        player_id: PlayerId,
    },
    PriorityPassed {
        player_id: PlayerId,
    },
    ResponseClosed {
        reason: ResponseCloseReason,
    },
    GameEnded {
        outcome: Outcome,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityError {
    #[error("player {player_id} has two units in lane {lane}")]
    DuplicateLane { player_id: PlayerId, lane: u8 },
    #[error("player {player_id} has a unit in lane {lane}, outside the board")]
    LaneOutOfRange { player_id: PlayerId, lane: u8 },
    #[error("unit {unit_id} id is reused or was never allocated")]
    DuplicateUnitId { unit_id: UnitId },
    #[error("unit {unit_id} left on the field with hp {hp}/{max_hp}")]
    UnitHpOutOfRange { unit_id: UnitId, hp: u32, max_hp: u32 },
    #[error("unit {unit_id} has an attack gauge outside [0, 1]")]
    GaugeOutOfRange { unit_id: UnitId },
    #[error("hero of player {player_id} has hp {hp} above max {max_hp}")]
    HeroHpOutOfRange { player_id: PlayerId, hp: u32, max_hp: u32 },
    #[error("player {player_id} mana is outside its bounds")]
    ManaOutOfRange { player_id: PlayerId },
    #[error("player {player_id} action points exceed the cap")]
    ApOutOfRange { player_id: PlayerId },
    #[error("both seats use player id {player_id}")]
    DuplicatePlayerId { player_id: PlayerId },
}

/// 游戏整体状态。每一步都产出新的快照。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub phase: GamePhase,
    /// 座位顺序在整局中固定：0 为先手/本地，1 为对手。
    pub players: [PlayerState; 2],
    #[serde(default)]
    pub active_response: ActiveResponseState,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub next_unit_id: UnitId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl GameState {
    pub fn new(players: [PlayerState; 2], rules: RulesConfig) -> Self {
        Self {
            phase: GamePhase::default(),
            players,
            active_response: ActiveResponseState::default(),
            rules,
            next_unit_id: 1,
            outcome: None,
        }
    }

    pub fn with_phase(mut self, phase: GamePhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|player| player.player_id == id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|player| player.player_id == id)
    }

    pub fn opponent_of(&self, player_id: PlayerId) -> Option<PlayerId> {
        let index = self.player_index(player_id)?;
        Some(self.players[1 - index].player_id)
    }

    /// 在双方场上查找单位，返回 (座位下标, 单位)。
    pub fn locate_unit(&self, unit_id: UnitId) -> Option<(usize, &Unit)> {
        self.players
            .iter()
            .enumerate()
            .find_map(|(index, player)| player.find_unit(unit_id).map(|unit| (index, unit)))
    }

    pub fn allocate_unit_id(&mut self) -> UnitId {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        id
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::Ended
    }

    /// 任一英雄生命归零时结束对局，返回结果。
    pub fn evaluate_victory(&mut self) -> Option<Outcome> {
        if self.outcome.is_some() {
            return self.outcome;
        }
        let outcome = match (self.players[0].is_defeated(), self.players[1].is_defeated()) {
            (true, true) => Outcome::Draw,
            (true, false) => Outcome::Winner {
                player_id: self.players[1].player_id,
            },
            (false, true) => Outcome::Winner {
                player_id: self.players[0].player_id,
            },
            (false, false) => return None,
        };
        self.phase = GamePhase::Ended;
        self.outcome = Some(outcome);
        self.active_response = ActiveResponseState::default();
        log::info!("match ended: {outcome:?}");
        Some(outcome)
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.players[0].player_id == self.players[1].player_id {
            return Err(IntegrityError::DuplicatePlayerId {
                player_id: self.players[0].player_id,
            });
        }

        let mut seen_units = HashSet::new();
        for player in &self.players {
            let player_id = player.player_id;
            if player.hp > player.max_hp {
                return Err(IntegrityError::HeroHpOutOfRange {
                    player_id,
                    hp: player.hp,
                    max_hp: player.max_hp,
                });
            }
            if player.mp > player.max_mp || player.blue_mp > player.max_mp {
                return Err(IntegrityError::ManaOutOfRange { player_id });
            }
            if player.ap > player.max_ap {
                return Err(IntegrityError::ApOutOfRange { player_id });
            }

            let mut lanes = HashSet::new();
            for unit in &player.units {
                if unit.lane >= self.rules.lane_count {
                    return Err(IntegrityError::LaneOutOfRange {
                        player_id,
                        lane: unit.lane,
                    });
                }
                if !lanes.insert(unit.lane) {
                    return Err(IntegrityError::DuplicateLane {
                        player_id,
                        lane: unit.lane,
                    });
                }
                if unit.id >= self.next_unit_id || !seen_units.insert(unit.id) {
                    return Err(IntegrityError::DuplicateUnitId { unit_id: unit.id });
                }
                if unit.hp == 0 || unit.hp > unit.max_hp {
                    return Err(IntegrityError::UnitHpOutOfRange {
                        unit_id: unit.id,
                        hp: unit.hp,
                        max_hp: unit.max_hp,
                    });
                }
                if !(0.0..=1.0).contains(&unit.attack_gauge) {
                    return Err(IntegrityError::GaugeOutOfRange { unit_id: unit.id });
                }
            }
        }

        Ok(())
    }
}
