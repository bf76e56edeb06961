//! 行动卡与英雄技能的效果结算。
//!
//! 词条在打出时解析一次，这里对 [`Keyword`] 逐个穷举匹配并作用于已校验的目标。

use super::combat::{remove_if_defeated, strike_hero, strike_unit};
use super::resources::{gain_ap, grant_blue_mp};
use super::rules::RuleError;
use super::state::{GameEvent, GameState, StatusEffect, Target, UnitId};
use super::tokens::{EffectTokens, Keyword, TargetKind, FULL_RUSH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectContext {
    pub caster_seat: usize,
    pub target: Option<Target>,
    /// 连击成立时数值翻倍。
    pub combo: bool,
}

impl EffectContext {
    pub fn new(caster_seat: usize) -> Self {
        Self {
            caster_seat,
            target: None,
            combo: false,
        }
    }

    pub fn with_target(mut self, target: Option<Target>) -> Self {
        self.target = target;
        self
    }

    pub fn with_combo(mut self, combo: bool) -> Self {
        self.combo = combo;
        self
    }

    fn scaled(&self, amount: u32) -> u32 {
        if self.combo {
            amount.saturating_mul(2)
        } else {
            amount
        }
    }
}

/// 校验目标：存在、阵营与 `kind` 一致，且敌方单位未被隐匿（veil）。
pub fn validate_target(
    state: &GameState,
    caster_seat: usize,
    kind: Option<TargetKind>,
    target: Target,
) -> Result<Target, RuleError> {
    let (owner_seat, is_unit) = match target {
        Target::Unit { unit_id } => {
            let (seat, unit) = state.locate_unit(unit_id).ok_or(RuleError::InvalidTarget)?;
            if seat != caster_seat && unit.has(StatusEffect::Veil) {
                return Err(RuleError::UntargetableUnit { unit_id });
            }
            (seat, true)
        }
        Target::Hero { player_id } => {
            let seat = state.player_index(player_id).ok_or(RuleError::InvalidTarget)?;
            (seat, false)
        }
    };
    if let Some(kind) = kind {
        let friendly = owner_seat == caster_seat;
        if kind.is_unit() != is_unit || kind.is_friendly() != friendly {
            return Err(RuleError::InvalidTarget);
        }
    }
    Ok(target)
}

/// 强制目标：按路序选择第一个没有敏捷（agility）的敌方单位。
pub fn forced_enemy_unit(state: &GameState, caster_seat: usize) -> Option<UnitId> {
    state.players[1 - caster_seat]
        .units
        .iter()
        .find(|unit| !unit.has(StatusEffect::Agility))
        .map(|unit| unit.id)
}

pub fn apply_effects(
    state: &mut GameState,
    tokens: &EffectTokens,
    ctx: &EffectContext,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for keyword in &tokens.keywords {
        match *keyword {
            Keyword::Flight
            | Keyword::Shield
            | Keyword::Agility
            | Keyword::Veil
            | Keyword::HeavyPierce
            | Keyword::AntiAir
            | Keyword::Indestructible => {
                if let Some(status) = keyword.status() {
                    grant_status(state, ctx, status, &mut events);
                }
            }
            Keyword::Rush(amount) => {
                let gauge = f64::from(amount.min(FULL_RUSH)) / f64::from(FULL_RUSH);
                let affected = affected_units(state, ctx);
                if affected.is_empty() {
                    log::debug!("rush has no unit to land on");
                }
                for (seat, unit_id) in affected {
                    if let Some(unit) = state.players[seat].find_unit_mut(unit_id) {
                        unit.attack_gauge = unit.attack_gauge.max(gauge);
                    }
                }
            }
            // 修饰词与参数：分别由 ctx.combo、上场规则与目标校验处理。
            Keyword::Combo | Keyword::Awakening | Keyword::Target(_) => {}
            Keyword::Damage(amount) => {
                let amount = ctx.scaled(amount);
                match ctx.target {
                    Some(Target::Unit { unit_id }) => damage_unit(state, unit_id, amount, &mut events),
                    Some(Target::Hero { player_id }) => {
                        if let Some(seat) = state.player_index(player_id) {
                            strike_hero(state, seat, amount, &mut events);
                        }
                    }
                    None => strike_hero(state, 1 - ctx.caster_seat, amount, &mut events),
                }
            }
            Keyword::Heal(amount) => {
                let amount = ctx.scaled(amount);
                heal(state, ctx, amount, &mut events);
            }
            Keyword::Buff(amount) => {
                let amount = ctx.scaled(amount);
                for (seat, unit_id) in affected_units(state, ctx) {
                    let player_id = state.players[seat].player_id;
                    if let Some(unit) = state.players[seat].find_unit_mut(unit_id) {
                        unit.attack = unit.attack.saturating_add(amount);
                        events.push(GameEvent::UnitBuffed {
                            player_id,
                            unit_id,
                            attack: unit.attack,
                        });
                    }
                }
            }
            Keyword::Draw(count) => {
                let caster = &mut state.players[ctx.caster_seat];
                for _ in 0..ctx.scaled(count) {
                    let Some(card_id) = caster.draw_card() else {
                        break;
                    };
                    events.push(GameEvent::CardDrawn {
                        player_id: caster.player_id,
                        card_id,
                    });
                }
            }
            Keyword::BlueMp(amount) => {
                let caster = &mut state.players[ctx.caster_seat];
                let gained = grant_blue_mp(caster, ctx.scaled(amount));
                events.push(GameEvent::BlueMpGained {
                    player_id: caster.player_id,
                    amount: gained,
                });
            }
            Keyword::GainAp(amount) => {
                let caster = &mut state.players[ctx.caster_seat];
                let gained = gain_ap(caster, ctx.scaled(amount));
                events.push(GameEvent::ApGained {
                    player_id: caster.player_id,
                    amount: gained,
                });
            }
            Keyword::Snipe(amount) => {
                if let Some(unit_id) = forced_enemy_unit(state, ctx.caster_seat) {
                    damage_unit(state, unit_id, ctx.scaled(amount), &mut events);
                }
            }
        }
    }
    events
}

/// 作用于单位的效果：有单位目标时只作用于它，否则作用于施放者全部单位。
fn affected_units(state: &GameState, ctx: &EffectContext) -> Vec<(usize, UnitId)> {
    match ctx.target {
        Some(Target::Unit { unit_id }) => state
            .locate_unit(unit_id)
            .map(|(seat, _)| vec![(seat, unit_id)])
            .unwrap_or_default(),
        Some(Target::Hero { .. }) => Vec::new(),
        None => state.players[ctx.caster_seat]
            .units
            .iter()
            .map(|unit| (ctx.caster_seat, unit.id))
            .collect(),
    }
}

fn grant_status(
    state: &mut GameState,
    ctx: &EffectContext,
    status: StatusEffect,
    events: &mut Vec<GameEvent>,
) {
    let affected = affected_units(state, ctx);
    if affected.is_empty() {
        log::debug!("{status:?} grant has no unit to land on");
    }
    for (seat, unit_id) in affected {
        let player_id = state.players[seat].player_id;
        if let Some(unit) = state.players[seat].find_unit_mut(unit_id) {
            if unit.status_effects.insert(status) {
                events.push(GameEvent::StatusGranted {
                    player_id,
                    unit_id,
                    status,
                });
            }
        }
    }
}

fn damage_unit(state: &mut GameState, unit_id: UnitId, amount: u32, events: &mut Vec<GameEvent>) {
    let Some((seat, _)) = state.locate_unit(unit_id) else {
        return;
    };
    strike_unit(state, seat, unit_id, amount, false, events);
    remove_if_defeated(state, seat, unit_id, events);
}

fn heal(state: &mut GameState, ctx: &EffectContext, amount: u32, events: &mut Vec<GameEvent>) {
    match ctx.target {
        Some(Target::Unit { unit_id }) => {
            let Some((seat, _)) = state.locate_unit(unit_id) else {
                return;
            };
            let player_id = state.players[seat].player_id;
            if let Some(unit) = state.players[seat].find_unit_mut(unit_id) {
                let healed = unit.heal(amount);
                events.push(GameEvent::UnitHealed {
                    player_id,
                    unit_id,
                    amount: healed,
                });
            }
        }
        Some(Target::Hero { player_id }) => {
            if let Some(player) = state.get_player_mut(player_id) {
                let healed = player.heal_hero(amount);
                events.push(GameEvent::HeroHealed {
                    player_id,
                    amount: healed,
                });
            }
        }
        None => {
            let caster = &mut state.players[ctx.caster_seat];
            let healed = caster.heal_hero(amount);
            events.push(GameEvent::HeroHealed {
                player_id: caster.player_id,
                amount: healed,
            });
        }
    }
}
