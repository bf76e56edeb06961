//! 战斗结算：攻击槽推进与各路交战。
//!
//! 每次时钟推进时，所有单位的攻击槽按 `dt / attack_interval` 增长，满槽的单位本步攻击一次，
//! 槽位清零（溢出部分丢弃）。各路按 0→1→2 的顺序结算，同一路内的伤害以结算前的数值同时生效。

use super::state::{GameEvent, GameState, StatusEffect, Unit, UnitId};

/// 推进攻击槽，返回每个座位本步攻击的路。
pub fn advance_gauges(state: &mut GameState, dt_ms: u32) -> [Vec<u8>; 2] {
    let mut firing: [Vec<u8>; 2] = [Vec::new(), Vec::new()];
    for (seat, player) in state.players.iter_mut().enumerate() {
        for unit in &mut player.units {
            unit.attack_gauge += f64::from(dt_ms) / f64::from(unit.attack_interval.max(1));
            if unit.attack_gauge >= 1.0 {
                unit.attack_gauge = 0.0;
                firing[seat].push(unit.lane);
            }
        }
    }
    firing
}

pub fn resolve_combat(state: &mut GameState, dt_ms: u32) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let firing = advance_gauges(state, dt_ms);
    for lane in 0..state.rules.lane_count {
        let lane_firing = [firing[0].contains(&lane), firing[1].contains(&lane)];
        if lane_firing.iter().any(|fires| *fires) {
            resolve_lane(state, lane, lane_firing, &mut events);
        }
    }
    if let Some(outcome) = state.evaluate_victory() {
        events.push(GameEvent::GameEnded { outcome });
    }
    events
}

/// 飞行单位发起攻击时，只有对空单位能反击。
fn can_retaliate(defender: &Unit, attacker: &Unit) -> bool {
    !attacker.has(StatusEffect::Flight) || defender.has(StatusEffect::AntiAir)
}

fn resolve_lane(state: &mut GameState, lane: u8, firing: [bool; 2], events: &mut Vec<GameEvent>) {
    let snapshot = [
        state.players[0].unit_in_lane(lane).cloned(),
        state.players[1].unit_in_lane(lane).cloned(),
    ];
    for seat in 0..2 {
        if let (true, Some(unit)) = (firing[seat], &snapshot[seat]) {
            events.push(GameEvent::UnitAttacked {
                player_id: state.players[seat].player_id,
                unit_id: unit.id,
                lane,
            });
        }
    }

    match &snapshot {
        [Some(first), Some(second)] => {
            let units = [first, second];
            for target in 0..2 {
                let source = 1 - target;
                let attacking = firing[source];
                let retaliating = firing[target] && can_retaliate(units[source], units[target]);
                if !attacking && !retaliating {
                    continue;
                }
                let pierce = attacking && units[source].has(StatusEffect::HeavyPierce);
                log::trace!(
                    "lane {lane}: unit {} hits unit {} for {}",
                    units[source].id,
                    units[target].id,
                    units[source].attack
                );
                strike_unit(state, target, units[target].id, units[source].attack, pierce, events);
            }
            for (seat, unit) in units.iter().enumerate() {
                remove_if_defeated(state, seat, unit.id, events);
            }
        }
        [first, second] => {
            for (seat, unit) in [first, second].into_iter().enumerate() {
                if let (true, Some(unit)) = (firing[seat], unit) {
                    strike_hero(state, 1 - seat, unit.attack, events);
                }
            }
        }
    }
}

/// 对单位造成一次攻击伤害；重击的溢出伤害转移到该单位所属英雄。
pub fn strike_unit(
    state: &mut GameState,
    seat: usize,
    unit_id: UnitId,
    amount: u32,
    pierce: bool,
    events: &mut Vec<GameEvent>,
) {
    let player_id = state.players[seat].player_id;
    let Some(unit) = state.players[seat].find_unit_mut(unit_id) else {
        return;
    };
    let hit = unit.take_hit(amount);
    if hit.absorbed {
        events.push(GameEvent::ShieldConsumed { player_id, unit_id });
        return;
    }
    events.push(GameEvent::UnitDamaged {
        player_id,
        unit_id,
        amount: hit.dealt,
        remaining_hp: unit.hp,
    });
    if pierce && hit.overflow > 0 {
        strike_hero(state, seat, hit.overflow, events);
    }
}

pub fn strike_hero(state: &mut GameState, seat: usize, amount: u32, events: &mut Vec<GameEvent>) {
    let player = &mut state.players[seat];
    let dealt = player.damage_hero(amount);
    events.push(GameEvent::HeroDamaged {
        player_id: player.player_id,
        amount: dealt,
        remaining_hp: player.hp,
    });
}

/// 生命归零的单位当步离场，卡牌进入墓地，所属玩家获得行动点。
pub fn remove_if_defeated(
    state: &mut GameState,
    seat: usize,
    unit_id: UnitId,
    events: &mut Vec<GameEvent>,
) {
    let ap_reward = state.rules.ap_per_unit_lost;
    let player = &mut state.players[seat];
    let defeated = player
        .find_unit(unit_id)
        .map(Unit::is_defeated)
        .unwrap_or(false);
    if !defeated {
        return;
    }
    let Some(unit) = player.remove_unit(unit_id) else {
        return;
    };
    events.push(GameEvent::UnitDestroyed {
        player_id: player.player_id,
        unit_id,
        card_id: unit.card_id,
        lane: unit.lane,
    });
    let gained = super::resources::gain_ap(player, ap_reward);
    if gained > 0 {
        events.push(GameEvent::ApGained {
            player_id: player.player_id,
            amount: gained,
        });
    }
}
