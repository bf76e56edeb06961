//! 资源模型：法力（mp）、蓝色法力（blue_mp）与行动点（ap）。

use super::config::RulesConfig;
use super::rules::RuleError;
use super::state::PlayerState;

/// 按经过的毫秒数回复法力，满值时丢弃累计进度。
pub fn regenerate_mp(player: &mut PlayerState, dt_ms: u32, rules: &RulesConfig) {
    if player.mp >= player.max_mp {
        player.mp_regen_progress_ms = 0;
        return;
    }
    let interval = rules.mp_regen_interval_ms.max(1);
    let progress = u64::from(player.mp_regen_progress_ms) + u64::from(dt_ms);
    let gained = progress / u64::from(interval);
    let remainder = (progress % u64::from(interval)) as u32;
    let headroom = player.max_mp - player.mp;
    if gained >= u64::from(headroom) {
        player.mp = player.max_mp;
        player.mp_regen_progress_ms = 0;
    } else {
        player.mp += gained as u32;
        player.mp_regen_progress_ms = remainder;
    }
}

pub fn ensure_mp(player: &PlayerState, cost: u32) -> Result<(), RuleError> {
    let available = player.available_mp();
    if available < cost {
        return Err(RuleError::InsufficientMana {
            required: cost,
            available,
        });
    }
    Ok(())
}

/// 支付法力：先扣 mp，不足部分由 blue_mp 补足。
pub fn pay_mp(player: &mut PlayerState, cost: u32) -> Result<(), RuleError> {
    ensure_mp(player, cost)?;
    let from_mp = cost.min(player.mp);
    player.mp -= from_mp;
    player.blue_mp -= cost - from_mp;
    Ok(())
}

pub fn grant_blue_mp(player: &mut PlayerState, amount: u32) -> u32 {
    let gained = amount.min(player.max_mp - player.blue_mp);
    player.blue_mp += gained;
    gained
}

pub fn ensure_ap(player: &PlayerState, cost: u32) -> Result<(), RuleError> {
    if player.ap < cost {
        return Err(RuleError::InsufficientAp {
            required: cost,
            available: player.ap,
        });
    }
    Ok(())
}

pub fn spend_ap(player: &mut PlayerState, cost: u32) -> Result<(), RuleError> {
    ensure_ap(player, cost)?;
    player.ap -= cost;
    Ok(())
}

/// 行动点只由离散事件累积（出牌、己方单位阵亡、效果）。
pub fn gain_ap(player: &mut PlayerState, amount: u32) -> u32 {
    let gained = amount.min(player.max_ap - player.ap);
    player.ap += gained;
    gained
}
