//! 应答窗口（Active Response）控制器。
//!
//! 单位上场会打开一个计时窗口：窗口内双方都不能再出单位卡，只能打出行动卡或让过。
//! 双方都让过，或计时归零时窗口关闭。窗口期间法力回复与攻击槽暂停。

use super::catalog::CardType;
use super::rules::RuleError;
use super::state::{ActiveResponseState, GameEvent, GameState, PlayerId, ResponseCloseReason};

/// 由 `trigger_owner` 的单位上场触发；对手先获得优先权。
pub fn open_window(state: &mut GameState, trigger_owner: PlayerId) -> Option<GameEvent> {
    let window = state.rules.response_window_ms;
    if window == 0 {
        return None;
    }
    let responder = state.opponent_of(trigger_owner)?;
    state.active_response = ActiveResponseState {
        is_active: true,
        timer: window,
        current_player_id: Some(responder),
        passed: Vec::new(),
    };
    log::debug!("active response opened, player {responder} to respond");
    Some(GameEvent::ResponseOpened {
        responder,
        timer: window,
    })
}

pub fn ensure_card_allowed(state: &GameState, card_type: CardType) -> Result<(), RuleError> {
    match card_type {
        CardType::Unit if state.active_response.is_active => Err(RuleError::ResponseLockout),
        CardType::Unit | CardType::Action => Ok(()),
    }
}

/// 窗口内打出行动卡：优先权交给对手，对手需要重新决定是否让过。
pub fn record_response(state: &mut GameState, player_id: PlayerId) -> Option<GameEvent> {
    if !state.active_response.is_active {
        return None;
    }
    let other = state.opponent_of(player_id)?;
    let response = &mut state.active_response;
    response.passed.retain(|id| *id != other);
    if response.current_player_id == Some(other) {
        return None;
    }
    response.current_player_id = Some(other);
    Some(GameEvent::PriorityPassed { player_id: other })
}

pub fn end_response(state: &mut GameState, player_id: PlayerId) -> Result<Vec<GameEvent>, RuleError> {
    if !state.active_response.is_active {
        return Err(RuleError::ResponseNotActive);
    }
    let other = state
        .opponent_of(player_id)
        .ok_or(RuleError::PlayerNotFound { player_id })?;
    if state.active_response.has_passed(player_id) {
        return Err(RuleError::AlreadyPassed { player_id });
    }

    let mut events = vec![GameEvent::ResponsePassed { player_id }];
    let response = &mut state.active_response;
    response.passed.push(player_id);

    if response.has_passed(other) {
        events.push(close_window(state, ResponseCloseReason::AllPassed));
    } else if response.current_player_id == Some(player_id) {
        response.current_player_id = Some(other);
        events.push(GameEvent::PriorityPassed { player_id: other });
    }
    Ok(events)
}

/// 窗口期间的时钟推进。剩余的 dt 不会转移给战斗或法力。
pub fn tick(state: &mut GameState, dt_ms: u32) -> Vec<GameEvent> {
    let response = &mut state.active_response;
    if !response.is_active {
        return Vec::new();
    }
    response.timer = response.timer.saturating_sub(dt_ms);
    if response.timer == 0 {
        return vec![close_window(state, ResponseCloseReason::TimerExpired)];
    }
    Vec::new()
}

fn close_window(state: &mut GameState, reason: ResponseCloseReason) -> GameEvent {
    state.active_response = ActiveResponseState::default();
    log::debug!("active response closed: {reason:?}");
    GameEvent::ResponseClosed { reason }
}
