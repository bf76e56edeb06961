use serde::{Deserialize, Serialize};

/// 规则常量。对局创建时写入 [`GameState`](super::state::GameState)，回放只需初始状态与输入序列。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RulesConfig {
    pub lane_count: u8,
    pub starting_hp: u32,
    pub max_mp: u32,
    pub starting_mp: u32,
    /// 每回复 1 点法力所需的毫秒数。
    pub mp_regen_interval_ms: u32,
    pub max_ap: u32,
    pub starting_ap: u32,
    pub ap_per_card_played: u32,
    pub ap_per_unit_lost: u32,
    pub opening_hand_size: u8,
    pub response_window_ms: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            lane_count: 3,
            starting_hp: 20,
            max_mp: 10,
            starting_mp: 5,
            mp_regen_interval_ms: 1000,
            max_ap: 10,
            starting_ap: 0,
            ap_per_card_played: 1,
            ap_per_unit_lost: 1,
            opening_hand_size: 4,
            response_window_ms: 5000,
        }
    }
}
