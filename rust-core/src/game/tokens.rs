//! 效果词条解析：把卡牌的 `effect_functions` 字符串解码为封闭的关键字枚举。
//!
//! 词条以分号分隔，可以是裸关键字（`flight`）或 `key:value` 形式（`target:friendly_unit`、
//! `rush:4`）。解析大小写不敏感，两端空白会被去除，无法识别的词条被忽略，
//! 但会记录在 [`EffectTokens::unknown`] 中供测试检查卡牌数据。

use serde::{Deserialize, Serialize};

use super::catalog::{CardDefinition, CardType};
use super::state::StatusEffect;

/// 裸 `rush` 等价于满格起步。
pub const FULL_RUSH: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    FriendlyUnit,
    FriendlyHero,
    EnemyUnit,
    EnemyHero,
}

impl TargetKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "friendly_unit" => Some(TargetKind::FriendlyUnit),
            "friendly_hero" => Some(TargetKind::FriendlyHero),
            "enemy_unit" => Some(TargetKind::EnemyUnit),
            "enemy_hero" => Some(TargetKind::EnemyHero),
            _ => None,
        }
    }

    pub fn is_unit(self) -> bool {
        matches!(self, TargetKind::FriendlyUnit | TargetKind::EnemyUnit)
    }

    pub fn is_friendly(self) -> bool {
        matches!(self, TargetKind::FriendlyUnit | TargetKind::FriendlyHero)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Keyword {
    Flight,
    Rush(u32),
    Shield,
    Agility,
    Veil,
    Combo,
    HeavyPierce,
    AntiAir,
    Indestructible,
    Awakening,
    Target(TargetKind),
    Damage(u32),
    Heal(u32),
    Buff(u32),
    Draw(u32),
    BlueMp(u32),
    GainAp(u32),
    Snipe(u32),
}

impl Keyword {
    /// 该关键字对应的单位状态（若有）。
    pub fn status(self) -> Option<StatusEffect> {
        match self {
            Keyword::Flight => Some(StatusEffect::Flight),
            Keyword::Shield => Some(StatusEffect::Shield),
            Keyword::Agility => Some(StatusEffect::Agility),
            Keyword::Veil => Some(StatusEffect::Veil),
            Keyword::HeavyPierce => Some(StatusEffect::HeavyPierce),
            Keyword::AntiAir => Some(StatusEffect::AntiAir),
            Keyword::Indestructible => Some(StatusEffect::Indestructible),
            Keyword::Rush(_)
            | Keyword::Combo
            | Keyword::Awakening
            | Keyword::Target(_)
            | Keyword::Damage(_)
            | Keyword::Heal(_)
            | Keyword::Buff(_)
            | Keyword::Draw(_)
            | Keyword::BlueMp(_)
            | Keyword::GainAp(_)
            | Keyword::Snipe(_) => None,
        }
    }

    fn bare(token: &str) -> Option<Self> {
        match token {
            "flight" => Some(Keyword::Flight),
            "rush" => Some(Keyword::Rush(FULL_RUSH)),
            "shield" => Some(Keyword::Shield),
            "agility" => Some(Keyword::Agility),
            "veil" => Some(Keyword::Veil),
            "combo" => Some(Keyword::Combo),
            "heavy_pierce" => Some(Keyword::HeavyPierce),
            "anti_air" => Some(Keyword::AntiAir),
            "indestructible" => Some(Keyword::Indestructible),
            "awakening" => Some(Keyword::Awakening),
            _ => None,
        }
    }

    fn keyed(key: &str, value: &str) -> Option<Self> {
        if key == "target" {
            return TargetKind::parse(value).map(Keyword::Target);
        }
        let amount: u32 = value.parse().ok()?;
        match key {
            "rush" => Some(Keyword::Rush(amount)),
            "damage" => Some(Keyword::Damage(amount)),
            "heal" => Some(Keyword::Heal(amount)),
            "buff" => Some(Keyword::Buff(amount)),
            "draw" => Some(Keyword::Draw(amount)),
            "blue_mp" => Some(Keyword::BlueMp(amount)),
            "ap" => Some(Keyword::GainAp(amount)),
            "snipe" => Some(Keyword::Snipe(amount)),
            _ => None,
        }
    }

    /// 单位卡上场时需要结算的效果词条；状态与 rush 在生成单位时已经写入。
    pub fn is_on_play_routine(self) -> bool {
        match self {
            Keyword::Damage(_)
            | Keyword::Heal(_)
            | Keyword::Buff(_)
            | Keyword::Draw(_)
            | Keyword::BlueMp(_)
            | Keyword::GainAp(_)
            | Keyword::Snipe(_) => true,
            Keyword::Flight
            | Keyword::Rush(_)
            | Keyword::Shield
            | Keyword::Agility
            | Keyword::Veil
            | Keyword::Combo
            | Keyword::HeavyPierce
            | Keyword::AntiAir
            | Keyword::Indestructible
            | Keyword::Awakening
            | Keyword::Target(_) => false,
        }
    }

    fn same_kind(&self, other: &Keyword) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// 解析结果：按出现顺序排列的关键字，以及无法识别的原始词条。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectTokens {
    pub keywords: Vec<Keyword>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<String>,
}

impl EffectTokens {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn has(&self, keyword: Keyword) -> bool {
        self.keywords.iter().any(|existing| existing.same_kind(&keyword))
    }

    pub fn target(&self) -> Option<TargetKind> {
        self.keywords.iter().find_map(|keyword| match keyword {
            Keyword::Target(kind) => Some(*kind),
            _ => None,
        })
    }

    pub fn rush(&self) -> Option<u32> {
        self.keywords.iter().find_map(|keyword| match keyword {
            Keyword::Rush(amount) => Some(*amount),
            _ => None,
        })
    }

    /// 只保留上场结算词条（及其目标参数）的副本。
    pub fn on_play(&self) -> EffectTokens {
        let keywords = self
            .keywords
            .iter()
            .copied()
            .filter(|keyword| keyword.is_on_play_routine() || matches!(keyword, Keyword::Target(_)))
            .collect();
        EffectTokens {
            keywords,
            unknown: Vec::new(),
        }
    }

    pub fn statuses(&self) -> impl Iterator<Item = StatusEffect> + '_ {
        self.keywords.iter().filter_map(|keyword| keyword.status())
    }

    fn insert(&mut self, keyword: Keyword) {
        // 同类关键字只保留首个，描述中的标记不会覆盖结构化词条。
        if !self.keywords.iter().any(|existing| existing.same_kind(&keyword)) {
            self.keywords.push(keyword);
        }
    }

    fn merge(&mut self, other: EffectTokens) {
        for keyword in other.keywords {
            self.insert(keyword);
        }
        self.unknown.extend(other.unknown);
    }
}

pub fn parse_effect_tokens(raw: &str) -> EffectTokens {
    let mut tokens = EffectTokens::default();
    for piece in raw.split(';') {
        let token = piece.trim().to_ascii_lowercase();
        if token.is_empty() {
            continue;
        }
        let parsed = match token.split_once(':') {
            Some((key, value)) => Keyword::keyed(key.trim(), value.trim()),
            None => Keyword::bare(&token),
        };
        match parsed {
            Some(keyword) => tokens.insert(keyword),
            None => {
                log::debug!("ignoring unknown effect token `{token}`");
                tokens.unknown.push(token);
            }
        }
    }
    tokens
}

/// 兼容旧数据：从描述文字中的 `<Rush>`、`<Heavy Pierce>` 等标记提取关键字。
pub fn parse_description_markers(description: &str) -> EffectTokens {
    let mut tokens = EffectTokens::default();
    let mut rest = description;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            break;
        };
        let marker: String = after[..end]
            .trim()
            .chars()
            .map(|ch| match ch {
                ' ' | '-' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        if let Some(keyword) = Keyword::bare(&marker) {
            tokens.insert(keyword);
        }
        rest = &after[end + 1..];
    }
    tokens
}

/// 合并结构化词条与描述标记，两者取并集。
pub fn parse_card(definition: &CardDefinition) -> EffectTokens {
    let mut tokens = definition
        .effect_functions
        .as_deref()
        .map(parse_effect_tokens)
        .unwrap_or_default();
    if let Some(description) = definition.description.as_deref() {
        tokens.merge(parse_description_markers(description));
    }
    tokens
}

pub fn requires_target(definition: &CardDefinition) -> bool {
    definition.card_type == CardType::Action && target_type(definition).is_some()
}

pub fn target_type(definition: &CardDefinition) -> Option<TargetKind> {
    parse_card(definition).target()
}
