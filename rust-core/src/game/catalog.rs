//! 卡牌目录：外部提供的只读卡牌定义。

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// 全局唯一的卡牌标识。
pub type CardId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Unit,
    Action,
}

impl Default for CardType {
    fn default() -> Self {
        CardType::Unit
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Red,
    Green,
    Purple,
    Black,
}

/// 单位卡的基础数值。`attack_interval` 以毫秒计。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitStats {
    pub attack: u32,
    pub hp: u32,
    pub attack_interval: u32,
}

/// 卡牌定义，由外部目录加载一次后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDefinition {
    pub id: CardId,
    pub name: String,
    pub cost: u32,
    #[serde(rename = "type", default)]
    pub card_type: CardType,
    pub attribute: Attribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_stats: Option<UnitStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_functions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CardDefinition {
    pub fn unit(
        id: CardId,
        name: impl Into<String>,
        cost: u32,
        attribute: Attribute,
        stats: UnitStats,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            cost,
            card_type: CardType::Unit,
            attribute,
            unit_stats: Some(stats),
            effect_functions: None,
            description: None,
        }
    }

    pub fn action(id: CardId, name: impl Into<String>, cost: u32, attribute: Attribute) -> Self {
        Self {
            id,
            name: name.into(),
            cost,
            card_type: CardType::Action,
            attribute,
            unit_stats: None,
            effect_functions: None,
            description: None,
        }
    }

    pub fn with_effects(mut self, effects: impl Into<String>) -> Self {
        self.effect_functions = Some(effects.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 只读的卡牌查询接口。引擎每次调用都由调用方传入，从不缓存。
pub trait CardCatalog {
    fn card(&self, id: CardId) -> Option<&CardDefinition>;
}

impl CardCatalog for HashMap<CardId, CardDefinition> {
    fn card(&self, id: CardId) -> Option<&CardDefinition> {
        self.get(&id)
    }
}

impl CardCatalog for BTreeMap<CardId, CardDefinition> {
    fn card(&self, id: CardId) -> Option<&CardDefinition> {
        self.get(&id)
    }
}

impl<C: CardCatalog + ?Sized> CardCatalog for &C {
    fn card(&self, id: CardId) -> Option<&CardDefinition> {
        (**self).card(id)
    }
}

/// 从定义列表构建目录，重复 id 以后者为准。
pub fn catalog_from_definitions(
    definitions: impl IntoIterator<Item = CardDefinition>,
) -> BTreeMap<CardId, CardDefinition> {
    definitions
        .into_iter()
        .map(|definition| (definition.id, definition))
        .collect()
}
