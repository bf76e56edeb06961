use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{
    catalog::{CardCatalog, CardDefinition, CardId, CardType},
    combat,
    config::RulesConfig,
    effects::{apply_effects, validate_target, EffectContext},
    resources,
    response,
    state::{
        AbilityKind, GameEvent, GamePhase, GameState, HeroDefinition, PlayerId, PlayerState,
        Target, Unit, UnitId,
    },
    tokens::{parse_card, parse_effect_tokens, requires_target, target_type, EffectTokens, Keyword},
};

/// 一次调用携带的玩家输入。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameInput {
    PlayCard {
        player_id: PlayerId,
        card_id: CardId,
        #[serde(default)]
        lane: Option<u8>,
        #[serde(default)]
        target: Option<Target>,
    },
    Mulligan {
        player_id: PlayerId,
        /// 要换掉的手牌，可重复。空列表表示保留全部手牌。
        #[serde(default)]
        cards_to_replace: Vec<CardId>,
    },
    EndActiveResponse {
        player_id: PlayerId,
    },
    HeroArt {
        player_id: PlayerId,
        #[serde(default)]
        target: Option<Target>,
    },
    Companion {
        player_id: PlayerId,
        #[serde(default)]
        target: Option<Target>,
    },
}

impl GameInput {
    pub fn player_id(&self) -> PlayerId {
        match self {
            GameInput::PlayCard { player_id, .. }
            | GameInput::Mulligan { player_id, .. }
            | GameInput::EndActiveResponse { player_id }
            | GameInput::HeroArt { player_id, .. }
            | GameInput::Companion { player_id, .. } => *player_id,
        }
    }
}

/// 非法输入。被拒绝的输入不会改变状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleError {
    #[error("the match has already ended")]
    GameFinished,
    #[error("expected phase {expected:?}, found {actual:?}")]
    InvalidPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    #[error("player {player_id} is not seated in this match")]
    PlayerNotFound { player_id: PlayerId },
    #[error("both seats use player id {player_id}")]
    DuplicatePlayerId { player_id: PlayerId },
    #[error("card {card_id} is not in hand")]
    CardNotInHand { card_id: CardId },
    #[error("card {card_id} is missing from the catalog")]
    UnknownCard { card_id: CardId },
    #[error("unit card {card_id} has no unit stats")]
    MissingUnitStats { card_id: CardId },
    #[error("not enough mana: need {required}, have {available}")]
    InsufficientMana { required: u32, available: u32 },
    #[error("not enough action points: need {required}, have {available}")]
    InsufficientAp { required: u32, available: u32 },
    #[error("unit plays need a lane")]
    LaneRequired,
    #[error("lane {lane} is outside the board")]
    LaneOutOfRange { lane: u8 },
    #[error("lane {lane} is already occupied")]
    LaneOccupied { lane: u8 },
    #[error("this card needs a target")]
    TargetRequired,
    #[error("target is not legal for this effect")]
    InvalidTarget,
    #[error("unit {unit_id} cannot be targeted by the opponent")]
    UntargetableUnit { unit_id: UnitId },
    #[error("unit cards are locked out during an active response")]
    ResponseLockout,
    #[error("no active response window")]
    ResponseNotActive,
    #[error("player {player_id} already passed this response window")]
    AlreadyPassed { player_id: PlayerId },
    #[error("player {player_id} already submitted a mulligan")]
    MulliganAlreadySubmitted { player_id: PlayerId },
    #[error("hero has no {ability:?} ability")]
    AbilityUnavailable { ability: AbilityKind },
}

/// `step` 的结果：新状态、派生事件与（若有）拒绝原因。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepOutcome {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RuleError>,
}

/// 开局时一名玩家的配置。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerSetup {
    pub player_id: PlayerId,
    pub hero: HeroDefinition,
    pub deck: Vec<CardId>,
}

/// 规则引擎。方法在传入的状态上原地修改；返回 `Err` 时状态可能已部分修改，
/// 调用方应丢弃它（[`step`] 在副本上执行）。
pub struct RuleEngine<C> {
    catalog: C,
}

impl<C: CardCatalog> RuleEngine<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    fn ensure_phase(state: &GameState, expected: GamePhase) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if state.phase != expected {
            return Err(RuleError::InvalidPhase {
                expected,
                actual: state.phase,
            });
        }
        Ok(())
    }

    fn seat_of(state: &GameState, player_id: PlayerId) -> Result<usize, RuleError> {
        state
            .player_index(player_id)
            .ok_or(RuleError::PlayerNotFound { player_id })
    }

    pub fn apply(&self, state: &mut GameState, input: &GameInput) -> Result<Vec<GameEvent>, RuleError> {
        match input {
            GameInput::PlayCard {
                player_id,
                card_id,
                lane,
                target,
            } => self.play_card(state, *player_id, *card_id, *lane, *target),
            GameInput::Mulligan {
                player_id,
                cards_to_replace,
            } => self.mulligan(state, *player_id, cards_to_replace),
            GameInput::EndActiveResponse { player_id } => self.end_active_response(state, *player_id),
            GameInput::HeroArt { player_id, target } => {
                self.use_ability(state, *player_id, AbilityKind::HeroArt, *target)
            }
            GameInput::Companion { player_id, target } => {
                self.use_ability(state, *player_id, AbilityKind::Companion, *target)
            }
        }
    }

    pub fn play_card(
        &self,
        state: &mut GameState,
        player_id: PlayerId,
        card_id: CardId,
        lane: Option<u8>,
        target: Option<Target>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_phase(state, GamePhase::Playing)?;
        let seat = Self::seat_of(state, player_id)?;
        let hand_index = state.players[seat]
            .find_card_in_hand_index(card_id)
            .ok_or(RuleError::CardNotInHand { card_id })?;
        let definition = self
            .catalog
            .card(card_id)
            .ok_or(RuleError::UnknownCard { card_id })?;
        response::ensure_card_allowed(state, definition.card_type)?;
        resources::ensure_mp(&state.players[seat], definition.cost)?;

        let tokens = parse_card(definition);
        let combo = tokens.has(Keyword::Combo) && state.players[seat].chain > 0;

        // 先完成全部校验，再开始修改状态
        let placement = match definition.card_type {
            CardType::Unit => {
                let lane = Self::check_placement(state, seat, definition, lane, &tokens)?;
                if let Some(target) = target {
                    validate_target(state, seat, target_type(definition), target)?;
                }
                Some(lane)
            }
            CardType::Action => {
                if requires_target(definition) && target.is_none() {
                    return Err(RuleError::TargetRequired);
                }
                if let Some(target) = target {
                    validate_target(state, seat, target_type(definition), target)?;
                }
                None
            }
        };

        let mut events = Vec::new();
        let player = &mut state.players[seat];
        player.hand.remove(hand_index);
        resources::pay_mp(player, definition.cost)?;
        player.chain += 1;
        state.players[1 - seat].chain = 0;
        events.push(GameEvent::CardPlayed {
            player_id,
            card_id,
            lane: placement,
            target,
            combo,
        });
        let reward = state.rules.ap_per_card_played;
        let gained = resources::gain_ap(&mut state.players[seat], reward);
        if gained > 0 {
            events.push(GameEvent::ApGained {
                player_id,
                amount: gained,
            });
        }

        match placement {
            Some(lane) => {
                events.extend(Self::spawn_unit(state, seat, definition, lane, combo)?);
                events.extend(Self::resolve_on_play(state, seat, card_id, &tokens, target));
                if let Some(outcome) = state.evaluate_victory() {
                    events.push(GameEvent::GameEnded { outcome });
                } else {
                    events.extend(response::open_window(state, player_id));
                }
            }
            None => {
                state.players[seat].graveyard.push(card_id);
                let context = EffectContext::new(seat)
                    .with_target(target)
                    .with_combo(combo);
                events.extend(apply_effects(state, &tokens, &context));
                if let Some(outcome) = state.evaluate_victory() {
                    events.push(GameEvent::GameEnded { outcome });
                } else {
                    events.extend(response::record_response(state, player_id));
                }
            }
        }

        log::debug!("player {player_id} played card {card_id}");
        Ok(events)
    }

    /// 校验单位落点：路号合法，且路为空或该卡带有觉醒（awakening）。
    fn check_placement(
        state: &GameState,
        seat: usize,
        definition: &CardDefinition,
        lane: Option<u8>,
        tokens: &EffectTokens,
    ) -> Result<u8, RuleError> {
        if definition.unit_stats.is_none() {
            return Err(RuleError::MissingUnitStats {
                card_id: definition.id,
            });
        }
        let lane = lane.ok_or(RuleError::LaneRequired)?;
        if lane >= state.rules.lane_count {
            return Err(RuleError::LaneOutOfRange { lane });
        }
        if state.players[seat].unit_in_lane(lane).is_some() && !tokens.has(Keyword::Awakening) {
            return Err(RuleError::LaneOccupied { lane });
        }
        Ok(lane)
    }

    fn spawn_unit(
        state: &mut GameState,
        seat: usize,
        definition: &CardDefinition,
        lane: u8,
        combo: bool,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let mut events = Vec::new();
        let player_id = state.players[seat].player_id;
        let replaced = state.players[seat].unit_in_lane(lane).map(|unit| unit.id);
        if let Some(old_id) = replaced {
            if let Some(old) = state.players[seat].remove_unit(old_id) {
                events.push(GameEvent::UnitDestroyed {
                    player_id,
                    unit_id: old.id,
                    card_id: old.card_id,
                    lane,
                });
            }
        }

        let unit_id = state.allocate_unit_id();
        let mut unit = Unit::spawn(unit_id, definition, lane).ok_or(RuleError::MissingUnitStats {
            card_id: definition.id,
        })?;
        if combo {
            unit.attack += 1;
            unit.max_hp += 1;
            unit.hp += 1;
        }
        state.players[seat].place_unit(unit);
        events.push(GameEvent::UnitSpawned {
            player_id,
            unit_id,
            card_id: definition.id,
            lane,
        });
        Ok(events)
    }

    /// 单位卡的上场效果。连击只体现在单位数值上，不翻倍这些数值。
    /// 带目标参数的单位卡可以不选目标上场，此时跳过上场效果。
    fn resolve_on_play(
        state: &mut GameState,
        seat: usize,
        card_id: CardId,
        tokens: &EffectTokens,
        target: Option<Target>,
    ) -> Vec<GameEvent> {
        let on_play = tokens.on_play();
        if on_play.is_empty() {
            return Vec::new();
        }
        if on_play.target().is_some() && target.is_none() {
            log::debug!("card {card_id} entered without a target, on-play effect skipped");
            return Vec::new();
        }
        let context = EffectContext::new(seat).with_target(target);
        apply_effects(state, &on_play, &context)
    }

    pub fn mulligan(
        &self,
        state: &mut GameState,
        player_id: PlayerId,
        cards_to_replace: &[CardId],
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_phase(state, GamePhase::Mulligan)?;
        let seat = Self::seat_of(state, player_id)?;
        let player = &mut state.players[seat];
        if player.mulligan_submitted {
            return Err(RuleError::MulliganAlreadySubmitted { player_id });
        }

        // 按重数校验所选卡都在手中
        let mut remaining = player.hand.clone();
        for &card_id in cards_to_replace {
            let index = remaining
                .iter()
                .position(|card| *card == card_id)
                .ok_or(RuleError::CardNotInHand { card_id })?;
            remaining.remove(index);
        }

        for &card_id in cards_to_replace {
            if let Some(index) = player.find_card_in_hand_index(card_id) {
                player.hand.remove(index);
                player.put_card_on_bottom_of_deck(card_id);
            }
        }

        let mut events = Vec::new();
        for _ in 0..cards_to_replace.len() {
            let Some(card_id) = player.draw_card() else {
                break;
            };
            events.push(GameEvent::CardDrawn { player_id, card_id });
        }
        player.mulligan_submitted = true;
        events.push(GameEvent::MulliganApplied {
            player_id,
            replaced: cards_to_replace.to_vec(),
        });

        if state.players.iter().all(|player| player.mulligan_submitted) {
            state.phase = GamePhase::Playing;
            log::info!("mulligan complete, match is live");
            events.push(GameEvent::PhaseChanged {
                phase: GamePhase::Playing,
            });
        }
        Ok(events)
    }

    pub fn end_active_response(
        &self,
        state: &mut GameState,
        player_id: PlayerId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_phase(state, GamePhase::Playing)?;
        Self::seat_of(state, player_id)?;
        response::end_response(state, player_id)
    }

    /// 发动英雄技能：消耗行动点，效果沿用卡牌词条语法。应答窗口期间也可发动。
    pub fn use_ability(
        &self,
        state: &mut GameState,
        player_id: PlayerId,
        kind: AbilityKind,
        target: Option<Target>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_phase(state, GamePhase::Playing)?;
        let seat = Self::seat_of(state, player_id)?;
        let hero = &state.players[seat].hero;
        let ability = match kind {
            AbilityKind::HeroArt => hero.hero_art.as_ref(),
            AbilityKind::Companion => hero.companion.as_ref(),
        }
        .ok_or(RuleError::AbilityUnavailable { ability: kind })?;
        resources::ensure_ap(&state.players[seat], ability.cost)?;

        let tokens = parse_effect_tokens(&ability.effect);
        if ability.requires_target && target.is_none() {
            return Err(RuleError::TargetRequired);
        }
        if let Some(target) = target {
            validate_target(state, seat, tokens.target(), target)?;
        }
        let cost = ability.cost;

        resources::spend_ap(&mut state.players[seat], cost)?;
        let mut events = vec![GameEvent::AbilityUsed {
            player_id,
            ability: kind,
            target,
        }];
        let context = EffectContext::new(seat).with_target(target);
        events.extend(apply_effects(state, &tokens, &context));
        if let Some(outcome) = state.evaluate_victory() {
            events.push(GameEvent::GameEnded { outcome });
        }
        Ok(events)
    }

    /// 时钟推进。应答窗口激活时只推进窗口计时，否则回复法力并结算战斗。
    pub fn tick(&self, state: &mut GameState, dt_ms: u32) -> Vec<GameEvent> {
        if dt_ms == 0 || state.phase != GamePhase::Playing {
            return Vec::new();
        }
        if state.active_response.is_active {
            return response::tick(state, dt_ms);
        }
        let rules = state.rules.clone();
        for player in &mut state.players {
            resources::regenerate_mp(player, dt_ms, &rules);
        }
        combat::resolve_combat(state, dt_ms)
    }
}

/// 建立新对局：用给定种子洗牌、各发起手牌，进入换牌阶段。
pub fn create_initial_game_state<C: CardCatalog>(
    player_a: PlayerSetup,
    player_b: PlayerSetup,
    catalog: &C,
    seed: u64,
    rules: RulesConfig,
) -> Result<GameState, RuleError> {
    if player_a.player_id == player_b.player_id {
        return Err(RuleError::DuplicatePlayerId {
            player_id: player_a.player_id,
        });
    }
    for &card_id in player_a.deck.iter().chain(&player_b.deck) {
        if catalog.card(card_id).is_none() {
            return Err(RuleError::UnknownCard { card_id });
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let players = [player_a, player_b].map(|setup| {
        let mut deck = setup.deck;
        deck.shuffle(&mut rng);
        let mut player = PlayerState::new(setup.player_id, setup.hero, deck, &rules);
        for _ in 0..rules.opening_hand_size {
            if player.draw_card().is_none() {
                break;
            }
        }
        player
    });

    log::info!(
        "new match between players {} and {} (seed {seed})",
        players[0].player_id,
        players[1].player_id
    );
    Ok(GameState::new(players, rules))
}

/// 推进一步：有输入时校验并原子地应用输入，否则按 `dt_ms` 推进时钟。
/// 输入调用忽略 `dt_ms`。
pub fn step<C: CardCatalog>(
    state: &GameState,
    input: Option<&GameInput>,
    dt_ms: u32,
    catalog: &C,
) -> StepOutcome {
    let engine = RuleEngine::new(catalog);
    let mut working = state.clone();
    let result = match input {
        Some(input) => engine.apply(&mut working, input),
        None if state.is_finished() => Ok(Vec::new()),
        None => Ok(engine.tick(&mut working, dt_ms)),
    };

    match result {
        Ok(events) => {
            let integrity = working.integrity_check();
            debug_assert!(integrity.is_ok(), "state integrity violated: {integrity:?}");
            StepOutcome {
                state: working,
                events,
                rejection: None,
            }
        }
        Err(rejection) => {
            log::debug!("input rejected: {rejection}");
            StepOutcome {
                state: state.clone(),
                events: Vec::new(),
                rejection: Some(rejection),
            }
        }
    }
}

/// 纯函数形式的状态转移。非法输入原样返回旧状态。
pub fn update_game_state<C: CardCatalog>(
    state: &GameState,
    input: Option<&GameInput>,
    dt_ms: u32,
    catalog: &C,
) -> GameState {
    step(state, input, dt_ms, catalog).state
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::game::state::{HeroAbility, Outcome, ResponseCloseReason, StatusEffect};
    use crate::game::testing::{action_card, catalog, hero, place, playing_state, unit_card};

    type Catalog = BTreeMap<CardId, CardDefinition>;

    fn cards() -> Catalog {
        catalog(vec![
            unit_card(1, 3, 3, 1000),
            unit_card(2, 2, 4, 1000).with_effects("awakening"),
            unit_card(3, 1, 2, 2000).with_effects("combo"),
            action_card(10, 1, "damage:2;target:enemy_unit"),
            action_card(11, 1, "damage:2;combo"),
            action_card(12, 3, "draw:1"),
            action_card(13, 0, "shield;target:friendly_unit"),
            unit_card(20, 1, 1, 1000).with_effects("draw:1;damage:3"),
            unit_card(21, 2, 2, 1000).with_effects("shield;damage:2;target:enemy_unit"),
            unit_card(22, 1, 3, 1000).with_effects("veil;heal:4"),
        ])
    }

    fn play(player_id: PlayerId, card_id: CardId, lane: Option<u8>, target: Option<Target>) -> GameInput {
        GameInput::PlayCard {
            player_id,
            card_id,
            lane,
            target,
        }
    }

    fn pass(player_id: PlayerId) -> GameInput {
        GameInput::EndActiveResponse { player_id }
    }

    fn run(state: &GameState, input: GameInput, catalog: &Catalog) -> StepOutcome {
        step(state, Some(&input), 0, catalog)
    }

    fn setup(player_id: PlayerId, deck: Vec<CardId>) -> PlayerSetup {
        PlayerSetup {
            player_id,
            hero: hero("Aster"),
            deck,
        }
    }

    fn new_match(seed: u64) -> GameState {
        let deck: Vec<CardId> = vec![1, 1, 2, 2, 3, 3, 10, 10, 11, 11, 12, 13];
        create_initial_game_state(
            setup(7, deck.clone()),
            setup(9, deck),
            &cards(),
            seed,
            RulesConfig::default(),
        )
        .expect("valid setup")
    }

    #[test]
    fn initial_state_deals_opening_hands_in_mulligan() {
        let state = new_match(42);
        assert_eq!(state.phase, GamePhase::Mulligan);
        assert!(!state.active_response.is_active);
        for player in &state.players {
            assert_eq!(player.hand.len(), 4);
            assert_eq!(player.deck.len(), 8);
            assert_eq!((player.hp, player.mp, player.ap), (20, 5, 0));
        }
        assert_eq!(new_match(42), state, "same seed must produce the same shuffle");
    }

    #[test]
    fn setup_rejects_unknown_cards_and_duplicate_seats() {
        let catalog = cards();
        let rules = RulesConfig::default();
        assert_eq!(
            create_initial_game_state(setup(1, vec![1, 99]), setup(2, vec![1]), &catalog, 0, rules.clone()),
            Err(RuleError::UnknownCard { card_id: 99 })
        );
        assert_eq!(
            create_initial_game_state(setup(1, vec![1]), setup(1, vec![1]), &catalog, 0, rules),
            Err(RuleError::DuplicatePlayerId { player_id: 1 })
        );
    }

    #[test]
    fn mulligan_keeps_hand_size_and_starts_play_when_both_submit() {
        let catalog = cards();
        let state = new_match(3);
        let hand = state.players[0].hand.clone();

        let outcome = run(
            &state,
            GameInput::Mulligan {
                player_id: 7,
                cards_to_replace: vec![hand[0], hand[1]],
            },
            &catalog,
        );
        assert_eq!(outcome.rejection, None);
        let player = &outcome.state.players[0];
        assert_eq!(player.hand.len(), 4);
        assert_eq!(&player.deck[..2], &[hand[1], hand[0]], "replaced cards go to the bottom");
        assert_eq!(outcome.state.phase, GamePhase::Mulligan);

        let again = run(
            &outcome.state,
            GameInput::Mulligan {
                player_id: 7,
                cards_to_replace: Vec::new(),
            },
            &catalog,
        );
        assert_eq!(again.rejection, Some(RuleError::MulliganAlreadySubmitted { player_id: 7 }));

        let kept = state.players[1].hand.clone();
        let outcome = run(
            &outcome.state,
            GameInput::Mulligan {
                player_id: 9,
                cards_to_replace: Vec::new(),
            },
            &catalog,
        );
        assert_eq!(outcome.state.players[1].hand, kept, "empty list keeps the whole hand");
        assert_eq!(outcome.state.phase, GamePhase::Playing);
        assert!(outcome.events.contains(&GameEvent::PhaseChanged {
            phase: GamePhase::Playing
        }));

        let late = run(
            &outcome.state,
            GameInput::Mulligan {
                player_id: 9,
                cards_to_replace: Vec::new(),
            },
            &catalog,
        );
        assert_eq!(outcome.state, late.state, "phase never returns to mulligan");
    }

    #[test]
    fn mulligan_with_a_card_not_in_hand_changes_nothing() {
        let catalog = cards();
        let mut state = new_match(5);
        state.players[0].hand = vec![1, 2, 3, 10];

        let outcome = run(
            &state,
            GameInput::Mulligan {
                player_id: 7,
                cards_to_replace: vec![1, 1],
            },
            &catalog,
        );
        assert_eq!(outcome.rejection, Some(RuleError::CardNotInHand { card_id: 1 }));
        assert_eq!(outcome.state, state);
    }

    #[test]
    fn card_costing_more_than_available_mana_is_rejected() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![12];
        state.players[0].mp = 2;

        let outcome = run(&state, play(0, 12, None, None), &catalog);

        assert_eq!(
            outcome.rejection,
            Some(RuleError::InsufficientMana {
                required: 3,
                available: 2
            })
        );
        assert_eq!(outcome.state, state);
        assert_eq!(update_game_state(&state, Some(&play(0, 12, None, None)), 0, &catalog), state);
    }

    #[test]
    fn blue_mp_covers_the_shortfall() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![12];
        state.players[0].mp = 2;
        state.players[0].blue_mp = 1;

        let outcome = run(&state, play(0, 12, None, None), &catalog);

        assert_eq!(outcome.rejection, None);
        assert_eq!((outcome.state.players[0].mp, outcome.state.players[0].blue_mp), (0, 0));
        assert_eq!(outcome.state.players[0].graveyard, vec![12]);
    }

    #[test]
    fn unit_play_spawns_and_opens_response_for_opponent() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![1];

        let outcome = run(&state, play(0, 1, Some(1), None), &catalog);
        let next = &outcome.state;

        assert_eq!(outcome.rejection, None);
        assert!(next.players[0].hand.is_empty());
        assert_eq!(next.players[0].mp, 8);
        assert_eq!(next.players[0].ap, 1, "playing a card grants action points");
        let unit = &next.players[0].units[0];
        assert_eq!((unit.id, unit.lane, unit.hp), (1, 1, 3));
        assert!(next.active_response.is_active);
        assert_eq!(next.active_response.current_player_id, Some(1));
        assert_eq!(next.active_response.timer, 5000);
    }

    #[test]
    fn unit_plays_are_locked_out_while_response_is_active() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![1, 1];
        state.players[1].hand = vec![1, 10];

        let opened = run(&state, play(0, 1, Some(0), None), &catalog).state;
        for (player_id, lane) in [(0, 1), (1, 0)] {
            let outcome = run(&opened, play(player_id, 1, Some(lane), None), &catalog);
            assert_eq!(outcome.rejection, Some(RuleError::ResponseLockout));
            assert_eq!(outcome.state, opened);
        }

        let unit_id = opened.players[0].units[0].id;
        let outcome = run(
            &opened,
            play(1, 10, None, Some(Target::Unit { unit_id })),
            &catalog,
        );
        assert_eq!(outcome.rejection, None, "action cards stay legal");
        assert_eq!(outcome.state.players[0].units[0].hp, 1);
        assert_eq!(outcome.state.active_response.current_player_id, Some(0));
    }

    #[test]
    fn both_passes_close_the_window_and_resume_time() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![1];
        state.players[0].mp = 4;

        let mut current = run(&state, play(0, 1, Some(2), None), &catalog).state;
        let frozen = step(&current, None, 3000, &catalog).state;
        assert_eq!(frozen.players[0].mp, 2, "mana regen is paused during the window");
        assert_eq!(frozen.players[0].units[0].attack_gauge, 0.0);
        assert_eq!(frozen.active_response.timer, 2000);

        current = run(&current, pass(1), &catalog).state;
        assert!(current.active_response.is_active);
        let outcome = run(&current, pass(0), &catalog);
        assert!(!outcome.state.active_response.is_active);
        assert!(outcome.events.contains(&GameEvent::ResponseClosed {
            reason: ResponseCloseReason::AllPassed
        }));

        let resumed = step(&outcome.state, None, 500, &catalog).state;
        assert_eq!(resumed.players[0].units[0].attack_gauge, 0.5);
    }

    #[test]
    fn window_closes_by_timer_and_leftover_time_is_dropped() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[1].hand = vec![1];
        let opened = run(&state, play(1, 1, Some(0), None), &catalog).state;

        let closed = step(&opened, None, 6000, &catalog).state;
        assert!(!closed.active_response.is_active);
        assert_eq!(closed.players[1].units[0].attack_gauge, 0.0);
        assert_eq!(closed.players[0].hp, 20);
    }

    #[test]
    fn ending_response_without_a_window_is_rejected() {
        let outcome = run(&playing_state(), pass(0), &cards());
        assert_eq!(outcome.rejection, Some(RuleError::ResponseNotActive));
    }

    #[test]
    fn lane_rules_for_unit_plays() {
        let catalog = cards();
        let mut state = playing_state();
        state.rules.response_window_ms = 0;
        state.players[0].hand = vec![1, 1, 2];
        place(&mut state, 0, &unit_card(1, 3, 3, 1000), 0);

        let cases = [
            (None, RuleError::LaneRequired),
            (Some(3), RuleError::LaneOutOfRange { lane: 3 }),
            (Some(0), RuleError::LaneOccupied { lane: 0 }),
        ];
        for (lane, expected) in cases {
            let outcome = run(&state, play(0, 1, lane, None), &catalog);
            assert_eq!(outcome.rejection, Some(expected));
        }

        let outcome = run(&state, play(0, 2, Some(0), None), &catalog);
        assert_eq!(outcome.rejection, None, "awakening may replace a friendly unit");
        let player = &outcome.state.players[0];
        assert_eq!(player.units.len(), 1);
        assert_eq!(player.units[0].card_id, 2);
        assert_eq!(player.graveyard, vec![1]);
    }

    #[test]
    fn targeted_actions_validate_their_target() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![10, 13];
        let veiled = place(&mut state, 1, &unit_card(50, 1, 3, 1000).with_effects("veil"), 1);
        let own = place(&mut state, 0, &unit_card(51, 1, 3, 1000), 1);

        let missing = run(&state, play(0, 10, None, None), &catalog);
        assert_eq!(missing.rejection, Some(RuleError::TargetRequired));

        let hidden = run(&state, play(0, 10, None, Some(Target::Unit { unit_id: veiled })), &catalog);
        assert_eq!(hidden.rejection, Some(RuleError::UntargetableUnit { unit_id: veiled }));

        let wrong_side = run(&state, play(0, 10, None, Some(Target::Unit { unit_id: own })), &catalog);
        assert_eq!(wrong_side.rejection, Some(RuleError::InvalidTarget));

        let shielded = run(&state, play(0, 13, None, Some(Target::Unit { unit_id: own })), &catalog);
        assert_eq!(shielded.rejection, None);
        assert!(shielded.state.players[0].units[0].has(StatusEffect::Shield));
    }

    #[test]
    fn combo_doubles_action_damage_after_a_prior_play() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![11, 11];

        let first = run(&state, play(0, 11, None, None), &catalog);
        assert_eq!(first.state.players[1].hp, 18);

        let second = run(&first.state, play(0, 11, None, None), &catalog);
        assert_eq!(second.state.players[1].hp, 14);
        assert!(second.events.iter().any(|event| matches!(event, GameEvent::CardPlayed { combo: true, .. })));
    }

    #[test]
    fn opponent_play_breaks_the_chain() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![11, 3];
        state.players[1].hand = vec![11];

        let mut current = run(&state, play(0, 11, None, None), &catalog).state;
        current = run(&current, play(1, 11, None, None), &catalog).state;
        assert_eq!(current.players[0].chain, 0);

        let outcome = run(&current, play(0, 3, Some(0), None), &catalog);
        let unit = &outcome.state.players[0].units[0];
        assert_eq!((unit.attack, unit.max_hp), (1, 2), "no combo bonus without a chain");
    }

    #[test]
    fn combo_unit_gains_stats() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![11, 3];

        let current = run(&state, play(0, 11, None, None), &catalog).state;
        let outcome = run(&current, play(0, 3, Some(2), None), &catalog);
        let unit = &outcome.state.players[0].units[0];
        assert_eq!((unit.attack, unit.hp, unit.max_hp), (2, 3, 3));
    }

    #[test]
    fn hero_art_spends_ap_and_resolves_its_target() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hero = hero("Aster").with_hero_art(HeroAbility {
            name: "Starfall".into(),
            cost: 3,
            requires_target: true,
            effect: "damage:4;target:enemy_hero".into(),
        });
        state.players[0].ap = 2;
        let art = |target| GameInput::HeroArt { player_id: 0, target };

        let poor = run(&state, art(Some(Target::Hero { player_id: 1 })), &catalog);
        assert_eq!(
            poor.rejection,
            Some(RuleError::InsufficientAp {
                required: 3,
                available: 2
            })
        );

        state.players[0].ap = 5;
        assert_eq!(run(&state, art(None), &catalog).rejection, Some(RuleError::TargetRequired));
        assert_eq!(
            run(&state, art(Some(Target::Hero { player_id: 0 })), &catalog).rejection,
            Some(RuleError::InvalidTarget)
        );

        let outcome = run(&state, art(Some(Target::Hero { player_id: 1 })), &catalog);
        assert_eq!(outcome.state.players[1].hp, 16);
        assert_eq!(outcome.state.players[0].ap, 2);

        let companion = run(
            &state,
            GameInput::Companion {
                player_id: 0,
                target: None,
            },
            &catalog,
        );
        assert_eq!(
            companion.rejection,
            Some(RuleError::AbilityUnavailable {
                ability: AbilityKind::Companion
            })
        );
    }

    #[test]
    fn companion_spends_ap_and_resolves_on_its_target() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hero = hero("Aster").with_companion(HeroAbility {
            name: "Wisp".into(),
            cost: 2,
            requires_target: true,
            effect: "buff:1;target:friendly_unit".into(),
        });
        state.players[0].ap = 3;
        let ally = place(&mut state, 0, &unit_card(4, 2, 2, 1000), 1);

        let outcome = run(
            &state,
            GameInput::Companion {
                player_id: 0,
                target: Some(Target::Unit { unit_id: ally }),
            },
            &catalog,
        );

        assert_eq!(outcome.rejection, None);
        assert_eq!(outcome.state.players[0].ap, 1);
        assert_eq!(outcome.state.players[0].find_unit(ally).map(|unit| unit.attack), Some(3));
        assert!(matches!(
            outcome.events.first(),
            Some(GameEvent::AbilityUsed {
                ability: AbilityKind::Companion,
                ..
            })
        ));
        assert!(!outcome.state.active_response.is_active, "abilities never open a window");
    }

    #[test]
    fn unit_on_play_effects_resolve_after_spawning() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![20];
        state.players[0].deck = vec![99];

        let outcome = run(&state, play(0, 20, Some(0), None), &catalog);

        assert_eq!(outcome.rejection, None);
        let next = &outcome.state;
        assert_eq!(next.players[0].units.len(), 1);
        assert_eq!(next.players[0].hand, vec![99]);
        assert!(next.players[0].deck.is_empty());
        assert_eq!(next.players[1].hp, 17);
        assert!(next.active_response.is_active);
    }

    #[test]
    fn targeted_unit_validates_and_hits_its_target_on_entry() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![21];
        let enemy = place(&mut state, 1, &unit_card(60, 1, 5, 1000), 2);
        let veiled = place(&mut state, 1, &unit_card(61, 1, 5, 1000).with_effects("veil"), 1);

        let hidden = run(&state, play(0, 21, Some(0), Some(Target::Unit { unit_id: veiled })), &catalog);
        assert_eq!(hidden.rejection, Some(RuleError::UntargetableUnit { unit_id: veiled }));
        assert_eq!(hidden.state, state);

        let outcome = run(&state, play(0, 21, Some(0), Some(Target::Unit { unit_id: enemy })), &catalog);
        assert_eq!(outcome.rejection, None);
        assert_eq!(outcome.state.players[1].find_unit(enemy).map(|unit| unit.hp), Some(3));
        assert!(outcome.state.players[0].units[0].has(StatusEffect::Shield));
        assert!(
            !outcome
                .events
                .iter()
                .any(|event| matches!(event, GameEvent::StatusGranted { .. })),
            "spawn statuses are not granted a second time"
        );

        let untargeted = run(&state, play(0, 21, Some(0), None), &catalog);
        assert_eq!(untargeted.rejection, None);
        assert_eq!(untargeted.state.players[0].units.len(), 1);
        assert_eq!(untargeted.state.players[1].find_unit(enemy).map(|unit| unit.hp), Some(5));
        assert_eq!(untargeted.state.players[1].hp, 20);
    }

    #[test]
    fn untargeted_unit_heal_goes_to_its_own_hero() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![22];
        state.players[0].hp = 15;

        let outcome = run(&state, play(0, 22, Some(2), None), &catalog);

        assert_eq!(outcome.rejection, None);
        assert_eq!(outcome.state.players[0].hp, 19);
        assert!(outcome.state.players[0].units[0].has(StatusEffect::Veil));
    }

    #[test]
    fn lethal_on_play_damage_ends_the_match_without_a_window() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![20];
        state.players[1].hp = 3;

        let outcome = run(&state, play(0, 20, Some(1), None), &catalog);

        assert_eq!(outcome.rejection, None);
        assert_eq!(outcome.state.phase, GamePhase::Ended);
        assert_eq!(outcome.state.outcome, Some(Outcome::Winner { player_id: 0 }));
        assert!(!outcome.state.active_response.is_active);
        assert!(matches!(outcome.events.last(), Some(GameEvent::GameEnded { .. })));
    }

    #[test]
    fn equal_units_kill_each_other_end_to_end() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[0].hand = vec![1];
        state.players[1].hand = vec![1];

        let mut current = state;
        for input in [play(0, 1, Some(1), None), pass(1), pass(0), play(1, 1, Some(1), None), pass(0), pass(1)] {
            let outcome = run(&current, input, &catalog);
            assert_eq!(outcome.rejection, None);
            current = outcome.state;
        }
        let after = step(&current, None, 1000, &catalog).state;

        assert!(after.players.iter().all(|player| player.units.is_empty()));
        assert_eq!(after.players[0].graveyard, vec![1]);
        assert_eq!(after.players[1].graveyard, vec![1]);
    }

    #[test]
    fn ended_match_ignores_inputs_and_ticks() {
        let catalog = cards();
        let mut state = playing_state();
        state.players[1].hp = 3;
        state.players[0].hand = vec![11];
        place(&mut state, 0, &unit_card(1, 3, 3, 1000), 0);

        let ended = step(&state, None, 1000, &catalog).state;
        assert_eq!(ended.phase, GamePhase::Ended);
        assert_eq!(ended.outcome, Some(Outcome::Winner { player_id: 0 }));

        assert_eq!(step(&ended, None, 5000, &catalog).state, ended);
        let outcome = run(&ended, play(0, 11, None, None), &catalog);
        assert_eq!(outcome.rejection, Some(RuleError::GameFinished));
        assert_eq!(outcome.state, ended);
    }

    #[test]
    fn identical_input_streams_replay_identically() {
        let catalog = cards();
        // 开局手牌即整副牌库，脚本按卡牌 id 出牌，与洗牌后的顺序无关。
        let rules = RulesConfig {
            opening_hand_size: 3,
            ..RulesConfig::default()
        };
        let inputs: Vec<(Option<GameInput>, u32)> = vec![
            (
                Some(GameInput::Mulligan {
                    player_id: 7,
                    cards_to_replace: vec![11],
                }),
                0,
            ),
            (
                Some(GameInput::Mulligan {
                    player_id: 9,
                    cards_to_replace: Vec::new(),
                }),
                0,
            ),
            (Some(play(7, 1, Some(1), None)), 0),
            (Some(play(9, 11, None, None)), 0),
            (Some(pass(7)), 0),
            (Some(pass(9)), 0),
            (None, 333),
            (Some(play(9, 1, Some(1), None)), 0),
            (Some(pass(7)), 0),
            (Some(pass(9)), 0),
            (None, 333),
            (None, 667),
            (None, 333),
            (None, 667),
            (None, 1000),
        ];
        let replay = || {
            let mut current = create_initial_game_state(
                setup(7, vec![1, 11, 3]),
                setup(9, vec![1, 11, 3]),
                &catalog,
                2024,
                rules.clone(),
            )
            .expect("valid setup");
            let mut snapshots = Vec::new();
            let mut events = Vec::new();
            for (input, dt_ms) in &inputs {
                let outcome = step(&current, input.as_ref(), *dt_ms, &catalog);
                assert_eq!(outcome.rejection, None, "scripted input {input:?} is legal");
                events.extend(outcome.events);
                current = outcome.state;
                snapshots.push(serde_json::to_string(&current).expect("state serializes"));
            }
            (snapshots, events, current)
        };

        let (first, events, last) = replay();
        let (second, _, _) = replay();
        assert_eq!(first, second);
        assert_ne!(last.phase, GamePhase::Mulligan);
        assert_eq!(last.players[0].hp, 18, "the response action hit player 7");
        assert!(events
            .iter()
            .any(|event| matches!(event, GameEvent::UnitAttacked { .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, GameEvent::ResponseClosed { .. })));
    }

    #[test]
    fn inputs_deserialize_from_tagged_json() {
        let input: GameInput = serde_json::from_str(
            r#"{"type":"play_card","player_id":1,"card_id":10,"target":{"type":"unit","unit_id":4}}"#,
        )
        .expect("valid input");
        assert_eq!(input, play(1, 10, None, Some(Target::Unit { unit_id: 4 })));
        assert_eq!(input.player_id(), 1);
    }
}
