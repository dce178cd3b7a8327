//! Rule-driven event-to-symbol mapping.
//!
//! Each rule filters events by country and title keywords, classifies the
//! outcome (good/bad for the base currency) with a closed comparator — never
//! string-eval — and emits one suggested direction per configured symbol
//! reaction. A single event can map through several rules and several
//! reactions; every match is returned.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{EconomicEvent, TradeAction};

/// Closed set of outcome comparators over the event's numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCondition {
    ActualGtForecast,
    ActualLtForecast,
    ActualGeForecast,
    ActualLeForecast,
    ActualGtPrevious,
    ActualLtPrevious,
}

impl OutcomeCondition {
    /// Evaluate against the event. `None` when either operand is missing or
    /// unparsable — that rule then produces no signal rather than guessing.
    pub fn evaluate(&self, event: &EconomicEvent) -> Option<Outcome> {
        let actual = event.actual_value()?;
        let reference = match self {
            Self::ActualGtForecast | Self::ActualLtForecast | Self::ActualGeForecast | Self::ActualLeForecast => {
                event.forecast_value()?
            }
            Self::ActualGtPrevious | Self::ActualLtPrevious => event.previous_value()?,
        };
        let good = match self {
            Self::ActualGtForecast | Self::ActualGtPrevious => actual > reference,
            Self::ActualLtForecast | Self::ActualLtPrevious => actual < reference,
            Self::ActualGeForecast => actual >= reference,
            Self::ActualLeForecast => actual <= reference,
        };
        Some(if good { Outcome::Good } else { Outcome::Bad })
    }
}

/// Whether the event outcome was good or bad for the base currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Good,
    Bad,
}

/// Configured reaction direction. `Hold` and `None` are deliberate "no
/// signal" markers and never produce a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReactionDirection {
    Buy,
    Sell,
    Hold,
    #[default]
    None,
}

impl ReactionDirection {
    fn as_trade_action(self) -> Option<TradeAction> {
        match self {
            ReactionDirection::Buy => Some(TradeAction::Buy),
            ReactionDirection::Sell => Some(TradeAction::Sell),
            ReactionDirection::Hold | ReactionDirection::None => Option::None,
        }
    }
}

/// How one symbol reacts to a rule's good/bad outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolReaction {
    pub symbol: String,
    #[serde(default)]
    pub direction_if_good: ReactionDirection,
    #[serde(default)]
    pub direction_if_bad: ReactionDirection,
}

/// One event-mapping rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMappingRule {
    pub id: String,
    pub country_codes: Vec<String>,
    /// Case-insensitive substring matches; an empty list matches every title.
    #[serde(default)]
    pub title_keywords: Vec<String>,
    pub outcome_is_good_condition: OutcomeCondition,
    pub symbols_and_reactions: Vec<SymbolReaction>,
}

/// A tradable opportunity produced by the mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedOpportunity {
    pub symbol: String,
    pub suggested_direction: TradeAction,
    pub base_currency_outcome: Outcome,
    pub rule_id: String,
}

/// Rule-based mapper from economic events to (symbol, direction) pairs.
#[derive(Debug, Clone, Default)]
pub struct EventToSymbolMapper {
    rules: Vec<EventMappingRule>,
}

impl EventToSymbolMapper {
    pub fn new(rules: Vec<EventMappingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[EventMappingRule] {
        &self.rules
    }

    /// Map an event through every rule; all matches are returned.
    pub fn map(&self, event: &EconomicEvent) -> Vec<MappedOpportunity> {
        let mut opportunities = Vec::new();
        if self.rules.is_empty() {
            debug!(event_id = %event.id, "no event mapping rules loaded");
            return opportunities;
        }

        let title_lower = event.title.to_lowercase();
        let country_upper = event.country_code.to_uppercase();

        for rule in &self.rules {
            if !rule.country_codes.iter().any(|cc| cc.eq_ignore_ascii_case(&country_upper)) {
                continue;
            }
            let title_match = rule.title_keywords.is_empty()
                || rule
                    .title_keywords
                    .iter()
                    .any(|kw| title_lower.contains(&kw.to_lowercase()));
            if !title_match {
                continue;
            }

            let outcome = match rule.outcome_is_good_condition.evaluate(event) {
                Some(outcome) => outcome,
                None => {
                    warn!(
                        event_id = %event.id,
                        rule_id = %rule.id,
                        actual = ?event.actual,
                        forecast = ?event.forecast,
                        previous = ?event.previous,
                        "outcome condition unevaluable (missing/unparsable values); no signal"
                    );
                    continue;
                }
            };

            for reaction in &rule.symbols_and_reactions {
                let configured = match outcome {
                    Outcome::Good => reaction.direction_if_good,
                    Outcome::Bad => reaction.direction_if_bad,
                };
                let Some(direction) = configured.as_trade_action() else {
                    debug!(
                        event_id = %event.id,
                        rule_id = %rule.id,
                        symbol = %reaction.symbol,
                        ?configured,
                        "reaction direction yields no signal"
                    );
                    continue;
                };
                opportunities.push(MappedOpportunity {
                    symbol: reaction.symbol.clone(),
                    suggested_direction: direction,
                    base_currency_outcome: outcome,
                    rule_id: rule.id.clone(),
                });
            }
        }
        opportunities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn nfp_event(actual: &str, forecast: &str) -> EconomicEvent {
        EconomicEvent {
            id: "ev-1".into(),
            title: "Non-Farm Payrolls".into(),
            country_code: "US".into(),
            datetime: Utc.with_ymd_and_hms(2024, 3, 8, 13, 30, 0).unwrap(),
            actual: Some(actual.into()),
            forecast: Some(forecast.into()),
            previous: None,
        }
    }

    fn nfp_rule() -> EventMappingRule {
        EventMappingRule {
            id: "us_nfp".into(),
            country_codes: vec!["US".into()],
            title_keywords: vec!["payrolls".into()],
            outcome_is_good_condition: OutcomeCondition::ActualGtForecast,
            symbols_and_reactions: vec![SymbolReaction {
                symbol: "EURUSD".into(),
                direction_if_good: ReactionDirection::Sell,
                direction_if_bad: ReactionDirection::Buy,
            }],
        }
    }

    #[test]
    fn maps_good_outcome_deterministically() {
        let mapper = EventToSymbolMapper::new(vec![nfp_rule()]);
        let result = mapper.map(&nfp_event("250", "200"));
        assert_eq!(
            result,
            vec![MappedOpportunity {
                symbol: "EURUSD".into(),
                suggested_direction: TradeAction::Sell,
                base_currency_outcome: Outcome::Good,
                rule_id: "us_nfp".into(),
            }]
        );
    }

    #[test]
    fn maps_bad_outcome_to_other_direction() {
        let mapper = EventToSymbolMapper::new(vec![nfp_rule()]);
        let result = mapper.map(&nfp_event("150", "200"));
        assert_eq!(result[0].suggested_direction, TradeAction::Buy);
        assert_eq!(result[0].base_currency_outcome, Outcome::Bad);
    }

    #[test]
    fn country_mismatch_skips_rule() {
        let mapper = EventToSymbolMapper::new(vec![nfp_rule()]);
        let mut event = nfp_event("250", "200");
        event.country_code = "EU".into();
        assert!(mapper.map(&event).is_empty());
    }

    #[test]
    fn keyword_mismatch_skips_rule() {
        let mapper = EventToSymbolMapper::new(vec![nfp_rule()]);
        let mut event = nfp_event("250", "200");
        event.title = "ISM Manufacturing PMI".into();
        assert!(mapper.map(&event).is_empty());
    }

    #[test]
    fn empty_keywords_match_all_titles() {
        let mut rule = nfp_rule();
        rule.title_keywords.clear();
        let mapper = EventToSymbolMapper::new(vec![rule]);
        let mut event = nfp_event("250", "200");
        event.title = "Anything At All".into();
        assert_eq!(mapper.map(&event).len(), 1);
    }

    #[test]
    fn unparsable_actual_produces_no_signal() {
        let mapper = EventToSymbolMapper::new(vec![nfp_rule()]);
        let result = mapper.map(&nfp_event("n/a", "200"));
        assert!(result.is_empty());
    }

    #[test]
    fn hold_direction_is_dropped() {
        let mut rule = nfp_rule();
        rule.symbols_and_reactions[0].direction_if_good = ReactionDirection::Hold;
        let mapper = EventToSymbolMapper::new(vec![rule]);
        assert!(mapper.map(&nfp_event("250", "200")).is_empty());
    }

    #[test]
    fn multiple_reactions_all_returned() {
        let mut rule = nfp_rule();
        rule.symbols_and_reactions.push(SymbolReaction {
            symbol: "USDJPY".into(),
            direction_if_good: ReactionDirection::Buy,
            direction_if_bad: ReactionDirection::Sell,
        });
        let mapper = EventToSymbolMapper::new(vec![rule]);
        let result = mapper.map(&nfp_event("250", "200"));
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].symbol, "USDJPY");
        assert_eq!(result[1].suggested_direction, TradeAction::Buy);
    }

    #[test]
    fn suffix_values_parse_through_condition() {
        let mapper = EventToSymbolMapper::new(vec![nfp_rule()]);
        let result = mapper.map(&nfp_event("250K", "200K"));
        assert_eq!(result[0].base_currency_outcome, Outcome::Good);
    }

    #[test]
    fn condition_against_previous() {
        let mut rule = nfp_rule();
        rule.outcome_is_good_condition = OutcomeCondition::ActualLtPrevious;
        let mapper = EventToSymbolMapper::new(vec![rule]);
        let mut event = nfp_event("250", "200");
        event.previous = Some("300".into());
        let result = mapper.map(&event);
        assert_eq!(result[0].base_currency_outcome, Outcome::Good);
    }

    #[test]
    fn condition_serde_uses_snake_case() {
        let json = serde_json::to_string(&OutcomeCondition::ActualGtForecast).unwrap();
        assert_eq!(json, "\"actual_gt_forecast\"");
    }
}
