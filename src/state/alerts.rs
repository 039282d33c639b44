use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::state::snapshot::MarketSnapshot;
use crate::error::{CoinPulseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
}

impl AlertCondition {
    pub fn is_met(self, price: f64, threshold: f64) -> bool {
        match self {
            AlertCondition::Above => price >= threshold,
            AlertCondition::Below => price <= threshold,
        }
    }

    pub fn flip(self) -> Self {
        match self {
            AlertCondition::Above => AlertCondition::Below,
            AlertCondition::Below => AlertCondition::Above,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub id: Uuid,
    pub asset_id: String,
    pub asset_name: String,
    pub threshold: f64,
    pub condition: AlertCondition,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub triggered: bool,
}

/// Produced once per rule, the first time its condition holds.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertNotification {
    pub alert_id: Uuid,
    pub asset_name: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub price: f64,
}

impl fmt::Display for AlertNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Price alert triggered: {} is now {} ${} (at {})",
            self.asset_name,
            self.condition,
            self.threshold,
            crate::format::format_price(self.price)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertRegistry {
    rules: Vec<AlertRule>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    pub fn create(
        &mut self,
        asset_id: &str,
        asset_name: &str,
        threshold: f64,
        condition: AlertCondition,
    ) -> Result<&AlertRule> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(CoinPulseError::InvalidThreshold(threshold));
        }

        self.rules.push(AlertRule {
            id: Uuid::new_v4(),
            asset_id: asset_id.to_string(),
            asset_name: asset_name.to_string(),
            threshold,
            condition,
            created_at: Utc::now().timestamp_millis(),
            triggered: false,
        });

        let rule = &self.rules[self.rules.len() - 1];
        info!(
            "Created alert {} for {} {} {}",
            rule.id, rule.asset_id, rule.condition, rule.threshold
        );
        Ok(rule)
    }

    /// Returns whether a rule was removed. Unknown ids are ignored.
    pub fn remove(&mut self, alert_id: Uuid) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.id != alert_id);
        before != self.rules.len()
    }

    /// Returns whether the flag flipped.
    pub fn mark_triggered(&mut self, alert_id: Uuid) -> bool {
        match self.rules.iter_mut().find(|rule| rule.id == alert_id) {
            Some(rule) if !rule.triggered => {
                rule.triggered = true;
                true
            }
            _ => false,
        }
    }

    /// Checks every pending rule against `snapshot`. Rules whose asset is
    /// missing from the snapshot are skipped. Each rule yields at most one
    /// notification over its whole lifetime.
    pub fn evaluate(&mut self, snapshot: &MarketSnapshot) -> Vec<AlertNotification> {
        let hits: Vec<AlertNotification> = self
            .pending()
            .filter_map(|rule| {
                let asset = snapshot.find(&rule.asset_id)?;
                let price = asset.current_price?;
                rule.condition
                    .is_met(price, rule.threshold)
                    .then(|| AlertNotification {
                        alert_id: rule.id,
                        asset_name: rule.asset_name.clone(),
                        condition: rule.condition,
                        threshold: rule.threshold,
                        price,
                    })
            })
            .collect();

        hits.into_iter()
            .filter(|hit| self.mark_triggered(hit.alert_id))
            .collect()
    }

    pub fn get(&self, alert_id: Uuid) -> Option<&AlertRule> {
        self.rules.iter().find(|rule| rule.id == alert_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertRule> {
        self.rules.iter()
    }

    pub fn pending(&self) -> impl Iterator<Item = &AlertRule> {
        self.rules.iter().filter(|rule| !rule.triggered)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Asset;

    fn snapshot_with(id: &str, price: f64) -> MarketSnapshot {
        MarketSnapshot::new(vec![Asset::sample(id, "Bitcoin", "btc", price, 0.0)])
    }

    #[test]
    fn create_rejects_non_positive_thresholds() {
        let mut registry = AlertRegistry::new();
        for bad in [-5.0, 0.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = registry
                .create("bitcoin", "Bitcoin", bad, AlertCondition::Above)
                .unwrap_err();
            assert!(matches!(err, CoinPulseError::InvalidThreshold(_)));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn create_appends_pending_rule() {
        let mut registry = AlertRegistry::new();
        let id = registry
            .create("bitcoin", "Bitcoin", 70_000.0, AlertCondition::Below)
            .unwrap()
            .id;

        let rule = registry.get(id).unwrap();
        assert_eq!(rule.asset_name, "Bitcoin");
        assert!(!rule.triggered);
        assert!(rule.created_at > 0);
        assert_eq!(registry.pending().count(), 1);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut registry = AlertRegistry::new();
        registry
            .create("bitcoin", "Bitcoin", 1.0, AlertCondition::Above)
            .unwrap();
        assert!(!registry.remove(Uuid::new_v4()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn mark_triggered_only_flips_once() {
        let mut registry = AlertRegistry::new();
        let id = registry
            .create("bitcoin", "Bitcoin", 1.0, AlertCondition::Above)
            .unwrap()
            .id;
        assert!(registry.mark_triggered(id));
        assert!(!registry.mark_triggered(id));
        assert!(!registry.mark_triggered(Uuid::new_v4()));
        assert!(registry.get(id).unwrap().triggered);
    }

    #[test]
    fn above_rule_triggers_exactly_once() {
        let mut registry = AlertRegistry::new();
        let id = registry
            .create("bitcoin", "Bitcoin", 100.0, AlertCondition::Above)
            .unwrap()
            .id;

        for price in [50.0, 99.0, 99.999] {
            assert!(registry.evaluate(&snapshot_with("bitcoin", price)).is_empty());
            assert!(!registry.get(id).unwrap().triggered);
        }

        let fired = registry.evaluate(&snapshot_with("bitcoin", 100.0));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert_id, id);
        assert_eq!(fired[0].price, 100.0);

        for price in [150.0, 20.0, 100.0] {
            assert!(registry.evaluate(&snapshot_with("bitcoin", price)).is_empty());
            assert!(registry.get(id).unwrap().triggered);
        }
    }

    #[test]
    fn below_rule_uses_inclusive_bound() {
        let mut registry = AlertRegistry::new();
        registry
            .create("bitcoin", "Bitcoin", 60_000.0, AlertCondition::Below)
            .unwrap();

        assert!(registry.evaluate(&snapshot_with("bitcoin", 60_000.01)).is_empty());
        assert_eq!(registry.evaluate(&snapshot_with("bitcoin", 60_000.0)).len(), 1);
    }

    #[test]
    fn missing_asset_is_skipped() {
        let mut registry = AlertRegistry::new();
        let id = registry
            .create("dogecoin", "Dogecoin", 0.1, AlertCondition::Above)
            .unwrap()
            .id;

        assert!(registry.evaluate(&snapshot_with("bitcoin", 1.0)).is_empty());
        assert!(!registry.get(id).unwrap().triggered);
    }

    #[test]
    fn independent_rules_fire_together() {
        let mut registry = AlertRegistry::new();
        registry
            .create("bitcoin", "Bitcoin", 10.0, AlertCondition::Above)
            .unwrap();
        registry
            .create("bitcoin", "Bitcoin", 1_000.0, AlertCondition::Below)
            .unwrap();
        registry
            .create("bitcoin", "Bitcoin", 1_000.0, AlertCondition::Above)
            .unwrap();

        let fired = registry.evaluate(&snapshot_with("bitcoin", 500.0));
        assert_eq!(fired.len(), 2);
        assert_eq!(registry.pending().count(), 1);
    }

    #[test]
    fn rules_round_trip_through_json() {
        let mut registry = AlertRegistry::new();
        registry
            .create("ethereum", "Ethereum", 3_000.0, AlertCondition::Below)
            .unwrap();

        let json = serde_json::to_string(&registry).unwrap();
        assert!(json.contains(r#""condition":"below""#));
        assert!(json.contains(r#""assetId":"ethereum""#));

        let restored: AlertRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, registry);
    }
}
