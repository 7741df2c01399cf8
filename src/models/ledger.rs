use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::portfolio::Portfolio;
use crate::errors::AppError;

pub const LEDGER_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerMeta {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    LEDGER_VERSION
}

impl Default for LedgerMeta {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: LEDGER_VERSION,
            created_at: now,
            last_updated: now,
        }
    }
}

/// The whole ledger file. Portfolios are keyed by id in memory and written
/// as an array; any other top-level collection is carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default)]
    pub meta: LedgerMeta,
    #[serde(default, with = "portfolio_seq")]
    pub portfolios: BTreeMap<String, Portfolio>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub records: usize,
}

impl LedgerDocument {
    pub fn portfolio(&self, id: &str) -> Result<&Portfolio, AppError> {
        self.portfolios
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Portfolio '{}' not found", id)))
    }

    pub fn portfolio_mut(&mut self, id: &str) -> Result<&mut Portfolio, AppError> {
        self.portfolios
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Portfolio '{}' not found", id)))
    }

    /// Named top-level collections with their record counts.
    pub fn collections(&self) -> Vec<CollectionInfo> {
        let mut out = vec![CollectionInfo {
            name: "portfolios".to_string(),
            records: self.portfolios.len(),
        }];
        for (name, value) in &self.extra {
            if let Value::Array(items) = value {
                out.push(CollectionInfo {
                    name: name.clone(),
                    records: items.len(),
                });
            }
        }
        out
    }

    /// Every distinct ticker held across all portfolios, sorted.
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self
            .portfolios
            .values()
            .flat_map(|p| p.holdings.iter().map(|h| h.ticker.clone()))
            .collect();
        tickers.sort();
        tickers.dedup();
        tickers
    }

    /// Checks the derived-field invariants of every portfolio.
    pub fn validate(&self) -> Result<(), AppError> {
        for (key, portfolio) in &self.portfolios {
            if key != &portfolio.id {
                return Err(AppError::InvariantViolation(format!(
                    "portfolio stored under '{}' has id '{}'",
                    key, portfolio.id
                )));
            }
            portfolio.check_derived()?;
        }
        Ok(())
    }
}

mod portfolio_seq {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::models::Portfolio;

    pub fn serialize<S: Serializer>(book: &BTreeMap<String, Portfolio>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(book.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, Portfolio>, D::Error> {
        let list = Vec::<Portfolio>::deserialize(d)?;
        let mut book = BTreeMap::new();
        for portfolio in list {
            let id = portfolio.id.clone();
            if book.insert(id.clone(), portfolio).is_some() {
                return Err(D::Error::custom(format!("duplicate portfolio id '{}'", id)));
            }
        }
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_collections_survive_round_trip() {
        let raw = r#"{
            "meta": {"version": 1, "created_at": "2025-01-01T00:00:00Z", "last_updated": "2025-01-01T00:00:00Z"},
            "portfolios": [{"id": "core", "name": "Core"}],
            "proclamations": [{"title": "dawn"}, {"title": "dusk"}]
        }"#;
        let doc: LedgerDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.portfolios.len(), 1);

        let collections = doc.collections();
        assert!(collections.contains(&CollectionInfo { name: "proclamations".into(), records: 2 }));

        let written = serde_json::to_value(&doc).unwrap();
        assert_eq!(written["proclamations"][1]["title"], "dusk");
        assert!(written["portfolios"].is_array());
    }

    #[test]
    fn duplicate_portfolio_ids_are_rejected() {
        let raw = r#"{"portfolios": [{"id": "a", "name": "A"}, {"id": "a", "name": "B"}]}"#;
        let err = serde_json::from_str::<LedgerDocument>(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate portfolio id"));
    }

    #[test]
    fn validate_flags_stale_value() {
        let raw = r#"{"portfolios": [{
            "id": "a", "name": "A", "total_value": 100.0,
            "holdings": [{"ticker": "X", "shares": 1, "price": 50.0, "purchase_price": 50.0, "value": 100.0, "weight": 100.0}]
        }]}"#;
        let doc: LedgerDocument = serde_json::from_str(raw).unwrap();
        assert!(matches!(doc.validate(), Err(AppError::InvariantViolation(_))));
    }

    #[test]
    fn validate_flags_stale_gain_loss_pct() {
        let raw = r#"{"portfolios": [{
            "id": "a", "name": "A", "total_value": 100.0,
            "holdings": [{"ticker": "X", "shares": 2, "price": 50.0, "purchase_price": 40.0,
                          "value": 100.0, "weight": 100.0, "gain_loss": 20.0, "gain_loss_pct": 50.0}]
        }]}"#;
        let doc: LedgerDocument = serde_json::from_str(raw).unwrap();
        match doc.validate() {
            Err(AppError::InvariantViolation(msg)) => assert!(msg.contains("gain_loss_pct"), "{}", msg),
            other => panic!("expected invariant violation, got {:?}", other),
        }
    }

    #[test]
    fn validate_flags_stale_sector_breakdown_and_performance() {
        let mut portfolio = Portfolio::new("a".into(), "A".into(), Default::default());
        portfolio.holdings.push(crate::models::Holding::new("X".into(), 2.0, 50.0, Some("Energy".into())));
        crate::services::analytics_service::recompute(&mut portfolio);

        let mut doc = LedgerDocument::default();
        doc.portfolios.insert("a".into(), portfolio.clone());
        doc.validate().unwrap();

        let mut stale = portfolio.clone();
        stale.sector_breakdown.clear();
        doc.portfolios.insert("a".into(), stale);
        assert!(matches!(doc.validate(), Err(AppError::InvariantViolation(_))));

        let mut stale = portfolio.clone();
        stale.performance.diversification_score = 99;
        doc.portfolios.insert("a".into(), stale);
        assert!(matches!(doc.validate(), Err(AppError::InvariantViolation(_))));

        let mut stale = portfolio;
        stale.performance.total_cost = 1.0;
        doc.portfolios.insert("a".into(), stale);
        assert!(matches!(doc.validate(), Err(AppError::InvariantViolation(_))));
    }

    #[test]
    fn missing_portfolio_is_not_found() {
        let doc = LedgerDocument::default();
        assert!(matches!(doc.portfolio("nope"), Err(AppError::NotFound(_))));
    }
}
