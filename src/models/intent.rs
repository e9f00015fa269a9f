use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of shopping request the query expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Search,
    Gift,
    Comparison,
    SpecificNeed,
}

/// Price bounds extracted from the query. Missing bounds are open:
/// `min` defaults to 0 and `max` to +infinity when applied.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn contains(&self, price: f64) -> bool {
        let min = self.min.unwrap_or(0.0);
        let max = self.max.unwrap_or(f64::INFINITY);
        min <= price && price <= max
    }
}

/// Structured extraction of what the user is looking for. Created once per
/// query by the intent analyzer and never mutated afterwards; absent entirely
/// when the reduced pipeline is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub intent: IntentKind,
    pub product: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price_range: Option<PriceRange>,
    #[serde(default)]
    pub attributes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub use_case: Option<String>,
}

impl Intent {
    /// The text handed to similarity search: the extracted product, plus the
    /// use case when one was identified.
    pub fn search_query(&self) -> String {
        match &self.use_case {
            Some(use_case) => format!("{} {}", self.product, use_case),
            None => self.product.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_range_defaults_are_open_bounds() {
        let upper_only = PriceRange {
            min: None,
            max: Some(100.0),
        };
        assert!(upper_only.contains(0.0));
        assert!(upper_only.contains(100.0));
        assert!(!upper_only.contains(100.01));

        let lower_only = PriceRange {
            min: Some(50.0),
            max: None,
        };
        assert!(lower_only.contains(50.0));
        assert!(lower_only.contains(1_000_000.0));
        assert!(!lower_only.contains(49.99));
    }

    #[test]
    fn search_query_appends_use_case() {
        let intent = Intent {
            intent: IntentKind::Search,
            product: "running shoes".to_string(),
            category: None,
            price_range: None,
            attributes: None,
            use_case: Some("marathon training".to_string()),
        };
        assert_eq!(intent.search_query(), "running shoes marathon training");
    }

    #[test]
    fn intent_deserializes_from_llm_json() {
        let raw = r#"{
            "intent": "gift",
            "product": "coffee maker",
            "category": "Kitchen",
            "price_range": {"min": null, "max": 150},
            "use_case": "birthday present"
        }"#;

        let intent: Intent = serde_json::from_str(raw).unwrap();
        assert_eq!(intent.intent, IntentKind::Gift);
        assert_eq!(intent.price_range.unwrap().max, Some(150.0));
        assert!(intent.attributes.is_none());
    }
}
