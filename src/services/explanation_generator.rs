use crate::error::Result;
use crate::models::{as_number, SearchResultItem};
use crate::services::llm::CompletionModel;
use crate::services::refinement::PriceBounds;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

pub const NO_PRODUCTS_MESSAGE: &str = "No products found matching your criteria.";

/// Metadata keys that are search machinery rather than product data; never
/// part of field discovery.
const INTERNAL_FIELDS: [&str; 4] = ["id", "score", "score_type", "content"];

enum Variant {
    Llm(Arc<dyn CompletionModel>),
    Deterministic,
}

/// Produces the natural-language justification for a recommendation set.
/// The variant is fixed at construction: either a completion-service call
/// over the top candidates, or a pure function of the candidate data with no
/// external call at all (reproducible, cannot hallucinate).
pub struct ExplanationGenerator {
    variant: Variant,
    top_n: usize,
}

impl ExplanationGenerator {
    pub fn llm(model: Arc<dyn CompletionModel>, top_n: usize) -> Self {
        Self {
            variant: Variant::Llm(model),
            top_n,
        }
    }

    pub fn deterministic(top_n: usize) -> Self {
        Self {
            variant: Variant::Deterministic,
            top_n,
        }
    }

    /// Empty candidate sets short-circuit to a fixed message before any
    /// service call is made.
    pub async fn explain(
        &self,
        query: &str,
        recommendations: &[SearchResultItem],
    ) -> Result<String> {
        if recommendations.is_empty() {
            return Ok(NO_PRODUCTS_MESSAGE.to_string());
        }

        match &self.variant {
            Variant::Llm(model) => {
                let prompt = build_prompt(query, recommendations, self.top_n);
                debug!("Requesting LLM explanation for {} products", recommendations.len());
                model.complete(&prompt).await
            }
            Variant::Deterministic => Ok(deterministic_explanation(
                query,
                recommendations,
                self.top_n,
            )),
        }
    }
}

fn build_prompt(query: &str, recommendations: &[SearchResultItem], top_n: usize) -> String {
    let products_text = recommendations
        .iter()
        .take(top_n)
        .map(|item| {
            let name = display_name(item).unwrap_or_else(|| "product".to_string());
            format!("- {} (${})", name, item.price())
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "User asked: \"{query}\"\n\nTop products:\n{products_text}\n\n\
         Explain in 2 sentences why these match the user's needs."
    )
}

/// Semantic role of a metadata field, assigned by key-name substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldRole {
    Price,
    Rating,
    Category,
    UseCase,
}

impl FieldRole {
    fn classify(key: &str) -> Option<Self> {
        let key = key.to_lowercase();
        if key.contains("price") {
            Some(Self::Price)
        } else if key.contains("rating") || key.contains("score") || key.contains("quality") {
            Some(Self::Rating)
        } else if key.contains("categor") || key.contains("type") || key.contains("kind") {
            Some(Self::Category)
        } else if key.contains("use") || key.contains("purpose") || key.contains("for") {
            Some(Self::UseCase)
        } else {
            None
        }
    }
}

struct FieldInfo {
    numeric: bool,
    role: Option<FieldRole>,
}

/// Discover what fields exist across the sampled items, without assuming a
/// catalog schema. Keyed by a `BTreeMap`, so downstream selection of "the
/// first field with role X" is lexicographic and therefore stable.
fn discover_fields(items: &[SearchResultItem]) -> BTreeMap<String, FieldInfo> {
    let mut discovered = BTreeMap::new();

    for item in items {
        for (key, _) in &item.fields {
            if INTERNAL_FIELDS.contains(&key.as_str()) || discovered.contains_key(key) {
                continue;
            }

            let samples: Vec<&Value> = items
                .iter()
                .filter_map(|it| it.field(key))
                .filter(|v| !v.is_null())
                .take(3)
                .collect();
            if samples.is_empty() {
                continue;
            }

            let numeric = samples.iter().all(|v| as_number(v).is_some());
            discovered.insert(
                key.clone(),
                FieldInfo {
                    numeric,
                    role: FieldRole::classify(key),
                },
            );
        }
    }

    discovered
}

fn first_key_with_role<'a>(
    fields: &'a BTreeMap<String, FieldInfo>,
    role: FieldRole,
) -> Option<(&'a str, &'a FieldInfo)> {
    fields
        .iter()
        .find(|(_, info)| info.role == Some(role))
        .map(|(key, info)| (key.as_str(), info))
}

fn numeric_values(items: &[SearchResultItem], key: &str) -> Vec<f64> {
    items.iter().filter_map(|it| it.numeric_field(key)).collect()
}

fn text_values(items: &[SearchResultItem], key: &str) -> Vec<String> {
    items
        .iter()
        .filter_map(|it| it.field(key))
        .filter_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Distinct values in first-seen order, the documented tie-break for
/// enumerating clause contents.
fn distinct(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

fn field_label(key: &str) -> String {
    key.replace('_', " ").to_lowercase()
}

/// Build an explanation purely from aggregate statistics of the candidate
/// set. Statistics are computed over the top `top_n` items; the count
/// sentence reports the full set. A result that reduces to the count
/// sentence alone is a valid final explanation.
pub fn deterministic_explanation(
    query: &str,
    recommendations: &[SearchResultItem],
    top_n: usize,
) -> String {
    if recommendations.is_empty() {
        return NO_PRODUCTS_MESSAGE.to_string();
    }

    let top = &recommendations[..recommendations.len().min(top_n)];
    let fields = discover_fields(top);

    let mut parts = vec![format!(
        "Found {} products matching your search.",
        recommendations.len()
    )];

    parts.extend(price_clause(query, top, &fields));
    parts.extend(rating_clause(top, &fields));
    parts.extend(category_clause(top, &fields));
    parts.extend(use_case_clause(top, &fields));
    parts.extend(top_pick_clause(top));

    parts.join(" ")
}

fn price_clause(
    query: &str,
    top: &[SearchResultItem],
    fields: &BTreeMap<String, FieldInfo>,
) -> Option<String> {
    let (key, info) = first_key_with_role(fields, FieldRole::Price)?;
    if !info.numeric {
        return None;
    }
    let prices = numeric_values(top, key);
    if prices.is_empty() {
        return None;
    }

    let average = prices.iter().sum::<f64>() / prices.len() as f64;
    match PriceBounds::from_query(&query.to_lowercase()).ceiling() {
        Some(ceiling) => Some(format!(
            "All products are priced under ${:.0} (average: ${:.1}).",
            ceiling, average
        )),
        None => Some(format!("Average price: ${:.1}.", average)),
    }
}

fn rating_clause(
    top: &[SearchResultItem],
    fields: &BTreeMap<String, FieldInfo>,
) -> Option<String> {
    let (key, _) = first_key_with_role(fields, FieldRole::Rating)?;
    let ratings = numeric_values(top, key);
    if ratings.is_empty() {
        return None;
    }

    let average = ratings.iter().sum::<f64>() / ratings.len() as f64;
    let label = field_label(key);
    if average >= 4.5 {
        Some(format!("Excellent {} (average {:.1}).", label, average))
    } else if average >= 4.0 {
        Some(format!("Good {} (average {:.1}).", label, average))
    } else {
        None
    }
}

fn category_clause(
    top: &[SearchResultItem],
    fields: &BTreeMap<String, FieldInfo>,
) -> Option<String> {
    let (key, _) = first_key_with_role(fields, FieldRole::Category)?;
    let values = distinct(text_values(top, key));

    match values.len() {
        0 => None,
        1 => Some(format!(
            "All products are {} {}.",
            values[0],
            field_label(key)
        )),
        2 | 3 => Some(format!("Products include: {}.", values.join(", "))),
        _ => None,
    }
}

fn use_case_clause(
    top: &[SearchResultItem],
    fields: &BTreeMap<String, FieldInfo>,
) -> Option<String> {
    let (key, _) = first_key_with_role(fields, FieldRole::UseCase)?;
    let values = distinct(text_values(top, key));
    if values.is_empty() {
        return None;
    }

    let listed: Vec<String> = values.into_iter().take(2).collect();
    Some(format!("Suitable for: {}.", listed.join(", ")))
}

fn top_pick_clause(top: &[SearchResultItem]) -> Option<String> {
    let first = top.first()?;
    let name = display_name(first)?;
    let price = first.price();
    if price > 0.0 {
        Some(format!("Top recommendation: {} at ${:.2}.", name, price))
    } else {
        Some(format!("Top recommendation: {}.", name))
    }
}

/// The item's `name` field, falling back to the lexicographically first
/// textual field that is not an identifier or a number-bearing key.
fn display_name(item: &SearchResultItem) -> Option<String> {
    if let Some(Value::String(name)) = item.field("name") {
        return Some(name.clone());
    }

    item.fields
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "id" | "price" | "rating" | "score"))
        .find_map(|(_, value)| value.as_str().map(str::to_string))
}
