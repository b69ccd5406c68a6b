//! Order payloads and the byte-level functions attached to pipeline vertices.
//!
//! Every function here works on JSON-encoded [`Order`] or [`Line`] bytes, the
//! format the pipeline passes between vertices.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use stepflow_dag::operation::BoxError;

/// Orders at or above this total take the priority shipping branch.
pub const PRIORITY_THRESHOLD_CENTS: u64 = 10_000;

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Stock keeping unit.
    pub sku: String,
    /// Number of units ordered.
    pub quantity: u32,
    /// Price of a single unit.
    pub unit_cents: u64,
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier.
    pub id: String,
    /// Ordered lines.
    pub lines: Vec<Line>,
    /// Order total, filled in by pricing.
    #[serde(default)]
    pub total_cents: u64,
}

impl Order {
    /// Creates an order with no total yet.
    #[must_use]
    pub fn new(id: impl Into<String>, lines: Vec<Line>) -> Self {
        Self {
            id: id.into(),
            lines,
            total_cents: 0,
        }
    }

    /// Sums the lines.
    #[must_use]
    pub fn line_total(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.quantity) * line.unit_cents)
            .sum()
    }

    /// Encodes the order as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an order from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid order.
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Rejects payloads that are not orders or have no lines.
pub fn check_order(data: &[u8]) -> Result<Vec<u8>, BoxError> {
    let order = Order::from_bytes(data)?;
    if order.lines.is_empty() {
        return Err(format!("order {} has no lines", order.id).into());
    }
    Ok(order.to_bytes()?)
}

/// Fills in the order total.
pub fn price_order(data: &[u8]) -> Result<Vec<u8>, BoxError> {
    let mut order = Order::from_bytes(data)?;
    order.total_cents = order.line_total();
    Ok(order.to_bytes()?)
}

/// Splits an order into one payload per line, keyed by SKU.
///
/// Undecodable input yields no instances.
pub fn split_lines(data: &[u8]) -> HashMap<String, Vec<u8>> {
    let Ok(order) = Order::from_bytes(data) else {
        return HashMap::new();
    };
    order
        .lines
        .iter()
        .filter_map(|line| Some((line.sku.clone(), serde_json::to_vec(line).ok()?)))
        .collect()
}

/// Collects per-line results back into a JSON array ordered by SKU.
pub fn join_lines(parts: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, BoxError> {
    let mut skus: Vec<&String> = parts.keys().collect();
    skus.sort_unstable();
    let lines = skus
        .into_iter()
        .map(|sku| serde_json::from_slice::<Line>(&parts[sku]))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_vec(&lines)?)
}

/// Picks the shipping branch from the order total.
pub fn shipping_route(data: &[u8]) -> Vec<String> {
    let label = match Order::from_bytes(data) {
        Ok(order) if order.total_cents >= PRIORITY_THRESHOLD_CENTS => "priority",
        _ => "standard",
    };
    vec![label.to_string()]
}

/// Forwards only the total of an order, as decimal text.
pub fn total_only(data: &[u8]) -> Vec<u8> {
    Order::from_bytes(data)
        .map(|order| order.total_cents.to_string().into_bytes())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Order {
        Order::new(
            "A-1",
            vec![
                Line {
                    sku: "mug".to_string(),
                    quantity: 2,
                    unit_cents: 1_250,
                },
                Line {
                    sku: "lamp".to_string(),
                    quantity: 1,
                    unit_cents: 8_000,
                },
            ],
        )
    }

    #[test]
    fn pricing_fills_total() {
        let priced = price_order(&sample().to_bytes().unwrap()).unwrap();
        assert_eq!(Order::from_bytes(&priced).unwrap().total_cents, 10_500);
    }

    #[test]
    fn empty_order_is_rejected() {
        let empty = Order::new("A-2", Vec::new()).to_bytes().unwrap();
        let err = check_order(&empty).unwrap_err();
        assert_eq!(err.to_string(), "order A-2 has no lines");
    }

    #[test]
    fn split_and_join_cover_every_line() {
        let parts = split_lines(&sample().to_bytes().unwrap());
        assert_eq!(parts.len(), 2);
        assert!(parts.contains_key("mug"));

        let joined: Vec<Line> = serde_json::from_slice(&join_lines(&parts).unwrap()).unwrap();
        let skus: Vec<&str> = joined.iter().map(|line| line.sku.as_str()).collect();
        assert_eq!(skus, ["lamp", "mug"]);
    }

    #[test]
    fn garbage_splits_into_nothing() {
        assert!(split_lines(b"not json").is_empty());
    }

    #[test]
    fn route_follows_threshold() {
        let mut order = sample();
        order.total_cents = order.line_total();
        assert_eq!(shipping_route(&order.to_bytes().unwrap()), ["priority"]);

        order.total_cents = PRIORITY_THRESHOLD_CENTS - 1;
        assert_eq!(shipping_route(&order.to_bytes().unwrap()), ["standard"]);
    }

    #[test]
    fn total_only_forwards_decimal_total() {
        let mut order = sample();
        order.total_cents = 42;
        assert_eq!(total_only(&order.to_bytes().unwrap()), b"42".to_vec());
    }
}
