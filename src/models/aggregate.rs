use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::record::Value;

/// Numeric result of a metric. Counts and integer sums stay exact,
/// decimal sums keep the source column's precision, derived ratios are floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Decimal(Decimal),
    Float(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int(n) => n as f64,
            MetricValue::Decimal(d) => d.to_f64().unwrap_or(0.0),
            MetricValue::Float(f) => f,
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            MetricValue::Int(n) => n == 0,
            MetricValue::Decimal(d) => d.is_zero(),
            MetricValue::Float(f) => f == 0.0,
        }
    }

    /// Addition that widens int + decimal to decimal and anything + float to float.
    pub fn add(self, other: MetricValue) -> MetricValue {
        match (self, other) {
            (MetricValue::Int(a), MetricValue::Int(b)) => MetricValue::Int(a.saturating_add(b)),
            (MetricValue::Decimal(a), MetricValue::Decimal(b)) => {
                MetricValue::Decimal(a.saturating_add(b))
            }
            (MetricValue::Int(a), MetricValue::Decimal(b))
            | (MetricValue::Decimal(b), MetricValue::Int(a)) => {
                MetricValue::Decimal(Decimal::from(a).saturating_add(b))
            }
            (a, b) => MetricValue::Float(a.as_f64() + b.as_f64()),
        }
    }

    pub fn total_cmp(&self, other: &MetricValue) -> Ordering {
        match (self, other) {
            (MetricValue::Int(a), MetricValue::Int(b)) => a.cmp(b),
            (MetricValue::Decimal(a), MetricValue::Decimal(b)) => a.cmp(b),
            _ => self.as_f64().total_cmp(&other.as_f64()),
        }
    }
}

/// One group of the summary table: its dimension values and metric values,
/// both kept in definition order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    #[serde(serialize_with = "ordered_map")]
    pub dimensions: Vec<(String, Value)>,
    #[serde(serialize_with = "ordered_map")]
    pub metrics: Vec<(String, MetricValue)>,
}

impl AggregateRow {
    pub fn dimension(&self, name: &str) -> Option<&Value> {
        self.dimensions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn metric(&self, name: &str) -> Option<MetricValue> {
        self.metrics
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// The grouping key as a tuple of values.
    pub fn key(&self) -> Vec<&Value> {
        self.dimensions.iter().map(|(_, v)| v).collect()
    }
}

#[allow(clippy::ptr_arg)]
fn ordered_map<S, V>(pairs: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (name, value) in pairs {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_add_widens() {
        let d = Decimal::from_str("10.25").unwrap();
        assert_eq!(MetricValue::Int(2).add(MetricValue::Int(3)), MetricValue::Int(5));
        assert_eq!(
            MetricValue::Int(2).add(MetricValue::Decimal(d)),
            MetricValue::Decimal(Decimal::from_str("12.25").unwrap())
        );
        assert_eq!(
            MetricValue::Float(0.5).add(MetricValue::Int(1)),
            MetricValue::Float(1.5)
        );
    }

    #[test]
    fn test_serializes_in_definition_order() {
        let row = AggregateRow {
            dimensions: vec![
                ("status".into(), Value::text("RESUELTO")),
                ("assigned_user".into(), Value::text("jperez")),
            ],
            metrics: vec![("tickets".into(), MetricValue::Int(2))],
        };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"dimensions":{"status":"RESUELTO","assigned_user":"jperez"},"metrics":{"tickets":2}}"#
        );
    }

    #[test]
    fn test_lookup_helpers() {
        let row = AggregateRow {
            dimensions: vec![("gateway".into(), Value::text("stripe"))],
            metrics: vec![("transactions".into(), MetricValue::Int(4))],
        };
        assert_eq!(row.dimension("gateway"), Some(&Value::text("stripe")));
        assert_eq!(row.metric("transactions"), Some(MetricValue::Int(4)));
        assert!(row.metric("amount").is_none());
        assert_eq!(row.key(), vec![&Value::text("stripe")]);
    }
}
