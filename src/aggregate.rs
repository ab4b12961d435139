//! Group raw records by categorical dimensions and reduce metric columns.
//!
//! Groups come out in order of first occurrence unless the `GroupSpec` carries a
//! sort key. Only combinations present in the input produce a row.

use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::aggregate::{AggregateRow, MetricValue};
use crate::models::record::{RawRecord, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MetricDef {
    /// Number of rows in the group.
    Count { name: String },
    /// Sum of the non-null numeric values of `column`. A `decimal` sum
    /// starts at a decimal zero, so groups with only nulls still report a
    /// decimal.
    Sum {
        name: String,
        column: String,
        decimal: bool,
    },
    /// Number of rows whose `column` equals `equals`.
    CountWhere {
        name: String,
        column: String,
        equals: Value,
    },
    /// `numerator / denominator` over two earlier metrics; 0 when the
    /// denominator is 0.
    Ratio {
        name: String,
        numerator: String,
        denominator: String,
    },
    /// The group's value of metric `of` as a percentage of its total over
    /// all groups; 0 when the total is 0.
    Share { name: String, of: String },
}

impl MetricDef {
    pub fn count(name: &str) -> Self {
        MetricDef::Count { name: name.into() }
    }

    pub fn sum(name: &str, column: &str) -> Self {
        MetricDef::Sum {
            name: name.into(),
            column: column.into(),
            decimal: false,
        }
    }

    /// Sum over an exact decimal column such as a money amount.
    pub fn sum_decimal(name: &str, column: &str) -> Self {
        MetricDef::Sum {
            name: name.into(),
            column: column.into(),
            decimal: true,
        }
    }

    pub fn count_where(name: &str, column: &str, equals: impl Into<Value>) -> Self {
        MetricDef::CountWhere {
            name: name.into(),
            column: column.into(),
            equals: equals.into(),
        }
    }

    pub fn ratio(name: &str, numerator: &str, denominator: &str) -> Self {
        MetricDef::Ratio {
            name: name.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
        }
    }

    pub fn share(name: &str, of: &str) -> Self {
        MetricDef::Share {
            name: name.into(),
            of: of.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MetricDef::Count { name }
            | MetricDef::Sum { name, .. }
            | MetricDef::CountWhere { name, .. }
            | MetricDef::Ratio { name, .. }
            | MetricDef::Share { name, .. } => name,
        }
    }

    fn initial(&self) -> MetricValue {
        match self {
            MetricDef::Ratio { .. } | MetricDef::Share { .. } => MetricValue::Float(0.0),
            MetricDef::Sum { decimal: true, .. } => MetricValue::Decimal(Decimal::ZERO),
            _ => MetricValue::Int(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Dimension(String),
    Metric(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortKey {
    pub fn dimension(name: &str, order: SortOrder) -> Self {
        Self {
            field: SortField::Dimension(name.into()),
            order,
        }
    }

    pub fn metric(name: &str, order: SortOrder) -> Self {
        Self {
            field: SortField::Metric(name.into()),
            order,
        }
    }
}

/// What to group by, what to compute, and how to order the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSpec {
    pub dimensions: Vec<String>,
    pub metrics: Vec<MetricDef>,
    pub sort: Option<SortKey>,
}

impl GroupSpec {
    pub fn by(dimensions: &[&str]) -> Self {
        Self {
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            metrics: Vec::new(),
            sort: None,
        }
    }

    pub fn metric(mut self, metric: MetricDef) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort = Some(key);
        self
    }

    fn metric_index(&self, name: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m.name() == name)
    }
}

struct Group {
    key: Vec<Value>,
    values: Vec<MetricValue>,
}

/// Group `records` per `spec`. Pure: the same input always yields the same
/// rows. An empty input yields no rows.
pub fn aggregate(records: &[RawRecord], spec: &GroupSpec) -> Vec<AggregateRow> {
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for record in records {
        let key: Vec<Value> = spec
            .dimensions
            .iter()
            .map(|d| record.get(d).clone())
            .collect();

        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                groups.push(Group {
                    key: key.clone(),
                    values: spec.metrics.iter().map(MetricDef::initial).collect(),
                });
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };

        let group = &mut groups[slot];
        for (i, metric) in spec.metrics.iter().enumerate() {
            accumulate(&mut group.values[i], metric, record);
        }
    }

    derive(&mut groups, spec);

    if let Some(sort) = &spec.sort {
        sort_groups(&mut groups, spec, sort);
    }

    tracing::trace!(
        records = records.len(),
        groups = groups.len(),
        "aggregated report rows"
    );

    groups
        .into_iter()
        .map(|g| AggregateRow {
            dimensions: spec.dimensions.iter().cloned().zip(g.key).collect(),
            metrics: spec
                .metrics
                .iter()
                .map(|m| m.name().to_string())
                .zip(g.values)
                .collect(),
        })
        .collect()
}

fn accumulate(slot: &mut MetricValue, metric: &MetricDef, record: &RawRecord) {
    match metric {
        MetricDef::Count { .. } => *slot = slot.add(MetricValue::Int(1)),
        MetricDef::Sum { column, .. } => match record.get(column) {
            Value::Int(n) => *slot = slot.add(MetricValue::Int(*n)),
            Value::Decimal(d) => *slot = slot.add(MetricValue::Decimal(*d)),
            Value::Null | Value::Text(_) => {}
        },
        MetricDef::CountWhere { column, equals, .. } => {
            if record.get(column) == equals {
                *slot = slot.add(MetricValue::Int(1));
            }
        }
        MetricDef::Ratio { .. } | MetricDef::Share { .. } => {}
    }
}

/// Fill ratio and share metrics once all base metrics are reduced.
/// Metrics are derived in definition order, so a derived metric may build
/// on an earlier one.
fn derive(groups: &mut [Group], spec: &GroupSpec) {
    for (i, metric) in spec.metrics.iter().enumerate() {
        match metric {
            MetricDef::Ratio {
                numerator,
                denominator,
                ..
            } => {
                let (Some(n), Some(d)) = (spec.metric_index(numerator), spec.metric_index(denominator))
                else {
                    tracing::warn!(metric = metric.name(), "ratio references an unknown metric");
                    continue;
                };
                for group in groups.iter_mut() {
                    group.values[i] = ratio(group.values[n], group.values[d]);
                }
            }
            MetricDef::Share { of, .. } => {
                let Some(src) = spec.metric_index(of) else {
                    tracing::warn!(metric = metric.name(), "share references an unknown metric");
                    continue;
                };
                let total: f64 = groups.iter().map(|g| g.values[src].as_f64()).sum();
                for group in groups.iter_mut() {
                    group.values[i] = if total == 0.0 {
                        MetricValue::Float(0.0)
                    } else {
                        MetricValue::Float(group.values[src].as_f64() / total * 100.0)
                    };
                }
            }
            _ => {}
        }
    }
}

fn ratio(numerator: MetricValue, denominator: MetricValue) -> MetricValue {
    if denominator.is_zero() {
        return MetricValue::Float(0.0);
    }
    let value = numerator.as_f64() / denominator.as_f64();
    MetricValue::Float(if value.is_finite() { value } else { 0.0 })
}

fn sort_groups(groups: &mut [Group], spec: &GroupSpec, sort: &SortKey) {
    let compare: Box<dyn Fn(&Group, &Group) -> Ordering> = match &sort.field {
        SortField::Dimension(name) => {
            let Some(pos) = spec.dimensions.iter().position(|d| d == name) else {
                tracing::warn!(dimension = %name, "sort key is not a grouping dimension");
                return;
            };
            Box::new(move |a, b| a.key[pos].cmp(&b.key[pos]))
        }
        SortField::Metric(name) => {
            let Some(pos) = spec.metric_index(name) else {
                tracing::warn!(metric = %name, "sort key is not a metric");
                return;
            };
            Box::new(move |a, b| a.values[pos].total_cmp(&b.values[pos]))
        }
    };

    match sort.order {
        SortOrder::Asc => groups.sort_by(|a, b| compare(a, b)),
        SortOrder::Desc => groups.sort_by(|a, b| compare(b, a)),
    }
}
