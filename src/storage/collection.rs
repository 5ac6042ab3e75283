use super::query::{AggregateKind, Cond, Condition, Item, OpType, Query, QueryResults};
use crate::core::{CollectionSchema, DbError, Record, Result, RowId, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;

type FieldIndex = BTreeMap<Value, BTreeSet<RowId>>;

/// Rows of one collection plus an ordered index per indexed field.
#[derive(Debug)]
pub struct Collection {
    schema: Arc<CollectionSchema>,
    rows: BTreeMap<RowId, Arc<Record>>,
    next_row_id: RowId,
    /// Keyed by field position in the schema.
    indexes: HashMap<usize, FieldIndex>,
}

/// A filter entry with its field resolved against the schema.
struct ResolvedEntry<'q> {
    op: OpType,
    field_idx: usize,
    condition: &'q Condition,
}

impl ResolvedEntry<'_> {
    fn matches(&self, record: &Record) -> bool {
        self.condition.matches(record.value_at(self.field_idx))
    }
}

impl Collection {
    pub fn new(schema: Arc<CollectionSchema>) -> Self {
        let indexes = schema
            .indexed_fields()
            .map(|(idx, _)| (idx, FieldIndex::new()))
            .collect();
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
            indexes,
        }
    }

    pub fn schema(&self) -> &Arc<CollectionSchema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row_id: RowId) -> Option<Arc<Record>> {
        self.rows.get(&row_id).cloned()
    }

    pub fn find_by_key(&self, key: i64) -> Option<RowId> {
        self.indexes
            .get(&self.schema.primary_key_index())
            .and_then(|index| index.get(&Value::Integer(key)))
            .and_then(|ids| ids.iter().next().copied())
    }

    /// Inserts the record, or replaces the record with the same primary key.
    pub fn upsert(&mut self, record: Record) -> Result<RowId> {
        if record.collection() != self.schema.name() {
            return Err(DbError::ConstraintViolation(format!(
                "Record of '{}' cannot be stored in '{}'",
                record.collection(),
                self.schema.name()
            )));
        }
        for (field, value) in self.schema.fields().iter().zip(record.values()) {
            field.validate(value)?;
        }

        let key = record.id()?;
        let record = Arc::new(record);

        let row_id = match self.find_by_key(key) {
            Some(row_id) => {
                if let Some(old) = self.rows.insert(row_id, Arc::clone(&record)) {
                    self.remove_from_indexes(row_id, &old);
                }
                row_id
            }
            None => {
                let row_id = self.next_row_id;
                self.next_row_id += 1;
                self.rows.insert(row_id, Arc::clone(&record));
                row_id
            }
        };

        self.add_to_indexes(row_id, &record);
        Ok(row_id)
    }

    pub fn select(&self, query: &Query) -> Result<QueryResults> {
        let entries = self.resolve(query)?;

        let matches = |record: &Record| {
            let mut iter = entries.iter();
            let Some(first) = iter.next() else {
                return true;
            };
            iter.fold(first.matches(record), |acc, entry| match entry.op {
                OpType::And => acc && entry.matches(record),
                OpType::Or => acc || entry.matches(record),
            })
        };

        let mut items: Vec<Item> = match self.candidates(&entries) {
            Some(ids) => ids
                .into_iter()
                .filter_map(|row_id| self.rows.get(&row_id).map(|r| (row_id, r)))
                .filter(|(_, record)| matches(record))
                .map(|(row_id, record)| Item {
                    row_id,
                    record: Arc::clone(record),
                })
                .collect(),
            None => self
                .rows
                .iter()
                .filter(|(_, record)| matches(record))
                .map(|(row_id, record)| Item {
                    row_id: *row_id,
                    record: Arc::clone(record),
                })
                .collect(),
        };

        let aggregations = query
            .aggregations()
            .iter()
            .map(|agg| {
                let idx = self.schema.require_field(&agg.field)?;
                let numbers: Vec<f64> = items
                    .iter()
                    .filter_map(|item| item.record.value_at(idx).as_f64())
                    .collect();
                Ok(aggregate(agg.kind, &numbers))
            })
            .collect::<Result<Vec<f64>>>()?;

        if let Some(sort) = query.sort_spec() {
            let idx = self.schema.require_field(&sort.field)?;
            items.sort_by(|a, b| {
                let by_value = a.record.value_at(idx).cmp(b.record.value_at(idx));
                let by_value = if sort.desc { by_value.reverse() } else { by_value };
                match by_value {
                    Ordering::Equal => a.row_id.cmp(&b.row_id),
                    other => other,
                }
            });
        }

        if let Some(limit) = query.limit_value() {
            items.truncate(limit);
        }

        Ok(QueryResults {
            items,
            aggregations,
        })
    }

    fn resolve<'q>(&self, query: &'q Query) -> Result<Vec<ResolvedEntry<'q>>> {
        query
            .entries()
            .iter()
            .map(|entry| {
                let condition = &entry.condition;
                let field_idx = self.schema.require_field(&condition.field)?;
                let field = &self.schema.fields()[field_idx];

                if condition.cond != Cond::Set && condition.values.len() != 1 {
                    return Err(DbError::ConstraintViolation(format!(
                        "Condition on '{}' needs exactly one value",
                        condition.field
                    )));
                }
                for value in &condition.values {
                    field.validate(value)?;
                }

                Ok(ResolvedEntry {
                    op: entry.op,
                    field_idx,
                    condition,
                })
            })
            .collect()
    }

    /// Row ids worth checking, or `None` when only a full scan can answer.
    ///
    /// Pure AND chains narrow through the first indexed entry. Chains with
    /// any OR need every entry indexed; their lookups are unioned.
    fn candidates(&self, entries: &[ResolvedEntry<'_>]) -> Option<BTreeSet<RowId>> {
        let has_or = entries.iter().skip(1).any(|e| e.op == OpType::Or);
        if has_or {
            let mut union = BTreeSet::new();
            for entry in entries {
                union.extend(self.index_lookup(entry)?);
            }
            Some(union)
        } else {
            entries.iter().find_map(|entry| self.index_lookup(entry))
        }
    }

    fn index_lookup(&self, entry: &ResolvedEntry<'_>) -> Option<BTreeSet<RowId>> {
        let index = self.indexes.get(&entry.field_idx)?;
        let condition = entry.condition;
        let ids = match (condition.cond, condition.values.first()) {
            (Cond::Set, _) => condition
                .values
                .iter()
                .filter_map(|value| index.get(value))
                .flatten()
                .copied()
                .collect(),
            (_, None) => BTreeSet::new(),
            (Cond::Eq, Some(v)) => index.get(v).into_iter().flatten().copied().collect(),
            (Cond::Lt, Some(v)) => flatten(index.range((Bound::Unbounded, Bound::Excluded(v)))),
            (Cond::Le, Some(v)) => flatten(index.range((Bound::Unbounded, Bound::Included(v)))),
            (Cond::Gt, Some(v)) => flatten(index.range((Bound::Excluded(v), Bound::Unbounded))),
            (Cond::Ge, Some(v)) => flatten(index.range((Bound::Included(v), Bound::Unbounded))),
        };
        Some(ids)
    }

    fn add_to_indexes(&mut self, row_id: RowId, record: &Record) {
        for (field_idx, index) in &mut self.indexes {
            index
                .entry(record.value_at(*field_idx).clone())
                .or_default()
                .insert(row_id);
        }
    }

    fn remove_from_indexes(&mut self, row_id: RowId, record: &Record) {
        for (field_idx, index) in &mut self.indexes {
            let value = record.value_at(*field_idx);
            if let Some(ids) = index.get_mut(value) {
                ids.remove(&row_id);
                if ids.is_empty() {
                    index.remove(value);
                }
            }
        }
    }
}

fn flatten<'a>(range: impl Iterator<Item = (&'a Value, &'a BTreeSet<RowId>)>) -> BTreeSet<RowId> {
    range.flat_map(|(_, ids)| ids.iter().copied()).collect()
}

/// Empty input yields `0.0` for every kind.
fn aggregate(kind: AggregateKind, numbers: &[f64]) -> f64 {
    match kind {
        AggregateKind::Count => numbers.len() as f64,
        AggregateKind::Sum => numbers.iter().sum(),
        AggregateKind::Avg if numbers.is_empty() => 0.0,
        AggregateKind::Avg => numbers.iter().sum::<f64>() / numbers.len() as f64,
    }
}
