//! Grouped aggregation.
//!
//! Aggregators fold tuples into per-group running statistics and can be fed
//! from several threads at once. Their results are read through an
//! [`AggregateIter`], which snapshots the groups when it is opened.
//! [`Aggregate`] wires an aggregator to a child operator.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::vec;

use parking_lot::RwLock;

use super::error::Error;
use super::operator::{BoxOpIterator, Lookahead, OpIterator, Operator, Result};
use crate::buffer::manager::BufferPoolManager;
use crate::tuple::{
    desc::{self, TupleDesc},
    field::{Field, Type},
    Tuple,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
            AggOp::Count => "count",
        };
        f.write_str(s)
    }
}

/// Running statistics of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub count: u64,
    pub sum: i64,
    pub min: i32,
    pub max: i32,
}

impl Default for Stat {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: i32::MAX,
            max: i32::MIN,
        }
    }
}

impl Stat {
    fn update(&mut self, value: i32) {
        self.count += 1;
        self.sum += i64::from(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn update_count(&mut self) {
        self.count += 1;
    }

    /// The value of `op` over this group. AVG truncates toward zero. MIN and
    /// MAX of an empty group are `i32::MAX` and `i32::MIN`.
    pub fn emit(&self, op: AggOp) -> Result<i32> {
        let overflow = |_| Error::AggregateOverflow(op);
        match op {
            AggOp::Count => i32::try_from(self.count).map_err(overflow),
            AggOp::Sum => i32::try_from(self.sum).map_err(overflow),
            AggOp::Min => Ok(self.min),
            AggOp::Max => Ok(self.max),
            AggOp::Avg if self.count == 0 => Err(Error::EmptyAggregate(op)),
            AggOp::Avg => i32::try_from(self.sum / self.count as i64).map_err(overflow),
        }
    }
}

// `None` is the key of the single implicit group.
type Groups = HashMap<Option<Field>, Stat>;

/// State shared by both aggregators.
#[derive(Debug)]
struct GroupedStats {
    group_by: Option<(usize, Type)>,
    afield: usize,
    op: AggOp,
    desc: Arc<TupleDesc>,
    groups: Arc<RwLock<Groups>>,
}

impl GroupedStats {
    fn new(group_by: Option<(usize, Type)>, afield: usize, op: AggOp) -> Result<Self> {
        let types = match group_by {
            Some((_, ty)) => vec![ty, Type::Int],
            None => vec![Type::Int],
        };
        Ok(Self {
            group_by,
            afield,
            op,
            desc: Arc::new(TupleDesc::anonymous(types)?),
            groups: Arc::default(),
        })
    }

    fn group_key(&self, tuple: &Tuple) -> Result<Option<Field>> {
        match self.group_by {
            None => Ok(None),
            Some((i, ty)) => {
                let field = tuple.field(i).ok_or(desc::Error::IndexOutOfRange(i))?;
                if field.field_type() != ty {
                    return Err(Error::SchemaMismatch {
                        expected: ty.to_string(),
                        found: field.field_type().to_string(),
                    });
                }
                Ok(Some(field.clone()))
            }
        }
    }

    fn aggregate_field<'t>(&self, tuple: &'t Tuple) -> Result<&'t Field> {
        Ok(tuple
            .field(self.afield)
            .ok_or(desc::Error::IndexOutOfRange(self.afield))?)
    }

    fn merge(&self, key: Option<Field>, f: impl FnOnce(&mut Stat)) {
        f(self.groups.write().entry(key).or_default());
    }

    fn iterator(&self) -> AggregateIter {
        AggregateIter {
            groups: Arc::clone(&self.groups),
            grouped: self.group_by.is_some(),
            op: self.op,
            desc: Arc::clone(&self.desc),
            state: State::Done,
            lookahead: Lookahead::default(),
        }
    }
}

pub trait Aggregator: Send + Sync {
    /// Folds one tuple into its group.
    fn merge_tuple_into_group(&self, tuple: &Tuple) -> Result<()>;

    /// A closed iterator over the per-group results. Groups are read when
    /// it is opened.
    fn iterator(&self) -> AggregateIter;

    fn op(&self) -> AggOp;

    /// `[INT]` without grouping, `[group type, INT]` with grouping.
    fn result_desc(&self) -> &Arc<TupleDesc>;
}

/// MIN, MAX, SUM, AVG and COUNT over an `INT` field.
#[derive(Debug)]
pub struct IntegerAggregator {
    stats: GroupedStats,
}

impl IntegerAggregator {
    pub fn new(group_by: Option<(usize, Type)>, afield: usize, op: AggOp) -> Result<Self> {
        Ok(Self {
            stats: GroupedStats::new(group_by, afield, op)?,
        })
    }
}

impl Aggregator for IntegerAggregator {
    fn merge_tuple_into_group(&self, tuple: &Tuple) -> Result<()> {
        let key = self.stats.group_key(tuple)?;
        let value = match self.stats.aggregate_field(tuple)? {
            Field::Int(v) => *v,
            other => {
                return Err(Error::SchemaMismatch {
                    expected: Type::Int.to_string(),
                    found: other.field_type().to_string(),
                })
            }
        };
        self.stats.merge(key, |stat| stat.update(value));
        Ok(())
    }

    fn iterator(&self) -> AggregateIter {
        self.stats.iterator()
    }

    fn op(&self) -> AggOp {
        self.stats.op
    }

    fn result_desc(&self) -> &Arc<TupleDesc> {
        &self.stats.desc
    }
}

/// COUNT over a field of any type.
#[derive(Debug)]
pub struct StringAggregator {
    stats: GroupedStats,
}

impl StringAggregator {
    pub fn new(group_by: Option<(usize, Type)>, afield: usize, op: AggOp) -> Result<Self> {
        if op != AggOp::Count {
            return Err(Error::UnsupportedAggregate(op));
        }
        Ok(Self {
            stats: GroupedStats::new(group_by, afield, op)?,
        })
    }
}

impl Aggregator for StringAggregator {
    fn merge_tuple_into_group(&self, tuple: &Tuple) -> Result<()> {
        let key = self.stats.group_key(tuple)?;
        self.stats.aggregate_field(tuple)?;
        self.stats.merge(key, Stat::update_count);
        Ok(())
    }

    fn iterator(&self) -> AggregateIter {
        self.stats.iterator()
    }

    fn op(&self) -> AggOp {
        self.stats.op
    }

    fn result_desc(&self) -> &Arc<TupleDesc> {
        &self.stats.desc
    }
}

#[derive(Debug)]
enum State {
    NotStarted(Snapshot),
    InGroupIteration(vec::IntoIter<(Field, Stat)>),
    SingleEmitted,
    Done,
}

#[derive(Debug)]
enum Snapshot {
    Single(Stat),
    Groups(Vec<(Field, Stat)>),
}

/// Result rows of an aggregator.
///
/// Grouped results come out as `(group, value)` in no particular order; an
/// ungrouped aggregator yields exactly one `(value)` row.
#[derive(Debug)]
pub struct AggregateIter {
    groups: Arc<RwLock<Groups>>,
    grouped: bool,
    op: AggOp,
    desc: Arc<TupleDesc>,
    state: State,
    lookahead: Lookahead,
}

impl AggregateIter {
    fn snapshot(&self) -> Snapshot {
        let groups = self.groups.read();
        if self.grouped {
            let rows = groups
                .iter()
                .filter_map(|(key, stat)| key.clone().map(|key| (key, *stat)))
                .collect();
            Snapshot::Groups(rows)
        } else {
            Snapshot::Single(groups.get(&None).copied().unwrap_or_default())
        }
    }
}

impl Operator for AggregateIter {
    fn lookahead(&mut self) -> &mut Lookahead {
        &mut self.lookahead
    }

    fn open_operator(&mut self, _bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.state = State::NotStarted(self.snapshot());
        Ok(())
    }

    fn close_operator(&mut self) {
        self.state = State::Done;
    }

    fn rewind_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.open_operator(bufmgr)
    }

    fn fetch_next(&mut self, _bufmgr: &mut dyn BufferPoolManager) -> Result<Option<Tuple>> {
        loop {
            match mem::replace(&mut self.state, State::Done) {
                State::NotStarted(Snapshot::Single(stat)) => {
                    self.state = State::SingleEmitted;
                    let value = Field::Int(stat.emit(self.op)?);
                    return Ok(Some(Tuple::new(Arc::clone(&self.desc), vec![value])));
                }
                State::NotStarted(Snapshot::Groups(rows)) => {
                    self.state = State::InGroupIteration(rows.into_iter());
                }
                State::InGroupIteration(mut rows) => {
                    let (key, stat) = match rows.next() {
                        Some(row) => row,
                        None => return Ok(None),
                    };
                    self.state = State::InGroupIteration(rows);
                    let value = Field::Int(stat.emit(self.op)?);
                    return Ok(Some(Tuple::new(Arc::clone(&self.desc), vec![key, value])));
                }
                State::SingleEmitted | State::Done => return Ok(None),
            }
        }
    }

    fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}

/// Aggregates one field of its child, optionally grouped by another.
///
/// The child is drained into a fresh aggregator on `open` and on `rewind`.
/// Output columns are named `groupName` and `op(fieldName)`.
pub struct Aggregate {
    child: BoxOpIterator,
    afield: usize,
    group_by: Option<usize>,
    op: AggOp,
    desc: Arc<TupleDesc>,
    results: Option<AggregateIter>,
    lookahead: Lookahead,
}

impl Aggregate {
    pub fn new(
        child: BoxOpIterator,
        afield: usize,
        group_by: Option<usize>,
        op: AggOp,
    ) -> Result<Self> {
        let desc = Self::output_desc(child.tuple_desc(), afield, group_by, op)?;
        let aggregate = Self {
            child,
            afield,
            group_by,
            op,
            desc: Arc::new(desc),
            results: None,
            lookahead: Lookahead::default(),
        };
        // reject unsupported ops before the first open
        aggregate.aggregator()?;
        Ok(aggregate)
    }

    fn output_desc(
        child: &TupleDesc,
        afield: usize,
        group_by: Option<usize>,
        op: AggOp,
    ) -> Result<TupleDesc> {
        let aname = format!("{}({})", op, child.field_name(afield)?.unwrap_or("null"));
        let mut fields = vec![];
        if let Some(g) = group_by {
            let gname = child.field_name(g)?.unwrap_or("null").to_owned();
            fields.push((child.field_type(g)?, gname));
        }
        fields.push((Type::Int, aname));
        Ok(TupleDesc::named(fields)?)
    }

    fn aggregator(&self) -> Result<Box<dyn Aggregator>> {
        let child = self.child.tuple_desc();
        let group_by = match self.group_by {
            Some(g) => Some((g, child.field_type(g)?)),
            None => None,
        };
        Ok(match child.field_type(self.afield)? {
            Type::Int => Box::new(IntegerAggregator::new(group_by, self.afield, self.op)?),
            Type::Str => Box::new(StringAggregator::new(group_by, self.afield, self.op)?),
        })
    }

    fn aggregate_child(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        let aggregator = self.aggregator()?;
        while self.child.has_next(bufmgr)? {
            aggregator.merge_tuple_into_group(&self.child.next(bufmgr)?)?;
        }
        let mut results = aggregator.iterator();
        results.open(bufmgr)?;
        self.results = Some(results);
        Ok(())
    }

    pub fn aggregate_field(&self) -> usize {
        self.afield
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_by
    }

    pub fn aggregate_op(&self) -> AggOp {
        self.op
    }

    /// Name of the grouping column in the output, if grouped.
    pub fn group_field_name(&self) -> Option<&str> {
        self.group_by
            .and_then(|_| self.desc.field_name(0).ok().flatten())
    }

    /// Name of the aggregated column in the child.
    pub fn aggregate_field_name(&self) -> Result<Option<&str>> {
        Ok(self.child.tuple_desc().field_name(self.afield)?)
    }

    pub fn children(&self) -> [&BoxOpIterator; 1] {
        [&self.child]
    }
}

impl Operator for Aggregate {
    fn lookahead(&mut self) -> &mut Lookahead {
        &mut self.lookahead
    }

    fn open_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.child.open(bufmgr)?;
        self.aggregate_child(bufmgr)
    }

    fn close_operator(&mut self) {
        self.child.close();
        self.results = None;
    }

    fn rewind_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.child.rewind(bufmgr)?;
        self.aggregate_child(bufmgr)
    }

    fn fetch_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Option<Tuple>> {
        let results = self.results.as_mut().ok_or(Error::IllegalState)?;
        if !results.has_next(bufmgr)? {
            return Ok(None);
        }
        let tuple = results.next(bufmgr)?;
        Ok(Some(tuple.with_desc(Arc::clone(&self.desc))))
    }

    fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}
