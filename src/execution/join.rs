use std::sync::Arc;

use super::operator::{BoxOpIterator, Lookahead, Operator, Result};
use super::predicate::JoinPredicate;
use crate::buffer::manager::BufferPoolManager;
use crate::tuple::{desc::TupleDesc, Tuple};

/// Nested-loop join.
///
/// The left child is the outer loop: each left tuple is paired with every
/// right tuple, and the right child is rewound whenever it runs out. Output
/// tuples carry all left fields followed by all right fields.
pub struct Join {
    predicate: JoinPredicate,
    left: BoxOpIterator,
    right: BoxOpIterator,
    desc: Arc<TupleDesc>,
    // set on open and rewind
    any_child_empty: bool,
    current_left: Option<Tuple>,
    lookahead: Lookahead,
}

impl Join {
    pub fn new(predicate: JoinPredicate, left: BoxOpIterator, right: BoxOpIterator) -> Result<Self> {
        let desc = TupleDesc::merge(left.tuple_desc(), right.tuple_desc())?;
        Ok(Self {
            predicate,
            left,
            right,
            desc: Arc::new(desc),
            any_child_empty: false,
            current_left: None,
            lookahead: Lookahead::default(),
        })
    }

    pub fn join_predicate(&self) -> &JoinPredicate {
        &self.predicate
    }

    /// Name of the left join column.
    pub fn join_field1_name(&self) -> Result<Option<&str>> {
        Ok(self.left.tuple_desc().field_name(self.predicate.field1)?)
    }

    /// Name of the right join column.
    pub fn join_field2_name(&self) -> Result<Option<&str>> {
        Ok(self.right.tuple_desc().field_name(self.predicate.field2)?)
    }

    pub fn children(&self) -> [&BoxOpIterator; 2] {
        [&self.left, &self.right]
    }

    /// Replaces both children. The output desc is recomputed.
    pub fn set_children(&mut self, left: BoxOpIterator, right: BoxOpIterator) -> Result<()> {
        self.desc = Arc::new(TupleDesc::merge(left.tuple_desc(), right.tuple_desc())?);
        self.left = left;
        self.right = right;
        Ok(())
    }

    fn reset_cursor(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.current_left = None;
        self.any_child_empty = !(self.left.has_next(bufmgr)? && self.right.has_next(bufmgr)?);
        Ok(())
    }

    // Next (left, right) candidate, advancing the outer loop as needed.
    fn next_pair(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Option<(Tuple, Tuple)>> {
        if self.any_child_empty {
            return Ok(None);
        }
        let left = match self.current_left.take() {
            Some(left) => left,
            None => {
                if !self.left.has_next(bufmgr)? {
                    return Ok(None);
                }
                self.left.next(bufmgr)?
            }
        };
        let left = if self.right.has_next(bufmgr)? {
            left
        } else {
            if !self.left.has_next(bufmgr)? {
                return Ok(None);
            }
            self.right.rewind(bufmgr)?;
            self.left.next(bufmgr)?
        };
        let right = self.right.next(bufmgr)?;
        self.current_left = Some(left.clone());
        Ok(Some((left, right)))
    }
}

impl Operator for Join {
    fn lookahead(&mut self) -> &mut Lookahead {
        &mut self.lookahead
    }

    fn open_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.left.open(bufmgr)?;
        self.right.open(bufmgr)?;
        self.reset_cursor(bufmgr)
    }

    fn close_operator(&mut self) {
        self.left.close();
        self.right.close();
        self.current_left = None;
        self.any_child_empty = false;
    }

    fn rewind_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.left.rewind(bufmgr)?;
        self.right.rewind(bufmgr)?;
        self.reset_cursor(bufmgr)
    }

    fn fetch_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Option<Tuple>> {
        while let Some((left, right)) = self.next_pair(bufmgr)? {
            if self.predicate.filter(&left, &right) {
                return Ok(Some(Tuple::merge(Arc::clone(&self.desc), &left, &right)));
            }
        }
        Ok(None)
    }

    fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::execution::error::Error;
    use crate::execution::operator::{collect, OpIterator};
    use crate::execution::tuple_iter::TupleIterator;
    use crate::testutil::{int_desc, int_tuple, values, TestDb};
    use crate::tuple::desc;
    use crate::tuple::field::{CmpOp, Type};

    fn source(names: &[&str], rows: &[Vec<i32>]) -> BoxOpIterator {
        let desc = Arc::new(int_desc(names));
        let tuples = rows.iter().map(|r| int_tuple(&desc, r)).collect();
        Box::new(TupleIterator::new(desc, tuples))
    }

    fn run(join: &mut Join, db: &mut TestDb) -> Vec<Vec<i32>> {
        join.open(&mut db.bufmgr).unwrap();
        values(&collect(join, &mut db.bufmgr).unwrap())
    }

    #[test]
    fn equi_join_pairs_every_match() {
        let mut db = TestDb::new(Config::default());
        let left = source(&["a", "b"], &[vec![1, 10], vec![2, 20], vec![3, 30]]);
        let right = source(&["c", "d"], &[vec![2, 200], vec![1, 100], vec![2, 201]]);
        let mut join = Join::new(JoinPredicate::new(0, CmpOp::Equals, 0), left, right).unwrap();
        assert_eq!(
            run(&mut join, &mut db),
            vec![
                vec![1, 10, 1, 100],
                vec![2, 20, 2, 200],
                vec![2, 20, 2, 201],
            ]
        );
        assert_eq!(join.tuple_desc().num_fields(), 4);
        assert_eq!(join.tuple_desc().field_name(2).unwrap(), Some("c"));
    }

    #[test]
    fn cross_product_is_complete() {
        let mut db = TestDb::new(Config::default());
        let left_rows: Vec<Vec<i32>> = (0..4).map(|i| vec![i, 0]).collect();
        let right_rows: Vec<Vec<i32>> = (0..5).map(|i| vec![i, 0]).collect();
        let mut join = Join::new(
            JoinPredicate::new(1, CmpOp::Equals, 1),
            source(&["a", "b"], &left_rows),
            source(&["c", "d"], &right_rows),
        )
        .unwrap();
        let out = run(&mut join, &mut db);
        assert_eq!(out.len(), 20);
        for l in 0..4 {
            for r in 0..5 {
                assert_eq!(out.iter().filter(|t| t[0] == l && t[2] == r).count(), 1);
            }
        }
    }

    #[test]
    fn empty_side_yields_nothing() {
        let mut db = TestDb::new(Config::default());
        let rows = vec![vec![1, 1], vec![2, 2]];
        let pred = JoinPredicate::new(0, CmpOp::Equals, 0);

        let mut join = Join::new(pred, source(&["a", "b"], &[]), source(&["c", "d"], &rows)).unwrap();
        assert!(run(&mut join, &mut db).is_empty());
        let mut join = Join::new(pred, source(&["a", "b"], &rows), source(&["c", "d"], &[])).unwrap();
        assert!(run(&mut join, &mut db).is_empty());
        assert!(matches!(join.next(&mut db.bufmgr), Err(Error::NoSuchElement)));
    }

    #[test]
    fn rewind_replays_from_start() {
        let mut db = TestDb::new(Config::default());
        let mut join = Join::new(
            JoinPredicate::new(0, CmpOp::LessThan, 0),
            source(&["a", "b"], &[vec![1, 0], vec![2, 0]]),
            source(&["c", "d"], &[vec![2, 0], vec![3, 0]]),
        )
        .unwrap();
        let first = run(&mut join, &mut db);
        assert_eq!(first.len(), 3);

        join.rewind(&mut db.bufmgr).unwrap();
        let partial = join.next(&mut db.bufmgr).unwrap();
        assert_eq!(partial.fields()[0].as_int(), Some(1));
        join.rewind(&mut db.bufmgr).unwrap();
        assert_eq!(values(&collect(&mut join, &mut db.bufmgr).unwrap()), first);
    }

    #[test]
    fn field_names_come_from_each_side() {
        let join = Join::new(
            JoinPredicate::new(1, CmpOp::Equals, 0),
            source(&["a", "b"], &[]),
            source(&["c", "d"], &[]),
        )
        .unwrap();
        assert_eq!(join.join_field1_name().unwrap(), Some("b"));
        assert_eq!(join.join_field2_name().unwrap(), Some("c"));
        assert_eq!(join.join_predicate().op, CmpOp::Equals);
    }

    #[test]
    fn anonymous_child_cannot_be_joined() {
        let anon = Arc::new(TupleDesc::anonymous(vec![Type::Int]).unwrap());
        let left: BoxOpIterator = Box::new(TupleIterator::new(anon, vec![]));
        let res = Join::new(
            JoinPredicate::new(0, CmpOp::Equals, 0),
            left,
            source(&["c"], &[]),
        );
        assert!(matches!(
            res,
            Err(Error::Desc(desc::Error::MissingFieldNames))
        ));
    }

    #[test]
    fn set_children_recomputes_desc() {
        let mut join = Join::new(
            JoinPredicate::new(0, CmpOp::Equals, 0),
            source(&["a"], &[]),
            source(&["b"], &[]),
        )
        .unwrap();
        join.set_children(source(&["x", "y"], &[]), source(&["z"], &[]))
            .unwrap();
        assert_eq!(join.tuple_desc().num_fields(), 3);
        assert_eq!(join.children().len(), 2);
    }
}
