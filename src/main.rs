use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use minirel::buffer::{clocksweep::ClockSweepManager, manager::BufferPoolManager};
use minirel::catalog::Catalog;
use minirel::config::Config;
use minirel::execution::{
    aggregate::{AggOp, Aggregate},
    filter::Filter,
    insert::Insert,
    join::Join,
    operator::collect,
    predicate::{JoinPredicate, Predicate},
    seq_scan::SeqScan,
    tuple_iter::TupleIterator,
    OpIterator,
};
use minirel::storage::{entity::TransactionId, heap::HeapFile};
use minirel::tuple::{
    desc::TupleDesc,
    field::{CmpOp, Field, Type},
    Tuple,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // config
    let config = Config::default();
    let catalog = Rc::new(Catalog::new());
    let mut bufmgr = ClockSweepManager::new(Rc::clone(&catalog), config.pool_size);

    let emp_desc = TupleDesc::named([
        (Type::Int, "id"),
        (Type::Str, "name"),
        (Type::Int, "dept"),
        (Type::Int, "salary"),
    ])?;
    let dept_desc = TupleDesc::named([(Type::Int, "id"), (Type::Str, "name")])?;
    let emp = Rc::new(HeapFile::open("sample-emp.dat", emp_desc, config.page_size)?);
    let dept = Rc::new(HeapFile::open("sample-dept.dat", dept_desc, config.page_size)?);
    let emp_id = catalog.add_table(Rc::clone(&emp), "emp", Some("id"));
    let dept_id = catalog.add_table(Rc::clone(&dept), "dept", Some("id"));

    // init db
    let tid = TransactionId::new();
    let emp_rows = [
        (1, "Alice", 10, 5200),
        (2, "Bob", 20, 4100),
        (3, "Charlie", 10, 6100),
        (4, "Dave", 30, 3900),
        (5, "Eve", 20, 4700),
    ];
    let emp_tuples = emp_rows
        .iter()
        .map(|&(id, name, dept, salary)| {
            Tuple::new(
                Arc::clone(emp.desc()),
                vec![
                    Field::Int(id),
                    Field::Str(name.to_owned()),
                    Field::Int(dept),
                    Field::Int(salary),
                ],
            )
        })
        .collect();
    let source = TupleIterator::new(Arc::clone(emp.desc()), emp_tuples);
    let mut insert = Insert::new(tid, &catalog, Box::new(source), emp_id)?;
    insert.open(&mut bufmgr)?;
    for t in collect(&mut insert, &mut bufmgr)? {
        println!("inserted into emp: {}", t);
    }
    for (id, name) in [(10, "Engineering"), (20, "Sales"), (30, "Support")] {
        let t = Tuple::new(
            Arc::clone(dept.desc()),
            vec![Field::Int(id), Field::Str(name.to_owned())],
        );
        bufmgr.insert_tuple(tid, dept_id, t)?;
    }
    bufmgr.flush()?;

    // query: employees earning more than 4500, with their department
    let scan_emp = SeqScan::new(tid, &catalog, emp_id, Some("e"))?;
    let filter = Filter::new(
        Predicate::new(3, CmpOp::GreaterThan, Field::Int(4500)),
        Box::new(scan_emp),
    );
    let scan_dept = SeqScan::new(tid, &catalog, dept_id, Some("d"))?;
    let mut join = Join::new(
        JoinPredicate::new(2, CmpOp::Equals, 0),
        Box::new(filter),
        Box::new(scan_dept),
    )?;
    println!("{}", join.tuple_desc());
    join.open(&mut bufmgr)?;
    for t in collect(&mut join, &mut bufmgr)? {
        println!("{}", t);
    }
    join.close();

    // query: average salary per department
    let scan_emp = SeqScan::with_table_name(tid, &catalog, emp_id)?;
    let mut avg = Aggregate::new(Box::new(scan_emp), 3, Some(2), AggOp::Avg)?;
    println!("{}", avg.tuple_desc());
    avg.open(&mut bufmgr)?;
    for t in collect(&mut avg, &mut bufmgr)? {
        println!("{}", t);
    }
    avg.close();

    catalog.save_schema("sample-catalog.bin")?;
    Ok(())
}
