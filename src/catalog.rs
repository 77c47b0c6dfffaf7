//! Table registry: maps names and ids to heap files and their schemas.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{entity::TableId, heap::HeapFile, Error};
use crate::tuple::desc::TupleDesc;

#[derive(Debug)]
struct Table {
    name: String,
    file: Rc<HeapFile>,
    pkey: Option<String>,
}

// One line of a saved schema file.
#[derive(Debug, Serialize, Deserialize)]
struct TableSchema {
    name: String,
    file: PathBuf,
    desc: TupleDesc,
    pkey: Option<String>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    tables: RefCell<HashMap<TableId, Table>>,
    names: RefCell<HashMap<String, TableId>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`. A table already registered under the
    /// same name or the same id is replaced.
    pub fn add_table(&self, file: Rc<HeapFile>, name: &str, pkey: Option<&str>) -> TableId {
        let id = file.id();
        let mut tables = self.tables.borrow_mut();
        let mut names = self.names.borrow_mut();
        if let Some(old_id) = names.remove(name) {
            tables.remove(&old_id);
        }
        if let Some(old) = tables.remove(&id) {
            names.remove(&old.name);
        }
        debug!(table = name, %id, "registered table");
        names.insert(name.to_owned(), id);
        tables.insert(
            id,
            Table {
                name: name.to_owned(),
                file,
                pkey: pkey.map(str::to_owned),
            },
        );
        id
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.names.borrow().get(name).copied()
    }

    pub fn table_name(&self, id: TableId) -> Result<String, Error> {
        self.with_table(id, |t| t.name.clone())
    }

    pub fn tuple_desc(&self, id: TableId) -> Result<Arc<TupleDesc>, Error> {
        self.with_table(id, |t| Arc::clone(t.file.desc()))
    }

    pub fn database_file(&self, id: TableId) -> Result<Rc<HeapFile>, Error> {
        self.with_table(id, |t| Rc::clone(&t.file))
    }

    pub fn primary_key(&self, id: TableId) -> Result<Option<String>, Error> {
        self.with_table(id, |t| t.pkey.clone())
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.tables.borrow().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        self.tables.borrow_mut().clear();
        self.names.borrow_mut().clear();
    }

    fn with_table<T>(&self, id: TableId, f: impl FnOnce(&Table) -> T) -> Result<T, Error> {
        self.tables
            .borrow()
            .get(&id)
            .map(f)
            .ok_or(Error::UnknownTable(id))
    }

    /// Writes every table's name, file, schema and primary key to `path`.
    pub fn save_schema(&self, path: impl AsRef<Path>) -> Result<()> {
        let tables = self.tables.borrow();
        let mut schema: Vec<TableSchema> = tables
            .values()
            .map(|t| TableSchema {
                name: t.name.clone(),
                file: t.file.path().to_owned(),
                desc: (**t.file.desc()).clone(),
                pkey: t.pkey.clone(),
            })
            .collect();
        schema.sort_by(|a, b| a.name.cmp(&b.name));
        let bytes = bincode::options().serialize(&schema)?;
        fs::write(path.as_ref(), bytes)
            .with_context(|| format!("writing schema to {}", path.as_ref().display()))?;
        info!(tables = schema.len(), "saved schema");
        Ok(())
    }

    /// Opens and registers every table listed in a schema file written by
    /// [`Catalog::save_schema`]. Relative table paths resolve against the
    /// schema file's directory.
    pub fn load_schema(&self, path: impl AsRef<Path>, page_size: usize) -> Result<Vec<TableId>> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("reading schema from {}", path.display()))?;
        let schema: Vec<TableSchema> = bincode::options()
            .deserialize(&bytes)
            .with_context(|| format!("decoding schema {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut ids = Vec::with_capacity(schema.len());
        for table in schema {
            let file_path = base.join(&table.file);
            let file = HeapFile::open(&file_path, table.desc, page_size)
                .with_context(|| format!("opening table {}", table.name))?;
            ids.push(self.add_table(Rc::new(file), &table.name, table.pkey.as_deref()));
        }
        info!(tables = ids.len(), "loaded schema");
        Ok(ids)
    }
}
