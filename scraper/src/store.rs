//! Keyed document collections and the two persistence modes built on them.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StoreError;

pub type Document = Map<String, Value>;

/// Equality filter. An empty filter matches every document.
pub type Filter = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceResult {
    pub matched: u64,
    pub upserted: bool,
}

/// The four collection operations persistence relies on.
pub trait DocumentStore {
    /// Documents matching `filter`, trimmed to the `projection` fields when given.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Replaces the first document matching `filter`, inserting when nothing
    /// matches and `upsert` is set.
    fn replace_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        doc: Document,
        upsert: bool,
    ) -> Result<ReplaceResult, StoreError>;

    fn delete_many(&mut self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    fn insert_many(&mut self, collection: &str, docs: Vec<Document>) -> Result<u64, StoreError>;

    /// Swaps the whole collection for `docs`, returning how many documents
    /// were removed. Backends that can do this in one write should.
    fn replace_all(&mut self, collection: &str, docs: Vec<Document>) -> Result<u64, StoreError> {
        let deleted = self.delete_many(collection, &Filter::new())?;
        if !docs.is_empty() {
            self.insert_many(collection, docs)?;
        }
        Ok(deleted)
    }
}

/// Builds an equality filter on a single field.
pub fn filter_eq(field: &str, value: impl Into<Value>) -> Filter {
    let mut filter = Filter::new();
    filter.insert(field.to_string(), value.into());
    filter
}

fn matches(doc: &Document, filter: &Filter) -> bool {
    filter.iter().all(|(key, value)| doc.get(key) == Some(value))
}

fn project(doc: &Document, projection: Option<&[&str]>) -> Document {
    match projection {
        None => doc.clone(),
        Some(fields) => doc
            .iter()
            .filter(|(key, _)| fields.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}

fn find_in(docs: &[Document], filter: &Filter, projection: Option<&[&str]>) -> Vec<Document> {
    docs.iter()
        .filter(|doc| matches(doc, filter))
        .map(|doc| project(doc, projection))
        .collect()
}

fn replace_in(
    docs: &mut Vec<Document>,
    filter: &Filter,
    doc: Document,
    upsert: bool,
) -> ReplaceResult {
    match docs.iter_mut().find(|existing| matches(existing, filter)) {
        Some(existing) => {
            *existing = doc;
            ReplaceResult {
                matched: 1,
                upserted: false,
            }
        }
        None if upsert => {
            docs.push(doc);
            ReplaceResult {
                matched: 0,
                upserted: true,
            }
        }
        None => ReplaceResult {
            matched: 0,
            upserted: false,
        },
    }
}

fn delete_in(docs: &mut Vec<Document>, filter: &Filter) -> u64 {
    let before = docs.len();
    docs.retain(|doc| !matches(doc, filter));
    (before - docs.len()) as u64
}

/// In-process store. Also stands in for an unreachable backend in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Vec<Document>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails with [`StoreError::Connection`].
    pub fn unavailable() -> Self {
        Self {
            collections: BTreeMap::new(),
            unavailable: true,
        }
    }

    pub fn collection(&self, name: &str) -> &[Document] {
        self.collections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Connection {
                reason: "memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        Ok(find_in(self.collection(collection), filter, projection))
    }

    fn replace_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        doc: Document,
        upsert: bool,
    ) -> Result<ReplaceResult, StoreError> {
        self.check()?;
        let docs = self.collections.entry(collection.to_string()).or_default();
        Ok(replace_in(docs, filter, doc, upsert))
    }

    fn delete_many(&mut self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self
            .collections
            .get_mut(collection)
            .map(|docs| delete_in(docs, filter))
            .unwrap_or(0))
    }

    fn insert_many(&mut self, collection: &str, docs: Vec<Document>) -> Result<u64, StoreError> {
        self.check()?;
        let count = docs.len() as u64;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        Ok(count)
    }
}

/// One pretty-printed JSON array per collection, `<root>/<collection>.json`.
///
/// The root directory must already exist; a missing or read-only root is
/// reported as [`StoreError::Connection`].
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.json", collection))
    }

    fn connect(&self) -> Result<(), StoreError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Connection {
                reason: format!("data directory {} does not exist", self.root.display()),
            })
        }
    }

    fn io_error(&self, collection: &str, source: std::io::Error) -> StoreError {
        if source.kind() == ErrorKind::PermissionDenied {
            StoreError::Connection {
                reason: format!("{} is not writable: {}", self.root.display(), source),
            }
        } else {
            StoreError::Io {
                collection: collection.to_string(),
                source,
            }
        }
    }

    fn load(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.connect()?;
        let text = match fs::read_to_string(self.path(collection)) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.io_error(collection, err)),
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            collection: collection.to_string(),
            source,
        })
    }

    fn save(&self, collection: &str, docs: &[Document]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(docs)?;
        let path = self.path(collection);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|err| self.io_error(collection, err))?;
        fs::rename(&tmp, &path).map_err(|err| self.io_error(collection, err))
    }
}

impl DocumentStore for JsonDirStore {
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.load(collection)?;
        Ok(find_in(&docs, filter, projection))
    }

    fn replace_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        doc: Document,
        upsert: bool,
    ) -> Result<ReplaceResult, StoreError> {
        let mut docs = self.load(collection)?;
        let result = replace_in(&mut docs, filter, doc, upsert);
        if result.matched > 0 || result.upserted {
            self.save(collection, &docs)?;
        }
        Ok(result)
    }

    fn delete_many(&mut self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut docs = self.load(collection)?;
        let deleted = delete_in(&mut docs, filter);
        if deleted > 0 {
            self.save(collection, &docs)?;
        }
        Ok(deleted)
    }

    fn insert_many(
        &mut self,
        collection: &str,
        new_docs: Vec<Document>,
    ) -> Result<u64, StoreError> {
        let mut docs = self.load(collection)?;
        let count = new_docs.len() as u64;
        docs.extend(new_docs);
        self.save(collection, &docs)?;
        Ok(count)
    }

    /// One temp-file write and rename, so a failure keeps the previous contents.
    fn replace_all(&mut self, collection: &str, docs: Vec<Document>) -> Result<u64, StoreError> {
        let deleted = self.load(collection)?.len() as u64;
        self.save(collection, &docs)?;
        Ok(deleted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    /// Clear the collection, then insert the batch. Stale entries disappear.
    ReplaceAll,
    /// Insert or replace each record by `name`. Other entries are kept.
    MergeUpsert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistSummary {
    pub collection: String,
    pub label: String,
    pub mode: PersistMode,
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl fmt::Display for PersistSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            PersistMode::ReplaceAll => write!(
                f,
                "{} {} written to '{}' ({} previous entries removed)",
                self.inserted, self.label, self.collection, self.deleted
            ),
            PersistMode::MergeUpsert => write!(
                f,
                "{} new {} inserted, {} updated in '{}'",
                self.inserted, self.label, self.updated, self.collection
            ),
        }
    }
}

pub fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotADocument),
    }
}

/// Writes `records` to `collection` using `mode`.
pub fn persist<T: Serialize>(
    store: &mut dyn DocumentStore,
    collection: &str,
    records: &[T],
    mode: PersistMode,
    label: &str,
) -> Result<PersistSummary, StoreError> {
    let docs = records
        .iter()
        .map(to_document)
        .collect::<Result<Vec<_>, _>>()?;

    let mut summary = PersistSummary {
        collection: collection.to_string(),
        label: label.to_string(),
        mode,
        inserted: 0,
        updated: 0,
        deleted: 0,
    };

    match mode {
        PersistMode::ReplaceAll => {
            let inserted = docs.len() as u64;
            summary.deleted = store.replace_all(collection, docs)?;
            summary.inserted = inserted;
        }
        PersistMode::MergeUpsert => {
            for doc in docs {
                let name = doc.get("name").cloned().unwrap_or(Value::Null);
                let result = store.replace_one(collection, &filter_eq("name", name), doc, true)?;
                if result.matched > 0 {
                    summary.updated += 1;
                } else {
                    summary.inserted += 1;
                }
            }
        }
    }

    log::info!("{}", summary);
    Ok(summary)
}
