//! ACID snapshot files backed by redb.
//!
//! A snapshot holds every subject's asserted facts plus the store metadata
//! (schema, ontology IRI). Writing a snapshot replaces the previous one in a
//! single transaction, so a crash never leaves half an ontology on disk.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, TableError};

use crate::error::StoreError;
use crate::store::StoreResult;

/// Subject IRI → bincode-encoded fact set.
const FACTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("facts");

/// Metadata key → bincode-encoded value.
const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

fn redb_err(context: &str) -> impl Fn(redb::Error) -> StoreError + '_ {
    move |e| StoreError::Redb {
        message: format!("{context}: {e}"),
    }
}

/// A redb database holding one ontology snapshot.
pub struct SnapshotFile {
    db: Arc<Database>,
}

impl SnapshotFile {
    /// Open or create a snapshot file. Parent directories are created.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io { source: e })?;
            }
        }
        let db = Database::create(path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", path.display()),
        })?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Replace the whole snapshot with `facts` and `meta` in one transaction.
    pub fn write(&self, facts: &[(String, Vec<u8>)], meta: &[(&str, Vec<u8>)]) -> StoreResult<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| redb_err("begin_write failed")(e.into()))?;
        {
            txn.delete_table(FACTS_TABLE)
                .map_err(|e| redb_err("delete_table failed")(e.into()))?;
            let mut table = txn
                .open_table(FACTS_TABLE)
                .map_err(|e| redb_err("open_table failed")(e.into()))?;
            for (subject, encoded) in facts {
                table
                    .insert(subject.as_str(), encoded.as_slice())
                    .map_err(|e| redb_err("insert failed")(e.into()))?;
            }
        }
        {
            let mut table = txn
                .open_table(META_TABLE)
                .map_err(|e| redb_err("open_table failed")(e.into()))?;
            for (key, value) in meta {
                table
                    .insert(*key, value.as_slice())
                    .map_err(|e| redb_err("insert failed")(e.into()))?;
            }
        }
        txn.commit()
            .map_err(|e| redb_err("commit failed")(e.into()))?;
        Ok(())
    }

    /// Every `(subject IRI, encoded facts)` entry.
    pub fn read_facts(&self) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read failed")(e.into()))?;
        let table = match txn.open_table(FACTS_TABLE) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(redb_err("open_table failed")(e.into())),
        };
        let mut out = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| redb_err("iter failed")(e.into()))?
        {
            let (key, value) = entry.map_err(|e| redb_err("read failed")(e.into()))?;
            out.push((key.value().to_string(), value.value().to_vec()));
        }
        Ok(out)
    }

    /// Read one metadata value. `Ok(None)` if absent.
    pub fn read_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read failed")(e.into()))?;
        let table = match txn.open_table(META_TABLE) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(redb_err("open_table failed")(e.into())),
        };
        let result = table
            .get(key)
            .map_err(|e| redb_err("get failed")(e.into()))?;
        Ok(result.map(|guard| guard.value().to_vec()))
    }
}

impl std::fmt::Debug for SnapshotFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotFile").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::open(&dir.path().join("onto.redb")).unwrap();

        file.write(
            &[("urn:a".into(), vec![1, 2]), ("urn:b".into(), vec![3])],
            &[("iri", b"http://example.org/onto".to_vec())],
        )
        .unwrap();

        let facts = file.read_facts().unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(
            file.read_meta("iri").unwrap(),
            Some(b"http://example.org/onto".to_vec())
        );
        assert_eq!(file.read_meta("missing").unwrap(), None);
    }

    #[test]
    fn write_replaces_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::open(&dir.path().join("onto.redb")).unwrap();

        file.write(&[("urn:a".into(), vec![1])], &[]).unwrap();
        file.write(&[("urn:b".into(), vec![2])], &[]).unwrap();

        let facts = file.read_facts().unwrap();
        assert_eq!(facts, vec![("urn:b".to_string(), vec![2])]);
    }

    #[test]
    fn fresh_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::open(&dir.path().join("nested/onto.redb")).unwrap();
        assert!(file.read_facts().unwrap().is_empty());
        assert_eq!(file.read_meta("schema").unwrap(), None);
    }

    #[test]
    fn persistence_across_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("onto.redb");
        {
            let file = SnapshotFile::open(&path).unwrap();
            file.write(&[("urn:keep".into(), vec![7])], &[]).unwrap();
        }
        let file = SnapshotFile::open(&path).unwrap();
        assert_eq!(file.read_facts().unwrap().len(), 1);
    }
}
