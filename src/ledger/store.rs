//! Ledger entity storage
//!
//! Entities are persisted as JSON documents keyed by `(kind, id)`. The
//! in-memory store backs tests and replay runs; the SQLite store keeps the
//! derived ledger across restarts.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use super::entities::{Entity, EntityKind};
use crate::error::LedgerResult;

/// Keyed entity storage.
pub trait LedgerStore {
    fn load<E: Entity>(&self, id: &str) -> LedgerResult<Option<E>>;

    fn save<E: Entity>(&mut self, entity: &E) -> LedgerResult<()>;

    /// Every entity of one kind, ordered by id.
    fn all<E: Entity>(&self) -> LedgerResult<Vec<E>>;

    /// Run `f` so that either all of its writes land or none do.
    fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> LedgerResult<T>,
    ) -> LedgerResult<T>
    where
        Self: Sized;
}

// ============================================================================
// In-memory store
// ============================================================================

type Key = (EntityKind, String);

#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: BTreeMap<Key, serde_json::Value>,
    /// Prior values of keys written inside `atomically`, oldest first
    journal: Option<Vec<(Key, Option<serde_json::Value>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl LedgerStore for MemoryStore {
    fn load<E: Entity>(&self, id: &str) -> LedgerResult<Option<E>> {
        match self.entities.get(&(E::KIND, id.to_string())) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    fn save<E: Entity>(&mut self, entity: &E) -> LedgerResult<()> {
        let value = serde_json::to_value(entity)?;
        let key = (E::KIND, entity.id());
        let previous = self.entities.insert(key.clone(), value);
        if let Some(journal) = self.journal.as_mut() {
            journal.push((key, previous));
        }
        Ok(())
    }

    fn all<E: Entity>(&self) -> LedgerResult<Vec<E>> {
        self.entities
            .range((E::KIND, String::new())..)
            .take_while(|((kind, _), _)| *kind == E::KIND)
            .map(|(_, value)| Ok(serde_json::from_value(value.clone())?))
            .collect()
    }

    fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let outer = self.journal.replace(Vec::new());
        let result = f(self);
        let journal = std::mem::replace(&mut self.journal, outer).unwrap_or_default();
        if result.is_err() {
            for (key, previous) in journal.into_iter().rev() {
                match previous {
                    Some(value) => self.entities.insert(key, value),
                    None => self.entities.remove(&key),
                };
            }
        } else if let Some(outer) = self.journal.as_mut() {
            outer.extend(journal);
        }
        result
    }
}

// ============================================================================
// SQLite store
// ============================================================================

/// SQLite-backed store.
pub struct SqliteStore {
    db: Connection,
}

impl SqliteStore {
    /// Open or create the ledger database at `path`.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        let db = Connection::open(path)?;
        // WAL lets the verifier read while the engine writes
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(db, path.display().to_string())
    }

    pub fn in_memory() -> LedgerResult<Self> {
        Self::init(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn init(db: Connection, label: String) -> LedgerResult<Self> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS entities (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                PRIMARY KEY (kind, id)
            );",
        )?;
        info!(path = %label, "Ledger store initialized");
        Ok(Self { db })
    }
}

impl LedgerStore for SqliteStore {
    fn load<E: Entity>(&self, id: &str) -> LedgerResult<Option<E>> {
        let mut stmt = self
            .db
            .prepare_cached("SELECT data FROM entities WHERE kind = ?1 AND id = ?2")?;
        let data: Option<String> = stmt
            .query_row(rusqlite::params![E::KIND.as_str(), id], |row| row.get(0))
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save<E: Entity>(&mut self, entity: &E) -> LedgerResult<()> {
        let data = serde_json::to_string(entity)?;
        let id = entity.id();
        self.db.execute(
            "INSERT INTO entities (kind, id, data, updated_at)
             VALUES (?1, ?2, ?3, strftime('%s', 'now'))
             ON CONFLICT(kind, id) DO UPDATE SET data = ?3, updated_at = strftime('%s', 'now')",
            rusqlite::params![E::KIND.as_str(), id, data],
        )?;
        debug!(kind = E::KIND.as_str(), id, "Saved entity");
        Ok(())
    }

    fn all<E: Entity>(&self) -> LedgerResult<Vec<E>> {
        let mut stmt = self
            .db
            .prepare_cached("SELECT data FROM entities WHERE kind = ?1 ORDER BY id")?;
        let rows = stmt.query_map([E::KIND.as_str()], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        self.db.execute_batch("BEGIN")?;
        match f(self) {
            Ok(value) => {
                self.db.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                self.db.execute_batch("ROLLBACK")?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::entities::{Pool, Stream};
    use crate::ledger::events::EventMeta;
    use crate::types::Address;
    use tempfile::TempDir;

    fn pool(byte: u8) -> Pool {
        Pool::new(Address::new([byte; 20]), Address::new([0xee; 20]), &EventMeta::new(1, 100, 0))
    }

    fn exercise<S: LedgerStore>(store: &mut S) {
        assert!(store.load::<Pool>(&pool(1).id()).unwrap().is_none());

        let mut p = pool(1);
        store.save(&p).unwrap();
        p.total_units = 42;
        store.save(&p).unwrap();
        store.save(&pool(2)).unwrap();

        let loaded: Pool = store.load(&p.id()).unwrap().unwrap();
        assert_eq!(loaded.total_units, 42);

        let pools: Vec<Pool> = store.all().unwrap();
        assert_eq!(pools.len(), 2);
        // kinds do not leak into each other
        assert!(store.all::<Stream>().unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        exercise(&mut store);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_sqlite_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut store = SqliteStore::open(&dir.path().join("ledger.db")).unwrap();
        exercise(&mut store);
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.save(&pool(7)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.all::<Pool>().unwrap().len(), 1);
    }

    fn rolls_back<S: LedgerStore>(store: &mut S) {
        store.save(&pool(4)).unwrap();
        let result: LedgerResult<()> = store.atomically(|s| {
            s.save(&pool(3))?;
            Err(crate::error::LedgerError::Malformed {
                event: "test",
                reason: "forced".into(),
            })
        });
        assert!(result.is_err());
        let pools: Vec<Pool> = store.all().unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].id, Address::new([4; 20]));
    }

    #[test]
    fn test_memory_rollback_restores_overwritten_values() {
        let mut store = MemoryStore::new();
        let mut p = pool(1);
        p.total_units = 10;
        store.save(&p).unwrap();

        let result: LedgerResult<()> = store.atomically(|s| {
            let mut changed = pool(1);
            changed.total_units = 99;
            s.save(&changed)?;
            s.save(&changed)?;
            s.save(&pool(2))?;
            Err(crate::error::LedgerError::Malformed {
                event: "test",
                reason: "forced".into(),
            })
        });
        assert!(result.is_err());
        let loaded: Pool = store.load(&p.id()).unwrap().unwrap();
        assert_eq!(loaded.total_units, 10);
        assert_eq!(store.len(), 1);

        // committed writes stay and leave no journal behind
        store.atomically(|s| s.save(&pool(3))).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.journal.is_none());
    }

    #[test]
    fn test_memory_atomically_rolls_back_on_error() {
        rolls_back(&mut MemoryStore::new());
    }

    #[test]
    fn test_sqlite_atomically_rolls_back_on_error() {
        rolls_back(&mut SqliteStore::in_memory().unwrap());
    }
}
