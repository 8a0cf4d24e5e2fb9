//! Main store implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use trailmap_types::LocationSample;

use crate::error::{Error, Result};
use crate::schema;

/// Default time a write waits on a lock held by another connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection options for [`LocationStore::open_with_options`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound on waiting for a lock held by another connection.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// SQLite-based store for location samples.
///
/// Samples are upserted by identity: a sample without an id is inserted and
/// comes back carrying its new id, a sample with an id updates its row.
pub struct LocationStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for LocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationStore")
            .field("path", &self.path)
            .finish()
    }
}

impl LocationStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, &StoreOptions::default())
    }

    /// Open or create a database at the given path with explicit options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening location database at {}", path.display());
        let unavailable = |source: rusqlite::Error| Error::Unavailable {
            path: path.to_path_buf(),
            source,
        };

        let conn = Connection::open(path).map_err(unavailable)?;
        conn.busy_timeout(options.busy_timeout).map_err(unavailable)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(unavailable)?;

        schema::initialize(&conn).map_err(|e| match e {
            Error::Database(source) => unavailable(source),
            other => other,
        })?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// The backing file, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or update a sample.
    ///
    /// An unpersisted sample (id `0`) is inserted and a copy carrying the
    /// newly assigned id is returned. A persisted sample updates its row's
    /// coordinates and is returned unchanged. The argument is never mutated,
    /// so on error the caller's copy still reflects what it had before.
    pub fn save(&self, sample: &LocationSample) -> Result<LocationSample> {
        if sample.is_persisted() {
            let changed = self.conn.execute(
                "UPDATE LocationData SET Latitude = ?2, Longitude = ?3 WHERE Id = ?1",
                rusqlite::params![sample.id, sample.latitude, sample.longitude],
            )?;

            if changed == 0 {
                return Err(Error::SampleNotFound(sample.id));
            }

            debug!("Updated sample {}", sample);
            Ok(*sample)
        } else {
            self.conn.execute(
                "INSERT INTO LocationData (Latitude, Longitude) VALUES (?1, ?2)",
                rusqlite::params![sample.latitude, sample.longitude],
            )?;

            let saved = sample.with_id(self.conn.last_insert_rowid());
            debug!("Inserted sample {}", saved);
            Ok(saved)
        }
    }

    /// Every stored sample in insertion order (ascending id).
    pub fn list_all(&self) -> Result<Vec<LocationSample>> {
        let mut stmt = self
            .conn
            .prepare("SELECT Id, Latitude, Longitude FROM LocationData ORDER BY Id ASC")?;

        let samples = stmt
            .query_map([], |row| {
                Ok(LocationSample {
                    id: row.get(0)?,
                    latitude: row.get(1)?,
                    longitude: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Loaded {} samples", samples.len());
        Ok(samples)
    }

    /// Look up one sample by id.
    pub fn get(&self, id: i64) -> Result<Option<LocationSample>> {
        let sample = self
            .conn
            .query_row(
                "SELECT Id, Latitude, Longitude FROM LocationData WHERE Id = ?",
                [id],
                |row| {
                    Ok(LocationSample {
                        id: row.get(0)?,
                        latitude: row.get(1)?,
                        longitude: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(sample)
    }

    /// Number of stored samples.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM LocationData", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete every stored sample. Succeeds on an empty table.
    pub fn clear_all(&self) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM LocationData", [])?;
        info!("Cleared {} samples", removed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_open_in_memory() {
        let store = LocationStore::open_in_memory().unwrap();
        assert!(store.list_all().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.path().is_none());
    }

    #[test]
    fn test_save_assigns_ascending_ids() {
        let store = LocationStore::open_in_memory().unwrap();

        let first = store.save(&LocationSample::new(37.0, -122.0)).unwrap();
        let second = store.save(&LocationSample::new(37.1, -122.1)).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.latitude, 37.0);
        assert_eq!(second.longitude, -122.1);
    }

    #[test]
    fn test_save_does_not_mutate_argument() {
        let store = LocationStore::open_in_memory().unwrap();
        let sample = LocationSample::new(1.0, 2.0);

        let saved = store.save(&sample).unwrap();

        assert_eq!(sample.id, 0);
        assert!(saved.is_persisted());
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let store = LocationStore::open_in_memory().unwrap();
        let saved = store.save(&LocationSample::new(1.0, 2.0)).unwrap();

        let moved = store.save(&saved.moved_to(3.0, 4.0)).unwrap();

        assert_eq!(moved.id, saved.id);
        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], LocationSample::new(3.0, 4.0).with_id(saved.id));
    }

    #[test]
    fn test_update_of_missing_row_fails() {
        let store = LocationStore::open_in_memory().unwrap();

        let err = store
            .save(&LocationSample::new(1.0, 2.0).with_id(99))
            .unwrap_err();

        assert!(matches!(err, Error::SampleNotFound(99)));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_clear_all_is_idempotent() {
        let store = LocationStore::open_in_memory().unwrap();
        store.save(&LocationSample::new(1.0, 2.0)).unwrap();

        store.clear_all().unwrap();
        assert!(store.list_all().unwrap().is_empty());

        store.clear_all().unwrap();
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_ids_not_reused_after_clear() {
        let store = LocationStore::open_in_memory().unwrap();
        let stale = store.save(&LocationSample::new(1.0, 2.0)).unwrap();
        store.clear_all().unwrap();

        let fresh = store.save(&LocationSample::new(5.0, 6.0)).unwrap();
        assert!(fresh.id > stale.id);

        // A stale identified sample cannot overwrite the new row.
        let err = store.save(&stale).unwrap_err();
        assert!(matches!(err, Error::SampleNotFound(_)));
        assert_eq!(store.get(fresh.id).unwrap(), Some(fresh));
    }

    #[test]
    fn test_out_of_range_values_stored_verbatim() {
        let store = LocationStore::open_in_memory().unwrap();
        let saved = store.save(&LocationSample::new(120.0, -720.5)).unwrap();

        let loaded = store.get(saved.id).unwrap().unwrap();
        assert_eq!(loaded.latitude, 120.0);
        assert_eq!(loaded.longitude, -720.5);
    }

    #[test]
    fn test_nan_rejected() {
        let store = LocationStore::open_in_memory().unwrap();
        let result = store.save(&LocationSample::new(f64::NAN, 0.0));

        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_get_missing() {
        let store = LocationStore::open_in_memory().unwrap();
        assert!(store.get(1).unwrap().is_none());
    }

    #[test]
    fn test_reopen_file_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("locations.db3");

        {
            let store = LocationStore::open(&path).unwrap();
            store.save(&LocationSample::new(10.0, 20.0)).unwrap();
            store.save(&LocationSample::new(11.0, 21.0)).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let store = LocationStore::open(&path).unwrap();
        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].point(), LocationSample::new(10.0, 20.0).point());
        assert_eq!(all[1].id, 2);
    }

    #[test]
    fn test_open_under_a_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let err = LocationStore::open(blocker.join("locations.db3")).unwrap_err();
        assert!(err.is_unavailable());
        assert!(matches!(err, Error::CreateDirectory { .. }));
    }

    #[test]
    fn test_open_with_foreign_table_layout_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.db3");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE LocationData (Id INTEGER PRIMARY KEY, Place TEXT);")
                .unwrap();
        }

        let err = LocationStore::open(&path).unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_open_with_keyless_id_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.db3");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE LocationData (Id integer, Latitude float, Longitude float);",
            )
            .unwrap();
        }

        let err = LocationStore::open(&path).unwrap_err();
        assert!(err.is_unavailable());
        assert!(matches!(err, Error::InvalidKey { column: "Id", .. }));

        let conn = Connection::open(&path).unwrap();
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 0);
    }

    #[test]
    fn test_second_connection_sees_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.db3");

        let writer = LocationStore::open(&path).unwrap();
        let reader = LocationStore::open_with_options(
            &path,
            &StoreOptions {
                busy_timeout: Duration::from_millis(200),
            },
        )
        .unwrap();

        writer.save(&LocationSample::new(1.0, 1.0)).unwrap();
        assert_eq!(reader.count().unwrap(), 1);
    }

    proptest! {
        #[test]
        fn prop_save_then_list_preserves_order(
            coords in proptest::collection::vec((-90.0f64..90.0, -180.0f64..180.0), 0..40)
        ) {
            let store = LocationStore::open_in_memory().unwrap();
            for &(lat, lon) in &coords {
                store.save(&LocationSample::new(lat, lon)).unwrap();
            }

            let all = store.list_all().unwrap();
            prop_assert_eq!(all.len(), coords.len());

            let mut previous = 0;
            for (sample, &(lat, lon)) in all.iter().zip(&coords) {
                prop_assert!(sample.id > previous);
                prop_assert_eq!(sample.latitude, lat);
                prop_assert_eq!(sample.longitude, lon);
                previous = sample.id;
            }
        }
    }
}
