//! Save-game persistence.
//!
//! The store talks to storage through [`PersistenceProvider`]: it loads the
//! profile once when opened and writes it through after every accepted
//! event. Two providers ship with the crate:
//!
//! - [`SqliteProvider`] keeps one row per save slot:
//!
//!   ```sql
//!   CREATE TABLE IF NOT EXISTS save_slots (
//!       slot       TEXT PRIMARY KEY,
//!       version    INTEGER NOT NULL,
//!       data       BLOB NOT NULL,
//!       updated_at TEXT NOT NULL,
//!       checksum   TEXT
//!   );
//!   ```
//!
//!   The profile travels as a JSON [`SaveDocument`]. A row that fails its
//!   checksum, does not decode or carries an unknown version is reported as
//!   "no save" with a warning, so a damaged file never blocks a new game.
//!
//! - [`MemoryProvider`] holds the document in memory and can be told to fail
//!   saves, for tests and headless hosts.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{EncoreError, Result};
use crate::profile::PlayerProfile;
use crate::types::Timestamp;

/// Current save-document version.
pub const SAVE_VERSION: u32 = 1;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS save_slots (
    slot       TEXT PRIMARY KEY,
    version    INTEGER NOT NULL,
    data       BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

/// Where the store loads from and saves to.
pub trait PersistenceProvider {
    /// Load the saved profile; `Ok(None)` when there is none (or it is
    /// unreadable).
    ///
    /// # Errors
    /// Storage faults.
    fn load(&self) -> Result<Option<PlayerProfile>>;

    /// Persist the profile, replacing the previous save.
    ///
    /// # Errors
    /// Storage or encoding faults.
    fn save(&self, profile: &PlayerProfile) -> Result<()>;
}

/// On-disk envelope around a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveDocument {
    /// Format version.
    pub version: u32,
    /// When the document was written.
    pub saved_at: Timestamp,
    /// The profile.
    pub profile: PlayerProfile,
}

impl SaveDocument {
    fn encode(profile: &PlayerProfile) -> Result<Vec<u8>> {
        let doc = SaveDocumentRef {
            version: SAVE_VERSION,
            saved_at: Utc::now(),
            profile,
        };
        serde_json::to_vec(&doc).map_err(|e| EncoreError::Serialization(e.to_string()))
    }

    /// Decode a document, returning `None` (with a warning) for anything the
    /// engine cannot use.
    fn decode(bytes: &[u8], origin: &str) -> Option<PlayerProfile> {
        match serde_json::from_slice::<SaveDocument>(bytes) {
            Ok(doc) if doc.version == SAVE_VERSION => Some(doc.profile),
            Ok(doc) => {
                warn!(origin, version = doc.version, "Unsupported save version; starting fresh");
                None
            }
            Err(e) => {
                warn!(origin, error = %e, "Undecodable save document; starting fresh");
                None
            }
        }
    }
}

#[derive(Serialize)]
struct SaveDocumentRef<'a> {
    version: u32,
    saved_at: Timestamp,
    profile: &'a PlayerProfile,
}

/// CRC-32 (ISO 3309) of `data` as lowercase hex.
fn crc32_hex(data: &[u8]) -> String {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    format!("{:08x}", !crc)
}

// ---------------------------------------------------------------------------
// SqliteProvider
// ---------------------------------------------------------------------------

/// SQLite-backed save slot.
pub struct SqliteProvider {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
    slot: String,
}

impl std::fmt::Debug for SqliteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProvider")
            .field("db_path", &self.db_path)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl SqliteProvider {
    /// Open (or create) the database at `path` and bind to `slot`.
    ///
    /// # Errors
    /// [`EncoreError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, slot: &str, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), slot, wal = config.wal_mode, "Save database opened");
        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
            slot: slot.to_string(),
        })
    }

    /// In-memory database, for tests.
    ///
    /// # Errors
    /// [`EncoreError::Database`] on SQLite failures.
    pub fn open_in_memory(slot: &str, config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
            slot: slot.to_string(),
        })
    }

    /// Slot this provider reads and writes.
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Every slot with a row in the database.
    ///
    /// # Errors
    /// [`EncoreError::Database`] on SQLite failures.
    pub fn list_slots(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached("SELECT slot FROM save_slots ORDER BY slot")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }

    /// Delete this provider's slot. Returns `true` if a row was removed.
    ///
    /// # Errors
    /// [`EncoreError::Database`] on SQLite failures.
    pub fn delete(&self) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM save_slots WHERE slot = ?1", params![self.slot])?;
        Ok(deleted > 0)
    }

    /// Copy the whole database to `dest_path` with SQLite's online backup.
    ///
    /// # Errors
    /// [`EncoreError::Database`] or [`EncoreError::Io`].
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Save backup completed"
        );
        Ok(())
    }

    /// Write `<db>.bak.1`, shifting older backups up and keeping at most
    /// `backup_count`. No-op for in-memory databases.
    ///
    /// # Errors
    /// [`EncoreError::Database`] or [`EncoreError::Io`].
    pub fn create_rotating_backup(&self) -> Result<()> {
        let max = self.config.backup_count;
        if self.db_path.as_os_str() == ":memory:" || max == 0 {
            return Ok(());
        }
        for i in (1..max).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                std::fs::rename(&src, self.backup_path(i + 1))?;
            }
        }
        let overflow = self.backup_path(max + 1);
        if overflow.exists() {
            std::fs::remove_file(&overflow)?;
        }
        self.backup(self.backup_path(1))
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut name = self.db_path.clone().into_os_string();
        name.push(format!(".bak.{n}"));
        PathBuf::from(name)
    }

    /// `PRAGMA integrity_check`.
    ///
    /// # Errors
    /// [`EncoreError::Database`] if the check cannot run.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self.conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

impl PersistenceProvider for SqliteProvider {
    fn load(&self) -> Result<Option<PlayerProfile>> {
        let start = Instant::now();
        let row: Option<(i64, Vec<u8>, Option<String>)> = self
            .conn
            .prepare_cached("SELECT version, data, checksum FROM save_slots WHERE slot = ?1")?
            .query_row(params![self.slot], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .optional()?;

        let Some((version, data, stored_checksum)) = row else {
            return Ok(None);
        };
        if version != i64::from(SAVE_VERSION) {
            warn!(slot = %self.slot, version, "Unsupported save version; starting fresh");
            return Ok(None);
        }
        if let Some(expected) = stored_checksum.filter(|_| self.config.checksum_enabled) {
            let actual = crc32_hex(&data);
            if expected != actual {
                warn!(slot = %self.slot, %expected, %actual, "Checksum mismatch; treating save as missing");
                return Ok(None);
            }
        }

        let profile = SaveDocument::decode(&data, &self.slot);
        debug!(
            slot = %self.slot,
            bytes = data.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded save"
        );
        Ok(profile)
    }

    fn save(&self, profile: &PlayerProfile) -> Result<()> {
        let start = Instant::now();
        let json = SaveDocument::encode(profile)?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));

        self.conn.execute(
            "INSERT INTO save_slots (slot, version, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(slot) DO UPDATE SET
                version = excluded.version,
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![self.slot, SAVE_VERSION, json, Utc::now().to_rfc3339(), checksum],
        )?;

        debug!(
            slot = %self.slot,
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved profile"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryProvider
// ---------------------------------------------------------------------------

/// In-memory save slot. Clones share the same slot, so a test can keep a
/// handle after moving one into the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    document: Arc<Mutex<Option<Vec<u8>>>>,
    fail_saves: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl MemoryProvider {
    /// Empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Replace the stored bytes verbatim (e.g. to simulate corruption).
    pub fn put_raw(&self, bytes: Vec<u8>) {
        *self.document.lock() = Some(bytes);
    }
}

impl PersistenceProvider for MemoryProvider {
    fn load(&self) -> Result<Option<PlayerProfile>> {
        Ok(self
            .document
            .lock()
            .as_deref()
            .and_then(|bytes| SaveDocument::decode(bytes, "memory")))
    }

    fn save(&self, profile: &PlayerProfile) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(EncoreError::Persistence("simulated save failure".into()));
        }
        let json = SaveDocument::encode(profile)?;
        *self.document.lock() = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> PlayerProfile {
        let mut profile = PlayerProfile::new(Utc::now(), 11);
        profile.wallet.credit(250);
        profile.set_name("Aria").expect("name");
        profile
    }

    #[test]
    fn sqlite_save_then_load() {
        let provider = SqliteProvider::open_in_memory("slot1", &PersistenceConfig::default()).expect("open");
        assert!(provider.load().expect("load").is_none());
        let profile = sample_profile();
        provider.save(&profile).expect("save");
        assert_eq!(provider.load().expect("load"), Some(profile));
    }

    #[test]
    fn sqlite_upsert_keeps_one_row_per_slot() {
        let provider = SqliteProvider::open_in_memory("slot1", &PersistenceConfig::default()).expect("open");
        let mut profile = sample_profile();
        provider.save(&profile).expect("save");
        profile.wallet.credit(1);
        provider.save(&profile).expect("save again");
        assert_eq!(provider.list_slots().expect("list"), vec!["slot1".to_string()]);
        assert_eq!(provider.load().expect("load").map(|p| p.wallet.currency()), Some(251));
        assert!(provider.delete().expect("delete"));
        assert!(provider.load().expect("load").is_none());
    }

    #[test]
    fn checksum_mismatch_reads_as_missing() {
        let provider = SqliteProvider::open_in_memory("slot1", &PersistenceConfig::default()).expect("open");
        provider.save(&sample_profile()).expect("save");
        provider
            .conn
            .execute("UPDATE save_slots SET checksum = 'deadbeef' WHERE slot = ?1", params!["slot1"])
            .expect("corrupt");
        assert!(provider.load().expect("load").is_none());
    }

    #[test]
    fn undecodable_row_reads_as_missing() {
        let config = PersistenceConfig {
            checksum_enabled: false,
            ..PersistenceConfig::default()
        };
        let provider = SqliteProvider::open_in_memory("slot1", &config).expect("open");
        provider.save(&sample_profile()).expect("save");
        provider
            .conn
            .execute("UPDATE save_slots SET data = x'7b7d' WHERE slot = ?1", params!["slot1"])
            .expect("corrupt");
        assert!(provider.load().expect("load").is_none());
    }

    #[test]
    fn unknown_version_reads_as_missing() {
        let provider = SqliteProvider::open_in_memory("slot1", &PersistenceConfig::default()).expect("open");
        provider.save(&sample_profile()).expect("save");
        provider
            .conn
            .execute("UPDATE save_slots SET version = 99 WHERE slot = ?1", params!["slot1"])
            .expect("bump version");
        assert!(provider.load().expect("load").is_none());
    }

    #[test]
    fn file_backup_and_rotation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("encore.db");
        let config = PersistenceConfig {
            backup_count: 2,
            ..PersistenceConfig::default()
        };
        let provider = SqliteProvider::open(&db_path, "main", &config).expect("open");
        provider.save(&sample_profile()).expect("save");
        assert!(provider.integrity_check().expect("check"));

        provider.create_rotating_backup().expect("backup 1");
        provider.create_rotating_backup().expect("backup 2");
        provider.create_rotating_backup().expect("backup 3");
        assert!(dir.path().join("encore.db.bak.1").exists());
        assert!(dir.path().join("encore.db.bak.2").exists());
        assert!(!dir.path().join("encore.db.bak.3").exists());

        let restored = SqliteProvider::open(dir.path().join("encore.db.bak.1"), "main", &config)
            .expect("open backup");
        assert_eq!(
            restored.load().expect("load").and_then(|p| p.name().map(str::to_string)),
            Some("Aria".to_string())
        );
    }

    #[test]
    fn memory_provider_shares_state_and_fails_on_demand() {
        let provider = MemoryProvider::new();
        let handle = provider.clone();
        provider.save(&sample_profile()).expect("save");
        assert_eq!(handle.save_count(), 1);
        assert!(handle.load().expect("load").is_some());

        handle.set_fail_saves(true);
        assert!(matches!(provider.save(&sample_profile()), Err(EncoreError::Persistence(_))));
        assert_eq!(handle.save_count(), 1);

        handle.put_raw(b"garbage".to_vec());
        assert!(provider.load().expect("load").is_none());
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32_hex(b"123456789"), "cbf43926");
    }
}
