//! Persisted device state and journal blobs over SQLite.
//!
//! Two tables: `device_state` holds the per-field flags and strings the
//! launch pipeline reads and writes (field-atomic get/set, no multi-field
//! transactions), `journal` holds the JSON blobs the journal screens load
//! and save wholesale.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use spotlog_journal::{GeneralNotes, Spot};

// Device-state field names (wire-compatible with the mobile app).
pub const KEY_HAS_RUN_PREVIOUSLY: &str = "hasRunPreviously";
pub const KEY_APP_STATE: &str = "app_state";
pub const KEY_STORED_LOG: &str = "stored_log";
pub const KEY_PERMS_ACCEPTED: &str = "perms_accepted";
pub const KEY_PERMS_DENIED: &str = "perms_denied";
pub const KEY_LAST_PERM_REQUEST: &str = "last_perm_request";
pub const KEY_TEMP_URL: &str = "temp_url";
pub const KEY_PUSH_TOKEN: &str = "push_token";
pub const KEY_TRACKING_ID: &str = "tracking_id";

// Journal blob keys. Names are wire-frozen, older installs already hold
// blobs under them.
const BLOB_SPOTS: &str = "spotsData";
const BLOB_GENERAL_NOTES: &str = "generalNotesData";

#[derive(Clone)]
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    pub fn open(dir: &Path) -> Result<Self> {
        let db_path = dir.join("spotlog.sqlite");
        let store = Self { db_path };
        let conn = store.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS device_state (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS journal (
              key TEXT PRIMARY KEY,
              data TEXT NOT NULL
            );
            "#,
        )?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let busy_ms: u64 = std::env::var("SPOTLOG_SQLITE_BUSY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        conn.busy_timeout(std::time::Duration::from_millis(busy_ms))?;
        Ok(conn)
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM device_state WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO device_state(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM device_state WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn get_bool(&self, key: &str) -> Result<bool> {
        Ok(matches!(self.get_raw(key)?.as_deref(), Some("true")))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_raw(key, if value { "true" } else { "false" })
    }

    // --- launch pipeline fields ---

    pub fn has_run_previously(&self) -> Result<bool> {
        self.get_bool(KEY_HAS_RUN_PREVIOUSLY)
    }

    pub fn mark_as_run(&self) -> Result<()> {
        self.set_bool(KEY_HAS_RUN_PREVIOUSLY, true)
    }

    pub fn app_state(&self) -> Result<Option<String>> {
        self.get_raw(KEY_APP_STATE)
    }

    pub fn set_app_state(&self, state: &str) -> Result<()> {
        self.set_raw(KEY_APP_STATE, state)
    }

    pub fn stored_log(&self) -> Result<Option<String>> {
        self.get_raw(KEY_STORED_LOG)
    }

    pub fn store_log(&self, url: &str) -> Result<()> {
        self.set_raw(KEY_STORED_LOG, url)
    }

    pub fn perms_accepted(&self) -> Result<bool> {
        self.get_bool(KEY_PERMS_ACCEPTED)
    }

    pub fn set_perms_accepted(&self, accepted: bool) -> Result<()> {
        self.set_bool(KEY_PERMS_ACCEPTED, accepted)
    }

    pub fn perms_denied(&self) -> Result<bool> {
        self.get_bool(KEY_PERMS_DENIED)
    }

    pub fn set_perms_denied(&self, denied: bool) -> Result<()> {
        self.set_bool(KEY_PERMS_DENIED, denied)
    }

    /// Unix seconds of the last permission prompt, if any was recorded.
    pub fn last_perm_request(&self) -> Result<Option<i64>> {
        Ok(self
            .get_raw(KEY_LAST_PERM_REQUEST)?
            .and_then(|s| s.parse().ok()))
    }

    pub fn set_last_perm_request(&self, unix_secs: i64) -> Result<()> {
        self.set_raw(KEY_LAST_PERM_REQUEST, &unix_secs.to_string())
    }

    pub fn temp_url(&self) -> Result<Option<String>> {
        self.get_raw(KEY_TEMP_URL)
    }

    pub fn set_temp_url(&self, url: &str) -> Result<()> {
        self.set_raw(KEY_TEMP_URL, url)
    }

    /// Read-and-clear the parked deep-link URL (at-most-once delivery).
    pub fn take_temp_url(&self) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "DELETE FROM device_state WHERE key = ?1 RETURNING value",
                params![KEY_TEMP_URL],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn push_token(&self) -> Result<Option<String>> {
        self.get_raw(KEY_PUSH_TOKEN)
    }

    pub fn set_push_token(&self, token: &str) -> Result<()> {
        self.set_raw(KEY_PUSH_TOKEN, token)
    }

    /// Stable device tracking identifier, generated once and persisted.
    pub fn tracking_id(&self) -> Result<String> {
        if let Some(id) = self.get_raw(KEY_TRACKING_ID)? {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.set_raw(KEY_TRACKING_ID, &id)?;
        Ok(id)
    }

    // --- journal blobs ---

    fn get_blob(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let data = conn
            .query_row(
                "SELECT data FROM journal WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(data)
    }

    fn set_blob(&self, key: &str, data: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO journal(key, data) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data",
            params![key, data],
        )?;
        Ok(())
    }

    pub fn save_spots(&self, spots: &[Spot]) -> Result<()> {
        self.set_blob(BLOB_SPOTS, &serde_json::to_string(spots)?)
    }

    pub fn load_spots(&self) -> Result<Vec<Spot>> {
        match self.get_blob(BLOB_SPOTS)? {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_general_notes(&self, notes: &GeneralNotes) -> Result<()> {
        self.set_blob(BLOB_GENERAL_NOTES, &serde_json::to_string(notes)?)
    }

    pub fn load_general_notes(&self) -> Result<GeneralNotes> {
        match self.get_blob(BLOB_GENERAL_NOTES)? {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Ok(GeneralNotes::default()),
        }
    }
}
