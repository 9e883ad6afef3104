use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub const DEVICE_ID_KEY: &str = "device_id";
pub const VISITED_KEY: &str = "visited";

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub id: i64,
    pub url: String,
    pub media_type: String,
    pub file_path: String,
    pub width: i64,
    pub height: i64,
    pub size_bytes: i64,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub checksum: String,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", &"WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "foreign_keys", &"ON")
            .context("storage: enable foreign keys")?;
        conn.pragma_update(None, "busy_timeout", &5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }

    pub fn set_liked(&self, post_id: &str, liked: bool) -> Result<()> {
        if post_id.is_empty() {
            bail!("storage: post id required");
        }
        let conn = self.conn.lock();
        if liked {
            conn.execute(
                r#"
INSERT INTO liked_posts (post_id, created_at)
VALUES (?1, ?2)
ON CONFLICT(post_id) DO NOTHING
"#,
                params![post_id, Utc::now().timestamp()],
            )?;
        } else {
            conn.execute(
                "DELETE FROM liked_posts WHERE post_id = ?1",
                params![post_id],
            )?;
        }
        Ok(())
    }

    pub fn liked_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT post_id FROM liked_posts ORDER BY created_at ASC, post_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
    }

    pub fn set_bookmarked(&self, post_id: &str, bookmarked: bool) -> Result<()> {
        if post_id.is_empty() {
            bail!("storage: post id required");
        }
        let conn = self.conn.lock();
        if bookmarked {
            conn.execute(
                r#"
INSERT INTO bookmarked_posts (post_id, created_at)
VALUES (?1, ?2)
ON CONFLICT(post_id) DO NOTHING
"#,
                params![post_id, Utc::now().timestamp()],
            )?;
        } else {
            conn.execute(
                "DELETE FROM bookmarked_posts WHERE post_id = ?1",
                params![post_id],
            )?;
        }
        Ok(())
    }

    pub fn bookmarked_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT post_id FROM bookmarked_posts ORDER BY created_at ASC, post_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
    }

    pub fn get_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM app_state WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .context("storage: query app state")
    }

    pub fn set_state(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            bail!("storage: state key required");
        }
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO app_state (key, value)
VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Stable anonymous identity for this installation, created on first
    /// use and reused forever after.
    pub fn device_id(&self) -> Result<String> {
        if let Some(existing) = self.get_state(DEVICE_ID_KEY)? {
            if !existing.is_empty() {
                return Ok(existing);
            }
        }
        let id = generate_device_id();
        self.set_state(DEVICE_ID_KEY, &id)?;
        Ok(id)
    }

    pub fn upsert_media_entry(&self, mut entry: MediaEntry) -> Result<i64> {
        if entry.url.is_empty() {
            bail!("storage: media url required");
        }
        if entry.fetched_at.timestamp() == 0 {
            entry.fetched_at = Utc::now();
        }
        let expires = entry.expires_at.map(|dt| dt.timestamp());
        let conn = self.conn.lock();
        let id: i64 = conn.query_row(
            r#"
INSERT INTO media_cache (url, media_type, file_path, width, height, size_bytes, fetched_at, expires_at, checksum)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(url) DO UPDATE SET
  media_type = excluded.media_type,
  file_path = excluded.file_path,
  width = excluded.width,
  height = excluded.height,
  size_bytes = excluded.size_bytes,
  fetched_at = excluded.fetched_at,
  expires_at = excluded.expires_at,
  checksum = excluded.checksum
RETURNING id
"#,
            params![
                entry.url,
                entry.media_type,
                entry.file_path,
                entry.width,
                entry.height,
                entry.size_bytes,
                entry.fetched_at.timestamp(),
                expires,
                entry.checksum,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_media_entry_by_url(&self, url: &str) -> Result<Option<MediaEntry>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
SELECT id, url, media_type, file_path, width, height, size_bytes, fetched_at, expires_at, checksum
FROM media_cache
WHERE url = ?1
"#,
            params![url],
            media_entry_from_row,
        )
        .optional()
        .context("storage: query media entry")
    }

    pub fn total_media_size(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let total: Option<i64> = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM media_cache",
            [],
            |row| row.get(0),
        )?;
        Ok(total.unwrap_or(0))
    }

    pub fn list_media_paths(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT file_path FROM media_cache")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
    }

    pub fn list_oldest_media(&self, limit: usize) -> Result<Vec<MediaEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
SELECT id, url, media_type, file_path, width, height, size_bytes, fetched_at, expires_at, checksum
FROM media_cache
ORDER BY fetched_at ASC
LIMIT ?1
"#,
        )?;
        let rows = stmt
            .query_map(params![limit as i64], media_entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete_media_entries(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = ids
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(",");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "DELETE FROM media_cache WHERE id IN ({})",
            placeholders
        ))?;
        let params_vec = ids
            .iter()
            .map(|id| id as &dyn rusqlite::ToSql)
            .collect::<Vec<_>>();
        stmt.execute(rusqlite::params_from_iter(params_vec))?;
        Ok(())
    }
}

pub fn generate_device_id() -> String {
    use rand::Rng;

    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("DEV-{suffix}")
}

fn media_entry_from_row(row: &Row<'_>) -> rusqlite::Result<MediaEntry> {
    let fetched: i64 = row.get(7)?;
    let expires: Option<i64> = row.get(8)?;
    Ok(MediaEntry {
        id: row.get(0)?,
        url: row.get(1)?,
        media_type: row.get(2)?,
        file_path: row.get(3)?,
        width: row.get(4)?,
        height: row.get(5)?,
        size_bytes: row.get(6)?,
        fetched_at: Utc
            .timestamp_opt(fetched, 0)
            .single()
            .unwrap_or_else(Utc::now),
        expires_at: expires.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        checksum: row.get(9)?,
    })
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let migrations = migrations();
    for (idx, sql) in migrations.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![
                version,
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::from_secs(0))
                    .as_secs() as i64,
            ],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS liked_posts (
  post_id TEXT PRIMARY KEY,
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS bookmarked_posts (
  post_id TEXT PRIMARY KEY,
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS app_state (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS media_cache (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  url TEXT NOT NULL UNIQUE,
  media_type TEXT NOT NULL,
  file_path TEXT NOT NULL,
  width INTEGER,
  height INTEGER,
  size_bytes INTEGER,
  fetched_at INTEGER NOT NULL,
  expires_at INTEGER,
  checksum TEXT
);

CREATE INDEX IF NOT EXISTS idx_media_cache_fetched_at ON media_cache(fetched_at);
CREATE INDEX IF NOT EXISTS idx_media_cache_expires_at ON media_cache(expires_at);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("memeverse-tui").join("state.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();
        assert!(path.exists());
        store.close().unwrap();
    }

    #[test]
    fn liked_and_bookmarked_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();

        store.set_liked("p1", true).unwrap();
        store.set_liked("p2", true).unwrap();
        store.set_liked("p1", false).unwrap();
        store.set_bookmarked("p3", true).unwrap();
        assert_eq!(store.liked_ids().unwrap(), vec!["p2"]);
        assert_eq!(store.bookmarked_ids().unwrap(), vec!["p3"]);

        // Setting the same flag twice stays idempotent.
        store.set_bookmarked("p3", true).unwrap();
        assert_eq!(store.bookmarked_ids().unwrap(), vec!["p3"]);

        store.close().unwrap();
        let store = Store::open(Options { path: Some(path) }).unwrap();
        assert_eq!(store.liked_ids().unwrap(), vec!["p2"]);
        assert_eq!(store.bookmarked_ids().unwrap(), vec!["p3"]);
        store.close().unwrap();
    }

    #[test]
    fn device_id_is_stable_and_well_formed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();

        let id = store.device_id().unwrap();
        assert!(id.starts_with("DEV-"));
        assert_eq!(id.len(), 13);
        assert!(id[4..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(store.device_id().unwrap(), id);

        store.close().unwrap();
        let store = Store::open(Options { path: Some(path) }).unwrap();
        assert_eq!(store.device_id().unwrap(), id);
        store.close().unwrap();
    }

    #[test]
    fn media_entries_upsert_and_prune_order() {
        let dir = tempdir().unwrap();
        let store = Store::open(Options {
            path: Some(dir.path().join("state.db")),
        })
        .unwrap();

        let entry = MediaEntry {
            id: 0,
            url: "https://cdn.memeverse.in/a.jpg".into(),
            media_type: "image/jpeg".into(),
            file_path: "/tmp/a.bin".into(),
            width: 100,
            height: 50,
            size_bytes: 2048,
            fetched_at: Utc.timestamp_opt(1_000, 0).single().unwrap(),
            expires_at: None,
            checksum: "abc".into(),
        };
        let first_id = store.upsert_media_entry(entry.clone()).unwrap();
        let mut newer = entry.clone();
        newer.url = "https://cdn.memeverse.in/b.jpg".into();
        newer.fetched_at = Utc.timestamp_opt(2_000, 0).single().unwrap();
        newer.size_bytes = 4096;
        store.upsert_media_entry(newer).unwrap();

        // Re-upserting the same url keeps one row.
        let replay_id = store.upsert_media_entry(entry).unwrap();
        assert_eq!(first_id, replay_id);

        assert_eq!(store.total_media_size().unwrap(), 2048 + 4096);
        let oldest = store.list_oldest_media(1).unwrap();
        assert_eq!(oldest.len(), 1);
        assert!(oldest[0].url.ends_with("a.jpg"));

        store.delete_media_entries(&[oldest[0].id]).unwrap();
        assert_eq!(store.total_media_size().unwrap(), 4096);
        store.close().unwrap();
    }
}
