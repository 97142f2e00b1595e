//! Data service: read-only access to the projection catalog
//!
//! The catalog is a SQLite database with one `<method>_configs` table per DR
//! method, a shared `projection_points` table, stored mosaics in
//! `viz_config` / `viz_points`, and an `artists` table.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row};
use thiserror::Error;

use super::point::{ArtistRecord, ConfigSummary, Point, VizConfig};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid method identifier: '{0}'")]
    InvalidMethod(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("catalog connection poisoned")]
    Poisoned,
}

/// Request/response access to projections, mosaics and artist metadata
pub trait DataService: Send + Sync {
    fn fetch_configs(&self, method: &str) -> Result<Vec<ConfigSummary>, DataError>;
    fn fetch_points(&self, method: &str, config_id: i64) -> Result<Vec<Point>, DataError>;
    fn fetch_viz_list(&self) -> Result<Vec<VizConfig>, DataError>;
    fn fetch_viz_config(&self, viz_id: i64) -> Result<VizConfig, DataError>;
    fn fetch_viz_points(&self, viz_id: i64) -> Result<Vec<Point>, DataError>;
    fn fetch_artist(&self, name: &str) -> Result<Option<ArtistRecord>, DataError>;
}

/// Method names end up in table names, so only `[a-z0-9_]` is accepted
pub fn validate_method(method: &str) -> Result<&str, DataError> {
    let ok = !method.is_empty()
        && method
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if ok {
        Ok(method)
    } else {
        Err(DataError::InvalidMethod(method.to_string()))
    }
}

/// Read any SQLite scalar as optional text
fn text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    })
}

/// SQLite-backed catalog
pub struct SqliteDataService {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteDataService {
    /// Open an existing catalog read-only
    pub fn open(path: &Path) -> Result<Self, DataError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        log::info!("Catalog opened: {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an already-open connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            db_path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, DataError> {
        let conn = self.conn.lock().map_err(|_| DataError::Poisoned)?;
        Ok(f(&conn)?)
    }
}

impl DataService for SqliteDataService {
    fn fetch_configs(&self, method: &str) -> Result<Vec<ConfigSummary>, DataError> {
        let table = format!("{}_configs", validate_method(method)?);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT config_id, subset_strategy, subset_size, runtime
                 FROM {} ORDER BY config_id DESC",
                table
            ))?;
            let rows = stmt.query_map([], |row| {
                Ok(ConfigSummary {
                    config_id: row.get(0)?,
                    subset_strategy: text_column(row, 1)?,
                    subset_size: row.get(2)?,
                    runtime: row.get(3)?,
                })
            })?;
            rows.collect()
        })
    }

    fn fetch_points(&self, method: &str, config_id: i64) -> Result<Vec<Point>, DataError> {
        let method = validate_method(method)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT filename, artist, x, y FROM projection_points
                 WHERE method = ?1 AND config_id = ?2
                 ORDER BY point_id",
            )?;
            let rows = stmt.query_map(rusqlite::params![method, config_id], |row| {
                Ok(Point::new(
                    &row.get::<_, String>(0)?,
                    &text_column(row, 1)?.unwrap_or_default(),
                    row.get(2)?,
                    row.get(3)?,
                ))
            })?;
            rows.collect()
        })
    }

    fn fetch_viz_list(&self) -> Result<Vec<VizConfig>, DataError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT viz_id, method, config_id, filename, name
                 FROM viz_config ORDER BY viz_id DESC",
            )?;
            let rows = stmt.query_map([], viz_from_row)?;
            rows.collect()
        })
    }

    fn fetch_viz_config(&self, viz_id: i64) -> Result<VizConfig, DataError> {
        let found = self.with_conn(|conn| {
            conn.query_row(
                "SELECT viz_id, method, config_id, filename, name
                 FROM viz_config WHERE viz_id = ?1",
                [viz_id],
                viz_from_row,
            )
            .optional()
        })?;
        found.ok_or_else(|| DataError::NotFound(format!("visualization {}", viz_id)))
    }

    fn fetch_viz_points(&self, viz_id: i64) -> Result<Vec<Point>, DataError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT filename, artist, viz_x, viz_y FROM viz_points
                 WHERE viz_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map([viz_id], |row| {
                Ok(Point::new(
                    &row.get::<_, String>(0)?,
                    &text_column(row, 1)?.unwrap_or_default(),
                    row.get(2)?,
                    row.get(3)?,
                ))
            })?;
            rows.collect()
        })
    }

    fn fetch_artist(&self, name: &str) -> Result<Option<ArtistRecord>, DataError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT name, years, genre, nationality, bio, wikipedia, paintings
                 FROM artists WHERE name = ?1",
                [name],
                |row| {
                    Ok(ArtistRecord {
                        name: row.get(0)?,
                        years: text_column(row, 1)?,
                        genre: text_column(row, 2)?,
                        nationality: text_column(row, 3)?,
                        bio: text_column(row, 4)?,
                        wikipedia: text_column(row, 5)?,
                        paintings: text_column(row, 6)?,
                    })
                },
            )
            .optional()
        })
    }
}

fn viz_from_row(row: &Row<'_>) -> rusqlite::Result<VizConfig> {
    Ok(VizConfig {
        viz_id: row.get(0)?,
        method: row.get(1)?,
        config_id: row.get(2)?,
        filename: text_column(row, 3)?,
        name: text_column(row, 4)?,
    })
}
