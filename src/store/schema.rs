//! Table layout and in-place upgrades of the relational store

use rusqlite::Connection;

use super::errors::StoreResult;

const CREATE_VEHICLES_SQL: &str = r"
CREATE TABLE IF NOT EXISTS vehicles (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  nickname TEXT NOT NULL DEFAULT '',
  year INTEGER,
  make TEXT NOT NULL DEFAULT '',
  model TEXT NOT NULL DEFAULT '',
  vin TEXT NOT NULL DEFAULT '',
  owner_first TEXT NOT NULL DEFAULT '',
  owner_last TEXT NOT NULL DEFAULT '',
  current_mileage INTEGER NOT NULL DEFAULT 0,
  oil_quarts REAL,
  oil_weight TEXT NOT NULL DEFAULT '',
  service_interval_miles INTEGER NOT NULL DEFAULT 5000,
  service_interval_months INTEGER NOT NULL DEFAULT 6,
  image_path TEXT,
  vin_decoded_json TEXT,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
";

const CREATE_SERVICE_ENTRIES_SQL: &str = r"
CREATE TABLE IF NOT EXISTS service_entries (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  vehicle_id INTEGER NOT NULL,
  date TEXT NOT NULL,
  mileage INTEGER,
  oil_brand TEXT NOT NULL DEFAULT '',
  oil_weight TEXT NOT NULL DEFAULT '',
  oil_quarts REAL,
  filter_brand TEXT NOT NULL DEFAULT '',
  filter_part TEXT NOT NULL DEFAULT '',
  notes TEXT NOT NULL DEFAULT '',
  receipt_path TEXT,
  photo_paths_json TEXT NOT NULL DEFAULT '[]',
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
);
";

const CREATE_INDEXES_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_service_entries_vehicle ON service_entries(vehicle_id);
";

/// Create missing tables and bring older layouts up to date.
pub fn apply(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(CREATE_VEHICLES_SQL)?;
    conn.execute_batch(CREATE_SERVICE_ENTRIES_SQL)?;

    // Databases created before photos existed lack the column
    if !table_has_column(conn, "service_entries", "photo_paths_json")? {
        conn.execute_batch(
            "ALTER TABLE service_entries ADD COLUMN photo_paths_json TEXT NOT NULL DEFAULT '[]'",
        )?;
    }

    conn.execute_batch(CREATE_INDEXES_SQL)?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info('{}')", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
