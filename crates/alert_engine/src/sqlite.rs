use std::path::Path;

use alert_core::{MessageSummary, Record, RecordFormat};
use alert_logging::alert_info;
use rusqlite::{params, Connection};

use crate::sink::{RecordSink, SinkError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alert_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_key TEXT NOT NULL UNIQUE,
    message_id TEXT NOT NULL,
    label TEXT,
    sent_date TEXT NOT NULL,
    harvested_date TEXT NOT NULL,
    format TEXT NOT NULL,
    bibliographic_detail TEXT NOT NULL,
    snippet TEXT NOT NULL,
    title TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_records_label ON alert_records(label);
CREATE TABLE IF NOT EXISTS email_store (
    message_id TEXT PRIMARY KEY,
    harvested_date TEXT NOT NULL,
    sent_date TEXT NOT NULL,
    label_id TEXT,
    record_count INTEGER NOT NULL
);
";

/// Relational sink backed by SQLite.
pub struct SqliteRecordSink {
    conn: Option<Connection>,
}

impl SqliteRecordSink {
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let conn = Connection::open(path)?;
        alert_info!("opened record store {:?}", path);
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection, SinkError> {
        self.conn.as_ref().ok_or(SinkError::Closed)
    }

    pub fn record_count(&self) -> Result<usize, SinkError> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM alert_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Stored records in insertion order.
    pub fn records(&self) -> Result<Vec<Record>, SinkError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT message_id, label, sent_date, harvested_date, format,
                    bibliographic_detail, snippet, title
             FROM alert_records ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let format: String = row.get(4)?;
            Ok(Record {
                message_id: row.get(0)?,
                label: row.get(1)?,
                sent_date: row.get(2)?,
                harvested_date: row.get(3)?,
                format: RecordFormat::from_marker(&format),
                bibliographic_detail: row.get(5)?,
                snippet: row.get(6)?,
                title: row.get(7)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn message_summary(&self, message_id: &str) -> Result<Option<MessageSummary>, SinkError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT message_id, harvested_date, sent_date, label_id, record_count
             FROM email_store WHERE message_id = ?1",
        )?;
        let mut rows = stmt.query_map([message_id], |row| {
            let record_count: i64 = row.get(4)?;
            Ok(MessageSummary {
                message_id: row.get(0)?,
                harvested_date: row.get(1)?,
                sent_date: row.get(2)?,
                label: row.get(3)?,
                record_count: record_count as usize,
            })
        })?;
        let summary = rows.next().transpose()?;
        Ok(summary)
    }
}

impl RecordSink for SqliteRecordSink {
    fn insert_records(&mut self, records: &[Record]) -> Result<usize, SinkError> {
        let conn = self.conn.as_mut().ok_or(SinkError::Closed)?;
        let tx = conn.transaction()?;
        let mut stored = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO alert_records (
                    record_key, message_id, label, sent_date, harvested_date, format,
                    bibliographic_detail, snippet, title
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in records {
                stored += stmt.execute(params![
                    record.natural_key(),
                    record.message_id,
                    record.label,
                    record.sent_date,
                    record.harvested_date,
                    record.format.as_str(),
                    record.bibliographic_detail,
                    record.snippet,
                    record.title,
                ])?;
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    fn record_message(&mut self, summary: &MessageSummary) -> Result<(), SinkError> {
        self.conn()?.execute(
            "INSERT INTO email_store (message_id, harvested_date, sent_date, label_id, record_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(message_id) DO UPDATE SET
                harvested_date = excluded.harvested_date,
                record_count = excluded.record_count",
            params![
                summary.message_id,
                summary.harvested_date,
                summary.sent_date,
                summary.label,
                summary.record_count as i64,
            ],
        )?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| SinkError::Sqlite(err))?;
        }
        Ok(())
    }
}
