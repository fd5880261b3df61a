//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    Job, JobStatus, JobStore, NewJob, SelectionPolicy, StoreError, Thumbnail, VideoSequence,
};

const JOB_COLUMNS: &str = "id, status, original_path, original_extension, width, height, x_scale, y_scale, duration_secs, frame_rate, compressed_path, attempts, last_error, created_at, updated_at";

const THUMBNAIL_COLUMNS: &str = "id, job_id, idx, timestamp_secs, original_path, compressed_path, placeholder_path, x_scale, y_scale";

/// Statuses that are always selectable, as an SQL list.
const OPEN_STATUSES: &str = "('unprocessed', 'reprocess')";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                original_path TEXT,
                original_extension TEXT NOT NULL,
                width INTEGER,
                height INTEGER,
                x_scale INTEGER,
                y_scale INTEGER,
                duration_secs REAL,
                frame_rate REAL,
                compressed_path TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at);

            CREATE TABLE IF NOT EXISTS thumbnails (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                idx INTEGER NOT NULL,
                timestamp_secs REAL NOT NULL,
                original_path TEXT NOT NULL,
                compressed_path TEXT NOT NULL,
                placeholder_path TEXT NOT NULL,
                x_scale INTEGER NOT NULL,
                y_scale INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_thumbnails_job ON thumbnails(job_id, idx);

            CREATE TABLE IF NOT EXISTS sequences (
                id TEXT PRIMARY KEY,
                target_job_id TEXT NOT NULL UNIQUE REFERENCES jobs(id),
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sequence_members (
                sequence_id TEXT NOT NULL REFERENCES sequences(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                job_id TEXT NOT NULL,
                PRIMARY KEY (sequence_id, position)
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let status_str: String = row.get(1)?;
        let status = status_str.parse::<JobStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;
        let created_at: String = row.get(13)?;
        let updated_at: String = row.get(14)?;

        Ok(Job {
            id: row.get(0)?,
            status,
            original_path: row.get(2)?,
            original_extension: row.get(3)?,
            width: row.get(4)?,
            height: row.get(5)?,
            x_scale: row.get(6)?,
            y_scale: row.get(7)?,
            duration_secs: row.get(8)?,
            frame_rate: row.get(9)?,
            compressed_path: row.get(10)?,
            attempts: row.get(11)?,
            last_error: row.get(12)?,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn row_to_thumbnail(row: &rusqlite::Row) -> rusqlite::Result<Thumbnail> {
        Ok(Thumbnail {
            id: row.get(0)?,
            job_id: row.get(1)?,
            index: row.get(2)?,
            timestamp_secs: row.get(3)?,
            original_path: row.get(4)?,
            compressed_path: row.get(5)?,
            placeholder_path: row.get(6)?,
            x_scale: row.get(7)?,
            y_scale: row.get(8)?,
        })
    }

    fn get_job(conn: &Connection, id: &str) -> Result<Option<Job>, StoreError> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_job)
            .optional()?)
    }

    fn load_sequence(conn: &Connection, sequence_id: &str) -> Result<VideoSequence, StoreError> {
        let (target_job_id, created_at): (String, String) = conn
            .query_row(
                "SELECT target_job_id, created_at FROM sequences WHERE id = ?",
                params![sequence_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(sequence_id.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT job_id FROM sequence_members WHERE sequence_id = ? ORDER BY position ASC",
        )?;
        let member_ids = stmt
            .query_map(params![sequence_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(VideoSequence {
            id: sequence_id.to_string(),
            target_job_id,
            member_ids,
            created_at: parse_timestamp(&created_at),
        })
    }
}

impl JobStore for SqliteJobStore {
    fn create_job(&self, request: NewJob) -> Result<Job, StoreError> {
        let conn = self.conn()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO jobs (id, status, original_path, original_extension, attempts, created_at, updated_at) VALUES (?, ?, ?, ?, 0, ?, ?)",
            params![
                id,
                JobStatus::Unprocessed.as_str(),
                request.original_path,
                request.original_extension,
                timestamp(now),
                timestamp(now),
            ],
        )?;

        Ok(Job {
            id,
            status: JobStatus::Unprocessed,
            original_path: request.original_path,
            original_extension: request.original_extension,
            width: None,
            height: None,
            x_scale: None,
            y_scale: None,
            duration_secs: None,
            frame_rate: None,
            compressed_path: None,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let conn = self.conn()?;
        Self::get_job(&conn, id)
    }

    fn list_all(&self) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM jobs ORDER BY created_at ASC, rowid ASC",
            JOB_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map([], Self::row_to_job)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    fn select_oldest(&self, policy: &SelectionPolicy) -> Result<Option<Job>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM jobs \
             WHERE (status IN {} OR (status = 'error' AND attempts < ?)) \
             AND id NOT IN (SELECT target_job_id FROM sequences) \
             ORDER BY created_at ASC, rowid ASC LIMIT 1",
            JOB_COLUMNS, OPEN_STATUSES
        );
        Ok(conn
            .query_row(&sql, params![policy.max_attempts], Self::row_to_job)
            .optional()?)
    }

    fn claim(
        &self,
        id: &str,
        expected: JobStatus,
        policy: &SelectionPolicy,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE jobs SET status = ?, attempts = attempts + 1, updated_at = ? \
             WHERE id = ? AND status = ? AND (status != 'error' OR attempts < ?)",
            params![
                JobStatus::Processing.as_str(),
                timestamp(Utc::now()),
                id,
                expected.as_str(),
                policy.max_attempts,
            ],
        )?;
        Ok(changed == 1)
    }

    fn update_status(&self, job: &Job) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE jobs SET status = ?, last_error = ?, compressed_path = ?, updated_at = ? WHERE id = ?",
            params![
                job.status.as_str(),
                job.last_error,
                job.compressed_path,
                timestamp(Utc::now()),
                job.id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(job.id.clone()));
        }
        Ok(())
    }

    fn update_metadata(&self, job: &Job) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE jobs SET width = ?, height = ?, x_scale = ?, y_scale = ?, duration_secs = ?, frame_rate = ?, compressed_path = ?, updated_at = ? WHERE id = ?",
            params![
                job.width,
                job.height,
                job.x_scale,
                job.y_scale,
                job.duration_secs,
                job.frame_rate,
                job.compressed_path,
                timestamp(Utc::now()),
                job.id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(job.id.clone()));
        }
        Ok(())
    }

    fn insert_thumbnail(&self, thumbnail: &Thumbnail) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "INSERT INTO thumbnails ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            THUMBNAIL_COLUMNS
        );
        conn.execute(
            &sql,
            params![
                thumbnail.id,
                thumbnail.job_id,
                thumbnail.index,
                thumbnail.timestamp_secs,
                thumbnail.original_path,
                thumbnail.compressed_path,
                thumbnail.placeholder_path,
                thumbnail.x_scale,
                thumbnail.y_scale,
            ],
        )?;
        Ok(())
    }

    fn delete_thumbnails(&self, job_id: &str) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM thumbnails WHERE job_id = ?", params![job_id])?)
    }

    fn list_thumbnails(&self, job_id: &str) -> Result<Vec<Thumbnail>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM thumbnails WHERE job_id = ? ORDER BY idx ASC",
            THUMBNAIL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let thumbnails = stmt
            .query_map(params![job_id], Self::row_to_thumbnail)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(thumbnails)
    }

    fn list_all_thumbnails(&self) -> Result<Vec<Thumbnail>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM thumbnails ORDER BY job_id ASC, idx ASC",
            THUMBNAIL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let thumbnails = stmt
            .query_map([], Self::row_to_thumbnail)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(thumbnails)
    }

    fn create_sequence(
        &self,
        target_job_id: &str,
        member_ids: &[String],
    ) -> Result<VideoSequence, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for id in std::iter::once(target_job_id).chain(member_ids.iter().map(String::as_str)) {
            if Self::get_job(&tx, id)?.is_none() {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        tx.execute(
            "INSERT INTO sequences (id, target_job_id, created_at) VALUES (?, ?, ?)",
            params![id, target_job_id, timestamp(now)],
        )?;
        for (position, member) in member_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO sequence_members (sequence_id, position, job_id) VALUES (?, ?, ?)",
                params![id, position as i64, member],
            )?;
        }
        tx.commit()?;

        Ok(VideoSequence {
            id,
            target_job_id: target_job_id.to_string(),
            member_ids: member_ids.to_vec(),
            created_at: now,
        })
    }

    fn select_ready_sequence(
        &self,
        policy: &SelectionPolicy,
    ) -> Result<Option<VideoSequence>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT s.id FROM sequences s JOIN jobs t ON t.id = s.target_job_id \
             WHERE (t.status IN {} OR (t.status = 'error' AND t.attempts < ?)) \
             AND EXISTS (SELECT 1 FROM sequence_members m WHERE m.sequence_id = s.id) \
             AND NOT EXISTS ( \
                 SELECT 1 FROM sequence_members m LEFT JOIN jobs j ON j.id = m.job_id \
                 WHERE m.sequence_id = s.id \
                 AND (j.id IS NULL OR j.status != 'complete' OR j.compressed_path IS NULL)) \
             ORDER BY t.created_at ASC, s.rowid ASC LIMIT 1",
            OPEN_STATUSES
        );
        let sequence_id: Option<String> = conn
            .query_row(&sql, params![policy.max_attempts], |row| row.get(0))
            .optional()?;

        match sequence_id {
            Some(id) => Ok(Some(Self::load_sequence(&conn, &id)?)),
            None => Ok(None),
        }
    }

    fn mark_reprocess(&self, id: &str) -> Result<Job, StoreError> {
        let conn = self.conn()?;
        let job = Self::get_job(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if job.status == JobStatus::Processing {
            return Err(StoreError::InvalidState {
                job_id: id.to_string(),
                status: job.status.to_string(),
                operation: "reprocess".to_string(),
            });
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?",
            params![JobStatus::Reprocess.as_str(), timestamp(now), id],
        )?;

        Ok(Job {
            status: JobStatus::Reprocess,
            updated_at: now,
            ..job
        })
    }

    fn reset_stale_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let cutoff = timestamp(older_than);

        let ids = {
            let mut stmt = tx.prepare(
                "SELECT id FROM jobs WHERE status = 'processing' AND updated_at < ? ORDER BY created_at ASC",
            )?;
            let ids = stmt
                .query_map(params![cutoff], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        tx.execute(
            "UPDATE jobs SET status = ?, updated_at = ? WHERE status = 'processing' AND updated_at < ?",
            params![
                JobStatus::Unprocessed.as_str(),
                timestamp(Utc::now()),
                cutoff,
            ],
        )?;
        tx.commit()?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> SqliteJobStore {
        SqliteJobStore::in_memory().unwrap()
    }

    fn policy() -> SelectionPolicy {
        SelectionPolicy::new(1)
    }

    fn complete(store: &SqliteJobStore, job: &Job) {
        let mut job = job.clone();
        job.status = JobStatus::Complete;
        job.compressed_path = Some(format!("Compressed/{}.mp4", job.id));
        store.update_status(&job).unwrap();
    }

    fn thumbnail(job_id: &str, index: u32) -> Thumbnail {
        Thumbnail {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            index,
            timestamp_secs: index as f64,
            original_path: format!("T/Originals/{}_{}.png", job_id, index),
            compressed_path: format!("T/Compressed/{}_{}.jpg", job_id, index),
            placeholder_path: format!("T/Placeholders/{}_{}.jpg", job_id, index),
            x_scale: 16,
            y_scale: 9,
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = store();
        let job = store
            .create_job(NewJob::from_remote_path("Originals/a.mov"))
            .unwrap();
        assert_eq!(job.status, JobStatus::Unprocessed);

        let fetched = store.get(&job.id).unwrap().unwrap();
        assert_eq!(fetched.original_extension, ".mov");
        assert_eq!(fetched.original_path.as_deref(), Some("Originals/a.mov"));
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_select_oldest_first() {
        let store = store();
        let first = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();
        let _second = store.create_job(NewJob::from_remote_path("b.mov")).unwrap();

        let selected = store.select_oldest(&policy()).unwrap().unwrap();
        assert_eq!(selected.id, first.id);
    }

    #[test]
    fn test_complete_job_is_never_selected() {
        let store = store();
        let job = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();
        complete(&store, &job);

        assert!(store.select_oldest(&SelectionPolicy::new(100)).unwrap().is_none());
    }

    #[test]
    fn test_claim_is_compare_and_set() {
        let store = store();
        let job = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();

        assert!(store.claim(&job.id, JobStatus::Unprocessed, &policy()).unwrap());
        assert!(!store.claim(&job.id, JobStatus::Unprocessed, &policy()).unwrap());

        let claimed = store.get(&job.id).unwrap().unwrap();
        assert_eq!(claimed.status, JobStatus::Processing);
        assert_eq!(claimed.attempts, 1);
        assert!(store.select_oldest(&policy()).unwrap().is_none());
    }

    #[test]
    fn test_error_jobs_respect_attempt_cap() {
        let store = store();
        let job = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();
        store.claim(&job.id, JobStatus::Unprocessed, &policy()).unwrap();

        let mut failed = store.get(&job.id).unwrap().unwrap();
        failed.status = JobStatus::Error;
        failed.last_error = Some("boom".to_string());
        store.update_status(&failed).unwrap();

        assert!(store.select_oldest(&SelectionPolicy::new(1)).unwrap().is_none());
        let retried = store.select_oldest(&SelectionPolicy::new(2)).unwrap().unwrap();
        assert_eq!(retried.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_claim_of_error_job_checks_attempt_cap() {
        let store = store();
        let job = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();
        store.claim(&job.id, JobStatus::Unprocessed, &policy()).unwrap();

        let mut failed = store.get(&job.id).unwrap().unwrap();
        failed.status = JobStatus::Error;
        store.update_status(&failed).unwrap();

        // selected under a looser cap, claimed under the real one
        assert!(!store
            .claim(&job.id, JobStatus::Error, &SelectionPolicy::new(1))
            .unwrap());
        assert_eq!(store.get(&job.id).unwrap().unwrap().status, JobStatus::Error);

        assert!(store
            .claim(&job.id, JobStatus::Error, &SelectionPolicy::new(2))
            .unwrap());
        let claimed = store.get(&job.id).unwrap().unwrap();
        assert_eq!(claimed.status, JobStatus::Processing);
        assert_eq!(claimed.attempts, 2);
    }

    #[test]
    fn test_update_metadata() {
        let store = store();
        let mut job = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();
        job.width = Some(1920);
        job.height = Some(1080);
        job.x_scale = Some(16);
        job.y_scale = Some(9);
        job.duration_secs = Some(12.5);
        job.frame_rate = Some(29.97);
        store.update_metadata(&job).unwrap();

        let fetched = store.get(&job.id).unwrap().unwrap();
        assert_eq!(fetched.width, Some(1920));
        assert_eq!(fetched.x_scale, Some(16));
        assert_eq!(fetched.duration_secs, Some(12.5));
    }

    #[test]
    fn test_thumbnails_insert_list_delete() {
        let store = store();
        let job = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();
        store.insert_thumbnail(&thumbnail(&job.id, 1)).unwrap();
        store.insert_thumbnail(&thumbnail(&job.id, 0)).unwrap();

        let listed = store.list_thumbnails(&job.id).unwrap();
        assert_eq!(listed.iter().map(|t| t.index).collect::<Vec<_>>(), vec![0, 1]);

        assert_eq!(store.delete_thumbnails(&job.id).unwrap(), 2);
        assert!(store.list_thumbnails(&job.id).unwrap().is_empty());
    }

    #[test]
    fn test_mark_reprocess() {
        let store = store();
        let job = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();
        complete(&store, &job);

        let marked = store.mark_reprocess(&job.id).unwrap();
        assert_eq!(marked.status, JobStatus::Reprocess);
        assert_eq!(store.select_oldest(&policy()).unwrap().unwrap().id, job.id);

        store.claim(&job.id, JobStatus::Reprocess, &policy()).unwrap();
        let err = store.mark_reprocess(&job.id).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));
        assert!(matches!(
            store.mark_reprocess("missing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_sequence_ready_only_when_members_complete() {
        let store = store();
        let a = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();
        let b = store.create_job(NewJob::from_remote_path("b.mov")).unwrap();
        let target = store.create_job(NewJob::stitched(".mp4")).unwrap();
        let sequence = store
            .create_sequence(&target.id, &[a.id.clone(), b.id.clone()])
            .unwrap();

        // target is excluded from the single-job pipeline
        let first = store.select_oldest(&policy()).unwrap().unwrap();
        assert_eq!(first.id, a.id);

        assert!(store.select_ready_sequence(&policy()).unwrap().is_none());
        complete(&store, &a);
        assert!(store.select_ready_sequence(&policy()).unwrap().is_none());
        complete(&store, &b);

        let ready = store.select_ready_sequence(&policy()).unwrap().unwrap();
        assert_eq!(ready.id, sequence.id);
        assert_eq!(ready.member_ids, vec![a.id.clone(), b.id.clone()]);

        complete(&store, &target);
        assert!(store.select_ready_sequence(&policy()).unwrap().is_none());
    }

    #[test]
    fn test_create_sequence_unknown_member() {
        let store = store();
        let target = store.create_job(NewJob::stitched(".mp4")).unwrap();
        let err = store
            .create_sequence(&target.id, &["ghost".to_string()])
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_reset_stale_processing() {
        let store = store();
        let job = store.create_job(NewJob::from_remote_path("a.mov")).unwrap();
        store.claim(&job.id, JobStatus::Unprocessed, &policy()).unwrap();

        let none = store
            .reset_stale_processing(Utc::now() - Duration::hours(1))
            .unwrap();
        assert!(none.is_empty());

        let reset = store
            .reset_stale_processing(Utc::now() + Duration::seconds(1))
            .unwrap();
        assert_eq!(reset, vec![job.id.clone()]);
        assert_eq!(
            store.get(&job.id).unwrap().unwrap().status,
            JobStatus::Unprocessed
        );
    }

    #[test]
    fn test_file_backed_store_persists() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("db/jobs.db");
        let id = {
            let store = SqliteJobStore::new(&path).unwrap();
            store.create_job(NewJob::from_remote_path("a.mov")).unwrap().id
        };
        let reopened = SqliteJobStore::new(&path).unwrap();
        assert!(reopened.get(&id).unwrap().is_some());
    }
}
