//! CRUD over the relational record store (SQLite).
//!
//! Pure data access: this module knows nothing about the filesystem layout
//! or git. Cross-store coordination is the atomic operation manager's job.

use crate::error::{ForgeError, Result};
use crate::paths;
use crate::types::{DocType, FeatureStatus, ScaleLevel, Scope, StoryStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub scope: Scope,
    pub scale_level: ScaleLevel,
    pub description: String,
    pub owner: String,
    pub status: FeatureStatus,
    pub created_at: DateTime<Utc>,
    /// Repo-relative path, derived from the name.
    pub path: String,
}

impl Feature {
    pub fn new(
        name: impl Into<String>,
        scope: Scope,
        scale_level: ScaleLevel,
        description: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let path = paths::feature_rel_path(&name);
        Self {
            name,
            scope,
            scale_level,
            description: description.into(),
            owner: owner.into(),
            status: FeatureStatus::Active,
            created_at: Utc::now(),
            path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    pub feature: String,
    pub epic_number: u32,
    pub title: String,
    pub status: StoryStatus,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub feature: String,
    pub epic_number: u32,
    pub story_number: u32,
    pub status: StoryStatus,
    pub points: u32,
    /// Repo-relative path of the story file.
    pub file_path: String,
}

impl Story {
    /// The `epic.story` identifier, e.g. `1.2`.
    pub fn story_id(&self) -> String {
        format!("{}.{}", self.epic_number, self.story_number)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Repo-relative path; primary key.
    pub path: String,
    pub doc_type: DocType,
    pub feature: String,
    pub scale_level: ScaleLevel,
    pub epic_number: Option<u32>,
    pub registered_at: DateTime<Utc>,
    pub last_commit_sha: Option<String>,
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Schema migrations, applied in order; `PRAGMA user_version` records how
/// many have run.
const MIGRATIONS: &[&str] = &["
    CREATE TABLE features (
        name        TEXT PRIMARY KEY,
        scope       TEXT NOT NULL,
        scale_level INTEGER NOT NULL,
        description TEXT NOT NULL,
        owner       TEXT NOT NULL,
        status      TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        path        TEXT NOT NULL
    );
    CREATE TABLE epics (
        feature     TEXT NOT NULL REFERENCES features(name) ON DELETE CASCADE,
        epic_number INTEGER NOT NULL,
        title       TEXT NOT NULL,
        status      TEXT NOT NULL,
        points      INTEGER NOT NULL,
        PRIMARY KEY (feature, epic_number)
    );
    CREATE TABLE stories (
        feature      TEXT NOT NULL,
        epic_number  INTEGER NOT NULL,
        story_number INTEGER NOT NULL,
        status       TEXT NOT NULL,
        points       INTEGER NOT NULL,
        file_path    TEXT NOT NULL,
        PRIMARY KEY (feature, epic_number, story_number),
        FOREIGN KEY (feature, epic_number)
            REFERENCES epics(feature, epic_number) ON DELETE CASCADE
    );
    CREATE TABLE documents (
        path            TEXT PRIMARY KEY,
        doc_type        TEXT NOT NULL,
        feature         TEXT NOT NULL,
        scale_level     INTEGER NOT NULL,
        epic_number     INTEGER,
        registered_at   TEXT NOT NULL,
        last_commit_sha TEXT
    );
"];

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

pub struct EntityStore {
    conn: Connection,
}

impl EntityStore {
    /// Open (creating if necessary) the store at `db_path` and apply any
    /// pending schema migrations.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
        conn.execute("PRAGMA foreign_keys=ON;", [])?;

        let store = Self { conn };
        store.migrate_schema()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys=ON;", [])?;
        let store = Self { conn };
        store.migrate_schema()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<u32> {
        let v: u32 = self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        Ok(v)
    }

    /// Number of schema migrations this build knows about.
    pub fn latest_schema_version() -> u32 {
        MIGRATIONS.len() as u32
    }

    /// Apply pending schema migrations. Returns the number applied.
    pub fn migrate_schema(&self) -> Result<u32> {
        let current = self.schema_version()?;
        let mut applied = 0u32;
        for (i, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
            self.conn.execute_batch(sql)?;
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {};", i + 1))?;
            applied += 1;
        }
        if applied > 0 {
            tracing::info!(applied, "applied record store schema migrations");
        }
        Ok(applied)
    }

    /// Flush the WAL into the main database file so a plain file copy sees
    /// every committed write.
    pub fn checkpoint_wal(&self) -> Result<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Features
    // -----------------------------------------------------------------------

    pub fn create_feature(&self, feature: &Feature) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO features
                 (name, scope, scale_level, description, owner, status, created_at, path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    feature.name,
                    feature.scope.as_str(),
                    feature.scale_level.as_u8(),
                    feature.description,
                    feature.owner,
                    feature.status.as_str(),
                    feature.created_at.to_rfc3339(),
                    feature.path,
                ],
            )
            .map_err(|e| map_unique_violation(e, "feature", &feature.name))?;
        Ok(())
    }

    pub fn get_feature(&self, name: &str) -> Result<Option<Feature>> {
        let feature = self
            .conn
            .query_row(
                "SELECT name, scope, scale_level, description, owner, status, created_at, path
                 FROM features WHERE name = ?1",
                params![name],
                row_to_feature,
            )
            .optional()?;
        Ok(feature)
    }

    pub fn list_features(&self, status: Option<FeatureStatus>) -> Result<Vec<Feature>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, scope, scale_level, description, owner, status, created_at, path
             FROM features ORDER BY created_at, name",
        )?;
        let rows = stmt.query_map([], row_to_feature)?;
        let mut features = Vec::new();
        for row in rows {
            let feature = row?;
            if status.is_none() || status == Some(feature.status) {
                features.push(feature);
            }
        }
        Ok(features)
    }

    pub fn update_feature_status(&self, name: &str, status: FeatureStatus) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE features SET status = ?2 WHERE name = ?1",
            params![name, status.as_str()],
        )?;
        if n == 0 {
            return Err(ForgeError::NotFound {
                kind: "feature",
                id: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete_feature(&self, name: &str) -> Result<()> {
        let n = self
            .conn
            .execute("DELETE FROM features WHERE name = ?1", params![name])?;
        if n == 0 {
            return Err(ForgeError::NotFound {
                kind: "feature",
                id: name.to_string(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Epics
    // -----------------------------------------------------------------------

    pub fn create_epic(&self, epic: &Epic) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO epics (feature, epic_number, title, status, points)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    epic.feature,
                    epic.epic_number,
                    epic.title,
                    epic.status.as_str(),
                    epic.points,
                ],
            )
            .map_err(|e| {
                map_unique_violation(e, "epic", &format!("{}/{}", epic.feature, epic.epic_number))
            })?;
        Ok(())
    }

    pub fn get_epic(&self, feature: &str, epic_number: u32) -> Result<Option<Epic>> {
        let epic = self
            .conn
            .query_row(
                "SELECT feature, epic_number, title, status, points
                 FROM epics WHERE feature = ?1 AND epic_number = ?2",
                params![feature, epic_number],
                row_to_epic,
            )
            .optional()?;
        Ok(epic)
    }

    pub fn list_epics(&self, feature: &str) -> Result<Vec<Epic>> {
        let mut stmt = self.conn.prepare(
            "SELECT feature, epic_number, title, status, points
             FROM epics WHERE feature = ?1 ORDER BY epic_number",
        )?;
        let rows = stmt.query_map(params![feature], row_to_epic)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Highest epic number in use for `feature`, or 0.
    pub fn max_epic_number(&self, feature: &str) -> Result<u32> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(epic_number) FROM epics WHERE feature = ?1",
            params![feature],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    pub fn delete_epic(&self, feature: &str, epic_number: u32) -> Result<()> {
        let n = self.conn.execute(
            "DELETE FROM epics WHERE feature = ?1 AND epic_number = ?2",
            params![feature, epic_number],
        )?;
        if n == 0 {
            return Err(ForgeError::NotFound {
                kind: "epic",
                id: format!("{feature}/{epic_number}"),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Stories
    // -----------------------------------------------------------------------

    pub fn create_story(&self, story: &Story) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO stories
                 (feature, epic_number, story_number, status, points, file_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    story.feature,
                    story.epic_number,
                    story.story_number,
                    story.status.as_str(),
                    story.points,
                    story.file_path,
                ],
            )
            .map_err(|e| {
                map_unique_violation(
                    e,
                    "story",
                    &format!("{}/{}", story.feature, story.story_id()),
                )
            })?;
        Ok(())
    }

    pub fn get_story(
        &self,
        feature: &str,
        epic_number: u32,
        story_number: u32,
    ) -> Result<Option<Story>> {
        let story = self
            .conn
            .query_row(
                "SELECT feature, epic_number, story_number, status, points, file_path
                 FROM stories
                 WHERE feature = ?1 AND epic_number = ?2 AND story_number = ?3",
                params![feature, epic_number, story_number],
                row_to_story,
            )
            .optional()?;
        Ok(story)
    }

    pub fn list_stories(&self, feature: &str, epic_number: Option<u32>) -> Result<Vec<Story>> {
        let mut stmt = self.conn.prepare(
            "SELECT feature, epic_number, story_number, status, points, file_path
             FROM stories WHERE feature = ?1 ORDER BY epic_number, story_number",
        )?;
        let rows = stmt.query_map(params![feature], row_to_story)?;
        let mut stories = Vec::new();
        for row in rows {
            let story = row?;
            if epic_number.is_none() || epic_number == Some(story.epic_number) {
                stories.push(story);
            }
        }
        Ok(stories)
    }

    /// Highest story number in use under `feature`/`epic_number`, or 0.
    pub fn max_story_number(&self, feature: &str, epic_number: u32) -> Result<u32> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(story_number) FROM stories WHERE feature = ?1 AND epic_number = ?2",
            params![feature, epic_number],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    pub fn update_story_status(
        &self,
        feature: &str,
        epic_number: u32,
        story_number: u32,
        status: StoryStatus,
    ) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE stories SET status = ?4
             WHERE feature = ?1 AND epic_number = ?2 AND story_number = ?3",
            params![feature, epic_number, story_number, status.as_str()],
        )?;
        if n == 0 {
            return Err(ForgeError::NotFound {
                kind: "story",
                id: format!("{feature}/{epic_number}.{story_number}"),
            });
        }
        Ok(())
    }

    pub fn delete_story(&self, feature: &str, epic_number: u32, story_number: u32) -> Result<()> {
        let n = self.conn.execute(
            "DELETE FROM stories
             WHERE feature = ?1 AND epic_number = ?2 AND story_number = ?3",
            params![feature, epic_number, story_number],
        )?;
        if n == 0 {
            return Err(ForgeError::NotFound {
                kind: "story",
                id: format!("{feature}/{epic_number}.{story_number}"),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    pub fn register_document(&self, doc: &DocumentRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO documents
                 (path, doc_type, feature, scale_level, epic_number, registered_at,
                  last_commit_sha)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    doc.path,
                    doc.doc_type.as_str(),
                    doc.feature,
                    doc.scale_level.as_u8(),
                    doc.epic_number,
                    doc.registered_at.to_rfc3339(),
                    doc.last_commit_sha,
                ],
            )
            .map_err(|e| map_unique_violation(e, "document", &doc.path))?;
        Ok(())
    }

    pub fn get_document(&self, path: &str) -> Result<Option<DocumentRecord>> {
        let doc = self
            .conn
            .query_row(
                "SELECT path, doc_type, feature, scale_level, epic_number, registered_at,
                        last_commit_sha
                 FROM documents WHERE path = ?1",
                params![path],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    /// All registered documents, optionally limited to one feature.
    pub fn list_documents(&self, feature: Option<&str>) -> Result<Vec<DocumentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, doc_type, feature, scale_level, epic_number, registered_at,
                    last_commit_sha
             FROM documents ORDER BY path",
        )?;
        let rows = stmt.query_map([], row_to_document)?;
        let mut docs = Vec::new();
        for row in rows {
            let doc = row?;
            if feature.is_none() || feature == Some(doc.feature.as_str()) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    pub fn set_document_commit(&self, path: &str, sha: &str) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE documents SET last_commit_sha = ?2 WHERE path = ?1",
            params![path, sha],
        )?;
        if n == 0 {
            return Err(ForgeError::NotFound {
                kind: "document",
                id: path.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete_document(&self, path: &str) -> Result<()> {
        let n = self
            .conn
            .execute("DELETE FROM documents WHERE path = ?1", params![path])?;
        if n == 0 {
            return Err(ForgeError::NotFound {
                kind: "document",
                id: path.to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn map_unique_violation(e: rusqlite::Error, kind: &'static str, id: &str) -> ForgeError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &e {
        if inner.code == rusqlite::ErrorCode::ConstraintViolation {
            return ForgeError::DuplicateEntity {
                kind,
                id: id.to_string(),
            };
        }
    }
    e.into()
}

fn parse_datetime(s: String, idx: usize) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_enum<T: FromStr<Err = ForgeError>>(
    s: String,
    idx: usize,
) -> std::result::Result<T, rusqlite::Error> {
    T::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_feature(row: &Row<'_>) -> std::result::Result<Feature, rusqlite::Error> {
    let scale: u8 = row.get(2)?;
    Ok(Feature {
        name: row.get(0)?,
        scope: parse_enum(row.get::<_, String>(1)?, 1)?,
        scale_level: ScaleLevel::from_u8(scale).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Integer,
                Box::new(e),
            )
        })?,
        description: row.get(3)?,
        owner: row.get(4)?,
        status: parse_enum(row.get::<_, String>(5)?, 5)?,
        created_at: parse_datetime(row.get::<_, String>(6)?, 6)?,
        path: row.get(7)?,
    })
}

fn row_to_epic(row: &Row<'_>) -> std::result::Result<Epic, rusqlite::Error> {
    Ok(Epic {
        feature: row.get(0)?,
        epic_number: row.get(1)?,
        title: row.get(2)?,
        status: parse_enum(row.get::<_, String>(3)?, 3)?,
        points: row.get(4)?,
    })
}

fn row_to_story(row: &Row<'_>) -> std::result::Result<Story, rusqlite::Error> {
    Ok(Story {
        feature: row.get(0)?,
        epic_number: row.get(1)?,
        story_number: row.get(2)?,
        status: parse_enum(row.get::<_, String>(3)?, 3)?,
        points: row.get(4)?,
        file_path: row.get(5)?,
    })
}

fn row_to_document(row: &Row<'_>) -> std::result::Result<DocumentRecord, rusqlite::Error> {
    let scale: u8 = row.get(3)?;
    Ok(DocumentRecord {
        path: row.get(0)?,
        doc_type: parse_enum(row.get::<_, String>(1)?, 1)?,
        feature: row.get(2)?,
        scale_level: ScaleLevel::from_u8(scale).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Integer,
                Box::new(e),
            )
        })?,
        epic_number: row.get(4)?,
        registered_at: parse_datetime(row.get::<_, String>(5)?, 5)?,
        last_commit_sha: row.get(6)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(name: &str) -> Feature {
        Feature::new(name, Scope::Feature, ScaleLevel::Standard, "desc", "alice")
    }

    #[test]
    fn feature_create_get_roundtrip() {
        let store = EntityStore::open_in_memory().unwrap();
        let f = feature("user-auth");
        store.create_feature(&f).unwrap();

        let loaded = store.get_feature("user-auth").unwrap().unwrap();
        assert_eq!(loaded.name, "user-auth");
        assert_eq!(loaded.scope, Scope::Feature);
        assert_eq!(loaded.scale_level, ScaleLevel::Standard);
        assert_eq!(loaded.status, FeatureStatus::Active);
        assert_eq!(loaded.path, "docs/features/user-auth");
    }

    #[test]
    fn duplicate_feature_is_typed_error() {
        let store = EntityStore::open_in_memory().unwrap();
        store.create_feature(&feature("dup")).unwrap();
        let err = store.create_feature(&feature("dup")).unwrap_err();
        assert!(matches!(
            err,
            ForgeError::DuplicateEntity { kind: "feature", .. }
        ));
    }

    #[test]
    fn get_missing_feature_is_none() {
        let store = EntityStore::open_in_memory().unwrap();
        assert!(store.get_feature("ghost").unwrap().is_none());
    }

    #[test]
    fn delete_missing_feature_is_not_found() {
        let store = EntityStore::open_in_memory().unwrap();
        let err = store.delete_feature("ghost").unwrap_err();
        assert!(matches!(err, ForgeError::NotFound { kind: "feature", .. }));
    }

    #[test]
    fn list_features_filters_by_status() {
        let store = EntityStore::open_in_memory().unwrap();
        store.create_feature(&feature("one")).unwrap();
        store.create_feature(&feature("two")).unwrap();
        store
            .update_feature_status("two", FeatureStatus::Archived)
            .unwrap();

        let active = store.list_features(Some(FeatureStatus::Active)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "one");
        assert_eq!(store.list_features(None).unwrap().len(), 2);
    }

    #[test]
    fn epic_crud_and_cascade() {
        let store = EntityStore::open_in_memory().unwrap();
        store.create_feature(&feature("user-auth")).unwrap();
        store
            .create_epic(&Epic {
                feature: "user-auth".into(),
                epic_number: 1,
                title: "Login".into(),
                status: StoryStatus::Todo,
                points: 8,
            })
            .unwrap();

        assert_eq!(store.max_epic_number("user-auth").unwrap(), 1);
        assert_eq!(store.list_epics("user-auth").unwrap().len(), 1);

        // Deleting the parent feature cascades to epics.
        store.delete_feature("user-auth").unwrap();
        assert_eq!(store.list_epics("user-auth").unwrap().len(), 0);
    }

    #[test]
    fn duplicate_epic_number_rejected() {
        let store = EntityStore::open_in_memory().unwrap();
        store.create_feature(&feature("f")).unwrap();
        let epic = Epic {
            feature: "f".into(),
            epic_number: 1,
            title: "One".into(),
            status: StoryStatus::Todo,
            points: 1,
        };
        store.create_epic(&epic).unwrap();
        assert!(matches!(
            store.create_epic(&epic).unwrap_err(),
            ForgeError::DuplicateEntity { kind: "epic", .. }
        ));
    }

    #[test]
    fn story_numbering_and_status_update() {
        let store = EntityStore::open_in_memory().unwrap();
        store.create_feature(&feature("f")).unwrap();
        store
            .create_epic(&Epic {
                feature: "f".into(),
                epic_number: 1,
                title: "E".into(),
                status: StoryStatus::Todo,
                points: 5,
            })
            .unwrap();

        assert_eq!(store.max_story_number("f", 1).unwrap(), 0);
        store
            .create_story(&Story {
                feature: "f".into(),
                epic_number: 1,
                story_number: 1,
                status: StoryStatus::Todo,
                points: 2,
                file_path: paths::story_rel_path("f", 1, 1),
            })
            .unwrap();
        assert_eq!(store.max_story_number("f", 1).unwrap(), 1);

        store
            .update_story_status("f", 1, 1, StoryStatus::Done)
            .unwrap();
        let story = store.get_story("f", 1, 1).unwrap().unwrap();
        assert_eq!(story.status, StoryStatus::Done);
        assert_eq!(story.story_id(), "1.1");
    }

    #[test]
    fn document_register_and_update_sha() {
        let store = EntityStore::open_in_memory().unwrap();
        let doc = DocumentRecord {
            path: "docs/features/f/PRD.md".into(),
            doc_type: DocType::Prd,
            feature: "f".into(),
            scale_level: ScaleLevel::Standard,
            epic_number: None,
            registered_at: Utc::now(),
            last_commit_sha: None,
        };
        store.register_document(&doc).unwrap();

        assert!(matches!(
            store.register_document(&doc).unwrap_err(),
            ForgeError::DuplicateEntity { kind: "document", .. }
        ));

        store
            .set_document_commit("docs/features/f/PRD.md", "abc1234")
            .unwrap();
        let loaded = store.get_document("docs/features/f/PRD.md").unwrap().unwrap();
        assert_eq!(loaded.last_commit_sha.as_deref(), Some("abc1234"));
        assert_eq!(loaded.doc_type, DocType::Prd);
    }

    #[test]
    fn schema_migrations_are_idempotent() {
        let store = EntityStore::open_in_memory().unwrap();
        assert_eq!(
            store.schema_version().unwrap(),
            EntityStore::latest_schema_version()
        );
        assert_eq!(store.migrate_schema().unwrap(), 0);
    }
}
