//! JSON-Lines journal of the mutations applied to relations.
//!
//! Multi-statement operations are not atomic. Every step that reached the
//! engine gets one line, and replaying the file tells which staged
//! replacements were left open by a failure between their two phases.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use uuid::Uuid;

use crate::lifecycle::{RelationKind, StagedRelation};

#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub enabled: bool,
    pub log_path: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: PathBuf::from("./logs/operations.jsonl"),
        }
    }
}

#[derive(Debug)]
pub struct OperationJournal {
    path: PathBuf,
    writer: Mutex<()>,
}

impl OperationJournal {
    /// Prepares the journal file location. The file itself is created by the
    /// first append.
    pub fn open(config: &JournalConfig) -> Result<Self> {
        if let Some(dir) = config
            .log_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating journal directory {}", dir.display()))?;
        }

        Ok(Self {
            path: config.log_path.clone(),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry).context("serializing journal entry")?;
        line.push('\n');

        let _writer = self.writer.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening journal {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("writing journal {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }

    /// Replays the journal and returns, in staging order, every staged
    /// relation that no later `replaced` or `dropped` line closes. A missing
    /// file has no open replacements.
    pub async fn open_replacements(&self) -> Result<Vec<StagedRelation>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading journal {}", self.path.display()))
            }
        };

        let mut open: Vec<StagedRelation> = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: JournalEntry = serde_json::from_str(line).with_context(|| {
                format!("{}:{} is not a journal entry", self.path.display(), number + 1)
            })?;

            match entry.action {
                JournalAction::Staged { target, kind } => {
                    open.retain(|candidate| candidate.staged != entry.relation);
                    open.push(StagedRelation {
                        staged: entry.relation,
                        target,
                        kind,
                    });
                }
                JournalAction::Replaced { staged } => {
                    open.retain(|candidate| candidate.staged != staged);
                }
                JournalAction::Dropped { .. } => {
                    open.retain(|candidate| candidate.staged != entry.relation);
                }
                _ => {}
            }
        }
        Ok(open)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub relation: String,
    #[serde(flatten)]
    pub action: JournalAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum JournalAction {
    Created { kind: RelationKind, srid: i32 },
    /// The relation exists and waits to replace `target`.
    Staged { target: String, kind: RelationKind },
    Replaced { staged: String },
    Dropped { kind: RelationKind },
    Indexed { index: String },
    Reprojected { geometry_type: String, srid: i32 },
    Flattened { geometry_type: String, srid: i32 },
    MadeMultipart { srid: i32 },
}

impl JournalEntry {
    pub fn new(relation: impl Into<String>, action: JournalAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            relation: relation.into(),
            action,
        }
    }
}
