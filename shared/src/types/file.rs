use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{CommonError, CommonResult};

/// The three kinds of artifact users can share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Module,
    Script,
    Kernel,
}

impl FileType {
    pub const ALL: [FileType; 3] = [FileType::Module, FileType::Script, FileType::Kernel];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Module => "module",
            FileType::Script => "script",
            FileType::Kernel => "kernel",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "module" => Ok(FileType::Module),
            "script" => Ok(FileType::Script),
            "kernel" => Ok(FileType::Kernel),
            other => Err(CommonError::ValidationFailed(format!(
                "Invalid file type '{}', expected one of module, script, kernel",
                other
            ))),
        }
    }
}

/// Columns of [`FileRecord`], qualified with the `f` alias used by every file query.
pub const FILE_COLUMNS: &str = "f.id, f.name, f.description, f.file_type, f.category, f.tags, f.url, \
     f.size, f.download_count, f.author_id, f.image, f.version, f.compatibility, \
     f.created_at, f.updated_at";

/// Row of the `files` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub file_type: String,
    pub category: String,
    pub tags: Vec<String>,
    pub url: String,
    pub size: i64,
    pub download_count: i64,
    pub author_id: Uuid,
    pub image: Option<String>,
    pub version: String,
    pub compatibility: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn file_type(&self) -> CommonResult<FileType> {
        self.file_type
            .parse()
            .map_err(|_| CommonError::Internal(format!("Corrupt file type on {}", self.id)))
    }
}

/// A file joined with the author fields shown next to it in listings.
#[derive(Debug, Clone, FromRow)]
pub struct FileWithAuthor {
    #[sqlx(flatten)]
    pub file: FileRecord,
    pub author_name: String,
    pub author_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

/// Public JSON shape of a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub category: String,
    pub tags: Vec<String>,
    pub url: String,
    pub size: i64,
    pub download_count: i64,
    pub author: AuthorRef,
    pub image: Option<String>,
    pub version: String,
    pub compatibility: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FileWithAuthor> for FileSummary {
    type Error = CommonError;

    fn try_from(row: FileWithAuthor) -> Result<Self, Self::Error> {
        let file_type = row.file.file_type()?;
        let file = row.file;

        Ok(Self {
            id: file.id,
            name: file.name,
            description: file.description,
            file_type,
            category: file.category,
            tags: file.tags,
            url: file.url,
            size: file.size,
            download_count: file.download_count,
            author: AuthorRef {
                id: file.author_id,
                name: row.author_name,
                image: row.author_image,
            },
            image: file.image,
            version: file.version,
            compatibility: file.compatibility,
            created_at: file.created_at,
            updated_at: file.updated_at,
        })
    }
}
