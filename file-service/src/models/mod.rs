use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{split_list, AuthorRef, FileSummary, FileType, PageRequest, Pagination};
use sqlx::FromRow;
use shared::{CommonError, CommonResult};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Query string of `GET /api/files/search`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub category: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    DownloadCount,
    Name,
    Size,
}

impl SortField {
    /// Unknown names fall back to creation time.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("updatedAt") => SortField::UpdatedAt,
            Some("downloadCount") => SortField::DownloadCount,
            Some("name") => SortField::Name,
            Some("size") => SortField::Size,
            _ => SortField::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "f.created_at",
            SortField::UpdatedAt => "f.updated_at",
            SortField::DownloadCount => "f.download_count",
            SortField::Name => "f.name",
            SortField::Size => "f.size",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Normalized search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    pub query: Option<String>,
    pub file_type: Option<FileType>,
    pub category: Option<String>,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub page: PageRequest,
}

impl From<SearchParams> for SearchFilter {
    fn from(params: SearchParams) -> Self {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let page = shared::types::PageParams {
            page: params.page,
            limit: params.limit,
        }
        .resolve(shared::types::pagination::DEFAULT_PAGE_SIZE);

        Self {
            query: non_empty(params.query),
            // Anything other than the three known types is ignored
            file_type: params.file_type.as_deref().and_then(|t| t.parse().ok()),
            category: non_empty(params.category),
            sort_field: SortField::parse(params.sort_by.as_deref()),
            sort_order: SortOrder::parse(params.sort_order.as_deref()),
            page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPagination {
    pub page: u32,
    pub limit: u32,
    pub total_files: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl From<Pagination> for SearchPagination {
    fn from(p: Pagination) -> Self {
        Self {
            page: p.page,
            limit: p.limit,
            total_files: p.total,
            total_pages: p.total_pages,
            has_next_page: p.has_next_page,
            has_prev_page: p.has_prev_page,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub files: Vec<FileSummary>,
    pub pagination: SearchPagination,
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// A binary part of the upload form
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Fields collected from the multipart stream before validation
#[derive(Debug, Default)]
pub struct UploadFormBuilder {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedPart>,
    pub image: Option<UploadedPart>,
}

/// A validated upload
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub file: UploadedPart,
    pub image: Option<UploadedPart>,
    pub name: String,
    pub description: String,
    pub file_type: FileType,
    pub category: String,
    pub version: String,
    pub tags: Vec<String>,
    pub compatibility: Vec<String>,
}

impl UploadFormBuilder {
    fn text(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn build(self) -> CommonResult<UploadForm> {
        let file = self
            .file
            .clone()
            .filter(|part| !part.data.is_empty())
            .ok_or_else(|| CommonError::ValidationFailed("No file provided".to_string()))?;

        let (name, description, file_type, category, version) = match (
            self.text("name"),
            self.text("description"),
            self.text("type"),
            self.text("category"),
            self.text("version"),
        ) {
            (Some(n), Some(d), Some(t), Some(c), Some(v)) => (n, d, t, c, v),
            _ => {
                return Err(CommonError::ValidationFailed(
                    "Missing required fields".to_string(),
                ))
            }
        };

        let file_type: FileType = file_type.parse()?;

        Ok(UploadForm {
            file,
            // An empty image part means the browser sent the field without a file
            image: self.image.clone().filter(|part| !part.data.is_empty()),
            name,
            description,
            file_type,
            category,
            version,
            tags: self.text("tags").map(|t| split_list(&t)).unwrap_or_default(),
            compatibility: self
                .text("compatibility")
                .map(|c| split_list(&c))
                .unwrap_or_default(),
        })
    }
}

/// Insert payload for the `files` table
#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub description: String,
    pub file_type: FileType,
    pub category: String,
    pub tags: Vec<String>,
    pub url: String,
    pub size: i64,
    pub author_id: Uuid,
    pub image: Option<String>,
    pub version: String,
    pub compatibility: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadedFileRef {
    pub id: Uuid,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file: UploadedFileRef,
}

/// Body of `POST /api/files/upload-url`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    #[validate(length(min = 1, max = 255, message = "fileName is required"))]
    pub file_name: String,
    #[validate(length(min = 1, max = 255, message = "contentType is required"))]
    pub content_type: String,
    #[serde(rename = "type")]
    pub file_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub success: bool,
    pub upload_url: String,
    pub key: String,
    pub file_url: String,
    pub expires_in: u64,
}

// ---------------------------------------------------------------------------
// Download / detail
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedFile {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub download_count: i64,
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    pub download_url: String,
    pub file: DownloadedFile,
}

#[derive(Debug, Serialize)]
pub struct FileDetailResponse {
    pub success: bool,
    pub file: FileSummary,
    pub rating: RatingSummary,
}

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

pub const REVIEWS_PAGE_SIZE: u32 = 10;

/// Average of a file's ratings, rounded to one decimal. `None` until someone reviews it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, FromRow)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,

    #[validate(length(min = 1, max = 2000, message = "Comment must be between 1 and 2000 characters"))]
    pub comment: String,
}

impl ReviewRequest {
    pub fn trimmed(self) -> Self {
        Self {
            rating: self.rating,
            comment: self.comment.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub is_like: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_image: Option<String>,
    pub rating: i16,
    pub comment: String,
    pub likes: i64,
    pub dislikes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: Uuid,
    pub user: AuthorRef,
    pub rating: i16,
    pub comment: String,
    pub likes: i64,
    pub dislikes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for ReviewView {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            user: AuthorRef {
                id: row.user_id,
                name: row.user_name,
                image: row.user_image,
            },
            rating: row.rating,
            comment: row.comment,
            likes: row.likes,
            dislikes: row.dislikes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponse {
    pub success: bool,
    pub rating: RatingSummary,
    pub reviews: Vec<ReviewView>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub review: ReviewView,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Serialize)]
pub struct ReactionResponse {
    pub success: bool,
    #[serde(flatten)]
    pub counts: ReactionCounts,
}
