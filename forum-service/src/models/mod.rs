use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{PageParams, PageRequest, Pagination};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

pub const TOPICS_PAGE_SIZE: u32 = 20;

/// A topic is hot with at least this many replies...
pub const HOT_REPLY_THRESHOLD: i64 = 15;
/// ...the latest of them no older than this.
pub const HOT_WINDOW_DAYS: i64 = 7;

pub fn is_hot(replies: i64, last_reply_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    replies >= HOT_REPLY_THRESHOLD
        && last_reply_at.is_some_and(|at| now - at <= Duration::days(HOT_WINDOW_DAYS))
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct CategoryRow {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub topics: i64,
    pub posts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub topics: i64,
    pub posts: i64,
}

impl From<CategoryRow> for CategorySummary {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.slug,
            name: row.name,
            description: row.description,
            icon: row.icon,
            color: row.color,
            topics: row.topics,
            posts: row.posts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<CategorySummary>,
}

// ---------------------------------------------------------------------------
// Topic listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Latest,
    Popular,
    Unanswered,
}

impl Tab {
    /// Unknown tabs fall back to latest.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("popular") => Tab::Popular,
            Some("unanswered") => Tab::Unanswered,
            _ => Tab::Latest,
        }
    }

    /// Ordering inside the pinned and unpinned groups
    pub fn order_by(&self) -> &'static str {
        match self {
            Tab::Latest | Tab::Unanswered => "t.created_at DESC",
            Tab::Popular => "t.views DESC, t.created_at DESC",
        }
    }
}

/// Query string of `GET /api/forum/topics`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicQuery {
    pub tab: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicFilter {
    pub tab: Tab,
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: PageRequest,
}

impl From<TopicQuery> for TopicFilter {
    fn from(query: TopicQuery) -> Self {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let page = PageParams {
            page: query.page,
            limit: query.limit,
        }
        .resolve(TOPICS_PAGE_SIZE);

        Self {
            tab: Tab::parse(query.tab.as_deref()),
            category: non_empty(query.category),
            search: non_empty(query.q),
            page,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TopicRow {
    pub id: Uuid,
    pub category: String,
    pub title: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_image: Option<String>,
    pub views: i64,
    pub pinned: bool,
    pub replies: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_reply_at: Option<DateTime<Utc>>,
    pub last_reply_by: Option<Uuid>,
    pub last_reply_name: Option<String>,
    pub last_reply_image: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TopicDetailRow {
    #[sqlx(flatten)]
    pub topic: TopicRow,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForumAuthor {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastReply {
    pub author: ForumAuthor,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub author: ForumAuthor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub replies: i64,
    pub views: i64,
    pub last_reply: Option<LastReply>,
    pub is_pinned: bool,
    pub is_hot: bool,
}

impl TopicSummary {
    pub fn from_row(row: TopicRow, now: DateTime<Utc>) -> Self {
        let is_hot = is_hot(row.replies, row.last_reply_at, now);

        // A reply whose author was deleted keeps its time but has no author to show
        let last_reply = match (row.last_reply_at, row.last_reply_by, row.last_reply_name) {
            (Some(created_at), Some(id), Some(name)) => Some(LastReply {
                author: ForumAuthor {
                    id,
                    name,
                    image: row.last_reply_image,
                },
                created_at,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            title: row.title,
            category: row.category,
            author: ForumAuthor {
                id: row.author_id,
                name: row.author_name,
                image: row.author_image,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
            replies: row.replies,
            views: row.views,
            last_reply,
            is_pinned: row.pinned,
            is_hot,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopicListResponse {
    pub topics: Vec<TopicSummary>,
    pub pagination: Pagination,
}

// ---------------------------------------------------------------------------
// Topic detail and writes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub body: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub body: String,
    pub author: ForumAuthor,
    pub created_at: DateTime<Utc>,
}

impl From<PostRow> for PostView {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            body: row.body,
            author: ForumAuthor {
                id: row.author_id,
                name: row.author_name,
                image: row.author_image,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopicDetail {
    #[serde(flatten)]
    pub summary: TopicSummary,
    pub body: String,
    pub posts: Vec<PostView>,
}

#[derive(Debug, Serialize)]
pub struct TopicDetailResponse {
    pub topic: TopicDetail,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 5, max = 200, message = "Title must be between 5 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,

    #[validate(length(min = 10, max = 20000, message = "Body must be at least 10 characters"))]
    pub body: String,
}

impl CreateTopicRequest {
    /// Strip surrounding whitespace so length rules apply to what gets stored
    pub fn trimmed(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            category: self.category.trim().to_string(),
            body: self.body.trim().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedTopicResponse {
    pub success: bool,
    pub id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplyRequest {
    #[validate(length(min = 1, max = 10000, message = "Reply cannot be empty"))]
    pub body: String,
}

impl ReplyRequest {
    pub fn trimmed(self) -> Self {
        Self {
            body: self.body.trim().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub success: bool,
    pub post: PostView,
}

#[derive(Debug, Deserialize)]
pub struct PinRequest {
    pub pinned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(replies: i64, last_reply_at: Option<DateTime<Utc>>) -> TopicRow {
        let now = Utc::now();
        TopicRow {
            id: Uuid::new_v4(),
            category: "magisk".to_string(),
            title: "Best modules for battery life?".to_string(),
            author_id: Uuid::new_v4(),
            author_name: "Alice".to_string(),
            author_image: None,
            views: 876,
            pinned: false,
            replies,
            created_at: now - Duration::days(30),
            updated_at: now,
            last_reply_at,
            last_reply_by: last_reply_at.map(|_| Uuid::new_v4()),
            last_reply_name: last_reply_at.map(|_| "Bob".to_string()),
            last_reply_image: None,
        }
    }

    #[test]
    fn test_tab_parse() {
        assert_eq!(Tab::parse(None), Tab::Latest);
        assert_eq!(Tab::parse(Some("latest")), Tab::Latest);
        assert_eq!(Tab::parse(Some("popular")), Tab::Popular);
        assert_eq!(Tab::parse(Some("unanswered")), Tab::Unanswered);
        assert_eq!(Tab::parse(Some("trending")), Tab::Latest);
    }

    #[test]
    fn test_hot_rule() {
        let now = Utc::now();

        assert!(is_hot(15, Some(now - Duration::days(6)), now));
        assert!(is_hot(40, Some(now - Duration::days(7)), now));
        assert!(!is_hot(14, Some(now), now));
        assert!(!is_hot(15, Some(now - Duration::days(8)), now));
        assert!(!is_hot(100, None, now));
    }

    #[test]
    fn test_topic_filter_defaults() {
        let filter = TopicFilter::from(TopicQuery {
            category: Some("  ".to_string()),
            q: Some(" bootloop ".to_string()),
            ..Default::default()
        });

        assert_eq!(filter.tab, Tab::Latest);
        assert_eq!(filter.category, None);
        assert_eq!(filter.search.as_deref(), Some("bootloop"));
        assert_eq!(filter.page, PageRequest::new(1, TOPICS_PAGE_SIZE));
    }

    #[test]
    fn test_summary_from_row() {
        let now = Utc::now();
        let summary = TopicSummary::from_row(row(18, Some(now - Duration::hours(3))), now);

        assert!(summary.is_hot);
        assert!(!summary.is_pinned);
        assert_eq!(summary.last_reply.as_ref().map(|r| r.author.name.as_str()), Some("Bob"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["isHot"], true);
        assert_eq!(json["replies"], 18);
        assert!(json["lastReply"]["createdAt"].is_string());
    }

    #[test]
    fn test_unanswered_topic_has_no_last_reply() {
        let summary = TopicSummary::from_row(row(0, None), Utc::now());
        assert_eq!(summary.last_reply, None);
        assert!(!summary.is_hot);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["lastReply"].is_null());
    }

    #[test]
    fn test_create_topic_validation() {
        let ok = CreateTopicRequest {
            title: "Bootloop after flashing kernel".to_string(),
            category: "help".to_string(),
            body: "My device is stuck on the boot logo.".to_string(),
        };
        assert!(ok.validate().is_ok());

        let short_title = CreateTopicRequest {
            title: "Help".to_string(),
            ..ok
        };
        assert!(short_title.validate().is_err());
    }

    #[test]
    fn test_padded_title_is_measured_after_trimming() {
        let padded = CreateTopicRequest {
            title: "    a    ".to_string(),
            category: " help ".to_string(),
            body: "My device is stuck on the boot logo.".to_string(),
        };
        assert!(padded.validate().is_ok());

        let trimmed = padded.trimmed();
        assert_eq!(trimmed.title, "a");
        assert_eq!(trimmed.category, "help");
        assert!(trimmed.validate().is_err());
    }

    #[test]
    fn test_blank_reply_is_rejected_after_trimming() {
        let reply = ReplyRequest {
            body: " \n\t ".to_string(),
        }
        .trimmed();

        assert_eq!(reply.body, "");
        assert!(reply.validate().is_err());
    }
}
