use shared::database::contains_pattern;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{CategoryRow, PostRow, Tab, TopicDetailRow, TopicFilter, TopicRow};

const TOPIC_COLUMNS: &str = "t.id, t.category, t.title, t.author_id, a.name AS author_name, \
     a.image AS author_image, t.views, t.pinned, t.created_at, t.updated_at, \
     t.last_reply_at, t.last_reply_by, r.name AS last_reply_name, r.image AS last_reply_image, \
     (SELECT COUNT(*) FROM forum_posts p WHERE p.topic_id = t.id) AS replies";

const TOPIC_FROM: &str = "FROM forum_topics t \
     JOIN users a ON a.id = t.author_id \
     LEFT JOIN users r ON r.id = t.last_reply_by";

/// Categories in display order with their topic and post counts.
/// Posts count every message: the opening post of each topic plus replies.
pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryRow>, sqlx::Error> {
    sqlx::query_as::<_, CategoryRow>(
        r#"
        SELECT c.slug, c.name, c.description, c.icon, c.color,
               COUNT(DISTINCT t.id) AS topics,
               COUNT(DISTINCT t.id) + COUNT(p.id) AS posts
        FROM forum_categories c
        LEFT JOIN forum_topics t ON t.category = c.slug
        LEFT JOIN forum_posts p ON p.topic_id = t.id
        GROUP BY c.slug, c.name, c.description, c.icon, c.color, c.position
        ORDER BY c.position
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn category_exists(pool: &PgPool, slug: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM forum_categories WHERE slug = $1)")
        .bind(slug)
        .fetch_one(pool)
        .await
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &TopicFilter) {
    builder.push(" WHERE TRUE");

    if let Some(category) = &filter.category {
        builder.push(" AND t.category = ").push_bind(category.clone());
    }

    if let Some(search) = &filter.search {
        let pattern = contains_pattern(search);
        builder
            .push(" AND (t.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.category ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR a.name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if filter.tab == Tab::Unanswered {
        builder.push(" AND NOT EXISTS (SELECT 1 FROM forum_posts p WHERE p.topic_id = t.id)");
    }
}

/// Page query for the topic list. Pinned topics always sort first.
pub fn build_topics_query(filter: &TopicFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {} {}", TOPIC_COLUMNS, TOPIC_FROM));

    push_filters(&mut builder, filter);

    builder
        .push(" ORDER BY t.pinned DESC, ")
        .push(filter.tab.order_by())
        .push(", t.id LIMIT ")
        .push_bind(filter.page.limit())
        .push(" OFFSET ")
        .push_bind(filter.page.offset());

    builder
}

pub fn build_topics_count_query(filter: &TopicFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM forum_topics t JOIN users a ON a.id = t.author_id");
    push_filters(&mut builder, filter);
    builder
}

pub async fn list_topics(
    pool: &PgPool,
    filter: &TopicFilter,
) -> Result<(Vec<TopicRow>, i64), sqlx::Error> {
    let topics = build_topics_query(filter)
        .build_query_as::<TopicRow>()
        .fetch_all(pool)
        .await?;

    let total: i64 = build_topics_count_query(filter)
        .build_query_scalar()
        .fetch_one(pool)
        .await?;

    Ok((topics, total))
}

pub async fn create_topic(
    pool: &PgPool,
    author_id: Uuid,
    category: &str,
    title: &str,
    body: &str,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO forum_topics (category, title, body, author_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(category)
    .bind(title)
    .bind(body)
    .bind(author_id)
    .fetch_one(pool)
    .await
}

/// Count a view, returning `false` when the topic does not exist
pub async fn increment_views(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE forum_topics SET views = views + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_topic(pool: &PgPool, id: Uuid) -> Result<Option<TopicDetailRow>, sqlx::Error> {
    sqlx::query_as::<_, TopicDetailRow>(&format!(
        "SELECT {}, t.body {} WHERE t.id = $1",
        TOPIC_COLUMNS, TOPIC_FROM
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_posts(pool: &PgPool, topic_id: Uuid) -> Result<Vec<PostRow>, sqlx::Error> {
    sqlx::query_as::<_, PostRow>(
        r#"
        SELECT p.id, p.body, p.author_id, u.name AS author_name, u.image AS author_image, p.created_at
        FROM forum_posts p
        JOIN users u ON u.id = p.author_id
        WHERE p.topic_id = $1
        ORDER BY p.created_at ASC, p.id
        "#,
    )
    .bind(topic_id)
    .fetch_all(pool)
    .await
}

/// Add a reply and move the topic's last-reply marker to it in one transaction.
/// Returns `None` when the topic does not exist.
pub async fn create_reply(
    pool: &PgPool,
    topic_id: Uuid,
    author_id: Uuid,
    body: &str,
) -> Result<Option<PostRow>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE forum_topics
        SET last_reply_at = NOW(), last_reply_by = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(topic_id)
    .bind(author_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let post = sqlx::query_as::<_, PostRow>(
        r#"
        WITH inserted AS (
            INSERT INTO forum_posts (topic_id, author_id, body, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, body, author_id, created_at
        )
        SELECT i.id, i.body, i.author_id, u.name AS author_name, u.image AS author_image, i.created_at
        FROM inserted i
        JOIN users u ON u.id = i.author_id
        "#,
    )
    .bind(topic_id)
    .bind(author_id)
    .bind(body)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(post))
}

pub async fn set_pinned(pool: &PgPool, id: Uuid, pinned: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE forum_topics SET pinned = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(pinned)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_topic_author(pool: &PgPool, id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT author_id FROM forum_topics WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Delete a topic and, through the cascade, its replies
pub async fn delete_topic(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM forum_topics WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
