use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use shared::types::{FileRecord, FileWithAuthor, PageRequest, FILE_COLUMNS};

use crate::models::{NewFile, RatingSummary, ReactionCounts, ReviewRow, SearchFilter};

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &SearchFilter) {
    builder.push(" WHERE TRUE");

    if let Some(query) = &filter.query {
        builder
            .push(" AND f.search_vector @@ websearch_to_tsquery('english', ")
            .push_bind(query.clone())
            .push(")");
    }

    if let Some(file_type) = filter.file_type {
        builder.push(" AND f.file_type = ").push_bind(file_type.as_str());
    }

    if let Some(category) = &filter.category {
        builder.push(" AND f.category = ").push_bind(category.clone());
    }
}

/// Page query for a search. Sorts by the requested column, then by text rank
/// when a query is present.
pub fn build_search_query(filter: &SearchFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {}, u.name AS author_name, u.image AS author_image \
         FROM files f JOIN users u ON u.id = f.author_id",
        FILE_COLUMNS
    ));

    push_filters(&mut builder, filter);

    builder
        .push(" ORDER BY ")
        .push(filter.sort_field.column())
        .push(" ")
        .push(filter.sort_order.as_sql());

    if let Some(query) = &filter.query {
        builder
            .push(", ts_rank(f.search_vector, websearch_to_tsquery('english', ")
            .push_bind(query.clone())
            .push(")) DESC");
    }

    builder
        .push(" LIMIT ")
        .push_bind(filter.page.limit())
        .push(" OFFSET ")
        .push_bind(filter.page.offset());

    builder
}

pub fn build_count_query(filter: &SearchFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM files f");
    push_filters(&mut builder, filter);
    builder
}

/// Search files, returning one page and the total number of matches
pub async fn search_files(
    pool: &PgPool,
    filter: &SearchFilter,
) -> Result<(Vec<FileWithAuthor>, i64), sqlx::Error> {
    let files = build_search_query(filter)
        .build_query_as::<FileWithAuthor>()
        .fetch_all(pool)
        .await?;

    let (total,): (i64,) = build_count_query(filter)
        .build_query_as()
        .fetch_one(pool)
        .await?;

    Ok((files, total))
}

/// Create a new file record in the database
pub async fn create_file(pool: &PgPool, new_file: NewFile) -> Result<FileRecord, sqlx::Error> {
    let file = sqlx::query_as::<_, FileRecord>(
        r#"
        INSERT INTO files (
            name,
            description,
            file_type,
            category,
            tags,
            url,
            size,
            download_count,
            author_id,
            image,
            version,
            compatibility
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9, $10, $11)
        RETURNING id, name, description, file_type, category, tags, url, size,
                  download_count, author_id, image, version, compatibility,
                  created_at, updated_at
        "#,
    )
    .bind(&new_file.name)
    .bind(&new_file.description)
    .bind(new_file.file_type.as_str())
    .bind(&new_file.category)
    .bind(&new_file.tags)
    .bind(&new_file.url)
    .bind(new_file.size)
    .bind(new_file.author_id)
    .bind(&new_file.image)
    .bind(&new_file.version)
    .bind(&new_file.compatibility)
    .fetch_one(pool)
    .await?;

    tracing::info!("Created file record: id={}", file.id);
    Ok(file)
}

pub async fn get_file(pool: &PgPool, id: Uuid) -> Result<Option<FileRecord>, sqlx::Error> {
    sqlx::query_as::<_, FileRecord>(&format!("SELECT {} FROM files f WHERE f.id = $1", FILE_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_file_with_author(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<FileWithAuthor>, sqlx::Error> {
    sqlx::query_as::<_, FileWithAuthor>(&format!(
        "SELECT {}, u.name AS author_name, u.image AS author_image \
         FROM files f JOIN users u ON u.id = f.author_id WHERE f.id = $1",
        FILE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Atomically bump the download counter, returning the new value
pub async fn increment_download_count(pool: &PgPool, id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE files
        SET download_count = download_count + 1
        WHERE id = $1
        RETURNING download_count
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

/// Remember that a user downloaded a file. Repeated downloads are no-ops.
pub async fn record_download(pool: &PgPool, user_id: Uuid, file_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO user_downloads (user_id, file_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, file_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(file_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_file(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM files WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn file_exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM files WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
}

const REVIEW_SELECT: &str = "SELECT r.id, r.file_id, r.user_id, u.name AS user_name, \
     u.image AS user_image, r.rating, r.comment, \
     (SELECT COUNT(*) FROM review_reactions x WHERE x.review_id = r.id AND x.is_like) AS likes, \
     (SELECT COUNT(*) FROM review_reactions x WHERE x.review_id = r.id AND NOT x.is_like) AS dislikes, \
     r.created_at, r.updated_at \
     FROM file_reviews r JOIN users u ON u.id = r.user_id";

pub async fn rating_summary(pool: &PgPool, file_id: Uuid) -> Result<RatingSummary, sqlx::Error> {
    sqlx::query_as::<_, RatingSummary>(
        r#"
        SELECT ROUND(AVG(rating)::NUMERIC, 1)::FLOAT8 AS average, COUNT(*) AS count
        FROM file_reviews
        WHERE file_id = $1
        "#,
    )
    .bind(file_id)
    .fetch_one(pool)
    .await
}

/// One page of a file's reviews, newest first, and the total count
pub async fn list_reviews(
    pool: &PgPool,
    file_id: Uuid,
    page: PageRequest,
) -> Result<(Vec<ReviewRow>, i64), sqlx::Error> {
    let reviews = sqlx::query_as::<_, ReviewRow>(&format!(
        "{} WHERE r.file_id = $1 ORDER BY r.created_at DESC, r.id LIMIT $2 OFFSET $3",
        REVIEW_SELECT
    ))
    .bind(file_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_reviews WHERE file_id = $1")
        .bind(file_id)
        .fetch_one(pool)
        .await?;

    Ok((reviews, total))
}

pub async fn get_review(pool: &PgPool, id: Uuid) -> Result<Option<ReviewRow>, sqlx::Error> {
    sqlx::query_as::<_, ReviewRow>(&format!("{} WHERE r.id = $1", REVIEW_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Create the user's review of a file, or replace the one they already wrote.
/// Returns the review id and whether it was newly created.
pub async fn upsert_review(
    pool: &PgPool,
    file_id: Uuid,
    user_id: Uuid,
    rating: i16,
    comment: &str,
) -> Result<(Uuid, bool), sqlx::Error> {
    sqlx::query_as::<_, (Uuid, bool)>(
        r#"
        INSERT INTO file_reviews (file_id, user_id, rating, comment)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (file_id, user_id) DO UPDATE
        SET rating = EXCLUDED.rating, comment = EXCLUDED.comment, updated_at = NOW()
        RETURNING id, (xmax = 0) AS created
        "#,
    )
    .bind(file_id)
    .bind(user_id)
    .bind(rating)
    .bind(comment)
    .fetch_one(pool)
    .await
}

/// Like or dislike a review. A second reaction from the same user replaces the first.
pub async fn set_reaction(
    pool: &PgPool,
    review_id: Uuid,
    user_id: Uuid,
    is_like: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO review_reactions (review_id, user_id, is_like)
        VALUES ($1, $2, $3)
        ON CONFLICT (review_id, user_id) DO UPDATE SET is_like = EXCLUDED.is_like
        "#,
    )
    .bind(review_id)
    .bind(user_id)
    .bind(is_like)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn clear_reaction(pool: &PgPool, review_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM review_reactions WHERE review_id = $1 AND user_id = $2")
        .bind(review_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn reaction_counts(pool: &PgPool, review_id: Uuid) -> Result<ReactionCounts, sqlx::Error> {
    sqlx::query_as::<_, ReactionCounts>(
        r#"
        SELECT COUNT(*) FILTER (WHERE is_like) AS likes,
               COUNT(*) FILTER (WHERE NOT is_like) AS dislikes
        FROM review_reactions
        WHERE review_id = $1
        "#,
    )
    .bind(review_id)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchParams, SortField, SortOrder};
    use shared::types::FileType;

    fn filter() -> SearchFilter {
        SearchFilter {
            query: None,
            file_type: None,
            category: None,
            sort_field: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
            page: PageRequest::new(1, 12),
        }
    }

    #[test]
    fn test_unfiltered_search_has_no_predicates() {
        let query = build_search_query(&filter());
        let sql = query.sql();

        assert!(sql.contains("FROM files f JOIN users u ON u.id = f.author_id WHERE TRUE ORDER BY"));
        assert!(!sql.contains("search_vector"));
        assert!(!sql.contains("f.file_type ="));
        assert!(sql.ends_with("ORDER BY f.created_at DESC LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_text_query_adds_rank_after_sort_field() {
        let mut f = filter();
        f.query = Some("battery saver".to_string());
        f.sort_field = SortField::DownloadCount;
        f.sort_order = SortOrder::Asc;

        let query = build_search_query(&f);
        let sql = query.sql();

        assert!(sql.contains("f.search_vector @@ websearch_to_tsquery('english', $1)"));
        assert!(sql.contains(
            "ORDER BY f.download_count ASC, ts_rank(f.search_vector, websearch_to_tsquery('english', $2)) DESC"
        ));
        assert!(sql.ends_with("LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn test_type_and_category_filters() {
        let mut f = filter();
        f.file_type = Some(FileType::Kernel);
        f.category = Some("performance".to_string());

        let query = build_search_query(&f);
        assert!(query.sql().contains("AND f.file_type = $1 AND f.category = $2"));

        let count = build_count_query(&f);
        assert_eq!(
            count.sql(),
            "SELECT COUNT(*) FROM files f WHERE TRUE AND f.file_type = $1 AND f.category = $2"
        );
    }

    #[test]
    fn test_invalid_type_param_never_reaches_sql() {
        let f = SearchFilter::from(SearchParams {
            file_type: Some("kernel' OR 1=1 --".to_string()),
            ..Default::default()
        });

        let count = build_count_query(&f);
        assert_eq!(count.sql(), "SELECT COUNT(*) FROM files f WHERE TRUE");
    }

    #[test]
    fn test_review_select_counts_reactions_per_review() {
        assert!(REVIEW_SELECT.starts_with("SELECT r.id, r.file_id, r.user_id"));
        assert!(REVIEW_SELECT.contains("x.review_id = r.id AND x.is_like) AS likes"));
        assert!(REVIEW_SELECT.contains("x.review_id = r.id AND NOT x.is_like) AS dislikes"));
        assert!(REVIEW_SELECT.ends_with("FROM file_reviews r JOIN users u ON u.id = r.user_id"));
    }
}
