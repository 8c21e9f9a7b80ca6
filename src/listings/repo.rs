use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::dto::ListingPatch;
use super::repo_types::{Listing, ListingRow, ListingStatus, NewListing};
use crate::pagination::Pagination;

pub const LISTING_COLUMNS: &str = "l.id, l.user_id, l.category_id, l.title, l.keywords, l.slug, \
     l.description, l.price, l.condition, l.is_negotiable, l.seller_can_deliver, l.location, \
     l.status, l.created_at, l.updated_at";

const JOINED_SELECT: &str = r#"
    SELECT l.id, l.user_id, l.category_id, l.title, l.keywords, l.slug,
           l.description, l.price, l.condition, l.is_negotiable, l.seller_can_deliver,
           l.location, l.status, l.created_at, l.updated_at,
           u.display_name AS seller_display_name,
           u.slug AS seller_slug,
           u.photo_url AS seller_photo_url,
           u.university AS seller_university,
           u.verified AS seller_verified,
           c.name AS category_name,
           c.parent_id AS category_parent_id
      FROM listings l
      JOIN users u ON u.id = l.user_id
      JOIN categories c ON c.id = l.category_id
"#;

/// Which listings a browse query covers.
#[derive(Debug, Default, Clone)]
pub struct ListingScope {
    pub category_id: Option<i32>,
    /// `None` means every status.
    pub status: Option<ListingStatus>,
    /// Excludes logically deleted rows when no status is pinned.
    pub hide_deleted: bool,
    pub user_id: Option<String>,
    pub search: Option<String>,
}

/// Escapes LIKE wildcards and wraps the term for a substring match.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: &ListingScope) {
    qb.push(" WHERE TRUE");
    if let Some(category_id) = scope.category_id {
        qb.push(" AND l.category_id = ").push_bind(category_id);
    }
    match scope.status {
        Some(status) => {
            qb.push(" AND l.status = ").push_bind(status);
        }
        None if scope.hide_deleted => {
            qb.push(" AND l.status <> 'deleted'");
        }
        None => {}
    }
    if let Some(user_id) = &scope.user_id {
        qb.push(" AND l.user_id = ").push_bind(user_id.clone());
    }
    if let Some(q) = &scope.search {
        let pattern = like_pattern(q);
        qb.push(" AND (l.title_search @@ websearch_to_tsquery('simple', ")
            .push_bind(q.clone())
            .push(") OR l.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR l.keywords ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// One page of listings plus the total under the same predicate. Search
/// results are ranked first; ties and plain browsing go newest first.
pub async fn list_page(db: &PgPool, scope: &ListingScope, p: Pagination) -> sqlx::Result<(Vec<ListingRow>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(JOINED_SELECT);
    push_scope(&mut qb, scope);
    qb.push(" ORDER BY ");
    if let Some(q) = &scope.search {
        qb.push("ts_rank(l.title_search, websearch_to_tsquery('simple', ")
            .push_bind(q.clone())
            .push(")) DESC, ");
    }
    qb.push("l.created_at DESC, l.id DESC LIMIT ")
        .push_bind(p.limit())
        .push(" OFFSET ")
        .push_bind(p.offset());
    let rows = qb.build_query_as::<ListingRow>().fetch_all(db).await?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT count(*) FROM listings l");
    push_scope(&mut count, scope);
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;

    Ok((rows, total))
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<Option<Listing>> {
    sqlx::query_as::<_, Listing>(&format!("SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_row(db: &PgPool, id: Uuid) -> sqlx::Result<Option<ListingRow>> {
    sqlx::query_as::<_, ListingRow>(&format!("{JOINED_SELECT} WHERE l.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_row_by_slug(db: &PgPool, slug: &str) -> sqlx::Result<Option<ListingRow>> {
    sqlx::query_as::<_, ListingRow>(&format!("{JOINED_SELECT} WHERE l.slug = $1"))
        .bind(slug)
        .fetch_optional(db)
        .await
}

pub async fn slug_exists(db: &PgPool, slug: &str) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM listings WHERE slug = $1)")
        .bind(slug)
        .fetch_one(db)
        .await
}

pub async fn count_active(db: &PgPool, user_id: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT count(*) FROM listings WHERE user_id = $1 AND status = 'available'",
    )
    .bind(user_id)
    .fetch_one(db)
    .await
}

pub async fn insert(db: &PgPool, user_id: &str, slug: &str, new: &NewListing) -> sqlx::Result<Listing> {
    sqlx::query_as::<_, Listing>(&format!(
        r#"
        INSERT INTO listings AS l (user_id, category_id, title, keywords, slug, description,
                                   price, condition, is_negotiable, seller_can_deliver, location)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {LISTING_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(new.category_id)
    .bind(&new.title)
    .bind(&new.keywords)
    .bind(slug)
    .bind(&new.description)
    .bind(new.price)
    .bind(new.condition)
    .bind(new.is_negotiable)
    .bind(new.seller_can_deliver)
    .bind(&new.location)
    .fetch_one(db)
    .await
}

pub async fn apply_patch(db: &PgPool, id: Uuid, patch: ListingPatch, slug: Option<String>) -> sqlx::Result<Listing> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE listings AS l SET updated_at = now()");
    if let Some(v) = patch.category_id {
        qb.push(", category_id = ").push_bind(v);
    }
    if let Some(v) = patch.title {
        qb.push(", title = ").push_bind(v);
    }
    if let Some(v) = slug {
        qb.push(", slug = ").push_bind(v);
    }
    if let Some(v) = patch.keywords {
        qb.push(", keywords = ").push_bind(v);
    }
    if let Some(v) = patch.description {
        qb.push(", description = ").push_bind(v);
    }
    if let Some(v) = patch.price {
        qb.push(", price = ").push_bind(v);
    }
    if let Some(v) = patch.condition {
        qb.push(", condition = ").push_bind(v);
    }
    if let Some(v) = patch.is_negotiable {
        qb.push(", is_negotiable = ").push_bind(v);
    }
    if let Some(v) = patch.seller_can_deliver {
        qb.push(", seller_can_deliver = ").push_bind(v);
    }
    if let Some(v) = patch.location {
        qb.push(", location = ").push_bind(v);
    }
    qb.push(" WHERE l.id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(LISTING_COLUMNS);
    qb.build_query_as::<Listing>().fetch_one(db).await
}

pub async fn set_status<'e>(db: impl PgExecutor<'e>, id: Uuid, status: ListingStatus) -> sqlx::Result<Option<Listing>> {
    sqlx::query_as::<_, Listing>(&format!(
        "UPDATE listings AS l SET status = $2, updated_at = now() WHERE l.id = $1 RETURNING {LISTING_COLUMNS}"
    ))
    .bind(id)
    .bind(status)
    .fetch_optional(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("iphone"), "%iphone%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn search_scope_uses_same_predicate_for_count() {
        let scope = ListingScope {
            category_id: Some(2),
            status: Some(ListingStatus::Available),
            search: Some("iphone".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT count(*) FROM listings l");
        push_scope(&mut qb, &scope);
        let sql = qb.sql();
        assert!(sql.contains("l.category_id = $1"));
        assert!(sql.contains("l.status = $2"));
        assert!(sql.contains("websearch_to_tsquery('simple', $3)"));
        assert!(sql.contains("l.title ILIKE $4"));
        assert!(sql.contains("l.keywords ILIKE $5"));
    }

    #[test]
    fn unpinned_status_can_hide_deleted() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM listings l");
        push_scope(
            &mut qb,
            &ListingScope {
                hide_deleted: true,
                ..Default::default()
            },
        );
        assert!(qb.sql().ends_with("WHERE TRUE AND l.status <> 'deleted'"));
    }
}
