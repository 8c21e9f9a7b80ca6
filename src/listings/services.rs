use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use super::dto::{ListingFilter, ListingPatch};
use super::repo::{self, ListingScope};
use super::repo_types::{ImageView, Listing, ListingRow, ListingStatus, ListingView, NewListing};
use crate::auth::policy::{ensure_owner, ensure_owner_or_admin};
use crate::categories;
use crate::error::{is_foreign_key_violation, is_unique_violation, ApiError, ApiResult};
use crate::images;
use crate::slug;
use crate::state::AppState;
use crate::users::repo_types::User;

/// Attaches images (as public URLs) to joined rows, keeping row order.
pub async fn hydrate(st: &AppState, rows: Vec<ListingRow>) -> ApiResult<Vec<ListingView>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.listing.id).collect();
    let mut by_listing: HashMap<Uuid, Vec<ImageView>> = HashMap::new();
    for img in images::repo::list_for_listings(&st.db, &ids).await? {
        by_listing.entry(img.listing_id).or_default().push(ImageView {
            id: img.id,
            src: st.storage.public_url(&img.storage_key),
            display_order: img.display_order,
        });
    }
    Ok(rows
        .into_iter()
        .map(|row| {
            let images = by_listing.remove(&row.listing.id).unwrap_or_default();
            ListingView::from_row(row, images)
        })
        .collect())
}

pub async fn hydrate_one(st: &AppState, row: ListingRow) -> ApiResult<ListingView> {
    let mut views = hydrate(st, vec![row]).await?;
    views
        .pop()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("hydrated listing vanished")))
}

/// Deleted listings are visible to admins only.
pub fn can_view(listing: &Listing, caller: Option<&User>) -> bool {
    listing.status != ListingStatus::Deleted || caller.is_some_and(User::is_admin)
}

pub fn browse_scope(filter: &ListingFilter, caller: Option<&User>) -> ListingScope {
    ListingScope {
        category_id: filter.category_id,
        status: filter.visible_status(caller),
        ..Default::default()
    }
}

/// Scope for a seller's page: admins see everything, the seller sees their
/// non-deleted listings, anyone else only what is available.
pub fn seller_scope(seller: &User, filter: &ListingFilter, caller: Option<&User>) -> ListingScope {
    let (status, hide_deleted) = match caller {
        Some(u) if u.is_admin() => (filter.status, false),
        Some(u) if u.id == seller.id => (filter.status.filter(|s| *s != ListingStatus::Deleted), true),
        _ => (Some(ListingStatus::Available), false),
    };
    ListingScope {
        category_id: filter.category_id,
        status,
        hide_deleted,
        user_id: Some(seller.id.clone()),
        search: None,
    }
}

async fn ensure_category(st: &AppState, category_id: i32) -> ApiResult<()> {
    if !categories::repo::exists(&st.db, category_id).await? {
        return Err(ApiError::validation("invalid category_id"));
    }
    Ok(())
}

fn map_write_error(e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e, Some("idx_listings_slug")) {
        ApiError::conflict("slug taken concurrently, retry")
    } else if is_foreign_key_violation(&e) {
        ApiError::validation("invalid category_id")
    } else {
        e.into()
    }
}

pub async fn create(st: &AppState, caller: &User, new: NewListing) -> ApiResult<Listing> {
    if !caller.verified {
        return Err(ApiError::forbidden("complete onboarding before creating listings"));
    }
    let active = repo::count_active(&st.db, &caller.id).await?;
    if active >= st.config.max_active_listings {
        return Err(ApiError::conflict(format!(
            "active listing limit of {} reached",
            st.config.max_active_listings
        )));
    }
    ensure_category(st, new.category_id).await?;

    let slug = slug::resolve_unique(&new.title, "listing", |s| {
        let db = st.db.clone();
        async move { repo::slug_exists(&db, &s).await }
    })
    .await?;

    let listing = repo::insert(&st.db, &caller.id, &slug, &new)
        .await
        .map_err(map_write_error)?;
    info!(listing_id = %listing.id, slug = %listing.slug, "listing created");
    Ok(listing)
}

pub async fn update(st: &AppState, caller: &User, id: Uuid, patch: ListingPatch) -> ApiResult<Listing> {
    let listing = repo::find(&st.db, id)
        .await?
        .filter(|l| l.status != ListingStatus::Deleted)
        .ok_or_else(|| ApiError::not_found("listing not found"))?;
    ensure_owner(&listing.user_id, caller)?;
    if listing.status == ListingStatus::Sold {
        return Err(ApiError::conflict("sold listings cannot be edited"));
    }
    if let Some(category_id) = patch.category_id {
        if category_id != listing.category_id {
            ensure_category(st, category_id).await?;
        }
    }

    let slug = match patch.title.as_deref() {
        Some(title) if title != listing.title => {
            let current = listing.slug.clone();
            let slug = slug::resolve_unique(title, "listing", |s| {
                let db = st.db.clone();
                let current = current.clone();
                async move {
                    if s == current {
                        Ok(false)
                    } else {
                        repo::slug_exists(&db, &s).await
                    }
                }
            })
            .await?;
            (slug != listing.slug).then_some(slug)
        }
        _ => None,
    };

    let updated = repo::apply_patch(&st.db, id, patch, slug)
        .await
        .map_err(map_write_error)?;
    info!(listing_id = %id, "listing updated");
    Ok(updated)
}

/// Logical delete: the row stays with status `deleted`.
pub async fn delete(st: &AppState, caller: &User, id: Uuid) -> ApiResult<()> {
    let listing = repo::find(&st.db, id)
        .await?
        .filter(|l| l.status != ListingStatus::Deleted)
        .ok_or_else(|| ApiError::not_found("listing not found"))?;
    ensure_owner_or_admin(&listing.user_id, caller)?;
    repo::set_status(&st.db, id, ListingStatus::Deleted).await?;
    info!(listing_id = %id, by = %caller.id, "listing deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::{sample_user, Role};
    use time::OffsetDateTime;

    fn listing(status: ListingStatus) -> Listing {
        let now = OffsetDateTime::now_utc();
        Listing {
            id: Uuid::new_v4(),
            user_id: "ana".into(),
            category_id: 1,
            title: "Cadeira".into(),
            keywords: String::new(),
            slug: "cadeira".into(),
            description: "Cadeira de escritório".into(),
            price: 80.0,
            condition: super::super::repo_types::ListingCondition::Used,
            is_negotiable: true,
            seller_can_deliver: false,
            location: String::new(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn deleted_listings_are_admin_only() {
        let admin = sample_user("root", Role::Admin);
        let owner = sample_user("ana", Role::User);
        assert!(can_view(&listing(ListingStatus::Sold), None));
        assert!(!can_view(&listing(ListingStatus::Deleted), None));
        assert!(!can_view(&listing(ListingStatus::Deleted), Some(&owner)));
        assert!(can_view(&listing(ListingStatus::Deleted), Some(&admin)));
    }

    #[test]
    fn seller_scope_depends_on_caller() {
        let seller = sample_user("ana", Role::User);
        let stranger = sample_user("bob", Role::User);
        let admin = sample_user("root", Role::Admin);
        let filter = ListingFilter::default();

        let own = seller_scope(&seller, &filter, Some(&seller));
        assert_eq!(own.status, None);
        assert!(own.hide_deleted);

        let other = seller_scope(&seller, &filter, Some(&stranger));
        assert_eq!(other.status, Some(ListingStatus::Available));

        let anon = seller_scope(&seller, &filter, None);
        assert_eq!(anon.status, Some(ListingStatus::Available));

        let moderated = seller_scope(&seller, &filter, Some(&admin));
        assert_eq!(moderated.status, None);
        assert!(!moderated.hide_deleted);
        assert_eq!(moderated.user_id.as_deref(), Some("ana"));
    }

    #[tokio::test]
    async fn unverified_user_cannot_create() {
        let state = AppState::fake();
        let mut user = sample_user("ana", Role::User);
        user.verified = false;
        let new = NewListing {
            category_id: 1,
            title: "Cadeira".into(),
            keywords: String::new(),
            description: "Boa".into(),
            price: 10.0,
            condition: super::super::repo_types::ListingCondition::Used,
            is_negotiable: false,
            seller_can_deliver: false,
            location: String::new(),
        };
        let err = create(&state, &user, new).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
