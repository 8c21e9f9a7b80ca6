use super::dto::{ListingFilter, ListingPatch};
use super::repo::{self, ListingScope};
use super::repo_types::ListingStatus;
use super::services;
use crate::error::ApiError;
use crate::pagination::Pagination;
use crate::testing;
use crate::users::repo_types::Role;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn second_page_of_five_is_newest_first(db: PgPool) {
    let seller = testing::user(&db, "seller", Role::User).await;
    let cat = testing::category(&db, "Books").await;
    let mut ids = Vec::new();
    for i in 0..12 {
        ids.push(testing::listing(&db, &seller, cat, &format!("Book number {i}"), "").await.id);
    }

    let scope = ListingScope {
        status: Some(ListingStatus::Available),
        ..Default::default()
    };
    let (rows, total) = repo::list_page(&db, &scope, Pagination::new(2, 5).unwrap()).await.unwrap();

    assert_eq!(total, 12);
    let got: Vec<_> = rows.iter().map(|r| r.listing.id).collect();
    let expected: Vec<_> = ids.iter().rev().skip(5).take(5).copied().collect();
    assert_eq!(got, expected);
}

#[sqlx::test(migrations = "./migrations")]
async fn search_matches_title_and_keywords(db: PgPool) {
    let seller = testing::user(&db, "seller", Role::User).await;
    let cat = testing::category(&db, "Phones").await;
    let iphone = testing::listing(&db, &seller, cat, "iPhone 12 128 GB", "apple celular").await;
    let samsung = testing::listing(&db, &seller, cat, "Galaxy S23", "samsung celular").await;
    testing::listing(&db, &seller, cat, "Desk lamp", "").await;

    let search = |q: &str| ListingScope {
        status: Some(ListingStatus::Available),
        search: Some(q.to_string()),
        ..Default::default()
    };
    let (rows, total) = repo::list_page(&db, &search("iphone"), Pagination::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].listing.id, iphone.id);

    let (rows, _) = repo::list_page(&db, &search("samsung"), Pagination::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].listing.id, samsung.id);

    let (_, total) = repo::list_page(&db, &search("celular"), Pagination::default()).await.unwrap();
    assert_eq!(total, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn deleted_listings_show_up_for_admins_only(db: PgPool) {
    let state = testing::state_with(db.clone());
    let seller = testing::user(&db, "seller", Role::User).await;
    let admin = testing::user(&db, "boss", Role::Admin).await;
    let cat = testing::category(&db, "Misc").await;
    let gone = testing::listing(&db, &seller, cat, "Old chair", "").await;
    testing::listing(&db, &seller, cat, "New chair", "").await;
    services::delete(&state, &seller, gone.id).await.unwrap();

    let deleted = ListingFilter {
        status: Some(ListingStatus::Deleted),
        ..Default::default()
    };
    let (_, anon_total) = repo::list_page(&db, &services::browse_scope(&deleted, None), Pagination::default())
        .await
        .unwrap();
    assert_eq!(anon_total, 1, "anonymous callers are pinned to available listings");

    let (rows, admin_total) =
        repo::list_page(&db, &services::browse_scope(&deleted, Some(&admin)), Pagination::default())
            .await
            .unwrap();
    assert_eq!(admin_total, 1);
    assert_eq!(rows[0].listing.id, gone.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn only_the_owner_may_update(db: PgPool) {
    let state = testing::state_with(db.clone());
    let owner = testing::user(&db, "owner", Role::User).await;
    let other = testing::user(&db, "other", Role::User).await;
    let cat = testing::category(&db, "Bikes").await;
    let listing = testing::listing(&db, &owner, cat, "Road bike", "").await;

    let patch = ListingPatch {
        price: Some(80.0),
        ..Default::default()
    };
    let err = services::update(&state, &other, listing.id, patch.clone()).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let updated = services::update(&state, &owner, listing.id, patch).await.unwrap();
    assert_eq!(updated.price, 80.0);
}

#[sqlx::test(migrations = "./migrations")]
async fn active_listing_cap_is_enforced(db: PgPool) {
    let mut state = testing::state_with(db.clone());
    std::sync::Arc::make_mut(&mut state.config).max_active_listings = 2;
    let seller = testing::user(&db, "seller", Role::User).await;
    let cat = testing::category(&db, "Games").await;

    for title in ["Chess set", "Go board"] {
        services::create(&state, &seller, testing::new_listing(cat, title, "")).await.unwrap();
    }
    let err = services::create(&state, &seller, testing::new_listing(cat, "Dice", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[sqlx::test(migrations = "./migrations")]
async fn sold_listings_are_searchable_by_admins_only(db: PgPool) {
    let seller = testing::user(&db, "seller", Role::User).await;
    let admin = testing::user(&db, "boss", Role::Admin).await;
    let cat = testing::category(&db, "Phones").await;
    let iphone = testing::listing(&db, &seller, cat, "iPhone 12 128GB", "").await;
    crate::sales::services::create_sale(&db, &seller, iphone.id, Default::default())
        .await
        .unwrap();

    let filter = ListingFilter {
        q: Some("iphone".into()),
        ..Default::default()
    };
    let scoped = |caller| ListingScope {
        search: filter.q.clone(),
        ..services::browse_scope(&filter, caller)
    };

    let (_, anon) = repo::list_page(&db, &scoped(None), Pagination::default()).await.unwrap();
    assert_eq!(anon, 0);
    let (_, user) = repo::list_page(&db, &scoped(Some(&seller)), Pagination::default()).await.unwrap();
    assert_eq!(user, 0);
    let (rows, total) = repo::list_page(&db, &scoped(Some(&admin)), Pagination::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].listing.status, ListingStatus::Sold);
}
