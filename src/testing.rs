//! Fixtures for tests that run against a live database.

use sqlx::PgPool;
use uuid::Uuid;

use crate::listings::repo_types::{Listing, ListingCondition, NewListing};
use crate::state::AppState;
use crate::users::repo_types::{NewUser, Role, User};
use crate::{categories, listings, users};

pub fn state_with(db: PgPool) -> AppState {
    AppState { db, ..AppState::fake() }
}

pub async fn user(db: &PgPool, id: &str, role: Role) -> User {
    let new = NewUser {
        id: id.to_string(),
        display_name: format!("User {id}"),
        email: format!("{id}@usp.br"),
        photo_url: None,
        university: None,
    };
    users::repo::insert(db, &new, &format!("user-{id}")).await.unwrap();
    sqlx::query("UPDATE users SET verified = TRUE, role = $2 WHERE id = $1")
        .bind(id)
        .bind(role)
        .execute(db)
        .await
        .unwrap();
    users::repo::find_by_id(db, id).await.unwrap().unwrap()
}

pub async fn category(db: &PgPool, name: &str) -> i32 {
    categories::repo::insert(db, name, None).await.unwrap().id
}

pub fn new_listing(category_id: i32, title: &str, keywords: &str) -> NewListing {
    NewListing {
        category_id,
        title: title.to_string(),
        keywords: keywords.to_string(),
        description: format!("{title} in good shape"),
        price: 100.0,
        condition: ListingCondition::Used,
        is_negotiable: false,
        seller_can_deliver: false,
        location: String::new(),
    }
}

pub async fn listing(db: &PgPool, owner: &User, category_id: i32, title: &str, keywords: &str) -> Listing {
    let slug = format!("{}-{}", crate::slug::slugify(title), Uuid::new_v4().simple());
    listings::repo::insert(db, &owner.id, &slug, &new_listing(category_id, title, keywords))
        .await
        .unwrap()
}
