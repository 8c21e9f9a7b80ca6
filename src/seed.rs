//! Demo data for local and staging environments. Every insert is guarded so
//! running it twice changes nothing.

use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::listings::repo_types::{ListingCondition, ListingStatus};
use crate::slug::slugify;
use crate::users::repo_types::Role;

struct SeedUser {
    id: &'static str,
    display_name: &'static str,
    email: &'static str,
    role: Role,
    verified: bool,
}

const USERS: &[SeedUser] = &[
    SeedUser {
        id: "kCIjyDgvJpNbpCiaePDXHlQwkU02",
        display_name: "Admin",
        email: "admin@example.com",
        role: Role::Admin,
        verified: true,
    },
    SeedUser {
        id: "1UlfK3Ha5jdmreJQzG0L5EMR2BI3",
        display_name: "João Silva",
        email: "joao@example.com",
        role: Role::User,
        verified: true,
    },
    SeedUser {
        id: "pSKSJ1PWTTYqSn1GiB2zgQJ2NUj2",
        display_name: "Maria Souza",
        email: "maria@example.com",
        role: Role::User,
        verified: false,
    },
];

/// (root, children)
const CATEGORIES: &[(&str, &[&str])] = &[
    ("Informática", &["Notebooks", "Periféricos"]),
    ("Eletrônicos", &["Smartphones", "Áudio"]),
];

struct SeedListing {
    owner: usize,
    category: &'static str,
    title: &'static str,
    keywords: &'static str,
    description: &'static str,
    price: f64,
    condition: ListingCondition,
    is_negotiable: bool,
    status: ListingStatus,
}

const LISTINGS: &[SeedListing] = &[
    SeedListing {
        owner: 0,
        category: "Notebooks",
        title: "MacBook Air M2 13\" (2023)",
        keywords: "apple macbook notebook",
        description: "Pouquíssimo uso, bateria com 15 ciclos.",
        price: 7500.0,
        condition: ListingCondition::Used,
        is_negotiable: false,
        status: ListingStatus::Available,
    },
    SeedListing {
        owner: 1,
        category: "Periféricos",
        title: "Teclado Mecânico Redragon Kumara K552",
        keywords: "teclado mecanico redragon",
        description: "Switch Outemu Blue, LED RGB.",
        price: 200.0,
        condition: ListingCondition::New,
        is_negotiable: true,
        status: ListingStatus::Available,
    },
    SeedListing {
        owner: 2,
        category: "Smartphones",
        title: "iPhone 12 128 GB",
        keywords: "apple iphone celular",
        description: "Tela impecável, sempre com película.",
        price: 2700.0,
        condition: ListingCondition::Used,
        is_negotiable: false,
        status: ListingStatus::Available,
    },
    SeedListing {
        owner: 0,
        category: "Áudio",
        title: "Fone Sony WH-1000XM4",
        keywords: "fone headphone sony",
        description: "Cancelamento de ruído líder da categoria.",
        price: 1200.0,
        condition: ListingCondition::Refurbished,
        is_negotiable: true,
        status: ListingStatus::Available,
    },
    SeedListing {
        owner: 1,
        category: "Periféricos",
        title: "Mouse Gamer Logitech G Pro Wireless",
        keywords: "mouse gamer logitech",
        description: "Sensor Hero, perfeito estado.",
        price: 550.0,
        condition: ListingCondition::Used,
        is_negotiable: false,
        status: ListingStatus::Available,
    },
    SeedListing {
        owner: 2,
        category: "Notebooks",
        title: "Dell XPS 13 9310 i7 16 GB",
        keywords: "dell xps notebook",
        description: "Tela 4K, garantia até 2026.",
        price: 8200.0,
        condition: ListingCondition::New,
        is_negotiable: true,
        status: ListingStatus::Available,
    },
    SeedListing {
        owner: 0,
        category: "Smartphones",
        title: "Samsung Galaxy S23 Ultra 256 GB",
        keywords: "samsung galaxy celular",
        description: "Lacre de fábrica, cor verde.",
        price: 5900.0,
        condition: ListingCondition::New,
        is_negotiable: false,
        status: ListingStatus::Available,
    },
    SeedListing {
        owner: 1,
        category: "Áudio",
        title: "Caixa JBL Flip 6",
        keywords: "caixa som jbl",
        description: "À prova d'água IPX7.",
        price: 550.0,
        condition: ListingCondition::Broken,
        is_negotiable: false,
        status: ListingStatus::Deleted,
    },
];

/// (user, listing)
const FAVORITES: &[(usize, usize)] = &[(1, 0), (1, 2), (2, 0), (2, 4), (0, 2), (0, 3)];

pub async fn run(db: &PgPool) -> anyhow::Result<()> {
    let mut tx = db.begin().await.context("begin seed transaction")?;

    for u in USERS {
        sqlx::query(
            r#"
            INSERT INTO users (id, display_name, slug, email, role, verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(u.id)
        .bind(u.display_name)
        .bind(slugify(u.display_name))
        .bind(u.email)
        .bind(u.role)
        .bind(u.verified)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("seed user {}", u.email))?;
    }

    let mut category_ids = Vec::new();
    for (root, children) in CATEGORIES {
        let root_id = category_id(&mut tx, root, None).await?;
        category_ids.push((*root, root_id));
        for child in *children {
            category_ids.push((*child, category_id(&mut tx, child, Some(root_id)).await?));
        }
    }

    let mut listing_ids = Vec::new();
    for l in LISTINGS {
        let category = category_ids
            .iter()
            .find(|(name, _)| *name == l.category)
            .map(|(_, id)| *id)
            .with_context(|| format!("unknown seed category {}", l.category))?;
        let slug = slugify(l.title);
        sqlx::query(
            r#"
            INSERT INTO listings
                (user_id, category_id, title, keywords, slug, description, price,
                 condition, is_negotiable, location, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'São Carlos - SP', $10)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(USERS[l.owner].id)
        .bind(category)
        .bind(l.title)
        .bind(l.keywords)
        .bind(&slug)
        .bind(l.description)
        .bind(l.price)
        .bind(l.condition)
        .bind(l.is_negotiable)
        .bind(l.status)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("seed listing {slug}"))?;

        let id: uuid::Uuid = sqlx::query_scalar("SELECT id FROM listings WHERE slug = $1")
            .bind(&slug)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("load seeded listing {slug}"))?;
        listing_ids.push(id);
    }

    for (user, listing) in FAVORITES {
        sqlx::query("INSERT INTO favorites (user_id, listing_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(USERS[*user].id)
            .bind(listing_ids[*listing])
            .execute(&mut *tx)
            .await
            .context("seed favorite")?;
    }

    tx.commit().await.context("commit seed")?;
    info!(
        users = USERS.len(),
        listings = LISTINGS.len(),
        favorites = FAVORITES.len(),
        "demo data seeded"
    );
    Ok(())
}

/// Id of the category `name` under `parent`, inserting it when missing.
async fn category_id(tx: &mut Transaction<'_, Postgres>, name: &str, parent: Option<i32>) -> anyhow::Result<i32> {
    let existing: Option<i32> = sqlx::query_scalar(
        "SELECT id FROM categories WHERE name = $1 AND parent_id IS NOT DISTINCT FROM $2 ORDER BY id LIMIT 1",
    )
    .bind(name)
    .bind(parent)
    .fetch_optional(&mut **tx)
    .await
    .with_context(|| format!("look up category {name}"))?;
    if let Some(id) = existing {
        return Ok(id);
    }

    sqlx::query_scalar("INSERT INTO categories (name, parent_id) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(parent)
        .fetch_one(&mut **tx)
        .await
        .with_context(|| format!("insert category {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seed_slugs_are_unique() {
        let slugs: HashSet<String> = LISTINGS.iter().map(|l| slugify(l.title)).collect();
        assert_eq!(slugs.len(), LISTINGS.len());
        let users: HashSet<String> = USERS.iter().map(|u| slugify(u.display_name)).collect();
        assert_eq!(users.len(), USERS.len());
    }

    #[test]
    fn references_point_at_seeded_rows() {
        let names: HashSet<&str> = CATEGORIES
            .iter()
            .flat_map(|(root, children)| std::iter::once(*root).chain(children.iter().copied()))
            .collect();
        for l in LISTINGS {
            assert!(names.contains(l.category), "{} has no category", l.title);
            assert!(l.owner < USERS.len());
        }
        for (user, listing) in FAVORITES {
            assert!(*user < USERS.len());
            assert!(*listing < LISTINGS.len());
        }
    }
}
