//! Seed the catalogue with the starter categories and pages.
//!
//! Safe to run repeatedly: existing categories and pages are left alone.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rango::{
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{SqlxCategoryRepository, SqlxPageRepository},
    },
    models::{CreateCategoryInput, CreatePageInput},
    services::{generate_slug, CategoryService, PageService},
};

struct SeedCategory {
    name: &'static str,
    views: i64,
    likes: i64,
    pages: &'static [(&'static str, &'static str)],
}

const SEED: &[SeedCategory] = &[
    SeedCategory {
        name: "Python",
        views: 128,
        likes: 64,
        pages: &[
            ("Official Python Tutorial", "http://docs.python.org/3/tutorial/"),
            (
                "How to Think like a Computer Scientist",
                "http://www.greenteapress.com/thinkpython/",
            ),
            (
                "Learn Python in 10 Minutes",
                "http://www.korokithakis.net/tutorials/python/",
            ),
        ],
    },
    SeedCategory {
        name: "Django",
        views: 64,
        likes: 32,
        pages: &[
            (
                "Official Django Tutorial",
                "https://docs.djangoproject.com/en/stable/intro/tutorial01/",
            ),
            ("Django Rocks", "http://www.djangorocks.com/"),
            ("How to Tango with Django", "http://www.tangowithdjango.com/"),
        ],
    },
    SeedCategory {
        name: "Other Frameworks",
        views: 32,
        likes: 16,
        pages: &[
            ("Bottle", "http://bottlepy.org/docs/dev/"),
            ("Flask", "http://flask.pocoo.org"),
        ],
    },
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rango=info,populate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load_with_env(Path::new("config.yml"))?;
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let category_repo = SqlxCategoryRepository::boxed(pool.clone());
    let categories = CategoryService::new(category_repo.clone(), create_cache(&config.cache));
    let pages = PageService::new(SqlxPageRepository::boxed(pool), category_repo);

    populate(&categories, &pages).await?;

    for category in categories.list().await? {
        for page in pages.list_by_category(category.id).await? {
            println!("- {} - {}", category.name, page.title);
        }
    }
    Ok(())
}

async fn populate(categories: &CategoryService, pages: &PageService) -> Result<()> {
    for seed in SEED {
        let category = match categories.get_by_slug(&generate_slug(seed.name)).await? {
            Some(existing) => existing,
            None => {
                let created = categories
                    .create(CreateCategoryInput::new(seed.name).with_counters(seed.views, seed.likes))
                    .await
                    .with_context(|| format!("Failed to add category {}", seed.name))?;
                tracing::info!(name = seed.name, "Category added");
                created
            }
        };

        let existing = pages.list_by_category(category.id).await?;
        for (i, (title, url)) in seed.pages.iter().enumerate() {
            if existing.iter().any(|p| p.title == *title) {
                continue;
            }
            // Spread views so the most viewed list has a stable order.
            let views = seed.views / (i as i64 + 1);
            pages
                .create(category.id, CreatePageInput::new(*title, *url).with_views(views))
                .await
                .with_context(|| format!("Failed to add page {}", title))?;
            tracing::info!(category = seed.name, title, "Page added");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rango::db::{create_test_pool, migrations};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_populate_is_idempotent() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let categories = CategoryService::new(
            category_repo.clone(),
            Arc::new(rango::cache::MemoryCache::new()),
        );
        let pages = PageService::new(SqlxPageRepository::boxed(pool), category_repo);

        populate(&categories, &pages).await.unwrap();
        populate(&categories, &pages).await.unwrap();

        let all = categories.list_by_likes().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "Python");
        assert_eq!(all[0].likes, 64);
        assert_eq!(all[0].views, 128);
        assert_eq!(pages.list().await.unwrap().len(), 8);
    }
}
