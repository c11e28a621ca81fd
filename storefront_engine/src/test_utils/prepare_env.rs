use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::NewProduct,
    traits::{CatalogManagement, CheckoutDatabase},
    SqliteDatabase,
};

/// Creates a fresh, migrated database at `url`, deleting any database that was there before.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(url).await {
            warn!("🚀️ Error dropping database {url}: {e:?}");
        }
    }
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

/// A unique database file in the system temp directory.
pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/sf_test_{}.db", dir.display(), rand::random::<u64>())
}

/// Adds products to the catalog and returns their ids, in order.
pub async fn seed_products(db: &SqliteDatabase, products: &[(&str, i64, i64)]) -> Vec<i64> {
    let mut ids = Vec::with_capacity(products.len());
    for (name, price, stock) in products {
        let p = db
            .insert_product(NewProduct::new(*name, (*price).into(), *stock))
            .await
            .expect("Error inserting product");
        ids.push(p.id);
    }
    ids
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e}");
    }
}
