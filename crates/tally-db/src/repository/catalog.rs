//! # Catalog Repository
//!
//! Warehouses, categories and products.
//!
//! The ledger only reads the catalog: whether a warehouse exists, and
//! whether a product's category is a preparation category (made to order,
//! not stock-tracked). Creation exists for fixtures and the seed binary;
//! full catalog management belongs to the surrounding application.

use chrono::Utc;
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tally_core::{Category, Money, Product, Warehouse};

/// What the sales workflow needs to know about a product.
#[derive(Debug, Clone, FromRow)]
pub struct StockProfile {
    pub product_id: String,
    pub unit: String,
    /// `true` when the product's category is a preparation category.
    pub is_preparation: bool,
}

impl StockProfile {
    #[inline]
    pub fn is_stock_tracked(&self) -> bool {
        !self.is_preparation
    }
}

/// Repository for catalog lookups.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Warehouses
    // =========================================================================

    pub async fn create_warehouse(&self, code: &str, name: &str) -> DbResult<Warehouse> {
        let warehouse = Warehouse {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %warehouse.id, code = %code, "Creating warehouse");

        sqlx::query(
            r#"
            INSERT INTO warehouses (id, code, name, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&warehouse.id)
        .bind(&warehouse.code)
        .bind(&warehouse.name)
        .bind(warehouse.is_active)
        .bind(warehouse.created_at)
        .execute(&self.pool)
        .await?;

        Ok(warehouse)
    }

    pub async fn find_warehouse<'e, E: SqliteExecutor<'e>>(
        exec: E,
        id: &str,
    ) -> DbResult<Option<Warehouse>> {
        let row = sqlx::query_as::<_, Warehouse>(
            "SELECT id, code, name, is_active, created_at FROM warehouses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(exec)
        .await?;

        Ok(row)
    }

    pub async fn get_warehouse(&self, id: &str) -> DbResult<Option<Warehouse>> {
        Self::find_warehouse(&self.pool, id).await
    }

    pub async fn list_warehouses(&self) -> DbResult<Vec<Warehouse>> {
        let rows = sqlx::query_as::<_, Warehouse>(
            "SELECT id, code, name, is_active, created_at FROM warehouses ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn create_category(&self, name: &str, is_preparation: bool) -> DbResult<Category> {
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            is_preparation,
            created_at: Utc::now(),
        };

        debug!(id = %category.id, name = %name, is_preparation, "Creating category");

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, is_preparation, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(category.is_preparation)
        .bind(category.created_at)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    /// Moves a product to another category (or none).
    pub async fn set_product_category(&self, product_id: &str, category_id: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE products SET category_id = ?1 WHERE id = ?2")
            .bind(category_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(
        &self,
        sku: &str,
        name: &str,
        unit: &str,
        category_id: Option<&str>,
        price: Money,
    ) -> DbResult<Product> {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            unit: unit.to_string(),
            category_id: category_id.map(str::to_string),
            price_cents: price.cents(),
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %product.id, sku = %sku, "Creating product");

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, unit, category_id, price_cents, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, unit, category_id, price_cents, is_active, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Unit and preparation flag of a product. `None` if it doesn't exist.
    pub async fn stock_profile<'e, E: SqliteExecutor<'e>>(
        exec: E,
        product_id: &str,
    ) -> DbResult<Option<StockProfile>> {
        let row = sqlx::query_as::<_, StockProfile>(
            r#"
            SELECT
                p.id AS product_id,
                p.unit,
                COALESCE(c.is_preparation, 0) AS is_preparation
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE p.id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(exec)
        .await?;

        Ok(row)
    }

    pub async fn get_stock_profile(&self, product_id: &str) -> DbResult<Option<StockProfile>> {
        Self::stock_profile(&self.pool, product_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_preparation_flag_follows_category() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let kitchen = catalog.create_category("Kitchen", true).await.unwrap();
        let drinks = catalog.create_category("Drinks", false).await.unwrap();

        let soup = catalog
            .create_product("SOUP", "Soup of the day", "bowl", Some(&kitchen.id), Money::from_cents(650))
            .await
            .unwrap();
        let cola = catalog
            .create_product("COLA", "Cola 330ml", "pcs", Some(&drinks.id), Money::from_cents(250))
            .await
            .unwrap();
        let loose = catalog
            .create_product("BAG", "Paper bag", "pcs", None, Money::zero())
            .await
            .unwrap();

        assert!(!catalog.get_stock_profile(&soup.id).await.unwrap().unwrap().is_stock_tracked());
        assert!(catalog.get_stock_profile(&cola.id).await.unwrap().unwrap().is_stock_tracked());
        assert!(catalog.get_stock_profile(&loose.id).await.unwrap().unwrap().is_stock_tracked());
        assert!(catalog.get_stock_profile("missing").await.unwrap().is_none());

        catalog.set_product_category(&cola.id, Some(&kitchen.id)).await.unwrap();
        assert!(!catalog.get_stock_profile(&cola.id).await.unwrap().unwrap().is_stock_tracked());
    }

    #[tokio::test]
    async fn test_get_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let syrups = catalog.create_category("Syrups", false).await.unwrap();
        let created = catalog
            .create_product("SYR-01", "Vanilla Syrup", "btl", Some(&syrups.id), Money::from_cents(1150))
            .await
            .unwrap();

        let found = catalog.get_product(&created.id).await.unwrap().unwrap();
        assert_eq!(found.sku, "SYR-01");
        assert_eq!(found.unit, "btl");
        assert_eq!(found.category_id.as_deref(), Some(syrups.id.as_str()));
        assert_eq!(found.price_cents, 1150);
        assert!(found.is_active);

        assert!(catalog.get_product("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_warehouse_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let main = catalog.create_warehouse("MAIN", "Main").await.unwrap();
        let err = catalog.create_warehouse("MAIN", "Other").await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let found = catalog.get_warehouse(&main.id).await.unwrap().unwrap();
        assert_eq!(found.code, "MAIN");
        assert_eq!(catalog.list_warehouses().await.unwrap().len(), 1);
    }
}
