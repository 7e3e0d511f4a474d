//! Product service for managing the product catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Product record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub product_id: i32,
    pub product_name: String,
    pub strength: Option<String>,
    pub reorder_threshold: i32,
    pub supplier_lead_time: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "Product name must be 1-200 characters"))]
    pub product_name: String,
    #[validate(length(max = 50, message = "Strength must be at most 50 characters"))]
    pub strength: Option<String>,
    #[validate(range(min = 0, message = "Reorder threshold cannot be negative"))]
    pub reorder_threshold: i32,
    #[validate(range(min = 0, message = "Supplier lead time cannot be negative"))]
    pub supplier_lead_time: i32,
}

/// Input for updating a product
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200, message = "Product name must be 1-200 characters"))]
    pub product_name: Option<String>,
    #[validate(length(max = 50, message = "Strength must be at most 50 characters"))]
    pub strength: Option<String>,
    #[validate(range(min = 0, message = "Reorder threshold cannot be negative"))]
    pub reorder_threshold: Option<i32>,
    #[validate(range(min = 0, message = "Supplier lead time cannot be negative"))]
    pub supplier_lead_time: Option<i32>,
}

const PRODUCT_COLUMNS: &str =
    "product_id, product_name, strength, reorder_threshold, supplier_lead_time, created_at";

const UPDATE_PRODUCT_SQL: &str = r#"
    UPDATE product_inventory
    SET product_name = COALESCE($1, product_name),
        strength = COALESCE($2, strength),
        reorder_threshold = COALESCE($3, reorder_threshold),
        supplier_lead_time = COALESCE($4, supplier_lead_time)
    WHERE product_id = $5
"#;

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all products
    pub async fn list_products(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM product_inventory ORDER BY product_name, product_id",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    /// Get a product by ID
    pub async fn get_product(&self, product_id: i32) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM product_inventory WHERE product_id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Create a product
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO product_inventory (product_name, strength, reorder_threshold, supplier_lead_time)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(input.product_name.trim())
        .bind(input.strength.as_deref().map(str::trim))
        .bind(input.reorder_threshold)
        .bind(input.supplier_lead_time)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id = product.product_id, "product created");
        Ok(product)
    }

    /// Update a product, keeping fields that are not supplied
    pub async fn update_product(
        &self,
        product_id: i32,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "{} RETURNING {}",
            UPDATE_PRODUCT_SQL, PRODUCT_COLUMNS
        ))
        .bind(input.product_name.as_deref().map(str::trim))
        .bind(input.strength.as_deref())
        .bind(input.reorder_threshold)
        .bind(input.supplier_lead_time)
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        tracing::info!(product_id, "product updated");
        Ok(product)
    }

    /// Delete a product. Products that still have batches cannot be deleted.
    pub async fn delete_product(&self, product_id: i32) -> AppResult<()> {
        self.get_product(product_id).await?;

        let batch_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM product_details WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        if batch_count > 0 {
            return Err(AppError::Conflict(format!(
                "Cannot delete product: {} batches are linked to it",
                batch_count
            )));
        }

        sqlx::query("DELETE FROM product_inventory WHERE product_id = $1")
            .bind(product_id)
            .execute(&self.db)
            .await?;

        tracing::info!(product_id, "product deleted");
        Ok(())
    }
}
