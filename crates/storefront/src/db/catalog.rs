//! Brands and products.
//!
//! Public queries only ever return active products of active brands.
//! Vendor queries are scoped to brands the vendor owns; a product ID that
//! belongs to another vendor behaves exactly like a missing one.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use wellspring_core::text::slugify;
use wellspring_core::{BrandId, PageParams, ProductId, VendorId};

use super::RepositoryError;

const BRAND_COLUMNS: &str =
    "id, vendor_id, name, slug, description, logo_url, is_active, created_at, updated_at";

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.brand_id, b.name AS brand_name, b.slug AS brand_slug, b.vendor_id,
           p.name, p.slug, p.description, p.category, p.volume_ml, p.price, p.stock,
           p.is_jar, p.jar_deposit, p.image_url, p.is_active, p.created_at, p.updated_at
    FROM market.products p
    JOIN market.brands b ON b.id = p.brand_id
";

/// A brand owned by a vendor.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Brand {
    pub id: BrandId,
    pub vendor_id: VendorId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product with its brand's name and owning vendor.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub brand_id: BrandId,
    pub brand_name: String,
    pub brand_slug: String,
    pub vendor_id: VendorId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: String,
    pub volume_ml: Option<i32>,
    pub price: Decimal,
    pub stock: i32,
    pub is_jar: bool,
    pub jar_deposit: Decimal,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id",
            Self::PriceDesc => "p.price DESC, p.id",
            Self::Name => "p.name ASC, p.id",
        }
    }
}

/// Public catalog filters (`GET /api/products`).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProductFilter {
    pub q: Option<String>,
    /// Brand slug.
    pub brand: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default)]
    pub sort: ProductSort,
}

/// Fields for a new brand.
pub struct NewBrand {
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

/// Fields for a new product.
pub struct NewProduct {
    pub brand_id: BrandId,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub volume_ml: Option<i32>,
    pub price: Decimal,
    pub stock: i32,
    pub is_jar: bool,
    pub jar_deposit: Decimal,
    pub image_url: Option<String>,
}

/// Partial product update; `None` leaves a field unchanged.
#[derive(Debug, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub volume_ml: Option<i32>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_jar: Option<bool>,
    pub jar_deposit: Option<Decimal>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Repository for catalog database operations.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Public catalog
    // =========================================================================

    /// Search active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageParams,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        const WHERE: &str = r"
            WHERE p.is_active AND b.is_active
              AND ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%' OR p.description ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR b.slug = $2)
              AND ($3::text IS NULL OR p.category = $3)
              AND ($4::numeric IS NULL OR p.price >= $4)
              AND ($5::numeric IS NULL OR p.price <= $5)
              AND (NOT $6 OR p.stock > 0)
        ";
        let q = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} {WHERE} ORDER BY {} LIMIT $7 OFFSET $8",
            filter.sort.order_by()
        ))
        .bind(q)
        .bind(filter.brand.as_deref())
        .bind(filter.category.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.in_stock)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            r"
            SELECT COUNT(*) FROM market.products p
            JOIN market.brands b ON b.id = p.brand_id
            {WHERE}
            "
        ))
        .bind(q)
        .bind(filter.brand.as_deref())
        .bind(filter.category.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.in_stock)
        .fetch_one(self.pool)
        .await?;

        Ok((products, total))
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.slug = $1 AND p.is_active AND b.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Get any products by ID, active or not. Used to price carts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_products(&self, ids: &[i32]) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.id = ANY($1) AND b.is_active"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// List active brands.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_brands(&self) -> Result<Vec<Brand>, RepositoryError> {
        let brands = sqlx::query_as::<_, Brand>(&format!(
            "SELECT {BRAND_COLUMNS} FROM market.brands WHERE is_active ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(brands)
    }

    /// Get an active brand by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_brand_by_slug(&self, slug: &str) -> Result<Option<Brand>, RepositoryError> {
        let brand = sqlx::query_as::<_, Brand>(&format!(
            "SELECT {BRAND_COLUMNS} FROM market.brands WHERE slug = $1 AND is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(brand)
    }

    // =========================================================================
    // Vendor catalog
    // =========================================================================

    /// List a vendor's brands, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_vendor_brands(&self, vendor_id: VendorId) -> Result<Vec<Brand>, RepositoryError> {
        let brands = sqlx::query_as::<_, Brand>(&format!(
            "SELECT {BRAND_COLUMNS} FROM market.brands WHERE vendor_id = $1 ORDER BY name"
        ))
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(brands)
    }

    /// Create a brand with a unique slug derived from its name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no free slug was found.
    pub async fn create_brand(
        &self,
        vendor_id: VendorId,
        brand: NewBrand,
    ) -> Result<Brand, RepositoryError> {
        let base = slugify(&brand.name);
        let mut last_err = RepositoryError::Conflict("brand slug already exists".to_owned());

        for slug in candidate_slugs(&base) {
            let result = sqlx::query_as::<_, Brand>(&format!(
                r"
                INSERT INTO market.brands (vendor_id, name, slug, description, logo_url)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {BRAND_COLUMNS}
                "
            ))
            .bind(vendor_id)
            .bind(&brand.name)
            .bind(&slug)
            .bind(brand.description.as_deref())
            .bind(brand.logo_url.as_deref())
            .fetch_one(self.pool)
            .await
            .map_err(RepositoryError::unique("brand slug already exists"));

            match result {
                Err(err @ RepositoryError::Conflict(_)) => last_err = err,
                other => return other,
            }
        }

        Err(last_err)
    }

    /// List a vendor's products, optionally only those at or below `low_stock`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_vendor_products(
        &self,
        vendor_id: VendorId,
        low_stock: Option<i32>,
        page: PageParams,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        const WHERE: &str = "WHERE b.vendor_id = $1 AND ($2::integer IS NULL OR p.stock <= $2)";

        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} {WHERE} ORDER BY p.stock, p.name LIMIT $3 OFFSET $4"
        ))
        .bind(vendor_id)
        .bind(low_stock)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            r"
            SELECT COUNT(*) FROM market.products p
            JOIN market.brands b ON b.id = p.brand_id
            {WHERE}
            "
        ))
        .bind(vendor_id)
        .bind(low_stock)
        .fetch_one(self.pool)
        .await?;

        Ok((products, total))
    }

    /// Create a product under one of the vendor's brands.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the brand is not the vendor's.
    pub async fn create_product(
        &self,
        vendor_id: VendorId,
        product: NewProduct,
    ) -> Result<Product, RepositoryError> {
        let owns_brand = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM market.brands WHERE id = $1 AND vendor_id = $2)",
        )
        .bind(product.brand_id)
        .bind(vendor_id)
        .fetch_one(self.pool)
        .await?;
        if !owns_brand {
            return Err(RepositoryError::NotFound);
        }

        let base = slugify(&product.name);
        let mut last_err = RepositoryError::Conflict("product slug already exists".to_owned());

        for slug in candidate_slugs(&base) {
            let result = sqlx::query_scalar::<_, ProductId>(
                r"
                INSERT INTO market.products
                    (brand_id, name, slug, description, category, volume_ml, price, stock,
                     is_jar, jar_deposit, image_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING id
                ",
            )
            .bind(product.brand_id)
            .bind(&product.name)
            .bind(&slug)
            .bind(product.description.as_deref())
            .bind(&product.category)
            .bind(product.volume_ml)
            .bind(product.price)
            .bind(product.stock)
            .bind(product.is_jar)
            .bind(product.jar_deposit)
            .bind(product.image_url.as_deref())
            .fetch_one(self.pool)
            .await
            .map_err(RepositoryError::unique("product slug already exists"));

            match result {
                Ok(id) => return self.get_vendor_product(vendor_id, id).await,
                Err(err @ RepositoryError::Conflict(_)) => last_err = err,
                Err(err) => return Err(err),
            }
        }

        Err(last_err)
    }

    /// Get one of the vendor's products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is missing or not the vendor's.
    pub async fn get_vendor_product(
        &self,
        vendor_id: VendorId,
        id: ProductId,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.id = $1 AND b.vendor_id = $2"
        ))
        .bind(id)
        .bind(vendor_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Update one of the vendor's products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is missing or not the vendor's.
    pub async fn update_product(
        &self,
        vendor_id: VendorId,
        id: ProductId,
        changes: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE market.products p
            SET name = COALESCE($3, p.name),
                description = COALESCE($4, p.description),
                category = COALESCE($5, p.category),
                volume_ml = COALESCE($6, p.volume_ml),
                price = COALESCE($7, p.price),
                stock = COALESCE($8, p.stock),
                is_jar = COALESCE($9, p.is_jar),
                jar_deposit = COALESCE($10, p.jar_deposit),
                image_url = COALESCE($11, p.image_url),
                is_active = COALESCE($12, p.is_active),
                updated_at = NOW()
            FROM market.brands b
            WHERE p.id = $1 AND b.id = p.brand_id AND b.vendor_id = $2
            ",
        )
        .bind(id)
        .bind(vendor_id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.category)
        .bind(changes.volume_ml)
        .bind(changes.price)
        .bind(changes.stock)
        .bind(changes.is_jar)
        .bind(changes.jar_deposit)
        .bind(changes.image_url)
        .bind(changes.is_active)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_vendor_product(vendor_id, id).await
    }

    /// Take a product off sale. Order history keeps referencing it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is missing or not the vendor's.
    pub async fn deactivate_product(
        &self,
        vendor_id: VendorId,
        id: ProductId,
    ) -> Result<(), RepositoryError> {
        self.update_product(
            vendor_id,
            id,
            ProductUpdate {
                is_active: Some(false),
                ..ProductUpdate::default()
            },
        )
        .await
        .map(|_| ())
    }
}

/// The base slug, then up to three randomised variants.
fn candidate_slugs(base: &str) -> Vec<String> {
    let base = if base.is_empty() { "item" } else { base };
    let mut rng = rand::rng();
    std::iter::once(base.to_owned())
        .chain((0..3).map(|_| format!("{base}-{:04x}", rng.random::<u16>())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_slugs_start_with_base() {
        let slugs = candidate_slugs("spring-water");
        assert_eq!(slugs.len(), 4);
        assert_eq!(slugs[0], "spring-water");
        for slug in &slugs[1..] {
            assert!(slug.starts_with("spring-water-"));
            assert_eq!(slug.len(), "spring-water-".len() + 4);
        }
    }

    #[test]
    fn test_candidate_slugs_empty_base() {
        assert_eq!(candidate_slugs("")[0], "item");
    }

    #[test]
    fn test_sort_order_by_is_static_sql() {
        assert_eq!(ProductSort::default(), ProductSort::Newest);
        assert!(ProductSort::PriceAsc.order_by().starts_with("p.price ASC"));
        assert!(ProductSort::PriceDesc.order_by().starts_with("p.price DESC"));
    }
}
