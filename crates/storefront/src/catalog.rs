//! Static product catalog.
//!
//! The catalog is supplied by the host (bundled JSON or a fixture) and is
//! read-only for the session core; the cart only joins product IDs against it.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use farmacia_core::{Price, ProductId};

/// Errors that can occur when loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog JSON is malformed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two products share an ID.
    #[error("Duplicate product id: {0}")]
    DuplicateProduct(ProductId),
}

/// A product as listed in the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(alias = "imageSrc", default)]
    pub image_url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

const fn default_in_stock() -> bool {
    true
}

/// Immutable product collection with an ID index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Build a catalog, keeping listing order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateProduct` if two products share an ID.
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(products.len());
        for (position, product) in products.iter().enumerate() {
            if index.insert(product.id, position).is_some() {
                return Err(CatalogError::DuplicateProduct(product.id));
            }
        }
        Ok(Self { products, index })
    }

    /// Parse a JSON array of products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the JSON is malformed or IDs repeat.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        Self::new(serde_json::from_str(raw)?)
    }

    /// Load a JSON catalog file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!(path = %path.display(), products = catalog.len(), "Loaded catalog");
        Ok(catalog)
    }

    /// Look up a product by ID.
    #[must_use]
    pub fn find(&self, id: ProductId) -> Option<&Product> {
        self.index.get(&id).and_then(|&i| self.products.get(i))
    }

    /// All products in listing order.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Products in a category, in listing order.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Product> + 'a {
        self.products
            .iter()
            .filter(move |p| p.category.eq_ignore_ascii_case(category))
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
