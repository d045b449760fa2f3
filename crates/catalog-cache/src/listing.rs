//! Sellable-product listing used to generate rule files from the catalog.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::CatalogError;
use crate::source::CustomUrl;

/// A visible, in-stock product with a storefront slug.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingProduct {
    pub id: u64,
    pub slug: String,
    pub name: String,
    pub price: f64,
    /// `None` when the catalog has no brand for the product.
    pub brand_id: Option<u64>,
    pub categories: BTreeSet<u64>,
    pub category_names: Vec<String>,
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listing(&self) -> Result<Vec<ListingProduct>, CatalogError>;
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryRecord {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingRecord {
    pub(crate) id: Option<u64>,
    pub(crate) name: Option<String>,
    pub(crate) price: Option<f64>,
    pub(crate) brand_id: Option<u64>,
    #[serde(default)]
    pub(crate) categories: Vec<u64>,
    pub(crate) custom_url: Option<CustomUrl>,
    pub(crate) is_visible: Option<bool>,
    pub(crate) availability: Option<String>,
    pub(crate) inventory_level: Option<i64>,
    pub(crate) inventory_tracking: Option<String>,
}

impl ListingRecord {
    /// Hidden products, unavailable ones and tracked stock at or below zero
    /// are out. Untracked inventory always counts as in stock.
    pub(crate) fn is_in_stock(&self) -> bool {
        if self.is_visible == Some(false) {
            return false;
        }
        let availability = self
            .availability
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !availability.is_empty() && availability != "available" && availability != "preorder" {
            return false;
        }
        let tracking = self
            .inventory_tracking
            .as_deref()
            .unwrap_or("none")
            .trim()
            .to_ascii_lowercase();
        !(tracking != "none" && self.inventory_level.is_some_and(|level| level <= 0))
    }

    fn into_product(self, category_names: &HashMap<u64, &str>) -> Option<ListingProduct> {
        let slug = CustomUrl::slug(self.custom_url.as_ref());
        let id = self.id?;
        if slug.is_empty() {
            return None;
        }
        let categories: BTreeSet<u64> = self.categories.into_iter().collect();
        let names = categories
            .iter()
            .filter_map(|id| category_names.get(id))
            .filter(|name| !name.trim().is_empty())
            .map(|name| name.to_string())
            .collect();
        Some(ListingProduct {
            id,
            name: self
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| slug.clone()),
            slug,
            price: self.price.unwrap_or(0.0),
            brand_id: self.brand_id.filter(|brand| *brand != 0),
            categories,
            category_names: names,
        })
    }
}

pub(crate) fn build_listing(
    records: Vec<ListingRecord>,
    categories: &[CategoryRecord],
) -> Vec<ListingProduct> {
    let names: HashMap<u64, &str> = categories
        .iter()
        .map(|category| (category.id, category.name.as_str()))
        .collect();
    let total = records.len();
    let products: Vec<ListingProduct> = records
        .into_iter()
        .filter(ListingRecord::is_in_stock)
        .filter_map(|record| record.into_product(&names))
        .collect();
    debug!(total, kept = products.len(), "catalog listing filtered");
    products
}
