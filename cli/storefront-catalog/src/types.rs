//! Catalog interaction types.
//!
//! These types mirror the JSON documents exchanged with the item API.
//! Item records are opaque to the browsing state beyond their [ItemId].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Identifier assigned to an item by the API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(derive_more::Display, derive_more::From)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A catalog item as returned by the API.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(rename = "_id")]
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub in_stock: bool,
    pub rating: Option<f64>,
    /// Number of reviews
    pub reviews: Option<u32>,
    /// Retrieval URL of the item image
    pub image: Option<String>,
    pub image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_labels: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload to create an item, also the element type of bulk uploads.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    pub rating: Option<f64>,
    pub reviews: Option<u32>,
    pub image: Option<String>,
    pub image_name: Option<String>,
    #[serde(default)]
    pub image_labels: Vec<String>,
}

fn default_in_stock() -> bool {
    true
}

/// Partial update of an item, absent fields are left untouched.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub in_stock: Option<bool>,
    pub image: Option<String>,
    pub image_name: Option<String>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Server side sort order of listings and search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    #[default]
    Relevance,
    PriceLow,
    PriceHigh,
    Name,
    Newest,
}

impl SortBy {
    pub const ALL: [SortBy; 5] = [
        SortBy::Relevance,
        SortBy::PriceLow,
        SortBy::PriceHigh,
        SortBy::Name,
        SortBy::Newest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::PriceLow => "price-low",
            SortBy::PriceHigh => "price-high",
            SortBy::Name => "name",
            SortBy::Newest => "newest",
        }
    }
}

impl std::fmt::Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown sort order '{0}', expected one of: relevance, price-low, price-high, name, newest")]
pub struct ParseSortByError(String);

impl FromStr for SortBy {
    type Err = ParseSortByError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortBy::ALL
            .into_iter()
            .find(|sort_by| sort_by.as_str() == s)
            .ok_or_else(|| ParseSortByError(s.to_string()))
    }
}

/// Filters applied to search requests.
///
/// `None` means the filter is not applied.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub category: Option<String>,
    /// Price range token understood by the API, e.g. `under-50`
    pub price_range: Option<String>,
    pub in_stock: Option<bool>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        *self == SearchFilters::default()
    }

    /// Query parameters for the filters that are set, in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(price_range) = &self.price_range {
            pairs.push(("priceRange", price_range.clone()));
        }
        if let Some(in_stock) = self.in_stock {
            pairs.push(("inStock", in_stock.to_string()));
        }
        pairs
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Pagination cursor returned with every page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub has_prev_page: bool,
}

/// A single page of items.
///
/// Search responses additionally echo the applied filters and sort order.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsPage {
    pub items: Vec<CatalogItem>,
    pub pagination: Pagination,
    #[serde(default)]
    pub filters: Option<SearchFilters>,
    #[serde(default)]
    pub sort_by: Option<SortBy>,
}

/// The API wraps most payloads as `{ "data": ... }`,
/// but older deployments answer with the bare document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

/// Unpaginated item list, either a bare array or `{ "items": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ItemList {
    Items { items: Vec<CatalogItem> },
    Bare(Vec<CatalogItem>),
}

impl From<ItemList> for Vec<CatalogItem> {
    fn from(list: ItemList) -> Self {
        match list {
            ItemList::Items { items } => items,
            ItemList::Bare(items) => items,
        }
    }
}

/// Response of bulk operations that create items.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|msg| !msg.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn sort_by_uses_api_tokens() {
        for sort_by in SortBy::ALL {
            let serialized = serde_json::to_value(sort_by).unwrap();
            assert_eq!(serialized, json!(sort_by.as_str()));
            assert_eq!(sort_by.as_str().parse::<SortBy>(), Ok(sort_by));
        }
        assert!("cheapest".parse::<SortBy>().is_err());
    }

    #[test]
    fn filters_only_encode_applied_values() {
        let filters = SearchFilters {
            category: Some("electronics".to_string()),
            price_range: None,
            in_stock: Some(false),
        };
        assert_eq!(filters.query_pairs(), vec![
            ("category", "electronics".to_string()),
            ("inStock", "false".to_string()),
        ]);
        assert!(SearchFilters::default().query_pairs().is_empty());
    }

    #[test]
    fn item_from_api_document() {
        let item: CatalogItem = serde_json::from_value(json!({
            "_id": "65a1",
            "name": "Desk Lamp",
            "description": "Adjustable arm",
            "price": 24.99,
            "category": "home",
            "inStock": true,
            "rating": 4.5,
            "reviews": 12,
            "image": "https://example.com/lamp.png",
            "createdAt": "2024-01-15T10:00:00.000Z",
            "__v": 0
        }))
        .unwrap();

        assert_eq!(item.id, ItemId::from("65a1"));
        assert_eq!(item.reviews, Some(12));
        assert!(item.image_labels.is_empty());
        assert!(item.created_at.is_some());
    }

    #[test]
    fn page_envelope_wrapped_and_bare() {
        let page = json!({
            "items": [],
            "pagination": { "currentPage": 2, "totalPages": 3, "totalItems": 25, "hasNextPage": true, "hasPrevPage": true }
        });

        let bare: Envelope<ItemsPage> = serde_json::from_value(page.clone()).unwrap();
        let wrapped: Envelope<ItemsPage> =
            serde_json::from_value(json!({ "success": true, "data": page })).unwrap();

        assert_eq!(bare.into_inner(), wrapped.into_inner());
    }

    #[test]
    fn patch_omits_unset_fields() {
        let patch = ItemPatch {
            price: Some(10.0),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "price": 10.0 }));
        assert!(ItemPatch::default().is_empty());
    }
}
