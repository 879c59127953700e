//! The remote catalog gateway.
//!
//! The client implementations live in [storefront_catalog],
//! this module re-exports them for consumers of the SDK.

pub use storefront_catalog::*;

// These functions should really be a #[cfg(test)] method on their
// respective types, but you can't import test features across crates
#[cfg(any(test, feature = "tests"))]
pub mod test_helpers {
    use proptest::prelude::*;

    use super::*;

    /// An item with the given id and otherwise dummy fields.
    pub fn dummy_item(id: &str) -> CatalogItem {
        CatalogItem {
            id: ItemId::from(id),
            name: format!("item {id}"),
            description: String::new(),
            price: 10.0,
            category: "home".to_string(),
            in_stock: true,
            rating: None,
            reviews: None,
            image: None,
            image_name: None,
            image_labels: vec![],
            created_at: None,
        }
    }

    /// A page of dummy items.
    pub fn page_of(ids: &[&str], current_page: u32, has_next_page: bool) -> ItemsPage {
        page_with_total(ids, current_page, has_next_page, ids.len() as u64)
    }

    /// A page of dummy items reporting `total_items` overall.
    pub fn page_with_total(
        ids: &[&str],
        current_page: u32,
        has_next_page: bool,
        total_items: u64,
    ) -> ItemsPage {
        ItemsPage {
            items: ids.iter().map(|id| dummy_item(id)).collect(),
            pagination: Pagination {
                current_page,
                total_pages: if has_next_page {
                    current_page.saturating_add(1)
                } else {
                    current_page
                },
                total_items,
                has_next_page,
                has_prev_page: current_page > 1,
            },
            filters: None,
            sort_by: None,
        }
    }

    pub fn arb_sort_by() -> impl Strategy<Value = SortBy> {
        proptest::sample::select(SortBy::ALL.to_vec())
    }

    pub fn arb_filters() -> impl Strategy<Value = SearchFilters> {
        (
            proptest::option::of(proptest::sample::select(vec![
                "electronics".to_string(),
                "home".to_string(),
                "toys".to_string(),
            ])),
            proptest::option::of(proptest::sample::select(vec![
                "under-25".to_string(),
                "under-100".to_string(),
            ])),
            proptest::option::of(any::<bool>()),
        )
            .prop_map(|(category, price_range, in_stock)| SearchFilters {
                category,
                price_range,
                in_stock,
            })
    }
}
