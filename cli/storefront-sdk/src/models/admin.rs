//! Write operations on the catalog, available to authenticated sessions.
//!
//! None of these touch a [QueryState](super::browse::QueryState),
//! callers reload listings themselves after a successful write.

use storefront_catalog::{
    CatalogClientError,
    CatalogItem,
    ClientTrait,
    ImageUpload,
    ItemId,
    ItemPatch,
    NewItem,
    ObjectStore,
    StorageError,
};
use thiserror::Error;
use tracing::{debug, instrument};

use super::session::Session;
use crate::providers::token_store::TokenStore;

/// Image used for items created without an image.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/300x200?text=No+Image";
pub const PLACEHOLDER_IMAGE_NAME: &str = "placeholder";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("admin login required")]
    NotAuthenticated,
    #[error("{0}")]
    Validation(String),
    #[error("catalog request failed")]
    Catalog(#[from] CatalogClientError),
    #[error("image upload failed")]
    Storage(#[from] StorageError),
}

/// User input for a new item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemForm {
    pub name: String,
    pub description: String,
    /// Unparsed price as entered
    pub price: String,
    pub category: String,
    pub in_stock: bool,
}

impl Default for ItemForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            price: String::new(),
            category: String::new(),
            in_stock: true,
        }
    }
}

/// Write access to the catalog.
///
/// Can only be constructed from an authenticated [Session].
#[derive(Debug)]
pub struct Admin<'a, C, O> {
    client: &'a C,
    object_store: &'a O,
}

impl<'a, C: ClientTrait, O: ObjectStore> Admin<'a, C, O> {
    pub fn new<S: TokenStore>(
        session: &Session<S>,
        client: &'a C,
        object_store: &'a O,
    ) -> Result<Self, AdminError> {
        if !session.is_authenticated() {
            return Err(AdminError::NotAuthenticated);
        }
        Ok(Self {
            client,
            object_store,
        })
    }

    /// Create an item, uploading its image first if one is attached.
    #[instrument(skip_all, fields(name = %form.name.trim()))]
    pub async fn create_item(
        &self,
        form: ItemForm,
        image: Option<&ImageUpload>,
    ) -> Result<CatalogItem, AdminError> {
        let name = validate_name(&form.name)?;
        let price = parse_price(&form.price)?;

        let (image, image_name) = match image {
            Some(image) => {
                let url = self.object_store.upload_image(image).await?;
                (url.to_string(), image.file_name.clone())
            },
            None => (
                PLACEHOLDER_IMAGE_URL.to_string(),
                PLACEHOLDER_IMAGE_NAME.to_string(),
            ),
        };

        let item = NewItem {
            name,
            description: form.description.trim().to_string(),
            price,
            category: form.category.trim().to_string(),
            in_stock: form.in_stock,
            rating: None,
            reviews: None,
            image: Some(image),
            image_name: Some(image_name),
            image_labels: vec![],
        };

        Ok(self.client.create_item(&item).await?)
    }

    /// Update an item, replacing its image only if a new one is attached.
    #[instrument(skip_all, fields(id = %existing.id))]
    pub async fn update_item(
        &self,
        existing: &CatalogItem,
        mut patch: ItemPatch,
        image: Option<&ImageUpload>,
    ) -> Result<CatalogItem, AdminError> {
        if let Some(name) = &patch.name {
            patch.name = Some(validate_name(name)?);
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        patch.description = patch.description.map(|d| d.trim().to_string());
        patch.category = patch.category.map(|c| c.trim().to_string());

        match image {
            Some(image) => {
                let url = self.object_store.upload_image(image).await?;
                patch.image = Some(url.to_string());
                patch.image_name = Some(image.file_name.clone());
            },
            None => {
                patch.image = existing.image.clone();
                patch.image_name = Some(
                    existing
                        .image_name
                        .clone()
                        .unwrap_or_else(|| PLACEHOLDER_IMAGE_NAME.to_string()),
                );
            },
        }

        Ok(self.client.update_item(&existing.id, &patch).await?)
    }

    pub async fn delete_item(&self, id: &ItemId) -> Result<(), AdminError> {
        Ok(self.client.delete_item(id).await?)
    }

    /// Create all items of a JSON array, returning the number of created items.
    #[instrument(skip_all, fields(len = text.len()))]
    pub async fn upload_items_json(&self, text: &str) -> Result<u64, AdminError> {
        let items = parse_item_upload(text)?;
        debug!(n_items = items.len(), "uploading items");
        Ok(self.client.upload_items(&items).await?)
    }

    pub async fn seed_database(&self) -> Result<u64, AdminError> {
        Ok(self.client.seed_database().await?)
    }

    pub async fn clear_database(&self) -> Result<(), AdminError> {
        Ok(self.client.clear_database().await?)
    }
}

/// Parse the contents of a bulk upload file.
pub fn parse_item_upload(text: &str) -> Result<Vec<NewItem>, AdminError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| AdminError::Validation(format!("Invalid JSON file: {e}")))?;

    let serde_json::Value::Array(values) = value else {
        return Err(AdminError::Validation(
            "File must contain an array of items".to_string(),
        ));
    };

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<NewItem>(value)
                .map_err(|e| AdminError::Validation(format!("invalid item at index {index}: {e}")))
        })
        .collect()
}

fn validate_name(name: &str) -> Result<String, AdminError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AdminError::Validation("name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

fn parse_price(price: &str) -> Result<f64, AdminError> {
    let parsed = price
        .trim()
        .parse::<f64>()
        .map_err(|_| AdminError::Validation(format!("invalid price '{}'", price.trim())))?;
    validate_price(parsed)?;
    Ok(parsed)
}

fn validate_price(price: f64) -> Result<(), AdminError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AdminError::Validation(format!(
            "price must be a non-negative number, got {price}"
        )));
    }
    Ok(())
}
