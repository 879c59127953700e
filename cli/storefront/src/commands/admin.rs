use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use storefront_sdk::models::admin::{Admin, AdminError, ItemForm};
use storefront_sdk::providers::catalog::{
    CatalogClientError,
    Client,
    ClientTrait,
    ImageUpload,
    ItemId,
    ItemPatch,
    Storage,
};
use tracing::{debug, instrument};

use super::Storefront;
use crate::utils::message;

/// Write access to the catalog, if an admin is logged in.
fn admin(storefront: &Storefront) -> Result<Admin<'_, Client, Storage>> {
    let session = storefront.session();
    match Admin::new(
        &session,
        &storefront.catalog_client,
        &storefront.object_store,
    ) {
        Err(AdminError::NotAuthenticated) => {
            bail!("You are not logged in, run 'storefront login <username> --password <password>'")
        },
        result => Ok(result?),
    }
}

async fn read_image(path: Option<&Path>) -> Result<Option<ImageUpload>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Could not read image '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Image path '{}' has no file name", path.display()))?;
    debug!(file_name, size = bytes.len(), "read image");
    Ok(Some(ImageUpload::from_bytes(file_name, bytes)))
}

// Log in as the catalog admin
#[derive(Debug, Bpaf, Clone)]
pub struct Login {
    /// Password of the admin
    #[bpaf(long, short, argument("PASSWORD"))]
    password: String,

    /// Name of the admin
    #[bpaf(positional("USERNAME"))]
    username: String,
}

impl Login {
    #[instrument(name = "login", skip_all, fields(username = self.username))]
    pub fn handle(self, storefront: Storefront) -> Result<()> {
        let mut session = storefront.session();
        session.login(&self.username, &self.password)?;
        message::updated(format!("Logged in as '{}'", self.username));
        Ok(())
    }
}

// End the admin session
#[derive(Debug, Bpaf, Clone)]
pub struct Logout {}

impl Logout {
    #[instrument(name = "logout", skip_all)]
    pub fn handle(self, storefront: Storefront) -> Result<()> {
        let mut session = storefront.session();
        if !session.is_authenticated() {
            message::plain("You are not logged in");
            return Ok(());
        }
        session.logout()?;
        message::updated("Logged out");
        Ok(())
    }
}

// Show whether an admin session is active
#[derive(Debug, Bpaf, Clone)]
pub struct Status {}

impl Status {
    pub fn handle(self, storefront: Storefront) {
        if storefront.session().is_authenticated() {
            message::plain("Logged in as admin");
        } else {
            message::plain("Not logged in");
        }
    }
}

// Create an item
#[derive(Debug, Bpaf, Clone)]
pub struct Create {
    /// Name of the item
    #[bpaf(long, argument("NAME"))]
    name: String,

    /// Price of the item, e.g. '19.99'
    #[bpaf(long, argument("PRICE"))]
    price: String,

    /// Description of the item
    #[bpaf(long, argument("TEXT"), fallback(String::new()))]
    description: String,

    /// Category of the item
    #[bpaf(long, argument("CATEGORY"), fallback(String::new()))]
    category: String,

    /// Mark the item as out of stock
    #[bpaf(long("out-of-stock"))]
    out_of_stock: bool,

    /// Image file to upload for the item
    #[bpaf(long, argument("PATH"))]
    image: Option<PathBuf>,
}

impl Create {
    #[instrument(name = "create", skip_all, fields(name = self.name))]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        let admin = admin(&storefront)?;
        let image = read_image(self.image.as_deref()).await?;
        let form = ItemForm {
            name: self.name,
            description: self.description,
            price: self.price,
            category: self.category,
            in_stock: !self.out_of_stock,
        };

        let item = admin.create_item(form, image.as_ref()).await?;

        message::created(format!("Created item '{}' ({})", item.name, item.id));
        Ok(())
    }
}

/// Stock status to set with `edit`
#[derive(Debug, Bpaf, Clone, Copy, PartialEq)]
pub enum StockUpdate {
    /// Mark the item as in stock
    #[bpaf(long("in-stock"))]
    InStock,
    /// Mark the item as out of stock
    #[bpaf(long("out-of-stock"))]
    OutOfStock,
}

// Change fields of an item
#[derive(Debug, Bpaf, Clone)]
pub struct Edit {
    /// New name of the item
    #[bpaf(long, argument("NAME"))]
    name: Option<String>,

    /// New price of the item
    #[bpaf(long, argument("PRICE"))]
    price: Option<f64>,

    /// New description of the item
    #[bpaf(long, argument("TEXT"))]
    description: Option<String>,

    /// New category of the item
    #[bpaf(long, argument("CATEGORY"))]
    category: Option<String>,

    #[bpaf(external(stock_update), optional)]
    stock: Option<StockUpdate>,

    /// New image file to upload for the item
    #[bpaf(long, argument("PATH"))]
    image: Option<PathBuf>,

    /// Id of the item
    #[bpaf(positional("ID"))]
    id: String,
}

impl Edit {
    fn patch(&self) -> ItemPatch {
        ItemPatch {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            category: self.category.clone(),
            in_stock: self.stock.map(|stock| stock == StockUpdate::InStock),
            ..Default::default()
        }
    }

    #[instrument(name = "edit", skip_all, fields(id = self.id))]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        let patch = self.patch();
        if patch.is_empty() && self.image.is_none() {
            bail!("Nothing to change, pass at least one of the item options");
        }
        let admin = admin(&storefront)?;
        let image = read_image(self.image.as_deref()).await?;

        let id = ItemId::from(self.id.as_str());
        let existing = match storefront.catalog_client.get_item(&id).await {
            Err(CatalogClientError::NotFound) => bail!("Item '{id}' not found"),
            result => result.context("Could not get item")?,
        };

        let item = admin
            .update_item(&existing, patch, image.as_ref())
            .await?;

        message::updated(format!("Updated item '{}' ({})", item.name, item.id));
        Ok(())
    }
}

// Delete an item
#[derive(Debug, Bpaf, Clone)]
pub struct Delete {
    /// Id of the item
    #[bpaf(positional("ID"))]
    id: String,
}

impl Delete {
    #[instrument(name = "delete", skip_all, fields(id = self.id))]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        let id = ItemId::from(self.id.as_str());
        let admin = admin(&storefront)?;
        match admin.delete_item(&id).await {
            Err(AdminError::Catalog(CatalogClientError::NotFound)) => {
                bail!("Item '{id}' not found")
            },
            result => result?,
        }

        message::deleted(format!("Deleted item '{id}'"));
        Ok(())
    }
}

// Create items from a JSON file
#[derive(Debug, Bpaf, Clone)]
pub struct Upload {
    /// JSON file containing an array of items
    #[bpaf(positional("FILE"))]
    file: PathBuf,
}

impl Upload {
    #[instrument(name = "upload", skip_all, fields(file = %self.file.display()))]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        let admin = admin(&storefront)?;
        let text = tokio::fs::read_to_string(&self.file)
            .await
            .with_context(|| format!("Could not read '{}'", self.file.display()))?;

        let count = admin.upload_items_json(&text).await?;

        message::created(format!("Uploaded {count} items"));
        Ok(())
    }
}

// Fill the catalog with sample items
#[derive(Debug, Bpaf, Clone)]
pub struct Seed {}

impl Seed {
    #[instrument(name = "seed", skip_all)]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        let count = admin(&storefront)?.seed_database().await?;
        message::created(format!("Seeded the catalog with {count} items"));
        Ok(())
    }
}

// Delete all items of the catalog
#[derive(Debug, Bpaf, Clone)]
pub struct Clear {
    /// Confirm deleting every item
    #[bpaf(long, short)]
    yes: bool,
}

impl Clear {
    #[instrument(name = "clear", skip_all)]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        if !self.yes {
            bail!("This deletes every item of the catalog, pass '--yes' to confirm");
        }
        admin(&storefront)?.clear_database().await?;
        message::deleted("Cleared the catalog");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use storefront_sdk::models::admin::{PLACEHOLDER_IMAGE_NAME, PLACEHOLDER_IMAGE_URL};
    use storefront_sdk::providers::catalog::test_helpers::dummy_item;
    use storefront_sdk::providers::catalog::{MockRequest, MockResponse};

    use super::*;
    use crate::commands::test_helpers::{logged_in_storefront, mock_storefront};
    use crate::utils::message::history::History;

    fn create_args() -> Create {
        Create {
            name: " Desk Lamp ".to_string(),
            price: "24.50".to_string(),
            description: String::new(),
            category: "home".to_string(),
            out_of_stock: false,
            image: None,
        }
    }

    #[test]
    fn login_status_logout() {
        let tempdir = tempfile::tempdir().unwrap();
        History::global().clear();

        let login = Login {
            username: "admin".to_string(),
            password: "admin123".to_string(),
        };
        login.handle(mock_storefront(tempdir.path()).0).unwrap();
        Status {}.handle(mock_storefront(tempdir.path()).0);
        Logout {}.handle(mock_storefront(tempdir.path()).0).unwrap();
        Status {}.handle(mock_storefront(tempdir.path()).0);

        assert_eq!(History::global().messages(), [
            "✅ Logged in as 'admin'",
            "Logged in as admin",
            "✅ Logged out",
            "Not logged in",
        ]);
    }

    #[test]
    fn wrong_password_fails() {
        let tempdir = tempfile::tempdir().unwrap();
        let login = Login {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let err = login.handle(mock_storefront(tempdir.path()).0).unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(!mock_storefront(tempdir.path()).0.session().is_authenticated());
    }

    #[tokio::test]
    async fn create_requires_login() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = mock_storefront(tempdir.path());

        let err = create_args().handle(storefront).await.unwrap_err();
        assert!(err.to_string().contains("not logged in"), "{err}");
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn create_without_image_uses_placeholder() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, object_store) = logged_in_storefront(tempdir.path());
        client.push_item(dummy_item("new"));

        create_args().handle(storefront).await.unwrap();

        let requests = client.requests();
        let [MockRequest::Create(item)] = requests.as_slice() else {
            panic!("expected a single create request, got {requests:?}");
        };
        assert_eq!(item.name, "Desk Lamp");
        assert_eq!(item.price, 24.5);
        assert_eq!(item.image.as_deref(), Some(PLACEHOLDER_IMAGE_URL));
        assert_eq!(item.image_name.as_deref(), Some(PLACEHOLDER_IMAGE_NAME));
        assert!(object_store.uploads().is_empty());
    }

    #[tokio::test]
    async fn create_uploads_image_first() {
        let tempdir = tempfile::tempdir().unwrap();
        let image_path = tempdir.path().join("desk lamp.png");
        std::fs::write(&image_path, b"not really a png").unwrap();

        let (storefront, client, object_store) = logged_in_storefront(tempdir.path());
        client.push_item(dummy_item("new"));

        Create {
            image: Some(image_path),
            ..create_args()
        }
        .handle(storefront)
        .await
        .unwrap();

        let uploads = object_store.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].file_name, "desk lamp.png");
        assert_eq!(uploads[0].content_type, "image/png");

        let requests = client.requests();
        let [MockRequest::Create(item)] = requests.as_slice() else {
            panic!("expected a single create request, got {requests:?}");
        };
        assert_eq!(
            item.image.as_deref(),
            Some("https://storage.invalid/items/1-desk-lamp.png")
        );
        assert_eq!(item.image_name.as_deref(), Some("desk lamp.png"));
    }

    #[tokio::test]
    async fn invalid_price_is_rejected_before_any_request() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = logged_in_storefront(tempdir.path());

        let err = Create {
            price: "cheap".to_string(),
            ..create_args()
        }
        .handle(storefront)
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AdminError>(),
            Some(AdminError::Validation(_))
        ));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn edit_sends_only_changed_fields() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = logged_in_storefront(tempdir.path());
        let mut existing = dummy_item("42");
        existing.image = Some("https://example.com/lamp.png".to_string());
        existing.image_name = Some("lamp.png".to_string());
        client.push_item(existing);
        client.push_item(dummy_item("42"));

        Edit {
            name: None,
            price: Some(12.0),
            description: None,
            category: None,
            stock: Some(StockUpdate::OutOfStock),
            image: None,
            id: "42".to_string(),
        }
        .handle(storefront)
        .await
        .unwrap();

        let requests = client.requests();
        let [MockRequest::Get(_), MockRequest::Update(id, patch)] = requests.as_slice() else {
            panic!("expected get and update requests, got {requests:?}");
        };
        assert_eq!(id.as_str(), "42");
        assert_eq!(patch, &ItemPatch {
            price: Some(12.0),
            in_stock: Some(false),
            image: Some("https://example.com/lamp.png".to_string()),
            image_name: Some("lamp.png".to_string()),
            ..Default::default()
        });
    }

    #[tokio::test]
    async fn edit_without_changes_fails() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = logged_in_storefront(tempdir.path());

        let edit = Edit {
            name: None,
            price: None,
            description: None,
            category: None,
            stock: None,
            image: None,
            id: "42".to_string(),
        };
        assert!(edit.handle(storefront).await.is_err());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn edit_requires_login_before_any_request() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = mock_storefront(tempdir.path());
        client.push_error(404, "Item not found");

        let err = Edit {
            name: Some("Lamp".to_string()),
            price: None,
            description: None,
            category: None,
            stock: None,
            image: Some(tempdir.path().join("missing.png")),
            id: "42".to_string(),
        }
        .handle(storefront)
        .await
        .unwrap_err();

        assert!(err.to_string().contains("not logged in"), "{err}");
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_item() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = logged_in_storefront(tempdir.path());
        client.push_error(404, "Item not found");

        let err = Delete {
            id: "gone".to_string(),
        }
        .handle(storefront)
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Item 'gone' not found");
    }

    #[tokio::test]
    async fn upload_reports_count() {
        let tempdir = tempfile::tempdir().unwrap();
        let file = tempdir.path().join("items.json");
        std::fs::write(
            &file,
            r#"[{"name": "Kettle", "price": 30, "category": "kitchen"}]"#,
        )
        .unwrap();

        let (storefront, client, _) = logged_in_storefront(tempdir.path());
        client.push_response(MockResponse::Count(1));
        History::global().clear();

        Upload { file }.handle(storefront).await.unwrap();

        assert_eq!(History::global().messages(), ["✨ Uploaded 1 items"]);
        let requests = client.requests();
        let [MockRequest::Upload(items)] = requests.as_slice() else {
            panic!("expected an upload request, got {requests:?}");
        };
        assert_eq!(items[0].name, "Kettle");
        assert!(items[0].in_stock);
    }

    #[tokio::test]
    async fn upload_rejects_objects() {
        let tempdir = tempfile::tempdir().unwrap();
        let file = tempdir.path().join("items.json");
        std::fs::write(&file, r#"{"name": "Kettle"}"#).unwrap();

        let (storefront, client, _) = logged_in_storefront(tempdir.path());
        let err = Upload { file }.handle(storefront).await.unwrap_err();
        assert_eq!(err.to_string(), "File must contain an array of items");
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn clear_needs_confirmation() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = logged_in_storefront(tempdir.path());
        assert!(Clear { yes: false }.handle(storefront).await.is_err());
        assert!(client.requests().is_empty());

        let (storefront, client, _) = logged_in_storefront(tempdir.path());
        client.push_response(MockResponse::Empty);
        Clear { yes: true }.handle(storefront).await.unwrap();
        assert_eq!(client.requests(), vec![MockRequest::Clear]);
    }

    #[tokio::test]
    async fn seed_reports_count() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = logged_in_storefront(tempdir.path());
        client.push_response(MockResponse::Count(12));
        History::global().clear();

        Seed {}.handle(storefront).await.unwrap();
        assert_eq!(History::global().messages(), [
            "✨ Seeded the catalog with 12 items"
        ]);
    }
}
