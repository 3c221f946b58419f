//! Product catalog access: listing, image download and upload

use crate::{
    error::{HarmonizeError, Result},
    services::ImageIOService,
    types::{Product, ProductImage},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Catalog backend consumed by the batch orchestrator
///
/// Implementations handle pagination internally; `list_all` returns every product.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Product>>;

    /// # Errors
    /// - `Download` when the image cannot be fetched
    async fn download_image(&self, url: &str) -> Result<Vec<u8>>;

    /// Attach a new image to a product and return its id
    ///
    /// # Errors
    /// - `Upload` when the catalog rejects the image
    async fn upload_image(&self, product_id: &str, buffer: Vec<u8>, filename: &str)
        -> Result<String>;

    async fn delete_image(&self, product_id: &str, image_id: &str) -> Result<()>;
}

/// Optional per-product metadata file
#[derive(Debug, Default, Deserialize)]
struct ProductManifest {
    title: Option<String>,
    #[serde(rename = "type")]
    product_type: Option<String>,
    handle: Option<String>,
}

const MANIFEST_FILE: &str = "product.json";

/// Filesystem-backed catalog
///
/// Every subdirectory of `input_root` is a product named after the directory.
/// An optional `product.json` supplies `title`, `type` and `handle`; the image
/// files inside, sorted by name, are the product images. Uploads land in
/// `output_root/<product id>/`.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    input_root: PathBuf,
    output_root: PathBuf,
    remove_originals: bool,
    client: Client,
}

impl DirectoryRepository {
    /// # Errors
    /// - `Configuration` if the HTTP client cannot be built
    pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(input_root: I, output_root: O) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| HarmonizeError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            remove_originals: false,
            client,
        })
    }

    /// Delete source files when the orchestrator replaces them
    #[must_use]
    pub fn remove_originals(mut self, enabled: bool) -> Self {
        self.remove_originals = enabled;
        self
    }

    #[must_use]
    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn scan(&self) -> Result<Vec<Product>> {
        if !self.input_root.is_dir() {
            return Err(HarmonizeError::configuration(format!(
                "Input directory '{}' does not exist",
                self.input_root.display()
            )));
        }

        let mut products = Vec::new();
        let product_dirs = WalkDir::new(&self.input_root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_dir());

        for entry in product_dirs {
            let id = entry.file_name().to_string_lossy().into_owned();
            let manifest = read_manifest(entry.path())?;

            let images = WalkDir::new(entry.path())
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file() && ImageIOService::is_supported_format(e.path()))
                .map(|e| ProductImage {
                    id: e.file_name().to_string_lossy().into_owned(),
                    url: e.path().to_string_lossy().into_owned(),
                })
                .collect();

            products.push(Product {
                title: manifest.title.unwrap_or_else(|| id.clone()),
                product_type: manifest.product_type.unwrap_or_default(),
                handle: manifest.handle,
                images,
                id,
            });
        }

        log::debug!(
            "Found {} products under {}",
            products.len(),
            self.input_root.display()
        );
        Ok(products)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HarmonizeError::download(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(HarmonizeError::download(
                url,
                format!("HTTP error {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HarmonizeError::download(url, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn read_manifest(dir: &Path) -> Result<ProductManifest> {
    let path = dir.join(MANIFEST_FILE);
    match std::fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            HarmonizeError::configuration(format!("Invalid {}: {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProductManifest::default()),
        Err(e) => Err(HarmonizeError::file_io_error("read product manifest", &path, &e)),
    }
}

#[async_trait]
impl ProductRepository for DirectoryRepository {
    async fn list_all(&self) -> Result<Vec<Product>> {
        let repository = self.clone();
        tokio::task::spawn_blocking(move || repository.scan())
            .await
            .map_err(|e| HarmonizeError::internal(format!("Catalog scan failed: {}", e)))?
    }

    async fn download_image(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch(url).await;
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        tokio::fs::read(path)
            .await
            .map_err(|e| HarmonizeError::download(url, e.to_string()))
    }

    async fn upload_image(
        &self,
        product_id: &str,
        buffer: Vec<u8>,
        filename: &str,
    ) -> Result<String> {
        let dir = self.output_root.join(product_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| HarmonizeError::upload(product_id, e.to_string()))?;

        let target = dir.join(filename);
        tokio::fs::write(&target, buffer)
            .await
            .map_err(|e| HarmonizeError::upload(product_id, e.to_string()))?;

        log::debug!("Uploaded {} for product {}", target.display(), product_id);
        Ok(filename.to_string())
    }

    async fn delete_image(&self, product_id: &str, image_id: &str) -> Result<()> {
        if !self.remove_originals {
            log::debug!("Keeping original {} of product {}", image_id, product_id);
            return Ok(());
        }

        let path = self.input_root.join(product_id).join(image_id);
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| HarmonizeError::file_io_error("delete original image", &path, &e))
    }
}
