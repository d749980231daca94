//! Read-only product catalog backed by a YAML seed file

use retail_voice_core::{ProductCatalog, ProductContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::ConfigError;

/// Store entry in the seed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    stores: Vec<StoreEntry>,
    #[serde(default)]
    products: Vec<ProductContext>,
}

/// In-memory catalog loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct YamlCatalog {
    stores: HashMap<String, StoreEntry>,
    products: HashMap<String, ProductContext>,
}

impl YamlCatalog {
    /// Load the catalog from `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let catalog = Self::from_yaml(&content)?;
        tracing::info!(
            path = %path.display(),
            stores = catalog.stores.len(),
            products = catalog.products.len(),
            "Loaded product catalog"
        );
        Ok(catalog)
    }

    /// Parse a catalog from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_yaml::from_str(content)?;

        let mut products = HashMap::with_capacity(file.products.len());
        for product in file.products {
            match product.id.clone() {
                Some(id) => {
                    products.insert(id, product);
                }
                None => tracing::warn!(name = ?product.name, "Skipping catalog product without id"),
            }
        }

        Ok(Self {
            stores: file.stores.into_iter().map(|s| (s.id.clone(), s)).collect(),
            products,
        })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl ProductCatalog for YamlCatalog {
    fn product(&self, id: &str) -> Option<ProductContext> {
        self.products.get(id).cloned()
    }

    fn store_name(&self, store_id: &str) -> Option<String> {
        self.stores.get(store_id).map(|s| s.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
stores:
  - id: store_001
    name: Walmart MG Road
products:
  - id: prod_001
    store_id: store_001
    name: Amul Butter
    brand: Amul
    price: 55.0
    stock: 25
    shelf_location: Aisle 4, Left Side, Shelf 2
  - name: Orphan
"#;

    #[test]
    fn test_parse_and_lookup() {
        let catalog = YamlCatalog::from_yaml(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 1);

        let butter = catalog.product("prod_001").unwrap();
        assert_eq!(butter.name.as_deref(), Some("Amul Butter"));
        assert_eq!(butter.stock, Some(25));
        assert_eq!(catalog.store_name("store_001").as_deref(), Some("Walmart MG Road"));
        assert!(catalog.product("prod_999").is_none());
    }

    #[test]
    fn test_resolve_reference() {
        let catalog = YamlCatalog::from_yaml(SAMPLE).unwrap();
        let reference = ProductContext {
            id: Some("prod_001".to_string()),
            ..Default::default()
        };
        let resolved = catalog.resolve(reference);
        assert_eq!(resolved.brand.as_deref(), Some("Amul"));

        let inline = ProductContext {
            name: Some("Custom".to_string()),
            ..Default::default()
        };
        assert_eq!(catalog.resolve(inline.clone()), inline);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let catalog = YamlCatalog::load(file.path()).unwrap();
        assert!(!catalog.is_empty());

        assert!(matches!(
            YamlCatalog::load("/nonexistent/catalog.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
