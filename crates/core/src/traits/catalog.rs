//! Product lookup

use crate::ProductContext;

/// Read-only product catalog
pub trait ProductCatalog: Send + Sync + 'static {
    /// Look up a product by identifier
    fn product(&self, id: &str) -> Option<ProductContext>;

    /// Human-readable store name, if the store is known
    fn store_name(&self, store_id: &str) -> Option<String>;

    /// Fill in a reference-only product context from the catalog
    fn resolve(&self, product: ProductContext) -> ProductContext {
        if !product.is_reference_only() {
            return product;
        }
        product
            .id
            .as_deref()
            .and_then(|id| self.product(id))
            .unwrap_or(product)
    }
}
