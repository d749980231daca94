//! Product and query context types

use serde::{Deserialize, Serialize};

/// Product details used to ground answers
///
/// Clients may send a full object, or only an `id` / `product_id` that is
/// resolved against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductContext {
    #[serde(default, alias = "product_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelf_location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comparison_tags: Vec<String>,
}

impl ProductContext {
    /// True when only an identifier was supplied
    pub fn is_reference_only(&self) -> bool {
        self.id.is_some()
            && self.name.is_none()
            && self.brand.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.shelf_location.is_none()
    }

    /// Name to use in spoken answers
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("this product")
    }

    /// Price formatted without trailing zeros
    pub fn price_display(&self) -> Option<String> {
        self.price.map(|p| {
            if p.fract() == 0.0 {
                format!("{}", p as i64)
            } else {
                format!("{:.2}", p)
            }
        })
    }
}

/// Context passed to the query processor for one utterance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    pub store_id: Option<String>,
    pub product: Option<ProductContext>,
}

impl QueryContext {
    pub fn new(store_id: Option<String>, product: Option<ProductContext>) -> Self {
        Self { store_id, product }
    }

    pub fn is_empty(&self) -> bool {
        self.store_id.is_none() && self.product.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_alias() {
        let product: ProductContext =
            serde_json::from_str(r#"{"product_id": "prod_001"}"#).unwrap();
        assert_eq!(product.id.as_deref(), Some("prod_001"));
        assert!(product.is_reference_only());
    }

    #[test]
    fn test_price_display() {
        let mut product = ProductContext {
            price: Some(55.0),
            ..Default::default()
        };
        assert_eq!(product.price_display().as_deref(), Some("55"));
        product.price = Some(42.5);
        assert_eq!(product.price_display().as_deref(), Some("42.50"));
    }
}
