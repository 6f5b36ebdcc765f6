use crate::cache::CacheError;
use crate::domain::ErrorKind;
use crate::store::StoreError;

// ============================================================================
// Catalog Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Dish not found: {0}")]
    DishNotFound(i64),

    #[error("Combo not found: {0}")]
    ComboNotFound(i64),

    #[error("Dish {0} is on sale and cannot be deleted")]
    DishOnSale(i64),

    #[error("Dishes are referenced by combos {0:?} and cannot be deleted")]
    DishInCombo(Vec<i64>),

    #[error("Combo {0} is on sale and cannot be deleted")]
    ComboOnSale(i64),

    #[error("Combo cannot be on sale while dish {dish_id} ({name}) is off sale")]
    ComboHasDisabledDish { dish_id: i64, name: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cache invalidation failed: {0}")]
    Cache(#[from] CacheError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::DishNotFound(_) | CatalogError::ComboNotFound(_) => ErrorKind::NotFound,
            CatalogError::DishOnSale(_)
            | CatalogError::DishInCombo(_)
            | CatalogError::ComboOnSale(_)
            | CatalogError::ComboHasDisabledDish { .. } => ErrorKind::BusinessRuleViolation,
            CatalogError::Store(e) => e.kind(),
            CatalogError::Cache(e) => e.kind(),
        }
    }
}
