use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::cache::{CacheScope, CatalogCache, InvalidationMode};
use crate::models::{
    Combo, ComboDish, ComboDishItem, Dish, DishFlavor, ItemStatus, NewCombo, NewDish,
};
use crate::store::CatalogRepository;

use super::errors::CatalogError;

// ============================================================================
// Catalog Service
// ============================================================================
//
// Dish and combo writes with their business rules, each followed by the
// matching cache invalidation:
//
//   create          → Category(category_id)   precise
//   update / delete → All                     coarse
//   status change   → All                     coarse
//
// Writes are serialized so rule checks (on sale? referenced by a combo?)
// cannot interleave with a concurrent write that would invalidate them.
//
// ============================================================================

/// Editable dish fields. Availability changes go through set_dish_status.
#[derive(Debug, Clone)]
pub struct DishUpdate {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
    pub price: Decimal,
    pub image: Option<String>,
    pub description: Option<String>,
    pub flavors: Vec<DishFlavor>,
}

/// Editable combo fields. Availability changes go through set_combo_status.
#[derive(Debug, Clone)]
pub struct ComboUpdate {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub image: Option<String>,
    pub dishes: Vec<ComboDish>,
}

pub struct CatalogService {
    store: Arc<dyn CatalogRepository>,
    dish_cache: CatalogCache,
    combo_cache: CatalogCache,
    write_lock: Mutex<()>,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn CatalogRepository>,
        dish_cache: CatalogCache,
        combo_cache: CatalogCache,
    ) -> Self {
        Self {
            store,
            dish_cache,
            combo_cache,
            write_lock: Mutex::new(()),
        }
    }

    // ========================================================================
    // Dishes
    // ========================================================================

    pub async fn create_dish(&self, dish: NewDish) -> Result<Dish, CatalogError> {
        let _guard = self.write_lock.lock().await;

        let dish = self.store.insert_dish(dish).await?;
        self.dish_cache.invalidate(CacheScope::Category(dish.category_id)).await?;

        tracing::info!(dish_id = dish.id, category_id = dish.category_id, "🍜 Dish created");
        Ok(dish)
    }

    pub async fn update_dish(&self, update: DishUpdate) -> Result<Dish, CatalogError> {
        let _guard = self.write_lock.lock().await;

        let current = self.require_dish(update.id).await?;
        let dish = Dish {
            id: update.id,
            name: update.name,
            category_id: update.category_id,
            price: update.price,
            image: update.image,
            description: update.description,
            status: current.status,
            flavors: update.flavors,
            update_time: current.update_time,
        };
        let dish = self.store.update_dish(dish).await?;

        // The dish may have moved between categories
        self.dish_cache.invalidate(CacheScope::All).await?;

        tracing::info!(dish_id = dish.id, "Dish updated");
        Ok(dish)
    }

    /// Disabling a dish also takes every on-sale combo containing it off sale
    pub async fn set_dish_status(&self, id: i64, status: ItemStatus) -> Result<Dish, CatalogError> {
        let _guard = self.write_lock.lock().await;

        let mut dish = self.require_dish(id).await?;
        dish.status = status;
        let dish = self.store.update_dish(dish).await?;

        // From here on the dish row is committed: both caches are dropped
        // whatever happens to the combo cascade
        let mut cascaded = Vec::new();
        let cascade = if status.is_enabled() {
            Ok(())
        } else {
            self.take_combos_off_sale(id, &mut cascaded).await
        };

        let dishes_invalidated = self.dish_cache.invalidate(CacheScope::All).await;
        let combos_invalidated = if cascade.is_err() || !cascaded.is_empty() {
            self.combo_cache.invalidate(CacheScope::All).await
        } else {
            Ok(InvalidationMode::Coarse)
        };

        if let Err(e) = cascade {
            tracing::error!(
                dish_id = id,
                cascaded_combos = ?cascaded,
                error = %e,
                "❌ Combo cascade failed after dish status change"
            );
            return Err(e);
        }
        dishes_invalidated?;
        combos_invalidated?;

        tracing::info!(
            dish_id = id,
            status = ?status,
            cascaded_combos = ?cascaded,
            "Dish status changed"
        );
        Ok(dish)
    }

    async fn take_combos_off_sale(&self, dish_id: i64, cascaded: &mut Vec<i64>) -> Result<(), CatalogError> {
        for combo_id in self.store.combo_ids_for_dishes(&[dish_id]).await? {
            if let Some(mut combo) = self.store.get_combo(combo_id).await? {
                if combo.status.is_enabled() {
                    combo.status = ItemStatus::Disabled;
                    self.store.update_combo(combo).await?;
                    cascaded.push(combo_id);
                }
            }
        }
        Ok(())
    }

    /// All-or-nothing: fails without deleting anything if any dish is on sale
    /// or referenced by a combo
    pub async fn delete_dishes(&self, ids: &[i64]) -> Result<(), CatalogError> {
        let _guard = self.write_lock.lock().await;

        for id in ids {
            let dish = self.require_dish(*id).await?;
            if dish.status.is_enabled() {
                return Err(CatalogError::DishOnSale(*id));
            }
        }

        let combo_ids = self.store.combo_ids_for_dishes(ids).await?;
        if !combo_ids.is_empty() {
            return Err(CatalogError::DishInCombo(combo_ids));
        }

        self.store.delete_dishes(ids).await?;
        self.dish_cache.invalidate(CacheScope::All).await?;

        tracing::info!(dish_ids = ?ids, "🗑️ Dishes deleted");
        Ok(())
    }

    pub async fn get_dish(&self, id: i64) -> Result<Dish, CatalogError> {
        self.require_dish(id).await
    }

    /// On-sale dishes of a category, served through the cache
    pub async fn list_dishes(&self, category_id: i64) -> Result<Vec<Dish>, CatalogError> {
        self.dish_cache
            .get_or_load(category_id, || async {
                self.store
                    .list_dishes(category_id, Some(ItemStatus::Enabled))
                    .await
                    .map_err(CatalogError::from)
            })
            .await
    }

    // ========================================================================
    // Combos
    // ========================================================================

    pub async fn create_combo(&self, combo: NewCombo) -> Result<Combo, CatalogError> {
        let _guard = self.write_lock.lock().await;

        if combo.status.is_enabled() {
            self.ensure_dishes_on_sale(&combo.dishes).await?;
        }
        let combo = self.store.insert_combo(combo).await?;
        self.combo_cache.invalidate(CacheScope::Category(combo.category_id)).await?;

        tracing::info!(combo_id = combo.id, category_id = combo.category_id, "🍱 Combo created");
        Ok(combo)
    }

    pub async fn update_combo(&self, update: ComboUpdate) -> Result<Combo, CatalogError> {
        let _guard = self.write_lock.lock().await;

        let current = self.require_combo(update.id).await?;
        if current.status.is_enabled() {
            self.ensure_dishes_on_sale(&update.dishes).await?;
        }

        let combo = Combo {
            id: update.id,
            category_id: update.category_id,
            name: update.name,
            price: update.price,
            status: current.status,
            description: update.description,
            image: update.image,
            dishes: update.dishes,
            update_time: current.update_time,
        };
        let combo = self.store.update_combo(combo).await?;
        self.combo_cache.invalidate(CacheScope::All).await?;

        tracing::info!(combo_id = combo.id, "Combo updated");
        Ok(combo)
    }

    pub async fn set_combo_status(&self, id: i64, status: ItemStatus) -> Result<Combo, CatalogError> {
        let _guard = self.write_lock.lock().await;

        let mut combo = self.require_combo(id).await?;
        if status.is_enabled() {
            self.ensure_dishes_on_sale(&combo.dishes).await?;
        }
        combo.status = status;
        let combo = self.store.update_combo(combo).await?;
        self.combo_cache.invalidate(CacheScope::All).await?;

        tracing::info!(combo_id = id, status = ?status, "Combo status changed");
        Ok(combo)
    }

    pub async fn delete_combos(&self, ids: &[i64]) -> Result<(), CatalogError> {
        let _guard = self.write_lock.lock().await;

        for id in ids {
            let combo = self.require_combo(*id).await?;
            if combo.status.is_enabled() {
                return Err(CatalogError::ComboOnSale(*id));
            }
        }

        self.store.delete_combos(ids).await?;
        self.combo_cache.invalidate(CacheScope::All).await?;

        tracing::info!(combo_ids = ?ids, "🗑️ Combos deleted");
        Ok(())
    }

    pub async fn get_combo(&self, id: i64) -> Result<Combo, CatalogError> {
        self.require_combo(id).await
    }

    /// On-sale combos of a category, served through the cache
    pub async fn list_combos(&self, category_id: i64) -> Result<Vec<Combo>, CatalogError> {
        self.combo_cache
            .get_or_load(category_id, || async {
                self.store
                    .list_combos(category_id, Some(ItemStatus::Enabled))
                    .await
                    .map_err(CatalogError::from)
            })
            .await
    }

    /// Constituent dishes of a combo as shown to customers
    pub async fn combo_dish_items(&self, combo_id: i64) -> Result<Vec<ComboDishItem>, CatalogError> {
        let combo = self.require_combo(combo_id).await?;

        let mut items = Vec::with_capacity(combo.dishes.len());
        for link in &combo.dishes {
            let dish = self.store.get_dish(link.dish_id).await?;
            items.push(ComboDishItem {
                name: link.name.clone(),
                copies: link.copies,
                image: dish.as_ref().and_then(|d| d.image.clone()),
                description: dish.and_then(|d| d.description),
            });
        }
        Ok(items)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn require_dish(&self, id: i64) -> Result<Dish, CatalogError> {
        self.store
            .get_dish(id)
            .await?
            .ok_or(CatalogError::DishNotFound(id))
    }

    async fn require_combo(&self, id: i64) -> Result<Combo, CatalogError> {
        self.store
            .get_combo(id)
            .await?
            .ok_or(CatalogError::ComboNotFound(id))
    }

    async fn ensure_dishes_on_sale(&self, links: &[ComboDish]) -> Result<(), CatalogError> {
        for link in links {
            let dish = self.require_dish(link.dish_id).await?;
            if !dish.status.is_enabled() {
                return Err(CatalogError::ComboHasDisabledDish {
                    dish_id: dish.id,
                    name: dish.name,
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
