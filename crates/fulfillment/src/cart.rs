//! Cart operations.

use common::{CartItemId, ProductId, UserId};
use domain::{Cart, CartItem, CartLine};
use store::{CartRepository, EntityKind, ProductCatalog, Store, UnitOfWork};

use crate::error::{FulfillmentError, Result};

/// Manages the per-user cart.
///
/// Every write locks the user's cart row first, so concurrent edits of one
/// cart apply one after another and the merge-on-add rule sees the latest
/// quantity.
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    /// Creates a new cart service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the user's cart, creating an empty one on first access.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create(&self, user_id: UserId) -> Result<Cart> {
        let mut unit = self.store.begin().await?;
        let cart = Self::locked_cart(&mut unit, user_id).await?;
        unit.commit().await?;
        Ok(cart)
    }

    /// Adds `quantity` units of a product, merging into an existing line for
    /// the same product.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut unit = self.store.begin().await?;
        let cart = Self::locked_cart(&mut unit, user_id).await?;
        let product = unit
            .find_product(product_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Product, product_id))?;

        match cart.plan_add(&product, quantity)? {
            CartLine::Insert(item) => {
                unit.insert_cart_item(&item).await?;
                tracing::debug!(item_id = %item.id, "cart line added");
            }
            CartLine::Merge {
                item_id,
                quantity,
                unit_price,
            } => {
                unit.update_cart_item(item_id, quantity, unit_price).await?;
                tracing::debug!(%item_id, quantity, "cart line merged");
            }
        }

        let cart = Self::reload(&mut unit, user_id).await?;
        unit.commit().await?;
        Ok(cart)
    }

    /// Replaces a line's quantity. The line keeps its price snapshot.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut unit = self.store.begin().await?;
        let cart = Self::locked_cart(&mut unit, user_id).await?;
        let item = Self::owned_item(&cart, item_id)?;
        let product = unit
            .find_product(item.product_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Product, item.product_id))?;

        CartItem::check_quantity(&product, quantity)?;
        unit.update_cart_item(item_id, quantity, item.unit_price)
            .await?;

        let cart = Self::reload(&mut unit, user_id).await?;
        unit.commit().await?;
        Ok(cart)
    }

    /// Removes a single line from the user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user_id: UserId, item_id: CartItemId) -> Result<Cart> {
        let mut unit = self.store.begin().await?;
        let cart = Self::locked_cart(&mut unit, user_id).await?;
        Self::owned_item(&cart, item_id)?;
        unit.delete_cart_item(item_id).await?;

        let cart = Self::reload(&mut unit, user_id).await?;
        unit.commit().await?;
        Ok(cart)
    }

    /// Removes every line from the user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<()> {
        let mut unit = self.store.begin().await?;
        if let Some(cart) = unit.lock_cart(user_id).await? {
            let removed = unit.clear_cart(cart.id).await?;
            tracing::debug!(removed, "cart cleared");
        }
        unit.commit().await?;
        Ok(())
    }

    async fn locked_cart(unit: &mut S::Unit, user_id: UserId) -> Result<Cart> {
        if let Some(cart) = unit.lock_cart(user_id).await? {
            return Ok(cart);
        }
        unit.create_cart_if_missing(&Cart::new(user_id)).await?;
        // Re-read: a concurrent first access may have inserted the row.
        unit.lock_cart(user_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Cart, user_id))
    }

    async fn reload(unit: &mut S::Unit, user_id: UserId) -> Result<Cart> {
        unit.find_cart(user_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Cart, user_id))
    }

    fn owned_item(cart: &Cart, item_id: CartItemId) -> Result<CartItem> {
        cart.items
            .iter()
            .find(|item| item.id == item_id)
            .cloned()
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::CartItem, item_id))
    }
}
