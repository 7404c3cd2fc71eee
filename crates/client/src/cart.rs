//! Client-held mirror of the customer's cart.
//!
//! The backend keeps the cart as the customer's pending order. [`CartSync`]
//! mirrors its lines and totals and publishes every change on a `watch`
//! channel. After each mutation the whole cart is fetched again, so the
//! mirror always ends up as the backend last reported it.
//!
//! Only customers have a cart. For anonymous and admin sessions the mirror
//! is empty.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use shopfront_core::{CartItemId, Money, ProductId};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument};

use crate::api::StoreApi;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::gateway::ApiError;
use crate::mirror::{self, Mirrored, SessionAction, SyncStatus};
use crate::models::{CartItem, Order, OrderSummary};
use crate::session::{SessionContext, SessionState};

/// Backend operations the cart mirror needs.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// The pending order, if the customer has one.
    async fn fetch_cart(&self) -> std::result::Result<Option<Order>, ApiError>;
    async fn add_item(&self, subject: &str, product_id: ProductId)
    -> std::result::Result<(), ApiError>;
    async fn set_quantity(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> std::result::Result<(), ApiError>;
    async fn remove_item(&self, item_id: CartItemId) -> std::result::Result<(), ApiError>;
    async fn clear_items(&self) -> std::result::Result<(), ApiError>;
    async fn redeem_coupon(&self, code: &str) -> std::result::Result<Order, ApiError>;
    async fn submit_order(
        &self,
        subject: &str,
        address: &str,
        description: &str,
    ) -> std::result::Result<Order, ApiError>;
}

#[async_trait]
impl CartBackend for StoreApi {
    async fn fetch_cart(&self) -> std::result::Result<Option<Order>, ApiError> {
        self.cart().await
    }

    async fn add_item(
        &self,
        subject: &str,
        product_id: ProductId,
    ) -> std::result::Result<(), ApiError> {
        self.add_to_cart(subject, product_id).await
    }

    async fn set_quantity(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> std::result::Result<(), ApiError> {
        self.update_cart_item(item_id, quantity).await
    }

    async fn remove_item(&self, item_id: CartItemId) -> std::result::Result<(), ApiError> {
        self.remove_cart_item(item_id).await
    }

    async fn clear_items(&self) -> std::result::Result<(), ApiError> {
        self.clear_cart().await
    }

    async fn redeem_coupon(&self, code: &str) -> std::result::Result<Order, ApiError> {
        self.apply_coupon(code).await
    }

    async fn submit_order(
        &self,
        subject: &str,
        address: &str,
        description: &str,
    ) -> std::result::Result<Order, ApiError> {
        self.place_order(subject, address, description).await
    }
}

/// State of the cart mirror at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    /// Server-side pricing of the pending order, including any coupon.
    pub summary: OrderSummary,
    pub status: SyncStatus,
    /// Incremented every time the mirror is cleared.
    pub epoch: u64,
    /// Subject of the customer the mirror belongs to.
    #[serde(skip)]
    owner: Option<String>,
}

impl CartSnapshot {
    /// Sum of line quantities.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of price × quantity over every line.
    #[must_use]
    pub fn total_price(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }

    fn apply_order(&mut self, order: Option<Order>) {
        match order {
            Some(order) => {
                self.items = order.items;
                self.summary = order.summary;
            }
            None => {
                self.items.clear();
                self.summary = OrderSummary::default();
            }
        }
        self.status = SyncStatus::Ready;
    }
}

impl Mirrored for CartSnapshot {
    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn reset(&mut self, epoch: u64, owner: Option<String>) {
        *self = Self {
            epoch,
            owner,
            ..Self::default()
        };
    }
}

/// Keeps the cart mirror in step with the backend.
///
/// Clones share the same mirror. Mutations and loads are serialized: each
/// waits until the previous one's refetch has been applied, so a slow load
/// never overwrites a newer mutation.
#[derive(Clone)]
pub struct CartSync {
    inner: Arc<CartSyncInner>,
}

struct CartSyncInner {
    backend: Arc<dyn CartBackend>,
    session: SessionContext,
    snapshot: watch::Sender<CartSnapshot>,
    mutations: Mutex<()>,
}

impl CartSync {
    #[must_use]
    pub fn new(backend: Arc<dyn CartBackend>, session: SessionContext) -> Self {
        let (snapshot, _) = watch::channel(CartSnapshot::default());
        Self {
            inner: Arc::new(CartSyncInner {
                backend,
                session,
                snapshot,
                mutations: Mutex::new(()),
            }),
        }
    }

    /// Receiver of mirror changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.snapshot.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.inner.snapshot.borrow().items.clone()
    }

    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.inner.snapshot.borrow().total_items()
    }

    #[must_use]
    pub fn total_price(&self) -> Money {
        self.inner.snapshot.borrow().total_price()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Bring the mirror in line with `state`: load for a customer, clear
    /// for anyone else, wait while the session is loading.
    ///
    /// Load failures are recorded on the snapshot status.
    pub async fn sync_with_session(&self, state: &SessionState) {
        match mirror::action_for(state) {
            SessionAction::Load(identity) => {
                let _guard = self.inner.mutations.lock().await;
                let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);
                if let Err(e) = self.load(epoch).await {
                    debug!(error = %e, "Cart load failed");
                }
            }
            SessionAction::Clear => mirror::clear(&self.inner.snapshot),
            SessionAction::Wait => {}
        }
    }

    /// Follow a session channel until it closes.
    ///
    /// A load still running when the session changes again is abandoned.
    pub async fn run(self, mut session: watch::Receiver<SessionState>) {
        loop {
            let state = session.borrow_and_update().clone();
            tokio::select! {
                () = self.sync_with_session(&state) => {}
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
            if session.changed().await.is_err() {
                break;
            }
        }
    }

    /// Fetch the cart again.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless a
    ///   customer is signed in
    /// - `ClientError::Api` if the fetch fails
    pub async fn refresh(&self) -> Result<()> {
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);
        self.load(epoch).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add one unit of a product.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless a
    ///   customer is signed in
    /// - `ClientError::AlreadyInCart` if the backend already has a line for
    ///   the product
    /// - `ClientError::Api` for any other failure
    #[instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn add_to_cart(&self, product_id: ProductId) -> Result<()> {
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);

        add_breadcrumb(
            "cart",
            "Add to cart",
            Some(&[("product_id", product_id.to_string().as_str())][..]),
        );

        match self
            .inner
            .backend
            .add_item(&identity.subject, product_id)
            .await
        {
            Ok(()) => {}
            Err(e) if e.status() == Some(409) => {
                return Err(ClientError::AlreadyInCart(product_id));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Added to cart");
        self.load(epoch).await
    }

    /// Set the quantity of a line. A quantity of zero or less removes it.
    ///
    /// # Errors
    ///
    /// Same as [`Self::remove_from_cart`]; `ClientError::InvalidArgument` if
    /// the quantity is out of range.
    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    pub async fn update_quantity(&self, item_id: CartItemId, quantity: i64) -> Result<()> {
        let identity = mirror::require_customer(&self.inner.session)?;
        let quantity = if quantity <= 0 {
            None
        } else {
            Some(u32::try_from(quantity).map_err(|_| {
                ClientError::InvalidArgument(format!("quantity {quantity} is too large"))
            })?)
        };

        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);

        let Some(quantity) = quantity else {
            return self.remove_locked(epoch, item_id).await;
        };

        let result = self.inner.backend.set_quantity(item_id, quantity).await;
        self.reconcile(epoch, result).await
    }

    /// Remove a line.
    ///
    /// The line disappears from the mirror at once; the cart is then fetched
    /// again. If the backend call fails, the refetch restores the line and
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless a
    ///   customer is signed in
    /// - `ClientError::Api` if the removal or the refetch fails
    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    pub async fn remove_from_cart(&self, item_id: CartItemId) -> Result<()> {
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);
        self.remove_locked(epoch, item_id).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Same as [`Self::remove_from_cart`].
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<()> {
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);

        mirror::apply_at(&self.inner.snapshot, epoch, |snapshot| {
            snapshot.items.clear();
        });
        let result = self.inner.backend.clear_items().await;
        self.reconcile(epoch, result).await
    }

    /// Apply a coupon. The mirror takes the repriced summary from the
    /// backend's answer.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidArgument` if `code` is blank
    /// - `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless a
    ///   customer is signed in
    /// - `ClientError::Api` if the backend rejects the coupon
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<OrderSummary> {
        if code.trim().is_empty() {
            return Err(ClientError::InvalidArgument(
                "coupon code is empty".to_string(),
            ));
        }
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);

        let order = self.inner.backend.redeem_coupon(code).await?;
        let summary = order.summary;
        mirror::apply_at(&self.inner.snapshot, epoch, |snapshot| {
            snapshot.summary = summary.clone();
        });
        Ok(summary)
    }

    /// Place the pending order. The cart is empty afterwards.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidArgument` if the cart or `address` is empty
    /// - `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless a
    ///   customer is signed in
    /// - `ClientError::Api` if the backend call fails
    #[instrument(skip(self, address, description))]
    pub async fn place_order(&self, address: &str, description: &str) -> Result<Order> {
        if address.trim().is_empty() {
            return Err(ClientError::InvalidArgument("address is empty".to_string()));
        }
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);

        if !self.inner.snapshot.borrow().status.is_ready() {
            self.load(epoch).await?;
        }
        if self.inner.snapshot.borrow().is_empty() {
            return Err(ClientError::InvalidArgument("cart is empty".to_string()));
        }

        add_breadcrumb("cart", "Place order", None);
        let order = self
            .inner
            .backend
            .submit_order(&identity.subject, address.trim(), description.trim())
            .await?;
        info!(order_id = %order.id, "Order placed");

        self.load(epoch).await?;
        Ok(order)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn remove_locked(&self, epoch: u64, item_id: CartItemId) -> Result<()> {
        mirror::apply_at(&self.inner.snapshot, epoch, |snapshot| {
            snapshot.items.retain(|item| item.id != item_id);
        });
        let result = self.inner.backend.remove_item(item_id).await;
        self.reconcile(epoch, result).await
    }

    /// Refetch after a mutation. The mutation's error wins over the
    /// refetch's.
    async fn reconcile(
        &self,
        epoch: u64,
        result: std::result::Result<(), ApiError>,
    ) -> Result<()> {
        let reloaded = self.load(epoch).await;
        match result {
            Ok(()) => reloaded,
            Err(e) => {
                if let Err(reload_err) = &reloaded {
                    mirror::log_refetch_failure("cart", reload_err);
                }
                Err(e.into())
            }
        }
    }

    /// Fetch the cart and apply it if the mirror is still at `epoch`.
    #[instrument(skip(self))]
    async fn load(&self, epoch: u64) -> Result<()> {
        mirror::apply_at(&self.inner.snapshot, epoch, |snapshot| {
            snapshot.status = SyncStatus::Loading;
        });

        match self.inner.backend.fetch_cart().await {
            Ok(order) => {
                let applied = mirror::apply_at(&self.inner.snapshot, epoch, |snapshot| {
                    snapshot.apply_order(order);
                });
                if !applied {
                    debug!("Discarding cart fetched for a cleared mirror");
                }
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                mirror::apply_at(&self.inner.snapshot, epoch, |snapshot| {
                    snapshot.status = SyncStatus::Failed(message);
                });
                Err(e.into())
            }
        }
    }
}
