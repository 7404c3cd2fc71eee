//! Client-held mirror of the customer's wishlist.
//!
//! The wishlist is a set keyed by product: adding a product that is already
//! on it returns the existing entry without calling the backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use shopfront_core::{ProductId, WishlistItemId};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument};

use crate::api::StoreApi;
use crate::cart::CartSync;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::gateway::ApiError;
use crate::mirror::{self, Mirrored, SessionAction, SyncStatus};
use crate::models::WishlistItem;
use crate::session::{SessionContext, SessionState};

/// Backend operations the wishlist mirror needs.
#[async_trait]
pub trait WishlistBackend: Send + Sync {
    async fn fetch_wishlist(&self) -> std::result::Result<Vec<WishlistItem>, ApiError>;
    async fn add_entry(
        &self,
        subject: &str,
        product_id: ProductId,
    ) -> std::result::Result<(), ApiError>;
    async fn remove_entry(&self, item_id: WishlistItemId) -> std::result::Result<(), ApiError>;
}

#[async_trait]
impl WishlistBackend for StoreApi {
    async fn fetch_wishlist(&self) -> std::result::Result<Vec<WishlistItem>, ApiError> {
        self.wishlist().await
    }

    async fn add_entry(
        &self,
        subject: &str,
        product_id: ProductId,
    ) -> std::result::Result<(), ApiError> {
        self.add_to_wishlist(subject, product_id).await
    }

    async fn remove_entry(&self, item_id: WishlistItemId) -> std::result::Result<(), ApiError> {
        self.remove_from_wishlist(item_id).await
    }
}

/// State of the wishlist mirror at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WishlistSnapshot {
    pub items: Vec<WishlistItem>,
    pub status: SyncStatus,
    pub epoch: u64,
    #[serde(skip)]
    owner: Option<String>,
}

impl WishlistSnapshot {
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.find(product_id).is_some()
    }

    #[must_use]
    pub fn find(&self, product_id: ProductId) -> Option<&WishlistItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keep the first entry per product.
    fn set_items(&mut self, items: Vec<WishlistItem>) {
        let mut unique: Vec<WishlistItem> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.iter().any(|kept| kept.product_id == item.product_id) {
                unique.push(item);
            }
        }
        self.items = unique;
        self.status = SyncStatus::Ready;
    }
}

impl Mirrored for WishlistSnapshot {
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

/// Keeps the wishlist mirror in step with the backend.
#[derive(Clone)]
pub struct WishlistSync {
    inner: Arc<WishlistSyncInner>,
}

struct WishlistSyncInner {
    backend: Arc<dyn WishlistBackend>,
    session: SessionContext,
    snapshot: watch::Sender<WishlistSnapshot>,
    mutations: Mutex<()>,
}

impl WishlistSync {
    #[must_use]
    pub fn new(backend: Arc<dyn WishlistBackend>, session: SessionContext) -> Self {
        let (snapshot, _) = watch::channel(WishlistSnapshot::default());
        Self {
            inner: Arc::new(WishlistSyncInner {
                backend,
                session,
                snapshot,
                mutations: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WishlistSnapshot> {
        self.inner.snapshot.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> WishlistSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn items(&self) -> Vec<WishlistItem> {
        self.inner.snapshot.borrow().items.clone()
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.inner.snapshot.borrow().contains(product_id)
    }

    /// Load for a customer, clear for anyone else. A load waits for any
    /// mutation in flight.
    pub async fn sync_with_session(&self, state: &SessionState) {
        match mirror::action_for(state) {
            SessionAction::Load(identity) => {
                let _guard = self.inner.mutations.lock().await;
                let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);
                if let Err(e) = self.fetch(epoch).await {
                    debug!(error = %e, "Wishlist load failed");
                }
            }
            SessionAction::Clear => mirror::clear(&self.inner.snapshot),
            SessionAction::Wait => {}
        }
    }

    /// Follow a session channel until it closes.
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

    /// Fetch the wishlist again.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless a
    ///   customer is signed in
    /// - `ClientError::Api` if the fetch fails
    pub async fn load(&self) -> Result<()> {
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);
        self.fetch(epoch).await
    }

    /// Add a product. If it is already on the wishlist, the existing entry
    /// is returned and the backend is not called.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless a
    ///   customer is signed in
    /// - `ClientError::Api` if the backend call fails
    /// - `ClientError::NotFound` if the refetched wishlist lacks the product
    #[instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn add(&self, product_id: ProductId) -> Result<WishlistItem> {
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);

        let existing = self.inner.snapshot.borrow().find(product_id).cloned();
        if let Some(existing) = existing {
            debug!("Already on wishlist");
            return Ok(existing);
        }

        add_breadcrumb(
            "wishlist",
            "Add to wishlist",
            Some(&[("product_id", product_id.to_string().as_str())][..]),
        );
        self.inner
            .backend
            .add_entry(&identity.subject, product_id)
            .await?;
        self.fetch(epoch).await?;

        info!("Added to wishlist");
        self.inner
            .snapshot
            .borrow()
            .find(product_id)
            .cloned()
            .ok_or_else(|| {
                ClientError::NotFound(format!("wishlist entry for product {product_id}"))
            })
    }

    /// Remove an entry. It leaves the mirror at once; the wishlist is then
    /// fetched again.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless a
    ///   customer is signed in
    /// - `ClientError::Api` if the removal or the refetch fails
    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    pub async fn remove(&self, item_id: WishlistItemId) -> Result<()> {
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);
        self.remove_locked(epoch, item_id).await
    }

    /// Put an entry's product in the cart and take it off the wishlist.
    ///
    /// A product that is already in the cart still leaves the wishlist.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotFound` if no entry has `item_id`
    /// - any error from [`CartSync::add_to_cart`] other than
    ///   `ClientError::AlreadyInCart`, or from [`Self::remove`]
    #[instrument(skip(self, item_id, cart), fields(item_id = %item_id))]
    pub async fn move_to_cart(&self, item_id: WishlistItemId, cart: &CartSync) -> Result<()> {
        let identity = mirror::require_customer(&self.inner.session)?;
        let _guard = self.inner.mutations.lock().await;
        let epoch = mirror::claim(&self.inner.snapshot, &identity.subject);

        let product_id = self
            .inner
            .snapshot
            .borrow()
            .items
            .iter()
            .find(|item| item.id == item_id)
            .map(|item| item.product_id)
            .ok_or_else(|| ClientError::NotFound(format!("wishlist entry {item_id}")))?;

        match cart.add_to_cart(product_id).await {
            Ok(()) | Err(ClientError::AlreadyInCart(_)) => {}
            Err(e) => return Err(e),
        }
        self.remove_locked(epoch, item_id).await
    }

    async fn remove_locked(&self, epoch: u64, item_id: WishlistItemId) -> Result<()> {
        mirror::apply_at(&self.inner.snapshot, epoch, |snapshot| {
            snapshot.items.retain(|item| item.id != item_id);
        });

        let result = self.inner.backend.remove_entry(item_id).await;
        let reloaded = self.fetch(epoch).await;
        match result {
            Ok(()) => reloaded,
            Err(e) => {
                if let Err(reload_err) = &reloaded {
                    mirror::log_refetch_failure("wishlist", reload_err);
                }
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self))]
    async fn fetch(&self, epoch: u64) -> Result<()> {
        mirror::apply_at(&self.inner.snapshot, epoch, |snapshot| {
            snapshot.status = SyncStatus::Loading;
        });

        match self.inner.backend.fetch_wishlist().await {
            Ok(items) => {
                if !mirror::apply_at(&self.inner.snapshot, epoch, |snapshot| {
                    snapshot.set_items(items);
                }) {
                    debug!("Discarding wishlist fetched for a cleared mirror");
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use shopfront_core::{CartItemId, Money, OrderId, OrderStatus, Role};
    use tokio::sync::Notify;

    use super::*;
    use crate::cart::CartBackend;
    use crate::models::{CartItem, Order, OrderSummary};
    use crate::session::tests::signed_in;

    #[derive(Default)]
    struct FakeWishlist {
        entries: StdMutex<Vec<WishlistItem>>,
        adds: AtomicUsize,
        fail_remove: bool,
        /// When set, the next fetch reads the entries, signals the first
        /// notify and waits on the second before answering.
        hold_fetch: StdMutex<Option<(Arc<Notify>, Arc<Notify>)>>,
    }

    #[async_trait]
    impl WishlistBackend for FakeWishlist {
        async fn fetch_wishlist(&self) -> std::result::Result<Vec<WishlistItem>, ApiError> {
            let entries = self.entries.lock().unwrap().clone();
            let hold = self.hold_fetch.lock().unwrap().take();
            if let Some((started, release)) = hold {
                started.notify_one();
                release.notified().await;
            }
            Ok(entries)
        }

        async fn add_entry(
            &self,
            _subject: &str,
            product_id: ProductId,
        ) -> std::result::Result<(), ApiError> {
            self.adds.fetch_add(1, Ordering::SeqCst);
            let mut entries = self.entries.lock().unwrap();
            let id = i64::try_from(entries.len()).unwrap() + 1;
            entries.push(WishlistItem {
                id: WishlistItemId::new(id),
                product_id,
                name: format!("Product {product_id}"),
                price: Money::from(5),
                description: None,
                image: None,
            });
            Ok(())
        }

        async fn remove_entry(
            &self,
            item_id: WishlistItemId,
        ) -> std::result::Result<(), ApiError> {
            if self.fail_remove {
                return Err(ApiError::Status {
                    status: 503,
                    body: String::new(),
                });
            }
            self.entries.lock().unwrap().retain(|item| item.id != item_id);
            Ok(())
        }
    }

    /// Cart backend that accepts every add and remembers the products.
    #[derive(Default)]
    struct RecordingCart {
        added: StdMutex<Vec<ProductId>>,
    }

    #[async_trait]
    impl CartBackend for RecordingCart {
        async fn fetch_cart(&self) -> std::result::Result<Option<Order>, ApiError> {
            let items = self
                .added
                .lock()
                .unwrap()
                .iter()
                .map(|&product_id| CartItem {
                    id: CartItemId::new(product_id.as_i64()),
                    product_id,
                    name: String::new(),
                    price: Money::from(5),
                    quantity: 1,
                    image: None,
                })
                .collect();
            Ok(Some(Order {
                id: OrderId::new(1),
                description: None,
                date: None,
                address: None,
                payment: None,
                status: OrderStatus::Pending,
                tracking_id: None,
                user_name: None,
                summary: OrderSummary::default(),
                items,
            }))
        }

        async fn add_item(
            &self,
            _subject: &str,
            product_id: ProductId,
        ) -> std::result::Result<(), ApiError> {
            self.added.lock().unwrap().push(product_id);
            Ok(())
        }

        async fn set_quantity(
            &self,
            _item_id: CartItemId,
            _quantity: u32,
        ) -> std::result::Result<(), ApiError> {
            Ok(())
        }

        async fn remove_item(&self, _item_id: CartItemId) -> std::result::Result<(), ApiError> {
            Ok(())
        }

        async fn clear_items(&self) -> std::result::Result<(), ApiError> {
            Ok(())
        }

        async fn redeem_coupon(&self, _code: &str) -> std::result::Result<Order, ApiError> {
            Err(ApiError::EmptyBody)
        }

        async fn submit_order(
            &self,
            _subject: &str,
            _address: &str,
            _description: &str,
        ) -> std::result::Result<Order, ApiError> {
            Err(ApiError::EmptyBody)
        }
    }

    async fn customer_wishlist(
        backend: FakeWishlist,
    ) -> (WishlistSync, Arc<FakeWishlist>, SessionContext) {
        let backend = Arc::new(backend);
        let session = signed_in("kc-1", Role::Customer).await;
        let wishlist = WishlistSync::new(backend.clone(), session.clone());
        wishlist.sync_with_session(&session.state()).await;
        (wishlist, backend, session)
    }

    #[tokio::test]
    async fn test_add_is_idempotent_per_product() {
        let (wishlist, backend, _) = customer_wishlist(FakeWishlist::default()).await;

        let first = wishlist.add(ProductId::new(3)).await.unwrap();
        let second = wishlist.add(ProductId::new(3)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(wishlist.snapshot().len(), 1);
        assert_eq!(backend.adds.load(Ordering::SeqCst), 1);
        assert!(wishlist.contains(ProductId::new(3)));
    }

    #[tokio::test]
    async fn test_duplicate_backend_rows_collapse() {
        let backend = FakeWishlist::default();
        for id in [1, 2] {
            backend.entries.lock().unwrap().push(WishlistItem {
                id: WishlistItemId::new(id),
                product_id: ProductId::new(9),
                name: "Lamp".to_string(),
                price: Money::from(5),
                description: None,
                image: None,
            });
        }

        let (wishlist, _, _) = customer_wishlist(backend).await;
        assert_eq!(wishlist.snapshot().len(), 1);
        assert_eq!(wishlist.items()[0].id, WishlistItemId::new(1));
    }

    #[tokio::test]
    async fn test_failed_remove_refetches() {
        let (wishlist, _, _) = customer_wishlist(FakeWishlist {
            fail_remove: true,
            ..FakeWishlist::default()
        })
        .await;
        let item = wishlist.add(ProductId::new(1)).await.unwrap();

        assert!(wishlist.remove(item.id).await.is_err());
        assert!(wishlist.contains(ProductId::new(1)));
    }

    #[tokio::test]
    async fn test_move_to_cart() {
        let (wishlist, _, session) = customer_wishlist(FakeWishlist::default()).await;
        let cart_backend = Arc::new(RecordingCart::default());
        let cart = CartSync::new(cart_backend.clone(), session);

        let item = wishlist.add(ProductId::new(4)).await.unwrap();
        wishlist.move_to_cart(item.id, &cart).await.unwrap();

        assert!(wishlist.snapshot().is_empty());
        assert!(cart.snapshot().contains(ProductId::new(4)));
        assert!(matches!(
            wishlist.move_to_cart(item.id, &cart).await,
            Err(ClientError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_clears_wishlist() {
        let (wishlist, _, session) = customer_wishlist(FakeWishlist::default()).await;
        wishlist.add(ProductId::new(1)).await.unwrap();

        session.logout().await;
        wishlist.sync_with_session(&session.state()).await;
        assert!(wishlist.snapshot().is_empty());
        assert!(matches!(
            wishlist.add(ProductId::new(1)).await,
            Err(ClientError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_reload_does_not_undo_concurrent_remove() {
        let (wishlist, backend, _) = customer_wishlist(FakeWishlist::default()).await;
        let item = wishlist.add(ProductId::new(2)).await.unwrap();
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *backend.hold_fetch.lock().unwrap() = Some((started.clone(), release.clone()));

        let reloading = tokio::spawn({
            let wishlist = wishlist.clone();
            async move { wishlist.load().await }
        });
        started.notified().await;
        let removing = tokio::spawn({
            let wishlist = wishlist.clone();
            async move { wishlist.remove(item.id).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        release.notify_one();

        reloading.await.unwrap().unwrap();
        removing.await.unwrap().unwrap();
        assert!(backend.entries.lock().unwrap().is_empty());
        assert!(!wishlist.contains(ProductId::new(2)));
    }
}
