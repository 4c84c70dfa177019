//! In-memory implementation of every repository trait.
//!
//! Each operation runs under one lock, which gives the same serial semantics
//! the Postgres store gets from transactions and row locks. Writes can be made
//! to fail with [`InMemoryBookingStore::fail_writes`] to exercise error paths.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use temple_booking_core::catalog::{CatalogRepository, Service, SessionRepository, Temple, TempleServiceDetail};
use temple_booking_core::environment::{StoreError, StoreFuture};
use temple_booking_core::form::FormSchema;
use temple_booking_core::order::{
    BookingDetail, BookingSummary, NewOrder, Order, OrderId, OrderRepository, OrderStatus, ServiceId, UserId,
};
use temple_booking_core::review::{
    RatingSummary, Review, ReviewRepository, ReviewSubmission, ReviewWithAuthor, ReviewWriteOutcome,
};
use temple_booking_core::user::{ProfileUpdate, UserProfile, UserRepository};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, UserProfile>,
    sessions: HashMap<String, (UserId, DateTime<Utc>)>,
    temples: BTreeMap<String, Temple>,
    services: Vec<Service>,
    orders: BTreeMap<OrderId, Order>,
    reviews: Vec<Review>,
    next_service_id: i64,
    next_order_id: i64,
    next_review_id: i64,
    fail_writes: bool,
}

impl Inner {
    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Database("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn detail(&self, service: &Service) -> Option<TempleServiceDetail> {
        let temple = self.temples.get(&service.temple_slug)?;
        Some(TempleServiceDetail {
            temple: temple.clone(),
            service: service.clone(),
        })
    }

    fn service(&self, id: ServiceId) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    fn recompute_temple_rating(&mut self, slug: &str) -> Result<RatingSummary, StoreError> {
        let summary = RatingSummary::from_ratings(
            self.reviews
                .iter()
                .filter(|r| r.temple_slug == slug)
                .map(|r| r.rating),
        );

        let temple = self
            .temples
            .get_mut(slug)
            .ok_or_else(|| StoreError::not_found("temple", slug))?;
        temple.rating = summary.average_rating;
        temple.review_count = summary.review_count;

        Ok(summary)
    }
}

/// In-memory booking store for fast, deterministic tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBookingStore {
    inner: Arc<Mutex<Inner>>,
}

fn ready<'a, T: Send + 'a>(result: Result<T, StoreError>) -> StoreFuture<'a, T> {
    Box::pin(std::future::ready(result))
}

impl InMemoryBookingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Register a user profile.
    pub fn add_user(&self, id: &UserId, name: Option<&str>, image: Option<&str>) {
        let now = Utc::now();
        self.lock().users.insert(
            id.clone(),
            UserProfile {
                id: id.clone(),
                name: name.map(str::to_string),
                email: Some(format!("{id}@example.com")),
                image: image.map(str::to_string),
                phone: None,
                address: None,
                birth_date: None,
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// Current user row.
    #[must_use]
    pub fn user(&self, id: &UserId) -> Option<UserProfile> {
        self.lock().users.get(id).cloned()
    }

    /// Register a session token.
    pub fn add_session(&self, token: &str, user: &UserId, expires_at: DateTime<Utc>) {
        self.lock()
            .sessions
            .insert(token.to_string(), (user.clone(), expires_at));
    }

    /// Insert or replace a temple.
    pub fn add_temple(&self, temple: Temple) {
        self.lock().temples.insert(temple.slug.clone(), temple);
    }

    /// Add a service to a temple, returning its id.
    pub fn add_service(&self, temple_slug: &str, service_type: &str, form: FormSchema) -> ServiceId {
        let mut inner = self.lock();
        inner.next_service_id += 1;
        let id = ServiceId::new(inner.next_service_id);
        inner.services.push(Service {
            id,
            temple_slug: temple_slug.to_string(),
            service_type: service_type.to_string(),
            form,
        });
        id
    }

    /// Current temple row.
    #[must_use]
    pub fn temple(&self, slug: &str) -> Option<Temple> {
        self.lock().temples.get(slug).cloned()
    }

    /// Every stored review of a temple.
    #[must_use]
    pub fn reviews_of(&self, temple_slug: &str) -> Vec<Review> {
        self.lock()
            .reviews
            .iter()
            .filter(|r| r.temple_slug == temple_slug)
            .cloned()
            .collect()
    }

    /// Every stored order.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.values().cloned().collect()
    }

    /// Overwrite a temple's stored aggregate, e.g. to simulate drift.
    pub fn set_temple_rating(&self, slug: &str, rating: f64, review_count: i64) {
        if let Some(temple) = self.lock().temples.get_mut(slug) {
            temple.rating = rating;
            temple.review_count = review_count;
        }
    }
}

impl OrderRepository for InMemoryBookingStore {
    fn insert(&self, order: NewOrder, at: DateTime<Utc>) -> StoreFuture<'_, Order> {
        let result = (|| {
            let mut inner = self.lock();
            inner.check_writable()?;
            if inner.service(order.service_id).is_none() {
                return Err(StoreError::not_found("service", order.service_id));
            }
            inner.next_order_id += 1;
            let id = OrderId::new(inner.next_order_id);
            let order = Order::placed(id, order, at);
            inner.orders.insert(id, order.clone());
            Ok(order)
        })();
        ready(result)
    }

    fn load(&self, id: OrderId) -> StoreFuture<'_, Option<Order>> {
        ready(Ok(self.lock().orders.get(&id).cloned()))
    }

    fn record_transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        let result = (|| {
            let mut inner = self.lock();
            inner.check_writable()?;
            let order = inner
                .orders
                .get_mut(&id)
                .ok_or_else(|| StoreError::not_found("order", id))?;
            if order.status != from {
                return Err(StoreError::Conflict(format!(
                    "order {id} is {}, expected {from}",
                    order.status
                )));
            }
            order
                .transition(to, at)
                .map_err(|e| StoreError::Conflict(e.to_string()))?;
            Ok(order.clone())
        })();
        ready(result)
    }

    fn list_for_user<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Vec<BookingSummary>> {
        let inner = self.lock();
        let mut bookings: Vec<BookingSummary> = inner
            .orders
            .values()
            .filter(|o| &o.user_id == user)
            .filter_map(|o| {
                let service = inner.service(o.service_id)?;
                let temple = inner.temples.get(&service.temple_slug)?;
                Some(BookingSummary {
                    id: o.id,
                    status: o.status,
                    date: o.date,
                    created_at: o.created_at,
                    service_type: service.service_type.clone(),
                    temple_slug: temple.slug.clone(),
                    temple_name: temple.name.clone(),
                })
            })
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        ready(Ok(bookings))
    }

    fn find_for_user<'a>(&'a self, user: &'a UserId, id: OrderId) -> StoreFuture<'a, Option<BookingDetail>> {
        let inner = self.lock();
        let detail = inner.orders.get(&id).filter(|o| &o.user_id == user).and_then(|order| {
            let service = inner.service(order.service_id)?;
            let temple = inner.temples.get(&service.temple_slug)?;
            Some(BookingDetail {
                order: order.clone(),
                service_type: service.service_type.clone(),
                service_form: service.form.clone(),
                temple: temple.summary(),
            })
        });
        ready(Ok(detail))
    }
}

impl ReviewRepository for InMemoryBookingStore {
    fn submit_review(&self, submission: ReviewSubmission, at: DateTime<Utc>) -> StoreFuture<'_, ReviewWriteOutcome> {
        let result = (|| {
            let mut inner = self.lock();
            inner.check_writable()?;
            if !inner.temples.contains_key(&submission.temple_slug) {
                return Err(StoreError::not_found("temple", &submission.temple_slug));
            }
            if !inner
                .services
                .iter()
                .any(|s| s.temple_slug == submission.temple_slug && s.service_type == submission.service_type)
            {
                return Err(StoreError::not_found(
                    "service",
                    format!("{}/{}", submission.temple_slug, submission.service_type),
                ));
            }

            let existing = inner.reviews.iter().position(|r| {
                r.user_id == submission.user_id
                    && r.temple_slug == submission.temple_slug
                    && r.service_type == submission.service_type
            });

            let (review, created) = if let Some(index) = existing {
                let review = &mut inner.reviews[index];
                review.revise(submission.rating, submission.comment, at);
                (review.clone(), false)
            } else {
                inner.next_review_id += 1;
                let review = Review {
                    id: inner.next_review_id,
                    user_id: submission.user_id,
                    temple_slug: submission.temple_slug,
                    service_type: submission.service_type,
                    rating: submission.rating,
                    comment: submission.comment,
                    created_at: at,
                    updated_at: at,
                };
                inner.reviews.push(review.clone());
                (review, true)
            };

            let temple_rating = inner.recompute_temple_rating(&review.temple_slug)?;
            Ok(ReviewWriteOutcome {
                review,
                created,
                temple_rating,
            })
        })();
        ready(result)
    }

    fn refresh_temple_rating<'a>(&'a self, temple_slug: &'a str, _at: DateTime<Utc>) -> StoreFuture<'a, RatingSummary> {
        let result = (|| {
            let mut inner = self.lock();
            inner.check_writable()?;
            inner.recompute_temple_rating(temple_slug)
        })();
        ready(result)
    }

    fn list_reviews<'a>(
        &'a self,
        temple_slug: &'a str,
        service_type: &'a str,
    ) -> StoreFuture<'a, Vec<ReviewWithAuthor>> {
        let inner = self.lock();
        let mut reviews: Vec<ReviewWithAuthor> = inner
            .reviews
            .iter()
            .filter(|r| r.temple_slug == temple_slug && r.service_type == service_type)
            .map(|r| {
                let profile = inner.users.get(&r.user_id);
                ReviewWithAuthor {
                    review: r.clone(),
                    author_name: profile.and_then(|p| p.name.clone()),
                    author_image: profile.and_then(|p| p.image.clone()),
                }
            })
            .collect();
        reviews.sort_by(|a, b| {
            b.review
                .created_at
                .cmp(&a.review.created_at)
                .then(b.review.id.cmp(&a.review.id))
        });
        ready(Ok(reviews))
    }

    fn user_review<'a>(
        &'a self,
        user: &'a UserId,
        temple_slug: &'a str,
        service_type: &'a str,
    ) -> StoreFuture<'a, Option<Review>> {
        let review = self
            .lock()
            .reviews
            .iter()
            .find(|r| &r.user_id == user && r.temple_slug == temple_slug && r.service_type == service_type)
            .cloned();
        ready(Ok(review))
    }

    fn service_rating<'a>(&'a self, temple_slug: &'a str, service_type: &'a str) -> StoreFuture<'a, RatingSummary> {
        let summary = RatingSummary::from_ratings(
            self.lock()
                .reviews
                .iter()
                .filter(|r| r.temple_slug == temple_slug && r.service_type == service_type)
                .map(|r| r.rating),
        );
        ready(Ok(summary))
    }

    fn temple_rating<'a>(&'a self, temple_slug: &'a str) -> StoreFuture<'a, RatingSummary> {
        let result = self
            .lock()
            .temples
            .get(temple_slug)
            .map(|t| RatingSummary {
                average_rating: t.rating,
                review_count: t.review_count,
            })
            .ok_or_else(|| StoreError::not_found("temple", temple_slug));
        ready(result)
    }
}

impl CatalogRepository for InMemoryBookingStore {
    fn services_by_type<'a>(&'a self, service_type: &'a str) -> StoreFuture<'a, Vec<TempleServiceDetail>> {
        let inner = self.lock();
        let details = inner
            .services
            .iter()
            .filter(|s| s.service_type == service_type)
            .filter_map(|s| inner.detail(s))
            .collect();
        ready(Ok(details))
    }

    fn temple_service<'a>(
        &'a self,
        temple_slug: &'a str,
        service_type: &'a str,
    ) -> StoreFuture<'a, Option<TempleServiceDetail>> {
        let inner = self.lock();
        let detail = inner
            .services
            .iter()
            .find(|s| s.temple_slug == temple_slug && s.service_type == service_type)
            .and_then(|s| inner.detail(s));
        ready(Ok(detail))
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        ready(Ok(()))
    }
}

impl SessionRepository for InMemoryBookingStore {
    fn resolve_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<UserId>> {
        let now = Utc::now();
        let user = self
            .lock()
            .sessions
            .get(token)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(user, _)| user.clone());
        ready(Ok(user))
    }
}

impl UserRepository for InMemoryBookingStore {
    fn profile<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<UserProfile>> {
        ready(Ok(self.lock().users.get(user).cloned()))
    }

    fn update_profile<'a>(
        &'a self,
        user: &'a UserId,
        update: &'a ProfileUpdate,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, UserProfile> {
        let result = (|| {
            let mut inner = self.lock();
            inner.check_writable()?;
            let profile = inner
                .users
                .get_mut(user)
                .ok_or_else(|| StoreError::not_found("user", user))?;
            profile.name = Some(update.name.clone());
            profile.phone.clone_from(&update.phone);
            profile.address.clone_from(&update.address);
            profile.birth_date = update.birth_date;
            profile.updated_at = at;
            Ok(profile.clone())
        })();
        ready(result)
    }
}
