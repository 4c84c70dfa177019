//! Review writes and rating reads.

use super::ServiceError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use temple_booking_core::environment::{Clock, StoreError};
use temple_booking_core::messages;
use temple_booking_core::order::UserId;
use temple_booking_core::review::{
    RatingSummary, Review, ReviewInput, ReviewRepository, ReviewSubmission, ReviewWithAuthor, ReviewWriteOutcome,
};
use tracing::{error, info};

const TEMPLE_NOT_FOUND: &str = "Temple not found";
const SERVICE_NOT_FOUND: &str = "Service not found";

/// Ratings shown next to a temple service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServiceRatings {
    /// Live average over this service's reviews.
    pub service: RatingSummary,
    /// The temple's stored aggregate over all of its reviews.
    pub temple: RatingSummary,
}

/// Review workflows.
pub struct ReviewService {
    reviews: Arc<dyn ReviewRepository>,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    /// Creates a new `ReviewService`
    #[must_use]
    pub fn new(reviews: Arc<dyn ReviewRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { reviews, clock }
    }

    /// Create or revise the caller's review and refresh the temple's aggregate.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::LoginRequired`] without a session
    /// - [`ServiceError::Invalid`] for a bad rating or comment
    /// - [`ServiceError::NotFound`] for an unknown temple, or a service the temple does not offer
    /// - [`ServiceError::SaveFailed`] when the transaction fails
    pub async fn submit(
        &self,
        user: Option<&UserId>,
        temple_slug: &str,
        service_type: &str,
        input: ReviewInput,
    ) -> Result<ReviewWriteOutcome, ServiceError> {
        let Some(user) = user else {
            return Err(ServiceError::LoginRequired(messages::LOGIN_REQUIRED_REVIEW));
        };

        let submission = ReviewSubmission::validate(user.clone(), temple_slug, service_type, input).map_err(|e| {
            metrics::counter!("bookings_reviews_written_total", "outcome" => "invalid").increment(1);
            let mut errors = BTreeMap::new();
            errors.insert(e.field().to_string(), e.localized().to_string());
            ServiceError::Invalid {
                message: e.localized().to_string(),
                errors,
            }
        })?;

        match self.reviews.submit_review(submission, self.clock.now()).await {
            Ok(outcome) => {
                let label = if outcome.created { "created" } else { "updated" };
                info!(
                    review_id = outcome.review.id,
                    user_id = %user,
                    temple = temple_slug,
                    service_type,
                    rating = outcome.review.rating.get(),
                    temple_rating = outcome.temple_rating.average_rating,
                    review_count = outcome.temple_rating.review_count,
                    "Review {label}"
                );
                metrics::counter!("bookings_reviews_written_total", "outcome" => label).increment(1);
                Ok(outcome)
            }
            Err(StoreError::NotFound { entity: "service", .. }) => Err(ServiceError::NotFound(SERVICE_NOT_FOUND)),
            Err(StoreError::NotFound { .. }) => Err(ServiceError::NotFound(TEMPLE_NOT_FOUND)),
            Err(e) => {
                error!(
                    user_id = %user,
                    temple = temple_slug,
                    service_type,
                    error = %e,
                    "Failed to save review"
                );
                metrics::counter!("bookings_reviews_written_total", "outcome" => "failed").increment(1);
                Err(ServiceError::SaveFailed {
                    message: messages::REVIEW_SAVE_FAILED,
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Reviews of a temple service, newest first, with author details.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] when the read fails.
    pub async fn list(&self, temple_slug: &str, service_type: &str) -> Result<Vec<ReviewWithAuthor>, ServiceError> {
        Ok(self.reviews.list_reviews(temple_slug, service_type).await?)
    }

    /// The caller's own review, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] when the read fails.
    pub async fn mine(&self, user: &UserId, temple_slug: &str, service_type: &str) -> Result<Option<Review>, ServiceError> {
        Ok(self.reviews.user_review(user, temple_slug, service_type).await?)
    }

    /// Live service rating plus the temple's stored aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown temple.
    pub async fn ratings(&self, temple_slug: &str, service_type: &str) -> Result<ServiceRatings, ServiceError> {
        let service = self.reviews.service_rating(temple_slug, service_type).await?;
        let temple = match self.reviews.temple_rating(temple_slug).await {
            Ok(temple) => temple,
            Err(StoreError::NotFound { .. }) => return Err(ServiceError::NotFound(TEMPLE_NOT_FOUND)),
            Err(e) => return Err(e.into()),
        };
        Ok(ServiceRatings { service, temple })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::float_cmp)]
mod tests {
    use super::*;
    use temple_booking_testing::{InMemoryBookingStore, fixtures, test_clock};

    fn service(store: &InMemoryBookingStore) -> ReviewService {
        ReviewService::new(Arc::new(store.clone()), Arc::new(test_clock()))
    }

    fn input(rating: i64, comment: Option<&str>) -> ReviewInput {
        ReviewInput {
            rating,
            comment: comment.map(ToString::to_string),
        }
    }

    #[tokio::test]
    async fn second_submission_revises_the_same_review() {
        let store = InMemoryBookingStore::new();
        fixtures::seed_wat_arun(&store);
        let user = fixtures::sign_in(&store, "u1", "token-1");
        let reviews = service(&store);

        let first = reviews
            .submit(Some(&user), fixtures::WAT_ARUN, "car", input(5, Some("ดีมาก")))
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(first.temple_rating.average_rating, 5.0);

        let second = reviews
            .submit(Some(&user), fixtures::WAT_ARUN, "car", input(3, None))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.review.id, first.review.id);
        assert_eq!(second.review.comment, None);
        assert_eq!(second.temple_rating.average_rating, 3.0);
        assert_eq!(second.temple_rating.review_count, 1);
        assert_eq!(store.reviews_of(fixtures::WAT_ARUN).len(), 1);
    }

    #[tokio::test]
    async fn temple_aggregate_spans_services() {
        let store = InMemoryBookingStore::new();
        fixtures::seed_wat_arun(&store);
        let u1 = fixtures::sign_in(&store, "u1", "token-1");
        let u2 = fixtures::sign_in(&store, "u2", "token-2");
        let reviews = service(&store);

        reviews.submit(Some(&u1), fixtures::WAT_ARUN, "car", input(4, None)).await.unwrap();
        reviews.submit(Some(&u2), fixtures::WAT_ARUN, "home", input(1, None)).await.unwrap();

        let ratings = reviews.ratings(fixtures::WAT_ARUN, "car").await.unwrap();
        assert_eq!(ratings.service.average_rating, 4.0);
        assert_eq!(ratings.service.review_count, 1);
        assert_eq!(ratings.temple.average_rating, 2.5);
        assert_eq!(ratings.temple.review_count, 2);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_invalid() {
        let store = InMemoryBookingStore::new();
        fixtures::seed_wat_arun(&store);
        let user = fixtures::sign_in(&store, "u1", "token-1");

        let err = service(&store)
            .submit(Some(&user), fixtures::WAT_ARUN, "car", input(6, None))
            .await
            .unwrap_err();

        let ServiceError::Invalid { message, errors } = err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert_eq!(message, messages::RATING_OUT_OF_RANGE);
        assert_eq!(errors["rating"], messages::RATING_OUT_OF_RANGE);
        assert!(store.reviews_of(fixtures::WAT_ARUN).is_empty());
    }

    #[tokio::test]
    async fn missing_session_is_refused() {
        let store = InMemoryBookingStore::new();
        fixtures::seed_wat_arun(&store);

        let err = service(&store)
            .submit(None, fixtures::WAT_ARUN, "car", input(5, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::LoginRequired(messages::LOGIN_REQUIRED_REVIEW)));
    }

    #[tokio::test]
    async fn unknown_temple_is_not_found() {
        let store = InMemoryBookingStore::new();
        let user = fixtures::sign_in(&store, "u1", "token-1");

        let err = service(&store)
            .submit(Some(&user), "wat-nowhere", "car", input(5, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound("Temple not found")));
    }

    #[tokio::test]
    async fn service_not_offered_is_not_found() {
        let store = InMemoryBookingStore::new();
        fixtures::seed_wat_arun(&store);
        let user = fixtures::sign_in(&store, "u1", "token-1");

        let err = service(&store)
            .submit(Some(&user), fixtures::WAT_ARUN, "boat", input(1, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound("Service not found")));
        assert_eq!(store.temple(fixtures::WAT_ARUN).unwrap().review_count, 0);
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_aggregate() {
        let store = InMemoryBookingStore::new();
        fixtures::seed_wat_arun(&store);
        let user = fixtures::sign_in(&store, "u1", "token-1");
        let reviews = service(&store);
        reviews.submit(Some(&user), fixtures::WAT_ARUN, "car", input(4, None)).await.unwrap();
        store.fail_writes(true);

        let err = reviews
            .submit(Some(&user), fixtures::WAT_ARUN, "car", input(1, None))
            .await
            .unwrap_err();

        let ServiceError::SaveFailed { message, .. } = err else {
            panic!("expected save failure, got {err:?}");
        };
        assert_eq!(message, messages::REVIEW_SAVE_FAILED);
        let temple = store.temple(fixtures::WAT_ARUN).unwrap();
        assert_eq!(temple.rating, 4.0);
        assert_eq!(temple.review_count, 1);
    }

    #[tokio::test]
    async fn mine_returns_only_callers_review() {
        let store = InMemoryBookingStore::new();
        fixtures::seed_wat_arun(&store);
        let u1 = fixtures::sign_in(&store, "u1", "token-1");
        let u2 = fixtures::sign_in(&store, "u2", "token-2");
        let reviews = service(&store);
        reviews.submit(Some(&u1), fixtures::WAT_ARUN, "car", input(5, None)).await.unwrap();

        assert!(reviews.mine(&u1, fixtures::WAT_ARUN, "car").await.unwrap().is_some());
        assert!(reviews.mine(&u2, fixtures::WAT_ARUN, "car").await.unwrap().is_none());
        assert_eq!(reviews.list(fixtures::WAT_ARUN, "car").await.unwrap().len(), 1);
    }
}
