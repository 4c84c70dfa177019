//! Reviews and rating aggregates.
//!
//! A user holds at most one review per `(temple, service type)`; submitting
//! again revises it in place. Each temple stores a denormalized average and
//! count over **all** of its reviews, recomputed from scratch on every write.
//! The per-service rating is never stored and is computed on read.

use crate::environment::StoreFuture;
use crate::messages;
use crate::order::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted comment, in characters.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Review input errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    /// Rating outside 1..=5.
    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(i64),

    /// Comment exceeds [`MAX_COMMENT_CHARS`].
    #[error("Comment is {chars} characters, limit is {MAX_COMMENT_CHARS}")]
    CommentTooLong {
        /// Actual length.
        chars: usize,
    },
}

impl ReviewError {
    /// Input the error refers to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::RatingOutOfRange(_) => "rating",
            Self::CommentTooLong { .. } => "comment",
        }
    }

    /// User-facing message.
    #[must_use]
    pub const fn localized(&self) -> &'static str {
        match self {
            Self::RatingOutOfRange(_) => messages::RATING_OUT_OF_RANGE,
            Self::CommentTooLong { .. } => messages::COMMENT_TOO_LONG,
        }
    }
}

/// A star rating, 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    /// Validate a raw rating.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::RatingOutOfRange`] outside 1..=5.
    pub fn new(value: i64) -> Result<Self, ReviewError> {
        match u8::try_from(value) {
            Ok(v @ 1..=5) => Ok(Self(v)),
            _ => Err(ReviewError::RatingOutOfRange(value)),
        }
    }

    /// Numeric value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = ReviewError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        Self::from(rating.0)
    }
}

/// Raw review form input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewInput {
    /// Star rating as entered; a missing rating reads as 0 and fails the range check.
    #[serde(default)]
    pub rating: i64,
    /// Optional comment as entered.
    #[serde(default)]
    pub comment: Option<String>,
}

/// A validated review submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSubmission {
    /// Reviewer.
    pub user_id: UserId,
    /// Reviewed temple.
    pub temple_slug: String,
    /// Reviewed service type.
    pub service_type: String,
    /// Rating.
    pub rating: Rating,
    /// Trimmed comment; `None` when blank.
    pub comment: Option<String>,
}

impl ReviewSubmission {
    /// Validate raw input for one `(user, temple, service type)` triple.
    ///
    /// # Errors
    ///
    /// Returns a [`ReviewError`] for an out-of-range rating or an over-long comment.
    pub fn validate(
        user_id: UserId,
        temple_slug: impl Into<String>,
        service_type: impl Into<String>,
        input: ReviewInput,
    ) -> Result<Self, ReviewError> {
        let rating = Rating::new(input.rating)?;

        let comment = input
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if let Some(comment) = &comment {
            let chars = comment.chars().count();
            if chars > MAX_COMMENT_CHARS {
                return Err(ReviewError::CommentTooLong { chars });
            }
        }

        Ok(Self {
            user_id,
            temple_slug: temple_slug.into(),
            service_type: service_type.into(),
            rating,
            comment,
        })
    }
}

/// A stored review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Row id.
    pub id: i64,
    /// Reviewer.
    pub user_id: UserId,
    /// Reviewed temple.
    pub temple_slug: String,
    /// Reviewed service type.
    pub service_type: String,
    /// Rating.
    pub rating: Rating,
    /// Comment, if any.
    pub comment: Option<String>,
    /// First submission.
    pub created_at: DateTime<Utc>,
    /// Latest submission.
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Apply a resubmission; `created_at` is kept.
    pub fn revise(&mut self, rating: Rating, comment: Option<String>, at: DateTime<Utc>) {
        self.rating = rating;
        self.comment = comment;
        self.updated_at = at;
    }
}

/// A review with its author's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewWithAuthor {
    /// The review.
    #[serde(flatten)]
    pub review: Review,
    /// Author display name.
    pub author_name: Option<String>,
    /// Author avatar URL.
    pub author_image: Option<String>,
}

/// Average and count of a set of ratings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Mean rating; `0` with no reviews.
    pub average_rating: f64,
    /// Number of reviews.
    pub review_count: i64,
}

impl RatingSummary {
    /// Summary of an empty set.
    pub const EMPTY: Self = Self {
        average_rating: 0.0,
        review_count: 0,
    };

    /// Summarize ratings.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_ratings(ratings: impl IntoIterator<Item = Rating>) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), r| (sum + i64::from(r), count + 1));

        if count == 0 {
            return Self::EMPTY;
        }
        Self {
            average_rating: sum as f64 / count as f64,
            review_count: count,
        }
    }
}

impl Default for RatingSummary {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Result of a review write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewWriteOutcome {
    /// The review as stored.
    pub review: Review,
    /// `true` on first submission, `false` on revision.
    pub created: bool,
    /// The temple's aggregate after the write.
    pub temple_rating: RatingSummary,
}

/// Review persistence.
pub trait ReviewRepository: Send + Sync {
    /// Upsert the review and recompute the temple aggregate atomically.
    ///
    /// Fails with `NotFound` when the temple does not exist; on any failure
    /// neither the review nor the aggregate changes.
    fn submit_review(&self, submission: ReviewSubmission, at: DateTime<Utc>) -> StoreFuture<'_, ReviewWriteOutcome>;

    /// Recompute a temple's stored aggregate from its reviews.
    fn refresh_temple_rating<'a>(&'a self, temple_slug: &'a str, at: DateTime<Utc>) -> StoreFuture<'a, RatingSummary>;

    /// Reviews of one service at one temple, newest first.
    fn list_reviews<'a>(&'a self, temple_slug: &'a str, service_type: &'a str)
    -> StoreFuture<'a, Vec<ReviewWithAuthor>>;

    /// The user's own review of one service, if any.
    fn user_review<'a>(
        &'a self,
        user: &'a UserId,
        temple_slug: &'a str,
        service_type: &'a str,
    ) -> StoreFuture<'a, Option<Review>>;

    /// Live average and count for one service at one temple.
    fn service_rating<'a>(&'a self, temple_slug: &'a str, service_type: &'a str) -> StoreFuture<'a, RatingSummary>;

    /// The temple's stored aggregate.
    fn temple_rating<'a>(&'a self, temple_slug: &'a str) -> StoreFuture<'a, RatingSummary>;
}
