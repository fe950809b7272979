//! Creator profiles, catalog entries, and follower-count rules.

use crate::error::DropError;
use crate::types::{CreatorId, MarkupPercentage, Money, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A creator profile as supplied by the catalog/profile service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    /// Profile identifier
    pub id: CreatorId,
    /// Account that owns the profile
    pub user_id: UserId,
    /// Unique public handle
    pub handle: String,
    /// Markup applied to every purchase from this creator's drops
    #[serde(default)]
    pub markup_percentage: MarkupPercentage,
    /// Number of follow relations pointing at this profile
    #[serde(default)]
    pub followers_count: u64,
}

impl Creator {
    /// A profile with the default markup and no followers.
    #[must_use]
    pub fn new(id: CreatorId, user_id: UserId, handle: impl Into<String>) -> Self {
        Self {
            id,
            user_id,
            handle: handle.into(),
            markup_percentage: MarkupPercentage::DEFAULT,
            followers_count: 0,
        }
    }

    /// Sets the markup.
    #[must_use]
    pub const fn with_markup(mut self, markup: MarkupPercentage) -> Self {
        self.markup_percentage = markup;
        self
    }

    /// Validates the handle.
    ///
    /// # Errors
    ///
    /// Returns [`DropError::Validation`] if the handle is empty or contains whitespace.
    pub fn validate(&self) -> Result<(), DropError> {
        if self.handle.is_empty() {
            return Err(DropError::validation("handle must not be empty"));
        }
        if self.handle.chars().any(char::is_whitespace) {
            return Err(DropError::validation("handle must not contain whitespace"));
        }
        Ok(())
    }
}

/// A priced product from the external catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Product identifier
    pub product_id: ProductId,
    /// Creator selling the product
    pub creator_id: CreatorId,
    /// Display name
    pub title: String,
    /// Current catalog price per unit
    pub unit_price: Money,
}

/// A follow relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Follow {
    /// User doing the following
    pub follower_id: UserId,
    /// Creator being followed
    pub creator_id: CreatorId,
    /// When the relation was created
    pub created_at: DateTime<Utc>,
}

/// Result of a follow request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FollowOutcome {
    /// A new relation was stored
    Created {
        /// Count after the increment
        followers_count: u64,
    },
    /// The relation already existed; nothing changed
    AlreadyFollowing {
        /// Unchanged count
        followers_count: u64,
    },
}

impl FollowOutcome {
    /// Follower count after the operation.
    #[must_use]
    pub const fn followers_count(&self) -> u64 {
        match self {
            Self::Created { followers_count } | Self::AlreadyFollowing { followers_count } => {
                *followers_count
            }
        }
    }
}

/// Result of an unfollow request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnfollowOutcome {
    /// The relation was deleted
    Removed {
        /// Count after the decrement
        followers_count: u64,
    },
    /// There was no relation; nothing changed
    NotFollowing {
        /// Unchanged count
        followers_count: u64,
    },
}

impl UnfollowOutcome {
    /// Follower count after the operation.
    #[must_use]
    pub const fn followers_count(&self) -> u64 {
        match self {
            Self::Removed { followers_count } | Self::NotFollowing { followers_count } => {
                *followers_count
            }
        }
    }
}

/// Counter rules applied alongside the relation insert or delete.
///
/// Callers hold the creator row exclusively and apply the relation change and the counter
/// change in the same unit of work.
#[derive(Clone, Copy, Debug, Default)]
pub struct FollowerCounter;

impl FollowerCounter {
    /// Rejects following one's own profile.
    ///
    /// # Errors
    ///
    /// Returns [`DropError::SelfFollow`] when `follower` owns `creator`.
    pub fn ensure_not_self(creator: &Creator, follower: UserId) -> Result<(), DropError> {
        if creator.user_id == follower {
            return Err(DropError::SelfFollow);
        }
        Ok(())
    }

    /// Applies a follow; `inserted` says whether the relation was newly stored.
    pub fn follow(creator: &mut Creator, inserted: bool) -> FollowOutcome {
        if !inserted {
            return FollowOutcome::AlreadyFollowing {
                followers_count: creator.followers_count,
            };
        }
        creator.followers_count = creator.followers_count.saturating_add(1);
        FollowOutcome::Created {
            followers_count: creator.followers_count,
        }
    }

    /// Applies an unfollow; `removed` says whether a relation was deleted.
    ///
    /// The count floors at zero; a drifted counter is logged, never surfaced as an error.
    pub fn unfollow(creator: &mut Creator, removed: bool) -> UnfollowOutcome {
        if !removed {
            return UnfollowOutcome::NotFollowing {
                followers_count: creator.followers_count,
            };
        }
        if creator.followers_count == 0 {
            tracing::warn!(
                creator_id = %creator.id,
                "Follower count already zero while removing a relation"
            );
        }
        creator.followers_count = creator.followers_count.saturating_sub(1);
        UnfollowOutcome::Removed {
            followers_count: creator.followers_count,
        }
    }
}
