use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Errors returned by listing lookups.
#[derive(thiserror::Error, Debug)]
pub enum ListingError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Listing not found
    #[error("Listing not found")]
    NotFound,
}

/// A listing as the booking engine sees it: an id, its owner, and a display title.
#[derive(Debug, Clone)]
pub struct ListingSummary {
    /// Unique identifier of the listing
    pub id: Uuid,
    /// Owner of the listing, the party who decides rental requests
    pub owner_id: Uuid,
    /// Display title
    pub title: String,
}

/// Resolves listings to their owners.
///
/// Implemented against the marketplace database in production and mocked in tests.
#[async_trait::async_trait]
pub trait ListingDirectory: Send + Sync {
    /// Returns the owner of the given listing.
    async fn owner_of(&self, listing_id: &Uuid) -> Result<Uuid, ListingError>;

    /// Returns the listing's display summary.
    async fn get_listing(&self, listing_id: &Uuid) -> Result<ListingSummary, ListingError>;
}

/// Postgres-backed listing directory reading the marketplace's `listings` table.
pub struct PgListingDirectory {
    pool: PgPool,
}

impl PgListingDirectory {
    /// Creates a new directory over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ListingDirectory for PgListingDirectory {
    async fn owner_of(&self, listing_id: &Uuid) -> Result<Uuid, ListingError> {
        let row = sqlx::query("SELECT owner_id FROM listings WHERE id = $1")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.get("owner_id")),
            None => Err(ListingError::NotFound),
        }
    }

    async fn get_listing(&self, listing_id: &Uuid) -> Result<ListingSummary, ListingError> {
        let row = sqlx::query("SELECT id, owner_id, title FROM listings WHERE id = $1")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(ListingSummary {
                id: row.get("id"),
                owner_id: row.get("owner_id"),
                title: row.get("title"),
            }),
            None => Err(ListingError::NotFound),
        }
    }
}
