//! # thinkbank-db
//!
//! PostgreSQL database layer and local file storage for thinkbank.
//!
//! This crate provides:
//! - Connection pool management
//! - The `files` asset repository
//! - Full-text ranking with PostgreSQL tsvector
//! - Nearest-neighbour ranking with pgvector
//! - Directory-backed blob storage
//! - An in-memory store for tests (feature `mock`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use thinkbank_db::{Database, AssetRepository, NewAsset};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/thinkbank").await?;
//!
//!     let id = db.assets.insert(NewAsset::from_file_name("IMG_0001.HEIC")).await?;
//!     db.assets.set_original_path(id, "/uploads/original/2025/01/02/1.heic").await?;
//!
//!     println!("Created asset: {}", id);
//!     Ok(())
//! }
//! ```

pub mod assets;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod pool;
pub mod search;
pub mod storage;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use thinkbank_core::*;

pub use assets::PgAssetRepository;
#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryAssetStore;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use search::PgAssetSearch;
pub use storage::LocalFileStorage;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Asset record repository.
    pub assets: PgAssetRepository,
    /// Lexical and vector ranking over assets.
    pub search: PgAssetSearch,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            assets: PgAssetRepository::new(pool.clone()),
            search: PgAssetSearch::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }
}
