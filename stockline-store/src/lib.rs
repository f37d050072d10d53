pub mod app_config;
pub mod database;
pub mod batch_repo;
pub mod order_repo;

pub use app_config::{Config, StorageBackend};
pub use batch_repo::PgBatchLedger;
pub use database::DbClient;
pub use order_repo::PgFulfillmentStore;

use stockline_core::CoreError;
use tracing::error;

/// Log the driver error and hand back an opaque storage failure.
pub(crate) fn storage_error(err: sqlx::Error) -> CoreError {
    error!("Database error: {}", err);
    CoreError::StorageError("database operation failed".to_string())
}
