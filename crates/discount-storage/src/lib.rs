//! Storage back ends for discount codes.
//!
//! Both implementations rely on a uniqueness constraint on the code and
//! perform redemption as a single conditional update, never as a read
//! followed by a write.

pub mod memory;
pub mod postgres;

pub use discount_core::repository::{ReadRepository, Repository, Result};
pub use discount_core::StorageError;
pub use memory::InMemoryRepository;
pub use postgres::PgRepository;
