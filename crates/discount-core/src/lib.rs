//! Core types and traits for the discount code service.
//!
//! This crate holds the pieces shared by the generator, the storage back
//! ends and the lifecycle service: the [`Code`] newtype with its
//! normalization rules, the stored [`DiscountCode`] entity, pagination
//! types and the storage port traits.

pub mod code;
pub mod error;
pub mod page;
pub mod repository;

pub use code::{Code, CodeLength, ALPHABET};
pub use error::{CoreError, StorageError};
pub use page::{Page, PageQuery};
pub use repository::{DiscountCode, ReadRepository, Repository};
