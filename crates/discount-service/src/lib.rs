//! Discount code lifecycle service.
//!
//! [`DiscountCodeService`] owns every state transition of a discount code:
//! bulk generation with collision handling, single creation, lookup,
//! listing, administrative updates, deletion and the exactly-once
//! redemption. All state lives behind the storage port from
//! `discount_core`; the service keeps no shared mutable state of its own.

pub mod error;
pub mod service;

pub use error::ServiceError;
pub use service::{DiscountCodeService, RedeemOutcome, ServiceSettings};
pub use tokio_util::sync::CancellationToken;
