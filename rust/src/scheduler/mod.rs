//! Capacity-constrained scheduler for packaging orders.
//!
//! Resolves each order's start date, then greedily assigns quantities day by
//! day against a per-run ledger of (factory, package type) daily capacity.

mod allocator;
mod core;
mod horizon;
mod ledger;

pub use allocator::{processing_order, Allocation, CapacityAllocator};
pub use self::core::{resolve_start_dates, schedule_orders, PackagingScheduler, ScheduleError};
pub use horizon::DateHorizon;
pub use ledger::CapacityLedger;
