pub mod product;
pub mod inventory;
pub mod allocation;

pub use product::{Product, StockLevel};
pub use inventory::{Batch, InventoryError, fefo_order};
pub use allocation::{Allocation, AllocatedLine, AllocationError, FefoAllocator, apportion_discount};
