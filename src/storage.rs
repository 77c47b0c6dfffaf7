// Heap files, the slotted pages inside them, and the ids used to address both
pub mod entity;
pub mod error;
pub mod heap;
pub mod page;

pub use error::Error;
