pub mod db;
pub mod error;
pub mod graph;
pub mod slot;

pub use db::StoreHandle;
pub use error::{StoreError, StoreResult};
pub use graph::{Direction, Entity, EntityFilter, GraphStore, Relationship, TraverseResult};
pub use slot::{ListFilter, SetSlot, Slot, SlotSource, SlotStore, infer_category};
