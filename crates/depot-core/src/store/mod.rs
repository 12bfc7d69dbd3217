pub mod entity_store;
pub mod index;

pub use entity_store::EntityStore;
pub use index::{IndexKey, IndexManager};
