pub mod lease;
pub mod value_store;

pub use lease::{Cache, GetResult, GetStatus};
pub use value_store::ValueStore;
