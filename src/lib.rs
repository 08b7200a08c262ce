pub mod archive;
pub mod config;
pub mod error;
pub mod load;
pub mod store;
pub mod table;

pub use error::LoadError;
pub use load::{run, RunSummary};
pub use store::TableStore;
