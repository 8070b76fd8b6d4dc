pub mod cache;
pub mod config;
pub mod dates;
pub mod error;
pub mod models;
pub mod rtapi;
pub mod server;
pub mod store;

pub use cache::ReviewCache;
pub use config::Config;
pub use error::{Error, Result};
pub use models::*;
pub use rtapi::RtClient;
pub use server::AppState;
pub use store::Store;
