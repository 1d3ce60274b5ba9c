pub mod config;
pub mod error;
pub mod item;
pub mod mapping;

pub use config::{load_dotenv, FailedCategoryPolicy, PrefetchConfig};
pub use error::*;
pub use item::*;
pub use mapping::{CategoryConfig, CategoryMapping};
