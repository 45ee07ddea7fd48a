pub mod db;
pub mod error;
pub mod generate;
pub mod image;
pub mod import;
pub mod models;
pub mod store;

pub use error::{Result, StoreError};
