pub mod db;
pub mod sessions;
pub mod store;
