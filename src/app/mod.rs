pub mod auth;
pub mod feedback;
pub mod tokens;
