pub mod account;
pub mod feedback;
pub mod page;
