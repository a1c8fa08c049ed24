pub mod index;
pub mod query;
pub mod reset;
pub mod status;
pub mod upload;
