pub mod upload_response;
pub mod upload_route;
pub mod upload_storage;
