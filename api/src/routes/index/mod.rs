pub mod health_response;
pub mod index_route;
