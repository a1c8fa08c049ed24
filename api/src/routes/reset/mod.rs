pub mod reset_request;
pub mod reset_route;
