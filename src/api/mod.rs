pub mod context;
pub mod handlers;
pub mod routes;

pub use routes::create_api_router;
