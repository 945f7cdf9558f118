pub mod handlers;
pub mod imports;
pub mod maintenance;
pub mod routes;

pub use routes::create_router;
