pub mod admin;
pub mod cards;
pub mod handlers;
pub mod routes;

pub use routes::create_router;
