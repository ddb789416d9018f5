pub mod api;
pub mod middleware;
pub mod router;
pub mod state;
pub mod utils;
