// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Account creation and token acquisition, plus the liveness endpoints.
//
// Security Level: None
// Route Prefix: /api/user/*, /, /health, /test
// Middleware: rate limiting only

pub mod system;
pub mod user;

pub use system::{health_get, root_get, test_get};
pub use user::{login_post, signup_post};
