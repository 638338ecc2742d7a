// Middleware modules for Tessera Backend
// TES-61: JWT token validation

pub mod auth;
pub mod cors;

// Re-export auth types
pub use auth::{auth_middleware, AuthenticatedUser, PLATFORM_ADMIN_SCOPE};
pub use cors::dynamic_cors_middleware;
