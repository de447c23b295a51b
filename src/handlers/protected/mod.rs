// handlers/protected/mod.rs - Protected handlers (bearer authentication required)
//
// Every route here runs behind `jwt_auth_middleware`, which verifies the
// token with the configured identity provider and injects `AuthUser`.
//
// Security Level: Bearer token required
// Route Prefix: /api/portfolio/*, /api/transactions/*
// Middleware: rate limiting + bearer verification

pub mod portfolio;
pub mod transactions;
