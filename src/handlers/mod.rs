// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (bearer token verified by the identity provider)

pub mod protected;
pub mod public;
