pub mod health;
pub mod import;
pub mod migrate;
pub mod price;
pub mod sync;
