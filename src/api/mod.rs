pub mod models;
pub mod try_on;
