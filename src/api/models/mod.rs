pub mod try_on;
