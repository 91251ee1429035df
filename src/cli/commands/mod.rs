pub mod migrate;
pub mod seed;
pub mod token;
pub mod users;
