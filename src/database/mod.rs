pub mod connect;
pub mod idgen;
pub mod models;
pub mod mutations;
pub mod queries;
