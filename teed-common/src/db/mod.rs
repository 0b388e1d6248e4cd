//! Database access shared by Teed services

pub mod init;

pub use init::{connect_in_memory, create_schema, init_database};
