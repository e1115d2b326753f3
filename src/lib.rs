pub mod config;
pub mod init;
pub mod querylog;
pub mod resolver;
pub mod server;
