pub mod config;
pub mod mock_upstream;
pub mod server;
