pub mod conn;
pub mod protocol;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod state;
