pub mod config;
pub mod daemon;
pub mod dbus_api;
pub mod ids;
pub mod sync;
