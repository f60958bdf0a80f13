pub mod config;
pub mod evidence;
pub mod incident;
pub mod user;
