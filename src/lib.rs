pub mod api_router;
pub mod assets;
pub mod audit;
pub mod auth;
pub mod companies;
pub mod config;
pub mod datacenter;
pub mod idgen;
pub mod notify;
pub mod reports;
pub mod settings;
pub mod shared;
pub mod tickets;
pub mod users;
