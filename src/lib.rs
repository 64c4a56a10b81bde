pub mod app;
pub mod auction;
pub mod bidding;
pub mod broadcast;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod locks;
pub mod message_broker;
pub mod query;
pub mod registry;
pub mod scheduler;
