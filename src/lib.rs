//! Food-sharing backend: post surplus food, browse what others share nearby,
//! request items and see how your emissions compare.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod generation;
pub mod images;
pub mod items;
pub mod map;
pub mod notice;
pub mod notifications;
pub mod profiles;
pub mod requests;
pub mod rpc;
pub mod score;
pub mod state;
pub mod storage;
pub mod store;
