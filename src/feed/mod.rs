// SecureDB: Live Feed Module
//
// Bridges a JSON document on disk to WebSocket clients, re-randomizing its
// values on a fixed interval. Independent of the record store.

mod document;
mod error;
mod hub;
mod server;

pub use document::{FeedDocument, FeedSource, VALUE_BOUND};
pub use error::FeedError;
pub use hub::{FeedHub, Subscription};
pub use server::{routes, run, tick_once};
