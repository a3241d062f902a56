//! Database layer
//!
//! MongoDB storage for accounts, plans, subscriptions and the four resource
//! collections. [`MongoStore`] adapts it to the traits in [`crate::store`].

pub mod mongo;
pub mod schemas;
pub mod store;

pub use mongo::{MongoClient, MongoCollection};
pub use schemas::{Metadata, PlanDoc, ResourceDoc, SubscriptionDoc, UserDoc};
pub use store::{MongoResourceStore, MongoStore};
