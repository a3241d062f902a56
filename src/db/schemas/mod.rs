//! MongoDB document structures

mod metadata;
mod plan;
mod resource;
mod subscription;
mod user;

pub use metadata::Metadata;
pub use plan::{PlanDoc, PLAN_COLLECTION};
pub use resource::ResourceDoc;
pub use subscription::{SubscriptionDoc, SUBSCRIPTION_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
