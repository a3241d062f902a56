//! HTTP routes for Bailiff

pub mod admin_users;
pub mod auth_routes;
pub mod health;
pub mod resources;
pub mod response;
pub mod subscription;

pub use admin_users::{handle_get_user, handle_list_users, handle_update_user_status};
pub use auth_routes::{
    handle_change_password, handle_login, handle_profile, handle_refresh_token, handle_register,
    handle_update_profile,
};
pub use health::{health_check, version_info};
pub use resources::handle_resource_request;
pub use response::{
    cors_preflight, error_response, failure_response, full_body, json_response,
    not_found_response, parse_json, rejection_response, BoxBody, MAX_BODY_BYTES,
};
pub use subscription::{handle_current_subscription, handle_get_plan, handle_list_plans};

#[cfg(test)]
pub(crate) use response::testing;
