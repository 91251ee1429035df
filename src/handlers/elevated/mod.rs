// handlers/elevated/mod.rs - Elevated handlers (ADMIN role required)
//
// Security Level: bearer token whose role claim is ADMIN
// Middleware: `require_auth` with `require_role(Role::Admin)`; other roles get 403.

pub mod admin;

pub use admin::approve_user as admin_approve_user;
pub use admin::deactivate_user as admin_deactivate_user;
pub use admin::pending_users as admin_pending_users;
pub use admin::reactivate_user as admin_reactivate_user;
pub use admin::users as admin_users;
