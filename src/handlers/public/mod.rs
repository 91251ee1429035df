// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Input is untrusted and validated field by field.

pub mod blog;
pub mod users;

pub use blog::list as blog_list;
pub use blog::show as blog_show;
pub use users::request_reactivation as users_request_reactivation;
