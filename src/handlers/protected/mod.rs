// handlers/protected/mod.rs - Protected handlers (token required)
//
// Security Level: authenticated caller
// Middleware: `require_auth` inserts `AuthUser`; each route group picks its
// token source (cookie, bearer, or cookie then bearer).

pub mod auth;
pub mod gallery;

pub use auth::me as auth_me;
pub use gallery::delete as gallery_delete;
pub use gallery::favorite as gallery_favorite;
pub use gallery::favorites as gallery_favorites;
pub use gallery::list as gallery_list;
pub use gallery::upload as gallery_upload;
