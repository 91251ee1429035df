pub mod account;
pub mod listing;
pub mod ownership;
pub mod pagination;

pub use account::{AccountError, AccountLifecycle, AdminNotifier, LogNotifier, ReactivationOutcome};
pub use listing::{ListingScope, ListingService};
pub use ownership::{GalleryMutation, MutationError, MutationOutcome, MutationService};
pub use pagination::{Page, PageQuery, PageRequest};
