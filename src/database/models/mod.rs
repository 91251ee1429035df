pub mod blog_post;
pub mod gallery_item;
pub mod user;

pub use blog_post::{AuthorRef, BlogPost, BlogPostSummary, NewBlogPost};
pub use gallery_item::{GalleryItem, MediaType, NewGalleryItem};
pub use user::{AccountState, NewUser, User, UserFilter, UserProfile, UserStatusFilter};
