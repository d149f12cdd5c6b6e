pub mod draft;
pub mod post;
pub mod reply;
pub mod user;

pub use draft::Draft;
pub use post::Post;
pub use reply::Reply;
pub use user::CurrentUser;
