pub mod cache;
pub mod clock;
pub mod draft_store;
pub mod identity;
pub mod transport;

pub use cache::ListingCache;
pub use clock::{Clock, SystemClock};
pub use draft_store::DraftStore;
pub use identity::{CredentialStore, IdentityProvider};
pub use transport::{Method, Transport, TransportRequest, TransportResponse};
