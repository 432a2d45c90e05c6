//! Local file storage for app credentials and the Kite session

mod credentials;
mod session;

pub use credentials::AppCredentials;
pub use session::{SessionRecord, SessionStore};
