pub mod location;
pub mod session;

pub use location::{LocationSample, Place};
pub use session::{Credentials, LoginResponse, Registration, Session, UserProfile};
