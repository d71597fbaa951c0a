pub mod registration;
pub mod session;
pub mod social;

pub use registration::register;
pub use session::{current_user, login, logout, validate_session};
pub use social::{google_callback, google_login};
