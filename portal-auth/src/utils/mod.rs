pub mod password;
pub mod token;
pub mod validation;

pub use password::{CredentialVerifier, Password, PasswordHashString};
pub use token::generate_random_token;
pub use validation::ValidatedJson;
