use std::sync::{Arc, OnceLock};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Plaintext password. Debug output is redacted.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// PHC-format digest (`$argon2id$v=19$m=...`).
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

const DUMMY_PASSWORD: &str = "portal-auth-timing-equalizer";

/// Salted Argon2id hashing of local passwords.
///
/// Cost parameters are embedded in every digest, so raising them only
/// affects new hashes; older digests keep verifying with their own cost.
#[derive(Clone)]
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
    // Digest of a fixed password at this verifier's cost, built on first use.
    dummy_hash: Arc<OnceLock<Option<PasswordHashString>>>,
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::from_argon2(Argon2::default())
    }
}

impl CredentialVerifier {
    pub fn with_params(params: Params) -> Self {
        Self::from_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn from_argon2(argon2: Argon2<'static>) -> Self {
        Self {
            argon2,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(PasswordHashString::new(password_hash))
    }

    /// False for a mismatch and for a digest that does not parse.
    pub fn verify(&self, password_hash: &PasswordHashString, password: &Password) -> bool {
        let parsed_hash = match PasswordHash::new(password_hash.as_str()) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_str().as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Verifies `password` against a fixed dummy digest so that a login
    /// that never reaches a real digest costs about as much as a wrong
    /// password. Blocking; call it off the async worker threads.
    pub fn equalize_timing(&self, password: &Password) {
        if let Some(dummy) = self.dummy_hash() {
            let _ = self.verify(dummy, password);
        }
    }

    fn dummy_hash(&self) -> Option<&PasswordHashString> {
        self.dummy_hash
            .get_or_init(|| match self.hash(&Password::new(DUMMY_PASSWORD.to_string())) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build timing digest");
                    None
                }
            })
            .as_ref()
    }
}
