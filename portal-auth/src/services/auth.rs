use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    dtos::auth::{LoginRequest, RegisterRequest},
    models::{AuthProvider, Session, User},
    services::{
        error::StoreError,
        federation::{AccessToken, FederatedIdentity, IdentityFederation},
        metrics, ServiceError, SessionStore, UserDirectory,
    },
    utils::{generate_random_token, CredentialVerifier, Password, PasswordHashString},
};

/// Lifetime of every session, local or federated.
pub const SESSION_TTL_MINUTES: i64 = 30;

pub fn session_ttl() -> Duration {
    Duration::minutes(SESSION_TTL_MINUTES)
}

/// Switches for behaviour that deployments disagree on.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthPolicy {
    /// Apply the approval gate to federated logins as well as local ones.
    pub federated_requires_approval: bool,
}

/// A freshly minted session and the user it belongs to.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    federation: Arc<dyn IdentityFederation>,
    credentials: CredentialVerifier,
    policy: AuthPolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        federation: Arc<dyn IdentityFederation>,
        credentials: CredentialVerifier,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            users,
            sessions,
            federation,
            credentials,
            policy,
        }
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.sessions.health_check().await?;
        Ok(())
    }

    /// Creates an unapproved local account. No session is issued.
    ///
    /// The username is stored trimmed, the same form `login` looks it up by.
    pub async fn register(&self, req: RegisterRequest) -> Result<User, ServiceError> {
        let username = normalize_username(&req.username)?;

        if self.users.find_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::DuplicateEmail);
        }
        if self.users.find_by_username(&username).await?.is_some() {
            return Err(ServiceError::DuplicateUsername);
        }

        let password_hash = self.hash_password(Password::new(req.password)).await?;

        let user = User::new_local(req.name, req.email, username, password_hash.into_string());

        if let Err(e) = self.users.create(&user).await {
            return Err(self.explain_create_failure(&user, e).await);
        }

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, ServiceError> {
        let result = self.login_local(req).await;
        metrics::record_login("local", outcome_label(&result));
        result
    }

    async fn login_local(&self, req: LoginRequest) -> Result<LoginOutcome, ServiceError> {
        let username = normalize_username(&req.username)?;
        let password = Password::new(req.password);

        let Some(user) = self.users.find_by_username(&username).await? else {
            self.equalize_timing(password).await?;
            tracing::info!("Login for unknown username");
            return Err(ServiceError::UserNotFound);
        };

        if !user.is_cleared() {
            tracing::info!(user_id = %user.id, "Login blocked pending approval");
            return Err(ServiceError::PendingApproval);
        }

        // Accounts without a local password cannot use this route.
        if user.auth_provider != AuthProvider::Local {
            self.equalize_timing(password).await?;
            tracing::info!(user_id = %user.id, "Password login for federated account");
            return Err(ServiceError::InvalidCredentials);
        }

        let hash = PasswordHashString::new(user.password_hash.clone());
        if !self.verify_password(hash, password).await? {
            tracing::info!(user_id = %user.id, "Password verification failed");
            return Err(ServiceError::InvalidCredentials);
        }

        let (token, expires_at) = self.mint_session(&user.id).await?;
        tracing::info!(user_id = %user.id, "Local login succeeded");

        Ok(LoginOutcome {
            user,
            token,
            expires_at,
        })
    }

    /// Signs in through a resolved federated identity, creating or syncing
    /// the account as needed.
    pub async fn login_with_federation(
        &self,
        external_id: &str,
        email: &str,
        name: &str,
        picture: Option<String>,
    ) -> Result<LoginOutcome, ServiceError> {
        let result = self
            .login_federated(external_id, email, name, picture)
            .await;
        metrics::record_login("federated", outcome_label(&result));
        result
    }

    async fn login_federated(
        &self,
        external_id: &str,
        email: &str,
        name: &str,
        picture: Option<String>,
    ) -> Result<LoginOutcome, ServiceError> {
        if external_id.is_empty() || email.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Federated identity is missing id or email".to_string(),
            ));
        }

        let existing = match self.users.find_by_external_id(external_id).await? {
            Some(user) => Some(user),
            None => self.users.find_by_email(email).await?,
        };

        let user = match existing {
            None => {
                let user = User::new_federated(
                    external_id.to_string(),
                    email.to_string(),
                    name.to_string(),
                    picture,
                );
                if let Err(e) = self.users.create(&user).await {
                    return Err(self.explain_create_failure(&user, e).await);
                }
                tracing::info!(user_id = %user.id, "Federated account created");
                user
            }
            Some(mut user) => {
                if sync_profile(&mut user, external_id, name, picture) {
                    user.updated_at = Utc::now();
                    self.users.update(&user).await?;
                    tracing::info!(user_id = %user.id, "Federated profile synced");
                }
                user
            }
        };

        if self.policy.federated_requires_approval && !user.is_cleared() {
            tracing::info!(user_id = %user.id, "Federated login blocked pending approval");
            return Err(ServiceError::PendingApproval);
        }

        let (token, expires_at) = self.mint_session(&user.id).await?;
        tracing::info!(user_id = %user.id, "Federated login succeeded");

        Ok(LoginOutcome {
            user,
            token,
            expires_at,
        })
    }

    /// Code exchange, identity resolution and login in one step.
    pub async fn complete_federated_login(&self, code: &str) -> Result<LoginOutcome, ServiceError> {
        let access_token = self.exchange_code(code).await?;
        let identity = self.resolve_identity(&access_token).await?;
        self.login_with_federation(&identity.id, &identity.email, &identity.name, identity.picture)
            .await
    }

    /// Resolves a bearer token to its live user. Every protected request
    /// goes through here.
    pub async fn validate_session(&self, token: &str) -> Result<User, ServiceError> {
        if token.is_empty() {
            return Err(ServiceError::SessionInvalid);
        }

        let session = self
            .sessions
            .get_by_token(token)
            .await?
            .ok_or(ServiceError::SessionInvalid)?;

        self.users
            .find_by_id(&session.user_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %session.user_id, "Session refers to a missing user");
                ServiceError::UserNotFound
            })
    }

    /// Idempotent.
    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        self.sessions.delete(token).await?;
        Ok(())
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, ServiceError> {
        let removed = self.sessions.delete_expired().await?;
        Ok(removed)
    }

    /// Ends every session of one user.
    pub async fn revoke_sessions(&self, user_id: &str) -> Result<u64, ServiceError> {
        let removed = self.sessions.delete_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, removed, "User sessions revoked");
        Ok(removed)
    }

    pub fn authorization_url(&self, state: &str) -> Result<String, ServiceError> {
        Ok(self.federation.authorization_url(state)?)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, ServiceError> {
        Ok(self.federation.exchange_code(code).await?)
    }

    pub async fn resolve_identity(
        &self,
        token: &AccessToken,
    ) -> Result<FederatedIdentity, ServiceError> {
        Ok(self.federation.resolve_identity(token).await?)
    }

    async fn mint_session(&self, user_id: &str) -> Result<(String, DateTime<Utc>), ServiceError> {
        let session = Session::new(generate_random_token(), user_id.to_string(), session_ttl());
        self.sessions.create(&session).await?;
        Ok((session.token, session.expires_at))
    }

    async fn hash_password(&self, password: Password) -> Result<PasswordHashString, ServiceError> {
        let credentials = self.credentials.clone();
        let hash = tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;
        Ok(hash)
    }

    async fn verify_password(
        &self,
        hash: PasswordHashString,
        password: Password,
    ) -> Result<bool, ServiceError> {
        let credentials = self.credentials.clone();
        let matches = tokio::task::spawn_blocking(move || credentials.verify(&hash, &password))
            .await
            .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?;
        Ok(matches)
    }

    /// Burns one verification off the async workers for logins that have no
    /// real digest to check, so they cost the same as a wrong password.
    async fn equalize_timing(&self, password: Password) -> Result<(), ServiceError> {
        let credentials = self.credentials.clone();
        tokio::task::spawn_blocking(move || credentials.equalize_timing(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?;
        Ok(())
    }

    /// A create that lost a race against a unique index is reported as the
    /// duplicate it is.
    async fn explain_create_failure(&self, user: &User, err: StoreError) -> ServiceError {
        if !matches!(err, StoreError::WriteFailure(_)) {
            return err.into();
        }
        if let Ok(Some(_)) = self.users.find_by_email(&user.email).await {
            return ServiceError::DuplicateEmail;
        }
        if let Some(username) = &user.username {
            if let Ok(Some(_)) = self.users.find_by_username(username).await {
                return ServiceError::DuplicateUsername;
            }
        }
        err.into()
    }
}

fn normalize_username(raw: &str) -> Result<String, ServiceError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ServiceError::InvalidInput("Username is required".to_string()));
    }
    Ok(username.to_string())
}

/// Applies provider-side drift. Returns whether anything changed.
fn sync_profile(user: &mut User, external_id: &str, name: &str, picture: Option<String>) -> bool {
    let mut changed = false;
    if user.external_id.as_deref() != Some(external_id) {
        user.external_id = Some(external_id.to_string());
        changed = true;
    }
    if user.picture != picture {
        user.picture = picture;
        changed = true;
    }
    if user.name != name {
        user.name = name.to_string();
        changed = true;
    }
    changed
}

fn outcome_label<T>(result: &Result<T, ServiceError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(ServiceError::UserNotFound | ServiceError::InvalidCredentials) => "invalid_credentials",
        Err(ServiceError::PendingApproval) => "pending_approval",
        Err(ServiceError::Federation(_)) => "federation_error",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::federation::FederationError;
    use crate::services::{InMemorySessionStore, InMemoryUserDirectory};
    use argon2::Params;
    use async_trait::async_trait;

    struct NoFederation;

    #[async_trait]
    impl IdentityFederation for NoFederation {
        fn authorization_url(&self, _state: &str) -> Result<String, FederationError> {
            Err(FederationError::NotConfigured)
        }

        async fn exchange_code(&self, _code: &str) -> Result<AccessToken, FederationError> {
            Err(FederationError::NotConfigured)
        }

        async fn resolve_identity(
            &self,
            _token: &AccessToken,
        ) -> Result<FederatedIdentity, FederationError> {
            Err(FederationError::NotConfigured)
        }
    }

    struct Harness {
        service: AuthService,
        users: Arc<InMemoryUserDirectory>,
        sessions: Arc<InMemorySessionStore>,
    }

    fn harness(policy: AuthPolicy) -> Harness {
        harness_with(
            policy,
            CredentialVerifier::with_params(Params::new(8, 1, 1, None).unwrap()),
        )
    }

    fn harness_with(policy: AuthPolicy, credentials: CredentialVerifier) -> Harness {
        let users = Arc::new(InMemoryUserDirectory::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let service = AuthService::new(
            users.clone(),
            sessions.clone(),
            Arc::new(NoFederation),
            credentials,
            policy,
        );
        Harness {
            service,
            users,
            sessions,
        }
    }

    fn alice() -> RegisterRequest {
        RegisterRequest {
            name: "Alice".into(),
            email: "alice@x.com".into(),
            username: "alice".into(),
            password: "secret1".into(),
        }
    }

    fn login_req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    async fn approve(h: &Harness, user_id: &str) {
        let mut user = h.users.find_by_id(user_id).await.unwrap().unwrap();
        user.approved = true;
        h.users.update(&user).await.unwrap();
    }

    #[tokio::test]
    async fn registration_starts_unapproved_and_issues_no_session() {
        let h = harness(AuthPolicy::default());
        let user = h.service.register(alice()).await.unwrap();

        assert!(!user.approved);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.auth_provider, AuthProvider::Local);
        assert_ne!(user.password_hash, "secret1");
        assert!(h.sessions.is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_and_username_are_rejected() {
        let h = harness(AuthPolicy::default());
        h.service.register(alice()).await.unwrap();

        let same_email = RegisterRequest {
            username: "alice2".into(),
            ..alice()
        };
        assert!(matches!(
            h.service.register(same_email).await,
            Err(ServiceError::DuplicateEmail)
        ));

        let same_username = RegisterRequest {
            email: "other@x.com".into(),
            ..alice()
        };
        assert!(matches!(
            h.service.register(same_username).await,
            Err(ServiceError::DuplicateUsername)
        ));
    }

    #[tokio::test]
    async fn alice_waits_for_approval_then_logs_in() {
        let h = harness(AuthPolicy::default());
        let user = h.service.register(alice()).await.unwrap();

        assert!(matches!(
            h.service.login(login_req("alice", "secret1")).await,
            Err(ServiceError::PendingApproval)
        ));

        approve(&h, &user.id).await;

        let before = Utc::now();
        let outcome = h.service.login(login_req("alice", "secret1")).await.unwrap();
        assert_eq!(outcome.user.id, user.id);
        assert_eq!(outcome.token.len(), 64);
        let ttl = outcome.expires_at - before;
        assert!(ttl <= Duration::minutes(30) + Duration::seconds(5));
        assert!(ttl >= Duration::minutes(30) - Duration::seconds(5));

        let validated = h.service.validate_session(&outcome.token).await.unwrap();
        assert_eq!(validated.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_fail() {
        let h = harness(AuthPolicy::default());
        let user = h.service.register(alice()).await.unwrap();
        approve(&h, &user.id).await;

        assert!(matches!(
            h.service.login(login_req("alice", "wrong")).await,
            Err(ServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            h.service.login(login_req("bob", "secret1")).await,
            Err(ServiceError::UserNotFound)
        ));
        assert!(matches!(
            h.service.login(login_req("  ", "secret1")).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(h.sessions.is_empty());
    }

    #[tokio::test]
    async fn admins_skip_the_approval_gate() {
        let h = harness(AuthPolicy::default());
        let user = h.service.register(alice()).await.unwrap();
        let mut admin = h.users.find_by_id(&user.id).await.unwrap().unwrap();
        admin.role = Role::Admin;
        h.users.update(&admin).await.unwrap();

        assert!(h.service.login(login_req("alice", "secret1")).await.is_ok());
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_invalidates() {
        let h = harness(AuthPolicy::default());
        let user = h.service.register(alice()).await.unwrap();
        approve(&h, &user.id).await;
        let outcome = h.service.login(login_req("alice", "secret1")).await.unwrap();

        h.service.logout(&outcome.token).await.unwrap();
        h.service.logout(&outcome.token).await.unwrap();

        assert!(matches!(
            h.service.validate_session(&outcome.token).await,
            Err(ServiceError::SessionInvalid)
        ));
    }

    #[tokio::test]
    async fn session_one_second_past_expiry_never_validates() {
        let h = harness(AuthPolicy::default());
        let user = h.service.register(alice()).await.unwrap();
        let session = Session {
            token: "stale".into(),
            user_id: user.id,
            expires_at: Utc::now() - Duration::seconds(1),
            created_at: Utc::now() - Duration::minutes(31),
        };
        h.sessions.create(&session).await.unwrap();

        assert!(matches!(
            h.service.validate_session("stale").await,
            Err(ServiceError::SessionInvalid)
        ));
        assert_eq!(h.service.cleanup_expired_sessions().await.unwrap(), 1);
        assert!(h.sessions.is_empty());
    }

    #[tokio::test]
    async fn session_of_vanished_user_is_rejected() {
        let h = harness(AuthPolicy::default());
        let session = Session::new("orphan".into(), "ghost-id".into(), session_ttl());
        h.sessions.create(&session).await.unwrap();

        assert!(matches!(
            h.service.validate_session("orphan").await,
            Err(ServiceError::UserNotFound)
        ));
        assert!(matches!(
            h.service.validate_session("").await,
            Err(ServiceError::SessionInvalid)
        ));
    }

    #[tokio::test]
    async fn repeated_federated_login_syncs_without_duplicating() {
        let h = harness(AuthPolicy::default());

        let first = h
            .service
            .login_with_federation("g-1", "g@x.com", "Gina", Some("pic.png".into()))
            .await
            .unwrap();
        let second = h
            .service
            .login_with_federation("g-1", "g@x.com", "Gina", Some("pic2.png".into()))
            .await
            .unwrap();

        assert_eq!(first.user.id, second.user.id);
        assert_ne!(first.token, second.token);
        let all = h.users.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].picture.as_deref(), Some("pic2.png"));
        assert_eq!(all[0].auth_provider, AuthProvider::Federated);
    }

    #[tokio::test]
    async fn federated_login_links_existing_email() {
        let h = harness(AuthPolicy::default());
        let local = h.service.register(alice()).await.unwrap();

        let outcome = h
            .service
            .login_with_federation("g-77", "alice@x.com", "Alice A.", None)
            .await
            .unwrap();

        assert_eq!(outcome.user.id, local.id);
        let stored = h.users.find_by_id(&local.id).await.unwrap().unwrap();
        assert_eq!(stored.external_id.as_deref(), Some("g-77"));
        assert_eq!(stored.name, "Alice A.");
        // Linking leaves the local password in place.
        assert_eq!(stored.auth_provider, AuthProvider::Local);
    }

    #[tokio::test]
    async fn federated_approval_gate_follows_policy() {
        let open = harness(AuthPolicy::default());
        assert!(open
            .service
            .login_with_federation("g-1", "g@x.com", "Gina", None)
            .await
            .is_ok());

        let gated = harness(AuthPolicy {
            federated_requires_approval: true,
        });
        assert!(matches!(
            gated
                .service
                .login_with_federation("g-1", "g@x.com", "Gina", None)
                .await,
            Err(ServiceError::PendingApproval)
        ));
        // The account is still created so an admin can approve it.
        assert_eq!(gated.users.list().await.unwrap().len(), 1);
        assert!(gated.sessions.is_empty());
    }

    #[tokio::test]
    async fn password_login_to_federated_account_fails() {
        let h = harness(AuthPolicy::default());
        let outcome = h
            .service
            .login_with_federation("g-1", "g@x.com", "Gina", None)
            .await
            .unwrap();
        let mut user = outcome.user;
        user.username = Some("gina".into());
        user.approved = true;
        h.users.update(&user).await.unwrap();

        assert!(matches!(
            h.service.login(login_req("gina", "anything")).await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn registered_username_is_trimmed_and_can_log_in() {
        let h = harness(AuthPolicy::default());
        let user = h
            .service
            .register(RegisterRequest {
                username: " alice ".into(),
                ..alice()
            })
            .await
            .unwrap();
        assert_eq!(user.username.as_deref(), Some("alice"));
        approve(&h, &user.id).await;

        assert!(h.service.login(login_req("alice", "secret1")).await.is_ok());
        assert!(h.service.login(login_req(" alice ", "secret1")).await.is_ok());

        let padded_duplicate = RegisterRequest {
            email: "other@x.com".into(),
            username: "alice  ".into(),
            ..alice()
        };
        assert!(matches!(
            h.service.register(padded_duplicate).await,
            Err(ServiceError::DuplicateUsername)
        ));
    }

    #[tokio::test]
    async fn blank_username_is_rejected_at_registration() {
        let h = harness(AuthPolicy::default());
        let blank = RegisterRequest {
            username: "   ".into(),
            ..alice()
        };

        assert!(matches!(
            h.service.register(blank).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(h.users.list().await.unwrap().is_empty());
    }

    /// Runs `login` on a single-threaded runtime next to a task that counts
    /// how often it gets scheduled, and returns the count.
    async fn ticks_during_login(
        h: &Harness,
        req: LoginRequest,
    ) -> (u64, Result<LoginOutcome, ServiceError>) {
        use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

        let ticks = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let ticker = {
            let ticks = ticks.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                while !stop.load(Ordering::Relaxed) {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        };

        let result = h.service.login(req).await;
        let seen = ticks.load(Ordering::Relaxed);
        stop.store(true, Ordering::Relaxed);
        ticker.await.unwrap();
        (seen, result)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn logins_without_a_digest_do_not_block_the_runtime() {
        // Enough cost that the dummy verification is still running when the
        // ticker gets its turn.
        let h = harness_with(
            AuthPolicy::default(),
            CredentialVerifier::with_params(Params::new(4096, 3, 1, None).unwrap()),
        );

        let (ticks, result) = ticks_during_login(&h, login_req("ghost", "anything")).await;
        assert!(matches!(result, Err(ServiceError::UserNotFound)));
        assert!(ticks > 0);

        let outcome = h
            .service
            .login_with_federation("g-1", "g@x.com", "Gina", None)
            .await
            .unwrap();
        let mut user = outcome.user;
        user.username = Some("gina".into());
        user.approved = true;
        h.users.update(&user).await.unwrap();

        let (ticks, result) = ticks_during_login(&h, login_req("gina", "anything")).await;
        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
        assert!(ticks > 0);
    }

    #[tokio::test]
    async fn revoke_sessions_ends_all_of_one_user() {
        let h = harness(AuthPolicy::default());
        let a = h
            .service
            .login_with_federation("g-1", "a@x.com", "A", None)
            .await
            .unwrap();
        let a2 = h
            .service
            .login_with_federation("g-1", "a@x.com", "A", None)
            .await
            .unwrap();
        let b = h
            .service
            .login_with_federation("g-2", "b@x.com", "B", None)
            .await
            .unwrap();

        assert_eq!(h.service.revoke_sessions(&a.user.id).await.unwrap(), 2);
        assert!(h.service.validate_session(&a.token).await.is_err());
        assert!(h.service.validate_session(&a2.token).await.is_err());
        assert!(h.service.validate_session(&b.token).await.is_ok());
    }

    #[tokio::test]
    async fn unconfigured_federation_surfaces_as_federation_error() {
        let h = harness(AuthPolicy::default());
        assert!(matches!(
            h.service.authorization_url("s"),
            Err(ServiceError::Federation(FederationError::NotConfigured))
        ));
        assert!(matches!(
            h.service.complete_federated_login("code").await,
            Err(ServiceError::Federation(FederationError::NotConfigured))
        ));
    }
}
