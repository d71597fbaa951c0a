//! Runs against a live MongoDB. Set `TEST_MONGODB_URI` and run with
//! `cargo test -- --ignored`.

use chrono::{Duration, Utc};
use portal_auth::{
    models::{Session, User},
    services::{
        MongoDb, MongoSessionStore, MongoUserDirectory, SessionStore, StoreError, UserDirectory,
    },
};
use uuid::Uuid;

struct TestDb {
    db: MongoDb,
    uri: String,
    name: String,
}

impl TestDb {
    async fn create() -> Self {
        dotenvy::dotenv().ok();
        let uri = std::env::var("TEST_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let name = format!("test_portal_auth_{}", Uuid::new_v4().simple());

        let db = MongoDb::connect(&uri, &name)
            .await
            .expect("Failed to connect to MongoDB");
        db.initialize_indexes()
            .await
            .expect("Failed to create indexes");

        Self { db, uri, name }
    }

    async fn drop(self) {
        let client = mongodb::Client::with_uri_str(&self.uri).await.unwrap();
        client.database(&self.name).drop(None).await.unwrap();
    }
}

fn local_user(username: &str) -> User {
    User::new_local(
        username.to_string(),
        format!("{}@example.com", username),
        username.to_string(),
        "$argon2id$placeholder".to_string(),
    )
}

#[tokio::test]
#[ignore]
async fn sessions_expire_on_read_and_are_swept() {
    let test_db = TestDb::create().await;
    let store = MongoSessionStore::new(test_db.db.clone());

    let live = Session::new("live".to_string(), "u1".to_string(), Duration::minutes(30));
    let mut stale = Session::new("stale".to_string(), "u1".to_string(), Duration::minutes(30));
    stale.expires_at = Utc::now() - Duration::seconds(1);

    store.create(&live).await.unwrap();
    store.create(&stale).await.unwrap();

    assert!(store.get_by_token("live").await.unwrap().is_some());
    assert!(store.get_by_token("stale").await.unwrap().is_none());

    assert_eq!(store.delete_expired().await.unwrap(), 1);
    assert_eq!(store.delete_all_for_user("u1").await.unwrap(), 1);

    store.delete("live").await.unwrap();
    store.delete("live").await.unwrap();

    test_db.drop().await;
}

#[tokio::test]
#[ignore]
async fn duplicate_token_is_a_write_failure() {
    let test_db = TestDb::create().await;
    let store = MongoSessionStore::new(test_db.db.clone());

    let session = Session::new("same".to_string(), "u1".to_string(), Duration::minutes(30));
    store.create(&session).await.unwrap();

    assert!(matches!(
        store.create(&session).await,
        Err(StoreError::WriteFailure(_))
    ));

    test_db.drop().await;
}

#[tokio::test]
#[ignore]
async fn user_directory_enforces_uniqueness() {
    let test_db = TestDb::create().await;
    let users = MongoUserDirectory::new(test_db.db.clone());

    let alice = local_user("alice");
    users.create(&alice).await.unwrap();

    let mut clash = local_user("alice2");
    clash.email = alice.email.clone();
    assert!(matches!(
        users.create(&clash).await,
        Err(StoreError::WriteFailure(_))
    ));

    // Federated accounts have no username; the sparse index allows many.
    let g1 = User::new_federated("g-1".into(), "g1@example.com".into(), "G1".into(), None);
    let g2 = User::new_federated("g-2".into(), "g2@example.com".into(), "G2".into(), None);
    users.create(&g1).await.unwrap();
    users.create(&g2).await.unwrap();

    let found = users.find_by_external_id("g-2").await.unwrap().unwrap();
    assert_eq!(found.id, g2.id);

    let mut updated = found;
    updated.approved = true;
    users.update(&updated).await.unwrap();
    assert!(users.find_by_id(&g2.id).await.unwrap().unwrap().approved);

    assert_eq!(users.list().await.unwrap().len(), 3);

    test_db.drop().await;
}
