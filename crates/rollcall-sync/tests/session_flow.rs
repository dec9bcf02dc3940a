use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rollcall_core::store::{BlobStore, MemoryStore, LEGACY_SLOT, PRIMARY_SLOT};
use rollcall_core::{codec, Database, EncryptedBlob, LogKind, NewStudent};
use rollcall_sync::{
    AuthError, AuthProvider, Credentials, Identity, MirrorDocument, RemoteError, RemoteStore,
    Session, SessionError, SessionState, SyncClient,
};

// ── Test doubles ────────────────────────────────────────────────────────────

struct StaticAuthProvider {
    identity: Identity,
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        if credentials.password == "letmein" {
            Ok(self.identity.clone())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn sign_out(&self) {}
}

#[derive(Default)]
struct InMemoryRemote {
    doc: Mutex<Option<MirrorDocument>>,
    failing: AtomicBool,
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn fetch(&self, _identity: &Identity) -> Result<Option<MirrorDocument>, RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection refused".into()));
        }
        Ok(self.doc.lock().clone())
    }

    async fn upload(&self, _identity: &Identity, doc: &MirrorDocument) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection refused".into()));
        }
        *self.doc.lock() = Some(doc.clone());
        Ok(())
    }
}

fn teacher_identity() -> Identity {
    Identity {
        user_id: "front-desk-1".into(),
        email: "desk@school.example".into(),
        token: Some("tok".into()),
    }
}

fn mirrored_client(remote: Arc<InMemoryRemote>) -> SyncClient {
    SyncClient::with_parts(
        Some(remote as Arc<dyn RemoteStore>),
        Some(Arc::new(StaticAuthProvider {
            identity: teacher_identity(),
        }) as Arc<dyn AuthProvider>),
        Duration::from_secs(5),
    )
}

async fn decode_primary(store: &MemoryStore, passphrase: &str) -> Database {
    let bytes = store.get(PRIMARY_SLOT).await.unwrap().unwrap();
    let blob = EncryptedBlob::from_json_bytes(&bytes).unwrap();
    codec::decode(&blob, passphrase).unwrap()
}

fn asha() -> NewStudent {
    NewStudent {
        name: "Asha".into(),
        class_name: "Pravesham".into(),
        class_code: 1,
        enrollment_year: 2025,
        ..Default::default()
    }
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_first_session() {
    let store = Arc::new(MemoryStore::new("local"));
    let mut session = Session::new(store.clone(), SyncClient::disabled());

    // unlocking an empty store yields an empty database, persisted at once
    let db = session.unlock("abc123").await.unwrap();
    assert!(db.is_empty());
    assert_eq!(*session.state(), SessionState::Unlocked);
    assert!(decode_primary(&store, "abc123").await.is_empty());

    let student = session.enroll(asha()).await.unwrap();
    assert_eq!(student.id, "TATATB-2526010001");

    let entry = session.check_in(&student.id).await.unwrap();
    assert_eq!(entry.kind, LogKind::CheckIn);

    let persisted = decode_primary(&store, "abc123").await;
    assert_eq!(persisted.students.len(), 1);
    assert_eq!(persisted.students[0].name, "Asha");
    assert_eq!(persisted.logs.len(), 1);
    assert_eq!(persisted.logs[0].kind, LogKind::CheckIn);
}

#[tokio::test]
async fn legacy_slot_is_migrated_once() {
    let store = Arc::new(MemoryStore::new("local"));
    let mut db = Database::default();
    db.enroll(asha());
    let blob = codec::encode(&db, "abc123").unwrap();
    store
        .put(LEGACY_SLOT, &blob.to_json_bytes().unwrap())
        .await
        .unwrap();

    let mut session = Session::new(store.clone(), SyncClient::disabled());
    let loaded = session.unlock("abc123").await.unwrap();
    assert_eq!(loaded.students.len(), 1);

    assert_eq!(decode_primary(&store, "abc123").await, db);
    assert_eq!(store.get(LEGACY_SLOT).await.unwrap(), None);
}

#[tokio::test]
async fn wrong_passphrase_locks_with_error() {
    let store = Arc::new(MemoryStore::new("local"));
    let blob = codec::encode(&Database::default(), "right").unwrap();
    store
        .put(PRIMARY_SLOT, &blob.to_json_bytes().unwrap())
        .await
        .unwrap();

    let mut session = Session::new(store.clone(), SyncClient::disabled());
    let err = session.unlock("wrong").await.unwrap_err();
    assert!(matches!(err, SessionError::Codec(_)));
    assert!(matches!(session.state(), SessionState::LockedWithError(_)));
    assert!(session.database().is_none());

    // retrying with the right passphrase recovers
    session.unlock("right").await.unwrap();
    assert_eq!(*session.state(), SessionState::Unlocked);
}

#[tokio::test]
async fn remote_absence_is_transparent() {
    let client = SyncClient::disabled();
    assert!(client.fetch_blob().await.is_none());
    let blob = EncryptedBlob::seal(b"data", "pw").unwrap();
    assert!(!client.upload_blob(&blob).await);
}

#[tokio::test]
async fn signed_out_client_degrades_the_same_way() {
    let remote = Arc::new(InMemoryRemote::default());
    let client = mirrored_client(remote);
    assert!(client.identity().is_none());
    assert!(client.fetch_blob().await.is_none());
    let blob = EncryptedBlob::seal(b"data", "pw").unwrap();
    assert!(!client.upload_blob(&blob).await);
}

#[tokio::test]
async fn failed_save_keeps_prior_slot_contents() {
    let store = Arc::new(MemoryStore::new("local"));
    let mut session = Session::new(store.clone(), SyncClient::disabled());
    session.unlock("abc123").await.unwrap();
    let before = store.get(PRIMARY_SLOT).await.unwrap().unwrap();

    store.set_quota(Some(0));
    let err = session.enroll(asha()).await.unwrap_err();
    match &err {
        SessionError::Store(store_err) => {
            let message = store_err.to_string();
            assert!(message.contains("photos"), "actionable message: {message}");
        }
        other => panic!("expected a store error, got {other:?}"),
    }
    assert_eq!(
        store.get(PRIMARY_SLOT).await.unwrap().unwrap(),
        before,
        "refused write must leave the previous blob intact"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn saves_are_mirrored_and_hydrate_a_new_device() {
    let remote = Arc::new(InMemoryRemote::default());

    // device one: sign in, enroll, save (mirror is fire-and-forget)
    let store_one = Arc::new(MemoryStore::new("device-one"));
    let mut session = Session::new(store_one, mirrored_client(remote.clone()));
    session.unlock("abc123").await.unwrap();
    session
        .sync()
        .sign_in(&Credentials {
            email: "desk@school.example".into(),
            password: "letmein".into(),
        })
        .await
        .unwrap();
    session.enroll(asha()).await.unwrap();

    let mut mirrored = false;
    for _ in 0..40 {
        if remote.doc.lock().is_some() {
            mirrored = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(mirrored, "upload never reached the remote store");

    // device two: empty local store, hydrates from the mirror
    let store_two = Arc::new(MemoryStore::new("device-two"));
    let mut other = Session::new(store_two.clone(), mirrored_client(remote.clone()));
    other.unlock("abc123").await.unwrap();
    other
        .sync()
        .sign_in(&Credentials {
            email: "desk@school.example".into(),
            password: "letmein".into(),
        })
        .await
        .unwrap();
    assert!(other.load_from_remote().await.unwrap());
    let db = other.database().unwrap();
    assert_eq!(db.students.len(), 1);
    assert_eq!(db.students[0].name, "Asha");
    // hydration also lands in the local slot
    assert_eq!(decode_primary(&store_two, "abc123").await.students.len(), 1);
}

#[tokio::test]
async fn remote_failure_never_disturbs_local_data() {
    let remote = Arc::new(InMemoryRemote::default());
    let store = Arc::new(MemoryStore::new("local"));
    let mut session = Session::new(store.clone(), mirrored_client(remote.clone()));
    session.unlock("abc123").await.unwrap();
    session
        .sync()
        .sign_in(&Credentials {
            email: "desk@school.example".into(),
            password: "letmein".into(),
        })
        .await
        .unwrap();
    session.enroll(asha()).await.unwrap();

    remote.failing.store(true, Ordering::SeqCst);
    assert!(!session.load_from_remote().await.unwrap());
    assert_eq!(session.database().unwrap().students.len(), 1);

    // a save still succeeds locally while the mirror is down
    let student_id = session.database().unwrap().students[0].id.clone();
    session.check_out(&student_id, "Meera").await.unwrap();
    let persisted = decode_primary(&store, "abc123").await;
    assert_eq!(persisted.logs.len(), 1);
    assert_eq!(persisted.logs[0].collected_by.as_deref(), Some("Meera"));
}

#[tokio::test]
async fn identity_changes_reach_subscribers() {
    let remote = Arc::new(InMemoryRemote::default());
    let client = mirrored_client(remote);
    let mut rx = client.subscribe_identity();
    assert!(rx.borrow().is_none());

    client
        .sign_in(&Credentials {
            email: "desk@school.example".into(),
            password: "letmein".into(),
        })
        .await
        .unwrap();
    rx.changed().await.unwrap();
    assert_eq!(
        rx.borrow_and_update().as_ref().map(|i| i.user_id.clone()),
        Some("front-desk-1".to_string())
    );

    client.sign_out().await;
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_none());
}

#[tokio::test]
async fn bad_credentials_are_an_auth_error() {
    let remote = Arc::new(InMemoryRemote::default());
    let client = mirrored_client(remote);
    let err = client
        .sign_in(&Credentials {
            email: "desk@school.example".into(),
            password: "nope".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(client.identity().is_none());
}
