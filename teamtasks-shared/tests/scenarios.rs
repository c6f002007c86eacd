/// End-to-end dashboard scenarios against the in-memory backends
///
/// Covers role routing, the user lifecycle and task flows as a client drives
/// them, including the compensation paths of user creation.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teamtasks_shared::auth::identity::memory::MemoryIdentityProvider;
use teamtasks_shared::auth::identity::{IdentityError, IdentityProvider, Session, SessionIdentity};
use teamtasks_shared::models::{Role, TaskTab, UserProfile};
use teamtasks_shared::notify::RecordingPushSender;
use teamtasks_shared::services::{
    bootstrap_admin, router, AdminDashboard, BootstrapOutcome, Dashboard, ManagerDashboard,
    NewTask, NewUser, UserDashboard,
};
use teamtasks_shared::store::memory::MemoryStore;
use teamtasks_shared::store::{
    Change, Collection, Document, DocumentStore, Fields, Query, StoreError, StoreResult,
};
use teamtasks_shared::{Backend, DomainError};
use tokio::sync::broadcast;
use uuid::Uuid;

const SECRET: &str = "scenario-test-secret-of-32-bytes!!!!";

/// Memory store whose `users` writes can be made to fail
#[derive(Default)]
struct FailingStore {
    inner: MemoryStore,
    fail_user_writes: AtomicBool,
    writes: std::sync::atomic::AtomicUsize,
}

impl FailingStore {
    fn fail_user_writes(&self) {
        self.fail_user_writes.store(true, Ordering::SeqCst);
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self, collection: Collection) -> StoreResult<()> {
        if collection == Collection::Users && self.fail_user_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("users collection unavailable".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.inner.query(query).await
    }

    async fn set(&self, collection: Collection, id: Uuid, data: Fields) -> StoreResult<()> {
        self.record_write(collection)?;
        self.inner.set(collection, id, data).await
    }

    async fn update(&self, collection: Collection, id: Uuid, fields: Fields) -> StoreResult<()> {
        self.record_write(collection)?;
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<bool> {
        self.record_write(collection)?;
        self.inner.delete(collection, id).await
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.inner.changes()
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Identity provider whose deletes always fail
struct StickyIdentities(MemoryIdentityProvider);

#[async_trait]
impl IdentityProvider for StickyIdentities {
    async fn create_identity(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        self.0.create_identity(email, password).await
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        self.0.authenticate(email, password).await
    }

    async fn verify_session(&self, access_token: &str) -> Result<SessionIdentity, IdentityError> {
        self.0.verify_session(access_token).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        self.0.refresh_session(refresh_token).await
    }

    async fn end_session(&self, access_token: &str) -> Result<(), IdentityError> {
        self.0.end_session(access_token).await
    }

    async fn delete_identity(&self, _identity_id: Uuid) -> Result<bool, IdentityError> {
        Err(IdentityError::Database(sqlx::Error::PoolTimedOut))
    }
}

struct World {
    backend: Backend,
    store: Arc<FailingStore>,
    identities: Arc<MemoryIdentityProvider>,
    push: Arc<RecordingPushSender>,
    admin: AdminDashboard,
}

async fn world() -> World {
    let store = Arc::new(FailingStore::default());
    let identities = Arc::new(MemoryIdentityProvider::new(SECRET));
    let push = Arc::new(RecordingPushSender::new());
    let backend = Backend::new(store.clone(), identities.clone(), push.clone());

    let BootstrapOutcome::Created(root) = bootstrap_admin(&backend, "root@x.com", "pw123456", "Root")
        .await
        .unwrap()
    else {
        panic!("fresh backend should create the admin");
    };
    let admin = AdminDashboard::open(&backend, root.id).await.unwrap();

    World {
        backend,
        store,
        identities,
        push,
        admin,
    }
}

fn new_user(name: &str, role: Role, manager_id: Option<Uuid>) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: format!("{}@x.com", name.to_lowercase()),
        password: "pw123456".to_string(),
        role,
        manager_id,
    }
}

#[tokio::test]
async fn test_admin_created_user_reaches_user_dashboard() {
    let w = world().await;
    let manager = w.admin.create_user(new_user("Mia", Role::Manager, None)).await.unwrap();

    let user = w
        .admin
        .create_user(NewUser {
            name: "U".to_string(),
            email: "u@x.com".to_string(),
            password: "pw123456".to_string(),
            role: Role::User,
            manager_id: Some(manager.id),
        })
        .await
        .unwrap();

    let stored = UserProfile::find_by_id(w.backend.store.as_ref(), user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.role, Role::User);
    assert_eq!(stored.manager_id, Some(manager.id));

    let signed_in = router::sign_in(&w.backend, "u@x.com", "pw123456").await.unwrap();
    assert!(matches!(signed_in.dashboard, Dashboard::User(_)));
    assert_eq!(signed_in.session.identity_id, user.id);
}

#[tokio::test]
async fn test_empty_fields_never_write() {
    let w = world().await;
    let before = w.store.writes();
    let identities_before = w.identities.len().await;

    for request in [
        NewUser { name: String::new(), ..new_user("A", Role::User, None) },
        NewUser { email: " ".to_string(), ..new_user("B", Role::User, None) },
        NewUser { password: String::new(), ..new_user("C", Role::User, None) },
    ] {
        assert!(matches!(
            w.admin.create_user(request).await,
            Err(DomainError::Validation { .. })
        ));
    }

    assert_eq!(w.store.writes(), before);
    assert_eq!(w.identities.len().await, identities_before);
}

#[tokio::test]
async fn test_blank_task_titles_never_write() {
    let w = world().await;
    let mia = w.admin.create_user(new_user("Mia", Role::Manager, None)).await.unwrap();
    let sam = w.admin.create_user(new_user("Sam", Role::User, Some(mia.id))).await.unwrap();

    let manager = ManagerDashboard::open(&w.backend, mia.id).await.unwrap();
    let user = UserDashboard::open(&w.backend, sam.id).await.unwrap();
    let before = w.store.writes();

    assert!(manager
        .create_task(NewTask { title: " \t".to_string(), assignee_id: Some(sam.id) })
        .await
        .is_err());
    assert!(user.create_task("   ").await.is_err());
    assert_eq!(w.store.writes(), before);
}

#[tokio::test]
async fn test_manager_assigns_to_single_subordinate() {
    let w = world().await;
    let mia = w.admin.create_user(new_user("Mia", Role::Manager, None)).await.unwrap();
    let sam = w.admin.create_user(new_user("Sam", Role::User, Some(mia.id))).await.unwrap();

    let Dashboard::Manager(manager) = router::sign_in(&w.backend, "mia@x.com", "pw123456")
        .await
        .unwrap()
        .dashboard
    else {
        panic!("expected the manager dashboard");
    };

    let task = manager
        .create_task(NewTask { title: "Ship report".to_string(), assignee_id: Some(sam.id) })
        .await
        .unwrap();
    assert_eq!(task.user_id, sam.id);
    assert!(!task.completed);

    let team = manager.subordinates().await.unwrap();
    let listed = manager.tasks(TaskTab::MySubordinates).await.unwrap();
    assert_eq!(listed, vec![task.clone()]);
    assert_eq!(manager.owner_name(&listed[0], &team), "Sam");

    // Sam has no push token
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(w.push.sent().await.is_empty());
}

#[tokio::test]
async fn test_completed_task_moves_to_completed_column() {
    let w = world().await;
    let sam = w.admin.create_user(new_user("Sam", Role::User, None)).await.unwrap();
    let user = UserDashboard::open(&w.backend, sam.id).await.unwrap();
    let task = user.create_task("Ship report").await.unwrap();

    user.toggle_task(task.id).await.unwrap();

    // Re-opening the view yields a fresh subscription
    let reopened = UserDashboard::open(&w.backend, sam.id).await.unwrap();
    let board = reopened.watch_board().await.unwrap().current();
    assert!(board.todo.is_empty());
    assert_eq!(board.completed[0].id, task.id);
}

#[tokio::test]
async fn test_toggle_read_toggle_restores() {
    let w = world().await;
    let sam = w.admin.create_user(new_user("Sam", Role::User, None)).await.unwrap();
    let user = UserDashboard::open(&w.backend, sam.id).await.unwrap();
    let task = user.create_task("Ship report").await.unwrap();

    user.toggle_task(task.id).await.unwrap();
    assert_eq!(user.board().await.unwrap().completed.len(), 1);
    let restored = user.toggle_task(task.id).await.unwrap();

    assert_eq!(restored.completed, task.completed);
    assert_eq!(user.board().await.unwrap().todo.len(), 1);
}

#[tokio::test]
async fn test_deleting_user_removes_their_tasks() {
    let w = world().await;
    let sam = w.admin.create_user(new_user("Sam", Role::User, None)).await.unwrap();
    let user = UserDashboard::open(&w.backend, sam.id).await.unwrap();
    user.create_task("a").await.unwrap();
    user.create_task("b").await.unwrap();

    let deleted = w.admin.delete_user(sam.id).await.unwrap();
    assert_eq!(deleted.tasks_removed, 2);

    let orphans = w
        .backend
        .store
        .query(&Query::new(Collection::Tasks).where_eq("userId", sam.id.to_string()))
        .await
        .unwrap();
    assert!(orphans.is_empty());
}

#[tokio::test]
async fn test_deleting_manager_never_orphans_subordinates() {
    let w = world().await;
    let mia = w.admin.create_user(new_user("Mia", Role::Manager, None)).await.unwrap();
    let sam = w.admin.create_user(new_user("Sam", Role::User, Some(mia.id))).await.unwrap();
    let writes_before = w.store.writes();

    let result = w.admin.delete_user(mia.id).await;
    assert!(matches!(result, Err(DomainError::Validation { .. })));
    assert_eq!(w.store.writes(), writes_before);

    // Every manager link still resolves to a Manager profile
    let store = w.backend.store.as_ref();
    for user in UserProfile::list(store).await.unwrap() {
        if let Some(manager_id) = user.manager_id {
            let manager = UserProfile::find_by_id(store, manager_id).await.unwrap();
            assert_eq!(manager.map(|m| m.role), Some(Role::Manager), "{} lost its manager", user.name);
        }
    }

    let team = ManagerDashboard::open(&w.backend, mia.id).await.unwrap();
    assert_eq!(team.subordinates().await.unwrap(), vec![sam]);
}

#[tokio::test]
async fn test_profile_write_failure_removes_identity() {
    let w = world().await;
    let identities_before = w.identities.len().await;
    w.store.fail_user_writes();

    let result = w.admin.create_user(new_user("Sam", Role::User, None)).await;

    assert!(matches!(result, Err(DomainError::Remote(_))));
    assert_eq!(w.identities.len().await, identities_before);
    assert!(w.backend.identities.authenticate("sam@x.com", "pw123456").await.is_err());
}

#[tokio::test]
async fn test_failed_compensation_is_inconsistent() {
    let store = Arc::new(FailingStore::default());
    let backend = Backend::new(
        store.clone(),
        Arc::new(StickyIdentities(MemoryIdentityProvider::new(SECRET))),
        Arc::new(RecordingPushSender::new()),
    );
    let BootstrapOutcome::Created(root) = bootstrap_admin(&backend, "root@x.com", "pw123456", "Root")
        .await
        .unwrap()
    else {
        panic!("fresh backend should create the admin");
    };
    let admin = AdminDashboard::open(&backend, root.id).await.unwrap();

    store.fail_user_writes();
    let result = admin.create_user(new_user("Sam", Role::User, None)).await;

    match result {
        Err(DomainError::Inconsistent(message)) => assert!(message.contains("rollback failed")),
        other => panic!("expected Inconsistent, got {:?}", other),
    }
}

#[tokio::test]
async fn test_each_role_lands_on_one_dashboard() {
    let w = world().await;
    let mia = w.admin.create_user(new_user("Mia", Role::Manager, None)).await.unwrap();
    w.admin.create_user(new_user("Sam", Role::User, Some(mia.id))).await.unwrap();

    let expectations = [
        ("root@x.com", Role::Admin),
        ("mia@x.com", Role::Manager),
        ("sam@x.com", Role::User),
    ];
    for (email, role) in expectations {
        let dashboard = router::sign_in(&w.backend, email, "pw123456").await.unwrap().dashboard;
        assert_eq!(dashboard.role(), role);
    }

    // Promotion takes effect on the next sign-in
    w.admin.create_user(new_user("Kai", Role::User, None)).await.unwrap();
    let kai = router::sign_in(&w.backend, "kai@x.com", "pw123456").await.unwrap();
    w.admin.toggle_role(kai.session.identity_id).await.unwrap();
    let again = router::sign_in(&w.backend, "kai@x.com", "pw123456").await.unwrap();
    assert!(matches!(again.dashboard, Dashboard::Manager(_)));
}

#[tokio::test]
async fn test_assignment_push_is_best_effort() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPushSender::failing());
    let backend = Backend::new(
        store,
        Arc::new(MemoryIdentityProvider::new(SECRET)),
        push.clone(),
    );
    let BootstrapOutcome::Created(root) = bootstrap_admin(&backend, "root@x.com", "pw123456", "Root")
        .await
        .unwrap()
    else {
        panic!("fresh backend should create the admin");
    };
    let admin = AdminDashboard::open(&backend, root.id).await.unwrap();
    let mia = admin.create_user(new_user("Mia", Role::Manager, None)).await.unwrap();
    let sam = admin.create_user(new_user("Sam", Role::User, Some(mia.id))).await.unwrap();
    teamtasks_shared::services::register_push_token(&backend, sam.id, Some("ExponentPushToken[s]"))
        .await
        .unwrap();

    let manager = ManagerDashboard::open(&backend, mia.id).await.unwrap();
    let created = manager
        .create_task(NewTask { title: "Ship report".to_string(), assignee_id: Some(sam.id) })
        .await;

    assert!(created.is_ok(), "push failure must not fail task creation");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(push.sent().await.len(), 1);
}
