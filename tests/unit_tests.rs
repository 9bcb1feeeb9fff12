use async_trait::async_trait;
use bulk_sms::{
    auth::AuthService,
    database::{Database, NewContact},
    error::AppError,
    messaging,
    models::{
        AppDownloads, ContactSource, MessageStatus, RecipientInput, RecipientStatus, Role,
    },
    sms::{GatewayError, SmsGateway, SmsReceipt},
};
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;
use tempfile::NamedTempFile;

async fn test_database() -> (Database, NamedTempFile) {
    let db_file = NamedTempFile::new().unwrap();
    let database_url = format!("sqlite:{}", db_file.path().display());
    let db = Database::new_with_migrations(&database_url).await.unwrap();
    (db, db_file)
}

fn test_auth(db: &Database) -> AuthService {
    AuthService::new(
        "unit_test_secret".to_string(),
        db.clone(),
        StdDuration::from_secs(600),
        168,
        24,
    )
}

fn recipient(name: &str, phone: &str) -> RecipientInput {
    RecipientInput {
        name: name.to_string(),
        phone: phone.to_string(),
        contact_id: None,
    }
}

/// Fails every call whose index is listed in `fail_on`.
struct CountingGateway {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
}

impl CountingGateway {
    fn new(fail_on: Vec<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl SmsGateway for CountingGateway {
    async fn send(&self, phone: &str, _message: &str) -> Result<SmsReceipt, GatewayError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.contains(&index) {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        Ok(SmsReceipt {
            status: "Success".to_string(),
            number: Some(phone.to_string()),
            message_id: Some(format!("id-{}", index)),
            cost: None,
        })
    }
}

#[tokio::test]
async fn test_user_tokens_round_trip() {
    let (db, _file) = test_database().await;
    let auth = test_auth(&db);

    let user = db.create_user("+250788000001", "Alice").await.unwrap();
    let (token, expires) = auth.issue_user_token(&user).unwrap();
    assert!(expires > Utc::now() + Duration::hours(167));

    let claims = auth.verify_token(&token).unwrap();
    assert_eq!(claims.role, Role::User);
    assert_eq!(claims.subject_id().unwrap(), user.id);

    let other = AuthService::new(
        "another_secret".to_string(),
        db.clone(),
        StdDuration::from_secs(600),
        168,
        24,
    );
    assert!(matches!(other.verify_token(&token), Err(AppError::Auth(_))));
}

#[tokio::test]
async fn test_admin_accounts() {
    let (db, _file) = test_database().await;
    let auth = test_auth(&db);

    let admin = auth
        .create_admin("ops@example.com", "Ops", "Str0ngPassw0rd", Role::SuperAdmin)
        .await
        .unwrap();
    assert_ne!(admin.password_hash, "Str0ngPassw0rd");

    let duplicate = auth
        .create_admin("ops@example.com", "Ops", "Str0ngPassw0rd", Role::Admin)
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let short = auth
        .create_admin("new@example.com", "New", "short", Role::Admin)
        .await;
    assert!(matches!(short, Err(AppError::Validation(_))));

    let signed_in = auth
        .authenticate_admin("ops@example.com", "Str0ngPassw0rd")
        .await
        .unwrap();
    assert_eq!(signed_in.id, admin.id);
    assert_eq!(signed_in.role, Role::SuperAdmin);

    assert!(matches!(
        auth.authenticate_admin("ops@example.com", "wrong").await,
        Err(AppError::Auth(_))
    ));
    assert!(matches!(
        auth.authenticate_admin("nobody@example.com", "Str0ngPassw0rd").await,
        Err(AppError::Auth(_))
    ));

    let (token, _) = auth.issue_admin_token(&signed_in).unwrap();
    assert_eq!(auth.verify_token(&token).unwrap().role, Role::SuperAdmin);

    let rejected = db
        .create_admin("user@example.com", "User", "hash", Role::User)
        .await;
    assert!(matches!(rejected, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_contact_storage_and_hashes() {
    let (db, _file) = test_database().await;
    let user = db.create_user("+250788000002", "Bob").await.unwrap();

    let created = db
        .create_contacts_bulk(
            &user.id,
            &[
                NewContact {
                    name: "One".to_string(),
                    phone: "+250788111111".to_string(),
                    source: ContactSource::Phonebook,
                },
                NewContact {
                    name: "Two".to_string(),
                    phone: "+250788222222".to_string(),
                    source: ContactSource::ImportedFile,
                },
            ],
        )
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(db.count_contacts(&user.id).await.unwrap(), 2);

    let hashes = db.contact_hashes(&user.id).await.unwrap();
    assert!(hashes.contains(&created[0].phone_hash));

    let found = db
        .find_contact_by_hash(&user.id, &created[1].phone_hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.source, ContactSource::ImportedFile);

    let updated = db
        .update_contact(&created[0].id, "Uno", "+250788333333")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Uno");
    assert_ne!(updated.phone_hash, created[0].phone_hash);

    let group = db.create_group(&user.id, "Friends").await.unwrap();
    db.add_group_member(&group.id, &created[0].id).await.unwrap();
    assert!(db.delete_contact(&created[0].id).await.unwrap());
    assert!(db.list_group_contacts(&group.id).await.unwrap().is_empty());
    assert!(!db.delete_contact(&created[0].id).await.unwrap());
}

#[tokio::test]
async fn test_send_bulk_records_each_outcome() {
    let (db, _file) = test_database().await;
    let user = db.create_user("+250788000003", "Carol").await.unwrap();
    let gateway = CountingGateway::new(vec![1]);
    let recipients = vec![
        recipient("A", "+250788000101"),
        recipient("B", "+250788000102"),
        recipient("C", "+250788000103"),
    ];

    let response = messaging::send_bulk(
        &db,
        &gateway,
        &user.id,
        Some("Hello there"),
        Some(recipients.as_slice()),
        15.0,
    )
    .await
    .unwrap();

    assert_eq!(response.sent, 2);
    assert_eq!(response.failed, 1);
    assert_eq!(response.sent + response.failed, response.total_recipients);
    assert_eq!(response.cost, 45.0);
    assert_eq!(response.errors[0].phone, "+250788000102");
    assert_eq!(
        response.errors[0].error,
        "SMS gateway unreachable: connection reset"
    );

    let message = db.get_message(&response.message_id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Partial);
    assert_eq!(message.sent_count, 2);
    assert_eq!(message.failed_count, 1);

    let rows = db.list_recipients(&message.id).await.unwrap();
    let statuses: Vec<RecipientStatus> = rows.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            RecipientStatus::Sent,
            RecipientStatus::Failed,
            RecipientStatus::Sent
        ]
    );
    assert!(rows[0].sent_at.is_some());
    assert!(rows[1].sent_at.is_none());
    assert_eq!(db.count_pending_recipients().await.unwrap(), 0);
}

#[tokio::test]
async fn test_send_bulk_rejects_bad_input_without_writing() {
    let (db, _file) = test_database().await;
    let user = db.create_user("+250788000004", "Dan").await.unwrap();
    let gateway = CountingGateway::new(vec![]);

    let empty: Vec<RecipientInput> = Vec::new();
    let result =
        messaging::send_bulk(&db, &gateway, &user.id, Some("hi"), Some(empty.as_slice()), 15.0).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let recipients = vec![recipient("A", "1")];
    let result =
        messaging::send_bulk(&db, &gateway, &user.id, Some("   "), Some(recipients.as_slice()), 15.0).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    assert_eq!(db.count_messages().await.unwrap(), 0);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_message_totals_windows() {
    let (db, _file) = test_database().await;
    let alice = db.create_user("+250788000005", "Alice").await.unwrap();
    let bob = db.create_user("+250788000006", "Bob").await.unwrap();
    let gateway = CountingGateway::new(vec![]);

    for (user, count) in [(&alice, 2usize), (&bob, 1usize)] {
        let recipients: Vec<RecipientInput> = (0..count)
            .map(|i| recipient("R", &format!("+25078800090{}", i)))
            .collect();
        messaging::send_bulk(&db, &gateway, &user.id, Some("Hi"), Some(recipients.as_slice()), 15.0)
            .await
            .unwrap();
    }

    let alice_totals = db.message_totals(Some(&alice.id), None, None).await.unwrap();
    assert_eq!(alice_totals.messages, 1);
    assert_eq!(alice_totals.recipients, 2);
    assert_eq!(alice_totals.sent, 2);
    assert_eq!(alice_totals.cost, 30.0);

    let everyone = db.message_totals(None, None, None).await.unwrap();
    assert_eq!(everyone.messages, 2);
    assert_eq!(everyone.cost, 45.0);

    let future = db
        .message_totals(None, Some(Utc::now() + Duration::days(1)), None)
        .await
        .unwrap();
    assert_eq!(future.messages, 0);
    assert_eq!(future.cost, 0.0);

    assert_eq!(db.count_senders().await.unwrap(), 2);
    assert_eq!(
        db.count_active_senders(Utc::now() - Duration::days(30))
            .await
            .unwrap(),
        2
    );
    assert_eq!(db.list_admin_messages(10, 0).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_app_settings_upsert() {
    let (db, _file) = test_database().await;
    assert!(db.get_app_settings().await.unwrap().is_none());

    let first = db
        .save_app_settings(&AppDownloads {
            android_url: "https://example.com/a".to_string(),
            ios_url: "https://example.com/i".to_string(),
            enable_android: true,
            enable_ios: true,
        })
        .await
        .unwrap();

    let second = db
        .save_app_settings(&AppDownloads {
            android_url: "https://example.com/a2".to_string(),
            ios_url: String::new(),
            enable_android: true,
            enable_ios: false,
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    let stored = db.get_app_settings().await.unwrap().unwrap();
    assert_eq!(stored.android_url, "https://example.com/a2");
    assert!(!stored.enable_ios);
}
