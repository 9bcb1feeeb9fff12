/*!
 * Database access
 *
 * Thin query layer over a SQLite pool:
 * - users and admin accounts
 * - contacts, groups and group membership
 * - messages and per-recipient delivery rows
 * - aggregate queries for statistics and the admin dashboard
 * - the app settings singleton
 *
 * Ownership is not enforced here; handlers check it before mutating.
 */

use crate::error::{AppError, AppResult};
use crate::models::{
    AdminMessageRecord, AdminUser, AppDownloads, AppSettings, Contact, ContactGroup,
    ContactGroupMember, ContactSource, Message, MessageRecipient, MessageStatus, MessageTotals,
    RecipientInput, RecipientStatus, Role, User,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, QueryBuilder, Row, Sqlite};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

/// A contact about to be inserted.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    pub source: ContactSource,
}

impl Database {
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Database { pool })
    }

    pub async fn new_with_migrations(database_url: &str) -> AppResult<Self> {
        let db = Self::new(database_url).await?;
        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> AppResult<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    pub async fn create_user(&self, phone: &str, name: &str) -> AppResult<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, phone, name, email, created_at, updated_at)
            VALUES (?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(phone)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id,
            phone: phone.to_string(),
            name: name.to_string(),
            email: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_user_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, phone, name, email, created_at, updated_at FROM users WHERE phone = ?",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_user).transpose()
    }

    pub async fn list_users(&self, limit: i64, offset: i64) -> AppResult<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, phone, name, email, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_user).collect()
    }

    pub async fn count_users(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Admin accounts
    // ---------------------------------------------------------------------

    pub async fn create_admin(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        role: Role,
    ) -> AppResult<AdminUser> {
        if !role.is_admin() {
            return Err(AppError::Validation(
                "Admin accounts need an admin role".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO admin_users (id, email, name, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(AdminUser {
            id,
            email: email.to_string(),
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_admin_by_email(&self, email: &str) -> AppResult<Option<AdminUser>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, password_hash, role, created_at, updated_at
            FROM admin_users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_admin).transpose()
    }

    pub async fn get_admin_by_id(&self, admin_id: &Uuid) -> AppResult<Option<AdminUser>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, password_hash, role, created_at, updated_at
            FROM admin_users
            WHERE id = ?
            "#,
        )
        .bind(admin_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_admin).transpose()
    }

    // ---------------------------------------------------------------------
    // Contacts
    // ---------------------------------------------------------------------

    pub async fn create_contact(&self, user_id: &Uuid, contact: &NewContact) -> AppResult<Contact> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let phone_hash = Contact::hash_phone(&contact.phone);

        sqlx::query(
            r#"
            INSERT INTO contacts (id, user_id, name, phone, source, phone_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(contact.source.as_str())
        .bind(&phone_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Contact {
            id,
            user_id: *user_id,
            name: contact.name.clone(),
            phone: contact.phone.clone(),
            source: contact.source,
            phone_hash,
            created_at: now,
            updated_at: now,
        })
    }

    /// Inserts all contacts or none.
    pub async fn create_contacts_bulk(
        &self,
        user_id: &Uuid,
        contacts: &[NewContact],
    ) -> AppResult<Vec<Contact>> {
        let now = Utc::now();
        let mut created = Vec::with_capacity(contacts.len());
        let mut tx = self.pool.begin().await?;

        for contact in contacts {
            let id = Uuid::new_v4();
            let phone_hash = Contact::hash_phone(&contact.phone);

            sqlx::query(
                r#"
                INSERT INTO contacts (id, user_id, name, phone, source, phone_hash, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id.to_string())
            .bind(user_id.to_string())
            .bind(&contact.name)
            .bind(&contact.phone)
            .bind(contact.source.as_str())
            .bind(&phone_hash)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            created.push(Contact {
                id,
                user_id: *user_id,
                name: contact.name.clone(),
                phone: contact.phone.clone(),
                source: contact.source,
                phone_hash,
                created_at: now,
                updated_at: now,
            });
        }

        tx.commit().await?;
        Ok(created)
    }

    pub async fn get_contact(&self, contact_id: &Uuid) -> AppResult<Option<Contact>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, phone, source, phone_hash, created_at, updated_at
            FROM contacts
            WHERE id = ?
            "#,
        )
        .bind(contact_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_contact).transpose()
    }

    pub async fn list_contacts(&self, user_id: &Uuid) -> AppResult<Vec<Contact>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, phone, source, phone_hash, created_at, updated_at
            FROM contacts
            WHERE user_id = ?
            ORDER BY created_at DESC, name ASC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_contact).collect()
    }

    pub async fn count_contacts(&self, user_id: &Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn find_contact_by_hash(
        &self,
        user_id: &Uuid,
        phone_hash: &str,
    ) -> AppResult<Option<Contact>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, phone, source, phone_hash, created_at, updated_at
            FROM contacts
            WHERE user_id = ? AND phone_hash = ?
            LIMIT 1
            "#,
        )
        .bind(user_id.to_string())
        .bind(phone_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_contact).transpose()
    }

    pub async fn contact_hashes(&self, user_id: &Uuid) -> AppResult<HashSet<String>> {
        let hashes: Vec<String> =
            sqlx::query_scalar("SELECT phone_hash FROM contacts WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        Ok(hashes.into_iter().collect())
    }

    pub async fn update_contact(
        &self,
        contact_id: &Uuid,
        name: &str,
        phone: &str,
    ) -> AppResult<Option<Contact>> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET name = ?, phone = ?, phone_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(phone)
        .bind(Contact::hash_phone(phone))
        .bind(now)
        .bind(contact_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_contact(contact_id).await
    }

    /// Removes the contact together with its group memberships.
    pub async fn delete_contact(&self, contact_id: &Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM contact_group_members WHERE contact_id = ?")
            .bind(contact_id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(contact_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // ---------------------------------------------------------------------
    // Contact groups
    // ---------------------------------------------------------------------

    pub async fn create_group(&self, user_id: &Uuid, name: &str) -> AppResult<ContactGroup> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO contact_groups (id, user_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ContactGroup {
            id,
            user_id: *user_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_group(&self, group_id: &Uuid) -> AppResult<Option<ContactGroup>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, created_at, updated_at FROM contact_groups WHERE id = ?",
        )
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_group).transpose()
    }

    pub async fn list_groups(&self, user_id: &Uuid) -> AppResult<Vec<ContactGroup>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, created_at, updated_at
            FROM contact_groups
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_group).collect()
    }

    pub async fn rename_group(&self, group_id: &Uuid, name: &str) -> AppResult<Option<ContactGroup>> {
        let result = sqlx::query("UPDATE contact_groups SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now())
            .bind(group_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_group(group_id).await
    }

    pub async fn delete_group(&self, group_id: &Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM contact_group_members WHERE group_id = ?")
            .bind(group_id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM contact_groups WHERE id = ?")
            .bind(group_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Adding an existing member returns the existing membership.
    pub async fn add_group_member(
        &self,
        group_id: &Uuid,
        contact_id: &Uuid,
    ) -> AppResult<ContactGroupMember> {
        sqlx::query(
            r#"
            INSERT INTO contact_group_members (id, group_id, contact_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (group_id, contact_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(group_id.to_string())
        .bind(contact_id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, group_id, contact_id FROM contact_group_members WHERE group_id = ? AND contact_id = ?",
        )
        .bind(group_id.to_string())
        .bind(contact_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(ContactGroupMember {
            id: uuid_column(&row, "id")?,
            group_id: uuid_column(&row, "group_id")?,
            contact_id: uuid_column(&row, "contact_id")?,
        })
    }

    pub async fn remove_group_member(&self, group_id: &Uuid, contact_id: &Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM contact_group_members WHERE group_id = ? AND contact_id = ?")
                .bind(group_id.to_string())
                .bind(contact_id.to_string())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_group_contacts(&self, group_id: &Uuid) -> AppResult<Vec<Contact>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.user_id, c.name, c.phone, c.source, c.phone_hash, c.created_at, c.updated_at
            FROM contact_group_members m
            JOIN contacts c ON c.id = m.contact_id
            WHERE m.group_id = ?
            ORDER BY c.name ASC
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_contact).collect()
    }

    // ---------------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------------

    /// Creates the message in `sending` state and one `pending` row per
    /// recipient, in input order, inside a single transaction.
    pub async fn create_message_with_recipients(
        &self,
        user_id: &Uuid,
        content: &str,
        sms_count: i64,
        cost: f64,
        recipients: &[RecipientInput],
    ) -> AppResult<(Message, Vec<MessageRecipient>)> {
        let message_id = Uuid::new_v4();
        let now = Utc::now();
        let total_recipients = recipients.len() as i64;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO messages (
                id, user_id, content, sms_count, total_recipients, sent_count, failed_count,
                status, cost, payment_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 0, 0, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(message_id.to_string())
        .bind(user_id.to_string())
        .bind(content)
        .bind(sms_count)
        .bind(total_recipients)
        .bind(MessageStatus::Sending.as_str())
        .bind(cost)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut rows = Vec::with_capacity(recipients.len());
        for (position, recipient) in recipients.iter().enumerate() {
            let id = Uuid::new_v4();

            sqlx::query(
                r#"
                INSERT INTO message_recipients (
                    id, message_id, position, contact_id, name, phone, status,
                    error_message, sent_at, delivered_at, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL, ?, ?)
                "#,
            )
            .bind(id.to_string())
            .bind(message_id.to_string())
            .bind(position as i64)
            .bind(recipient.contact_id.map(|c| c.to_string()))
            .bind(&recipient.name)
            .bind(&recipient.phone)
            .bind(RecipientStatus::Pending.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            rows.push(MessageRecipient {
                id,
                message_id,
                contact_id: recipient.contact_id,
                name: recipient.name.clone(),
                phone: recipient.phone.clone(),
                status: RecipientStatus::Pending,
                error_message: None,
                sent_at: None,
                delivered_at: None,
                created_at: now,
            });
        }

        tx.commit().await?;

        let message = Message {
            id: message_id,
            user_id: *user_id,
            content: content.to_string(),
            sms_count,
            total_recipients,
            sent_count: 0,
            failed_count: 0,
            status: MessageStatus::Sending,
            cost,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };

        Ok((message, rows))
    }

    pub async fn mark_recipient_sent(
        &self,
        recipient_id: &Uuid,
        sent_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE message_recipients
            SET status = ?, error_message = NULL, sent_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(RecipientStatus::Sent.as_str())
        .bind(sent_at)
        .bind(Utc::now())
        .bind(recipient_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_recipient_failed(&self, recipient_id: &Uuid, error: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE message_recipients
            SET status = ?, error_message = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(RecipientStatus::Failed.as_str())
        .bind(error)
        .bind(Utc::now())
        .bind(recipient_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn finish_message(
        &self,
        message_id: &Uuid,
        status: MessageStatus,
        sent_count: i64,
        failed_count: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE messages
            SET status = ?, sent_count = ?, failed_count = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(sent_count)
        .bind(failed_count)
        .bind(Utc::now())
        .bind(message_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_message(&self, message_id: &Uuid) -> AppResult<Option<Message>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, content, sms_count, total_recipients, sent_count, failed_count,
                   status, cost, payment_id, created_at, updated_at
            FROM messages
            WHERE id = ?
            "#,
        )
        .bind(message_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_message).transpose()
    }

    pub async fn list_messages(
        &self,
        user_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, content, sms_count, total_recipients, sent_count, failed_count,
                   status, cost, payment_id, created_at, updated_at
            FROM messages
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_message).collect()
    }

    /// All messages created at or after `since`, newest first.
    pub async fn list_messages_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, content, sms_count, total_recipients, sent_count, failed_count,
                   status, cost, payment_id, created_at, updated_at
            FROM messages
            WHERE created_at >= ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_message).collect()
    }

    pub async fn list_recipients(&self, message_id: &Uuid) -> AppResult<Vec<MessageRecipient>> {
        let rows = sqlx::query(
            r#"
            SELECT id, message_id, contact_id, name, phone, status, error_message,
                   sent_at, delivered_at, created_at
            FROM message_recipients
            WHERE message_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(message_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_recipient).collect()
    }

    // ---------------------------------------------------------------------
    // Aggregates
    // ---------------------------------------------------------------------

    /// Sums over messages, optionally restricted to one sender and a
    /// `[since, until)` creation window.
    pub async fn message_totals(
        &self,
        user_id: Option<&Uuid>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> AppResult<MessageTotals> {
        let mut query_builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT COUNT(*) AS messages,
                   COALESCE(SUM(total_recipients), 0) AS recipients,
                   COALESCE(SUM(sent_count), 0) AS sent,
                   COALESCE(SUM(failed_count), 0) AS failed,
                   TOTAL(cost) AS cost
            FROM messages
            WHERE 1 = 1
            "#,
        );

        if let Some(user_id) = user_id {
            query_builder
                .push(" AND user_id = ")
                .push_bind(user_id.to_string());
        }
        if let Some(since) = since {
            query_builder.push(" AND created_at >= ").push_bind(since);
        }
        if let Some(until) = until {
            query_builder.push(" AND created_at < ").push_bind(until);
        }

        let row = query_builder.build().fetch_one(&self.pool).await?;

        Ok(MessageTotals {
            messages: row.try_get("messages")?,
            recipients: row.try_get("recipients")?,
            sent: row.try_get("sent")?,
            failed: row.try_get("failed")?,
            cost: row.try_get("cost")?,
        })
    }

    pub async fn count_active_senders(&self, since: DateTime<Utc>) -> AppResult<i64> {
        let count =
            sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM messages WHERE created_at >= ?")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn count_senders(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_pending_recipients(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM message_recipients WHERE status = ?")
            .bind(RecipientStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_messages(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_admin_messages(
        &self,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<AdminMessageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.content, m.status, m.cost, m.sent_count, m.failed_count, m.created_at,
                   u.name AS user_name, u.phone AS user_phone
            FROM messages m
            LEFT JOIN users u ON m.user_id = u.id
            ORDER BY m.created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AdminMessageRecord {
                    id: uuid_column(row, "id")?,
                    content: row.try_get("content")?,
                    status: enum_column(row, "status")?,
                    cost: row.try_get("cost")?,
                    sent_count: row.try_get("sent_count")?,
                    failed_count: row.try_get("failed_count")?,
                    created_at: row.try_get("created_at")?,
                    user_name: row.try_get("user_name")?,
                    user_phone: row.try_get("user_phone")?,
                })
            })
            .collect()
    }

    // ---------------------------------------------------------------------
    // App settings
    // ---------------------------------------------------------------------

    pub async fn get_app_settings(&self) -> AppResult<Option<AppSettings>> {
        let row = sqlx::query(
            r#"
            SELECT id, android_url, ios_url, enable_android, enable_ios, created_at, updated_at
            FROM app_settings
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_settings).transpose()
    }

    /// Updates the newest settings row, creating it when the table is empty.
    pub async fn save_app_settings(&self, downloads: &AppDownloads) -> AppResult<AppSettings> {
        let now = Utc::now();
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM app_settings ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        let id = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE app_settings
                    SET android_url = ?, ios_url = ?, enable_android = ?, enable_ios = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&downloads.android_url)
                .bind(&downloads.ios_url)
                .bind(downloads.enable_android)
                .bind(downloads.enable_ios)
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?;
                id
            }
            None => sqlx::query(
                r#"
                INSERT INTO app_settings (android_url, ios_url, enable_android, enable_ios, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&downloads.android_url)
            .bind(&downloads.ios_url)
            .bind(downloads.enable_android)
            .bind(downloads.enable_ios)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?
            .last_insert_rowid(),
        };

        let row = sqlx::query(
            r#"
            SELECT id, android_url, ios_url, enable_android, enable_ios, created_at, updated_at
            FROM app_settings
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        map_settings(&row)
    }
}

// -------------------------------------------------------------------------
// Row mapping
// -------------------------------------------------------------------------

fn uuid_column(row: &SqliteRow, column: &str) -> AppResult<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw)
        .map_err(|e| AppError::Internal(format!("Invalid UUID in column {}: {}", column, e)))
}

fn optional_uuid_column(row: &SqliteRow, column: &str) -> AppResult<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| {
        Uuid::parse_str(&value)
            .map_err(|e| AppError::Internal(format!("Invalid UUID in column {}: {}", column, e)))
    })
    .transpose()
}

fn enum_column<T: FromStr<Err = String>>(row: &SqliteRow, column: &str) -> AppResult<T> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(AppError::Internal)
}

fn map_user(row: &SqliteRow) -> AppResult<User> {
    Ok(User {
        id: uuid_column(row, "id")?,
        phone: row.try_get("phone")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_admin(row: &SqliteRow) -> AppResult<AdminUser> {
    Ok(AdminUser {
        id: uuid_column(row, "id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        role: enum_column(row, "role")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_contact(row: &SqliteRow) -> AppResult<Contact> {
    Ok(Contact {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        source: enum_column(row, "source")?,
        phone_hash: row.try_get("phone_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_group(row: &SqliteRow) -> AppResult<ContactGroup> {
    Ok(ContactGroup {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_message(row: &SqliteRow) -> AppResult<Message> {
    Ok(Message {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        content: row.try_get("content")?,
        sms_count: row.try_get("sms_count")?,
        total_recipients: row.try_get("total_recipients")?,
        sent_count: row.try_get("sent_count")?,
        failed_count: row.try_get("failed_count")?,
        status: enum_column(row, "status")?,
        cost: row.try_get("cost")?,
        payment_id: optional_uuid_column(row, "payment_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_recipient(row: &SqliteRow) -> AppResult<MessageRecipient> {
    Ok(MessageRecipient {
        id: uuid_column(row, "id")?,
        message_id: uuid_column(row, "message_id")?,
        contact_id: optional_uuid_column(row, "contact_id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        status: enum_column(row, "status")?,
        error_message: row.try_get("error_message")?,
        sent_at: row.try_get("sent_at")?,
        delivered_at: row.try_get("delivered_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_settings(row: &SqliteRow) -> AppResult<AppSettings> {
    Ok(AppSettings {
        id: row.try_get("id")?,
        android_url: row.try_get("android_url")?,
        ios_url: row.try_get("ios_url")?,
        enable_android: row.try_get("enable_android")?,
        enable_ios: row.try_get("enable_ios")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
