use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------
// Enumerations stored as TEXT
// ---------------------------------------------------------------------

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} value: {}", stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    Phonebook,
    #[default]
    Manual,
    ImportedFile,
}

string_enum!(ContactSource {
    Phonebook => "phonebook",
    Manual => "manual",
    ImportedFile => "imported_file",
});

/// Aggregate state of a bulk send. Only `Sending` is written directly;
/// the terminal states are derived from recipient outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sending,
    Completed,
    Failed,
    Partial,
}

string_enum!(MessageStatus {
    Pending => "pending",
    Sending => "sending",
    Completed => "completed",
    Failed => "failed",
    Partial => "partial",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

string_enum!(RecipientStatus {
    Pending => "pending",
    Sent => "sent",
    Delivered => "delivered",
    Failed => "failed",
});

/// Role claim carried in every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

string_enum!(Role {
    User => "user",
    Admin => "admin",
    SuperAdmin => "super_admin",
});

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

// ---------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    pub source: ContactSource,
    #[serde(rename = "hashPhone")]
    pub phone_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Dedup checksum: 32-bit wrapping `h * 31 + unit` over the UTF-16 units.
    /// Not a security hash.
    pub fn hash_phone(phone: &str) -> String {
        phone
            .encode_utf16()
            .fold(0i32, |hash, unit| {
                hash.wrapping_shl(5)
                    .wrapping_sub(hash)
                    .wrapping_add(unit as i32)
            })
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactGroup {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactGroupMember {
    pub id: Uuid,
    pub group_id: Uuid,
    pub contact_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub sms_count: i64,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub status: MessageStatus,
    pub cost: f64,
    pub payment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecipient {
    pub id: Uuid,
    pub message_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub name: String,
    pub phone: String,
    pub status: RecipientStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_ANDROID_URL: &str =
    "https://play.google.com/store/apps/details?id=com.bulksmspro.app";
pub const DEFAULT_IOS_URL: &str = "https://apps.apple.com/app/bulksmspro/id123456789";

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub id: i64,
    pub android_url: String,
    pub ios_url: String,
    pub enable_android: bool,
    pub enable_ios: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppSettings {
    /// Used whenever the table holds no row yet.
    pub fn defaults() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            android_url: DEFAULT_ANDROID_URL.to_string(),
            ios_url: DEFAULT_IOS_URL.to_string(),
            enable_android: true,
            enable_ios: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Message row joined with its sender, for the admin listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminMessageRecord {
    pub id: Uuid,
    pub content: String,
    pub status: MessageStatus,
    pub cost: f64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub user_phone: Option<String>,
}

/// Per-user totals over all messages, or over a time window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageTotals {
    pub messages: i64,
    pub recipients: i64,
    pub sent: i64,
    pub failed: i64,
    pub cost: f64,
}

// ---------------------------------------------------------------------
// Auth payloads
// ---------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub phone: Option<String>,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: Option<String>,
    pub otp: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<&AdminUser> for AdminSummary {
    fn from(admin: &AdminUser) -> Self {
        Self {
            id: admin.id,
            email: admin.email.clone(),
            name: admin.name.clone(),
            role: admin.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminLoginResponse {
    pub token: String,
    pub user: AdminSummary,
}

// ---------------------------------------------------------------------
// Bulk send payloads
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientInput {
    #[serde(default)]
    pub name: String,
    pub phone: String,
    pub contact_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendSmsRequest {
    pub message: Option<String>,
    pub recipients: Option<Vec<RecipientInput>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientSuccess {
    pub phone: String,
    pub name: String,
    pub status: RecipientStatus,
    pub message_id: Option<String>,
    pub cost: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientFailure {
    pub phone: String,
    pub name: String,
    pub status: RecipientStatus,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsResponse {
    pub success: bool,
    pub message_id: Uuid,
    pub total_recipients: i64,
    pub sent: i64,
    pub failed: i64,
    pub cost: f64,
    pub results: Vec<RecipientSuccess>,
    pub errors: Vec<RecipientFailure>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TestSmsRequest {
    pub phone: Option<String>,
    pub message: Option<String>,
}

// ---------------------------------------------------------------------
// Contact payloads
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContactRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub source: Option<ContactSource>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkContactsRequest {
    pub contacts: Option<Vec<CreateContactRequest>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateContactRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupRequest {
    pub name: Option<String>,
}

// ---------------------------------------------------------------------
// App settings payloads
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppDownloads {
    #[serde(default)]
    pub android_url: String,
    #[serde(default)]
    pub ios_url: String,
    #[serde(default)]
    pub enable_android: bool,
    #[serde(default)]
    pub enable_ios: bool,
}

impl From<&AppSettings> for AppDownloads {
    fn from(settings: &AppSettings) -> Self {
        Self {
            android_url: settings.android_url.clone(),
            ios_url: settings.ios_url.clone(),
            enable_android: settings.enable_android,
            enable_ios: settings.enable_ios,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettingsPayload {
    pub app_downloads: Option<AppDownloads>,
}

// ---------------------------------------------------------------------
// Listing helpers
// ---------------------------------------------------------------------

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Raw `?page=&limit=` values. Anything unparsable or below 1 falls back to
/// the defaults rather than failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl PaginationParams {
    pub fn resolve(&self) -> Pagination {
        let parse = |raw: &Option<String>| {
            raw.as_deref()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v >= 1)
        };
        let page = parse(&self.page).unwrap_or(1);
        let limit = parse(&self.limit)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Pagination {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_phone_matches_java_style_string_hash() {
        assert_eq!(Contact::hash_phone(""), "0");
        assert_eq!(Contact::hash_phone("1"), "49");
        assert_eq!(Contact::hash_phone("12"), (49 * 31 + 50).to_string());
        // Long inputs wrap instead of overflowing.
        let hashed = Contact::hash_phone("+250788123456789012345");
        assert!(hashed.parse::<i32>().is_ok());
    }

    #[test]
    fn enums_round_trip_through_text() {
        for status in [
            MessageStatus::Pending,
            MessageStatus::Sending,
            MessageStatus::Completed,
            MessageStatus::Failed,
            MessageStatus::Partial,
        ] {
            assert_eq!(status.as_str().parse::<MessageStatus>().unwrap(), status);
        }
        assert_eq!(
            "imported_file".parse::<ContactSource>().unwrap(),
            ContactSource::ImportedFile
        );
        assert!("bogus".parse::<RecipientStatus>().is_err());
    }

    #[test]
    fn only_admin_roles_are_admin() {
        assert!(!Role::User.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(Role::SuperAdmin.is_admin());
    }

    #[test]
    fn pagination_computes_offset() {
        let params = PaginationParams {
            page: Some("2".into()),
            limit: Some("20".into()),
        };
        assert_eq!(
            params.resolve(),
            Pagination {
                page: 2,
                limit: 20,
                offset: 20
            }
        );
    }

    #[test]
    fn pagination_falls_back_on_bad_input() {
        let params = PaginationParams {
            page: Some("zero".into()),
            limit: Some("-5".into()),
        };
        assert_eq!(
            params.resolve(),
            Pagination {
                page: 1,
                limit: DEFAULT_PAGE_SIZE,
                offset: 0
            }
        );

        let capped = PaginationParams {
            page: None,
            limit: Some("5000".into()),
        };
        assert_eq!(capped.resolve().limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn pagination_offset_saturates_on_huge_page() {
        let params = PaginationParams {
            page: Some(i64::MAX.to_string()),
            limit: Some("20".into()),
        };
        let resolved = params.resolve();
        assert_eq!(resolved.page, i64::MAX);
        assert_eq!(resolved.offset, i64::MAX);
    }
}
