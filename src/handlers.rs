use crate::auth::AuthService;
use crate::config::Config;
use crate::database::{Database, NewContact};
use crate::error::{AppError, AppResult};
use crate::messaging;
use crate::middleware::{AdminSession, AuthenticatedUser};
use crate::models::{
    AdminLoginRequest, AdminLoginResponse, AdminSummary, AppDownloads, AppSettings,
    AppSettingsPayload, BulkContactsRequest, Contact, ContactGroup, CreateContactRequest,
    GroupRequest, HealthResponse, PaginationParams, RegisterRequest, RegisterResponse,
    SendSmsRequest, SendSmsResponse, TestSmsRequest, TokenResponse, UpdateContactRequest,
    UserSummary, VerifyOtpRequest,
};
use crate::sms::SmsGateway;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthService,
    pub sms: Arc<dyn SmsGateway>,
    pub config: Arc<Config>,
}

type JsonBody<T> = Result<Json<T>, JsonRejection>;

pub async fn root() -> &'static str {
    "Bulk SMS App Backend API"
}

pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    state.db.health_check().await?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

// ---------------------------------------------------------------------
// Phone login
// ---------------------------------------------------------------------

pub async fn register(
    State(state): State<AppState>,
    payload: JsonBody<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    let Json(request) = payload?;
    let phone = required(request.phone.as_deref(), "Phone number is required")?;

    if let Some(user) = state.db.get_user_by_phone(phone).await? {
        let (token, _) = state.auth.issue_user_token(&user)?;
        info!("Returning user signed in: {}", phone);
        return Ok(Json(RegisterResponse {
            user_exists: true,
            token: Some(token),
            user: Some(UserSummary::from(&user)),
            message: None,
        }));
    }

    let code = state.auth.otp().issue(phone);
    let minutes = (state.config.otp_ttl_seconds / 60).max(1);
    let text = format!(
        "<#> Your BulkSMS Pro verification code is: {}\n\nThis code will expire in {} minutes.",
        code, minutes
    );

    if let Err(err) = state.sms.send(phone, &text).await {
        error!("OTP delivery to {} failed: {}", phone, err);
        state.auth.otp().discard(phone);
        return Err(AppError::Gateway(
            "Failed to send SMS. Please try again.".to_string(),
        ));
    }

    info!("OTP sent to {}", phone);
    Ok(Json(RegisterResponse {
        user_exists: false,
        token: None,
        user: None,
        message: Some("OTP sent to your phone".to_string()),
    }))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    payload: JsonBody<VerifyOtpRequest>,
) -> AppResult<Json<TokenResponse>> {
    let Json(request) = payload?;
    let (phone, otp) = match (
        non_blank(request.phone.as_deref()),
        non_blank(request.otp.as_deref()),
    ) {
        (Some(phone), Some(otp)) => (phone, otp),
        _ => {
            return Err(AppError::Validation(
                "Phone and OTP are required".to_string(),
            ))
        }
    };

    if !state.auth.otp().verify(phone, otp) {
        warn!("OTP mismatch for {}", phone);
        return Err(AppError::Validation("Invalid OTP".to_string()));
    }

    let user = match state.db.get_user_by_phone(phone).await? {
        Some(user) => user,
        None => {
            let name = non_blank(request.name.as_deref()).unwrap_or("User");
            let user = state.db.create_user(phone, name).await?;
            info!("Created user {} for {}", user.id, phone);
            user
        }
    };

    let (token, _) = state.auth.issue_user_token(&user)?;
    Ok(Json(TokenResponse {
        token,
        user: UserSummary::from(&user),
    }))
}

// ---------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------

pub async fn send_sms(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: JsonBody<SendSmsRequest>,
) -> AppResult<Json<SendSmsResponse>> {
    let Json(request) = payload?;

    let response = messaging::send_bulk(
        &state.db,
        state.sms.as_ref(),
        &caller.user_id,
        request.message.as_deref(),
        request.recipients.as_deref(),
        state.config.sms_unit_price,
    )
    .await?;

    Ok(Json(response))
}

// ---------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> AppResult<Json<Value>> {
    let contacts = state.db.list_contacts(&caller.user_id).await?;
    Ok(Json(json!({ "contacts": contacts })))
}

pub async fn create_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: JsonBody<CreateContactRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let new_contact = new_contact_from(&request)?;

    let hash = Contact::hash_phone(&new_contact.phone);
    if state
        .db
        .find_contact_by_hash(&caller.user_id, &hash)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Contact already exists".to_string()));
    }

    let contact = state.db.create_contact(&caller.user_id, &new_contact).await?;
    info!("Contact {} created for {}", contact.id, caller.user_id);

    Ok((StatusCode::CREATED, Json(json!({ "contact": contact }))))
}

pub async fn create_contacts_bulk(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: JsonBody<BulkContactsRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let entries = request
        .contacts
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("Contacts array is required".to_string()))?;

    let mut seen = state.db.contact_hashes(&caller.user_id).await?;
    let mut batch = Vec::new();
    let mut skipped = 0usize;

    for entry in &entries {
        let new_contact = new_contact_from(entry)?;
        if seen.insert(Contact::hash_phone(&new_contact.phone)) {
            batch.push(new_contact);
        } else {
            skipped += 1;
        }
    }

    let contacts = state
        .db
        .create_contacts_bulk(&caller.user_id, &batch)
        .await?;
    info!(
        "Bulk import for {}: {} created, {} skipped",
        caller.user_id,
        contacts.len(),
        skipped
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "contacts": contacts, "skipped": skipped })),
    ))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(contact_id): Path<String>,
    payload: JsonBody<UpdateContactRequest>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    let contact = owned_contact(&state, &caller, &contact_id).await?;

    let name = optional_field(request.name.as_deref(), "Name cannot be empty")?
        .unwrap_or(contact.name.as_str())
        .to_string();
    let phone = optional_field(request.phone.as_deref(), "Phone cannot be empty")?
        .unwrap_or(contact.phone.as_str())
        .to_string();

    let hash = Contact::hash_phone(&phone);
    if hash != contact.phone_hash {
        if let Some(other) = state.db.find_contact_by_hash(&caller.user_id, &hash).await? {
            if other.id != contact.id {
                return Err(AppError::Conflict("Contact already exists".to_string()));
            }
        }
    }

    let updated = state
        .db
        .update_contact(&contact.id, &name, &phone)
        .await?
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))?;

    Ok(Json(json!({ "contact": updated })))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(contact_id): Path<String>,
) -> AppResult<Json<Value>> {
    let contact = owned_contact(&state, &caller, &contact_id).await?;
    state.db.delete_contact(&contact.id).await?;
    info!("Contact {} deleted by {}", contact.id, caller.user_id);
    Ok(Json(json!({ "message": "Contact deleted successfully" })))
}

// ---------------------------------------------------------------------
// Contact groups
// ---------------------------------------------------------------------

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> AppResult<Json<Value>> {
    let groups = state.db.list_groups(&caller.user_id).await?;
    Ok(Json(json!({ "groups": groups })))
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: JsonBody<GroupRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let name = required(request.name.as_deref(), "Group name is required")?;
    let group = state.db.create_group(&caller.user_id, name).await?;
    Ok((StatusCode::CREATED, Json(json!({ "group": group }))))
}

pub async fn update_group(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(group_id): Path<String>,
    payload: JsonBody<GroupRequest>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    let group = owned_group(&state, &caller, &group_id).await?;
    let name = required(request.name.as_deref(), "Group name is required")?;

    let updated = state
        .db
        .rename_group(&group.id, name)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;
    Ok(Json(json!({ "group": updated })))
}

pub async fn delete_group(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let group = owned_group(&state, &caller, &group_id).await?;
    state.db.delete_group(&group.id).await?;
    Ok(Json(json!({ "message": "Group deleted successfully" })))
}

pub async fn list_group_contacts(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let group = owned_group(&state, &caller, &group_id).await?;
    let contacts = state.db.list_group_contacts(&group.id).await?;
    Ok(Json(json!({ "contacts": contacts })))
}

pub async fn add_group_member(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path((group_id, contact_id)): Path<(String, String)>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let group = owned_group(&state, &caller, &group_id).await?;
    let contact = owned_contact(&state, &caller, &contact_id).await?;

    let member = state.db.add_group_member(&group.id, &contact.id).await?;
    Ok((StatusCode::CREATED, Json(json!({ "member": member }))))
}

pub async fn remove_group_member(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path((group_id, contact_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let group = owned_group(&state, &caller, &group_id).await?;
    let contact = owned_contact(&state, &caller, &contact_id).await?;

    if !state.db.remove_group_member(&group.id, &contact.id).await? {
        return Err(AppError::NotFound(
            "Contact is not a member of this group".to_string(),
        ));
    }
    Ok(Json(json!({ "message": "Contact removed from group" })))
}

// ---------------------------------------------------------------------
// History and statistics
// ---------------------------------------------------------------------

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Value>> {
    let pagination = params.resolve();
    let messages = state
        .db
        .list_messages(&caller.user_id, pagination.limit, pagination.offset)
        .await?;
    Ok(Json(json!({ "messages": messages, "pagination": pagination })))
}

pub async fn get_message(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(message_id): Path<String>,
) -> AppResult<Json<Value>> {
    let message = state
        .db
        .get_message(&parse_id(&message_id, "Message not found")?)
        .await?
        .filter(|m| m.user_id == caller.user_id)
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    let recipients = state.db.list_recipients(&message.id).await?;
    Ok(Json(json!({ "message": message, "recipients": recipients })))
}

pub async fn statistics(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> AppResult<Json<Value>> {
    let user_id = &caller.user_id;
    let this_month = month_start(Utc::now())?;

    let all_time = state.db.message_totals(Some(user_id), None, None).await?;
    let month = state
        .db
        .message_totals(Some(user_id), Some(this_month), None)
        .await?;
    let before = state
        .db
        .message_totals(Some(user_id), None, Some(this_month))
        .await?;
    let total_contacts = state.db.count_contacts(user_id).await?;

    let delivery_rate = if all_time.recipients > 0 {
        round_to(all_time.sent as f64 / all_time.recipients as f64 * 100.0, 1)
    } else {
        0.0
    };
    let balance = (state.config.starting_balance - all_time.cost).max(0.0);

    Ok(Json(json!({
        "totalSent": all_time.sent,
        "deliveryRate": delivery_rate,
        "totalContacts": total_contacts,
        "totalCost": all_time.cost,
        "sentGrowth": growth_rate(month.sent, before.sent),
        "balance": balance,
        "currency": state.config.currency,
        "usdEquivalent": round_to(balance / state.config.usd_exchange_rate, 2),
        "thisMonth": { "sent": month.sent, "cost": month.cost },
        "allTime": {
            "messages": all_time.messages,
            "recipients": all_time.recipients,
            "failed": all_time.failed,
        },
    })))
}

// ---------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------

pub async fn admin_login(
    State(state): State<AppState>,
    payload: JsonBody<AdminLoginRequest>,
) -> AppResult<Json<AdminLoginResponse>> {
    let Json(request) = payload?;
    let (email, password) = match (
        non_blank(request.email.as_deref()),
        request.password.as_deref().filter(|p| !p.is_empty()),
    ) {
        (Some(email), Some(password)) => (email, password),
        _ => {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ))
        }
    };

    let admin = state.auth.authenticate_admin(email, password).await?;
    let (token, _) = state.auth.issue_admin_token(&admin)?;
    info!("Admin {} signed in", admin.email);

    Ok(Json(AdminLoginResponse {
        token,
        user: AdminSummary::from(&admin),
    }))
}

pub async fn admin_verify(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> AppResult<Json<Value>> {
    let admin = state
        .db
        .get_admin_by_id(&session.admin_id)
        .await?
        .ok_or_else(|| AppError::Auth("Admin account no longer exists".to_string()))?;
    Ok(Json(json!({ "user": AdminSummary::from(&admin) })))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(_session): Extension<AdminSession>,
) -> AppResult<Json<Value>> {
    let now = Utc::now();
    let this_month = month_start(now)?;
    let last_month = add_months(this_month, -1)?;

    let total_users = state.db.count_users().await?;
    let all_time = state.db.message_totals(None, None, None).await?;
    let active_users = state
        .db
        .count_active_senders(now - Duration::days(30))
        .await?;
    let pending = state.db.count_pending_recipients().await?;
    let current = state.db.message_totals(None, Some(this_month), None).await?;
    let previous = state
        .db
        .message_totals(None, Some(last_month), Some(this_month))
        .await?;

    Ok(Json(json!({
        "totalUsers": total_users,
        "totalMessages": all_time.messages,
        "totalRevenue": all_time.cost,
        "activeUsers": active_users,
        "pendingMessages": pending,
        "growthRate": growth_rate(current.messages, previous.messages),
        "monthlyRevenue": current.cost,
        "currency": state.config.currency,
    })))
}

pub async fn admin_users(
    State(state): State<AppState>,
    Extension(_session): Extension<AdminSession>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Value>> {
    let pagination = params.resolve();
    let users = state
        .db
        .list_users(pagination.limit, pagination.offset)
        .await?;
    let total = state.db.count_users().await?;

    Ok(Json(json!({
        "users": users,
        "pagination": page_block(pagination.page, pagination.limit, total),
    })))
}

pub async fn admin_messages(
    State(state): State<AppState>,
    Extension(_session): Extension<AdminSession>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Value>> {
    let pagination = params.resolve();
    let messages = state
        .db
        .list_admin_messages(pagination.limit, pagination.offset)
        .await?;
    let total = state.db.count_messages().await?;

    Ok(Json(json!({
        "messages": messages,
        "pagination": page_block(pagination.page, pagination.limit, total),
    })))
}

pub async fn admin_revenue(
    State(state): State<AppState>,
    Extension(_session): Extension<AdminSession>,
) -> AppResult<Json<Value>> {
    let window_start = add_months(month_start(Utc::now())?, -11)?;
    let recent = state.db.list_messages_since(window_start).await?;

    // month -> (messages, revenue, sent, failed)
    let mut months: BTreeMap<String, (i64, f64, i64, i64)> = BTreeMap::new();
    for message in &recent {
        let entry = months
            .entry(message.created_at.format("%Y-%m").to_string())
            .or_default();
        entry.0 += 1;
        entry.1 += message.cost;
        entry.2 += message.sent_count;
        entry.3 += message.failed_count;
    }

    let monthly: Vec<Value> = months
        .iter()
        .rev()
        .map(|(month, (count, revenue, sent, failed))| {
            json!({
                "month": month,
                "messageCount": count,
                "revenue": revenue,
                "totalSent": sent,
                "totalFailed": failed,
            })
        })
        .collect();

    let totals = state.db.message_totals(None, None, None).await?;
    let unique_users = state.db.count_senders().await?;
    let average = if unique_users > 0 {
        round_to(totals.cost / unique_users as f64, 2)
    } else {
        0.0
    };

    Ok(Json(json!({
        "monthlyRevenue": monthly,
        "totalStats": {
            "totalMessages": totals.messages,
            "totalRevenue": totals.cost,
            "totalSent": totals.sent,
            "totalFailed": totals.failed,
            "uniqueUsers": unique_users,
            "averageRevenuePerUser": average,
        },
    })))
}

pub async fn get_app_settings(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let settings = state
        .db
        .get_app_settings()
        .await?
        .unwrap_or_else(AppSettings::defaults);
    Ok(Json(json!({ "appDownloads": AppDownloads::from(&settings) })))
}

pub async fn update_app_settings(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    payload: JsonBody<AppSettingsPayload>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    let downloads = request
        .app_downloads
        .ok_or_else(|| AppError::Validation("appDownloads is required".to_string()))?;

    validate_download_url(downloads.enable_android, &downloads.android_url, "Android")?;
    validate_download_url(downloads.enable_ios, &downloads.ios_url, "iOS")?;

    let saved = state.db.save_app_settings(&downloads).await?;
    info!("App settings updated by admin {}", session.admin_id);

    Ok(Json(json!({
        "message": "App settings updated successfully",
        "appDownloads": AppDownloads::from(&saved),
    })))
}

pub async fn admin_test_sms(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    payload: JsonBody<TestSmsRequest>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    let (phone, message) = match (
        non_blank(request.phone.as_deref()),
        non_blank(request.message.as_deref()),
    ) {
        (Some(phone), Some(message)) => (phone, message),
        _ => {
            return Err(AppError::Validation(
                "Phone and message are required".to_string(),
            ))
        }
    };

    info!("Admin {} sending test SMS to {}", session.admin_id, phone);
    let receipt = state.sms.send(phone, message).await?;
    Ok(Json(json!({ "success": true, "result": receipt })))
}

// ---------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: Option<&'a str>, message: &str) -> AppResult<&'a str> {
    non_blank(value).ok_or_else(|| AppError::Validation(message.to_string()))
}

/// `None` keeps the current value; a blank value is rejected.
fn optional_field<'a>(value: Option<&'a str>, message: &str) -> AppResult<Option<&'a str>> {
    match value {
        None => Ok(None),
        Some(raw) => required(Some(raw), message).map(Some),
    }
}

fn new_contact_from(request: &CreateContactRequest) -> AppResult<NewContact> {
    match (
        non_blank(request.name.as_deref()),
        non_blank(request.phone.as_deref()),
    ) {
        (Some(name), Some(phone)) => Ok(NewContact {
            name: name.to_string(),
            phone: phone.to_string(),
            source: request.source.unwrap_or_default(),
        }),
        _ => Err(AppError::Validation(
            "Name and phone are required".to_string(),
        )),
    }
}

/// Malformed ids are reported like missing ones.
fn parse_id(raw: &str, not_found: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(not_found.to_string()))
}

async fn owned_contact(
    state: &AppState,
    caller: &AuthenticatedUser,
    raw_id: &str,
) -> AppResult<Contact> {
    let id = parse_id(raw_id, "Contact not found")?;
    state
        .db
        .get_contact(&id)
        .await?
        .filter(|c| c.user_id == caller.user_id)
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))
}

async fn owned_group(
    state: &AppState,
    caller: &AuthenticatedUser,
    raw_id: &str,
) -> AppResult<ContactGroup> {
    let id = parse_id(raw_id, "Group not found")?;
    state
        .db
        .get_group(&id)
        .await?
        .filter(|g| g.user_id == caller.user_id)
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))
}

fn validate_download_url(enabled: bool, url: &str, platform: &str) -> AppResult<()> {
    if !enabled {
        return Ok(());
    }
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "A valid {} download URL is required when {} downloads are enabled",
            platform, platform
        )))
    }
}

fn page_block(page: i64, limit: i64, total: i64) -> Value {
    let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
    json!({ "page": page, "limit": limit, "total": total, "pages": pages })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Percentage change from `previous` to `current`, one decimal. Zero when
/// there is no baseline.
fn growth_rate(current: i64, previous: i64) -> f64 {
    if previous > 0 {
        round_to((current - previous) as f64 / previous as f64 * 100.0, 1)
    } else {
        0.0
    }
}

fn month_start(at: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    first_of_month(at.year(), at.month())
}

fn add_months(start: DateTime<Utc>, months: i32) -> AppResult<DateTime<Utc>> {
    let index = start.year() * 12 + start.month0() as i32 + months;
    first_of_month(index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn first_of_month(year: i32, month: u32) -> AppResult<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AppError::Internal(format!("Invalid month {}-{}", year, month)))?;
    Ok(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_arithmetic_crosses_years() {
        let march = Utc.with_ymd_and_hms(2024, 3, 17, 10, 30, 0).unwrap();
        let start = month_start(march).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(
            add_months(start, -3).unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            add_months(start, -11).unwrap(),
            Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            add_months(start, 10).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn growth_handles_empty_baseline() {
        assert_eq!(growth_rate(0, 0), 0.0);
        assert_eq!(growth_rate(5, 0), 0.0);
        assert_eq!(growth_rate(3, 2), 50.0);
        assert_eq!(growth_rate(1, 3), -66.7);
    }

    #[test]
    fn download_urls_checked_only_when_enabled() {
        assert!(validate_download_url(false, "", "Android").is_ok());
        assert!(validate_download_url(true, "https://example.com/app", "Android").is_ok());
        assert!(validate_download_url(true, "ftp://example.com", "iOS").is_err());
        assert!(validate_download_url(true, "  ", "iOS").is_err());
    }

    #[test]
    fn page_block_rounds_pages_up() {
        assert_eq!(page_block(1, 20, 41)["pages"], 3);
        assert_eq!(page_block(1, 20, 0)["pages"], 0);
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(required(Some("  "), "x").is_err());
        assert_eq!(required(Some(" a "), "x").unwrap(), "a");
        assert_eq!(optional_field(None, "x").unwrap(), None);
        assert!(optional_field(Some(""), "x").is_err());
    }
}
