/*!
 * SMS gateway
 *
 * `SmsGateway` is the seam between the send workflow and the provider.
 * `AfricasTalkingClient` talks to the Africa's Talking bulk messaging API,
 * one phone number per request.
 */

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsReceipt {
    pub status: String,
    pub number: Option<String>,
    pub message_id: Option<String>,
    pub cost: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("SMS gateway unreachable: {0}")]
    Transport(String),

    #[error("SMS gateway returned HTTP {0}")]
    Http(u16),

    #[error("SMS rejected: {0}")]
    Rejected(String),

    #[error("No recipients in response")]
    NoRecipients,

    #[error("Invalid response format")]
    InvalidResponse,

    #[error("Invalid phone number")]
    InvalidPhone,
}

impl GatewayError {
    /// Detail stored against a failed recipient, without the wrapper text.
    pub fn reason(&self) -> String {
        match self {
            GatewayError::Rejected(status) => status.clone(),
            other => other.to_string(),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err.to_string())
    }
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<SmsReceipt, GatewayError>;
}

/// Trims and prefixes `default_country_code` unless the number already
/// starts with `+`.
pub fn normalize_phone(phone: &str, default_country_code: &str) -> Result<String, GatewayError> {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidPhone);
    }
    if trimmed.starts_with('+') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}{}", default_country_code, trimmed))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkSendRequest<'a> {
    username: &'a str,
    message: &'a str,
    phone_numbers: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct BulkSendResponse {
    #[serde(rename = "SMSMessageData")]
    sms_message_data: Option<SmsMessageData>,
}

#[derive(Debug, Deserialize)]
struct SmsMessageData {
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "Recipients")]
    recipients: Option<Vec<GatewayRecipient>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayRecipient {
    status: Option<String>,
    status_code: Option<i64>,
    number: Option<String>,
    cost: Option<String>,
    message_id: Option<String>,
}

/// Turns a gateway reply into a receipt or an error. Only the first
/// recipient entry is considered; requests carry a single number.
pub fn interpret_response(http_status: u16, body: &str) -> Result<SmsReceipt, GatewayError> {
    let success = (200..300).contains(&http_status);

    let parsed: BulkSendResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) if success => return Err(GatewayError::InvalidResponse),
        Err(_) => return Err(GatewayError::Http(http_status)),
    };

    let first = parsed
        .sms_message_data
        .as_ref()
        .and_then(|data| data.recipients.as_ref())
        .and_then(|recipients| recipients.first());

    if !success {
        return match first.and_then(|r| r.status.clone()) {
            Some(status) => Err(GatewayError::Rejected(status)),
            None => Err(GatewayError::Http(http_status)),
        };
    }

    let data = parsed
        .sms_message_data
        .as_ref()
        .ok_or(GatewayError::InvalidResponse)?;
    if let Some(summary) = &data.message {
        debug!("Gateway summary: {}", summary);
    }
    let recipient = first.ok_or(GatewayError::NoRecipients)?;
    let status = recipient.status.clone().unwrap_or_default();

    if status.eq_ignore_ascii_case("success") {
        Ok(SmsReceipt {
            status,
            number: recipient.number.clone(),
            message_id: recipient.message_id.clone(),
            cost: recipient.cost.clone(),
        })
    } else {
        if let Some(code) = recipient.status_code {
            debug!("Gateway status code {} for {}", code, status);
        }
        Err(GatewayError::Rejected(status))
    }
}

#[derive(Clone)]
pub struct AfricasTalkingClient {
    client: Client,
    username: String,
    api_key: String,
    base_url: String,
    default_country_code: String,
}

impl AfricasTalkingClient {
    pub fn new(
        username: String,
        api_key: String,
        base_url: String,
        default_country_code: String,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            username,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_country_code,
        })
    }
}

#[async_trait]
impl SmsGateway for AfricasTalkingClient {
    async fn send(&self, phone: &str, message: &str) -> Result<SmsReceipt, GatewayError> {
        let phone = normalize_phone(phone, &self.default_country_code)?;
        let url = format!("{}/version1/messaging/bulk", self.base_url);

        let request_body = BulkSendRequest {
            username: &self.username,
            message,
            phone_numbers: vec![phone.as_str()],
        };

        info!("Sending SMS to {}", phone);
        debug!("Message length: {} characters", message.chars().count());

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .header("apiKey", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!("SMS request to {} failed: {}", phone, e);
                GatewayError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read gateway response for {}: {}", phone, e);
            GatewayError::Transport(e.to_string())
        })?;

        match interpret_response(status, &body) {
            Ok(receipt) => {
                info!("SMS accepted for {}", phone);
                Ok(receipt)
            }
            Err(err) => {
                warn!("SMS to {} not accepted: {}", phone, err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_numbers_get_country_code() {
        assert_eq!(
            normalize_phone(" 788123456 ", "+250").unwrap(),
            "+250788123456"
        );
        assert_eq!(
            normalize_phone("+254700000000", "+250").unwrap(),
            "+254700000000"
        );
        assert_eq!(normalize_phone("   ", "+250"), Err(GatewayError::InvalidPhone));
    }

    #[test]
    fn success_status_is_case_insensitive() {
        let body = r#"{"SMSMessageData":{"Message":"Sent to 1/1 Total Cost: RWF 15",
            "Recipients":[{"statusCode":101,"number":"+250788123456","status":"Success",
            "cost":"RWF 15.0000","messageId":"ATXid_1"}]}}"#;

        let receipt = interpret_response(201, body).unwrap();
        assert_eq!(receipt.message_id.as_deref(), Some("ATXid_1"));
        assert_eq!(receipt.cost.as_deref(), Some("RWF 15.0000"));
        assert_eq!(receipt.number.as_deref(), Some("+250788123456"));
    }

    #[test]
    fn other_status_is_a_rejection() {
        let body = r#"{"SMSMessageData":{"Message":"Sent to 0/1",
            "Recipients":[{"statusCode":403,"number":"+250788123456","status":"InvalidPhoneNumber",
            "cost":"0","messageId":"None"}]}}"#;

        let err = interpret_response(201, body).unwrap_err();
        assert_eq!(err, GatewayError::Rejected("InvalidPhoneNumber".to_string()));
        assert_eq!(err.reason(), "InvalidPhoneNumber");
        assert_eq!(err.to_string(), "SMS rejected: InvalidPhoneNumber");
    }

    #[test]
    fn missing_recipients_and_envelope() {
        let no_recipients = r#"{"SMSMessageData":{"Message":"InvalidSenderId"}}"#;
        assert_eq!(
            interpret_response(200, no_recipients),
            Err(GatewayError::NoRecipients)
        );

        let empty = r#"{"SMSMessageData":{"Recipients":[]}}"#;
        assert_eq!(interpret_response(200, empty), Err(GatewayError::NoRecipients));

        assert_eq!(
            interpret_response(200, r#"{"unexpected":true}"#),
            Err(GatewayError::InvalidResponse)
        );
        assert_eq!(
            interpret_response(200, "not json"),
            Err(GatewayError::InvalidResponse)
        );
    }

    #[test]
    fn http_errors_prefer_recipient_status() {
        let body = r#"{"SMSMessageData":{"Recipients":[{"status":"InsufficientBalance"}]}}"#;
        assert_eq!(
            interpret_response(400, body),
            Err(GatewayError::Rejected("InsufficientBalance".to_string()))
        );
        assert_eq!(
            interpret_response(401, "The supplied authentication is invalid"),
            Err(GatewayError::Http(401))
        );
        assert_eq!(GatewayError::Http(401).reason(), "SMS gateway returned HTTP 401");
    }
}
