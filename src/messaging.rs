/*!
 * Bulk send workflow
 *
 * Persists the message and its pending recipients, dispatches to the
 * gateway one recipient at a time in input order, records each outcome and
 * derives the final message status from the counts. A recipient failure
 * never aborts the batch.
 */

use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    MessageStatus, RecipientFailure, RecipientInput, RecipientStatus, RecipientSuccess,
    SendSmsResponse,
};
use crate::sms::SmsGateway;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

pub const SMS_SEGMENT_LENGTH: usize = 160;

/// Number of SMS segments billed for `message`, at least one.
pub fn sms_count(message: &str) -> i64 {
    let length = message.chars().count();
    length.div_ceil(SMS_SEGMENT_LENGTH).max(1) as i64
}

pub fn message_cost(recipients: usize, sms_count: i64, unit_price: f64) -> f64 {
    recipients as f64 * sms_count as f64 * unit_price
}

pub fn final_status(sent: i64, failed: i64) -> MessageStatus {
    if failed == 0 {
        MessageStatus::Completed
    } else if sent == 0 {
        MessageStatus::Failed
    } else {
        MessageStatus::Partial
    }
}

pub async fn send_bulk(
    db: &Database,
    gateway: &dyn SmsGateway,
    user_id: &Uuid,
    message: Option<&str>,
    recipients: Option<&[RecipientInput]>,
    unit_price: f64,
) -> AppResult<SendSmsResponse> {
    let message = message.filter(|m| !m.trim().is_empty());
    let recipients = recipients.filter(|r| !r.is_empty());
    let (message, recipients) = match (message, recipients) {
        (Some(message), Some(recipients)) => (message, recipients),
        _ => {
            return Err(AppError::Validation(
                "Message and recipients are required".to_string(),
            ))
        }
    };

    let segments = sms_count(message);
    let cost = message_cost(recipients.len(), segments, unit_price);

    let (record, rows) = db
        .create_message_with_recipients(user_id, message, segments, cost, recipients)
        .await?;

    info!(
        "Message {} created: {} recipients, {} segment(s), cost {}",
        record.id,
        rows.len(),
        segments,
        cost
    );

    let mut sent = 0i64;
    let mut failed = 0i64;
    let mut results = Vec::new();
    let mut errors = Vec::new();

    for row in &rows {
        match gateway.send(&row.phone, message).await {
            Ok(receipt) => {
                db.mark_recipient_sent(&row.id, Utc::now()).await?;
                sent += 1;
                results.push(RecipientSuccess {
                    phone: row.phone.clone(),
                    name: row.name.clone(),
                    status: RecipientStatus::Sent,
                    message_id: receipt.message_id,
                    cost: receipt.cost,
                });
            }
            Err(err) => {
                let reason = err.reason();
                warn!("Recipient {} of message {} failed: {}", row.phone, record.id, reason);
                db.mark_recipient_failed(&row.id, &reason).await?;
                failed += 1;
                errors.push(RecipientFailure {
                    phone: row.phone.clone(),
                    name: row.name.clone(),
                    status: RecipientStatus::Failed,
                    error: reason,
                });
            }
        }
    }

    let status = final_status(sent, failed);
    db.finish_message(&record.id, status, sent, failed).await?;

    info!(
        "Message {} finished as {}: {} sent, {} failed",
        record.id, status, sent, failed
    );

    Ok(SendSmsResponse {
        success: true,
        message_id: record.id,
        total_recipients: record.total_recipients,
        sent,
        failed,
        cost,
        results,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_round_up_with_minimum_one() {
        assert_eq!(sms_count(""), 1);
        assert_eq!(sms_count("hi"), 1);
        assert_eq!(sms_count(&"a".repeat(160)), 1);
        assert_eq!(sms_count(&"a".repeat(161)), 2);
        assert_eq!(sms_count(&"a".repeat(321)), 3);
    }

    #[test]
    fn segments_count_characters_not_bytes() {
        assert_eq!(sms_count(&"é".repeat(160)), 1);
    }

    #[test]
    fn cost_scales_with_recipients_and_segments() {
        assert_eq!(message_cost(3, 2, 15.0), 90.0);
        assert_eq!(message_cost(1, 1, 15.0), 15.0);
    }

    #[test]
    fn status_follows_counts() {
        assert_eq!(final_status(3, 0), MessageStatus::Completed);
        assert_eq!(final_status(0, 3), MessageStatus::Failed);
        assert_eq!(final_status(2, 1), MessageStatus::Partial);
    }
}
