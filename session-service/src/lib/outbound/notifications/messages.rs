use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::principal::models::EmailAddress;

/// Serializable envelope for mailer requests.
///
/// The mailer renders the template and builds the link from `token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "notification_type", rename_all = "snake_case")]
pub enum NotificationMessage {
    EmailVerification(MailRequest),
    PasswordReset(MailRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailRequest {
    pub message_id: String,
    pub to: String,
    pub name: String,
    pub token: String,
    pub requested_at: DateTime<Utc>,
}

impl MailRequest {
    pub fn new(to: &EmailAddress, name: &str, token: &str) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            to: to.as_str().to_string(),
            name: name.to_string(),
            token: token.to_string(),
            requested_at: Utc::now(),
        }
    }
}

impl NotificationMessage {
    /// Recipient address, used as the partition key.
    pub fn recipient(&self) -> &str {
        match self {
            NotificationMessage::EmailVerification(request)
            | NotificationMessage::PasswordReset(request) => &request.to,
        }
    }
}
