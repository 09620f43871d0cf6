/// Outbound notifications
///
/// The credential core only needs to hand a message to someone who will
/// deliver it (activation codes today). Delivery itself (SMTP, a mail API)
/// sits behind [`Notifier`].
///
/// - [`TracingNotifier`] writes the message to the log (local development)
/// - [`MemoryNotifier`] keeps an outbox that tests can read back

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Message delivery contract
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `body` with `subject` to `destination` (an email address)
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Logs notifications instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(destination, subject, body, "Notification (not delivered)");
        Ok(())
    }
}

/// Delivered message captured by [`MemoryNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: String,
    pub subject: String,
    pub body: String,
}

/// Collects notifications in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    outbox: Mutex<Vec<SentMessage>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.outbox.lock().await.clone()
    }

    /// Most recent message for a destination
    pub async fn last_to(&self, destination: &str) -> Option<SentMessage> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.destination == destination)
            .cloned()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.outbox.lock().await.push(SentMessage {
            destination: destination.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Activation message carrying the confirmation code
pub fn activation_message(name: &str, code: &str, ttl_minutes: i64) -> (String, String) {
    let subject = "Activate your account".to_string();
    let body = format!(
        "Hello {},\n\nYour activation code is {}. It expires in {} minutes.\n",
        name, code, ttl_minutes
    );
    (subject, body)
}

/// Extracts a 4-digit code from a message body
pub fn extract_code(body: &str) -> Option<String> {
    body.split(|c: char| !c.is_ascii_digit())
        .find(|chunk| chunk.len() == 4)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_notifier_outbox() {
        let notifier = MemoryNotifier::new();
        notifier.send("a@x.io", "s1", "b1").await.unwrap();
        notifier.send("b@x.io", "s2", "b2").await.unwrap();
        notifier.send("a@x.io", "s3", "b3").await.unwrap();

        assert_eq!(notifier.sent().await.len(), 3);
        assert_eq!(notifier.last_to("a@x.io").await.unwrap().subject, "s3");
        assert!(notifier.last_to("c@x.io").await.is_none());
    }

    #[test]
    fn test_activation_message_contains_code() {
        let (subject, body) = activation_message("A", "4821", 5);
        assert!(subject.contains("Activate"));
        assert!(body.contains("4821"));
        assert_eq!(extract_code(&body).as_deref(), Some("4821"));
    }
}
