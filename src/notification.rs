//! Best-effort notifications about accepted answer sheets.
//!
//! Submissions only enqueue; a background worker delivers. Delivery failures
//! are logged and dropped, and never affect the submission.

use std::sync::Arc;

use aws_sdk_sns::Client as SnsClient;
use chrono::{DateTime, Utc};
use rocket::tokio::sync::mpsc::{self, error::TrySendError};
use thiserror::Error;

use crate::model::{common::survey::SurveyId, mongodb::Id};

/// An accepted answer sheet worth telling the survey owner about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseNotification {
    pub survey_id: SurveyId,
    pub survey_title: String,
    pub answer_sheet_id: Id,
    pub submitted_at: DateTime<Utc>,
}

impl ResponseNotification {
    pub fn subject(&self) -> String {
        format!("New response to \"{}\"", self.survey_title)
    }

    pub fn message(&self) -> String {
        format!(
            "Survey {} received answer sheet {} at {}.",
            self.survey_id,
            self.answer_sheet_id,
            self.submitted_at.to_rfc3339()
        )
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to publish notification: {0}")]
    Publish(String),
}

/// Somewhere notifications can be delivered.
#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &ResponseNotification) -> Result<(), NotifyError>;
}

/// Publishes notifications to an Amazon SNS topic.
pub struct SnsNotifier {
    client: SnsClient,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: SnsClient, topic_arn: String) -> Self {
        Self { client, topic_arn }
    }
}

#[rocket::async_trait]
impl Notifier for SnsNotifier {
    async fn notify(&self, notification: &ResponseNotification) -> Result<(), NotifyError> {
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(notification.subject())
            .message(notification.message())
            .send()
            .await
            .map_err(|err| NotifyError::Publish(err.to_string()))?;
        Ok(())
    }
}

/// Sending half of the notification queue.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<ResponseNotification>,
}

impl NotificationQueue {
    /// Start a worker delivering to `notifier` and return its queue.
    ///
    /// Must be called from within a Tokio runtime. The worker stops once every
    /// queue handle has been dropped.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<ResponseNotification>(capacity.max(1));
        rocket::tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                match notifier.notify(&notification).await {
                    Ok(()) => debug!(
                        "Notified about answer sheet {}",
                        notification.answer_sheet_id
                    ),
                    Err(err) => error!(
                        "Dropping notification about answer sheet {}: {err}",
                        notification.answer_sheet_id
                    ),
                }
            }
            debug!("Notification worker stopped");
        });
        Self { sender }
    }

    /// Queue a notification without waiting. Returns whether it was queued.
    pub fn enqueue(&self, notification: ResponseNotification) -> bool {
        match self.sender.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(notification)) => {
                warn!(
                    "Notification queue full, dropping notification about answer sheet {}",
                    notification.answer_sheet_id
                );
                false
            }
            Err(TrySendError::Closed(notification)) => {
                error!(
                    "Notification worker gone, dropping notification about answer sheet {}",
                    notification.answer_sheet_id
                );
                false
            }
        }
    }
}
