//! Outbound mail composition and the delivery seam.
//!
//! The core decides *when* a mail goes out and what it says; the actual
//! transport lives behind the [`Delivery`] trait.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SummarizeError;

/// One outbound mail, ready for transport.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

/// Transport seam: takes a composed mail and sends it.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(&self, request: &DeliveryRequest) -> Result<(), SummarizeError>;
}

/// Mail asking a reviewer to approve a generated summary.
pub fn approval_mail(
    reviewer: &str,
    approval_link: &str,
    attachments: Vec<PathBuf>,
) -> DeliveryRequest {
    DeliveryRequest {
        recipient: reviewer.to_string(),
        subject: "Summary ready for review".to_string(),
        body: format!(
            "A generated summary is attached for review.\n\n\
             Open the link below to approve it for delivery:\n\n{}",
            approval_link
        ),
        attachments,
    }
}

/// Mail delivering the approved summary to the requesting user.
pub fn summary_mail(recipient: &str, attachments: Vec<PathBuf>) -> DeliveryRequest {
    DeliveryRequest {
        recipient: recipient.to_string(),
        subject: "Your conversation summary".to_string(),
        body: "Hi,\n\n\
               The notes from your conversation are attached, along with the \
               transcript in case you want the full detail.\n\n\
               Thanks for using recap."
            .to_string(),
        attachments,
    }
}

/// Delivery double that records every mail instead of sending it.
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<Vec<DeliveryRequest>>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<DeliveryRequest> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send(&self, request: &DeliveryRequest) -> Result<(), SummarizeError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        Ok(())
    }
}
