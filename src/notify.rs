// src/notify.rs

//! Notification collaborator interface.
//!
//! A job sends exactly one notification, at completion, and only when an
//! email-style target was configured. Actual delivery (SMTP, sendmail,
//! chat webhook, ...) lives behind [`Notifier`]; the binary wires a
//! [`StdoutNotifier`] by default.

use anyhow::Result;
use tracing::info;

/// Delivers a completion report to a recipient.
pub trait Notifier {
    fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<()>;
}

/// Prints the report instead of delivering it.
#[derive(Debug, Default)]
pub struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        info!(recipient, "notification not delivered, printing report");
        println!("To: {recipient}");
        println!("Subject: {subject}");
        println!();
        println!("{body}");
        Ok(())
    }
}
