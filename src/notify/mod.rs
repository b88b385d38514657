//! Outbound email notifications.
//!
//! Ticket mutations never send mail inline: handlers emit a [`TicketEvent`]
//! after their transaction commits, and a consumer task owned by
//! [`spawn`] performs delivery. A failed or slow SMTP server therefore
//! cannot stall or roll back a ticket mutation. Per-recipient failures are
//! logged as warnings and never propagate.

pub mod templates;

use diesel::prelude::*;
use diesel::PgConnection;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, Message, SmtpTransport,
    Transport,
};
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::auth::scope::roles;
use crate::config::EmailConfig;
use crate::settings;
use crate::shared::models::{Branch, Ticket, User};
use crate::shared::schema::{branches, users};
use crate::shared::utils::DbPool;
use templates::EmailContent;

#[derive(Debug, Clone)]
pub enum TicketEvent {
    Created {
        ticket: Ticket,
    },
    StatusChanged {
        ticket: Ticket,
        old_status: String,
        new_status: String,
    },
    Assigned {
        ticket: Ticket,
        assignee_id: i64,
    },
}

impl TicketEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::StatusChanged { .. } => "status_changed",
            Self::Assigned { .. } => "assigned",
        }
    }
}

/// Delivery attempts and backoff delays (seconds) between them.
pub fn delivery_policy(event: &TicketEvent) -> (usize, &'static [u64]) {
    match event {
        TicketEvent::StatusChanged { .. } => (3, &[60, 300]),
        TicketEvent::Created { .. } | TicketEvent::Assigned { .. } => (1, &[]),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub email: String,
}

impl Recipient {
    fn from_user(user: &User) -> Self {
        Self {
            user_id: Some(user.id),
            name: Some(user.name.clone()),
            email: user.email.clone(),
        }
    }

    fn direct(email: &str) -> Self {
        Self {
            user_id: None,
            name: None,
            email: email.to_string(),
        }
    }
}

/// Drop duplicate recipients: by user identity where known, by address for
/// synthetic entries. Order is preserved.
pub fn dedup_recipients(recipients: Vec<Recipient>) -> Vec<Recipient> {
    let mut seen_users = std::collections::HashSet::new();
    let mut seen_emails = std::collections::HashSet::new();
    recipients
        .into_iter()
        .filter(|r| match r.user_id {
            Some(id) => seen_users.insert(id),
            None => seen_emails.insert(r.email.clone()),
        })
        .collect()
}

/// Handle held by request handlers; sending never blocks.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<TicketEvent>,
}

impl Notifier {
    pub fn emit(&self, event: TicketEvent) {
        if self.tx.send(event).is_err() {
            warn!("notification consumer is gone; event dropped");
        }
    }

    /// A notifier with no consumer. Events are dropped; used in tests.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }
}

/// Start the delivery consumer and hand back the emitting side.
pub fn spawn(pool: DbPool, email: EmailConfig, base_url: String) -> Notifier {
    let (tx, mut rx) = mpsc::unbounded_channel::<TicketEvent>();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            deliver(&pool, &email, &base_url, event).await;
        }
    });
    Notifier { tx }
}

async fn deliver(pool: &DbPool, email: &EmailConfig, base_url: &str, event: TicketEvent) {
    let enabled = {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || match pool.get() {
            Ok(mut conn) => settings::email_notifications_enabled(&mut conn),
            Err(e) => {
                warn!("notification gate check failed: {e}");
                false
            }
        })
        .await
        .unwrap_or(false)
    };
    if !enabled {
        debug!("email notifications disabled; skipping {}", event.kind());
        return;
    }

    let recipients = {
        let pool = pool.clone();
        let event = event.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Recipient>, String> {
            let mut conn = pool.get().map_err(|e| e.to_string())?;
            resolve_recipients(&mut conn, &event).map_err(|e| e.to_string())
        })
        .await
    };

    let recipients = match recipients {
        Ok(Ok(recipients)) => recipients,
        Ok(Err(e)) => {
            warn!("recipient resolution failed for {}: {e}", event.kind());
            return;
        }
        Err(e) => {
            warn!("recipient resolution task failed: {e}");
            return;
        }
    };

    if recipients.is_empty() {
        debug!("no recipients for {} event", event.kind());
        return;
    }

    let (attempts, backoff) = delivery_policy(&event);
    for recipient in recipients {
        let content = render(&event, &recipient, base_url);
        send_with_retry(email, &recipient, content, attempts, backoff).await;
    }
}

fn resolve_recipients(
    conn: &mut PgConnection,
    event: &TicketEvent,
) -> Result<Vec<Recipient>, diesel::result::Error> {
    let mut recipients = Vec::new();
    match event {
        TicketEvent::Created { ticket } => {
            let super_admins: Vec<User> = users::table
                .filter(users::role.eq(roles::SUPER_ADMIN))
                .load(conn)?;
            let branch_staff: Vec<User> = users::table
                .filter(users::role.eq_any([roles::ADMIN, roles::HELPDESK, roles::TECHNICIAN]))
                .filter(users::company_id.eq(&ticket.company_id))
                .filter(users::branch_id.eq(&ticket.branch_id))
                .load(conn)?;
            recipients.extend(
                super_admins
                    .iter()
                    .chain(branch_staff.iter())
                    .filter(|u| !u.email.is_empty())
                    .map(Recipient::from_user),
            );

            let branch: Option<Branch> = branches::table
                .find(&ticket.branch_id)
                .first(conn)
                .optional()?;
            if let Some(email) = branch.and_then(|b| b.technician_email) {
                if !email.is_empty() {
                    recipients.push(Recipient::direct(&email));
                }
            }
        }
        TicketEvent::StatusChanged { ticket, .. } => {
            let creator: Option<User> = users::table
                .find(ticket.created_by)
                .first(conn)
                .optional()?;
            if let Some(creator) = creator.filter(|u| !u.email.is_empty()) {
                recipients.push(Recipient::from_user(&creator));
            }
        }
        TicketEvent::Assigned { assignee_id, .. } => {
            let assignee: Option<User> = users::table.find(*assignee_id).first(conn).optional()?;
            if let Some(assignee) = assignee.filter(|u| !u.email.is_empty()) {
                recipients.push(Recipient::from_user(&assignee));
            }
        }
    }
    Ok(dedup_recipients(recipients))
}

fn render(event: &TicketEvent, recipient: &Recipient, base_url: &str) -> EmailContent {
    let name = recipient.name.as_deref();
    match event {
        TicketEvent::Created { ticket } => templates::ticket_created(ticket, name, base_url),
        TicketEvent::StatusChanged {
            ticket,
            old_status,
            new_status,
        } => templates::ticket_status_changed(ticket, old_status, new_status, name, base_url),
        TicketEvent::Assigned { ticket, .. } => templates::ticket_assigned(ticket, name, base_url),
    }
}

fn build_mailer(config: &EmailConfig) -> Result<SmtpTransport, lettre::transport::smtp::Error> {
    let mut builder = SmtpTransport::relay(&config.smtp_server)?.port(config.smtp_port);
    if !config.username.is_empty() {
        builder = builder.credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ));
    }
    Ok(builder.build())
}

async fn send_with_retry(
    config: &EmailConfig,
    recipient: &Recipient,
    content: EmailContent,
    attempts: usize,
    backoff: &[u64],
) {
    for attempt in 0..attempts {
        match send_once(config, recipient, &content).await {
            Ok(()) => return,
            Err(SendError::Permanent(msg)) => {
                warn!("failed to send \"{}\" to {}: {msg}", content.subject, recipient.email);
                return;
            }
            Err(SendError::Retryable(msg)) => {
                warn!(
                    "failed to send \"{}\" to {} (attempt {}/{}): {msg}",
                    content.subject,
                    recipient.email,
                    attempt + 1,
                    attempts
                );
                if attempt + 1 < attempts {
                    let delay = backoff.get(attempt).copied().unwrap_or(60);
                    tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                }
            }
        }
    }
}

enum SendError {
    Retryable(String),
    Permanent(String),
}

async fn send_once(
    config: &EmailConfig,
    recipient: &Recipient,
    content: &EmailContent,
) -> Result<(), SendError> {
    let from: Mailbox = config
        .from
        .parse()
        .map_err(|e| SendError::Permanent(format!("invalid from address: {e}")))?;
    let to: Mailbox = recipient
        .email
        .parse()
        .map_err(|e| SendError::Permanent(format!("invalid recipient address: {e}")))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(content.subject.clone())
        .body(content.body.clone())
        .map_err(|e| SendError::Permanent(format!("failed to build email: {e}")))?;

    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let mailer = build_mailer(&config).map_err(|e| SendError::Permanent(e.to_string()))?;
        mailer.send(&message).map(|_| ()).map_err(|e| {
            if e.is_permanent() {
                SendError::Permanent(e.to_string())
            } else {
                SendError::Retryable(e.to_string())
            }
        })
    })
    .await
    .map_err(|e| SendError::Permanent(format!("send task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_recipient(id: i64, email: &str) -> Recipient {
        Recipient {
            user_id: Some(id),
            name: None,
            email: email.to_string(),
        }
    }

    #[test]
    fn dedup_is_by_user_identity() {
        let recipients = vec![
            user_recipient(1, "a@example.com"),
            user_recipient(1, "a@example.com"),
            user_recipient(2, "b@example.com"),
            Recipient::direct("branch@example.com"),
            Recipient::direct("branch@example.com"),
        ];
        let deduped = dedup_recipients(recipients);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].user_id, Some(1));
        assert_eq!(deduped[2].email, "branch@example.com");
    }

    #[test]
    fn status_changes_retry_with_backoff() {
        let ticket_event = TicketEvent::StatusChanged {
            ticket: sample_ticket(),
            old_status: "open".to_string(),
            new_status: "closed".to_string(),
        };
        assert_eq!(delivery_policy(&ticket_event), (3, &[60u64, 300][..]));
    }

    #[test]
    fn created_and_assigned_are_single_shot() {
        let created = TicketEvent::Created {
            ticket: sample_ticket(),
        };
        let assigned = TicketEvent::Assigned {
            ticket: sample_ticket(),
            assignee_id: 9,
        };
        assert_eq!(delivery_policy(&created).0, 1);
        assert_eq!(delivery_policy(&assigned).0, 1);
    }

    fn sample_ticket() -> Ticket {
        use chrono::Utc;
        Ticket {
            id: "T001".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            asset_id: None,
            priority: "low".to_string(),
            status: "open".to_string(),
            created_by: 1,
            assigned_to: None,
            approved_by: None,
            closed_by: None,
            company_id: "C001".to_string(),
            branch_id: "B001".to_string(),
            attachments: None,
            resolution: None,
            phone_number: None,
            device_location: None,
            ip_address: None,
            repair_cost: None,
            replaced_part_name: None,
            replaced_part_serial_number: None,
            replaced_part_brand: None,
            replaced_part_model: None,
            images: None,
            custom_device_type: None,
            custom_device_serial_number: None,
            custom_device_asset_code: None,
            custom_device_brand: None,
            custom_device_model: None,
            closed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
