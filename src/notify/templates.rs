//! Fixed notification templates. Content is not user-configurable; only the
//! ticket fields vary.

use crate::shared::models::Ticket;
use crate::tickets::workflow::status_label;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

fn greeting(recipient_name: Option<&str>, fallback: &str) -> String {
    format!("Hello {}", recipient_name.unwrap_or(fallback))
}

fn detail_link(base_url: &str, ticket_id: &str) -> String {
    format!("{}/tickets/{}", base_url.trim_end_matches('/'), ticket_id)
}

pub fn ticket_created(ticket: &Ticket, recipient_name: Option<&str>, base_url: &str) -> EmailContent {
    EmailContent {
        subject: format!("New repair ticket #{}", ticket.id),
        body: format!(
            "{greeting},\n\n\
             A new repair ticket has been created.\n\
             Title: {title}\n\
             Priority: {priority}\n\
             Details: {description}\n\n\
             View the ticket: {link}\n\n\
             Please review and take action.",
            greeting = greeting(recipient_name, "team"),
            title = ticket.title,
            priority = ticket.priority,
            description = ticket.description,
            link = detail_link(base_url, &ticket.id),
        ),
    }
}

pub fn ticket_status_changed(
    ticket: &Ticket,
    old_status: &str,
    new_status: &str,
    recipient_name: Option<&str>,
    base_url: &str,
) -> EmailContent {
    EmailContent {
        subject: format!("Repair ticket #{} status changed", ticket.id),
        body: format!(
            "{greeting},\n\n\
             The status of your repair ticket has changed.\n\
             Title: {title}\n\
             Previous status: {old}\n\
             New status: {new}\n\n\
             View the ticket: {link}",
            greeting = greeting(recipient_name, "there"),
            title = ticket.title,
            old = status_label(old_status),
            new = status_label(new_status),
            link = detail_link(base_url, &ticket.id),
        ),
    }
}

pub fn ticket_assigned(ticket: &Ticket, recipient_name: Option<&str>, base_url: &str) -> EmailContent {
    EmailContent {
        subject: format!("You have been assigned ticket #{}", ticket.id),
        body: format!(
            "{greeting},\n\n\
             You have been assigned a repair ticket.\n\
             Title: {title}\n\
             Priority: {priority}\n\
             Details: {description}\n\n\
             View the ticket: {link}\n\n\
             Please proceed with the assigned work.",
            greeting = greeting(recipient_name, "technician"),
            title = ticket.title,
            priority = ticket.priority,
            description = ticket.description,
            link = detail_link(base_url, &ticket.id),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_ticket() -> Ticket {
        Ticket {
            id: "HQ-001".to_string(),
            title: "Broken printer".to_string(),
            description: "Paper jam on floor 3".to_string(),
            asset_id: None,
            priority: "high".to_string(),
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

    #[test]
    fn created_template_carries_ticket_fields() {
        let email = ticket_created(&sample_ticket(), Some("Alice"), "https://desk.example.com/");
        assert_eq!(email.subject, "New repair ticket #HQ-001");
        assert!(email.body.contains("Hello Alice"));
        assert!(email.body.contains("Broken printer"));
        assert!(email.body.contains("Priority: high"));
        assert!(email.body.contains("https://desk.example.com/tickets/HQ-001"));
    }

    #[test]
    fn status_template_renders_labels_not_keys() {
        let email = ticket_status_changed(
            &sample_ticket(),
            "open",
            "in_progress",
            None,
            "http://localhost:8080",
        );
        assert!(email.body.contains("Previous status: Open"));
        assert!(email.body.contains("New status: In progress"));
        assert!(email.body.contains("Hello there"));
    }

    #[test]
    fn assigned_template_addresses_the_technician() {
        let email = ticket_assigned(&sample_ticket(), Some("Bob"), "http://localhost:8080");
        assert_eq!(email.subject, "You have been assigned ticket #HQ-001");
        assert!(email.body.contains("Hello Bob"));
    }
}
