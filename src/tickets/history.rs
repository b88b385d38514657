//! Append-only ticket audit trail. Entries are only ever inserted; a failed
//! insert aborts the transaction it runs in, so a ticket mutation is never
//! visible without its history row.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;

use crate::shared::models::NewTicketHistory;
use crate::shared::schema::ticket_histories;

pub const ACTION_CREATED: &str = "Ticket created";
pub const ACTION_STATUS_CHANGED: &str = "Status changed";

pub fn record(
    conn: &mut PgConnection,
    ticket_id: &str,
    action: &str,
    description: &str,
    user_id: i64,
) -> QueryResult<()> {
    let entry = NewTicketHistory {
        ticket_id: ticket_id.to_string(),
        action: action.to_string(),
        description: description.to_string(),
        user_id,
        created_at: Utc::now(),
    };
    diesel::insert_into(ticket_histories::table)
        .values(&entry)
        .execute(conn)?;
    Ok(())
}
