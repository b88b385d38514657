use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::shared::schema::{
    assets, branches, companies, data_center_logs, system_logs, system_settings, ticket_histories,
    tickets, users,
};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = companies)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub logo: Option<String>,
    pub line_token: Option<String>,
    pub telegram_token: Option<String>,
    pub notification_email: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = branches)]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub company_id: String,
    pub ticket_prefix: Option<String>,
    pub technician_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
    pub company_id: String,
    pub branch_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trimmed user shape embedded in other entities' responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub company_id: String,
    pub branch_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = assets)]
pub struct Asset {
    pub id: String,
    pub asset_code: String,
    pub serial_number: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub brand: String,
    pub model: String,
    pub start_date: NaiveDate,
    pub location: String,
    pub company_id: String,
    pub branch_id: String,
    pub responsible: i64,
    pub department: Option<String>,
    pub ip_address: Option<String>,
    pub diagram_file: Option<String>,
    pub images: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub asset_id: Option<String>,
    pub priority: String,
    pub status: String,
    pub created_by: i64,
    pub assigned_to: Option<i64>,
    pub approved_by: Option<i64>,
    pub closed_by: Option<i64>,
    pub company_id: String,
    pub branch_id: String,
    pub attachments: Option<serde_json::Value>,
    pub resolution: Option<String>,
    pub phone_number: Option<String>,
    pub device_location: Option<String>,
    pub ip_address: Option<String>,
    pub repair_cost: Option<BigDecimal>,
    pub replaced_part_name: Option<String>,
    pub replaced_part_serial_number: Option<String>,
    pub replaced_part_brand: Option<String>,
    pub replaced_part_model: Option<String>,
    pub images: Option<serde_json::Value>,
    pub custom_device_type: Option<String>,
    pub custom_device_serial_number: Option<String>,
    pub custom_device_asset_code: Option<String>,
    pub custom_device_brand: Option<String>,
    pub custom_device_model: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable)]
#[diesel(table_name = ticket_histories)]
pub struct TicketHistory {
    pub id: i64,
    pub ticket_id: String,
    pub action: String,
    pub description: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ticket_histories)]
pub struct NewTicketHistory {
    pub ticket_id: String,
    pub action: String,
    pub description: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = data_center_logs)]
pub struct DataCenterLog {
    pub id: String,
    pub visitor_name: String,
    pub visitor_company: Option<String>,
    pub contact_number: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub purpose: String,
    pub equipment_brought: Option<String>,
    pub authorized_by: String,
    pub company_id: String,
    pub branch_id: String,
    pub created_by: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable)]
#[diesel(table_name = system_logs)]
pub struct SystemLog {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub company_id: String,
    pub company_name: String,
    pub action: String,
    pub module: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = system_logs)]
pub struct NewSystemLog {
    pub user_id: i64,
    pub user_name: String,
    pub company_id: String,
    pub company_name: String,
    pub action: String,
    pub module: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = system_settings)]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
