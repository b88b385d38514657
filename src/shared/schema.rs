diesel::table! {
    companies (id) {
        id -> Varchar,
        name -> Varchar,
        logo -> Nullable<Text>,
        line_token -> Nullable<Varchar>,
        telegram_token -> Nullable<Varchar>,
        notification_email -> Nullable<Varchar>,
        expiry_date -> Nullable<Date>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    branches (id) {
        id -> Varchar,
        name -> Varchar,
        company_id -> Varchar,
        ticket_prefix -> Nullable<Varchar>,
        technician_email -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Int8,
        name -> Varchar,
        username -> Varchar,
        email -> Varchar,
        password -> Varchar,
        role -> Varchar,
        company_id -> Varchar,
        branch_id -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    assets (id) {
        id -> Varchar,
        asset_code -> Varchar,
        serial_number -> Varchar,
        #[sql_name = "type"]
        type_ -> Varchar,
        brand -> Varchar,
        model -> Varchar,
        start_date -> Date,
        location -> Varchar,
        company_id -> Varchar,
        branch_id -> Varchar,
        responsible -> Int8,
        department -> Nullable<Varchar>,
        ip_address -> Nullable<Varchar>,
        diagram_file -> Nullable<Varchar>,
        images -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tickets (id) {
        id -> Varchar,
        title -> Varchar,
        description -> Text,
        asset_id -> Nullable<Varchar>,
        priority -> Varchar,
        status -> Varchar,
        created_by -> Int8,
        assigned_to -> Nullable<Int8>,
        approved_by -> Nullable<Int8>,
        closed_by -> Nullable<Int8>,
        company_id -> Varchar,
        branch_id -> Varchar,
        attachments -> Nullable<Jsonb>,
        resolution -> Nullable<Text>,
        phone_number -> Nullable<Varchar>,
        device_location -> Nullable<Varchar>,
        ip_address -> Nullable<Varchar>,
        repair_cost -> Nullable<Numeric>,
        replaced_part_name -> Nullable<Varchar>,
        replaced_part_serial_number -> Nullable<Varchar>,
        replaced_part_brand -> Nullable<Varchar>,
        replaced_part_model -> Nullable<Varchar>,
        images -> Nullable<Jsonb>,
        custom_device_type -> Nullable<Varchar>,
        custom_device_serial_number -> Nullable<Varchar>,
        custom_device_asset_code -> Nullable<Varchar>,
        custom_device_brand -> Nullable<Varchar>,
        custom_device_model -> Nullable<Varchar>,
        closed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_histories (id) {
        id -> Int8,
        ticket_id -> Varchar,
        action -> Varchar,
        description -> Text,
        user_id -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    data_center_logs (id) {
        id -> Varchar,
        visitor_name -> Varchar,
        visitor_company -> Nullable<Varchar>,
        contact_number -> Varchar,
        entry_time -> Timestamptz,
        exit_time -> Nullable<Timestamptz>,
        purpose -> Text,
        equipment_brought -> Nullable<Text>,
        authorized_by -> Varchar,
        company_id -> Varchar,
        branch_id -> Varchar,
        created_by -> Int8,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    system_logs (id) {
        id -> Int8,
        user_id -> Int8,
        user_name -> Varchar,
        company_id -> Varchar,
        company_name -> Varchar,
        action -> Varchar,
        module -> Varchar,
        description -> Text,
        ip_address -> Nullable<Varchar>,
        user_agent -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    system_settings (key) {
        key -> Varchar,
        value -> Text,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    id_sequences (namespace) {
        namespace -> Varchar,
        last_value -> Int8,
    }
}

diesel::joinable!(branches -> companies (company_id));
diesel::joinable!(users -> companies (company_id));
diesel::joinable!(users -> branches (branch_id));
diesel::joinable!(assets -> companies (company_id));
diesel::joinable!(assets -> branches (branch_id));
diesel::joinable!(tickets -> assets (asset_id));
diesel::joinable!(tickets -> companies (company_id));
diesel::joinable!(tickets -> branches (branch_id));
diesel::joinable!(ticket_histories -> tickets (ticket_id));
diesel::joinable!(ticket_histories -> users (user_id));
diesel::joinable!(data_center_logs -> companies (company_id));
diesel::joinable!(data_center_logs -> branches (branch_id));
diesel::joinable!(system_logs -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    companies,
    branches,
    users,
    assets,
    tickets,
    ticket_histories,
    data_center_logs,
    system_logs,
    system_settings,
    id_sequences,
);
