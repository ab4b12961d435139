//! Source schemas the reporter knows how to read.
//!
//! Each domain renders one read-only `SELECT` returning a row per business
//! event, restricted to the window and with deleted rows excluded. Grouping
//! happens in the aggregator, not in SQL.

use serde::Serialize;

use super::builder::{DomainSettings, Params};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// GLPI help-desk tickets solved in the window.
    Tickets,
    /// Payment transactions created in the window.
    Transactions,
}

/// How a selected column is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    /// Exact decimal, selected as text and parsed client-side.
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { name, kind }
}

const TICKET_COLUMNS: &[ColumnSpec] = &[
    col("ticket_id", ColumnKind::Integer),
    col("assigned_user", ColumnKind::Text),
    col("status", ColumnKind::Text),
    col("solved_date", ColumnKind::Text),
    col("group_name", ColumnKind::Text),
    col("entity", ColumnKind::Text),
    col("location", ColumnKind::Text),
];

const TRANSACTION_COLUMNS: &[ColumnSpec] = &[
    col("transaction_id", ColumnKind::Integer),
    col("gateway", ColumnKind::Text),
    col("card_type", ColumnKind::Text),
    col("status", ColumnKind::Text),
    col("error_code", ColumnKind::Text),
    col("amount", ColumnKind::Decimal),
    col("created_date", ColumnKind::Text),
];

/// GLPI ticket status codes reported on, with their display labels.
pub const TICKET_STATUSES: &[(i64, &str)] = &[(5, "RESUELTO"), (6, "CERRADO")];

impl Domain {
    pub fn name(self) -> &'static str {
        match self {
            Domain::Tickets => "tickets",
            Domain::Transactions => "transactions",
        }
    }

    pub fn columns(self) -> &'static [ColumnSpec] {
        match self {
            Domain::Tickets => TICKET_COLUMNS,
            Domain::Transactions => TRANSACTION_COLUMNS,
        }
    }

    /// Render the SQL text, pushing bind values onto `params` in the order
    /// their placeholders appear.
    pub(crate) fn render(self, settings: &DomainSettings, params: &mut Params) -> String {
        match self {
            Domain::Tickets => render_tickets(settings, params),
            Domain::Transactions => render_transactions(settings, params),
        }
    }
}

fn render_tickets(settings: &DomainSettings, params: &mut Params) -> String {
    let d = params.dialect();

    let status_case = TICKET_STATUSES
        .iter()
        .map(|(code, label)| format!("WHEN {} THEN '{}'", code, label))
        .collect::<Vec<_>>()
        .join(" ");
    let status_codes = TICKET_STATUSES
        .iter()
        .map(|(code, _)| code.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let group = params.push(settings.ticket_group.clone());
    let start = d.timestamp(&params.push_start());
    let end = d.timestamp(&params.push_end());

    format!(
        r#"SELECT
    {ticket_id} AS ticket_id,
    gu.name AS assigned_user,
    CASE gt.status {status_case} END AS status,
    {solved_date} AS solved_date,
    gg.name AS group_name,
    ge.name AS entity,
    gl.completename AS location
FROM glpi_tickets gt
INNER JOIN glpi_entities ge ON ge.id = gt.entities_id
INNER JOIN glpi_users gu ON gu.id = gt.users_id_recipient
LEFT JOIN glpi_locations gl ON gl.id = gt.locations_id
INNER JOIN glpi_groups_tickets ggt ON ggt.tickets_id = gt.id AND ggt.type = 2
INNER JOIN glpi_groups gg ON gg.id = ggt.groups_id AND gg.name = {group}
WHERE gt.solvedate BETWEEN {start} AND {end}
    AND gt.id IS NOT NULL
    AND gt.is_deleted = FALSE
    AND gt.status IN ({status_codes})
ORDER BY gt.solvedate ASC"#,
        ticket_id = d.as_bigint("gt.id"),
        solved_date = d.date_text("gt.solvedate"),
    )
}

fn render_transactions(settings: &DomainSettings, params: &mut Params) -> String {
    let d = params.dialect();

    let start = d.timestamp(&params.push_start());
    let end = d.timestamp(&params.push_end());

    let error_code = d.as_text("t.error_code");
    let denylist = if settings.error_code_denylist.is_empty() {
        String::new()
    } else {
        let placeholders = settings
            .error_code_denylist
            .iter()
            .map(|code| params.push(code.clone()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "\n    AND (t.error_code IS NULL OR {} NOT IN ({}))",
            error_code, placeholders
        )
    };

    format!(
        r#"SELECT
    {transaction_id} AS transaction_id,
    g.name AS gateway,
    ct.name AS card_type,
    {status} AS status,
    {error_code} AS error_code,
    {amount} AS amount,
    {created_date} AS created_date
FROM transactions t
LEFT JOIN payment_gateways g ON g.id = t.gateway_id
LEFT JOIN card_types ct ON ct.id = t.card_type_id
WHERE t.created_at BETWEEN {start} AND {end}
    AND t.is_deleted = FALSE{denylist}
ORDER BY t.created_at ASC"#,
        transaction_id = d.as_bigint("t.id"),
        status = d.as_text("t.status"),
        amount = d.as_text("t.amount"),
        created_date = d.date_text("t.created_at"),
    )
}
