use error_stack::{report, ResultExt};
use google_sheets4::api::{
    AddSheetRequest, BatchUpdateSpreadsheetRequest, Request, SheetProperties, ValueRange,
};
use google_sheets4::Sheets;
use serde_json::{json, Value};
use tracing::{event, instrument, Level};

use crate::domain::Role;
use crate::ports::sheet_greeter::{SheetGreeter, SheetGreeterError};

use super::auth::ServiceAccount;
use super::http_client::HttpsConnector;
use super::value_range_factory::ValueRangeFactory;

pub const GREETING_SHEET_TITLE: &str = "Hello from Sheets Guard";
/// Rows rewritten on every registration; anything the text does not fill is
/// blanked.
const GREETING_ROWS: u32 = 30;
const SEPARATOR: &str =
    "═══════════════════════════════════════════════════════════════════════════════";

/// Row indexes (0-based) of the lines that get their own styling.
const HEADER_ROW: i32 = 0;
const INSTRUCTIONS_ROW: i32 = 6;
const WARNING_ROW: i32 = 13;
const LINK_ROWS: (i32, i32) = (15, 17);
const ACCESS_ROW: i32 = 20;

/// Writes the instructions tab that tells respondents how to get access.
pub struct GreetingSheet {
    hub: Sheets<HttpsConnector>,
}

impl std::fmt::Debug for GreetingSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GreetingSheet")
    }
}

pub fn greeting_lines(join_link: &str, role: Role) -> Vec<String> {
    [
        "📋 Sheets Guard",
        "",
        "Access to this spreadsheet is handed out through a join link.",
        "",
        SEPARATOR,
        "",
        "📝 HOW TO GET ACCESS:",
        "",
        "   1️⃣  Open the join link below",
        "   2️⃣  Sign in with your account",
        "   3️⃣  Enter the Google address that should get access",
        "   4️⃣  Reopen this spreadsheet signed in with that Google account",
        "",
        "⚠️  Access is granted to a Google account. Use an address you sign in to Google with.",
        "",
        "🔗 Join link:",
    ]
    .into_iter()
    .map(str::to_string)
    .chain([
        join_link.to_string(),
        String::new(),
        SEPARATOR.to_string(),
        String::new(),
        format!("📊 Access level for respondents: {}", role.as_ref().to_uppercase()),
    ])
    .collect()
}

fn row_style(sheet_id: i32, start: i32, end: i32, format: Value, fields: &str) -> Value {
    json!({
        "repeatCell": {
            "range": { "sheetId": sheet_id, "startRowIndex": start, "endRowIndex": end },
            "cell": { "userEnteredFormat": format },
            "fields": fields,
        }
    })
}

fn dimension_size(sheet_id: i32, dimension: &str, start: i32, end: i32, pixels: i32) -> Value {
    json!({
        "updateDimensionProperties": {
            "range": {
                "sheetId": sheet_id,
                "dimension": dimension,
                "startIndex": start,
                "endIndex": end,
            },
            "properties": { "pixelSize": pixels },
            "fields": "pixelSize",
        }
    })
}

fn highlighted(red: f32, green: f32, blue: f32) -> Value {
    json!({
        "backgroundColor": { "red": red, "green": green, "blue": blue },
        "textFormat": { "fontSize": 11, "bold": true },
    })
}

const HIGHLIGHT_FIELDS: &str = "userEnteredFormat.backgroundColor,userEnteredFormat.textFormat";

pub fn format_request(sheet_id: i32) -> serde_json::Result<BatchUpdateSpreadsheetRequest> {
    let requests = vec![
        row_style(
            sheet_id,
            HEADER_ROW,
            HEADER_ROW + 1,
            json!({
                "backgroundColor": { "red": 0.26, "green": 0.52, "blue": 0.96 },
                "textFormat": {
                    "foregroundColor": { "red": 1, "green": 1, "blue": 1 },
                    "fontSize": 11,
                    "bold": true,
                },
                "horizontalAlignment": "CENTER",
                "verticalAlignment": "MIDDLE",
            }),
            "userEnteredFormat.backgroundColor,userEnteredFormat.textFormat,\
             userEnteredFormat.horizontalAlignment,userEnteredFormat.verticalAlignment",
        ),
        dimension_size(sheet_id, "ROWS", HEADER_ROW, HEADER_ROW + 1, 40),
        row_style(
            sheet_id,
            INSTRUCTIONS_ROW,
            INSTRUCTIONS_ROW + 1,
            highlighted(1.0, 0.95, 0.8),
            HIGHLIGHT_FIELDS,
        ),
        row_style(
            sheet_id,
            WARNING_ROW,
            WARNING_ROW + 1,
            highlighted(1.0, 0.92, 0.92),
            HIGHLIGHT_FIELDS,
        ),
        row_style(
            sheet_id,
            LINK_ROWS.0,
            LINK_ROWS.1,
            highlighted(0.85, 0.92, 0.83),
            HIGHLIGHT_FIELDS,
        ),
        row_style(
            sheet_id,
            ACCESS_ROW,
            ACCESS_ROW + 1,
            highlighted(0.95, 0.95, 0.95),
            HIGHLIGHT_FIELDS,
        ),
        dimension_size(sheet_id, "COLUMNS", 0, 1, 900),
    ];

    serde_json::from_value(json!({ "requests": requests }))
}

impl GreetingSheet {
    pub fn new(account: &ServiceAccount) -> Self {
        Self {
            hub: Sheets::new(account.client.clone(), account.authenticator.clone()),
        }
    }

    #[instrument(skip(self))]
    async fn find_sheet_id(
        &self,
        spreadsheet_id: &str,
    ) -> error_stack::Result<Option<i32>, SheetGreeterError> {
        let (_, spreadsheet) = self
            .hub
            .spreadsheets()
            .get(spreadsheet_id)
            .param("fields", "sheets(properties(title,sheetId))")
            .doit()
            .await
            .change_context(SheetGreeterError::FailedToFetchMetadata)?;

        Ok(spreadsheet
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|sheet| sheet.properties)
            .find(|properties| properties.title.as_deref() == Some(GREETING_SHEET_TITLE))
            .and_then(|properties| properties.sheet_id))
    }

    #[instrument(skip(self))]
    async fn add_sheet(
        &self,
        spreadsheet_id: &str,
    ) -> error_stack::Result<i32, SheetGreeterError> {
        let request = BatchUpdateSpreadsheetRequest {
            requests: Some(vec![Request {
                add_sheet: Some(AddSheetRequest {
                    properties: Some(SheetProperties {
                        title: Some(GREETING_SHEET_TITLE.to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let (_, response) = self
            .hub
            .spreadsheets()
            .batch_update(request, spreadsheet_id)
            .doit()
            .await
            .change_context(SheetGreeterError::FailedToAddSheet)?;

        response
            .replies
            .unwrap_or_default()
            .into_iter()
            .find_map(|reply| reply.add_sheet?.properties?.sheet_id)
            .ok_or_else(|| {
                report!(SheetGreeterError::FailedToAddSheet)
                    .attach_printable("AddSheet reply carried no sheet id")
            })
    }
}

#[async_trait::async_trait]
impl SheetGreeter for GreetingSheet {
    #[instrument(skip(self))]
    async fn write_greeting(
        &self,
        spreadsheet_id: &str,
        join_link: &str,
        role: Role,
    ) -> error_stack::Result<String, SheetGreeterError> {
        let sheet_id = match self.find_sheet_id(spreadsheet_id).await? {
            Some(sheet_id) => sheet_id,
            None => self.add_sheet(spreadsheet_id).await?,
        };

        let range = format!("'{}'!A1", GREETING_SHEET_TITLE);
        let lines = greeting_lines(join_link, role);
        let value_range = ValueRange::from_single_column(&lines, GREETING_ROWS);
        self.hub
            .spreadsheets()
            .values_update(value_range, spreadsheet_id, &range)
            .value_input_option("RAW")
            .doit()
            .await
            .change_context(SheetGreeterError::FailedToWrite)
            .attach_printable_lazy(|| format!("Failed to write to range {}", range))?;

        let styling = format_request(sheet_id).change_context(SheetGreeterError::FailedToWrite)?;
        self.hub
            .spreadsheets()
            .batch_update(styling, spreadsheet_id)
            .doit()
            .await
            .change_context(SheetGreeterError::FailedToWrite)
            .attach_printable("Failed to format greeting sheet")?;

        event!(Level::INFO, spreadsheet_id, sheet_id, "Greeting sheet written");
        Ok(GREETING_SHEET_TITLE.to_string())
    }
}
