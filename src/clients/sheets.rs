//! Sheets v4 实现

use reqwest::Method;
use serde_json::{json, Value as JsonValue};

use super::GoogleClient;
use crate::error::{AppError, AppResult};
use crate::infrastructure::Spreadsheet;
use crate::models::{A1Range, CellFormat, CellRef, CellValue, HorizontalAlignment};

const SERVICE: &str = "Sheets";

/// `'Sheet Name'!A1:B2`，工作表名里的单引号要双写
fn qualified_range(sheet: &str, range: impl std::fmt::Display) -> String {
    format!("'{}'!{}", sheet.replace('\'', "''"), range)
}

fn alignment_name(alignment: HorizontalAlignment) -> &'static str {
    match alignment {
        HorizontalAlignment::Left => "LEFT",
        HorizontalAlignment::Center => "CENTER",
        HorizontalAlignment::Right => "RIGHT",
    }
}

/// repeatCell 请求体（GridRange 是 0-based、右开区间）
fn repeat_cell_request(sheet_id: i64, range: A1Range, format: CellFormat) -> JsonValue {
    let mut cell_format = json!({ "textFormat": { "bold": format.bold } });
    let mut fields = vec!["userEnteredFormat.textFormat.bold"];
    if let Some(alignment) = format.horizontal_alignment {
        cell_format["horizontalAlignment"] = json!(alignment_name(alignment));
        fields.push("userEnteredFormat.horizontalAlignment");
    }
    json!({
        "requests": [{
            "repeatCell": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": range.start.row - 1,
                    "endRowIndex": range.end.row,
                    "startColumnIndex": range.start.col - 1,
                    "endColumnIndex": range.end.col,
                },
                "cell": { "userEnteredFormat": cell_format },
                "fields": fields.join(","),
            }
        }]
    })
}

impl GoogleClient {
    fn sheets_url(&self, tail: &[&str]) -> AppResult<reqwest::Url> {
        let mut segments = vec!["v4", "spreadsheets", self.spreadsheet_id.as_str()];
        segments.extend_from_slice(tail);
        self.url(&self.sheets_base, &segments)
    }

    async fn sheet_properties(&self) -> AppResult<Vec<JsonValue>> {
        let mut url = self.sheets_url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let body = self.send(SERVICE, Method::GET, url, None).await?;
        Ok(body
            .get("sheets")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn sheet_id(&self, sheet: &str) -> AppResult<i64> {
        self.sheet_properties()
            .await?
            .iter()
            .find(|s| s.pointer("/properties/title").and_then(JsonValue::as_str) == Some(sheet))
            .and_then(|s| s.pointer("/properties/sheetId").and_then(JsonValue::as_i64))
            .ok_or_else(|| AppError::not_found(SERVICE, format!("sheet \"{sheet}\"")))
    }

    async fn put_values(&self, sheet: &str, range: A1Range, values: Vec<CellValue>) -> AppResult<()> {
        let target = qualified_range(sheet, range);
        let mut url = self.sheets_url(&["values", &target])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        let row: Vec<JsonValue> = values.iter().map(CellValue::to_json).collect();
        let body = json!({ "range": target, "values": [row] });
        self.send(SERVICE, Method::PUT, url, Some(&body))
            .await
            .map_err(|e| AppError::write_failed(target.clone(), e))?;
        Ok(())
    }
}

impl Spreadsheet for GoogleClient {
    fn id(&self) -> &str {
        &self.spreadsheet_id
    }

    async fn sheet_exists(&self, sheet: &str) -> AppResult<bool> {
        Ok(self
            .sheet_properties()
            .await?
            .iter()
            .any(|s| s.pointer("/properties/title").and_then(JsonValue::as_str) == Some(sheet)))
    }

    async fn read_range(&self, sheet: &str, range: A1Range) -> AppResult<Vec<Vec<CellValue>>> {
        let target = qualified_range(sheet, range);
        let mut url = self.sheets_url(&["values", &target])?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");
        let body = self.send(SERVICE, Method::GET, url, None).await?;
        let rows = body
            .get("values")
            .and_then(JsonValue::as_array)
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(CellValue::from_json).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn write_cell(&self, sheet: &str, cell: CellRef, value: CellValue) -> AppResult<()> {
        self.put_values(sheet, A1Range::single(cell), vec![value]).await
    }

    async fn write_row(&self, sheet: &str, origin: CellRef, values: Vec<CellValue>) -> AppResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let range = A1Range::from_origin(origin, 1, values.len() as u32);
        self.put_values(sheet, range, values).await
    }

    async fn clear_range(&self, sheet: &str, range: A1Range) -> AppResult<()> {
        let target = format!("{}:clear", qualified_range(sheet, range));
        let url = self.sheets_url(&["values", &target])?;
        self.send(SERVICE, Method::POST, url, Some(&json!({}))).await?;
        Ok(())
    }

    async fn set_format(&self, sheet: &str, range: A1Range, format: CellFormat) -> AppResult<()> {
        let sheet_id = self.sheet_id(sheet).await?;
        let url = self.url(
            &self.sheets_base,
            &["v4", "spreadsheets", &format!("{}:batchUpdate", self.spreadsheet_id)],
        )?;
        let body = repeat_cell_request(sheet_id, range, format);
        self.send(SERVICE, Method::POST, url, Some(&body)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_range_quotes_sheet() {
        let range = A1Range::from_a1("A2:A5").unwrap();
        assert_eq!(qualified_range("Peer Eval", range), "'Peer Eval'!A2:A5");
        assert_eq!(qualified_range("Bob's", range), "'Bob''s'!A2:A5");
    }

    #[test]
    fn test_repeat_cell_request_uses_grid_indexes() {
        let range = A1Range::from_a1("E1:K1").unwrap();
        let body = repeat_cell_request(7, range, CellFormat::header());
        let grid = &body["requests"][0]["repeatCell"]["range"];
        assert_eq!(grid["sheetId"], 7);
        assert_eq!(grid["startRowIndex"], 0);
        assert_eq!(grid["endRowIndex"], 1);
        assert_eq!(grid["startColumnIndex"], 4);
        assert_eq!(grid["endColumnIndex"], 11);
        assert_eq!(
            body["requests"][0]["repeatCell"]["cell"]["userEnteredFormat"]["horizontalAlignment"],
            "CENTER"
        );
    }
}
