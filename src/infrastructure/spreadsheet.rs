use crate::error::AppResult;
use crate::models::{A1Range, CellFormat, CellRef, CellValue};

/// 表格服务契约
///
/// `read_range` 返回的行可能比区域短（末尾空单元格被省略），用 [`cell_at`] 取值。
#[allow(async_fn_in_trait)]
pub trait Spreadsheet {
    /// 表格 id，写入错误日志的 target 列
    fn id(&self) -> &str;

    async fn sheet_exists(&self, sheet: &str) -> AppResult<bool>;

    async fn read_range(&self, sheet: &str, range: A1Range) -> AppResult<Vec<Vec<CellValue>>>;

    async fn write_cell(&self, sheet: &str, cell: CellRef, value: CellValue) -> AppResult<()>;

    /// 从 `origin` 开始向右写一行
    async fn write_row(&self, sheet: &str, origin: CellRef, values: Vec<CellValue>) -> AppResult<()>;

    /// 清除内容和格式
    async fn clear_range(&self, sheet: &str, range: A1Range) -> AppResult<()>;

    async fn set_format(&self, sheet: &str, range: A1Range, format: CellFormat) -> AppResult<()>;

    /// 区域内是否全部为空
    async fn is_blank(&self, sheet: &str, range: A1Range) -> AppResult<bool> {
        let rows = self.read_range(sheet, range).await?;
        Ok(rows.iter().flatten().all(CellValue::is_blank))
    }
}

/// 取二维结果中的单元格，越界视为空
pub fn cell_at(rows: &[Vec<CellValue>], row: usize, col: usize) -> CellValue {
    rows.get(row)
        .and_then(|r| r.get(col))
        .cloned()
        .unwrap_or_default()
}

/// 取单列区域的第一列
pub fn first_column(rows: &[Vec<CellValue>], height: u32) -> Vec<CellValue> {
    (0..height as usize).map(|i| cell_at(rows, i, 0)).collect()
}
