//! 互评表初始化服务 - 业务能力层
//!
//! 清空互评表区域、写表头、为每名学生写平均分公式

use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::Spreadsheet;
use crate::models::{A1Range, CellFormat, CellRef, CellValue};
use crate::services::layout::{LayoutContext, TableLayout};

/// 互评表初始化服务
pub struct PeerTable<'a, S> {
    sheets: &'a S,
    sheet: &'a str,
}

impl<'a, S: Spreadsheet> PeerTable<'a, S> {
    pub fn new(sheets: &'a S, sheet: &'a str) -> Self {
        Self { sheets, sheet }
    }

    /// 初始化互评表
    ///
    /// 表头写在姓名范围的上一行；姓名从第 1 行开始时不写表头。
    /// 表头和公式写入失败只记日志。
    pub async fn initialize(
        &self,
        layout: &LayoutContext,
        table: &TableLayout,
        names_start_row: u32,
    ) -> AppResult<()> {
        let rows: Vec<u32> = layout.row_by_name.values().copied().collect();
        let (Some(&top), Some(&bottom)) = (rows.iter().min(), rows.iter().max()) else {
            info!("没有需要初始化的学生行");
            return Ok(());
        };
        if table.start_column == 0 {
            return Err(AppError::validation(format!(
                "Invalid evaluation table start column: {}.",
                table.start_column
            )));
        }

        let region = A1Range::from_origin(
            CellRef::new(top, table.start_column),
            bottom - top + 1,
            table.width(),
        );
        self.sheets.clear_range(self.sheet, region).await?;

        if names_start_row > 1 {
            if let Err(e) = self.write_headers(table, names_start_row - 1).await {
                warn!("写入互评表表头失败: {}", e);
            }
        } else {
            warn!("姓名从第 {} 行开始，没有位置写表头", names_start_row);
        }

        let average = table.average_column();
        for (name, row) in layout.names_by_row() {
            let formula = CellValue::Formula(table.average_formula(row));
            if let Err(e) = self
                .sheets
                .write_cell(self.sheet, CellRef::new(row, average), formula)
                .await
            {
                warn!("写入 {} 的平均分公式失败 (行 {}, 列 {}): {}", name, row, average, e);
            }
        }

        info!(
            "✓ 互评表已更新: {}!{} ({} 行)",
            self.sheet,
            region,
            rows.len()
        );
        Ok(())
    }

    async fn write_headers(&self, table: &TableLayout, header_row: u32) -> AppResult<()> {
        let origin = CellRef::new(header_row, table.start_column);
        let headers: Vec<CellValue> = table.headers().into_iter().map(CellValue::Text).collect();
        let width = headers.len() as u32;
        self.sheets.write_row(self.sheet, origin, headers).await?;
        self.sheets
            .set_format(
                self.sheet,
                A1Range::from_origin(origin, 1, width),
                CellFormat::header(),
            )
            .await
    }
}
