//! 基础设施层（Infrastructure）
//!
//! 外部服务的最小契约：表格、表单、课堂、文件存储。
//! 上层只依赖这些 trait；`clients/` 提供 Google REST 实现，`memory` 提供内存实现。

pub mod classroom;
pub mod forms;
pub mod memory;
pub mod spreadsheet;
pub mod storage;

pub use classroom::Classroom;
pub use forms::FormService;
pub use spreadsheet::Spreadsheet;
pub use storage::FileStorage;

/// 一次运行用到的全部外部协作者
pub struct Backend<S, F, C, D> {
    pub sheets: S,
    pub forms: F,
    pub classroom: C,
    pub storage: D,
}

impl<S, F, C, D> Backend<S, F, C, D>
where
    S: Spreadsheet,
    F: FormService,
    C: Classroom,
    D: FileStorage,
{
    pub fn new(sheets: S, forms: F, classroom: C, storage: D) -> Self {
        Self {
            sheets,
            forms,
            classroom,
            storage,
        }
    }
}
