//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 持有全部资源，把宿主的调用分派给流程层。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (preview / generate / route_submission / handlers / defaults)
//!     ↓
//! workflow (Preview / Generation / SubmissionRouter)
//!     ↓
//! services (roster / layout / codec / form / assignment / registry / error log)
//!     ↓
//! infrastructure (Spreadsheet / FormService / Classroom / FileStorage)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有配置和协作者
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做分派和兜底

pub mod app;

pub use app::{App, GoogleApp};
