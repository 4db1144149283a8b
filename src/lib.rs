//! # Peer Eval Forms
//!
//! 为课堂小组同伴互评自动生成表单、互评表和课程作业，并把每次提交写回表格
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 外部服务的最小契约，只暴露能力
//! - `Spreadsheet` / `FormService` / `Classroom` / `FileStorage`
//! - `memory` - 内存实现，测试和离线运行用
//! - `clients/` - Google REST 实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `roster` / `layout` - 名单规范化和互评表布局（纯计算）
//! - `ContextCodec` - 表单上下文编解码
//! - `FormBuilder` / `assignment_builder` / `PeerTable` - 生成各个产物
//! - `HandlerRegistry` / `DefaultsStore` / `ErrorLog` - 持久化
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义一次预检、一次生成、一次提交的完整流程
//! - `Preview` - 只读检查
//! - `Generation` - 建表单 → 挂处理器 → 建作业
//! - `SubmissionRouter` - 解上下文 → 重算布局 → 写单元格（事件、response id 或 watch 通知）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 宿主入口，持有资源，失败兜底
//!
//! ## 模块结构
//!
//! ```text
//! clients/         Google REST 实现（Sheets / Forms / Classroom / Drive）
//! config           运行配置
//! error            错误类型
//! infrastructure/  协作者契约 + 内存实现
//! models/          数据结构、A1 记法、设置加载
//! orchestrator/    App 入口
//! services/        名单、布局、编解码、表单、作业、持久化
//! utils/           日志和时间格式
//! workflow/        预检、生成、提交路由
//! ```

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::GoogleClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::Backend;
pub use models::{GenerationSettings, PreviewReport, StatusResult, SubmissionEvent};
pub use orchestrator::{App, GoogleApp};
pub use workflow::{Generation, Preview, RouteOutcome, SubmissionRouter};
