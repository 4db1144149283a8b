/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(command: &str, spreadsheet_id: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 同伴互评自动化 - {}", command);
    info!("📊 目标表格: {}", spreadsheet_id);
    info!("{}", "=".repeat(60));
}

/// 记录生成结果统计
///
/// # 参数
/// - `forms`: 创建的表单数量
/// - `assignments`: 创建的作业数量
/// - `skipped`: 跳过的学生数量
pub fn log_generation_summary(forms: usize, assignments: usize, skipped: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✅ 表单: {}", forms);
    info!("📋 作业: {}", assignments);
    info!("⏭️ 跳过学生: {}", skipped);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
