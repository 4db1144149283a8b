//! 文件夹服务 - 业务能力层

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::infrastructure::FileStorage;
use crate::models::Folder;

/// 按名称找文件夹，不存在就创建
pub async fn get_or_create_folder<S: FileStorage>(storage: &S, name: &str) -> AppResult<Folder> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Drive Folder Name cannot be empty."));
    }
    if let Some(folder) = storage.find_folder(name).await? {
        return Ok(folder);
    }
    let folder = storage.create_folder(name).await.map_err(|e| {
        AppError::validation(format!("Could not find or create folder \"{name}\": {e}"))
    })?;
    info!("📁 创建文件夹: {} (ID: {})", folder.name, folder.id);
    Ok(folder)
}
