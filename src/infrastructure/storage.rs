use crate::error::AppResult;
use crate::models::Folder;

/// 文件存储服务契约
#[allow(async_fn_in_trait)]
pub trait FileStorage {
    async fn find_folder(&self, name: &str) -> AppResult<Option<Folder>>;

    async fn create_folder(&self, name: &str) -> AppResult<Folder>;

    async fn move_file(&self, file_id: &str, folder: &Folder) -> AppResult<()>;
}
