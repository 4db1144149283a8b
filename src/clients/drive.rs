//! Drive v3 实现

use reqwest::Method;
use serde_json::{json, Value as JsonValue};

use super::{str_field, GoogleClient};
use crate::error::AppResult;
use crate::infrastructure::FileStorage;
use crate::models::Folder;

const SERVICE: &str = "Drive";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// 按名称查未删除文件夹的查询语句
fn folder_query(name: &str) -> String {
    format!(
        "mimeType='{FOLDER_MIME}' and name='{}' and trashed=false",
        name.replace('\\', "\\\\").replace('\'', "\\'")
    )
}

impl FileStorage for GoogleClient {
    async fn find_folder(&self, name: &str) -> AppResult<Option<Folder>> {
        let mut url = self.url(&self.drive_base, &["drive", "v3", "files"])?;
        url.query_pairs_mut()
            .append_pair("q", &folder_query(name))
            .append_pair("fields", "files(id,name)")
            .append_pair("pageSize", "1");
        let body = self.send(SERVICE, Method::GET, url, None).await?;
        Ok(body
            .get("files")
            .and_then(JsonValue::as_array)
            .and_then(|files| files.first())
            .map(|f| Folder {
                id: str_field(f, "/id"),
                name: str_field(f, "/name"),
            }))
    }

    async fn create_folder(&self, name: &str) -> AppResult<Folder> {
        let url = self.url(&self.drive_base, &["drive", "v3", "files"])?;
        let body = json!({ "name": name, "mimeType": FOLDER_MIME });
        let created = self.send(SERVICE, Method::POST, url, Some(&body)).await?;
        Ok(Folder {
            id: str_field(&created, "/id"),
            name: name.to_string(),
        })
    }

    /// 移动文件：加上目标父目录，去掉原来的父目录
    async fn move_file(&self, file_id: &str, folder: &Folder) -> AppResult<()> {
        let mut url = self.url(&self.drive_base, &["drive", "v3", "files", file_id])?;
        url.query_pairs_mut().append_pair("fields", "parents");
        let current = self.send(SERVICE, Method::GET, url, None).await?;
        let parents: Vec<&str> = current
            .get("parents")
            .and_then(JsonValue::as_array)
            .map(|p| p.iter().filter_map(JsonValue::as_str).collect())
            .unwrap_or_default();

        let mut url = self.url(&self.drive_base, &["drive", "v3", "files", file_id])?;
        url.query_pairs_mut()
            .append_pair("addParents", &folder.id)
            .append_pair("removeParents", &parents.join(","));
        self.send(SERVICE, Method::PATCH, url, Some(&json!({}))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_query_escapes_quotes() {
        assert_eq!(
            folder_query("Bob's Forms"),
            "mimeType='application/vnd.google-apps.folder' and name='Bob\\'s Forms' and trashed=false"
        );
    }
}
