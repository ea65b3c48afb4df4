//! Google Drive API client.

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use classdrive_common::{Error, FileId, PermissionId, Result, Role};

use super::auth::TokenManager;
use crate::query::DriveQuery;
use crate::store::{DriveFile, NewFile, NewPermission, Permission, RemoteStore};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Fields requested for file metadata.
const FILE_FIELDS: &str = "id,name,mimeType,parents,trashed,writersCanShare";
/// Fields requested for permissions.
const PERMISSION_FIELDS: &str = "id,type,role,emailAddress";
/// Page size for list calls.
const PAGE_SIZE: &str = "100";

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Response from listing permissions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionListResponse {
    #[serde(default)]
    permissions: Vec<Permission>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    token_manager: Arc<TokenManager>,
    base_url: String,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(token_manager: Arc<TokenManager>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("classdrive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_manager,
            base_url: DRIVE_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.token_manager.get_access_token().await?;
        Ok(format!("Bearer {}", token.expose()))
    }

    /// Attach authorization and shared-drive flags common to every call.
    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let auth = self.auth_header().await?;
        Ok(request
            .header(header::AUTHORIZATION, auth)
            .query(&[("supportsAllDrives", "true")]))
    }

    fn permissions_url(&self, file_id: &FileId) -> String {
        format!("{}/files/{}/permissions", self.base_url, file_id)
    }

    fn permission_url(&self, file_id: &FileId, permission_id: &PermissionId) -> String {
        format!(
            "{}/files/{}/permissions/{}",
            self.base_url, file_id, permission_id
        )
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else {
            Err(Self::status_error(response).await)
        }
    }

    /// Map an unsuccessful response to the common error taxonomy.
    async fn status_error(response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::NOT_FOUND => Error::NotFound(format!("Resource not found: {}", body)),
            StatusCode::UNAUTHORIZED => {
                Error::Authentication(format!("Invalid or expired token: {}", body))
            }
            StatusCode::FORBIDDEN => Error::PermissionDenied(format!("Access denied: {}", body)),
            StatusCode::TOO_MANY_REQUESTS => {
                Error::Network(format!("Rate limited: {}", body))
            }
            _ => Error::Network(format!("API error: {} - {}", status, body)),
        }
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn list_files(&self, query: &DriveQuery) -> Result<Vec<DriveFile>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;
        let q = query.to_query_string();
        let fields = format!("nextPageToken,files({})", FILE_FIELDS);

        tracing::debug!("files.list q={}", q);

        loop {
            let url = format!("{}/files", self.base_url);

            let mut request = self
                .authorized(self.http.get(&url))
                .await?
                .query(&[
                    ("q", q.as_str()),
                    ("fields", fields.as_str()),
                    ("pageSize", PAGE_SIZE),
                    ("includeItemsFromAllDrives", "true"),
                ]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(format!("Failed to list files: {}", e)))?;

            let list_response: FileListResponse = self.handle_response(response).await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    async fn create_file(&self, request: &NewFile) -> Result<DriveFile> {
        let url = format!("{}/files", self.base_url);

        let metadata = serde_json::json!({
            "name": request.name,
            "mimeType": request.kind.mime_type(),
            "parents": [request.parent],
            "writersCanShare": request.writers_can_share,
        });

        tracing::debug!("files.create name={} parent={}", request.name, request.parent);

        let response = self
            .authorized(self.http.post(&url))
            .await?
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create file: {}", e)))?;

        self.handle_response(response).await
    }

    async fn list_permissions(&self, file_id: &FileId) -> Result<Vec<Permission>> {
        let mut all_permissions = Vec::new();
        let mut page_token: Option<String> = None;
        let fields = format!("nextPageToken,permissions({})", PERMISSION_FIELDS);

        tracing::debug!("permissions.list file={}", file_id);

        loop {
            let mut request = self
                .authorized(self.http.get(self.permissions_url(file_id)))
                .await?
                .query(&[("fields", fields.as_str()), ("pageSize", PAGE_SIZE)]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(format!("Failed to list permissions: {}", e)))?;

            let list_response: PermissionListResponse = self.handle_response(response).await?;
            all_permissions.extend(list_response.permissions);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_permissions)
    }

    async fn create_permission(
        &self,
        file_id: &FileId,
        request: &NewPermission,
    ) -> Result<Permission> {
        let body = serde_json::json!({
            "type": "user",
            "role": request.role,
            "emailAddress": request.email,
        });
        let notify = if request.send_notification { "true" } else { "false" };

        tracing::debug!(
            "permissions.create file={} email={} role={}",
            file_id,
            request.email,
            request.role
        );

        let response = self
            .authorized(self.http.post(self.permissions_url(file_id)))
            .await?
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[("fields", PERMISSION_FIELDS), ("sendNotificationEmail", notify)])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create permission: {}", e)))?;

        self.handle_response(response).await
    }

    async fn delete_permission(
        &self,
        file_id: &FileId,
        permission_id: &PermissionId,
    ) -> Result<()> {
        tracing::debug!("permissions.delete file={} permission={}", file_id, permission_id);

        let response = self
            .authorized(self.http.delete(self.permission_url(file_id, permission_id)))
            .await?
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete permission: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error(response).await)
        }
    }

    async fn update_permission(
        &self,
        file_id: &FileId,
        permission_id: &PermissionId,
        role: Role,
    ) -> Result<Permission> {
        let body = serde_json::json!({ "role": role });

        tracing::debug!(
            "permissions.update file={} permission={} role={}",
            file_id,
            permission_id,
            role
        );

        let response = self
            .authorized(self.http.patch(self.permission_url(file_id, permission_id)))
            .await?
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[("fields", PERMISSION_FIELDS)])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to update permission: {}", e)))?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdrive::auth::{AuthConfig, AuthManager, Tokens};
    use chrono::{Duration, Utc};
    use classdrive_common::{ArtifactKind, SecretString};
    use reqwest::Url;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// One request as seen by the loopback Drive.
    #[derive(Debug)]
    struct Recorded {
        method: String,
        path: String,
        query: HashMap<String, String>,
        head: String,
        body: String,
    }

    impl Recorded {
        fn param(&self, key: &str) -> Option<&str> {
            self.query.get(key).map(String::as_str)
        }

        fn json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body).unwrap()
        }
    }

    async fn read_request(stream: &mut TcpStream) -> Recorded {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| value.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before request body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut request_line = head.lines().next().unwrap().split_whitespace();
        let method = request_line.next().unwrap().to_string();
        let url = Url::parse(&format!("http://drive.test{}", request_line.next().unwrap())).unwrap();

        Recorded {
            method,
            path: url.path().to_string(),
            query: url.query_pairs().into_owned().collect(),
            body: String::from_utf8_lossy(&buf[header_end..header_end + length]).into_owned(),
            head,
        }
    }

    /// Serve the canned `(status, body)` responses in order, one per
    /// connection, and hand back what was requested.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Recorded>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut stream).await);
                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
            seen
        });

        (base_url, handle)
    }

    fn client(base_url: &str) -> DriveClient {
        let config = AuthConfig {
            client_id: "id".to_string(),
            client_secret: SecretString::new("secret"),
            auth_uri: "http://127.0.0.1:9/auth".to_string(),
            token_uri: "http://127.0.0.1:9/token".to_string(),
            redirect_url: "http://127.0.0.1:8080".to_string(),
        };
        let tokens = Tokens {
            access_token: SecretString::new("tok"),
            refresh_token: SecretString::new("refresh"),
            expires_at: Utc::now() + Duration::hours(1),
        };
        let manager = TokenManager::new(AuthManager::new(config).unwrap(), tokens);

        let mut client = DriveClient::new(Arc::new(manager))
            .unwrap()
            .with_base_url(base_url);
        client.http = Client::builder().no_proxy().build().unwrap();
        client
    }

    #[tokio::test]
    async fn test_list_files_sends_query_and_follows_pages() {
        let (base_url, server) = serve(vec![
            (
                200,
                r#"{"nextPageToken":"p2","files":[{"id":"1","name":"hw1_Lee_Ana","mimeType":"application/vnd.google-apps.document"}]}"#,
            ),
            (
                200,
                r#"{"files":[{"id":"2","name":"hw1_Lee_Ana","mimeType":"application/vnd.google-apps.document"}]}"#,
            ),
        ])
        .await;
        let parent = FileId::new("folder1").unwrap();
        let query = DriveQuery::artifact("hw1_Lee_Ana", ArtifactKind::Document, &parent);

        let files = client(&base_url).list_files(&query).await.unwrap();
        let seen = server.await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(seen.len(), 2);
        for request in &seen {
            assert_eq!(request.method, "GET");
            assert_eq!(request.path, "/files");
            assert_eq!(request.param("q"), Some(query.to_query_string().as_str()));
            assert_eq!(request.param("supportsAllDrives"), Some("true"));
            assert_eq!(request.param("includeItemsFromAllDrives"), Some("true"));
            assert_eq!(request.param("pageSize"), Some(PAGE_SIZE));
            assert!(request.head.to_ascii_lowercase().contains("authorization: bearer tok"));
        }
        assert_eq!(seen[0].param("pageToken"), None);
        assert_eq!(seen[1].param("pageToken"), Some("p2"));
    }

    #[tokio::test]
    async fn test_create_file_disables_resharing() {
        let (base_url, server) = serve(vec![(
            200,
            r#"{"id":"doc1","name":"hw1_Lee_Ana","mimeType":"application/vnd.google-apps.document","parents":["folder1"],"writersCanShare":false}"#,
        )])
        .await;
        let request = NewFile {
            name: "hw1_Lee_Ana".to_string(),
            kind: ArtifactKind::Document,
            parent: FileId::new("folder1").unwrap(),
            writers_can_share: false,
        };

        let created = client(&base_url).create_file(&request).await.unwrap();
        let seen = server.await.unwrap();

        assert_eq!(created.id.as_str(), "doc1");
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].path, "/files");
        let body = seen[0].json();
        assert_eq!(body["name"], "hw1_Lee_Ana");
        assert_eq!(body["mimeType"], ArtifactKind::Document.mime_type());
        assert_eq!(body["parents"], serde_json::json!(["folder1"]));
        assert_eq!(body["writersCanShare"], false);
    }

    #[tokio::test]
    async fn test_create_permission_suppresses_notification() {
        let (base_url, server) = serve(vec![(
            200,
            r#"{"id":"p1","type":"user","role":"writer","emailAddress":"ana@x.edu"}"#,
        )])
        .await;
        let file = FileId::new("doc1").unwrap();

        let permission = client(&base_url)
            .create_permission(&file, &NewPermission::user("ana@x.edu", Role::Writer))
            .await
            .unwrap();
        let seen = server.await.unwrap();

        assert_eq!(permission.role, Role::Writer);
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].path, "/files/doc1/permissions");
        assert_eq!(seen[0].param("sendNotificationEmail"), Some("false"));
        assert_eq!(
            seen[0].json(),
            serde_json::json!({"type": "user", "role": "writer", "emailAddress": "ana@x.edu"})
        );
    }

    #[tokio::test]
    async fn test_delete_permission_accepts_empty_reply() {
        let (base_url, server) = serve(vec![(204, "")]).await;
        let file = FileId::new("doc1").unwrap();

        client(&base_url)
            .delete_permission(&file, &PermissionId::new("p9"))
            .await
            .unwrap();
        let seen = server.await.unwrap();

        assert_eq!(seen[0].method, "DELETE");
        assert_eq!(seen[0].path, "/files/doc1/permissions/p9");
    }

    #[tokio::test]
    async fn test_error_status_maps_to_error_kind() {
        let (base_url, server) = serve(vec![(404, r#"{"error":"gone"}"#)]).await;
        let file = FileId::new("doc1").unwrap();

        let err = client(&base_url).list_permissions(&file).await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_file_list_response_parsing() {
        let json = r#"{
            "nextPageToken": "page2",
            "files": [
                {"id": "1", "name": "CS101", "mimeType": "application/vnd.google-apps.folder"},
                {"id": "2", "name": "CS101", "mimeType": "application/vnd.google-apps.folder", "trashed": false}
            ]
        }"#;

        let response: FileListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.files.len(), 2);
        assert!(response.files.iter().all(DriveFile::is_folder));
        assert_eq!(response.next_page_token.as_deref(), Some("page2"));
    }

    #[test]
    fn test_empty_list_responses() {
        let files: FileListResponse = serde_json::from_str("{}").unwrap();
        assert!(files.files.is_empty());
        assert!(files.next_page_token.is_none());

        let permissions: PermissionListResponse = serde_json::from_str("{}").unwrap();
        assert!(permissions.permissions.is_empty());
    }

    #[test]
    fn test_permission_list_response_parsing() {
        let json = r#"{
            "permissions": [
                {"id": "owner1", "type": "user", "role": "owner", "emailAddress": "prof@x.edu"},
                {"id": "p2", "type": "user", "role": "writer", "emailAddress": "ana@x.edu"}
            ]
        }"#;

        let response: PermissionListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.permissions.len(), 2);
        assert!(response.permissions[0].role.is_owner());
        assert_eq!(response.permissions[1].role, Role::Writer);
    }
}
