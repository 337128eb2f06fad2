use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// File kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Folder,
    File,
    Image,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Folder => "folder",
            FileKind::File => "file",
            FileKind::Image => "image",
        }
    }

    /// Parse from the closed set. Anything else is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "folder" => Some(FileKind::Folder),
            "file" => Some(FileKind::File),
            "image" => Some(FileKind::Image),
            _ => None,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FileKind::Folder)
    }

    pub fn is_image(&self) -> bool {
        matches!(self, FileKind::Image)
    }
}

/// File record: metadata only, content lives behind `storage_ref`.
#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub kind: String,
    pub is_public: bool,
    /// Opaque handle into the blob store. Absent for folders, immutable
    /// once set.
    pub storage_ref: Option<String>,
    pub created_at: String,
}

impl FileRecord {
    pub fn kind(&self) -> FileKind {
        // The kind column only ever holds values written through FileKind.
        FileKind::parse(&self.kind).unwrap_or(FileKind::File)
    }
}

/// File response. Never exposes the storage ref.
#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub kind: String,
    pub is_public: bool,
    pub created_at: String,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            id: file.id,
            user_id: file.user_id,
            parent_id: file.parent_id,
            name: file.name,
            kind: file.kind,
            is_public: file.is_public,
            created_at: file.created_at,
        }
    }
}

/// Input to file creation, already decoded to raw bytes by the transport.
#[derive(Debug)]
pub struct NewFile {
    pub name: String,
    pub kind: String,
    pub parent_id: Option<String>,
    pub is_public: bool,
    pub data: Option<Bytes>,
}

/// Create folder request
#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// File listing query parameters
#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub parent_id: Option<String>,
    /// Zero-based page, fixed page size of 20.
    pub page: Option<u32>,
}

/// Download query parameters
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Thumbnail variant width. Absent means the original.
    pub width: Option<u32>,
}
