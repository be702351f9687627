//! `multipart/form-data` bodies.

use std::collections::HashMap;
use std::path::Path;

use reqwest::multipart::{Form, Part};

const DEFAULT_FIELD_NAME: &str = "File";
const OCTET_STREAM: &str = "application/octet-stream";

/// A file plus optional text fields, sent as a single multipart form.
///
/// ```
/// use netlayer::ApiRequest;
/// use netlayer::rest::upload::Upload;
///
/// let upload = Upload::new("avatar.png", vec![0x89, b'P', b'N', b'G'])
///     .field("userId", "7");
/// let request = ApiRequest::post("/users/{id}/avatar")
///     .path_param("id", "7")
///     .upload(upload);
/// ```
#[derive(Debug, Clone)]
pub struct Upload {
    file_name: String,
    content: Vec<u8>,
    field_name: String,
    fields: HashMap<String, String>,
    mime_type: Option<String>,
}

impl Upload {
    #[must_use]
    pub fn new<S: Into<String>>(file_name: S, content: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content,
            field_name: DEFAULT_FIELD_NAME.to_owned(),
            fields: HashMap::new(),
            mime_type: None,
        }
    }

    /// Name of the form part carrying the file. Defaults to `File`.
    #[must_use]
    pub fn field_name<S: Into<String>>(mut self, name: S) -> Self {
        self.field_name = name.into();
        self
    }

    #[must_use]
    pub fn field<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Overrides the content type guessed from the file extension.
    #[must_use]
    pub fn mime_type<S: Into<String>>(mut self, mime_type: S) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The content type the file part is sent with.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.mime_type
            .as_deref()
            .unwrap_or_else(|| detect_mime_type(&self.file_name))
    }

    pub(crate) fn into_form(self) -> reqwest::Result<Form> {
        let content_type = self.content_type().to_owned();
        let part = Part::bytes(self.content)
            .file_name(self.file_name)
            .mime_str(&content_type)?;

        let mut form = Form::new().part(self.field_name, part);
        for (key, value) in self.fields {
            form = form.text(key, value);
        }

        Ok(form)
    }
}

/// Guesses a content type from the extension of `file_name`, falling back to
/// `application/octet-stream`.
#[must_use]
pub fn detect_mime_type(file_name: &str) -> &'static str {
    let Some(extension) = Path::new(file_name).extension().and_then(|e| e.to_str()) else {
        return OCTET_STREAM;
    };

    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "xml" => "application/xml",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "zip" => "application/zip",
        _ => OCTET_STREAM,
    }
}
