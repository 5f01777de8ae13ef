use std::path::Path;

use rocket::fs::TempFile;

/// Content type assumed when the upload doesn't declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Multipart body of a profile update.
#[derive(Debug, FromForm)]
pub struct ProfileUpdate<'r> {
    pub username: Option<String>,
    pub avatar: Option<TempFile<'r>>,
}

/// The extension to store an uploaded file with: from the client's file name
/// if it has a sane one, else from the declared content type.
pub fn file_extension(file: &TempFile<'_>) -> Option<String> {
    let from_name = file
        .raw_name()
        .and_then(|name| {
            Path::new(name.dangerous_unsafe_unsanitized_raw().as_str())
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_string)
        })
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    from_name
        .or_else(|| {
            file.content_type()
                .and_then(|ct| ct.extension())
                .map(|ext| ext.as_str().to_string())
        })
        .map(|ext| ext.to_ascii_lowercase())
}

/// The declared content type of an uploaded file.
pub fn content_type(file: &TempFile<'_>) -> String {
    file.content_type()
        .map(|ct| ct.to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Make an ID safe to embed in file names and object keys.
pub fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_characters() {
        assert_eq!(sanitize("abcXYZ09-_"), "abcXYZ09-_");
        assert_eq!(sanitize("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize("a b.c"), "a_b_c");
    }
}
