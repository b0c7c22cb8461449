use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

pub const PRESCRIPTION_DIR: &str = "prescriptions";

const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/gif"];

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file uploaded")]
    Missing,
    #[error("Invalid file type. Only JPEG, PNG, JPG and GIF files are allowed.")]
    InvalidType,
    #[error("File too large (limit {limit} bytes)")]
    TooLarge { limit: usize },
    #[error("Upload I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A prescription image written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub file_name: String,
    /// Path the image is served under, e.g. `/uploads/prescriptions/<file>`.
    pub public_path: String,
}

pub async fn ensure_upload_dirs(upload_dir: &Path) -> Result<(), UploadError> {
    tokio::fs::create_dir_all(upload_dir.join(PRESCRIPTION_DIR)).await?;
    Ok(())
}

fn extension_for(original_name: Option<&str>, content_type: &str) -> String {
    let from_name = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));

    match from_name {
        Some(ext) => format!(".{}", ext),
        None => match content_type {
            "image/png" => ".png",
            "image/gif" => ".gif",
            _ => ".jpg",
        }
        .to_string(),
    }
}

/// Checks the content type and size, then stores the bytes under a fresh
/// UUID file name in the prescriptions directory.
pub async fn save_prescription_image(
    upload_dir: &Path,
    max_bytes: usize,
    original_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<StoredImage, UploadError> {
    let content_type = content_type
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| ALLOWED_TYPES.contains(&ct.as_str()))
        .ok_or(UploadError::InvalidType)?;
    if bytes.is_empty() {
        return Err(UploadError::Missing);
    }
    if bytes.len() > max_bytes {
        return Err(UploadError::TooLarge { limit: max_bytes });
    }

    let file_name = format!(
        "{}{}",
        Uuid::new_v4(),
        extension_for(original_name, &content_type)
    );
    let dir: PathBuf = upload_dir.join(PRESCRIPTION_DIR);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&file_name), bytes).await?;

    log::info!("Stored prescription image {} ({} bytes)", file_name, bytes.len());
    Ok(StoredImage {
        public_path: format!("/uploads/{}/{}", PRESCRIPTION_DIR, file_name),
        file_name,
    })
}

/// Deletes a stored prescription image. A missing file is not an error.
pub async fn remove_prescription_image(
    upload_dir: &Path,
    file_name: &str,
) -> Result<(), UploadError> {
    match tokio::fs::remove_file(upload_dir.join(PRESCRIPTION_DIR).join(file_name)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_the_original_name() {
        assert_eq!(extension_for(Some("scan.PNG"), "image/png"), ".png");
        assert_eq!(extension_for(Some("scan"), "image/gif"), ".gif");
        assert_eq!(extension_for(None, "image/jpeg"), ".jpg");
    }

    #[test]
    fn extension_is_limited_to_images() {
        assert_eq!(extension_for(Some("rx.html"), "image/png"), ".png");
        assert_eq!(extension_for(Some("rx.svg"), "image/gif"), ".gif");
        assert_eq!(extension_for(Some("rx.JPEG"), "image/jpeg"), ".jpeg");
    }

    #[tokio::test]
    async fn stores_image_under_prescriptions() {
        let dir = tempfile::tempdir().unwrap();
        let stored = save_prescription_image(
            dir.path(),
            1024,
            Some("rx.jpg"),
            Some("image/jpeg"),
            b"\xff\xd8\xff\xe0fake",
        )
        .await
        .unwrap();

        assert!(stored.file_name.ends_with(".jpg"));
        assert_eq!(
            stored.public_path,
            format!("/uploads/prescriptions/{}", stored.file_name)
        );
        let path = dir.path().join("prescriptions").join(&stored.file_name);
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, b"\xff\xd8\xff\xe0fake");

        remove_prescription_image(dir.path(), &stored.file_name)
            .await
            .unwrap();
        assert!(!path.exists());
        remove_prescription_image(dir.path(), &stored.file_name)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_wrong_type_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let wrong = save_prescription_image(
            dir.path(),
            1024,
            Some("rx.pdf"),
            Some("application/pdf"),
            b"%PDF",
        )
        .await;
        assert!(matches!(wrong, Err(UploadError::InvalidType)));

        let big = vec![0u8; 2048];
        let oversized = save_prescription_image(
            dir.path(),
            1024,
            Some("rx.png"),
            Some("image/png"),
            &big,
        )
        .await;
        assert!(matches!(oversized, Err(UploadError::TooLarge { limit: 1024 })));
    }
}
