use std::path::{Path, PathBuf};

use anyhow::Result;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Public prefix under which the media directory is served.
pub const MEDIA_URL: &str = "/media";

/// Subdirectory of the media root holding post images.
const POST_IMAGE_DIR: &str = "posts";

/// An image file submitted with a post form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedImage {
    /// Lowercased extension of the client file name, or `img` if it has none usable.
    fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "img".to_string())
    }
}

/// File-backed blob storage for post images.
///
/// Each image is stored as `{root}/posts/{uuid}.{ext}`; posts reference it by
/// the path relative to `root`.
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(root.join(POST_IMAGE_DIR)).await?;
        info!("Media directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the image and returns its path relative to the media root.
    pub async fn save_post_image(&self, image: &UploadedImage) -> Result<String> {
        let relative = format!("{}/{}.{}", POST_IMAGE_DIR, Uuid::new_v4(), image.extension());
        let path = self.root.join(&relative);

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(&image.bytes).await?;
        file.flush().await?;

        info!("Stored post image {} ({} bytes)", relative, image.bytes.len());
        Ok(relative)
    }

    /// Best-effort removal of an image that never made it into the database.
    pub async fn discard(&self, relative: &str) {
        let path = self.root.join(relative);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove orphaned image {}: {}", path.display(), e);
        }
    }
}

/// Public URL of a stored media file.
pub fn url_for(relative: &str) -> String {
    format!("{}/{}", MEDIA_URL, relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(filename: &str) -> UploadedImage {
        UploadedImage {
            filename: filename.to_string(),
            bytes: Bytes::from_static(b"GIF89a"),
        }
    }

    #[test]
    fn extension_is_sanitised() {
        assert_eq!(image("photo.PNG").extension(), "png");
        assert_eq!(image("archive.tar.gz").extension(), "gz");
        assert_eq!(image("noext").extension(), "img");
        assert_eq!(image("weird.p$g").extension(), "img");
    }

    #[tokio::test]
    async fn saved_image_lands_under_posts() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf()).await.unwrap();

        let relative = store.save_post_image(&image("small.gif")).await.unwrap();
        assert!(relative.starts_with("posts/"));
        assert!(relative.ends_with(".gif"));
        assert_eq!(std::fs::read(dir.path().join(&relative)).unwrap(), b"GIF89a");
        assert_eq!(url_for(&relative), format!("/media/{relative}"));
    }
}
