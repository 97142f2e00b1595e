//! Image service: decodes thumbnails, resized paintings and mosaics from the
//! local assets directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::point::{ImageHandle, ImageKind};

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to load {kind}/{filename}: not found")]
    Missing { filename: String, kind: ImageKind },
    #[error("failed to load {kind}/{filename}: {source}")]
    Decode {
        filename: String,
        kind: ImageKind,
        #[source]
        source: image::ImageError,
    },
    #[error("refusing path outside the assets directory: {0}")]
    InvalidName(String),
}

pub trait ImageService: Send + Sync {
    fn load_image(&self, filename: &str, kind: ImageKind) -> Result<ImageHandle, ImageLoadError>;
}

/// Reads `<root>/<kind>/<filename>`
#[derive(Debug, Clone)]
pub struct FsImageService {
    root: PathBuf,
}

impl FsImageService {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, filename: &str, kind: ImageKind) -> Result<PathBuf, ImageLoadError> {
        let relative = Path::new(filename);
        let plain = !filename.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, std::path::Component::Normal(_)));
        if !plain {
            return Err(ImageLoadError::InvalidName(filename.to_string()));
        }
        Ok(self.root.join(kind.dir_name()).join(relative))
    }
}

impl ImageService for FsImageService {
    fn load_image(&self, filename: &str, kind: ImageKind) -> Result<ImageHandle, ImageLoadError> {
        let path = self.resolve(filename, kind)?;
        if !path.is_file() {
            return Err(ImageLoadError::Missing {
                filename: filename.to_string(),
                kind,
            });
        }
        let img = image::open(&path).map_err(|source| ImageLoadError::Decode {
            filename: filename.to_string(),
            kind,
            source,
        })?;
        Ok(Arc::new(img.to_rgba8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(root: &Path, kind: ImageKind, name: &str, w: u32, h: u32) {
        let dir = root.join(kind.dir_name());
        std::fs::create_dir_all(&dir).unwrap();
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([200, 10, 10, 255]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_loads_from_kind_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), ImageKind::Thumbnail, "a.png", 8, 6);
        let svc = FsImageService::new(tmp.path());

        let img = svc.load_image("a.png", ImageKind::Thumbnail).unwrap();
        assert_eq!(img.dimensions(), (8, 6));
        assert!(matches!(
            svc.load_image("a.png", ImageKind::Resized),
            Err(ImageLoadError::Missing { .. })
        ));
    }

    #[test]
    fn test_corrupt_file_is_a_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("thumbnails");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("bad.png"), b"not a png").unwrap();
        let svc = FsImageService::new(tmp.path());
        assert!(matches!(
            svc.load_image("bad.png", ImageKind::Thumbnail),
            Err(ImageLoadError::Decode { .. })
        ));
    }

    #[test]
    fn test_rejects_traversal() {
        let svc = FsImageService::new(Path::new("assets"));
        assert!(matches!(
            svc.load_image("../secret.png", ImageKind::Thumbnail),
            Err(ImageLoadError::InvalidName(_))
        ));
        assert!(matches!(
            svc.load_image("", ImageKind::Thumbnail),
            Err(ImageLoadError::InvalidName(_))
        ));
    }
}
