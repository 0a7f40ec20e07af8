use std::fs;
use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::errors::{FeatureError, Result};

/// Dump an image, its mask and every crop taken from it into `dir` for
/// visual inspection: `main.jpg`, `seg.jpg` and `<i>.jpg`.
pub fn store_windows(
    dir: &Path,
    crops: &[RgbImage],
    image: &RgbImage,
    mask: Option<&GrayImage>,
) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| FeatureError::FileSystem {
        path: dir.to_path_buf(),
        operation: "debug directory creation".to_string(),
        source: e,
    })?;

    let save_error = |path: &Path, e: image::ImageError| FeatureError::ImageProcessing {
        path: path.display().to_string(),
        operation: "debug image saving".to_string(),
        source: Box::new(e),
    };

    let path = dir.join("main.jpg");
    image.save(&path).map_err(|e| save_error(&path, e))?;

    if let Some(mask) = mask {
        let path = dir.join("seg.jpg");
        mask.save(&path).map_err(|e| save_error(&path, e))?;
    }

    for (i, crop) in crops.iter().enumerate() {
        let path = dir.join(format!("{i}.jpg"));
        crop.save(&path).map_err(|e| save_error(&path, e))?;
    }

    tracing::debug!("Stored {} windows in {}", crops.len(), dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::solid_image;
    use tempfile::TempDir;

    #[test]
    fn test_store_windows() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let dir = temp_dir.path().join("img0");
        let crops = vec![solid_image(4, 4, 10), solid_image(4, 4, 20)];

        store_windows(&dir, &crops, &solid_image(16, 16, 0), Some(&GrayImage::new(16, 16)))?;

        for name in ["main.jpg", "seg.jpg", "0.jpg", "1.jpg"] {
            assert!(dir.join(name).is_file(), "{name} missing");
        }
        Ok(())
    }
}
