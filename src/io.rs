use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use walkdir::WalkDir;

use crate::errors::{FeatureError, Result};
use crate::region::Region;

/// Extensions picked up by [`collect_images`], compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Recursively list the images under `dir`, relative to `dir`, sorted.
///
/// A missing directory yields an empty list.
pub fn collect_images(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        tracing::warn!("Image directory {} does not exist", dir.display());
        return Vec::new();
    }

    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_supported_image(e.path()))
        .filter_map(|e| e.path().strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect();
    images.sort();

    tracing::info!("Found {} image file(s) in {}", images.len(), dir.display());
    images
}

fn read_to_string(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| FeatureError::FileSystem {
        path: path.to_path_buf(),
        operation: operation.to_string(),
        source: e,
    })
}

/// Parse one `y1 x1 y2 x2` row (1-based, comma or whitespace separated) into
/// a 0-based region.
pub fn parse_region(line: &str) -> std::result::Result<Region, String> {
    let values = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| format!("`{token}` is not a number"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let [y1, x1, y2, x2] = values[..] else {
        return Err(format!("expected 4 values, found {}", values.len()));
    };
    if x1 < 1.0 || y1 < 1.0 {
        return Err(format!("coordinates are 1-based, got x1={x1} y1={y1}"));
    }
    if x2 <= x1 || y2 <= y1 {
        return Err(format!("empty box ({y1}, {x1}) - ({y2}, {x2})"));
    }

    Region::new(
        (x1 - 1.0) as u32,
        (y1 - 1.0) as u32,
        (x2 - x1) as u32,
        (y2 - y1) as u32,
    )
    .map_err(|e| e.to_string())
}

/// Read a region list file. Blank lines are skipped.
pub fn read_regions(path: &Path) -> Result<Vec<Region>> {
    let content = read_to_string(path, "region list reading")?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            parse_region(line).map_err(|reason| FeatureError::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                reason,
            })
        })
        .collect()
}

/// Like [`read_regions`], but a missing file yields no regions.
pub fn load_regions(path: &Path) -> Result<Vec<Region>> {
    match read_regions(path) {
        Err(e) if e.is_not_found() => {
            tracing::warn!("Unable to open region file {}", path.display());
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Parse whitespace separated values, stopping at the first token that does
/// not parse as `T`.
pub fn parse_list<T: FromStr>(content: &str) -> Vec<T> {
    content
        .split_whitespace()
        .map_while(|token| token.parse().ok())
        .collect()
}

/// Read a whitespace separated list of values of a single type.
pub fn read_list<T: FromStr>(path: &Path) -> Result<Vec<T>> {
    Ok(parse_list(&read_to_string(path, "list reading")?))
}

/// Like [`read_list`], but a missing file yields an empty list.
pub fn load_list<T: FromStr>(path: &Path) -> Result<Vec<T>> {
    match read_list(path) {
        Err(e) if e.is_not_found() => {
            tracing::warn!("Unable to open list file {}", path.display());
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Write one descriptor per line, values separated by spaces.
pub fn write_features(path: &Path, features: &[Vec<f32>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FeatureError::FileSystem {
            path: parent.to_path_buf(),
            operation: "output directory creation".to_string(),
            source: e,
        })?;
    }

    let to_fs_error = |e: std::io::Error| FeatureError::FileSystem {
        path: path.to_path_buf(),
        operation: "feature writing".to_string(),
        source: e,
    };

    let mut writer = BufWriter::new(fs::File::create(path).map_err(to_fs_error)?);
    for vector in features {
        let line: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(" ")).map_err(to_fs_error)?;
    }
    writer.flush().map_err(to_fs_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_region_comma_separated() -> Result<()> {
        let region = parse_region("10,20,30,40").unwrap();
        assert_eq!(region, Region::new(19, 9, 20, 20)?);
        Ok(())
    }

    #[test]
    fn test_parse_region_whitespace_separated() -> Result<()> {
        assert_eq!(parse_region("  1 1\t5 9 "), Ok(Region::new(0, 0, 8, 4)?));
        assert_eq!(parse_region("1, 1, 5, 9"), parse_region("1 1 5 9"));
        Ok(())
    }

    #[test]
    fn test_parse_region_errors() {
        assert!(parse_region("1 2 3").is_err());
        assert!(parse_region("1 2 3 x").is_err());
        assert!(parse_region("0 0 10 10").is_err());
        assert!(parse_region("5 5 5 9").is_err());
    }

    #[test]
    fn test_read_regions_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("boxes.txt");
        fs::write(&path, "10,20,30,40\n\n1 1 11 21\n")?;

        let regions = read_regions(&path)?;
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1], Region::new(0, 0, 20, 10)?);
        Ok(())
    }

    #[test]
    fn test_read_regions_reports_line() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("boxes.txt");
        fs::write(&path, "10,20,30,40\n1 2\n")?;

        match read_regions(&path) {
            Err(FeatureError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_missing_region_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("absent.txt");
        assert!(read_regions(&path).unwrap_err().is_not_found());
        assert!(load_regions(&path)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_list_stops_at_first_bad_token() {
        assert_eq!(parse_list::<i32>("1 2\n3\t4"), vec![1, 2, 3, 4]);
        assert_eq!(parse_list::<f32>("0.5 1e2 oops 7"), vec![0.5, 100.0]);
        assert!(parse_list::<u8>("").is_empty());
    }

    #[test]
    fn test_missing_list_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("absent.txt");
        assert!(read_list::<f32>(&path).unwrap_err().is_not_found());
        assert!(load_list::<f32>(&path)?.is_empty());

        fs::write(&path, "3 1 2")?;
        assert_eq!(load_list::<u32>(&path)?, vec![3, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_collect_images() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("sub"))?;
        for name in ["b.jpg", "a.PNG", "sub/c.jpeg", "notes.txt", "sub/d.gif"] {
            fs::write(dir.path().join(name), b"")?;
        }

        let images = collect_images(dir.path());
        assert_eq!(
            images,
            vec![
                PathBuf::from("a.PNG"),
                PathBuf::from("b.jpg"),
                PathBuf::from("sub/c.jpeg")
            ]
        );
        assert!(collect_images(&dir.path().join("missing")).is_empty());
        Ok(())
    }

    #[test]
    fn test_write_features() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested/out.txt");
        write_features(&path, &[vec![1.0, 0.5], vec![-2.0, 0.0]])?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(content, "1 0.5\n-2 0\n");
        assert_eq!(read_list::<f32>(&path)?, vec![1.0, 0.5, -2.0, 0.0]);
        Ok(())
    }
}
