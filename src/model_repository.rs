use crate::detection::{FaceOverlayError, FaceOverlayResult, ModelKind};
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Weights location used by development builds.
pub const DEVELOPMENT_WEIGHTS_DIR: &str = "weights";

/// Weights location used by deployed builds.
pub const PRODUCTION_WEIGHTS_URL: &str = "https://axiom777.github.io/face-detection/weights";

/// Selects where model weights come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// `Development` for debug builds, `Production` otherwise.
    pub fn from_build() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Development
        } else {
            BuildMode::Production
        }
    }
}

/// Base location serving the three weights files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WeightsLocation {
    /// Directory on the local filesystem.
    Local(PathBuf),
    /// HTTP(S) base URL; files are fetched with a plain GET.
    Remote(String),
}

impl WeightsLocation {
    pub fn for_build_mode(mode: BuildMode) -> Self {
        match mode {
            BuildMode::Development => WeightsLocation::Local(PathBuf::from(DEVELOPMENT_WEIGHTS_DIR)),
            BuildMode::Production => WeightsLocation::Remote(PRODUCTION_WEIGHTS_URL.to_string()),
        }
    }

    /// URL of one weights file under a remote base.
    fn join_url(base: &str, file_name: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), file_name)
    }
}

pub trait ModelRepository {
    /// Resolves the weights of one stage to a local file, fetching it if needed.
    fn get_model(&self, kind: ModelKind) -> FaceOverlayResult<PathBuf>;
}

fn download_file(url: &str, destination: &Path) -> FaceOverlayResult<()> {
    fn get_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers
    }

    info!("Downloading {url}");
    let client = reqwest::blocking::Client::new();
    let mut response = client.get(url).headers(get_headers()).send()?;
    if !response.status().is_success() {
        return Err(FaceOverlayError::Download(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }

    // Only complete downloads carry the final name.
    let partial = destination.with_extension("part");
    {
        let file = File::create(&partial)?;
        let mut writer = BufWriter::new(file);
        response.copy_to(&mut writer)?;
    }
    std::fs::rename(&partial, destination)?;
    Ok(())
}

/// Default cache directory for downloaded weights.
pub fn default_cache_dir() -> FaceOverlayResult<PathBuf> {
    let home_dir = home::home_dir().ok_or_else(|| {
        FaceOverlayError::Other("Failed to get home directory.".to_string())
    })?;
    Ok(home_dir.join(".face_overlay").join("weights"))
}

/// Repository serving weights from a [`WeightsLocation`].
///
/// Local locations are read in place. Remote files are downloaded once into
/// the cache directory and reused afterwards.
pub struct WeightsRepository {
    location: WeightsLocation,
    cache_dir: PathBuf,
}

impl WeightsRepository {
    pub fn new(location: WeightsLocation, cache_dir: PathBuf) -> WeightsRepository {
        WeightsRepository {
            location,
            cache_dir,
        }
    }

    pub fn location(&self) -> &WeightsLocation {
        &self.location
    }
}

impl ModelRepository for WeightsRepository {
    fn get_model(&self, kind: ModelKind) -> FaceOverlayResult<PathBuf> {
        match &self.location {
            WeightsLocation::Local(dir) => {
                let path = dir.join(kind.file_name());
                if !path.is_file() {
                    return Err(FaceOverlayError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("weights file {} not found", path.display()),
                    )));
                }
                Ok(path)
            }
            WeightsLocation::Remote(base) => {
                std::fs::create_dir_all(&self.cache_dir)?;
                let dest_filepath = self.cache_dir.join(kind.file_name());
                if dest_filepath.exists() {
                    debug!("Using cached {}", dest_filepath.display());
                } else {
                    download_file(
                        &WeightsLocation::join_url(base, kind.file_name()),
                        &dest_filepath,
                    )?;
                }
                Ok(dest_filepath)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BuildMode::Development, WeightsLocation::Local(PathBuf::from("weights")))]
    #[case(
        BuildMode::Production,
        WeightsLocation::Remote(PRODUCTION_WEIGHTS_URL.to_string())
    )]
    fn location_follows_build_mode(#[case] mode: BuildMode, #[case] expected: WeightsLocation) {
        assert_eq!(WeightsLocation::for_build_mode(mode), expected);
    }

    #[test]
    fn join_url_handles_trailing_slash() {
        assert_eq!(
            WeightsLocation::join_url("https://host/weights/", "a.onnx"),
            "https://host/weights/a.onnx"
        );
        assert_eq!(
            WeightsLocation::join_url("https://host/weights", "a.onnx"),
            "https://host/weights/a.onnx"
        );
    }

    #[test]
    fn local_repository_resolves_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ModelKind::Landmarks.file_name()), b"weights").unwrap();
        let repo = WeightsRepository::new(
            WeightsLocation::Local(dir.path().to_path_buf()),
            dir.path().join("cache"),
        );

        let path = repo.get_model(ModelKind::Landmarks).unwrap();
        assert_eq!(path, dir.path().join("face_landmark_68.onnx"));
        assert!(repo.get_model(ModelKind::Detector).is_err());
    }

    #[test]
    fn remote_repository_reuses_cached_files() {
        let cache = tempfile::tempdir().unwrap();
        let cached = cache.path().join(ModelKind::Recognition.file_name());
        std::fs::write(&cached, b"weights").unwrap();
        // Unroutable base: any download attempt would fail.
        let repo = WeightsRepository::new(
            WeightsLocation::Remote("http://127.0.0.1:9/weights".to_string()),
            cache.path().to_path_buf(),
        );

        assert_eq!(repo.get_model(ModelKind::Recognition).unwrap(), cached);
        assert!(repo.get_model(ModelKind::Detector).is_err());
    }
}
