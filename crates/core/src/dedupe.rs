use std::path::Path;

use img_hash::{HashAlg, HasherConfig};
use tracing::{debug, info, warn};

use crate::{
    cache::remove_file_if_exists,
    error::{PipelineError, Result},
    types::ScreenshotRecord,
};

/// Bit fingerprint of an image's visual content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Hamming distance. Bytes present in only one fingerprint count fully.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        let common: u32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let (longer, shorter) = if self.0.len() >= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        let tail: u32 = longer[shorter.len()..].iter().map(|b| b.count_ones()).sum();
        common + tail
    }
}

pub trait PerceptualHasher: Send + Sync {
    fn hash(&self, path: &Path) -> Result<Fingerprint>;
}

/// DCT-based perceptual hash over a `hash_size x hash_size` grid
pub struct PhashHasher {
    hash_size: u32,
}

impl PhashHasher {
    pub fn new(hash_size: u32) -> Self {
        Self {
            hash_size: hash_size.max(2),
        }
    }
}

impl PerceptualHasher for PhashHasher {
    fn hash(&self, path: &Path) -> Result<Fingerprint> {
        let img = image::open(path).map_err(|e| PipelineError::ImageReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .hash_size(self.hash_size, self.hash_size)
            .to_hasher();

        Ok(Fingerprint::from_bytes(hasher.hash_image(&img).as_bytes()))
    }
}

/// Drop near-duplicate screenshots, first occurrence wins.
///
/// A screenshot whose fingerprint is within `similarity_threshold` bits of any
/// previously accepted fingerprint is dropped and its file under `dir` is
/// deleted. Accepted fingerprints never expire during a call. Screenshots whose
/// image cannot be read are skipped and their files left alone.
pub fn dedupe(
    dir: &Path,
    screenshots: Vec<ScreenshotRecord>,
    hasher: &dyn PerceptualHasher,
    similarity_threshold: u32,
) -> Vec<ScreenshotRecord> {
    let total = screenshots.len();
    let mut representatives: Vec<(Fingerprint, String)> = Vec::new();
    let mut kept = Vec::new();

    for shot in screenshots {
        let path = dir.join(&shot.filename);
        let fingerprint = match hasher.hash(&path) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(filename = %shot.filename, error = %e, "skipping unreadable screenshot");
                continue;
            }
        };

        let closest = representatives
            .iter()
            .map(|(existing, filename)| (fingerprint.distance(existing), filename.clone()))
            .min_by_key(|(distance, _)| *distance);

        match closest {
            Some((distance, original)) if distance <= similarity_threshold => {
                debug!(
                    filename = %shot.filename,
                    duplicate_of = %original,
                    distance,
                    "removing duplicate screenshot"
                );
                remove_screenshot(&path);
            }
            _ => {
                representatives.push((fingerprint, shot.filename.clone()));
                kept.push(shot);
            }
        }
    }

    info!(total, kept = kept.len(), "deduplicated screenshots");
    kept
}

/// [`dedupe`] with the perceptual hash at the given grid size
pub fn dedupe_screenshots(
    dir: &Path,
    screenshots: Vec<ScreenshotRecord>,
    hash_size: u32,
    similarity_threshold: u32,
) -> Vec<ScreenshotRecord> {
    dedupe(
        dir,
        screenshots,
        &PhashHasher::new(hash_size),
        similarity_threshold,
    )
}

fn remove_screenshot(path: &Path) {
    if let Err(e) = remove_file_if_exists(path) {
        warn!(path = %path.display(), error = %e, "failed to delete duplicate screenshot");
    }
}
