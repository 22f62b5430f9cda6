//! The result of a successful build.
//!
//! - [`Artifact`] - what every build result exposes
//! - [`ImageArtifact`] - one machine image per region
//! - [`ImageDestroyer`] - deletes a single image; supplied by the provider

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{BakeryError, Result};
use crate::steps::{GeneratedData, ImageMap};

/// Name of the state exposing generated data.
pub const ARTIFACT_STATE_GENERATED_DATA: &str = "generated_data";

/// A build result.
pub trait Artifact: fmt::Display + Send + Sync {
    /// Id of the builder that produced this artifact.
    fn builder_id(&self) -> &str;

    /// Local files making up the artifact, if any.
    fn files(&self) -> Vec<String>;

    /// Unique id of the artifact.
    fn id(&self) -> String;

    /// Named extra state, such as generated data.
    fn state(&self, name: &str) -> Option<Value>;

    /// Delete the artifact.
    fn destroy(&self) -> Result<()>;
}

/// Deletes one image in one region.
pub trait ImageDestroyer: Send + Sync {
    /// Delete `image_id` in `region`.
    fn destroy_image(&self, region: &str, image_id: &str) -> Result<()>;
}

impl<F> ImageDestroyer for F
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync,
{
    fn destroy_image(&self, region: &str, image_id: &str) -> Result<()> {
        self(region, image_id)
    }
}

/// Machine images, one per region.
///
/// # Example
///
/// ```
/// use bakery::artifact::{Artifact, ImageArtifact};
/// use bakery::steps::ImageMap;
///
/// let mut images = ImageMap::new();
/// images.insert("us-east-1".to_string(), "ami-1".to_string());
/// images.insert("eu-west-1".to_string(), "ami-2".to_string());
///
/// let artifact = ImageArtifact::new("bakery.chroot", images);
/// assert_eq!(artifact.id(), "eu-west-1:ami-2,us-east-1:ami-1");
/// assert_eq!(
///     artifact.to_string(),
///     "Images were created:\n  eu-west-1: ami-2\n  us-east-1: ami-1\n"
/// );
/// ```
#[derive(Clone)]
pub struct ImageArtifact {
    builder_id: String,
    images: ImageMap,
    generated_data: GeneratedData,
    destroyer: Option<Arc<dyn ImageDestroyer>>,
}

impl ImageArtifact {
    /// Create an artifact for `images` with no destroyer.
    pub fn new(builder_id: impl Into<String>, images: ImageMap) -> Self {
        Self {
            builder_id: builder_id.into(),
            images,
            generated_data: GeneratedData::new(),
            destroyer: None,
        }
    }

    /// Attach data generated during the build.
    pub fn with_generated_data(mut self, data: GeneratedData) -> Self {
        self.generated_data = data;
        self
    }

    /// Attach the provider's image destroyer.
    pub fn with_destroyer(mut self, destroyer: Arc<dyn ImageDestroyer>) -> Self {
        self.destroyer = Some(destroyer);
        self
    }

    /// The images, keyed by region.
    pub fn images(&self) -> &ImageMap {
        &self.images
    }
}

impl Artifact for ImageArtifact {
    fn builder_id(&self) -> &str {
        &self.builder_id
    }

    fn files(&self) -> Vec<String> {
        Vec::new()
    }

    fn id(&self) -> String {
        self.images
            .iter()
            .map(|(region, id)| format!("{}:{}", region, id))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn state(&self, name: &str) -> Option<Value> {
        if name != ARTIFACT_STATE_GENERATED_DATA {
            return None;
        }
        let map = self
            .generated_data
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<serde_json::Map<_, _>>();
        Some(Value::Object(map))
    }

    /// Destroy every image, even after a failure, and report all failures.
    fn destroy(&self) -> Result<()> {
        let Some(destroyer) = &self.destroyer else {
            return Err(BakeryError::ArtifactDestroy {
                message: format!("no destroyer configured for {}", self.builder_id),
            });
        };

        let mut failures = BTreeMap::new();
        for (region, image_id) in &self.images {
            debug!("Destroying image {} in {}", image_id, region);
            if let Err(err) = destroyer.destroy_image(region, image_id) {
                warn!("Failed to destroy {} in {}: {}", image_id, region, err);
                failures.insert(region.clone(), format!("{}: {}", image_id, err));
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        let message = failures
            .iter()
            .map(|(region, failure)| format!("{} ({})", failure, region))
            .collect::<Vec<_>>()
            .join("; ");
        Err(BakeryError::ArtifactDestroy { message })
    }
}

impl fmt::Display for ImageArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Images were created:")?;
        for (region, id) in &self.images {
            writeln!(f, "  {}: {}", region, id)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ImageArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageArtifact")
            .field("builder_id", &self.builder_id)
            .field("images", &self.images)
            .field("generated_data", &self.generated_data)
            .field("destroyer", &self.destroyer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn images() -> ImageMap {
        let mut images = ImageMap::new();
        images.insert("us-east-1".into(), "ami-1".into());
        images.insert("eu-west-1".into(), "ami-2".into());
        images
    }

    #[test]
    fn id_joins_regions_in_order() {
        let artifact = ImageArtifact::new("bakery.chroot", images());
        assert_eq!(artifact.id(), "eu-west-1:ami-2,us-east-1:ami-1");
        assert_eq!(artifact.builder_id(), "bakery.chroot");
        assert!(artifact.files().is_empty());
    }

    #[test]
    fn display_lists_each_image() {
        let artifact = ImageArtifact::new("bakery.chroot", images());
        let text = artifact.to_string();
        assert!(text.starts_with("Images were created:\n"));
        assert!(text.contains("  us-east-1: ami-1\n"));
    }

    #[test]
    fn generated_data_state() {
        let mut data = GeneratedData::new();
        data.insert("SourceImage".into(), "ami-0abc".into());
        let artifact = ImageArtifact::new("bakery.chroot", images()).with_generated_data(data);

        let state = artifact.state("generated_data").unwrap();
        assert_eq!(state["SourceImage"], "ami-0abc");
        assert!(artifact.state("atlas.artifact.metadata").is_none());
    }

    #[test]
    fn destroy_visits_every_image() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let destroyer = move |region: &str, id: &str| -> Result<()> {
            sink.lock().unwrap().push(format!("{}:{}", region, id));
            Ok(())
        };
        let artifact = ImageArtifact::new("bakery.chroot", images()).with_destroyer(Arc::new(destroyer));

        artifact.destroy().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["eu-west-1:ami-2", "us-east-1:ami-1"]);
    }

    #[test]
    fn destroy_collects_every_failure() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let destroyer = move |_: &str, id: &str| -> Result<()> {
            *counter.lock().unwrap() += 1;
            Err(BakeryError::StepExecutionError {
                step: "deregister".into(),
                message: format!("{} is in use", id),
            })
        };
        let artifact = ImageArtifact::new("bakery.chroot", images()).with_destroyer(Arc::new(destroyer));

        let err = artifact.destroy().unwrap_err().to_string();

        assert_eq!(*calls.lock().unwrap(), 2);
        assert!(err.contains("ami-1 is in use"));
        assert!(err.contains("ami-2 is in use"));
    }

    #[test]
    fn destroy_without_destroyer_fails() {
        let artifact = ImageArtifact::new("bakery.chroot", images());
        assert!(matches!(
            artifact.destroy(),
            Err(BakeryError::ArtifactDestroy { .. })
        ));
    }
}
