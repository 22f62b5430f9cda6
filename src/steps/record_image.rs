//! Recording produced images for the artifact.

use std::collections::BTreeMap;

use super::{fail, interpolate};
use crate::error::{BakeryError, Result};
use crate::multistep::{CancelToken, StateBag, Step, StepAction, STATE_GENERATED_DATA, STATE_IMAGES};

use super::provision::GeneratedData;

/// Region to image id, in region order.
pub type ImageMap = BTreeMap<String, String>;

/// Adds one image to the `"images"` map the artifact is built from.
///
/// Both fields may contain `${}` references, usually to the output of the
/// step that registered the image. The image id is also exposed to hooks
/// as generated data `ImageId`.
///
/// # Example
///
/// ```
/// use bakery::multistep::{CancelToken, StateBag, Step};
/// use bakery::steps::{ImageMap, StepRecordImage};
///
/// let state = StateBag::new();
/// state.put("image_id", "ami-0123".to_string());
///
/// let mut step = StepRecordImage::new("us-east-1", "${image_id}");
/// step.run(&CancelToken::new(), &state);
///
/// let images: ImageMap = state.get("images").unwrap();
/// assert_eq!(images["us-east-1"], "ami-0123");
/// ```
#[derive(Debug, Clone)]
pub struct StepRecordImage {
    region: String,
    image_id: String,
}

impl StepRecordImage {
    /// Create a step recording `image_id` in `region`.
    pub fn new(region: impl Into<String>, image_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            image_id: image_id.into(),
        }
    }

    fn record(&self, state: &StateBag) -> Result<(String, String)> {
        let region = interpolate(&self.region, state)?.trim().to_string();
        let image_id = interpolate(&self.image_id, state)?.trim().to_string();
        if region.is_empty() || image_id.is_empty() {
            return Err(BakeryError::StepExecutionError {
                step: "record_image".to_string(),
                message: format!(
                    "region '{}' and image id '{}' must both be non-empty",
                    region, image_id
                ),
            });
        }

        let mut images: ImageMap = state.get_ok(STATE_IMAGES).unwrap_or_default();
        images.insert(region.clone(), image_id.clone());
        state.put(STATE_IMAGES, images);

        let mut data: GeneratedData = state.get_ok(STATE_GENERATED_DATA).unwrap_or_default();
        data.insert("ImageId".to_string(), image_id.clone());
        state.put(STATE_GENERATED_DATA, data);

        Ok((region, image_id))
    }
}

impl Step for StepRecordImage {
    fn name(&self) -> &str {
        "record_image"
    }

    fn run(&mut self, _cancel: &CancelToken, state: &StateBag) -> StepAction {
        match self.record(state) {
            Ok((region, image_id)) => {
                if let Some(ui) = state.ui() {
                    ui.message(&format!("{}: {}", region, image_id));
                }
                StepAction::Continue
            }
            Err(err) => fail(state, err),
        }
    }
}
