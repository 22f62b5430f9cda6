//! The shared state bag threaded through one build.
//!
//! Keys are agreed on by convention between the step that writes a value and
//! the steps that read it. Values are stored type-erased and read back by
//! type, so a reader that asks for the wrong type gets an error instead of a
//! bogus value.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{BakeryError, Result};
use crate::ui::SharedUi;

/// Key under which a failing step records its error.
pub const STATE_ERROR: &str = "error";
/// Key set by the runner when the build was cancelled.
pub const STATE_CANCELLED: &str = "cancelled";
/// Key set by the runner when a step halted the build.
pub const STATE_HALTED: &str = "halted";
/// Key holding the [`SharedUi`] for steps.
pub const STATE_UI: &str = "ui";
/// Key holding the build's [`CommandWrapper`](crate::template::CommandWrapper).
pub const STATE_WRAPPED_COMMAND: &str = "wrapped_command";
/// Key holding the provisioning [`SharedHook`](crate::steps::SharedHook).
pub const STATE_HOOK: &str = "hook";
/// Key holding the [`SharedCommunicator`](crate::steps::SharedCommunicator).
pub const STATE_COMMUNICATOR: &str = "communicator";
/// Key holding the region to image id map the artifact is built from.
pub const STATE_IMAGES: &str = "images";
/// Key holding data generated during the build, exposed to hooks.
pub const STATE_GENERATED_DATA: &str = "generated_data";
/// Key holding the build name.
pub const STATE_BUILD_NAME: &str = "build_name";
/// Key holding the loaded [`BuildConfig`](crate::config::BuildConfig).
pub const STATE_CONFIG: &str = "config";
/// Key holding the [`InterpolationContext`](crate::template::InterpolationContext)
/// for `${}` references in step commands.
pub const STATE_INTERPOLATION: &str = "interpolation";

/// The error a failed step leaves behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StepError {
    /// Human-readable failure message.
    pub message: String,
}

impl StepError {
    /// Create a step error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type Value = Arc<dyn Any + Send + Sync>;

/// Concurrency-safe key/value store shared by every step of a build.
///
/// Cloning a `StateBag` clones the handle, not the contents, so a step may
/// pass it to worker threads.
///
/// # Example
///
/// ```
/// use bakery::multistep::StateBag;
///
/// let state = StateBag::new();
/// state.put("volume_id", "vol-0123".to_string());
///
/// let id: String = state.get("volume_id").unwrap();
/// assert_eq!(id, "vol-0123");
/// assert!(state.get_ok::<String>("instance").is_none());
/// ```
#[derive(Clone, Default)]
pub struct StateBag {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl StateBag {
    /// Create an empty state bag.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite a value.
    pub fn put<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.write().insert(key.into(), Arc::new(value));
    }

    /// Read a value that an earlier step is required to have written.
    ///
    /// # Errors
    ///
    /// `StateKeyMissing` when the key was never written, `StateTypeMismatch`
    /// when it holds a value of another type.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Result<T> {
        let values = self.read();
        let value = values
            .get(key)
            .ok_or_else(|| BakeryError::StateKeyMissing {
                key: key.to_string(),
            })?;

        (**value)
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| BakeryError::StateTypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Read an optional value.
    ///
    /// Returns `None` when the key is absent or holds another type.
    pub fn get_ok<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.read()
            .get(key)
            .and_then(|value| (**value).downcast_ref::<T>().cloned())
    }

    /// Whether a value is stored under `key`, whatever its type.
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Remove a value, returning whether one was present.
    pub fn remove(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Record the error that halts the build.
    pub fn put_error(&self, error: impl Into<StepError>) {
        self.put(STATE_ERROR, error.into());
    }

    /// The error recorded by a failing step, if any.
    pub fn error(&self) -> Option<StepError> {
        self.get_ok(STATE_ERROR)
    }

    /// Whether the runner recorded a cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.get_ok::<bool>(STATE_CANCELLED).unwrap_or(false)
    }

    /// Whether the runner recorded a halt.
    pub fn is_halted(&self) -> bool {
        self.get_ok::<bool>(STATE_HALTED).unwrap_or(false)
    }

    /// The UI handle placed in the bag by the caller.
    pub fn ui(&self) -> Option<SharedUi> {
        self.get_ok(STATE_UI)
    }

    /// Read a value as a display string, for `${key}` interpolation.
    ///
    /// Strings and common scalar types are supported.
    pub fn get_display(&self, key: &str) -> Option<String> {
        let values = self.read();
        let value = values.get(key)?;
        let any: &(dyn Any + Send + Sync) = &**value;

        if let Some(s) = any.downcast_ref::<String>() {
            return Some(s.clone());
        }
        if let Some(s) = any.downcast_ref::<&'static str>() {
            return Some((*s).to_string());
        }
        if let Some(n) = any.downcast_ref::<i64>() {
            return Some(n.to_string());
        }
        if let Some(n) = any.downcast_ref::<u64>() {
            return Some(n.to_string());
        }
        if let Some(b) = any.downcast_ref::<bool>() {
            return Some(b.to_string());
        }
        None
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl fmt::Debug for StateBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBag")
            .field("keys", &self.keys())
            .finish()
    }
}
