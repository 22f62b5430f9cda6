//! Redaction of secret values in UI and log output.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, RwLock};

use tracing_subscriber::fmt::MakeWriter;

use super::pattern::SecretMatcher;

/// Replaces registered secret values with a mask.
///
/// A masker is handed to the UI when it is created; every line the UI prints
/// goes through [`mask`](Self::mask) first.
///
/// # Example
///
/// ```
/// use bakery::secrets::OutputMasker;
///
/// let mut masker = OutputMasker::new();
/// masker.add_secret("AKIAEXAMPLE");
///
/// let output = masker.mask("using access key AKIAEXAMPLE");
/// assert_eq!(output, "using access key <sensitive>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMasker {
    /// Secret values, longest first so overlapping secrets are fully hidden.
    secrets: Vec<String>,
    mask: String,
}

/// Mask used by [`OutputMasker::new`].
pub const DEFAULT_MASK: &str = "<sensitive>";

impl OutputMasker {
    /// Create a masker with the default mask string.
    pub fn new() -> Self {
        Self::with_mask(DEFAULT_MASK)
    }

    /// Create a masker with a custom mask string.
    ///
    /// ```
    /// use bakery::secrets::OutputMasker;
    ///
    /// let mut masker = OutputMasker::with_mask("***");
    /// masker.add_secret("hunter2");
    /// assert_eq!(masker.mask("password: hunter2"), "password: ***");
    /// ```
    pub fn with_mask(mask: impl Into<String>) -> Self {
        Self {
            secrets: Vec::new(),
            mask: mask.into(),
        }
    }

    /// Register values from `vars` whose names `matcher` flags as secret.
    pub fn from_env<I, K, V>(matcher: &SecretMatcher, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut masker = Self::new();
        for (name, value) in vars {
            if matcher.is_secret(name.as_ref()) {
                masker.add_secret(value);
            }
        }
        masker
    }

    /// Register a secret value. Empty strings and duplicates are ignored.
    pub fn add_secret(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() || self.secrets.contains(&value) {
            return;
        }
        let pos = self
            .secrets
            .iter()
            .position(|s| s.len() < value.len())
            .unwrap_or(self.secrets.len());
        self.secrets.insert(pos, value);
    }

    /// Register multiple secret values.
    pub fn add_secrets(&mut self, values: impl IntoIterator<Item = impl Into<String>>) {
        for value in values {
            self.add_secret(value);
        }
    }

    /// Mask every registered secret in `input`.
    pub fn mask(&self, input: &str) -> String {
        let mut result = input.to_string();
        for secret in &self.secrets {
            if result.contains(secret.as_str()) {
                result = result.replace(secret.as_str(), &self.mask);
            }
        }
        result
    }

    /// Mask every value of a map, keeping the keys.
    pub fn mask_values(&self, values: &HashMap<String, String>) -> HashMap<String, String> {
        values
            .iter()
            .map(|(k, v)| (k.clone(), self.mask(v)))
            .collect()
    }

    /// Number of registered secrets.
    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    /// Whether no secrets are registered.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl Default for OutputMasker {
    fn default() -> Self {
        Self::new()
    }
}

/// An [`OutputMasker`] shared with the log subscriber.
///
/// Logging starts before the build file is read, so the subscriber holds
/// this handle and the build fills in its secrets with
/// [`replace`](Self::replace) once they are known.
#[derive(Debug, Clone, Default)]
pub struct LogMasker {
    inner: Arc<RwLock<OutputMasker>>,
}

impl LogMasker {
    /// Create a handle that masks nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask with `masker` from now on.
    pub fn replace(&self, masker: OutputMasker) {
        let mut current = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *current = masker;
    }

    /// The masker currently in use.
    pub fn current(&self) -> OutputMasker {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Wrap `inner` so everything written to it is masked.
    pub fn writer<W: Write>(&self, inner: W) -> MaskingWriter<W> {
        MaskingWriter {
            inner,
            masker: self.current(),
            buffer: String::new(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogMasker {
    type Writer = MaskingWriter<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer(io::stderr())
    }
}

/// A writer that masks secret values line by line.
///
/// A trailing partial line is written on flush or drop.
pub struct MaskingWriter<W: Write> {
    inner: W,
    masker: OutputMasker,
    buffer: String,
}

impl<W: Write> Write for MaskingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_str(&String::from_utf8_lossy(buf));

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            self.inner.write_all(self.masker.mask(&line).as_bytes())?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.inner.write_all(self.masker.mask(&rest).as_bytes())?;
        }
        self.inner.flush()
    }
}

impl<W: Write> Drop for MaskingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
