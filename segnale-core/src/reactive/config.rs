//! Runtime configuration.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use super::runtime::Runtime;
use crate::error::ReactiveError;

/// Wrapper invoked around scheduler flushes and [`Runtime::run_in_batch`].
///
/// Must call the callback it receives exactly once. Hosts install one to
/// fold reactive updates into their own update cycle.
pub type BatchUpdates = Rc<dyn Fn(&mut dyn FnMut())>;

/// Hook receiving errors that the runtime reports but does not propagate.
pub type ErrorHook = Rc<dyn Fn(&ReactiveError)>;

/// Default label attached to the runtime's tracing events.
pub const DEFAULT_LABEL: &str = "segnale";

/// Settings of a [`Runtime`].
#[derive(Clone)]
pub struct RuntimeConfig {
    pub(crate) label: Cow<'static, str>,
    pub(crate) batch_updates: Option<BatchUpdates>,
    pub(crate) error_hook: Option<ErrorHook>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            label: Cow::Borrowed(DEFAULT_LABEL),
            batch_updates: None,
            error_hook: None,
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("label", &self.label)
            .field("batch_updates", &self.batch_updates.is_some())
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}

/// Builder for configuring a [`Runtime`].
///
/// # Example
///
/// ```
/// use segnale_core::Runtime;
///
/// let runtime = Runtime::builder()
///     .label("settings-panel")
///     .on_error(|err| eprintln!("reactive error: {err}"))
///     .build();
///
/// assert_eq!(runtime.label(), "settings-panel");
/// ```
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    /// Create a builder with default settings.
    ///
    /// Defaults:
    /// - `label`: `"segnale"`
    /// - `batch_updates`: direct invocation
    /// - `on_error`: none (errors are only logged)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label attached to this runtime's tracing events.
    pub fn label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Install the initial batch wrapper.
    pub fn batch_updates<F>(mut self, wrapper: F) -> Self
    where
        F: Fn(&mut dyn FnMut()) + 'static,
    {
        self.config.batch_updates = Some(Rc::new(wrapper));
        self
    }

    /// Install a hook for errors that are reported but not propagated, such
    /// as failing async effects.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ReactiveError) + 'static,
    {
        self.config.error_hook = Some(Rc::new(hook));
        self
    }

    /// Build the runtime.
    pub fn build(self) -> Runtime {
        Runtime::with_config(self.config)
    }
}
