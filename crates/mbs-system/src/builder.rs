//! Fluent builder for constructing a [`System`].

use std::collections::HashSet;

use mbs_state::StateConfig;

use crate::{Subsystem, System, SystemError, SystemResult};

/// Fluent builder for [`System`].
///
/// | Method            | Default                   |
/// |-------------------|---------------------------|
/// | `.config(c)`      | `StateConfig::default()`  |
/// | `.subsystem(s)`   | (at least one required)   |
///
/// # Example
///
/// ```rust,ignore
/// let mut system = SystemBuilder::new()
///     .subsystem(Pendulum::new(1.0, 9.81))
///     .subsystem(Spring::new(4.0, 0.1))
///     .build()?;
/// let mut state = system.default_state()?;
/// system.realize(&mut state, Stage::Acceleration, &mut NoopObserver)?;
/// ```
#[derive(Default)]
pub struct SystemBuilder {
    config:     StateConfig,
    subsystems: Vec<Box<dyn Subsystem>>,
}

impl SystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for every state this system creates.
    pub fn config(mut self, config: StateConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a subsystem; registration order is call order.
    pub fn subsystem(mut self, subsystem: impl Subsystem + 'static) -> Self {
        self.subsystems.push(Box::new(subsystem));
        self
    }

    /// Validate and return the [`System`].
    ///
    /// Fails if no subsystem was added or two share a name.
    pub fn build(self) -> SystemResult<System> {
        if self.subsystems.is_empty() {
            return Err(SystemError::Config("system has no subsystems".into()));
        }
        let mut seen = HashSet::new();
        for sub in &self.subsystems {
            if !seen.insert(sub.name()) {
                return Err(SystemError::Config(format!(
                    "duplicate subsystem name `{}`",
                    sub.name()
                )));
            }
        }
        Ok(System {
            config:     self.config,
            subsystems: self.subsystems,
        })
    }
}
