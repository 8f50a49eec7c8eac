use remote_hooks_runtime::{location_key, ComposeError, Composition, Key, RuntimeHandle};

/// Headless harness for exercising compositions in tests.
///
/// Owns a [`Composition`] and the installed content, and drives spawned
/// loads and invalidated scopes until nothing is left to do.
pub struct ComposeTestRule {
    composition: Composition,
    content: Option<Box<dyn FnMut()>>, // Stored user content for reuse across recompositions.
    root_key: Key,
    renders: usize,
}

impl ComposeTestRule {
    pub fn new() -> Self {
        Self {
            composition: Composition::new(),
            content: None,
            root_key: location_key(file!(), line!(), column!()),
            renders: 0,
        }
    }

    /// Install the provided content into the composition and perform an
    /// initial render.
    pub fn set_content(&mut self, content: impl FnMut() + 'static) -> Result<(), ComposeError> {
        self.content = Some(Box::new(content));
        self.render()
    }

    /// Force a full recomposition from the root using the installed content.
    pub fn recomposition(&mut self) -> Result<(), ComposeError> {
        self.render()
    }

    /// Poll ready tasks and recompose invalidated scopes until neither is
    /// left. Tasks still waiting on something outside the runtime (such as a
    /// deferred load) stay pending.
    pub fn pump_until_idle(&mut self) -> Result<(), ComposeError> {
        loop {
            let mut progressed = false;
            let handle = self.composition.runtime_handle();

            if handle.has_ready_tasks() {
                self.composition.run_tasks().inspect_err(|err| {
                    log::error!("pump_until_idle failed while running tasks: {err}");
                })?;
                progressed = true;
            }

            if handle.has_invalid_scopes() {
                self.composition.process_invalid_scopes().inspect_err(|err| {
                    log::error!("pump_until_idle failed while recomposing: {err}");
                })?;
                progressed = true;
            }

            if !progressed {
                break;
            }
        }
        Ok(())
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.composition.runtime_handle()
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Number of full renders performed so far.
    pub fn render_count(&self) -> usize {
        self.renders
    }

    pub fn composition(&mut self) -> &mut Composition {
        &mut self.composition
    }

    /// Drop the installed content and render nothing, disposing everything
    /// the content composed.
    pub fn clear_content(&mut self) -> Result<(), ComposeError> {
        self.content = None;
        self.composition.render(self.root_key, || {})?;
        self.pump_until_idle()
    }

    fn render(&mut self) -> Result<(), ComposeError> {
        if let Some(content) = self.content.as_mut() {
            self.composition.render(self.root_key, &mut **content)?;
            self.renders += 1;
        }
        self.pump_until_idle()
    }
}

impl Default for ComposeTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `ComposeTestRule`.
pub fn run_test_composition<R>(f: impl FnOnce(&mut ComposeTestRule) -> R) -> R {
    let mut rule = ComposeTestRule::new();
    f(&mut rule)
}
