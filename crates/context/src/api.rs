use std::sync::{Arc, Mutex};

use crate::sink::ContextError;
use crate::statement::Statement;

/// Live renderer instance that accepts statements in-process.
///
/// Implementations forward each statement to the renderer's API without
/// touching disk.
pub trait RenderApi: Send {
    /// Human-readable name of the renderer binding, used in logs.
    fn name(&self) -> &str;

    fn call(&mut self, statement: &Statement) -> Result<(), ContextError>;

    /// Release the binding once the scene is complete.
    fn close(&mut self) -> Result<(), ContextError> {
        Ok(())
    }
}

/// In-process sink variant wrapping a [`RenderApi`].
pub struct ApiContext {
    api: Box<dyn RenderApi>,
}

impl ApiContext {
    pub fn new(api: Box<dyn RenderApi>) -> Self {
        Self { api }
    }

    pub fn api_name(&self) -> &str {
        self.api.name()
    }

    pub fn emit(&mut self, statement: &Statement) -> Result<(), ContextError> {
        self.api.call(statement)
    }

    pub fn close(&mut self) -> Result<(), ContextError> {
        self.api.close()
    }
}

/// Shared, read-side handle onto the statements a [`RecordingApi`] received.
#[derive(Debug, Clone, Default)]
pub struct StatementLog {
    inner: Arc<Mutex<Vec<Statement>>>,
}

impl StatementLog {
    pub fn statements(&self) -> Vec<Statement> {
        self.inner.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of recorded statements matching `pred`.
    pub fn count(&self, pred: impl Fn(&Statement) -> bool) -> usize {
        self.inner
            .lock()
            .map(|s| s.iter().filter(|st| pred(st)).count())
            .unwrap_or(0)
    }

    /// Number of recorded statements with the given keyword.
    pub fn count_keyword(&self, keyword: &str) -> usize {
        self.count(|s| s.keyword() == keyword)
    }
}

/// Renderer binding that records statements in memory.
///
/// Used for dry runs, where the scene is translated without a renderer
/// attached, and for inspecting the statement stream.
#[derive(Debug, Default)]
pub struct RecordingApi {
    log: StatementLog,
}

impl RecordingApi {
    pub fn new() -> (Self, StatementLog) {
        let api = Self::default();
        let log = api.log.clone();
        (api, log)
    }
}

impl RenderApi for RecordingApi {
    fn name(&self) -> &str {
        "recording"
    }

    fn call(&mut self, statement: &Statement) -> Result<(), ContextError> {
        self.log
            .inner
            .lock()
            .map_err(|_| ContextError::Api("statement log poisoned".into()))?
            .push(statement.clone());
        Ok(())
    }
}
