//! Runtime orchestration for command-line invocations
//!
//! The Runtime owns a configured [`UdfModule`] and an in-memory host
//! context standing in for the storage server.

use crate::error::{CliError, CliResult};
use host_types::memory::{MemoryContext, MemoryStream};
use host_types::{HostContext, LogLevel, Record, Stream, Value};
use lua_bridge::ValidationResult;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use udf_module::{CallResult, ModuleConfig, UdfModule};

/// Drives the UDF module from the command line
pub struct Runtime {
    module: UdfModule,
    context: Arc<MemoryContext>,
    repeat: usize,
}

impl Runtime {
    /// Create a runtime with `config` applied
    ///
    /// # Example
    /// ```
    /// use udf_cli::Runtime;
    /// use udf_module::ModuleConfig;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let runtime = Runtime::new(ModuleConfig::default().with_paths(dir.path(), dir.path())).unwrap();
    /// assert!(runtime.logs().is_empty());
    /// ```
    pub fn new(config: ModuleConfig) -> CliResult<Self> {
        Ok(Self {
            module: UdfModule::new(config)?,
            context: Arc::new(MemoryContext::new()),
            repeat: 1,
        })
    }

    /// Call record functions `count` times, keeping the last result
    pub fn with_repeat(mut self, count: usize) -> Self {
        self.repeat = count.max(1);
        self
    }

    /// Underlying module
    pub fn module(&self) -> &UdfModule {
        &self.module
    }

    /// Messages scripts logged through the host
    pub fn logs(&self) -> Vec<(LogLevel, String)> {
        self.context.logs()
    }

    fn host(&self) -> Arc<dyn HostContext> {
        self.context.clone()
    }

    /// Register the script at `path` under its file stem
    pub fn load_script(&self, path: &Path) -> CliResult<String> {
        let name = script_name(path)?;
        let content = fs::read(path)?;
        self.module.add_script(&name, &content)?;
        debug!(script = %name, bytes = content.len(), "script loaded");
        Ok(name)
    }

    /// Validate the script at `path` without registering it
    pub fn validate_file(&self, path: &Path) -> CliResult<()> {
        let content = fs::read(path)?;
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.module.validate(&file, &content) {
            ValidationResult::Success => Ok(()),
            ValidationResult::Failure(err) => Err(CliError::Validation(err)),
        }
    }

    /// Call `function` from the script at `path` with `record`
    pub fn apply_record(
        &self,
        path: &Path,
        function: &str,
        record: &Arc<dyn Record>,
        args: &[Value],
    ) -> CliResult<Value> {
        let name = self.load_script(path)?;
        let host = self.host();
        let mut last = Value::Nil;
        for _ in 0..self.repeat {
            let result = self
                .module
                .apply_to_record(&host, &name, function, record, args)?;
            last = into_value(result)?;
        }
        Ok(last)
    }

    /// Run the stream function `function` from the script at `path` over
    /// `input`, returning everything written to the output stream
    pub fn apply_stream(
        &self,
        path: &Path,
        function: &str,
        input: Vec<Value>,
        args: &[Value],
    ) -> CliResult<Vec<Value>> {
        let name = self.load_script(path)?;
        let istream: Arc<dyn Stream> = Arc::new(MemoryStream::input(input));
        let output = Arc::new(MemoryStream::output());
        let ostream: Arc<dyn Stream> = output.clone();

        let result =
            self.module
                .apply_to_stream(&self.host(), &name, function, &istream, &ostream, args)?;
        into_value(result)?;
        Ok(output.drain())
    }
}

fn into_value(result: CallResult) -> CliResult<Value> {
    match result {
        CallResult::Success(value) => Ok(value),
        CallResult::Failure(message) => Err(CliError::Script(message)),
    }
}

/// Script name for `path`: its file name without extension
fn script_name(path: &Path) -> CliResult<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CliError::Input(format!("no script name in '{}'", path.display())))
}
