//! Dry-run validation of script content
//!
//! Content is loaded into a throwaway interpreter with the same bindings as
//! a pooled instance. Nothing is registered and no pool is touched.

use crate::catalog::{ScriptKind, SearchPaths};
use crate::error::describe_lua_error;
use crate::factory::{install_bindings, new_state};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Classification of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    /// The content does not parse
    Syntax,
    /// The content raised an error while running
    Runtime,
    /// The interpreter ran out of memory
    OutOfMemory,
    /// An error was raised while handling another error
    ErrorHandler,
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationCode::Syntax => "syntax",
            ValidationCode::Runtime => "runtime",
            ValidationCode::OutOfMemory => "out-of-memory",
            ValidationCode::ErrorHandler => "error-handler",
        };
        f.write_str(name)
    }
}

/// Structured diagnostic for content that failed to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Failure class
    pub code: ValidationCode,
    /// Message without location prefix
    pub message: String,
    /// File the error points at
    pub file: String,
    /// 1-based line, when the interpreter reported one
    pub line: Option<u32>,
    /// Enclosing function, when a traceback names one
    pub function: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.file, line, self.message)?,
            None => write!(f, "{}: {}", self.file, self.message)?,
        }
        write!(f, " ({})", self.code)
    }
}

/// Outcome of [`validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The content loaded cleanly
    Success,
    /// The content failed to load
    Failure(ValidationError),
}

impl ValidationResult {
    /// Whether validation passed
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationResult::Success)
    }

    /// The diagnostic, for a failure
    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Success => None,
            ValidationResult::Failure(err) => Some(err),
        }
    }
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<file>[^:\n]+):(?P<line>\d+):\s*(?P<message>.*)$").expect("valid regex")
    })
}

fn frame_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"in (?:function|local|global|method|field|upvalue) '([^']+)'").expect("valid regex")
    })
}

/// Split `file:line: message` into its parts
fn locate(first_line: &str, file: &str) -> (String, Option<u32>, String) {
    match location_pattern().captures(first_line) {
        Some(caps) => (
            caps["file"].to_string(),
            caps["line"].parse().ok(),
            caps["message"].to_string(),
        ),
        None => (file.to_string(), None, first_line.to_string()),
    }
}

/// First script frame named in a traceback
fn function_in(traceback: &str) -> Option<String> {
    traceback
        .lines()
        .filter(|line| !line.trim_start().starts_with("[C]"))
        .find_map(|line| frame_pattern().captures(line).map(|caps| caps[1].to_string()))
}

fn classify(err: &mlua::Error) -> ValidationCode {
    match err {
        mlua::Error::SyntaxError { .. } => ValidationCode::Syntax,
        mlua::Error::MemoryError(_) => ValidationCode::OutOfMemory,
        mlua::Error::CallbackError { cause, .. } => classify(cause),
        mlua::Error::RuntimeError(message) if message.contains("error in error handling") => {
            ValidationCode::ErrorHandler
        }
        _ => ValidationCode::Runtime,
    }
}

fn traceback_of(err: &mlua::Error) -> Option<String> {
    match err {
        mlua::Error::RuntimeError(message) => message
            .split_once("stack traceback:")
            .map(|(_, tb)| tb.to_string()),
        mlua::Error::CallbackError { traceback, .. } => Some(traceback.clone()),
        _ => None,
    }
}

/// Structured diagnostic for an interpreter error raised while loading `file`
pub fn diagnose(file: &str, err: &mlua::Error) -> ValidationError {
    let described = describe_lua_error(err);
    let first_line = described.lines().next().unwrap_or_default();
    let (file, line, message) = locate(first_line, file);
    ValidationError {
        code: classify(err),
        message,
        file,
        line,
        function: traceback_of(err).and_then(|tb| function_in(&tb)),
    }
}

/// Load `content` as `file` in a throwaway interpreter.
///
/// Bindings match a pooled instance, so globals the script touches at load
/// time resolve the same way.
pub fn validate(paths: &SearchPaths, file: &str, content: &[u8]) -> ValidationResult {
    let loaded = new_state(ScriptKind::Lua).and_then(|lua| {
        install_bindings(&lua, paths)?;
        lua.load(content).set_name(format!("@{}", file)).exec()
    });
    match loaded {
        Ok(()) => ValidationResult::Success,
        Err(err) => ValidationResult::Failure(diagnose(file, &err)),
    }
}
