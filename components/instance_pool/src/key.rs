//! Script identity and content generation.

use crate::error::KeyError;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::Hasher;

/// Longest key or generation stamp, in bytes
pub const MAX_KEY_LEN: usize = 127;

/// Name of a script without its extension.
///
/// # Examples
///
/// ```
/// use instance_pool::ScriptKey;
///
/// let key = ScriptKey::from_file_name("filters.lua").unwrap();
/// assert_eq!(key.as_str(), "filters");
/// assert!(ScriptKey::new("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptKey(String);

impl ScriptKey {
    /// Validate and wrap a script name
    pub fn new(name: impl Into<String>) -> Result<Self, KeyError> {
        let name = name.into();
        check_bounded(&name)?;
        if name.contains(['/', '\\', '\0']) {
            return Err(KeyError::InvalidChar(name));
        }
        Ok(Self(name))
    }

    /// Derive the key from a file name, dropping its extension
    pub fn from_file_name(file_name: &str) -> Result<Self, KeyError> {
        let stem = match file_name.rfind('.') {
            Some(0) | None => file_name,
            Some(dot) => &file_name[..dot],
        };
        Self::new(stem)
    }

    /// The script name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Version stamp of a script's content.
///
/// Instances are interchangeable only while their generation matches the
/// generation of the pool they return to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Generation(String);

impl Generation {
    /// Wrap an externally supplied stamp
    pub fn new(stamp: impl Into<String>) -> Result<Self, KeyError> {
        let stamp = stamp.into();
        check_bounded(&stamp)?;
        Ok(Self(stamp))
    }

    /// Stamp derived from script content: identical bytes give identical stamps
    pub fn of_content(content: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        hasher.write(content);
        Self(format!("{:x}-{:016x}", content.len(), hasher.finish()))
    }

    /// The stamp text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_bounded(text: &str) -> Result<(), KeyError> {
    if text.is_empty() {
        return Err(KeyError::Empty);
    }
    if text.len() > MAX_KEY_LEN {
        return Err(KeyError::TooLong(text.to_string()));
    }
    Ok(())
}
