//! The managed-runtime seam.
//!
//! The bridge never talks to an embedding runtime directly. It holds an
//! `Arc<dyn ManagedRuntime>` (the process-wide handle, valid on every thread) and
//! derives a thread-bound [`Environment`] from it whenever it needs to call in.

pub mod memory;

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ConfigError, RuntimeError};
use crate::event::NativeEvent;

/// Interface version negotiated with the runtime at load time, encoded as
/// `major << 16 | minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "VersionRepr")]
pub struct InterfaceVersion(pub u32);

impl InterfaceVersion {
    pub const V1_1: Self = Self(0x0001_0001);
    pub const V1_2: Self = Self(0x0001_0002);
    pub const V1_4: Self = Self(0x0001_0004);
    pub const V1_6: Self = Self(0x0001_0006);
    pub const V1_8: Self = Self(0x0001_0008);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self(((major as u32) << 16) | minor as u32)
    }

    pub const fn major(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn minor(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl Default for InterfaceVersion {
    fn default() -> Self {
        Self::V1_4
    }
}

impl fmt::Display for InterfaceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl FromStr for InterfaceVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::Version(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(bad)?;
        let major = major.parse().map_err(|_| bad())?;
        let minor = minor.parse().map_err(|_| bad())?;
        Ok(Self::new(major, minor))
    }
}

/// Accepts either `"1.4"` or the raw encoded number in configuration files.
#[derive(Deserialize)]
#[serde(untagged)]
enum VersionRepr {
    Text(String),
    Raw(u32),
}

impl TryFrom<VersionRepr> for InterfaceVersion {
    type Error = ConfigError;

    fn try_from(repr: VersionRepr) -> Result<Self, Self::Error> {
        match repr {
            VersionRepr::Text(text) => text.parse(),
            VersionRepr::Raw(raw) => Ok(Self(raw)),
        }
    }
}

/// Opaque handle to a long-lived runtime object (class, method, field or
/// pinned instance). Zero is never a valid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor(NonZeroU64);

impl Descriptor {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0.get())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Class,
    /// A pinned object obtained from a static accessor on `owner`.
    Instance,
    Method,
    Field,
}

/// Name-level description of a descriptor, handed to [`Environment::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSpec {
    pub kind: DescriptorKind,
    pub owner: &'static str,
    pub name: &'static str,
    pub signature: &'static str,
}

impl fmt::Display for DescriptorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DescriptorKind::Class => write!(f, "{}", self.owner),
            _ => write!(f, "{}.{}{}", self.owner, self.name, self.signature),
        }
    }
}

/// The receiver and method every managed event is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTarget {
    pub instance: Descriptor,
    pub method: Descriptor,
}

/// A native event ready to be materialised in the runtime: the class and
/// constructor to build it with, plus the decoded field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedEvent {
    pub class: Descriptor,
    pub constructor: Descriptor,
    pub event: NativeEvent,
}

/// Process-wide handle to the embedding runtime. Usable from any thread.
pub trait ManagedRuntime: Send + Sync {
    /// Environment of the calling thread, if that thread is already attached.
    fn env(&self, version: InterfaceVersion) -> Result<Box<dyn Environment>, RuntimeError>;

    /// Attach the calling thread (as a daemon) and return its environment.
    fn attach_current_thread(
        &self,
        version: InterfaceVersion,
    ) -> Result<Box<dyn Environment>, RuntimeError>;

    /// Report an unrecoverable condition to the runtime's module loader.
    fn raise_fatal(&self, message: &str);
}

/// Thread-bound view of the runtime. Never stored across calls.
pub trait Environment {
    fn version(&self) -> InterfaceVersion;

    fn resolve(&self, spec: &DescriptorSpec) -> Result<Descriptor, RuntimeError>;

    fn release(&self, descriptor: Descriptor) -> Result<(), RuntimeError>;

    fn set_property(&self, name: &str, value: &str) -> Result<(), RuntimeError>;

    fn clear_property(&self, name: &str) -> Result<(), RuntimeError>;

    /// Construct `event` in the runtime and invoke `target` with it.
    fn dispatch(&self, target: DispatchTarget, event: &ManagedEvent) -> Result<(), RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_encoding() {
        assert_eq!(InterfaceVersion::new(1, 4), InterfaceVersion::V1_4);
        assert_eq!(InterfaceVersion::V1_4.0, 0x0001_0004);
        assert_eq!(InterfaceVersion::V1_6.to_string(), "1.6");
        assert!(InterfaceVersion::V1_2 < InterfaceVersion::V1_8);
    }

    #[test]
    fn test_version_parse() {
        assert_eq!("1.8".parse::<InterfaceVersion>().unwrap(), InterfaceVersion::V1_8);
        assert!("18".parse::<InterfaceVersion>().is_err());
        assert!("1.x".parse::<InterfaceVersion>().is_err());
    }

    #[test]
    fn test_version_deserialize_text_and_raw() {
        let text: InterfaceVersion = serde_json::from_str(r#""1.2""#).unwrap();
        let raw: InterfaceVersion = serde_json::from_str("65542").unwrap();
        assert_eq!(text, InterfaceVersion::V1_2);
        assert_eq!(raw, InterfaceVersion::V1_6);
    }

    #[test]
    fn test_descriptor_zero_is_invalid() {
        assert!(Descriptor::new(0).is_none());
        assert_eq!(Descriptor::new(0x2a).unwrap().to_string(), "#2a");
    }
}
