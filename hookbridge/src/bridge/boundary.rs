//! Containment wrapper for code that runs on a thread owned by the engine.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::DispatchFailure;

/// Runs a callback body and guarantees that nothing escapes it: errors are
/// logged and discarded, panics are caught, logged and discarded. The caller
/// only learns whether the body produced a value.
#[derive(Debug, Clone, Copy)]
pub struct Boundary {
    name: &'static str,
}

impl Boundary {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn contain<T>(&self, body: impl FnOnce() -> Result<T, DispatchFailure>) -> Option<T> {
        let failure = match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(failure)) => failure,
            Err(payload) => DispatchFailure::Panicked(panic_message(payload.as_ref())),
        };
        match failure {
            DispatchFailure::Attach(_) | DispatchFailure::Registry(_) => {
                tracing::warn!(boundary = self.name, "dropping event: {failure}");
            }
            _ => tracing::error!(boundary = self.name, "dropping event: {failure}"),
        }
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RegistryError, TranslateError};

    const BOUNDARY: Boundary = Boundary::new("test");

    #[test]
    fn test_value_passes_through() {
        assert_eq!(BOUNDARY.contain(|| Ok(5)), Some(5));
    }

    #[test]
    fn test_error_is_contained() {
        let result: Option<()> =
            BOUNDARY.contain(|| Err(TranslateError::UnknownType(42).into()));
        assert_eq!(result, None);
        let result: Option<()> = BOUNDARY.contain(|| Err(RegistryError::Unpopulated.into()));
        assert_eq!(result, None);
    }

    #[test]
    fn test_panic_is_contained() {
        let result: Option<()> = BOUNDARY.contain(|| panic!("listener exploded"));
        assert_eq!(result, None);
        let result: Option<()> = BOUNDARY.contain(|| std::panic::panic_any(17_u8));
        assert_eq!(result, None);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
