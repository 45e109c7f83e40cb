// src/rt.rs

//! Runtime utilities for generated code (Macros).
//! Do not use directly.

use crate::error::{GraphCodeError, Result};

/// Rejects records archived by a newer layout than the derived type knows.
pub fn check_version(class: &str, found: u32, supported: u32) -> Result<()> {
    if found > supported {
        return Err(GraphCodeError::Version {
            class: class.to_owned(),
            found,
            supported,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_and_equal_versions_pass() {
        assert!(check_version("Doc", 0, 2).is_ok());
        assert!(check_version("Doc", 2, 2).is_ok());
    }

    #[test]
    fn newer_version_is_rejected() {
        assert_eq!(
            check_version("Doc", 3, 2),
            Err(GraphCodeError::Version {
                class: "Doc".into(),
                found: 3,
                supported: 2,
            })
        );
    }
}
