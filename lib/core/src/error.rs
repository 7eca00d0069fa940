//! Error handling foundation for fedgate.
//!
//! Crates define their own context enums (for example the SSO flow's
//! `SsoError`) and carry them inside a rootcause [`Report`], so that each
//! layer can attach context without losing the typed root cause.

use rootcause::Report;

/// Result type carrying a typed rootcause report.
///
/// `C` is the context type at the current layer. Layers that wrap a
/// lower-level report use `.context()` to switch to their own type.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Lookup;

    impl std::fmt::Display for Lookup {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "lookup failed")
        }
    }

    impl std::error::Error for Lookup {}

    fn failing() -> Result<u8, Lookup> {
        Err(Lookup.into())
    }

    #[test]
    fn typed_report_keeps_context() {
        let err = failing().expect_err("should fail");
        assert!(err.to_string().contains("lookup failed"));
    }
}
