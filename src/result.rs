//! Result type extensions for location-tracking error reports.
//!
//! This module provides ergonomic error handling with automatic file:line capture
//! using the rootcause crate.
//!
//! # Usage
//!
//! ```ignore
//! use crate::result::ReportExt;
//!
//! fn level1() -> Result<(), Report<MyError>> {
//!     inner_function()?;  // Location captured here
//!     Ok(())
//! }
//!
//! fn level2() -> Result<(), Report<MyError>> {
//!     level1().attach_loc("in level2")?;  // Adds breadcrumb with location
//!     Ok(())
//! }
//! ```
//!
//! # Output
//!
//! ```text
//!  ● MyError
//!  ├ src/foo.rs:42
//!  ╰ in level2 at src/foo.rs:47
//! ```

use rootcause::Report;
use rootcause::hooks::builtin_hooks::location::Location;

/// A located attachment - combines a message with its source location.
/// Displays as "message at file:line"
#[derive(Debug, Clone)]
pub struct LocatedAttachment {
    pub message: String,
    pub location: Location,
}

impl core::fmt::Display for LocatedAttachment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} at {}", self.message, self.location)
    }
}

/// Extension trait to add location + attachment to an existing Report.
/// Use this when propagating errors to add breadcrumbs showing the call path.
pub trait ReportExt<C> {
    type Output;

    /// Attach a message along with the caller's file:line location.
    /// Displays as "message at file:line" to show the propagation path.
    fn attach_loc(self, message: impl Into<String>) -> Self::Output;
}

impl<C> ReportExt<C> for Report<C> {
    type Output = Report<C>;

    #[track_caller]
    fn attach_loc(self, message: impl Into<String>) -> Report<C> {
        self.attach(LocatedAttachment {
            message: message.into(),
            location: Location::caller(),
        })
    }
}

impl<T, C> ReportExt<C> for Result<T, Report<C>> {
    type Output = Result<T, Report<C>>;

    #[track_caller]
    fn attach_loc(self, message: impl Into<String>) -> Result<T, Report<C>> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.attach(LocatedAttachment {
                message: message.into(),
                location: Location::caller(),
            })),
        }
    }
}
