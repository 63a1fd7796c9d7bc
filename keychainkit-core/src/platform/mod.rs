//! Target platform selection and native store bindings.
//!
//! Query shape differs between the macOS family and the other Apple
//! platforms. The difference is carried as a [`Platform`] value rather than
//! compile-time conditionals, so both shapes can be built and tested from
//! any target. Only the native gateway itself is target-gated.

/// Keychain Services bindings for Apple targets.
#[cfg(target_vendor = "apple")]
pub mod apple;

/// Platform family whose store semantics the queries are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// macOS family: file-based keychain by default, deletes every match.
    MacOs,
    /// iOS, iPadOS, tvOS, watchOS and visionOS: data-protection keychain only.
    Ios,
}

impl Platform {
    /// Platform of the compilation target. Non-Apple targets use the iOS shape.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Ios
        }
    }

    /// Returns `true` for the macOS family.
    #[must_use]
    pub const fn is_macos_family(self) -> bool {
        matches!(self, Self::MacOs)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}
