//! Native status codes returned by the secure store.

use std::fmt;

use crate::error::{KeychainError, KeychainResult};

/// A native store status code (`OSStatus` on Apple platforms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    /// No error.
    pub const SUCCESS: Self = Self(0);
    /// The requested operation was cancelled by the user.
    pub const USER_CANCELED: Self = Self(-128);
    /// One or more parameters passed to the function were not valid.
    pub const PARAM: Self = Self(-50);
    /// No keychain is available.
    pub const NOT_AVAILABLE: Self = Self(-25291);
    /// The user name or passphrase was not correct.
    pub const AUTH_FAILED: Self = Self(-25293);
    /// The specified item already exists in the keychain.
    pub const DUPLICATE_ITEM: Self = Self(-25299);
    /// The specified item could not be found in the keychain.
    pub const ITEM_NOT_FOUND: Self = Self(-25300);
    /// User interaction is not allowed (device locked, app backgrounded).
    pub const INTERACTION_NOT_ALLOWED: Self = Self(-25308);
    /// Unable to decode the provided data.
    pub const DECODE: Self = Self(-26275);
    /// A required entitlement is missing (usually the access group).
    pub const MISSING_ENTITLEMENT: Self = Self(-34018);

    /// Returns `true` for [`Status::SUCCESS`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    /// Human-readable description of the code, when known.
    #[must_use]
    pub const fn description(self) -> Option<&'static str> {
        let message = match self.0 {
            0 => "No error",
            -128 => "The operation was cancelled by the user",
            -50 => "One or more parameters passed to a function were not valid",
            -25291 => "No keychain is available",
            -25293 => "The user name or passphrase you entered is not correct",
            -25299 => "The specified item already exists in the keychain",
            -25300 => "The specified item could not be found in the keychain",
            -25308 => "User interaction is not allowed",
            -26275 => "Unable to decode the provided data",
            -34018 => "A required entitlement isn't present",
            _ => return None,
        };
        Some(message)
    }

    /// Translates the status into the domain error taxonomy.
    ///
    /// Translation is total: every non-success code maps to exactly one
    /// [`KeychainError`], and codes without a dedicated variant become
    /// [`KeychainError::Unknown`] carrying the code and its description.
    ///
    /// # Errors
    ///
    /// Returns the translated error for any non-success code.
    pub fn check(self) -> KeychainResult<()> {
        match self {
            Self::SUCCESS => Ok(()),
            Self::ITEM_NOT_FOUND => Err(KeychainError::ItemNotFound),
            Self::DUPLICATE_ITEM => Err(KeychainError::DuplicateItem),
            other => Err(KeychainError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(description) => write!(f, "OSStatus {}: {description}", self.0),
            None => write!(f, "OSStatus {}", self.0),
        }
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Self(code)
    }
}
