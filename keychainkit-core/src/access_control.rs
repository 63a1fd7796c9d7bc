//! Access-control gating attached to items at insert time.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::config::Accessibility;
use crate::error::{KeychainError, KeychainResult};

/// Platform bitset of gating conditions (`SecAccessControlCreateFlags`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessControlFlags(u64);

impl AccessControlFlags {
    /// Biometry or passcode.
    pub const USER_PRESENCE: Self = Self(1 << 0);
    /// Any enrolled biometry.
    pub const BIOMETRY_ANY: Self = Self(1 << 1);
    /// Biometry as enrolled when the item was written.
    pub const BIOMETRY_CURRENT_SET: Self = Self(1 << 3);
    /// Device passcode.
    pub const DEVICE_PASSCODE: Self = Self(1 << 4);
    /// A paired watch.
    pub const WATCH: Self = Self(1 << 5);
    /// Any one of the listed constraints.
    pub const OR: Self = Self(1 << 14);
    /// All of the listed constraints.
    pub const AND: Self = Self(1 << 15);
    /// Private key usage. Applies to keys only.
    pub const PRIVATE_KEY_USAGE: Self = Self(1 << 30);
    /// Additional application-provided password.
    pub const APPLICATION_PASSWORD: Self = Self(1 << 31);

    const CONSTRAINTS: Self = Self(
        Self::USER_PRESENCE.0
            | Self::BIOMETRY_ANY.0
            | Self::BIOMETRY_CURRENT_SET.0
            | Self::DEVICE_PASSCODE.0
            | Self::WATCH.0
            | Self::APPLICATION_PASSWORD.0,
    );

    const ALL: Self = Self(
        Self::CONSTRAINTS.0 | Self::OR.0 | Self::AND.0 | Self::PRIVATE_KEY_USAGE.0,
    );

    const NAMES: [(&'static str, Self); 9] = [
        ("userPresence", Self::USER_PRESENCE),
        ("biometryAny", Self::BIOMETRY_ANY),
        ("biometryCurrentSet", Self::BIOMETRY_CURRENT_SET),
        ("devicePasscode", Self::DEVICE_PASSCODE),
        ("watch", Self::WATCH),
        ("or", Self::OR),
        ("and", Self::AND),
        ("privateKeyUsage", Self::PRIVATE_KEY_USAGE),
        ("applicationPassword", Self::APPLICATION_PASSWORD),
    ];

    /// No flags.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Builds flags from raw bits, rejecting bits the platform does not define.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Option<Self> {
        if bits & !Self::ALL.0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Builds flags from raw bits, keeping undefined bits as-is.
    #[must_use]
    pub const fn from_bits_retain(bits: u64) -> Self {
        Self(bits)
    }

    /// Looks up a single flag by its camelCase name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, flag)| *flag)
    }

    /// Returns `true` if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no bits are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    const fn constraint_count(self) -> u32 {
        (self.0 & Self::CONSTRAINTS.0).count_ones()
    }
}

impl BitOr for AccessControlFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessControlFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for AccessControlFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect();
        let unknown = self.0 & !Self::ALL.0;
        if unknown == 0 {
            write!(f, "AccessControlFlags({})", names.join(" | "))
        } else {
            write!(f, "AccessControlFlags({} | {unknown:#x})", names.join(" | "))
        }
    }
}

/// Validated access-control object: a protection class plus gating flags.
///
/// Values only exist once [`AccessControl::new`] has accepted the
/// combination, so a query carrying one never needs re-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessControl {
    protection: Accessibility,
    flags: AccessControlFlags,
}

impl AccessControl {
    /// Creates the access-control object for a generic password item.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::AccessControlFailure`] if the flags contain
    /// undefined bits, combine `or` with `and`, use a conjunction with fewer
    /// than two constraints, or request key-only usage.
    pub fn new(protection: Accessibility, flags: AccessControlFlags) -> KeychainResult<Self> {
        let unknown = flags.bits() & !AccessControlFlags::ALL.bits();
        if unknown != 0 {
            return Err(KeychainError::AccessControlFailure(format!(
                "unsupported flag bits {unknown:#x}"
            )));
        }
        let or = flags.contains(AccessControlFlags::OR);
        let and = flags.contains(AccessControlFlags::AND);
        if or && and {
            return Err(KeychainError::AccessControlFailure(
                "`or` and `and` are mutually exclusive".to_string(),
            ));
        }
        if (or || and) && flags.constraint_count() < 2 {
            return Err(KeychainError::AccessControlFailure(
                "a conjunction requires at least two constraints".to_string(),
            ));
        }
        if flags.contains(AccessControlFlags::PRIVATE_KEY_USAGE) {
            return Err(KeychainError::AccessControlFailure(
                "`privateKeyUsage` applies to keys, not generic passwords".to_string(),
            ));
        }
        Ok(Self { protection, flags })
    }

    /// Protection class the item is created with.
    #[must_use]
    pub const fn protection(&self) -> Accessibility {
        self.protection
    }

    /// Gating flags.
    #[must_use]
    pub const fn flags(&self) -> AccessControlFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(AccessControlFlags::USER_PRESENCE ; "user presence")]
    #[test_case(AccessControlFlags::BIOMETRY_CURRENT_SET | AccessControlFlags::OR | AccessControlFlags::DEVICE_PASSCODE ; "biometry or passcode")]
    #[test_case(AccessControlFlags::BIOMETRY_ANY | AccessControlFlags::AND | AccessControlFlags::APPLICATION_PASSWORD ; "biometry and password")]
    #[test_case(AccessControlFlags::empty() ; "no flags")]
    fn test_valid_combinations(flags: AccessControlFlags) {
        let control = AccessControl::new(Accessibility::WhenUnlockedThisDeviceOnly, flags)
            .expect("valid access control");
        assert_eq!(control.flags(), flags);
        assert_eq!(control.protection(), Accessibility::WhenUnlockedThisDeviceOnly);
    }

    #[test_case(AccessControlFlags::OR | AccessControlFlags::AND | AccessControlFlags::USER_PRESENCE | AccessControlFlags::WATCH ; "or and and")]
    #[test_case(AccessControlFlags::OR | AccessControlFlags::USER_PRESENCE ; "or with one constraint")]
    #[test_case(AccessControlFlags::PRIVATE_KEY_USAGE ; "key usage")]
    #[test_case(AccessControlFlags::from_bits_retain(1 << 8) ; "undefined bit")]
    fn test_invalid_combinations(flags: AccessControlFlags) {
        let result = AccessControl::new(Accessibility::AfterFirstUnlock, flags);
        assert!(matches!(result, Err(KeychainError::AccessControlFailure(_))));
    }

    #[test]
    fn test_from_bits_rejects_undefined() {
        assert_eq!(
            AccessControlFlags::from_bits(AccessControlFlags::WATCH.bits()),
            Some(AccessControlFlags::WATCH)
        );
        assert_eq!(AccessControlFlags::from_bits(1 << 8), None);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            AccessControlFlags::from_name("biometryCurrentSet"),
            Some(AccessControlFlags::BIOMETRY_CURRENT_SET)
        );
        assert_eq!(AccessControlFlags::from_name("faceId"), None);
    }

    #[test]
    fn test_debug_lists_names() {
        let flags = AccessControlFlags::USER_PRESENCE | AccessControlFlags::WATCH;
        assert_eq!(format!("{flags:?}"), "AccessControlFlags(userPresence | watch)");
    }
}
