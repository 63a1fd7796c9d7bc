//! Store configuration: built once, validated, never mutated afterwards.

use std::collections::BTreeMap;
use std::ffi::{c_void, OsStr};
use std::num::NonZeroUsize;

use serde::Deserialize;
use strum::{Display, EnumString};

use crate::access_control::AccessControlFlags;
use crate::error::ConfigError;
use crate::query::{attr, AttributeValue};

/// When a stored secret is readable relative to the device lock state.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Deserialize,
    uniffi::Enum,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Accessibility {
    /// Readable while the device is unlocked.
    WhenUnlocked,
    /// Readable while unlocked; never leaves this device.
    WhenUnlockedThisDeviceOnly,
    /// Readable after the first unlock following a restart.
    #[default]
    AfterFirstUnlock,
    /// Readable after the first unlock; never leaves this device.
    AfterFirstUnlockThisDeviceOnly,
    /// Readable while unlocked, only if a passcode is set; never leaves this device.
    WhenPasscodeSetThisDeviceOnly,
}

impl Accessibility {
    /// The protection class the store applies when none is given.
    pub const STORE_DEFAULT: Self = Self::WhenUnlocked;

    /// Value of the corresponding `kSecAttrAccessible*` constant.
    #[must_use]
    pub const fn wire_value(self) -> &'static str {
        match self {
            Self::WhenUnlocked => "ak",
            Self::WhenUnlockedThisDeviceOnly => "aku",
            Self::AfterFirstUnlock => "ck",
            Self::AfterFirstUnlockThisDeviceOnly => "cku",
            Self::WhenPasscodeSetThisDeviceOnly => "akpu",
        }
    }
}

/// Non-owning reference to a caller-owned authentication context
/// (an `LAContext` on Apple platforms).
///
/// Only the handle's identity is kept. The caller owns the context and must
/// keep it alive for as long as queries built with this reference are in
/// flight; the store never retains, mutates or releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthContextRef(NonZeroUsize);

impl AuthContextRef {
    /// Wraps a raw context pointer. Returns `None` for null.
    #[must_use]
    pub fn from_raw(ptr: *const c_void) -> Option<Self> {
        NonZeroUsize::new(ptr as usize).map(Self)
    }

    /// Wraps an opaque handle identifier.
    #[must_use]
    pub const fn from_id(id: NonZeroUsize) -> Self {
        Self(id)
    }

    /// The referenced pointer.
    #[must_use]
    pub fn as_raw(self) -> *const c_void {
        self.0.get() as *const c_void
    }
}

/// Immutable settings shared by every query a store builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    service: String,
    access_group: Option<String>,
    accessibility: Option<Accessibility>,
    access_control: Option<AccessControlFlags>,
    authentication_context: Option<AuthContextRef>,
    synchronizable: bool,
    extra_attributes: BTreeMap<String, AttributeValue>,
}

impl Configuration {
    /// Starts a builder with the default settings.
    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Loads a configuration from a JSON document.
    ///
    /// ```json
    /// {
    ///   "service": "com.example.app",
    ///   "accessGroup": "TEAMID.shared",
    ///   "accessibility": "afterFirstUnlockThisDeviceOnly",
    ///   "accessControl": ["biometryCurrentSet", "or", "devicePasscode"],
    ///   "synchronizable": false,
    ///   "extraAttributes": { "labl": "Example" }
    /// }
    /// ```
    ///
    /// A missing `accessibility` uses the default; `null` leaves it unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse, names an unknown
    /// access-control flag, or fails the same validation as
    /// [`ConfigurationBuilder::build`].
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let document: ConfigurationDocument = serde_json::from_str(document)?;
        let mut builder = Self::builder()
            .accessibility(document.accessibility)
            .synchronizable(document.synchronizable);
        if let Some(service) = document.service {
            builder = builder.service(service);
        }
        if let Some(access_group) = document.access_group {
            builder = builder.access_group(access_group);
        }
        if let Some(names) = document.access_control {
            let mut flags = AccessControlFlags::empty();
            for name in names {
                flags |= AccessControlFlags::from_name(&name).ok_or_else(|| {
                    ConfigError::Parse(format!("unknown access control flag `{name}`"))
                })?;
            }
            builder = builder.access_control(flags);
        }
        for (key, value) in document.extra_attributes {
            let value = json_attribute(&key, value)?;
            builder = builder.extra_attribute(key, value);
        }
        builder.build()
    }

    /// Namespace the store's keys are scoped to.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Cross-application sharing scope.
    #[must_use]
    pub fn access_group(&self) -> Option<&str> {
        self.access_group.as_deref()
    }

    /// Accessibility policy, or `None` to defer to the store default.
    #[must_use]
    pub const fn accessibility(&self) -> Option<Accessibility> {
        self.accessibility
    }

    /// Access-control gating applied on insert/update.
    #[must_use]
    pub const fn access_control(&self) -> Option<AccessControlFlags> {
        self.access_control
    }

    /// Authentication context attached to every query.
    #[must_use]
    pub const fn authentication_context(&self) -> Option<AuthContextRef> {
        self.authentication_context
    }

    /// Whether items participate in cross-device sync.
    #[must_use]
    pub const fn synchronizable(&self) -> bool {
        self.synchronizable
    }

    /// Additional criteria merged into every query.
    #[must_use]
    pub const fn extra_attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.extra_attributes
    }
}

/// Builder for [`Configuration`].
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    service: Option<String>,
    access_group: Option<String>,
    accessibility: Option<Accessibility>,
    access_control: Option<AccessControlFlags>,
    authentication_context: Option<AuthContextRef>,
    synchronizable: bool,
    extra_attributes: BTreeMap<String, AttributeValue>,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self {
            service: None,
            access_group: None,
            accessibility: Some(Accessibility::default()),
            access_control: None,
            authentication_context: None,
            synchronizable: false,
            extra_attributes: BTreeMap::new(),
        }
    }
}

impl ConfigurationBuilder {
    /// Sets the service. Defaults to the application identifier.
    #[must_use]
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Sets the access group.
    #[must_use]
    pub fn access_group(mut self, access_group: impl Into<String>) -> Self {
        self.access_group = Some(access_group.into());
        self
    }

    /// Sets the accessibility policy; `None` defers to the store default.
    #[must_use]
    pub fn accessibility(mut self, accessibility: impl Into<Option<Accessibility>>) -> Self {
        self.accessibility = accessibility.into();
        self
    }

    /// Gates items behind the given access-control flags.
    #[must_use]
    pub const fn access_control(mut self, flags: AccessControlFlags) -> Self {
        self.access_control = Some(flags);
        self
    }

    /// Attaches a caller-owned authentication context to every query.
    #[must_use]
    pub const fn authentication_context(mut self, context: AuthContextRef) -> Self {
        self.authentication_context = Some(context);
        self
    }

    /// Marks items as synchronizable.
    #[must_use]
    pub const fn synchronizable(mut self, synchronizable: bool) -> Self {
        self.synchronizable = synchronizable;
        self
    }

    /// Adds one extra attribute.
    #[must_use]
    pub fn extra_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.extra_attributes.insert(key.into(), value.into());
        self
    }

    /// Resolves defaults and validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the service resolves to an empty string or cannot
    /// be resolved at all, or if an extra attribute has an empty key or tries
    /// to carry the item payload.
    pub fn build(self) -> Result<Configuration, ConfigError> {
        let service = match self.service {
            Some(service) => service,
            None => application_identifier()?,
        };
        if service.is_empty() {
            return Err(ConfigError::EmptyService);
        }
        for key in self.extra_attributes.keys() {
            if key.is_empty() {
                return Err(ConfigError::InvalidExtraAttribute {
                    key: key.clone(),
                    reason: "key must not be empty".to_string(),
                });
            }
            if key == attr::VALUE_DATA {
                return Err(ConfigError::InvalidExtraAttribute {
                    key: key.clone(),
                    reason: "the payload is supplied per call".to_string(),
                });
            }
        }
        Ok(Configuration {
            service,
            access_group: self.access_group,
            accessibility: self.accessibility,
            access_control: self.access_control,
            authentication_context: self.authentication_context,
            synchronizable: self.synchronizable,
            extra_attributes: self.extra_attributes,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigurationDocument {
    service: Option<String>,
    access_group: Option<String>,
    #[serde(default = "default_accessibility")]
    accessibility: Option<Accessibility>,
    access_control: Option<Vec<String>>,
    #[serde(default)]
    synchronizable: bool,
    #[serde(default)]
    extra_attributes: BTreeMap<String, serde_json::Value>,
}

#[allow(clippy::unnecessary_wraps)]
fn default_accessibility() -> Option<Accessibility> {
    Some(Accessibility::default())
}

fn json_attribute(key: &str, value: serde_json::Value) -> Result<AttributeValue, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidExtraAttribute {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    match value {
        serde_json::Value::String(value) => Ok(AttributeValue::String(value)),
        serde_json::Value::Bool(value) => Ok(AttributeValue::Bool(value)),
        serde_json::Value::Number(number) => number
            .as_i64()
            .map(AttributeValue::Integer)
            .ok_or_else(|| invalid("only integer numbers are supported")),
        _ => Err(invalid("expected a string, boolean or integer")),
    }
}

/// Identifier of the host application, used as the default service.
fn application_identifier() -> Result<String, ConfigError> {
    #[cfg(target_vendor = "apple")]
    if let Some(identifier) = crate::platform::apple::bundle_identifier() {
        return Ok(identifier);
    }

    let exe = std::env::current_exe()
        .map_err(|err| ConfigError::UnresolvedService(err.to_string()))?;
    exe.file_stem()
        .and_then(OsStr::to_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            ConfigError::UnresolvedService(format!(
                "executable path `{}` has no file name",
                exe.display()
            ))
        })
}
