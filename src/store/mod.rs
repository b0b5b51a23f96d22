//! Persistence of the lock screen image in the two HKLM locations Windows
//! consults: the PersonalizationCSP key and the Personalization policy key.
//!
//! The two keys are written and removed independently. Nothing here is
//! transactional: a failure part way through leaves whatever subset already
//! landed, and the caller is told what failed.

pub mod backend;
pub mod error;
#[cfg(windows)]
pub mod machine;
#[cfg(test)]
pub mod memory;

use std::{fmt, path::Path};

use serde::Serialize;

use crate::{info, warn, DEBUG_NAME};

use self::{
    backend::{RegData, RegistryBackend, StoredValue},
    error::{BackendError, Location, RevertFailure, RevertTarget, StoreError},
};

pub const CSP_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\PersonalizationCSP";
pub const CSP_IMAGE_STATUS: &str = "LockScreenImageStatus";
pub const CSP_IMAGE_PATH: &str = "LockScreenImagePath";
pub const CSP_IMAGE_URL: &str = "LockScreenImageUrl";

pub const POLICY_KEY: &str = r"SOFTWARE\Policies\Microsoft\Windows\Personalization";
pub const POLICY_IMAGE: &str = "LockScreenImage";
pub const POLICY_NO_CHANGING: &str = "NoChangingLockScreen";

/// Values kept under the CSP key. Path and URL always carry the same file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockScreenSetting {
    pub image_status: u32,
    pub image_path: String,
    pub image_url: String,
}

impl LockScreenSetting {
    pub fn for_image(path: &str) -> Self {
        Self {
            image_status: 1,
            image_path: path.to_string(),
            image_url: path.to_string(),
        }
    }

    fn values(&self) -> [(&'static str, RegData); 3] {
        [
            (CSP_IMAGE_STATUS, RegData::Dword(self.image_status)),
            (CSP_IMAGE_PATH, RegData::String(self.image_path.clone())),
            (CSP_IMAGE_URL, RegData::String(self.image_url.clone())),
        ]
    }
}

/// Values kept under the policy key. While present, users cannot change the
/// lock screen from Settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOverride {
    pub image_path: String,
    pub lock_changes_disabled: bool,
}

impl PolicyOverride {
    pub fn for_image(path: &str) -> Self {
        Self {
            image_path: path.to_string(),
            lock_changes_disabled: true,
        }
    }

    fn values(&self) -> [(&'static str, RegData); 2] {
        [
            (POLICY_IMAGE, RegData::String(self.image_path.clone())),
            (
                POLICY_NO_CHANGING,
                RegData::Dword(u32::from(self.lock_changes_disabled)),
            ),
        ]
    }
}

/// Which of the two locations currently hold an image path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationState {
    Empty,
    CspOnly,
    PolicyOnly,
    Both,
}

impl LocationState {
    fn from_presence(csp: bool, policy: bool) -> Self {
        match (csp, policy) {
            (false, false) => Self::Empty,
            (true, false) => Self::CspOnly,
            (false, true) => Self::PolicyOnly,
            (true, true) => Self::Both,
        }
    }
}

/// A raw registry reading for diagnostics, shown in whatever type it is
/// actually stored as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawValue {
    Dword(u32),
    String(String),
    Other { kind: String, hex: String },
    NotFound,
    Unreadable(String),
}

impl RawValue {
    fn from_read(read: Result<Option<StoredValue>, BackendError>) -> Self {
        match read {
            Ok(Some(StoredValue::Dword(v))) => Self::Dword(v),
            Ok(Some(StoredValue::String(s))) => Self::String(s),
            Ok(Some(StoredValue::Other { kind, bytes })) => Self::Other {
                kind,
                hex: bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" "),
            },
            Ok(None) => Self::NotFound,
            Err(e) => Self::Unreadable(e.message),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dword(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
            Self::Other { kind, hex } => write!(f, "{hex} ({kind})"),
            Self::NotFound => f.write_str("Not found"),
            Self::Unreadable(e) => write!(f, "Unreadable ({e})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugInfo {
    pub csp_image_status: RawValue,
    pub csp_image_path: RawValue,
    pub csp_image_url: RawValue,
    pub policy_image: RawValue,
    pub policy_no_changing: RawValue,
    pub state: LocationState,
}

impl fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, r"HKLM\{CSP_KEY}")?;
        writeln!(f, "  {CSP_IMAGE_STATUS}: {}", self.csp_image_status)?;
        writeln!(f, "  {CSP_IMAGE_PATH}: {}", self.csp_image_path)?;
        writeln!(f, "  {CSP_IMAGE_URL}: {}", self.csp_image_url)?;
        writeln!(f)?;
        writeln!(f, r"HKLM\{POLICY_KEY}")?;
        writeln!(f, "  {POLICY_IMAGE}: {}", self.policy_image)?;
        write!(f, "  {POLICY_NO_CHANGING}: {}", self.policy_no_changing)
    }
}

pub struct SettingsStore<B: RegistryBackend> {
    backend: B,
    log_operations: bool,
}

impl<B: RegistryBackend> SettingsStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            log_operations: true,
        }
    }

    pub fn with_operation_logging(mut self, enabled: bool) -> Self {
        self.log_operations = enabled;
        self
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Points both locations at `image_path`, creating the keys as needed.
    ///
    /// Both locations are always attempted, CSP first. If either fails the
    /// other is left as written; an access-denied failure is reported in
    /// preference to any other.
    pub fn apply(&mut self, image_path: &str) -> Result<(), StoreError> {
        if image_path.trim().is_empty() {
            return Err(StoreError::EmptyImagePath);
        }

        let csp = LockScreenSetting::for_image(image_path);
        let policy = PolicyOverride::for_image(image_path);

        let csp_result = self
            .backend
            .write_values(CSP_KEY, &csp.values())
            .map_err(|e| StoreError::from_backend(Location::Csp, e));
        let policy_result = self
            .backend
            .write_values(POLICY_KEY, &policy.values())
            .map_err(|e| StoreError::from_backend(Location::Policy, e));

        match (csp_result, policy_result) {
            (Ok(()), Ok(())) => {
                if self.log_operations {
                    info!("[{}][APPLY] Lock screen image set to '{}'", DEBUG_NAME, image_path);
                }
                Ok(())
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => {
                warn!("[{}][APPLY] Partial write for '{}': {}", DEBUG_NAME, image_path, e);
                Err(e)
            }
            (Err(csp_err), Err(policy_err)) => {
                warn!(
                    "[{}][APPLY] Both locations failed for '{}': {}; {}",
                    DEBUG_NAME, image_path, csp_err, policy_err
                );
                if policy_err.is_permission_denied() && !csp_err.is_permission_denied() {
                    Err(policy_err)
                } else {
                    Err(csp_err)
                }
            }
        }
    }

    /// Removes both policy values and the whole CSP key. Every deletion is
    /// attempted; anything already absent counts as removed.
    pub fn revert(&mut self) -> Result<(), StoreError> {
        let mut failures = Vec::new();

        for name in [POLICY_IMAGE, POLICY_NO_CHANGING] {
            if let Err(e) = self.backend.delete_value(POLICY_KEY, name) {
                if !e.is_not_found() {
                    failures.push(RevertFailure {
                        target: RevertTarget::PolicyValue(name),
                        error: StoreError::from_backend(Location::Policy, e),
                    });
                }
            }
        }

        if let Err(e) = self.backend.delete_tree(CSP_KEY) {
            if !e.is_not_found() {
                failures.push(RevertFailure {
                    target: RevertTarget::CspKey,
                    error: StoreError::from_backend(Location::Csp, e),
                });
            }
        }

        if failures.is_empty() {
            if self.log_operations {
                info!("[{}][REVERT] Lock screen registry changes removed", DEBUG_NAME);
            }
            return Ok(());
        }

        let err = StoreError::RevertIncomplete { failures };
        warn!("[{}][REVERT] {}", DEBUG_NAME, err);
        Err(err)
    }

    /// The configured image, if a location names one that still exists.
    ///
    /// The CSP path wins whenever it is non-empty, even if its file has
    /// gone; the policy path is consulted only when the CSP one is absent.
    pub fn load_current(&self) -> Option<String> {
        self.load_current_with(|p| Path::new(p).is_file())
    }

    fn load_current_with(&self, exists: impl Fn(&str) -> bool) -> Option<String> {
        let path = self
            .read_path(CSP_KEY, CSP_IMAGE_PATH)
            .or_else(|| self.read_path(POLICY_KEY, POLICY_IMAGE))?;

        if exists(&path) {
            Some(path)
        } else {
            info!(
                "[{}][LOAD] Configured image '{}' no longer exists on disk",
                DEBUG_NAME, path
            );
            None
        }
    }

    fn read_path(&self, key: &str, name: &str) -> Option<String> {
        match self.backend.read_string(key, name) {
            Ok(Some(path)) if !path.is_empty() => Some(path),
            Ok(_) => None,
            Err(e) => {
                info!("[{}][LOAD] Could not read {}\\{}: {}", DEBUG_NAME, key, name, e);
                None
            }
        }
    }

    #[cfg(test)]
    pub fn read_setting(&self) -> Option<LockScreenSetting> {
        Some(LockScreenSetting {
            image_status: self.backend.read_dword(CSP_KEY, CSP_IMAGE_STATUS).ok()??,
            image_path: self.backend.read_string(CSP_KEY, CSP_IMAGE_PATH).ok()??,
            image_url: self.backend.read_string(CSP_KEY, CSP_IMAGE_URL).ok()??,
        })
    }

    #[cfg(test)]
    pub fn read_policy(&self) -> Option<PolicyOverride> {
        Some(PolicyOverride {
            image_path: self.backend.read_string(POLICY_KEY, POLICY_IMAGE).ok()??,
            lock_changes_disabled: self
                .backend
                .read_dword(POLICY_KEY, POLICY_NO_CHANGING)
                .ok()??
                != 0,
        })
    }

    pub fn state(&self) -> LocationState {
        LocationState::from_presence(
            self.read_path(CSP_KEY, CSP_IMAGE_PATH).is_some(),
            self.read_path(POLICY_KEY, POLICY_IMAGE).is_some(),
        )
    }

    /// Raw values of every field this tool manages, uninterpreted.
    pub fn debug_snapshot(&self) -> DebugInfo {
        let raw = |key: &str, name: &str| RawValue::from_read(self.backend.read_raw(key, name));
        let info = DebugInfo {
            csp_image_status: raw(CSP_KEY, CSP_IMAGE_STATUS),
            csp_image_path: raw(CSP_KEY, CSP_IMAGE_PATH),
            csp_image_url: raw(CSP_KEY, CSP_IMAGE_URL),
            policy_image: raw(POLICY_KEY, POLICY_IMAGE),
            policy_no_changing: raw(POLICY_KEY, POLICY_NO_CHANGING),
            state: self.state(),
        };

        if let Ok(json) = serde_json::to_string(&info) {
            info!("[{}][DEBUG] Registry snapshot {}", DEBUG_NAME, json);
        }
        info
    }
}
