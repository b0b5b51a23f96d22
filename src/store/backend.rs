use super::error::BackendError;

/// A value the store writes. Integers are REG_DWORD, strings REG_SZ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegData {
    Dword(u32),
    String(String),
}

/// A value exactly as stored, whatever type it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Dword(u32),
    /// REG_SZ or REG_EXPAND_SZ, trailing NULs removed.
    String(String),
    Other { kind: String, bytes: Vec<u8> },
}

impl From<&RegData> for StoredValue {
    fn from(data: &RegData) -> Self {
        match data {
            RegData::Dword(v) => Self::Dword(*v),
            RegData::String(s) => Self::String(s.clone()),
        }
    }
}

/// The slice of a hierarchical key/value store the settings store relies on.
///
/// Key paths are backslash-separated and relative to the machine hive.
/// Reads report an absent key or value as `Ok(None)`; deletes report it as
/// an error of kind `NotFound` so callers can decide whether that matters.
pub trait RegistryBackend {
    fn read_string(&self, key: &str, name: &str) -> Result<Option<String>, BackendError>;

    fn read_dword(&self, key: &str, name: &str) -> Result<Option<u32>, BackendError>;

    /// Reads a value without checking its type.
    fn read_raw(&self, key: &str, name: &str) -> Result<Option<StoredValue>, BackendError>;

    /// Creates `key` (and missing parents) if needed, then writes every value.
    fn write_values(&mut self, key: &str, values: &[(&str, RegData)]) -> Result<(), BackendError>;

    fn delete_value(&mut self, key: &str, name: &str) -> Result<(), BackendError>;

    /// Removes `key` together with all of its values and subkeys.
    fn delete_tree(&mut self, key: &str) -> Result<(), BackendError>;
}
