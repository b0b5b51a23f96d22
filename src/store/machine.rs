//! HKEY_LOCAL_MACHINE access through winreg.

use std::io;

use winreg::{
    enums::{RegType, HKEY_LOCAL_MACHINE, KEY_READ, KEY_SET_VALUE},
    RegKey,
};

use super::{
    backend::{RegData, RegistryBackend, StoredValue},
    error::BackendError,
};

pub struct MachineRegistry {
    root: RegKey,
}

impl MachineRegistry {
    pub fn local_machine() -> Self {
        Self::with_root(RegKey::predef(HKEY_LOCAL_MACHINE))
    }

    /// Resolves every key path relative to `root` instead of the machine hive.
    pub fn with_root(root: RegKey) -> Self {
        Self { root }
    }

    fn open_for_read(&self, key: &str) -> Result<Option<RegKey>, BackendError> {
        match self.root.open_subkey_with_flags(key, KEY_READ) {
            Ok(k) => Ok(Some(k)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl RegistryBackend for MachineRegistry {
    fn read_string(&self, key: &str, name: &str) -> Result<Option<String>, BackendError> {
        let Some(k) = self.open_for_read(key)? else {
            return Ok(None);
        };
        match k.get_value::<String, _>(name) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_dword(&self, key: &str, name: &str) -> Result<Option<u32>, BackendError> {
        let Some(k) = self.open_for_read(key)? else {
            return Ok(None);
        };
        match k.get_value::<u32, _>(name) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_raw(&self, key: &str, name: &str) -> Result<Option<StoredValue>, BackendError> {
        let Some(k) = self.open_for_read(key)? else {
            return Ok(None);
        };
        match k.get_raw_value(name) {
            Ok(v) => Ok(Some(decode_raw(&v.vtype, &v.bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_values(&mut self, key: &str, values: &[(&str, RegData)]) -> Result<(), BackendError> {
        let (k, _) = self.root.create_subkey(key)?;
        for (name, data) in values {
            match data {
                RegData::Dword(v) => k.set_value(name, v)?,
                RegData::String(s) => k.set_value(name, s)?,
            }
        }
        Ok(())
    }

    fn delete_value(&mut self, key: &str, name: &str) -> Result<(), BackendError> {
        let k = self.root.open_subkey_with_flags(key, KEY_SET_VALUE)?;
        k.delete_value(name)?;
        Ok(())
    }

    fn delete_tree(&mut self, key: &str) -> Result<(), BackendError> {
        self.root.delete_subkey_all(key)?;
        Ok(())
    }
}

fn decode_raw(vtype: &RegType, bytes: &[u8]) -> StoredValue {
    match vtype {
        RegType::REG_SZ | RegType::REG_EXPAND_SZ => {
            let wide: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            let end = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
            StoredValue::String(String::from_utf16_lossy(&wide[..end]))
        }
        RegType::REG_DWORD if bytes.len() == 4 => {
            StoredValue::Dword(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        other => StoredValue::Other {
            kind: format!("{other:?}"),
            bytes: bytes.to_vec(),
        },
    }
}
