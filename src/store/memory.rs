use std::collections::{BTreeMap, BTreeSet};

use super::{
    backend::{RegData, RegistryBackend, StoredValue},
    error::{BackendError, BackendErrorKind},
};

/// Registry stand-in kept entirely in memory.
///
/// Keys and value names are case-insensitive like the real registry. Faults
/// can be injected per key: every write or delete that touches a faulted key
/// (or anything beneath it) fails with the configured error, and reads of a
/// key marked unreadable fail the same way.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    keys: BTreeMap<String, BTreeMap<String, RegData>>,
    write_faults: BTreeMap<String, BackendError>,
    unreadable: BTreeSet<String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_writes(&mut self, key: &str) {
        self.write_faults.insert(
            normalize(key),
            BackendError::new(BackendErrorKind::AccessDenied, "Access is denied. (os error 5)"),
        );
    }

    pub fn fail_writes(&mut self, key: &str, message: &str) {
        self.write_faults
            .insert(normalize(key), BackendError::new(BackendErrorKind::Other, message));
    }

    pub fn clear_faults(&mut self) {
        self.write_faults.clear();
        self.unreadable.clear();
    }

    pub fn deny_reads(&mut self, key: &str) {
        self.unreadable.insert(normalize(key));
    }

    pub fn key_exists(&self, key: &str) -> bool {
        let wanted = normalize(key);
        let prefix = format!("{wanted}\\");
        self.keys
            .keys()
            .any(|k| *k == wanted || k.starts_with(&prefix))
    }

    pub fn value(&self, key: &str, name: &str) -> Option<&RegData> {
        self.keys.get(&normalize(key))?.get(&name.to_lowercase())
    }

    pub fn value_count(&self, key: &str) -> usize {
        self.keys.get(&normalize(key)).map_or(0, BTreeMap::len)
    }

    fn write_fault(&self, key: &str) -> Option<BackendError> {
        self.write_faults
            .iter()
            .find(|(faulted, _)| is_same_or_child(key, faulted))
            .map(|(_, err)| err.clone())
    }

    fn read(&self, key: &str, name: &str) -> Result<Option<&RegData>, BackendError> {
        let key = normalize(key);
        if self.unreadable.iter().any(|k| is_same_or_child(&key, k)) {
            return Err(BackendError::new(
                BackendErrorKind::AccessDenied,
                "Access is denied. (os error 5)",
            ));
        }
        Ok(self
            .keys
            .get(&key)
            .and_then(|values| values.get(&name.to_lowercase())))
    }
}

impl RegistryBackend for MemoryRegistry {
    fn read_string(&self, key: &str, name: &str) -> Result<Option<String>, BackendError> {
        match self.read(key, name)? {
            Some(RegData::String(s)) => Ok(Some(s.clone())),
            Some(RegData::Dword(_)) => Err(BackendError::new(
                BackendErrorKind::Other,
                format!("value '{name}' is not a string"),
            )),
            None => Ok(None),
        }
    }

    fn read_dword(&self, key: &str, name: &str) -> Result<Option<u32>, BackendError> {
        match self.read(key, name)? {
            Some(RegData::Dword(v)) => Ok(Some(*v)),
            Some(RegData::String(_)) => Err(BackendError::new(
                BackendErrorKind::Other,
                format!("value '{name}' is not a DWORD"),
            )),
            None => Ok(None),
        }
    }

    fn read_raw(&self, key: &str, name: &str) -> Result<Option<StoredValue>, BackendError> {
        Ok(self.read(key, name)?.map(StoredValue::from))
    }

    fn write_values(&mut self, key: &str, values: &[(&str, RegData)]) -> Result<(), BackendError> {
        let key = normalize(key);
        if let Some(err) = self.write_fault(&key) {
            return Err(err);
        }

        let entry = self.keys.entry(key).or_default();
        for (name, data) in values {
            entry.insert(name.to_lowercase(), data.clone());
        }
        Ok(())
    }

    fn delete_value(&mut self, key: &str, name: &str) -> Result<(), BackendError> {
        let key = normalize(key);
        if let Some(err) = self.write_fault(&key) {
            return Err(err);
        }

        let values = self
            .keys
            .get_mut(&key)
            .ok_or_else(|| BackendError::not_found(format!("key '{key}' does not exist")))?;
        values
            .remove(&name.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| BackendError::not_found(format!("value '{name}' does not exist")))
    }

    fn delete_tree(&mut self, key: &str) -> Result<(), BackendError> {
        let key = normalize(key);
        if let Some(err) = self.write_fault(&key) {
            return Err(err);
        }
        if !self.key_exists(&key) {
            return Err(BackendError::not_found(format!("key '{key}' does not exist")));
        }

        let prefix = format!("{key}\\");
        self.keys.retain(|k, _| *k != key && !k.starts_with(&prefix));
        Ok(())
    }
}

fn normalize(key: &str) -> String {
    key.trim_matches('\\').to_lowercase()
}

fn is_same_or_child(key: &str, ancestor: &str) -> bool {
    key == ancestor
        || key
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('\\'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = r"SOFTWARE\Example\Settings";

    #[test]
    fn names_are_case_insensitive() {
        let mut reg = MemoryRegistry::new();
        reg.write_values(KEY, &[("Value", RegData::String("x".into()))])
            .unwrap();
        assert_eq!(
            reg.read_string(r"software\example\SETTINGS", "VALUE").unwrap(),
            Some("x".to_string())
        );
    }

    #[test]
    fn missing_reads_are_none_and_missing_deletes_are_not_found() {
        let mut reg = MemoryRegistry::new();
        assert_eq!(reg.read_dword(KEY, "Status").unwrap(), None);
        assert!(reg.delete_value(KEY, "Status").unwrap_err().is_not_found());
        assert!(reg.delete_tree(KEY).unwrap_err().is_not_found());
    }

    #[test]
    fn delete_tree_removes_children_but_not_siblings() {
        let mut reg = MemoryRegistry::new();
        reg.write_values(KEY, &[("A", RegData::Dword(1))]).unwrap();
        reg.write_values(&format!(r"{KEY}\Child"), &[("B", RegData::Dword(2))])
            .unwrap();
        reg.write_values(r"SOFTWARE\Example\SettingsOther", &[("C", RegData::Dword(3))])
            .unwrap();

        reg.delete_tree(KEY).unwrap();

        assert!(!reg.key_exists(KEY));
        assert!(!reg.key_exists(&format!(r"{KEY}\Child")));
        assert!(reg.key_exists(r"SOFTWARE\Example\SettingsOther"));
    }

    #[test]
    fn faults_apply_to_key_and_descendants() {
        let mut reg = MemoryRegistry::new();
        reg.deny_writes(r"SOFTWARE\Example");

        let err = reg
            .write_values(KEY, &[("A", RegData::Dword(1))])
            .unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::AccessDenied);
        assert!(!reg.key_exists(KEY));

        reg.clear_faults();
        reg.write_values(KEY, &[("A", RegData::Dword(1))]).unwrap();
        assert_eq!(reg.value(KEY, "a"), Some(&RegData::Dword(1)));
    }

    #[test]
    fn raw_reads_ignore_the_expected_type() {
        let mut reg = MemoryRegistry::new();
        reg.write_values(KEY, &[("Status", RegData::String("1".into()))])
            .unwrap();
        assert_eq!(
            reg.read_raw(KEY, "status").unwrap(),
            Some(StoredValue::String("1".into()))
        );
        assert_eq!(reg.read_raw(KEY, "Missing").unwrap(), None);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let mut reg = MemoryRegistry::new();
        reg.write_values(KEY, &[("A", RegData::Dword(1))]).unwrap();
        assert_eq!(
            reg.read_string(KEY, "A").unwrap_err().kind,
            BackendErrorKind::Other
        );
    }
}
