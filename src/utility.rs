use std::{
    env,
    path::{Path, PathBuf},
};

#[cfg(windows)]
pub fn to_wstring(s: &str) -> Vec<u16> {
    use std::{ffi::OsStr, os::windows::ffi::OsStrExt};

    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// Directory the customizer runs from. A `bin/` folder is treated as an
/// install layout and resolves to its parent.
pub fn app_root_dir() -> Option<PathBuf> {
    let exe_path = env::current_exe().ok()?;
    let exe_dir = exe_path.parent()?;
    Some(install_root(exe_dir))
}

fn install_root(exe_dir: &Path) -> PathBuf {
    if exe_dir.file_name().and_then(|n| n.to_str()) == Some("bin") {
        if let Some(parent) = exe_dir.parent() {
            return parent.to_path_buf();
        }
    }

    exe_dir.to_path_buf()
}

pub fn app_config_path() -> PathBuf {
    app_root_dir()
        .map(|root| root.join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}

pub fn version_label() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}
