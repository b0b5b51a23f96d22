use windows::Win32::UI::Shell::IsUserAnAdmin;

/// True when the process runs with an elevated administrator token.
/// Writes under HKEY_LOCAL_MACHINE fail without one.
pub fn is_elevated() -> bool {
    unsafe { IsUserAnAdmin().as_bool() }
}
