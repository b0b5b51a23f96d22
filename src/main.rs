#![windows_subsystem = "windows"]
#![cfg_attr(not(windows), allow(dead_code))]

mod data_loaders;
mod logging;
#[cfg(windows)]
mod privilege;
mod shell;
mod store;
mod utility;

pub const APP_NAME: &str = "Welcome Screen Customizer";
pub const DEBUG_NAME: &str = "LOCKSCREEN";

#[cfg(windows)]
fn main() -> windows::core::Result<()> {
	use crate::{
		data_loaders::config::AppConfig,
		shell::{window, Shell, ShellOptions},
		store::{machine::MachineRegistry, SettingsStore},
		utility::{app_config_path, version_label},
	};

	logging::init(false, "warn");

	let config_path = app_config_path();
	let config = AppConfig::load(&config_path).unwrap_or_default();

	logging::set_debug(config.debug);
	logging::set_level(&config.log_level);
	std::panic::set_hook(Box::new(|panic_info| {
		error!("[{}] Panic: {}", DEBUG_NAME, panic_info);
	}));

	warn!("!---------- [{}] Starting {} {} ----------!", DEBUG_NAME, APP_NAME, version_label());
	info!("[{}] Config loaded from {}", DEBUG_NAME, config_path.display());

	if !privilege::is_elevated() {
		warn!("[{}] Not running as administrator; exiting", DEBUG_NAME);
		window::show_admin_notice();
		std::process::exit(1);
	}

	let store = SettingsStore::new(MachineRegistry::local_machine())
		.with_operation_logging(config.settings.diagnostics.log_operations);
	let shell = Shell::new(store, ShellOptions::from(&config));

	window::run(shell, &config)
}

#[cfg(not(windows))]
fn main() {
	eprintln!("{} only runs on Windows.", APP_NAME);
}
