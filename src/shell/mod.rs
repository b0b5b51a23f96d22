//! The user-facing side: one selected image, its preview, and the actions
//! that push it into (or pull it out of) the settings store.
//!
//! `Shell` holds all state and decides what happens; a `Surface` only
//! displays things and asks the user questions, so the flow can be driven
//! from a Win32 window or from a test double alike.

pub mod preview;
#[cfg(windows)]
pub mod window;

use std::path::Path;

use crate::{
    data_loaders::config::{AppConfig, ApplyMode},
    info,
    store::{backend::RegistryBackend, SettingsStore},
    warn, DEBUG_NAME,
};

use self::preview::{PreviewImage, PREVIEW_HEIGHT, PREVIEW_WIDTH};

pub const NO_FILE_SELECTED: &str = "No file selected";

pub trait Surface {
    /// Image picker; `None` when the user cancels.
    fn pick_image(&mut self) -> Option<String>;

    fn show_info(&mut self, title: &str, message: &str);

    fn show_warning(&mut self, title: &str, message: &str);

    fn show_error(&mut self, title: &str, message: &str);

    fn set_path_label(&mut self, text: &str);

    /// The preview the shell owns has changed and must be redrawn.
    fn preview_changed(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellOptions {
    pub apply_mode: ApplyMode,
    pub warn_on_decode_failure: bool,
}

impl From<&AppConfig> for ShellOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            apply_mode: config.apply_mode(),
            warn_on_decode_failure: config.settings.preview.warn_on_decode_failure,
        }
    }
}

pub struct Shell<B: RegistryBackend> {
    store: SettingsStore<B>,
    options: ShellOptions,
    selected: Option<String>,
    preview: Option<PreviewImage>,
    placeholder: PreviewImage,
}

impl<B: RegistryBackend> Shell<B> {
    pub fn new(store: SettingsStore<B>, options: ShellOptions) -> Self {
        Self {
            store,
            options,
            selected: None,
            preview: None,
            placeholder: PreviewImage::placeholder(PREVIEW_WIDTH, PREVIEW_HEIGHT),
        }
    }

    pub fn options(&self) -> ShellOptions {
        self.options
    }

    pub fn selected_path(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// What the preview region should show right now.
    pub fn displayed_preview(&self) -> &PreviewImage {
        self.preview.as_ref().unwrap_or(&self.placeholder)
    }

    /// Populates the window from whatever the registry already points at.
    /// Runs after the privilege gate has passed.
    pub fn startup(&mut self, surface: &mut impl Surface) {
        match self.store.load_current() {
            Some(path) => {
                info!("[{}][STARTUP] Current lock screen image: {}", DEBUG_NAME, path);
                self.select(path, surface);
            }
            None => {
                info!("[{}][STARTUP] No current lock screen image", DEBUG_NAME);
                surface.set_path_label(NO_FILE_SELECTED);
                surface.preview_changed();
            }
        }
    }

    pub fn on_browse_requested(&mut self, surface: &mut impl Surface) {
        let Some(path) = surface.pick_image() else {
            info!("[{}][BROWSE] Picker cancelled", DEBUG_NAME);
            return;
        };

        self.select(path, surface);
        if self.options.apply_mode == ApplyMode::OnSelect {
            self.on_apply_requested(surface);
        }
    }

    pub fn on_apply_requested(&mut self, surface: &mut impl Surface) {
        let Some(path) = self.selected.clone() else {
            surface.show_warning("No Image Selected", "Please select an image file first.");
            return;
        };

        match self.store.apply(&path) {
            Ok(()) => surface.show_info(
                "Success",
                "Welcome screen background has been set successfully!",
            ),
            Err(e) => surface.show_error(
                "Error",
                &format!("Error setting welcome screen background: {e}"),
            ),
        }
    }

    pub fn on_revert_requested(&mut self, surface: &mut impl Surface) {
        match self.store.revert() {
            Ok(()) => {
                self.clear_selection(surface);
                surface.show_info("Success", "All lock screen registry changes have been removed.");
            }
            Err(e) => {
                // Only forget the selection if nothing is configured any more.
                if self.store.load_current().is_none() {
                    self.clear_selection(surface);
                }
                surface.show_error("Error", &format!("Error removing registry changes: {e}"));
            }
        }
    }

    pub fn on_debug_requested(&mut self, surface: &mut impl Surface) {
        let snapshot = self.store.debug_snapshot();
        surface.show_info("Registry Values", &snapshot.to_string());
    }

    /// Drops the preview image. Called before the window goes away.
    pub fn shutdown(&mut self) {
        if self.preview.take().is_some() {
            info!("[{}][SHUTDOWN] Released preview image", DEBUG_NAME);
        }
    }

    fn select(&mut self, path: String, surface: &mut impl Surface) {
        surface.set_path_label(&path);
        self.show_preview(Some(&path), surface);
        self.selected = Some(path);
    }

    fn clear_selection(&mut self, surface: &mut impl Surface) {
        self.selected = None;
        surface.set_path_label(NO_FILE_SELECTED);
        self.show_preview(None, surface);
    }

    /// Replaces the preview; decode failures fall back to the placeholder.
    fn show_preview(&mut self, path: Option<&str>, surface: &mut impl Surface) {
        self.preview = None;

        if let Some(path) = path {
            match PreviewImage::load(Path::new(path)) {
                Ok(img) => self.preview = Some(img),
                Err(e) => {
                    warn!("[{}][PREVIEW] {}", DEBUG_NAME, e);
                    if self.options.warn_on_decode_failure {
                        surface.show_warning(
                            "Preview Unavailable",
                            &format!("The selected image could not be previewed: {e}"),
                        );
                    }
                }
            }
        }

        surface.preview_changed();
    }
}
