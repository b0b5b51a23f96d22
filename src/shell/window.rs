use std::{
    cell::{Cell, RefCell},
    ffi::{c_void, OsString},
    mem,
    os::windows::ffi::OsStringExt,
};

use windows::{
    core::{w, Result, PCWSTR},
    Win32::{
        Foundation::{COLORREF, ERROR_CANCELLED, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM},
        Graphics::Gdi::{
            BeginPaint, CreateSolidBrush, DeleteObject, EndPaint, FillRect, FrameRect,
            GetStockObject, InvalidateRect, SetBkMode, SetTextColor, StretchDIBits, BITMAPINFO,
            BITMAPINFOHEADER, BI_RGB, DEFAULT_GUI_FONT, DIB_RGB_COLORS, HBRUSH, HDC, HGDIOBJ,
            PAINTSTRUCT, SRCCOPY, TRANSPARENT,
        },
        System::{
            Com::{
                CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize,
                CLSCTX_INPROC_SERVER, COINIT, COINIT_APARTMENTTHREADED,
            },
            LibraryLoader::GetModuleHandleW,
        },
        UI::{
            Shell::{
                Common::COMDLG_FILTERSPEC, FileOpenDialog, IFileOpenDialog, FOS_FILEMUSTEXIST,
                FOS_FORCEFILESYSTEM, SIGDN_FILESYSPATH,
            },
            WindowsAndMessaging::{
                CreateWindowExW, DefWindowProcW, DispatchMessageW, GetMessageW, GetSystemMetrics,
                LoadCursorW, MessageBoxW, PostQuitMessage, RegisterClassW, SendMessageTimeoutW,
                SetWindowTextW, ShowWindow, TranslateMessage, CS_HREDRAW, CS_VREDRAW, HMENU,
                IDC_ARROW, MB_ICONERROR, MB_ICONINFORMATION, MB_ICONWARNING, MB_OK,
                MESSAGEBOX_STYLE, MSG, SMTO_NORMAL, SM_CXSCREEN, SM_CYSCREEN, SW_SHOW,
                WINDOW_EX_STYLE, WINDOW_STYLE, WM_COMMAND, WM_CTLCOLORSTATIC, WM_DESTROY,
                WM_PAINT, WM_SETFONT, WNDCLASSW, WS_CAPTION, WS_CHILD, WS_MINIMIZEBOX,
                WS_OVERLAPPED, WS_SYSMENU, WS_TABSTOP, WS_VISIBLE,
            },
        },
    },
};

use super::{
    preview::{PreviewImage, PREVIEW_HEIGHT, PREVIEW_WIDTH},
    Shell, Surface, NO_FILE_SELECTED,
};
use crate::{
    data_loaders::config::{AppConfig, ApplyMode},
    error, info,
    store::machine::MachineRegistry,
    utility::{to_wstring, version_label},
    warn, DEBUG_NAME,
};

const MAIN_CLASS_NAME: PCWSTR = w!("LockScreenCustomizerWindow");
const WINDOW_TITLE: &str = "Windows 11 Welcome Screen Customizer";
const WINDOW_WIDTH: i32 = 800;
const WINDOW_HEIGHT: i32 = 600;

const ID_BROWSE: u16 = 1001;
const ID_APPLY: u16 = 1002;
const ID_REVERT: u16 = 1003;
const ID_DEBUG: u16 = 1004;

const BS_PUSHBUTTON: u32 = 0x0000;
const SS_CENTER: u32 = 0x0001;
const SS_RIGHT: u32 = 0x0002;
const SS_CENTERIMAGE: u32 = 0x0200;
const SS_PATHELLIPSIS: u32 = 0x8000;
const BN_CLICKED: usize = 0;

const BACKGROUND_COLOR: COLORREF = rgb(243, 243, 243);
const PANEL_COLOR: COLORREF = rgb(255, 255, 255);
const BORDER_COLOR: COLORREF = rgb(218, 218, 218);
const PRIMARY_COLOR: COLORREF = rgb(0, 120, 212);
const MUTED_COLOR: COLORREF = rgb(88, 88, 88);

const fn rgb(r: u8, g: u8, b: u8) -> COLORREF {
    COLORREF(r as u32 | (g as u32) << 8 | (b as u32) << 16)
}

#[derive(Clone, Copy)]
struct Bounds {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl Bounds {
    const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    fn rect(self) -> RECT {
        RECT {
            left: self.x,
            top: self.y,
            right: self.x + self.w,
            bottom: self.y + self.h,
        }
    }
}

const TITLE: Bounds = Bounds::new(20, 20, 740, 40);
const INSTRUCTION: Bounds = Bounds::new(20, 60, 740, 30);
const FILE_PANEL: Bounds = Bounds::new(20, 100, 740, 60);
const PATH_LABEL: Bounds = Bounds::new(30, 110, 720, 40);
const PREVIEW_PANEL: Bounds = Bounds::new(20, 170, 740, 240);
const PREVIEW_AREA: Bounds = Bounds::new(30, 180, PREVIEW_WIDTH as i32, PREVIEW_HEIGHT as i32);
const VERSION: Bounds = Bounds::new(660, 520, 100, 20);
const DEBUG_BUTTON: Bounds = Bounds::new(20, 512, 160, 28);

/// GDI objects and control handles that painting needs even while the
/// shell is busy inside a modal dialog.
#[derive(Clone, Copy)]
struct Palette {
    background: HBRUSH,
    panel: HBRUSH,
    border: HBRUSH,
    title: HWND,
    path_label: HWND,
}

impl Palette {
    fn release(self) {
        unsafe {
            let _ = DeleteObject(self.background.into());
            let _ = DeleteObject(self.panel.into());
            let _ = DeleteObject(self.border.into());
        }
    }
}

struct WindowState {
    shell: Shell<MachineRegistry>,
    surface: Win32Surface,
}

thread_local! {
    static WINDOW: RefCell<Option<WindowState>> = const { RefCell::new(None) };
    static PALETTE: Cell<Option<Palette>> = const { Cell::new(None) };
}

struct Win32Surface {
    hwnd: HWND,
    path_label: HWND,
}

impl Surface for Win32Surface {
    fn pick_image(&mut self) -> Option<String> {
        match pick_image_file(self.hwnd) {
            Ok(None) => None,
            Ok(Some(picked)) => match registry_path(picked) {
                Ok(path) => Some(path),
                Err(message) => {
                    warn!("[{}][BROWSE] {}", DEBUG_NAME, message);
                    self.show_error("Error", &message);
                    None
                }
            },
            Err(e) => {
                warn!("[{}][BROWSE] File dialog failed: {e:?}", DEBUG_NAME);
                self.show_error("Error", &format!("Could not open the file picker: {e}"));
                None
            }
        }
    }

    fn show_info(&mut self, title: &str, message: &str) {
        message_box(Some(self.hwnd), title, message, MB_OK | MB_ICONINFORMATION);
    }

    fn show_warning(&mut self, title: &str, message: &str) {
        message_box(Some(self.hwnd), title, message, MB_OK | MB_ICONWARNING);
    }

    fn show_error(&mut self, title: &str, message: &str) {
        message_box(Some(self.hwnd), title, message, MB_OK | MB_ICONERROR);
    }

    fn set_path_label(&mut self, text: &str) {
        let wide = to_wstring(text);
        unsafe {
            let _ = SetWindowTextW(self.path_label, PCWSTR(wide.as_ptr()));
        }
    }

    fn preview_changed(&mut self) {
        invalidate_preview(self.hwnd);
    }
}

/// Blocking notice shown when the process lacks administrator rights.
pub fn show_admin_notice() {
    message_box(
        None,
        "Admin Rights Required",
        "This application requires administrative privileges to modify registry settings.",
        MB_OK | MB_ICONWARNING,
    );
}

/// COM initialisation held for the lifetime of the value. Only a
/// successful `CoInitializeEx` is paired with `CoUninitialize`.
struct ComApartment;

impl ComApartment {
    fn enter(model: COINIT) -> Option<Self> {
        let hr = unsafe { CoInitializeEx(None, model) };
        if hr.is_ok() {
            Some(Self)
        } else {
            warn!("[{}] CoInitializeEx failed: {:?}", DEBUG_NAME, hr);
            None
        }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

/// Creates the main window, hands it the shell and pumps messages until
/// the window is closed.
pub fn run(mut shell: Shell<MachineRegistry>, config: &AppConfig) -> Result<()> {
    let _com = ComApartment::enter(COINIT_APARTMENTTHREADED);

    let instance = unsafe { GetModuleHandleW(None).map(|h| HINSTANCE(h.0))? };

    let background = unsafe { CreateSolidBrush(BACKGROUND_COLOR) };
    let panel = unsafe { CreateSolidBrush(PANEL_COLOR) };
    let border = unsafe { CreateSolidBrush(BORDER_COLOR) };

    register_class(instance, background)?;
    let hwnd = create_main_window(instance)?;

    let show_apply = shell.options().apply_mode == ApplyMode::Explicit;
    let show_debug = config.settings.diagnostics.show_registry_button;
    let (title, path_label) = create_controls(hwnd, instance, show_apply, show_debug)?;

    PALETTE.with(|p| {
        p.set(Some(Palette {
            background,
            panel,
            border,
            title,
            path_label,
        }))
    });

    let mut surface = Win32Surface { hwnd, path_label };
    shell.startup(&mut surface);
    WINDOW.with(|w| *w.borrow_mut() = Some(WindowState { shell, surface }));

    unsafe {
        let _ = ShowWindow(hwnd, SW_SHOW);
    }
    info!("[{}] Main window shown", DEBUG_NAME);

    unsafe {
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    WINDOW.with(|w| w.borrow_mut().take());
    if let Some(palette) = PALETTE.with(Cell::take) {
        palette.release();
    }
    warn!("[{}] Window closed", DEBUG_NAME);
    Ok(())
}

fn register_class(instance: HINSTANCE, background: HBRUSH) -> Result<()> {
    let wc = WNDCLASSW {
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(window_proc),
        hInstance: instance,
        hCursor: unsafe { LoadCursorW(None, IDC_ARROW).unwrap_or_default() },
        hbrBackground: background,
        lpszClassName: MAIN_CLASS_NAME,
        ..Default::default()
    };

    if unsafe { RegisterClassW(&wc) } == 0 {
        return Err(windows::core::Error::from_win32());
    }
    Ok(())
}

fn create_main_window(instance: HINSTANCE) -> Result<HWND> {
    let (screen_w, screen_h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    let x = ((screen_w - WINDOW_WIDTH) / 2).max(0);
    let y = ((screen_h - WINDOW_HEIGHT) / 2).max(0);

    let title = to_wstring(WINDOW_TITLE);
    let style = WINDOW_STYLE(WS_OVERLAPPED.0 | WS_CAPTION.0 | WS_SYSMENU.0 | WS_MINIMIZEBOX.0);

    unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            MAIN_CLASS_NAME,
            PCWSTR(title.as_ptr()),
            style,
            x,
            y,
            WINDOW_WIDTH,
            WINDOW_HEIGHT,
            None,
            None,
            Some(instance),
            None,
        )
    }
}

/// Returns the title and path label handles, the two statics that get
/// custom colours.
fn create_controls(
    hwnd: HWND,
    instance: HINSTANCE,
    show_apply: bool,
    show_debug: bool,
) -> Result<(HWND, HWND)> {
    let font = unsafe { GetStockObject(DEFAULT_GUI_FONT) };
    let label = |text: &str, bounds: Bounds, style: u32| {
        create_control(hwnd, instance, w!("STATIC"), text, style, bounds, 0, font)
    };
    let button = |text: &str, bounds: Bounds, id: u16| {
        create_control(
            hwnd,
            instance,
            w!("BUTTON"),
            text,
            WS_TABSTOP.0 | BS_PUSHBUTTON,
            bounds,
            id,
            font,
        )
    };

    let title = label(WINDOW_TITLE, TITLE, SS_CENTER | SS_CENTERIMAGE)?;
    label(
        "Select an image file to set as your Windows welcome screen background.",
        INSTRUCTION,
        SS_CENTER | SS_CENTERIMAGE,
    )?;
    let path_label = label(NO_FILE_SELECTED, PATH_LABEL, SS_CENTERIMAGE | SS_PATHELLIPSIS)?;
    label(&version_label(), VERSION, SS_RIGHT)?;

    if show_apply {
        button("Browse for Image", Bounds::new(135, 420, 250, 35), ID_BROWSE)?;
        button("Set as Welcome Screen", Bounds::new(395, 420, 250, 35), ID_APPLY)?;
    } else {
        button("Browse for Image", Bounds::new(265, 420, 250, 35), ID_BROWSE)?;
    }
    button("Revert to Original Settings", Bounds::new(265, 460, 250, 35), ID_REVERT)?;

    if show_debug {
        button("Show Registry Values", DEBUG_BUTTON, ID_DEBUG)?;
    }

    Ok((title, path_label))
}

#[allow(clippy::too_many_arguments)]
fn create_control(
    parent: HWND,
    instance: HINSTANCE,
    class: PCWSTR,
    text: &str,
    style: u32,
    bounds: Bounds,
    id: u16,
    font: HGDIOBJ,
) -> Result<HWND> {
    let text = to_wstring(text);
    unsafe {
        let control = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            class,
            PCWSTR(text.as_ptr()),
            WINDOW_STYLE(WS_CHILD.0 | WS_VISIBLE.0 | style),
            bounds.x,
            bounds.y,
            bounds.w,
            bounds.h,
            Some(parent),
            Some(HMENU(id as usize as *mut c_void)),
            Some(instance),
            None,
        )?;

        let _ = SendMessageTimeoutW(
            control,
            WM_SETFONT,
            WPARAM(font.0 as usize),
            LPARAM(1),
            SMTO_NORMAL,
            1000,
            None,
        );
        Ok(control)
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_COMMAND if (wparam.0 >> 16) & 0xFFFF == BN_CLICKED => {
            let id = (wparam.0 & 0xFFFF) as u16;
            if dispatch_command(id) {
                // Paints that arrived while a dialog was up were skipped.
                invalidate_preview(hwnd);
                return LRESULT(0);
            }
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        WM_CTLCOLORSTATIC => {
            let Some(palette) = PALETTE.with(Cell::get) else {
                return DefWindowProcW(hwnd, msg, wparam, lparam);
            };
            let hdc = HDC(wparam.0 as *mut c_void);
            let control = HWND(lparam.0 as *mut c_void);
            SetBkMode(hdc, TRANSPARENT);

            if control == palette.title {
                SetTextColor(hdc, PRIMARY_COLOR);
            } else {
                SetTextColor(hdc, MUTED_COLOR);
            }

            let brush = if control == palette.path_label {
                palette.panel
            } else {
                palette.background
            };
            LRESULT(brush.0 as isize)
        }
        WM_PAINT => {
            paint(hwnd);
            LRESULT(0)
        }
        WM_DESTROY => {
            WINDOW.with(|w| {
                if let Ok(mut guard) = w.try_borrow_mut() {
                    if let Some(state) = guard.as_mut() {
                        state.shell.shutdown();
                    }
                }
            });
            PostQuitMessage(0);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn dispatch_command(id: u16) -> bool {
    WINDOW.with(|cell| {
        let Ok(mut guard) = cell.try_borrow_mut() else {
            error!("[{}] Command {} arrived while another was running", DEBUG_NAME, id);
            return false;
        };
        let Some(WindowState { shell, surface }) = guard.as_mut() else {
            return false;
        };

        match id {
            ID_BROWSE => shell.on_browse_requested(surface),
            ID_APPLY => shell.on_apply_requested(surface),
            ID_REVERT => shell.on_revert_requested(surface),
            ID_DEBUG => shell.on_debug_requested(surface),
            _ => return false,
        }
        true
    })
}

fn paint(hwnd: HWND) {
    unsafe {
        let mut ps = PAINTSTRUCT::default();
        let hdc = BeginPaint(hwnd, &mut ps);

        if let Some(palette) = PALETTE.with(Cell::get) {
            for panel in [FILE_PANEL, PREVIEW_PANEL] {
                let rect = panel.rect();
                FillRect(hdc, &rect, palette.panel);
                FrameRect(hdc, &rect, palette.border);
            }
        }

        WINDOW.with(|w| {
            if let Ok(guard) = w.try_borrow() {
                if let Some(state) = guard.as_ref() {
                    draw_preview(hdc, state.shell.displayed_preview());
                }
            }
        });

        let _ = EndPaint(hwnd, &ps);
    }
}

fn draw_preview(hdc: HDC, img: &PreviewImage) {
    let (dx, dy) = img.origin_in(PREVIEW_WIDTH, PREVIEW_HEIGHT);
    let (w, h) = (img.width() as i32, img.height() as i32);

    let info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: w,
            biHeight: -h,
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    unsafe {
        StretchDIBits(
            hdc,
            PREVIEW_AREA.x + dx,
            PREVIEW_AREA.y + dy,
            w,
            h,
            0,
            0,
            w,
            h,
            Some(img.pixels().as_ptr() as *const c_void),
            &info,
            DIB_RGB_COLORS,
            SRCCOPY,
        );
    }
}

fn invalidate_preview(hwnd: HWND) {
    let rect = PREVIEW_PANEL.rect();
    unsafe {
        let _ = InvalidateRect(Some(hwnd), Some(&rect as *const RECT), false);
    }
}

fn message_box(owner: Option<HWND>, title: &str, message: &str, style: MESSAGEBOX_STYLE) {
    let title = to_wstring(title);
    let message = to_wstring(message);
    unsafe {
        let _ = MessageBoxW(owner, PCWSTR(message.as_ptr()), PCWSTR(title.as_ptr()), style);
    }
}

/// Shell file-open dialog limited to common raster formats, with an
/// "All Files" escape hatch. `Ok(None)` means the user cancelled.
fn pick_image_file(owner: HWND) -> Result<Option<OsString>> {
    unsafe {
        let dialog: IFileOpenDialog = CoCreateInstance(&FileOpenDialog, None, CLSCTX_INPROC_SERVER)?;

        let filters = [
            COMDLG_FILTERSPEC {
                pszName: w!("Image Files"),
                pszSpec: w!("*.jpg;*.jpeg;*.png;*.bmp"),
            },
            COMDLG_FILTERSPEC {
                pszName: w!("All Files"),
                pszSpec: w!("*.*"),
            },
        ];
        dialog.SetFileTypes(&filters)?;
        dialog.SetFileTypeIndex(1)?;
        dialog.SetTitle(w!("Select Lock Screen Image"))?;
        let options = dialog.GetOptions()?;
        dialog.SetOptions(options | FOS_FILEMUSTEXIST | FOS_FORCEFILESYSTEM)?;

        if let Err(e) = dialog.Show(Some(owner)) {
            if e.code() == ERROR_CANCELLED.to_hresult() {
                return Ok(None);
            }
            return Err(e);
        }

        let item = dialog.GetResult()?;
        let raw = item.GetDisplayName(SIGDN_FILESYSPATH)?;
        let path = OsString::from_wide(raw.as_wide());
        CoTaskMemFree(Some(raw.0 as *const c_void));

        info!("[{}][BROWSE] Picked {}", DEBUG_NAME, path.to_string_lossy());
        Ok(Some(path))
    }
}

/// The picked path unchanged, or a message when it holds UTF-16 that has no
/// exact string form (unpaired surrogates) and so cannot be written as-is.
fn registry_path(picked: OsString) -> std::result::Result<String, String> {
    picked.into_string().map_err(|raw| {
        format!(
            "The selected path contains characters that cannot be stored in the registry: {}",
            raw.to_string_lossy()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::{Foundation::S_FALSE, System::Com::COINIT_MULTITHREADED};

    #[test]
    fn picked_paths_are_kept_exactly() {
        let wide: Vec<u16> = r"C:\Bilder\Strand 🌊.jpg".encode_utf16().collect();
        assert_eq!(
            registry_path(OsString::from_wide(&wide)).unwrap(),
            r"C:\Bilder\Strand 🌊.jpg"
        );
    }

    #[test]
    fn unpaired_surrogate_is_rejected_not_replaced() {
        let wide = [0x43, 0x3A, 0x5C, 0xD800, 0x2E, 0x6A, 0x70, 0x67];
        let message = registry_path(OsString::from_wide(&wide)).unwrap_err();
        assert!(message.contains("cannot be stored"));
    }

    #[test]
    fn failed_com_init_does_not_uninitialize() {
        std::thread::spawn(|| {
            let sta = ComApartment::enter(COINIT_APARTMENTTHREADED);
            assert!(sta.is_some());

            // RPC_E_CHANGED_MODE; the apartment above must survive it.
            assert!(ComApartment::enter(COINIT_MULTITHREADED).is_none());
            let again = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
            assert_eq!(again, S_FALSE);
            unsafe { CoUninitialize() };

            drop(sta);
        })
        .join()
        .unwrap();
    }
}
