// platform/windows.rs - Windows-specific Overlay Surface
//
// A winit window turned into a layered, topmost, click-through tool window.
// Pixels go through UpdateLayeredWindow with a 32-bit premultiplied DIB, so
// transparent regions of the image show whatever is underneath. The
// whole-window opacity rides on the same call as SourceConstantAlpha.

use log::{debug, info, warn};
use image::RgbaImage;
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    event_loop::ActiveEventLoop,
    platform::windows::WindowAttributesExtWindows,
    window::{Window, WindowAttributes, WindowLevel},
};
use windows::Win32::{
    Foundation::{COLORREF, HWND, POINT, SIZE},
    Graphics::Gdi::*,
    UI::WindowsAndMessaging::*,
};

use super::PlatformOverlaySurface;
use crate::constants::APP_NAME;
use crate::error::{OverlayError, Result};
use crate::layout::ScreenRect;
use crate::utils::hwnd_from_window;

/// The Win32 overlay window
pub struct Win32Surface {
    window: Window,
    hwnd: isize,
    bounds: ScreenRect,
    click_through: bool,
}

impl Win32Surface {
    /// Create the (hidden) overlay window on `bounds`
    pub fn create(event_loop: &ActiveEventLoop, bounds: ScreenRect) -> Result<Self> {
        info!("Creating overlay window at {:?}", bounds);

        let attributes = WindowAttributes::default()
            .with_title(APP_NAME)
            .with_position(PhysicalPosition::new(bounds.x, bounds.y))
            .with_inner_size(PhysicalSize::new(bounds.width.max(1), bounds.height.max(1)))
            .with_decorations(false)
            .with_transparent(true)
            .with_resizable(false)
            .with_visible(false)
            .with_skip_taskbar(true)
            .with_window_level(WindowLevel::AlwaysOnTop);

        let window = event_loop
            .create_window(attributes)
            .map_err(|e| OverlayError::WindowInit(e.to_string()))?;

        let hwnd = hwnd_from_window(&window)
            .ok_or_else(|| OverlayError::WindowInit("window has no Win32 handle".into()))?;

        info!("Overlay window created with ID: {:?}", window.id());

        Ok(Self {
            window,
            hwnd,
            bounds,
            click_through: true,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn hwnd(&self) -> HWND {
        HWND(self.hwnd as *mut _)
    }

    /// Extended styles for the current input mode. Outside click-through
    /// the window may also take focus so it gets keyboard input.
    fn ex_style(&self, current: isize) -> isize {
        let input = WS_EX_TRANSPARENT.0 as isize | WS_EX_NOACTIVATE.0 as isize;
        let style = current
            | WS_EX_LAYERED.0 as isize
            | WS_EX_TOPMOST.0 as isize
            | WS_EX_TOOLWINDOW.0 as isize;
        if self.click_through {
            style | input
        } else {
            style & !input
        }
    }

    fn apply_ex_style(&self) -> Result<()> {
        unsafe {
            let hwnd = self.hwnd();
            let current = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
            let wanted = self.ex_style(current);
            if current != wanted {
                SetWindowLongPtrW(hwnd, GWL_EXSTYLE, wanted);
                if GetWindowLongPtrW(hwnd, GWL_EXSTYLE) & WS_EX_LAYERED.0 as isize == 0 {
                    return Err(OverlayError::WindowInit(
                        "window refused the layered style".into(),
                    ));
                }
            }

            // Styles take effect after a frame change
            SetWindowPos(
                hwnd,
                Some(HWND_TOPMOST),
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE | SWP_FRAMECHANGED,
            )
            .map_err(|e| OverlayError::WindowInit(e.message()))?;
        }
        Ok(())
    }
}

impl PlatformOverlaySurface for Win32Surface {
    fn initialize(&mut self) -> Result<()> {
        self.apply_ex_style()?;
        info!("Applied layered, topmost, click-through style to overlay window");
        Ok(())
    }

    fn show(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd(), SW_SHOWNOACTIVATE);
        }
    }

    fn hide(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd(), SW_HIDE);
        }
    }

    fn reassert_topmost(&mut self) {
        unsafe {
            if let Err(e) = SetWindowPos(
                self.hwnd(),
                Some(HWND_TOPMOST),
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            ) {
                warn!("Failed to re-assert topmost: {}", e.message());
            }
        }
    }

    fn set_click_through(&mut self, click_through: bool) {
        if self.click_through == click_through {
            return;
        }
        self.click_through = click_through;
        if let Err(e) = self.apply_ex_style() {
            warn!("Failed to change click-through to {}: {}", click_through, e);
        }
        if !click_through {
            unsafe {
                let _ = SetForegroundWindow(self.hwnd());
            }
        }
        debug!("Click-through set to {}", click_through);
    }

    fn set_bounds(&mut self, bounds: ScreenRect) {
        if self.bounds == bounds {
            return;
        }
        self.bounds = bounds;
        unsafe {
            // Move and resize atomically so the window doesn't jitter
            let _ = SetWindowPos(
                self.hwnd(),
                Some(HWND_TOPMOST),
                bounds.x,
                bounds.y,
                bounds.width as i32,
                bounds.height as i32,
                SWP_NOACTIVATE,
            );
        }
    }

    fn bounds(&self) -> ScreenRect {
        self.bounds
    }

    fn set_alpha(&mut self, alpha: u8) {
        let blend = blend_function(alpha);
        unsafe {
            // No source DC: only the blend function changes
            let _ = UpdateLayeredWindow(
                self.hwnd(),
                None,
                None,
                None,
                None,
                None,
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            );
        }
    }

    fn present(&mut self, canvas: &RgbaImage, alpha: u8) {
        let (width, height) = (canvas.width() as i32, canvas.height() as i32);
        if width <= 0 || height <= 0 {
            return;
        }

        unsafe {
            let screen_dc = GetDC(None);
            let mem_dc = CreateCompatibleDC(Some(screen_dc));

            // Create 32-bit ARGB bitmap
            let bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    biHeight: -height, // Top-down
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: 0,
                    biSizeImage: 0,
                    biXPelsPerMeter: 0,
                    biYPelsPerMeter: 0,
                    biClrUsed: 0,
                    biClrImportant: 0,
                },
                bmiColors: [RGBQUAD::default()],
            };

            let mut bits: *mut std::ffi::c_void = std::ptr::null_mut();
            let bitmap = CreateDIBSection(Some(mem_dc), &bmi, DIB_RGB_COLORS, &mut bits, None, 0)
                .unwrap_or(HBITMAP(std::ptr::null_mut()));

            if bitmap.is_invalid() || bits.is_null() {
                warn!("CreateDIBSection failed for {}x{} canvas", width, height);
                let _ = DeleteDC(mem_dc);
                let _ = ReleaseDC(None, screen_dc);
                return;
            }

            let old_bitmap = SelectObject(mem_dc, bitmap.into());

            let src = canvas.as_raw();
            let dst = std::slice::from_raw_parts_mut(bits as *mut u8, src.len());
            dst.copy_from_slice(src);

            let blend = blend_function(alpha);
            let size_struct = SIZE { cx: width, cy: height };
            let point_dst = POINT {
                x: self.bounds.x,
                y: self.bounds.y,
            };
            let point_src = POINT { x: 0, y: 0 };

            if let Err(e) = UpdateLayeredWindow(
                self.hwnd(),
                Some(screen_dc),
                Some(&point_dst),
                Some(&size_struct),
                Some(mem_dc),
                Some(&point_src),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            ) {
                warn!("UpdateLayeredWindow failed: {}", e.message());
            }

            // Cleanup
            SelectObject(mem_dc, old_bitmap);
            let _ = DeleteObject(bitmap.into());
            let _ = DeleteDC(mem_dc);
            let _ = ReleaseDC(None, screen_dc);
        }
    }
}

fn blend_function(alpha: u8) -> BLENDFUNCTION {
    BLENDFUNCTION {
        BlendOp: 0, // AC_SRC_OVER
        BlendFlags: 0,
        SourceConstantAlpha: alpha,
        AlphaFormat: 1, // AC_SRC_ALPHA
    }
}
