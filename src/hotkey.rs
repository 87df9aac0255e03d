// hotkey.rs - Global Toggle Hotkey
//
// Bindings are written as `ctrl+alt+o`: any number of modifiers and exactly
// one key. On Windows the binding is registered with RegisterHotKey on a
// dedicated thread that owns its message queue; presses are handed to a
// callback which forwards them to the event loop.

use std::fmt;

use crate::error::{OverlayError, Result};

/// Modifier keys of a binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.alt || self.shift || self.win)
    }
}

/// A parsed, normalized hotkey binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HotkeyBinding {
    modifiers: Modifiers,
    key: String,
}

impl HotkeyBinding {
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| OverlayError::InvalidHotkey {
            binding: text.to_string(),
            reason: reason.to_string(),
        };

        let mut modifiers = Modifiers::default();
        let mut key: Option<String> = None;

        for part in text.split('+') {
            let part = part.trim().to_lowercase();
            match part.as_str() {
                "" => return Err(invalid("empty key name")),
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "win" | "super" | "meta" => modifiers.win = true,
                other => {
                    if key.is_some() {
                        return Err(invalid("more than one key"));
                    }
                    let name = normalize_key(other)
                        .ok_or_else(|| invalid(&format!("unknown key '{}'", other)))?;
                    key = Some(name);
                }
            }
        }

        let key = key.ok_or_else(|| invalid("no key given"))?;
        Ok(Self { modifiers, key })
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Normalized key name, e.g. `o`, `f5`, `pageup`
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Win32 virtual-key code of the key
    pub fn virtual_key(&self) -> u32 {
        virtual_key_from_name(&self.key).unwrap_or(0)
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (on, name) in [(m.ctrl, "ctrl"), (m.alt, "alt"), (m.shift, "shift"), (m.win, "win")] {
            if on {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

impl std::str::FromStr for HotkeyBinding {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn normalize_key(name: &str) -> Option<String> {
    let name = match name {
        "esc" => "escape",
        "return" => "enter",
        "pgup" => "pageup",
        "pgdn" => "pagedown",
        "ins" => "insert",
        "del" => "delete",
        other => other,
    };
    virtual_key_from_name(name).map(|_| name.to_string())
}

fn virtual_key_from_name(name: &str) -> Option<u32> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            'a'..='z' => Some(0x41 + (c as u32 - 'a' as u32)),
            '0'..='9' => Some(0x30 + (c as u32 - '0' as u32)),
            _ => None,
        };
    }

    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u32>().ok()) {
        return (1..=24).contains(&n).then(|| 0x70 + n - 1);
    }

    match name {
        "space" => Some(0x20),
        "tab" => Some(0x09),
        "enter" => Some(0x0D),
        "escape" => Some(0x1B),
        "pageup" => Some(0x21),
        "pagedown" => Some(0x22),
        "end" => Some(0x23),
        "home" => Some(0x24),
        "left" => Some(0x25),
        "up" => Some(0x26),
        "right" => Some(0x27),
        "down" => Some(0x28),
        "insert" => Some(0x2D),
        "delete" => Some(0x2E),
        _ => None,
    }
}

#[cfg(target_os = "windows")]
mod service {
    use std::sync::mpsc::sync_channel;
    use std::thread::JoinHandle;

    use log::{debug, info, warn};
    use windows::Win32::Foundation::{ERROR_HOTKEY_ALREADY_REGISTERED, LPARAM, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_ALT, MOD_CONTROL, MOD_NOREPEAT,
        MOD_SHIFT, MOD_WIN,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetMessageW, PeekMessageW, PostThreadMessageW, MSG, PM_NOREMOVE, WM_HOTKEY, WM_QUIT,
    };

    use super::HotkeyBinding;
    use crate::error::{OverlayError, Result};

    const HOTKEY_ID: i32 = 1;

    struct HotkeyThread {
        thread_id: u32,
        join: JoinHandle<()>,
    }

    /// Owns the registered hotkey; dropping it unregisters
    #[derive(Default)]
    pub struct HotkeyService {
        thread: Option<HotkeyThread>,
        binding: Option<HotkeyBinding>,
    }

    impl HotkeyService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn binding(&self) -> Option<&HotkeyBinding> {
            self.binding.as_ref()
        }

        /// Register `binding`, replacing any previous one. `on_press` runs on
        /// the hotkey thread.
        pub fn register(
            &mut self,
            binding: HotkeyBinding,
            on_press: impl Fn() + Send + 'static,
        ) -> Result<()> {
            self.unregister();

            let m = binding.modifiers();
            let mut mods = MOD_NOREPEAT.0;
            if m.ctrl {
                mods |= MOD_CONTROL.0;
            }
            if m.alt {
                mods |= MOD_ALT.0;
            }
            if m.shift {
                mods |= MOD_SHIFT.0;
            }
            if m.win {
                mods |= MOD_WIN.0;
            }
            let vk = binding.virtual_key();

            let (ready_tx, ready_rx) = sync_channel::<std::result::Result<u32, String>>(1);

            let join = std::thread::spawn(move || {
                let mut msg = MSG::default();
                unsafe {
                    // Make sure this thread has a message queue
                    let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
                }

                let registered =
                    unsafe { RegisterHotKey(None, HOTKEY_ID, HOT_KEY_MODIFIERS(mods), vk) };
                if let Err(e) = registered {
                    let reason = if e.code() == ERROR_HOTKEY_ALREADY_REGISTERED.to_hresult() {
                        "already registered by another application".to_string()
                    } else {
                        e.message()
                    };
                    let _ = ready_tx.send(Err(reason));
                    return;
                }

                let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));

                loop {
                    let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
                    if r.0 <= 0 {
                        break;
                    }
                    if msg.message == WM_HOTKEY && msg.wParam.0 as i32 == HOTKEY_ID {
                        on_press();
                    }
                }

                unsafe {
                    let _ = UnregisterHotKey(None, HOTKEY_ID);
                }
            });

            let conflict = |reason: String| OverlayError::HotkeyConflict {
                binding: binding.to_string(),
                reason,
            };

            // The thread always reports before entering its message loop, so
            // block until it does; the join handle is never left behind
            let thread_id = match ready_rx.recv() {
                Ok(Ok(id)) => id,
                Ok(Err(reason)) => {
                    let _ = join.join();
                    return Err(conflict(reason));
                }
                Err(_) => {
                    let _ = join.join();
                    return Err(conflict("hotkey thread exited before registering".into()));
                }
            };

            info!("Registered hotkey '{}'", binding);
            self.thread = Some(HotkeyThread { thread_id, join });
            self.binding = Some(binding);
            Ok(())
        }

        pub fn unregister(&mut self) {
            if let Some(th) = self.thread.take() {
                unsafe {
                    if PostThreadMessageW(th.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)).is_err() {
                        warn!("Failed to stop hotkey thread");
                    }
                }
                let _ = th.join.join();
                debug!("Hotkey thread stopped");
            }
            if let Some(binding) = self.binding.take() {
                info!("Unregistered hotkey '{}'", binding);
            }
        }
    }

    impl Drop for HotkeyService {
        fn drop(&mut self) {
            self.unregister();
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod service {
    use log::warn;

    use super::HotkeyBinding;
    use crate::error::{OverlayError, Result};

    /// Global hotkeys need RegisterHotKey; elsewhere registration fails
    /// and the overlay is driven from the tray only
    #[derive(Default)]
    pub struct HotkeyService;

    impl HotkeyService {
        pub fn new() -> Self {
            Self
        }

        pub fn binding(&self) -> Option<&HotkeyBinding> {
            None
        }

        pub fn register(
            &mut self,
            binding: HotkeyBinding,
            _on_press: impl Fn() + Send + 'static,
        ) -> Result<()> {
            warn!("Global hotkeys are not supported on this platform");
            Err(OverlayError::HotkeyConflict {
                binding: binding.to_string(),
                reason: "global hotkeys are only supported on Windows".into(),
            })
        }

        pub fn unregister(&mut self) {}
    }
}

pub use service::HotkeyService;
