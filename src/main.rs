// main.rs - PeekOverlay Application Entry Point
//
// Wires the pieces together on the winit event loop:
// 1. Overlay surface + controller, created once the loop is running
// 2. Global hotkey thread and tray menu, both feeding UserEvents back in
// 3. Timer wakeups via ControlFlow::WaitUntil for animation and z-order
// 4. Settings and gallery persistence

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, StartCause, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowId;

use peekoverlay::gallery::Gallery;
use peekoverlay::platform::monitor_rect;
use peekoverlay::{
    HotkeyBinding, HotkeyService, NativeSurface, OverlayController, OverlayError,
    PlatformOverlaySurface, Settings, Wakeup,
};

#[cfg(target_os = "windows")]
mod ui;

#[cfg(target_os = "windows")]
use peekoverlay::platform::monitor_count;
#[cfg(target_os = "windows")]
use ui::{SystemTray, TrayAction};

/// Events delivered to the event loop from other threads and the tray
#[derive(Debug)]
pub enum UserEvent {
    /// The global hotkey was pressed
    ToggleOverlay,
    #[cfg(target_os = "windows")]
    Menu(tray_icon::menu::MenuEvent),
    #[cfg(target_os = "windows")]
    Tray(tray_icon::TrayIconEvent),
}

struct PeekOverlayApp {
    event_proxy: EventLoopProxy<UserEvent>,
    settings: Settings,
    controller: Option<OverlayController<NativeSurface>>,
    hotkey: HotkeyService,
    gallery: Option<Gallery>,
    #[cfg(target_os = "windows")]
    tray: Option<SystemTray>,
    /// Deadline handed to the event loop in about_to_wait
    pending_wakeup: Option<Wakeup>,
    /// Last cursor position over the overlay, in screen coordinates
    cursor: (i32, i32),
    /// Where a right-drag resize started
    resize_anchor: Option<(i32, i32)>,
    /// Error that ended the application
    fatal: Option<anyhow::Error>,
}

impl PeekOverlayApp {
    fn new(event_proxy: EventLoopProxy<UserEvent>, settings: Settings) -> Self {
        Self {
            event_proxy,
            settings,
            controller: None,
            hotkey: HotkeyService::new(),
            gallery: None,
            #[cfg(target_os = "windows")]
            tray: None,
            pending_wakeup: None,
            cursor: (0, 0),
            resize_anchor: None,
            fatal: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let display = monitor_rect(event_loop, self.settings.display_index);
        let surface = NativeSurface::create(event_loop, display)?;
        let mut controller =
            OverlayController::new(surface, display, self.settings.controller_options())?;

        controller.set_scaling_mode(self.settings.scaling_mode);
        controller.set_scales(self.settings.scale_factor, self.settings.tile_scale);
        controller.set_animation_speed(self.settings.animation_speed);
        controller.set_opacity(self.settings.opacity);

        if let Some(path) = self.settings.image_path.clone() {
            // A missing or broken image just means starting without one
            if let Err(e) = controller.set_active_image(&path, self.settings.opacity) {
                warn!("Startup image not loaded: {}", e);
            }
        }
        self.controller = Some(controller);

        match Gallery::open(Gallery::default_dir()) {
            Ok(gallery) => self.gallery = Some(gallery),
            Err(e) => warn!("Gallery unavailable: {}", e),
        }

        self.register_hotkey();

        #[cfg(target_os = "windows")]
        match SystemTray::new(self.event_proxy.clone()) {
            Ok(tray) => self.tray = Some(tray),
            Err(e) => error!("Failed to create tray icon: {:#}", e),
        }
        self.refresh_tray(true);

        info!("PeekOverlay ready, press {} to toggle the overlay", self.settings.hotkey);
        Ok(())
    }

    fn register_hotkey(&mut self) {
        let proxy = self.event_proxy.clone();
        let result = HotkeyBinding::parse(&self.settings.hotkey).and_then(|binding| {
            self.hotkey.register(binding, move || {
                if let Err(e) = proxy.send_event(UserEvent::ToggleOverlay) {
                    error!("Failed to forward hotkey press: {}", e);
                }
            })
        });

        if let Err(e) = result {
            warn!("{}; running without a hotkey", e);
            notify("Hotkey unavailable", &format!("{}\n\nUse the tray icon instead.", e));
        }
    }

    fn toggle_overlay(&mut self) {
        if let Some(controller) = &mut self.controller {
            controller.toggle_overlay();
        }
        self.refresh_tray(false);
    }

    fn active_path(&self) -> Option<PathBuf> {
        self.controller
            .as_ref()?
            .state()
            .active_image
            .as_ref()
            .map(|i| i.source_path().to_path_buf())
    }

    fn select_image(&mut self, path: &Path) {
        let opacity = self
            .gallery
            .as_ref()
            .and_then(|g| g.find(path))
            .map_or(self.settings.opacity, |e| e.opacity);

        let Some(controller) = &mut self.controller else {
            return;
        };
        match controller.set_active_image(path, opacity) {
            Ok(()) => {
                self.settings.image_path = Some(path.to_path_buf());
                self.settings.opacity = opacity;
                self.save_settings();
            }
            Err(e) => notify("Could not load image", &e.to_string()),
        }
        self.refresh_tray(false);
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings.save() {
            error!("{:#}", e);
        }
    }

    #[cfg(target_os = "windows")]
    fn handle_action(&mut self, event_loop: &ActiveEventLoop, action: TrayAction) {
        use peekoverlay::layout::ScalingMode;

        info!("Tray action: {:?}", action);
        let mut gallery_changed = false;

        match action {
            TrayAction::ToggleOverlay => self.toggle_overlay(),
            TrayAction::SelectImage(path) => self.select_image(&path),
            TrayAction::ImportImage => {
                if let Some(path) = self.import_image() {
                    gallery_changed = true;
                    self.select_image(&path);
                }
            }
            TrayAction::RemoveImage => gallery_changed = self.remove_active_image(),
            TrayAction::Opacity(opacity) => {
                if let Some(controller) = &mut self.controller {
                    controller.set_opacity(opacity);
                }
                self.settings.opacity = opacity;
                let active = self.active_path();
                if let (Some(gallery), Some(path)) = (self.gallery.as_mut(), active) {
                    if gallery.find(&path).is_some() {
                        if let Err(e) = gallery.set_opacity(&path, opacity) {
                            warn!("{}", e);
                        }
                    }
                }
                self.save_settings();
            }
            TrayAction::Scaling(mode) => {
                if let Some(controller) = &mut self.controller {
                    controller.set_scaling_mode(mode);
                }
                self.settings.scaling_mode = mode;
                self.save_settings();
            }
            TrayAction::ScaleUp | TrayAction::ScaleDown => {
                if let Some(controller) = &mut self.controller {
                    if action == TrayAction::ScaleUp {
                        controller.increase_scale();
                    } else {
                        controller.decrease_scale();
                    }
                    let state = controller.state();
                    self.settings.scale_factor = state.scale_factor;
                    self.settings.tile_scale = state.tile_scale;
                    if state.scaling_mode == ScalingMode::Tile {
                        info!("Tile scale {:.2}", state.tile_scale);
                    }
                }
                self.save_settings();
            }
            TrayAction::ResetPosition => {
                if let Some(controller) = &mut self.controller {
                    controller.reset_position();
                }
            }
            TrayAction::EditMode(on) => {
                if let Some(controller) = &mut self.controller {
                    controller.set_edit_mode(on);
                }
            }
            TrayAction::NextDisplay => {
                let count = monitor_count(event_loop).max(1);
                self.settings.display_index = (self.settings.display_index + 1) % count;
                let display = monitor_rect(event_loop, self.settings.display_index);
                if let Some(controller) = &mut self.controller {
                    controller.set_display(display);
                }
                self.save_settings();
            }
            TrayAction::Exit => {
                info!("Exit requested from tray");
                event_loop.exit();
                return;
            }
        }

        self.refresh_tray(gallery_changed);
    }

    /// Ask for a file and copy it into the gallery
    #[cfg(target_os = "windows")]
    fn import_image(&mut self) -> Option<PathBuf> {
        use peekoverlay::constants::SUPPORTED_EXTENSIONS;

        let source = rfd::FileDialog::new()
            .set_title("Import Image")
            .add_filter("Image Files", SUPPORTED_EXTENSIONS)
            .pick_file()?;

        let Some(gallery) = self.gallery.as_mut() else {
            // No gallery directory; show the file in place
            return Some(source);
        };

        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match gallery.import(&source, &name) {
            Ok(path) => Some(path),
            Err(e) => {
                notify("Import failed", &e.to_string());
                None
            }
        }
    }

    #[cfg(target_os = "windows")]
    fn remove_active_image(&mut self) -> bool {
        let Some(path) = self.active_path() else {
            return false;
        };
        let Some(gallery) = self.gallery.as_mut() else {
            return false;
        };
        if gallery.find(&path).is_none() {
            return false;
        }

        let confirmed = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Warning)
            .set_title("Remove Image")
            .set_description(format!(
                "Delete {} from the gallery?",
                path.file_name().unwrap_or_default().to_string_lossy()
            ))
            .set_buttons(rfd::MessageButtons::YesNo)
            .show()
            == rfd::MessageDialogResult::Yes;
        if !confirmed {
            return false;
        }

        if let Err(e) = gallery.remove(&path) {
            notify("Remove failed", &e.to_string());
            return false;
        }
        if self.settings.image_path.as_deref() == Some(path.as_path()) {
            self.settings.image_path = None;
            self.save_settings();
        }
        true
    }

    #[cfg(target_os = "windows")]
    fn refresh_tray(&mut self, gallery_changed: bool) {
        let active = self.active_path();
        let Some(tray) = self.tray.as_mut() else {
            return;
        };
        let Some(controller) = &self.controller else {
            return;
        };

        if gallery_changed {
            let entries = self.gallery.as_ref().map(|g| g.entries()).unwrap_or_default();
            if let Err(e) = tray.set_gallery(entries, active.as_deref()) {
                error!("Failed to rebuild gallery menu: {:#}", e);
            }
        }

        let in_gallery = match (&self.gallery, &active) {
            (Some(g), Some(p)) => g.find(p).is_some(),
            _ => false,
        };
        tray.update(controller.state(), in_gallery);
    }

    #[cfg(not(target_os = "windows"))]
    fn refresh_tray(&mut self, _gallery_changed: bool) {}
}

impl ApplicationHandler<UserEvent> for PeekOverlayApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.controller.is_some() || self.fatal.is_some() {
            return;
        }
        info!("Application resumed");

        if let Err(e) = self.start(event_loop) {
            error!("{:#}", e);
            notify("PeekOverlay cannot start", &format!("{:#}", e));
            self.fatal = Some(e);
            event_loop.exit();
        }
    }

    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        if matches!(cause, StartCause::Init) {
            return;
        }
        let now = Instant::now();
        if let (Some(controller), Some(wakeup)) = (&mut self.controller, self.pending_wakeup) {
            if now >= wakeup.at {
                self.pending_wakeup = None;
                controller.on_wakeup(wakeup, now);
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::ToggleOverlay => self.toggle_overlay(),
            #[cfg(target_os = "windows")]
            UserEvent::Menu(event) => {
                let action = self.tray.as_ref().and_then(|t| t.action_for(&event));
                if let Some(action) = action {
                    self.handle_action(event_loop, action);
                }
            }
            #[cfg(target_os = "windows")]
            UserEvent::Tray(event) => {
                let action = self.tray.as_ref().and_then(|t| t.action_for_icon(&event));
                if let Some(action) = action {
                    self.handle_action(event_loop, action);
                }
            }
        }
        #[cfg(not(target_os = "windows"))]
        let _ = event_loop;
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(controller) = &mut self.controller else {
            return;
        };

        match event {
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } if controller.state().edit_mode => {
                if let Err(e) = controller.surface().window().drag_window() {
                    warn!("Failed to start dragging the overlay: {}", e);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Right,
                ..
            } if controller.state().edit_mode => {
                if controller.begin_resize() {
                    self.resize_anchor = Some(self.cursor);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Right,
                ..
            } => {
                if self.resize_anchor.take().is_some() {
                    controller.end_resize();
                    self.settings.scale_factor = controller.state().scale_factor;
                    self.settings.tile_scale = controller.state().tile_scale;
                    self.save_settings();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                // Window-relative positions shift as the window resizes
                let origin = controller.surface().bounds();
                self.cursor = (origin.x + position.x as i32, origin.y + position.y as i32);
                if let Some((x, y)) = self.resize_anchor {
                    controller.resize_drag(self.cursor.0 - x, self.cursor.1 - y);
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                if controller.state().edit_mode {
                    controller.set_edit_mode(false);
                    self.resize_anchor = None;
                    self.refresh_tray(false);
                }
            }
            WindowEvent::Moved(position) => {
                controller.window_moved(position.x, position.y);
            }
            WindowEvent::CloseRequested => {
                // The overlay only closes from the tray; treat it as a hide
                if controller.is_visible() {
                    controller.toggle_overlay();
                    self.refresh_tray(false);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.pending_wakeup = self.controller.as_ref().and_then(|c| c.next_wakeup());
        match self.pending_wakeup {
            Some(wakeup) => event_loop.set_control_flow(ControlFlow::WaitUntil(wakeup.at)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.hotkey.unregister();
        if self.fatal.is_none() {
            self.save_settings();
        }
        info!("PeekOverlay shutting down");
    }
}

/// Tell the user about something they need to act on
#[cfg(target_os = "windows")]
fn notify(title: &str, message: &str) {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title(title)
        .set_description(message)
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}

#[cfg(not(target_os = "windows"))]
fn notify(title: &str, message: &str) {
    warn!("{}: {}", title, message);
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("PeekOverlay starting...");

    let settings = Settings::load();

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let event_proxy = event_loop.create_proxy();
    let mut app = PeekOverlayApp::new(event_proxy, settings);
    event_loop.run_app(&mut app).context("Event loop error")?;

    if let Some(e) = app.fatal.take() {
        return Err(e);
    }
    if app.controller.is_none() {
        return Err(anyhow!(OverlayError::WindowInit(
            "event loop ended before the overlay was created".into()
        )));
    }

    info!("PeekOverlay exited");
    Ok(())
}
