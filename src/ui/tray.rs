// ui/tray.rs - System Tray Icon Implementation
//
// The tray is the only visible UI besides the overlay itself. Menu and icon
// events are forwarded to the event loop through the proxy; the app turns
// them into TrayActions with action_for() and calls back into update() and
// set_gallery() to keep labels and checks in sync.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};
use tray_icon::{
    menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu},
    MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent,
};
use winit::event_loop::EventLoopProxy;

use peekoverlay::app::OverlayState;
use peekoverlay::constants::APP_NAME;
use peekoverlay::gallery::GalleryEntry;
use peekoverlay::layout::ScalingMode;

use crate::UserEvent;

const OPACITY_PRESETS: [u8; 4] = [100, 75, 50, 25];

/// What a tray interaction asks the app to do
#[derive(Debug, Clone, PartialEq)]
pub enum TrayAction {
    ToggleOverlay,
    SelectImage(PathBuf),
    ImportImage,
    RemoveImage,
    Opacity(f32),
    Scaling(ScalingMode),
    ScaleUp,
    ScaleDown,
    ResetPosition,
    EditMode(bool),
    NextDisplay,
    Exit,
}

/// System tray icon manager
pub struct SystemTray {
    tray_icon: TrayIcon,
    overlay_toggle: MenuItem,
    gallery_menu: Submenu,
    gallery_items: Vec<CheckMenuItem>,
    gallery_paths: HashMap<MenuId, PathBuf>,
    gallery_empty: MenuItem,
    import: MenuItem,
    remove: MenuItem,
    opacity_items: Vec<(CheckMenuItem, u8)>,
    scaling_items: Vec<(CheckMenuItem, ScalingMode)>,
    scale_up: MenuItem,
    scale_down: MenuItem,
    reset_position: MenuItem,
    edit_mode: CheckMenuItem,
    next_display: MenuItem,
    exit: MenuItem,
}

impl SystemTray {
    /// Build the tray icon and menu and route its events to `event_proxy`
    pub fn new(event_proxy: EventLoopProxy<UserEvent>) -> Result<Self> {
        info!("Initializing system tray icon");

        let overlay_toggle = MenuItem::new("Show Overlay", true, None);

        let gallery_menu = Submenu::new("Gallery", true);
        let gallery_empty = MenuItem::new("(empty)", false, None);
        gallery_menu.append(&gallery_empty)?;
        let import = MenuItem::new("Import Image...", true, None);
        let remove = MenuItem::new("Remove Current From Gallery", false, None);

        let opacity_menu = Submenu::new("Opacity", true);
        let opacity_items: Vec<_> = OPACITY_PRESETS
            .iter()
            .map(|&p| (CheckMenuItem::new(format!("{p}%"), true, p == 100, None), p))
            .collect();
        for (item, _) in &opacity_items {
            opacity_menu.append(item)?;
        }

        let scaling_menu = Submenu::new("Scaling", true);
        let scaling_items: Vec<_> = ScalingMode::all()
            .iter()
            .map(|&m| (CheckMenuItem::new(m.label(), true, m == ScalingMode::Fit, None), m))
            .collect();
        for (item, _) in &scaling_items {
            scaling_menu.append(item)?;
        }
        let scale_up = MenuItem::new("Scale Up", true, None);
        let scale_down = MenuItem::new("Scale Down", true, None);
        scaling_menu.append_items(&[&PredefinedMenuItem::separator(), &scale_up, &scale_down])?;

        let reset_position = MenuItem::new("Reset Position", true, None);
        let edit_mode = CheckMenuItem::new("Edit Mode (drag overlay)", true, false, None);
        let next_display = MenuItem::new("Next Display", true, None);
        let exit = MenuItem::new("Exit", true, None);

        let menu = Menu::new();
        menu.append_items(&[
            &overlay_toggle,
            &PredefinedMenuItem::separator(),
            &gallery_menu,
            &import,
            &remove,
            &PredefinedMenuItem::separator(),
            &opacity_menu,
            &scaling_menu,
            &reset_position,
            &edit_mode,
            &next_display,
            &PredefinedMenuItem::separator(),
            &exit,
        ])?;

        let tray_icon = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_menu_on_left_click(false)
            .with_tooltip(APP_NAME)
            .with_icon(create_tray_icon()?)
            .build()
            .context("Failed to create tray icon")?;

        let menu_proxy = event_proxy.clone();
        MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
            if let Err(e) = menu_proxy.send_event(UserEvent::Menu(event)) {
                error!("Failed to send tray event: {}", e);
            }
        }));
        TrayIconEvent::set_event_handler(Some(move |event: TrayIconEvent| {
            if let Err(e) = event_proxy.send_event(UserEvent::Tray(event)) {
                error!("Failed to send tray event: {}", e);
            }
        }));

        info!("System tray icon initialized successfully");
        Ok(Self {
            tray_icon,
            overlay_toggle,
            gallery_menu,
            gallery_items: Vec::new(),
            gallery_paths: HashMap::new(),
            gallery_empty,
            import,
            remove,
            opacity_items,
            scaling_items,
            scale_up,
            scale_down,
            reset_position,
            edit_mode,
            next_display,
            exit,
        })
    }

    /// Translate a menu click into an action
    pub fn action_for(&self, event: &MenuEvent) -> Option<TrayAction> {
        let id = event.id();

        if let Some(path) = self.gallery_paths.get(id) {
            return Some(TrayAction::SelectImage(path.clone()));
        }
        if let Some((_, p)) = self.opacity_items.iter().find(|(item, _)| item.id() == id) {
            return Some(TrayAction::Opacity(f32::from(*p) / 100.0));
        }
        if let Some((_, m)) = self.scaling_items.iter().find(|(item, _)| item.id() == id) {
            return Some(TrayAction::Scaling(*m));
        }

        let action = if id == self.overlay_toggle.id() {
            TrayAction::ToggleOverlay
        } else if id == self.import.id() {
            TrayAction::ImportImage
        } else if id == self.remove.id() {
            TrayAction::RemoveImage
        } else if id == self.scale_up.id() {
            TrayAction::ScaleUp
        } else if id == self.scale_down.id() {
            TrayAction::ScaleDown
        } else if id == self.reset_position.id() {
            TrayAction::ResetPosition
        } else if id == self.edit_mode.id() {
            // The check state has already flipped by the time we see the click
            TrayAction::EditMode(self.edit_mode.is_checked())
        } else if id == self.next_display.id() {
            TrayAction::NextDisplay
        } else if id == self.exit.id() {
            TrayAction::Exit
        } else {
            return None;
        };
        Some(action)
    }

    /// Left click on the icon toggles the overlay
    pub fn action_for_icon(&self, event: &TrayIconEvent) -> Option<TrayAction> {
        match event {
            TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } => Some(TrayAction::ToggleOverlay),
            _ => None,
        }
    }

    /// Rebuild the gallery submenu
    pub fn set_gallery(&mut self, entries: &[GalleryEntry], active: Option<&Path>) -> Result<()> {
        for item in self.gallery_items.drain(..) {
            self.gallery_menu.remove(&item)?;
        }
        self.gallery_paths.clear();

        if entries.is_empty() {
            if self.gallery_menu.items().is_empty() {
                self.gallery_menu.append(&self.gallery_empty)?;
            }
            return Ok(());
        }
        if !self.gallery_menu.items().is_empty() {
            self.gallery_menu.remove(&self.gallery_empty)?;
        }

        for entry in entries {
            let checked = active == Some(entry.path.as_path());
            let item = CheckMenuItem::new(entry.display_name(), true, checked, None);
            self.gallery_menu.append(&item)?;
            self.gallery_paths.insert(item.id().clone(), entry.path.clone());
            self.gallery_items.push(item);
        }
        Ok(())
    }

    /// Sync labels, checks and the tooltip with the overlay state
    pub fn update(&self, state: &OverlayState, in_gallery: bool) {
        self.overlay_toggle.set_text(if state.visible {
            "Hide Overlay"
        } else {
            "Show Overlay"
        });
        self.remove.set_enabled(in_gallery);
        self.edit_mode.set_checked(state.edit_mode);

        let percent = (state.opacity * 100.0).round() as u8;
        for (item, p) in &self.opacity_items {
            item.set_checked(*p == percent);
        }
        for (item, m) in &self.scaling_items {
            item.set_checked(*m == state.scaling_mode);
        }

        let active = state.active_image.as_ref().map(|i| i.source_path());
        for item in &self.gallery_items {
            let checked = self.gallery_paths.get(item.id()).map(PathBuf::as_path) == active;
            item.set_checked(checked);
        }

        let mut tooltip = format!("{} - {}", APP_NAME, state.status_line());
        if let Some(e) = &state.last_error {
            tooltip.push('\n');
            tooltip.push_str(e);
        }
        // Windows truncates tooltips at 127 characters
        let tooltip: String = tooltip.chars().take(127).collect();
        if let Err(e) = self.tray_icon.set_tooltip(Some(tooltip)) {
            error!("Failed to update tray tooltip: {}", e);
        }
    }
}

/// Draw the 16x16 icon: a ring with a translucent center
fn create_tray_icon() -> Result<tray_icon::Icon> {
    let size = 16u32;
    let mut icon_data = vec![0u8; (size * size * 4) as usize];
    let center = (size as f32 - 1.0) / 2.0;

    for y in 0..size {
        for x in 0..size {
            let offset = ((y * size + x) * 4) as usize;
            let d = ((x as f32 - center).powi(2) + (y as f32 - center).powi(2)).sqrt();
            let pixel = if (5.5..=7.5).contains(&d) {
                [90, 170, 255, 255]
            } else if d < 5.5 {
                [90, 170, 255, 90]
            } else {
                [0, 0, 0, 0]
            };
            icon_data[offset..offset + 4].copy_from_slice(&pixel);
        }
    }

    Ok(tray_icon::Icon::from_rgba(icon_data, size, size)?)
}
