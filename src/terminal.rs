// SPDX-License-Identifier: GPL-3.0-only

//! Terminal fill light
//!
//! Paints the whole terminal in the fill light color and renders the camera
//! preview in the middle using Unicode half-block characters for improved
//! vertical resolution.

use crate::app::{ColorChannel, FillLightSettings, LightColor, PresetLight};
use crate::backends::camera::{CameraFrame, FrameReceiver};
use crate::constants::{PREVIEW_WIDTH_RATIO, TERMINAL_POLL_INTERVAL};
use crate::errors::CaptureError;
use crate::session::{CaptureSessionController, CapturedPhoto, SessionEvent, SessionState};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::channel::mpsc;
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    style::Style, widgets::Widget,
};
use std::io::{self, stdout};
use tokio::runtime::Runtime;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

/// Something the user asked for with a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    Preset(PresetLight),
    CycleFilter,
    Brighter,
    Dimmer,
    Channel(ColorChannel, bool),
    ToggleMirror,
    ToggleFlash,
    ToggleCamera,
    Capture,
    ToggleHelp,
}

fn key_action(key: &KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char(c @ '1'..='5') => {
            PresetLight::from_index(c as usize - '0' as usize).map(Action::Preset)
        }
        KeyCode::Char('f') => Some(Action::CycleFilter),
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => Some(Action::Brighter),
        KeyCode::Char('-') | KeyCode::Down => Some(Action::Dimmer),
        KeyCode::Char('r') => Some(Action::Channel(ColorChannel::Red, false)),
        KeyCode::Char('R') => Some(Action::Channel(ColorChannel::Red, true)),
        KeyCode::Char('g') => Some(Action::Channel(ColorChannel::Green, false)),
        KeyCode::Char('G') => Some(Action::Channel(ColorChannel::Green, true)),
        KeyCode::Char('b') => Some(Action::Channel(ColorChannel::Blue, false)),
        KeyCode::Char('B') => Some(Action::Channel(ColorChannel::Blue, true)),
        KeyCode::Char('m') => Some(Action::ToggleMirror),
        KeyCode::Char('l') => Some(Action::ToggleFlash),
        KeyCode::Char('c') => Some(Action::ToggleCamera),
        KeyCode::Char(' ') | KeyCode::Char('p') => Some(Action::Capture),
        KeyCode::Char('h') => Some(Action::ToggleHelp),
        _ => None,
    }
}

/// Results of background session calls
enum Notice {
    Started(Result<(), CaptureError>),
    Captured(Result<CapturedPhoto, CaptureError>),
}

/// Run the terminal fill light until the user quits
pub fn run(
    runtime: &Runtime,
    controller: CaptureSessionController,
    settings: FillLightSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    // Captures are spawned onto the ambient runtime
    let _enter = runtime.enter();

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let mut app = TerminalApp::new(runtime, controller, settings);
    let result = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.camera_switch.send_replace(false);
    runtime.block_on(app.controller.stop());
    result
}

/// Keep the session in line with the camera switch
///
/// Start and stop run one after another in the order the switch moved, so
/// the last position wins. Switching off while the camera is still coming
/// up abandons the start and stops straight away.
async fn follow_camera_switch(
    controller: CaptureSessionController,
    mut switch: watch::Receiver<bool>,
    notices: mpsc::UnboundedSender<Notice>,
) {
    loop {
        let on = *switch.borrow_and_update();
        if on {
            tokio::select! {
                biased;
                changed = switch.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                result = controller.start() => {
                    let _ = notices.unbounded_send(Notice::Started(result));
                }
            }
        } else {
            controller.stop().await;
        }

        if switch.changed().await.is_err() {
            break;
        }
    }
}

struct TerminalApp<'rt> {
    runtime: &'rt Runtime,
    controller: CaptureSessionController,
    settings: FillLightSettings,
    events: broadcast::Receiver<SessionEvent>,
    notices: mpsc::UnboundedReceiver<Notice>,
    notice_sender: mpsc::UnboundedSender<Notice>,
    camera_switch: watch::Sender<bool>,
    preview: Option<FrameReceiver>,
    frame: Option<CameraFrame>,
    session_state: SessionState,
    captures_in_flight: usize,
    permission_alert: bool,
    show_help: bool,
    message: Option<String>,
}

impl<'rt> TerminalApp<'rt> {
    fn new(
        runtime: &'rt Runtime,
        controller: CaptureSessionController,
        settings: FillLightSettings,
    ) -> Self {
        let (notice_sender, notices) = mpsc::unbounded();
        let events = controller.subscribe();
        let session_state = controller.state();
        let (camera_switch, switch) = watch::channel(false);
        runtime.spawn(follow_camera_switch(
            controller.clone(),
            switch,
            notice_sender.clone(),
        ));

        Self {
            runtime,
            controller,
            settings,
            events,
            notices,
            notice_sender,
            camera_switch,
            preview: None,
            frame: None,
            session_state,
            captures_in_flight: 0,
            permission_alert: false,
            show_help: false,
            message: None,
        }
    }

    fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if self.settings.camera_active {
            self.start_camera();
        }

        loop {
            self.drain_events();
            self.drain_notices();
            self.drain_preview();

            terminal.draw(|f| self.draw(f.area(), f.buffer_mut()))?;

            // Handle input with timeout for frame updates
            if event::poll(TERMINAL_POLL_INTERVAL)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && let Some(action) = key_action(&key)
                && !self.apply(action)
            {
                break;
            }
        }

        Ok(())
    }

    /// Returns `false` when the app should quit
    fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return false,
            Action::Preset(preset) => self.settings.select_preset(preset),
            Action::CycleFilter => self.settings.cycle_filter(),
            Action::Brighter => self.settings.brighter(),
            Action::Dimmer => self.settings.dimmer(),
            Action::Channel(channel, up) => {
                if !self.settings.step_channel(channel, up) {
                    self.message = Some("Select the custom preset (5) to edit colors".into());
                }
            }
            Action::ToggleMirror => self.settings.toggle_mirror(),
            Action::ToggleFlash => self.settings.toggle_flash(),
            Action::ToggleCamera => {
                if self.settings.toggle_camera() {
                    self.start_camera();
                } else {
                    self.stop_camera();
                }
            }
            Action::Capture => self.capture(),
            Action::ToggleHelp => self.show_help = !self.show_help,
        }
        true
    }

    fn start_camera(&mut self) {
        self.permission_alert = false;
        self.camera_switch.send_replace(true);
    }

    fn stop_camera(&mut self) {
        self.preview = None;
        self.frame = None;
        self.camera_switch.send_replace(false);
    }

    fn capture(&mut self) {
        match self.controller.capture_photo() {
            Ok(pending) => {
                info!(request = %pending.request_id(), "Capture requested");
                self.captures_in_flight += 1;
                let notices = self.notice_sender.clone();
                self.runtime.spawn(async move {
                    let result = pending.await;
                    let _ = notices.unbounded_send(Notice::Captured(result));
                });
            }
            Err(e) => self.message = Some(e.to_string()),
        }
    }

    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.on_event(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session events dropped");
                    self.session_state = self.controller.state();
                }
                Err(_) => break,
            }
        }
    }

    fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StateChanged(state) => {
                self.session_state = state;
                match state {
                    SessionState::Running => self.preview = self.controller.take_preview_receiver(),
                    SessionState::Stopped | SessionState::Idle => {
                        self.preview = None;
                        self.frame = None;
                    }
                    SessionState::Configuring => {}
                }
            }
            SessionEvent::PermissionAlert => self.permission_alert = true,
            SessionEvent::PhotoCaptured(_) => {}
            SessionEvent::PhotoSaved { path, .. } => {
                self.message = Some(format!("Saved: {}", path.display()));
            }
            SessionEvent::PersistFailed { reason, .. } => {
                self.message = Some(format!("Could not save photo: {}", reason));
            }
        }
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            match notice {
                Notice::Started(Ok(())) => {}
                Notice::Started(Err(CaptureError::PermissionDenied)) => {
                    self.settings.camera_active = false;
                }
                Notice::Started(Err(e)) => {
                    error!(error = %e, "Camera failed to start");
                    self.settings.camera_active = false;
                    self.message = Some(e.to_string());
                }
                Notice::Captured(result) => {
                    self.captures_in_flight = self.captures_in_flight.saturating_sub(1);
                    if let Err(e) = result {
                        self.message = Some(e.to_string());
                    }
                }
            }
        }
    }

    fn drain_preview(&mut self) {
        // Drain all available frames to get the latest
        if let Some(preview) = self.preview.as_mut() {
            while let Ok(frame) = preview.try_recv() {
                self.frame = Some(frame);
            }
        }
    }

    /// Panel color, at full strength while a flash capture is in flight
    fn panel_color(&self) -> LightColor {
        if self.settings.flash && self.captures_in_flight > 0 {
            self.settings.background
        } else {
            self.settings.panel_color()
        }
    }

    fn draw(&self, area: Rect, buf: &mut Buffer) {
        LightPanel {
            color: self.panel_color(),
        }
        .render(area, buf);

        // Reserve bottom line for status, top line for alerts
        let preview_width = ((area.width as f32) * PREVIEW_WIDTH_RATIO) as u16;
        let preview_area = Rect {
            x: area.x + area.width.saturating_sub(preview_width) / 2,
            y: area.y + 1,
            width: preview_width,
            height: area.height.saturating_sub(2),
        };

        FrameWidget {
            frame: self.frame.as_ref(),
            settings: &self.settings,
            placeholder: self.placeholder(),
        }
        .render(preview_area, buf);

        if self.permission_alert {
            let alert = "Camera access denied. Allow camera access in your system settings, then press 'c'";
            StatusBar {
                message: alert,
                bg: Color::Red,
            }
            .render(Rect { height: 1, ..area }, buf);
        }

        let status = if self.show_help {
            build_help_message()
        } else {
            self.build_status_message()
        };
        StatusBar {
            message: &status,
            bg: Color::DarkGray,
        }
        .render(
            Rect {
                y: area.y + area.height.saturating_sub(1),
                height: 1,
                ..area
            },
            buf,
        );
    }

    fn placeholder(&self) -> &'static str {
        match self.session_state {
            _ if !self.settings.camera_active => "Camera off",
            SessionState::Configuring => "Starting camera...",
            SessionState::Running => "Waiting for camera...",
            SessionState::Idle | SessionState::Stopped => "Camera off",
        }
    }

    fn build_status_message(&self) -> String {
        let s = &self.settings;
        let mut msg = format!(
            "{} | {} | {:.0}% | filter {}",
            self.session_state,
            s.preset.display_name(),
            s.brightness * 100.0,
            s.filter.display_name()
        );
        if s.mirror {
            msg.push_str(" | mirror");
        }
        if s.flash {
            msg.push_str(" | flash");
        }
        match &self.message {
            Some(message) => {
                msg.push_str(" | ");
                msg.push_str(message);
            }
            None => msg.push_str(" | 'p' picture | 'h' help | 'q' quit"),
        }
        msg
    }
}

fn build_help_message() -> String {
    "1-5: Preset | f: Filter | +/-: Brightness | r/g/b R/G/B: Custom color | \
     m: Mirror | l: Flash | c: Camera | p/Space: Picture | h: Toggle help | q/Ctrl+C: Quit"
        .to_string()
}

fn to_color(color: LightColor) -> Color {
    let (r, g, b) = color.to_rgb8();
    Color::Rgb(r, g, b)
}

/// Fills its area with the fill light color
struct LightPanel {
    color: LightColor,
}

impl Widget for LightPanel {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, Style::default().bg(to_color(self.color)));
    }
}

/// Renders a camera frame using half-block characters
struct FrameWidget<'a> {
    frame: Option<&'a CameraFrame>,
    settings: &'a FillLightSettings,
    placeholder: &'a str,
}

impl FrameWidget<'_> {
    fn sample(&self, frame: &CameraFrame, x: u32, y: u32) -> Color {
        let x = if self.settings.mirror {
            frame.width.saturating_sub(1).saturating_sub(x)
        } else {
            x
        };
        let (r, g, b) = self.settings.filter.apply(frame.rgb_at(x, y));
        Color::Rgb(r, g, b)
    }
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.filter(|f| f.width > 0 && f.height > 0) else {
            // No frame yet - show placeholder
            let msg = self.placeholder;
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default().fg(Color::Black));
            }
            return;
        };

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let w = term_height * frame_aspect;
            (w as u16, area.height)
        } else {
            // Terminal is taller - fit to width
            let h = term_width / frame_aspect;
            (area.width, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = self.sample(frame, src_x, src_y_top);
                let bottom_color = self.sample(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
    bg: Color,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(Color::White).bg(self.bg);
        buf.set_style(area, style);

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(area.x, area.y, text, style);
    }
}
