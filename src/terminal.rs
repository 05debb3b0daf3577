// SPDX-License-Identifier: GPL-3.0-only

//! Terminal QR reader
//!
//! Renders the camera preview to the terminal using Unicode half-block
//! characters and shows decoded QR text in a label below it. The terminal is
//! the screen: its cell grid (two pixels per cell vertically) provides the
//! metrics the capture aspect ratio is derived from.

use crate::backends::camera::{Frame, GstCaptureProvider, PixelFormat, Rotation};
use crate::config::Config;
use crate::constants::timing;
use crate::display::{DisplaySink, display_channel};
use crate::errors::{AppError, BindError};
use crate::frame_processor::{AnalysisWorker, FrameAnalyzer, QrDetector};
use crate::permission::{self, PermissionOutcome};
use crate::session::{AspectRatio, CameraHandle, CameraSessionManager};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    style::Style, widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::Arc;
use tracing::{info, warn};

/// Most label lines shown under the preview
const MAX_LABEL_LINES: u16 = 4;

/// What to scan with
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub config: Config,
    /// Display rotation the streams are bound with
    pub rotation: Rotation,
}

/// Run the terminal QR reader
pub fn run(options: ScanOptions) -> Result<(), Box<dyn std::error::Error>> {
    gstreamer::init()?;

    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let gate = permission::gate_for(options.config.permission);
    if runtime.block_on(permission::ensure_permission(gate.as_ref())) == PermissionOutcome::Denied
    {
        return Err(AppError::PermissionDenied.into());
    }

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &runtime, &options);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    runtime: &tokio::runtime::Runtime,
    options: &ScanOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let (display, mut state) = display_channel();
    let display: Arc<dyn DisplaySink> = Arc::new(display);

    let provider = GstCaptureProvider::new(options.config.device.clone());
    let mut session =
        CameraSessionManager::new(provider, options.config.lens_facing, display.clone());

    let decoder = Arc::new(QrDetector::with_max_dimension(
        options.config.max_decode_dimension,
    ));
    let analyzer = Arc::new(FrameAnalyzer::new(decoder, display));
    let worker = AnalysisWorker::spawn(session.analysis_slot(), analyzer);

    let size = terminal.size()?;
    let mut screen = screen_metrics(size.width, size.height);
    let mut status = bind_status(session.start(screen.0, screen.1, options.rotation));

    let mut frame_widget = FrameWidget::default();

    loop {
        // Marshalled display updates are applied here, on the UI thread
        state.apply_pending();
        frame_widget.frame = state.preview_frame();

        let label_lines = label_lines(state.text(), &status);

        terminal.draw(|f| {
            let area = f.area();
            let label_height = (label_lines.len() as u16).min(area.height);

            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(label_height),
            };
            f.render_widget(&frame_widget, camera_area);

            let label_area = Rect {
                x: area.x,
                y: area.y + camera_area.height,
                width: area.width,
                height: label_height,
            };
            f.render_widget(
                Label {
                    lines: &label_lines,
                    decoded: state.text().is_some(),
                },
                label_area,
            );
        })?;

        if !event::poll(timing::UI_POLL_INTERVAL)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                let ctrl_c =
                    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
                if ctrl_c || key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                    break;
                }
            }
            Event::Resize(width, height) => {
                let resized = screen_metrics(width, height);
                let changed = AspectRatio::nearest(resized.0, resized.1)
                    != AspectRatio::nearest(screen.0, screen.1);
                screen = resized;
                // Only a new aspect ratio needs a new capture configuration
                if changed {
                    info!(width, height, "Terminal aspect changed, rebinding camera");
                    status = bind_status(session.start(screen.0, screen.1, options.rotation));
                }
            }
            _ => {}
        }
    }

    runtime.block_on(worker.shutdown());
    session.stop();
    Ok(())
}

/// Screen metrics in preview pixels (each cell is two pixels tall)
fn screen_metrics(columns: u16, rows: u16) -> (u32, u32) {
    let rows = rows.saturating_sub(1);
    (columns as u32, rows as u32 * 2)
}

fn bind_status(result: Result<CameraHandle, BindError>) -> String {
    match result {
        Ok(handle) => format!(
            "Scanning with {} ({}) | 'q' quit",
            handle.device_name, handle.config.aspect_ratio
        ),
        Err(e) => {
            // Stays in the pre-bind state until the next resize or restart
            warn!(error = %e, "Camera not bound");
            format!("Camera unavailable: {} | 'q' quit", e)
        }
    }
}

/// Decoded text when present, the status line otherwise
fn label_lines(text: Option<&str>, status: &str) -> Vec<String> {
    match text {
        Some(text) => text
            .lines()
            .take(MAX_LABEL_LINES as usize)
            .map(str::to_string)
            .collect(),
        None => vec![status.to_string()],
    }
}

/// Camera preview drawn with half blocks
///
/// Each cell shows two stacked pixels: `▀` in the upper pixel's color over a
/// background of the lower one. Frames are drawn upright by reading them
/// through their `rotation_degrees`.
#[derive(Default)]
struct FrameWidget {
    frame: Option<Arc<Frame>>,
}

/// Cell region covered by the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Viewport {
    x: u16,
    y: u16,
    columns: u16,
    rows: u16,
}

impl Viewport {
    /// Largest centered region of `area` with the image's aspect ratio
    fn fit(area: Rect, image_width: u32, image_height: u32) -> Option<Self> {
        if image_width == 0 || image_height == 0 || area.width == 0 || area.height == 0 {
            return None;
        }

        let (iw, ih) = (image_width as u64, image_height as u64);
        let avail_w = area.width as u64;
        let avail_h = area.height as u64 * 2;
        let (w, h) = if avail_w * ih <= avail_h * iw {
            (avail_w, avail_w * ih / iw)
        } else {
            (avail_h * iw / ih, avail_h)
        };

        let columns = w as u16;
        let rows = (h / 2) as u16;
        if columns == 0 || rows == 0 {
            return None;
        }
        Some(Self {
            x: area.x + (area.width - columns) / 2,
            y: area.y + (area.height - rows) / 2,
            columns,
            rows,
        })
    }
}

/// Size of the frame once turned upright
fn upright_size(frame: &Frame, rotation: Rotation) -> (u32, u32) {
    if rotation.swaps_dimensions() {
        (frame.height, frame.width)
    } else {
        (frame.width, frame.height)
    }
}

/// Map a pixel of the upright image back to the stored frame
///
/// Same clockwise convention as the decoder's `imageops::rotate*` calls.
fn source_pixel(frame: &Frame, rotation: Rotation, x: u32, y: u32) -> (u32, u32) {
    let (w, h) = (frame.width, frame.height);
    match rotation {
        Rotation::Rotate0 => (x, y),
        Rotation::Rotate90 => (y, h - 1 - x),
        Rotation::Rotate180 => (w - 1 - x, h - 1 - y),
        Rotation::Rotate270 => (w - 1 - y, x),
    }
}

fn pixel_color(frame: &Frame, x: u32, y: u32) -> Color {
    let data = frame.data_slice();
    let offset = (y as usize) * frame.stride as usize;
    match frame.format {
        PixelFormat::Rgba => match data.get(offset + x as usize * 4..offset + x as usize * 4 + 3) {
            Some(&[r, g, b]) => Color::Rgb(r, g, b),
            _ => Color::Black,
        },
        PixelFormat::Gray8 => match data.get(offset + x as usize) {
            Some(&v) => Color::Rgb(v, v, v),
            None => Color::Black,
        },
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = &self.frame else {
            let msg = "Waiting for camera...";
            let x = area.x + area.width.saturating_sub(msg.len() as u16) / 2;
            let y = area.y + area.height / 2;
            if area.height > 0 && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        // Preview frames come from a validated Rotation; anything else draws as stored
        let rotation = Rotation::from_degrees(frame.rotation_degrees).unwrap_or_default();
        let (width, height) = upright_size(frame, rotation);
        let Some(view) = Viewport::fit(area, width, height) else {
            return;
        };

        let pixel_rows = view.rows as u64 * 2;
        for row in 0..view.rows {
            for column in 0..view.columns {
                let ux = (column as u64 * width as u64 / view.columns as u64) as u32;
                let top = (row as u64 * 2 * height as u64 / pixel_rows) as u32;
                let bottom = ((row as u64 * 2 + 1) * height as u64 / pixel_rows) as u32;

                let (tx, ty) = source_pixel(frame, rotation, ux, top);
                let (bx, by) = source_pixel(frame, rotation, ux, bottom);

                if let Some(cell) = buf.cell_mut((view.x + column, view.y + row)) {
                    cell.set_char('▀');
                    cell.set_fg(pixel_color(frame, tx, ty));
                    cell.set_bg(pixel_color(frame, bx, by));
                }
            }
        }
    }
}

/// Decoded-text label
struct Label<'a> {
    lines: &'a [String],
    decoded: bool,
}

impl Widget for Label<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = if self.decoded {
            Style::default().fg(Color::Black).bg(Color::LightGreen)
        } else {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        };

        for (row, line) in self.lines.iter().enumerate().take(area.height as usize) {
            let y = area.y + row as u16;
            for x in area.x..area.x + area.width {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_char(' ');
                    cell.set_style(style);
                }
            }
            // set_stringn truncates by display width, safe for multi-byte text
            buf.set_stringn(area.x, y, line, area.width as usize, style);
        }
    }
}
