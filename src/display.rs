// SPDX-License-Identifier: GPL-3.0-only

//! Display surfaces: live camera preview and decoded-text label
//!
//! Writers (the capture pipeline and the frame analyzer) run on background
//! threads. They only hold a [`DisplayHandle`]; every text change travels over
//! a channel to the thread that owns [`DisplayState`] and draws the screen.

use crate::backends::camera::Frame;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Latest preview frame, replaced on every publish
#[derive(Clone)]
pub struct PreviewSurface {
    tx: Arc<watch::Sender<Option<Arc<Frame>>>>,
}

impl PreviewSurface {
    fn new() -> (Self, watch::Receiver<Option<Arc<Frame>>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Show a frame, dropping the previous one
    pub fn present(&self, frame: Frame) {
        let _previous = self.tx.send_replace(Some(Arc::new(frame)));
    }

    /// Blank the preview (used when streams are unbound)
    pub fn clear(&self) {
        let _previous = self.tx.send_replace(None);
    }
}

/// Sink for everything the pipeline shows on screen
pub trait DisplaySink: Send + Sync {
    /// Surface the preview stream renders into
    fn preview_surface(&self) -> PreviewSurface;

    /// Replace the label text; `None` clears it
    ///
    /// Safe to call from any thread.
    fn set_text(&self, text: Option<String>);
}

/// Message marshalled to the UI-owning thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayUpdate {
    Text(Option<String>),
}

/// Cloneable writer side of the display
#[derive(Clone)]
pub struct DisplayHandle {
    updates: mpsc::UnboundedSender<DisplayUpdate>,
    preview: PreviewSurface,
}

impl DisplaySink for DisplayHandle {
    fn preview_surface(&self) -> PreviewSurface {
        self.preview.clone()
    }

    fn set_text(&self, text: Option<String>) {
        if self.updates.send(DisplayUpdate::Text(text)).is_err() {
            debug!("Display closed, dropping text update");
        }
    }
}

/// Reader side of the display, owned by the UI thread
pub struct DisplayState {
    text: Option<String>,
    updates: mpsc::UnboundedReceiver<DisplayUpdate>,
    preview: watch::Receiver<Option<Arc<Frame>>>,
}

/// Create a connected display handle and state
pub fn display_channel() -> (DisplayHandle, DisplayState) {
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (preview, preview_rx) = PreviewSurface::new();
    (
        DisplayHandle {
            updates: updates_tx,
            preview,
        },
        DisplayState {
            text: None,
            updates: updates_rx,
            preview: preview_rx,
        },
    )
}

impl DisplayState {
    fn apply(&mut self, update: DisplayUpdate) {
        match update {
            DisplayUpdate::Text(text) => {
                self.text = text.filter(|t| !t.is_empty());
            }
        }
    }

    /// Apply every queued update without waiting; returns how many were applied
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates.try_recv() {
            self.apply(update);
            applied += 1;
        }
        applied
    }

    /// Wait for one update and apply it; `false` once all handles are gone
    pub async fn next_update(&mut self) -> bool {
        match self.updates.recv().await {
            Some(update) => {
                self.apply(update);
                true
            }
            None => false,
        }
    }

    /// Current label text, if any
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Most recent preview frame
    pub fn preview_frame(&mut self) -> Option<Arc<Frame>> {
        self.preview.borrow_and_update().clone()
    }
}
