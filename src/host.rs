//! Interfaces the pipeline consumes from its host: the drawable region the
//! surface is sized from, the user-notification channel, the file-selection
//! widget and the download target.

use crate::asset::SourceFile;
use crate::error::Result;
use crate::package::Download;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// The host region the render surface is bound to.
pub trait Drawable {
    fn client_width(&self) -> u32;
    fn client_height(&self) -> u32;
    fn device_pixel_ratio(&self) -> f32 {
        1.0
    }
}

/// A drawable with no window behind it. Clones share one size, so a test or
/// embedding can resize it after handing it to a session.
#[derive(Debug, Clone)]
pub struct HeadlessDrawable {
    size: Rc<Cell<(u32, u32)>>,
    pixel_ratio: f32,
}

impl HeadlessDrawable {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Rc::new(Cell::new((width, height))),
            pixel_ratio: 1.0,
        }
    }

    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }
}

impl Drawable for HeadlessDrawable {
    fn client_width(&self) -> u32 {
        self.size.get().0
    }

    fn client_height(&self) -> u32 {
        self.size.get().1
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }
}

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// User-facing notification channel (toasts in a UI host).
pub trait Notifier {
    fn notify(&self, severity: Severity, message: &str);
}

/// Forwards notifications to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Success => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
    }
}

/// Keeps every notification. Clones share the record.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    messages: Rc<RefCell<Vec<(Severity, String)>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.borrow().clone()
    }

    pub fn last(&self) -> Option<(Severity, String)> {
        self.messages.borrow().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        self.messages.borrow_mut().push((severity, message.to_string()));
    }
}

/// One entry of the host's file selection.
#[derive(Debug, Clone)]
pub struct SelectionItem {
    /// Identifier assigned by the widget, when it assigns one.
    pub uid: Option<String>,
    pub name: String,
    pub file: SourceFile,
}

impl SelectionItem {
    pub fn new(file: SourceFile) -> Self {
        Self {
            uid: None,
            name: file.name().to_string(),
            file,
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Stable identity: the widget uid, falling back to the file name.
    pub fn key(&self) -> &str {
        self.uid.as_deref().unwrap_or(&self.name)
    }
}

/// The host's multi-file selection widget.
pub trait SelectionWidget {
    /// Current selection, in display order.
    fn selection(&self) -> Vec<SelectionItem>;
    /// Reset the widget's own visual state.
    fn clear_files(&mut self);
}

/// A selection held in memory.
#[derive(Debug, Default, Clone)]
pub struct StaticSelection {
    items: Vec<SelectionItem>,
}

impl StaticSelection {
    pub fn new(items: Vec<SelectionItem>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, item: SelectionItem) {
        self.items.push(item);
    }

    /// Drop every entry with the given key.
    pub fn remove(&mut self, key: &str) {
        self.items.retain(|item| item.key() != key);
    }
}

impl SelectionWidget for StaticSelection {
    fn selection(&self) -> Vec<SelectionItem> {
        self.items.clone()
    }

    fn clear_files(&mut self) {
        self.items.clear();
    }
}

/// Where finished downloads go.
pub trait DownloadSink {
    fn deliver(&mut self, download: Download) -> Result<()>;
}
