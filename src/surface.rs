use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub const DEFAULT_FONT: &str = "12px monospace";
pub const DEFAULT_LINE_WIDTH: f32 = 1.0;

/// The drawable target supplied by the host. The runtime only forwards draw
/// calls; color strings and sprite names are interpreted by the host.
pub trait Surface {
    fn size(&self) -> (f32, f32);
    fn resize(&mut self, width: f32, height: f32);
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: &str);
    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: &str);
    fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: &str, width: f32);
    fn draw_text(&mut self, text: &str, x: f32, y: f32, color: &str, font: &str);
    fn draw_sprite(&mut self, name: &str, x: f32, y: f32, width: f32, height: f32);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear,
    Rect { x: f32, y: f32, width: f32, height: f32, color: String },
    Circle { x: f32, y: f32, radius: f32, color: String },
    Line { x1: f32, y1: f32, x2: f32, y2: f32, color: String, width: f32 },
    Text { text: String, x: f32, y: f32, color: String, font: String },
    Sprite { name: String, x: f32, y: f32, width: f32, height: f32 },
}

/// Discards everything. Stand-in when the host has no visual target.
pub struct NullSurface {
    width: f32,
    height: f32,
}

impl NullSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Surface for NullSurface {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn clear(&mut self) {}
    fn fill_rect(&mut self, _x: f32, _y: f32, _width: f32, _height: f32, _color: &str) {}
    fn fill_circle(&mut self, _x: f32, _y: f32, _radius: f32, _color: &str) {}
    fn stroke_line(&mut self, _x1: f32, _y1: f32, _x2: f32, _y2: f32, _color: &str, _width: f32) {}
    fn draw_text(&mut self, _text: &str, _x: f32, _y: f32, _color: &str, _font: &str) {}
    fn draw_sprite(&mut self, _name: &str, _x: f32, _y: f32, _width: f32, _height: f32) {}
}

struct RecordingInner {
    width: f32,
    height: f32,
    commands: Vec<DrawCommand>,
}

/// Records every draw call in order. Clones share the same command buffer,
/// so a test or the harness can keep a handle while the runtime owns the
/// boxed surface.
#[derive(Clone)]
pub struct RecordingSurface {
    inner: Rc<RefCell<RecordingInner>>,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self { inner: Rc::new(RefCell::new(RecordingInner { width, height, commands: Vec::new() })) }
    }

    pub fn commands(&self) -> Vec<DrawCommand> {
        self.inner.borrow().commands.clone()
    }

    pub fn take_commands(&self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.inner.borrow_mut().commands)
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (f32, f32) {
        let inner = self.inner.borrow();
        (inner.width, inner.height)
    }

    fn resize(&mut self, width: f32, height: f32) {
        let mut inner = self.inner.borrow_mut();
        inner.width = width;
        inner.height = height;
    }

    fn clear(&mut self) {
        self.inner.borrow_mut().commands.push(DrawCommand::Clear);
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: &str) {
        self.inner
            .borrow_mut()
            .commands
            .push(DrawCommand::Rect { x, y, width, height, color: color.to_string() });
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: &str) {
        self.inner.borrow_mut().commands.push(DrawCommand::Circle {
            x,
            y,
            radius,
            color: color.to_string(),
        });
    }

    fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: &str, width: f32) {
        self.inner.borrow_mut().commands.push(DrawCommand::Line {
            x1,
            y1,
            x2,
            y2,
            color: color.to_string(),
            width,
        });
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, color: &str, font: &str) {
        self.inner.borrow_mut().commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
            color: color.to_string(),
            font: font.to_string(),
        });
    }

    fn draw_sprite(&mut self, name: &str, x: f32, y: f32, width: f32, height: f32) {
        self.inner.borrow_mut().commands.push(DrawCommand::Sprite {
            name: name.to_string(),
            x,
            y,
            width,
            height,
        });
    }
}
