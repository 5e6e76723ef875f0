use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rhai::{Dynamic, Map};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OBJECT_SIZE: f32 = 32.0;

/// Identity of a live object. Ids are assigned from a monotonic counter and
/// never reused for the lifetime of the runtime, including across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct GameObject {
    id: ObjectId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
    pub visible: bool,
    /// Open-ended bag of script-defined fields.
    pub fields: Map,
}

impl GameObject {
    fn new(id: ObjectId) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            width: DEFAULT_OBJECT_SIZE,
            height: DEFAULT_OBJECT_SIZE,
            rotation: 0.0,
            visible: true,
            fields: Map::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Applies a creation spec: known attributes are extracted, everything
    /// else lands in the custom-field bag. Sizes are clamped non-negative.
    pub fn apply_spec(&mut self, spec: &Map) {
        for (key, value) in spec {
            match key.as_str() {
                "x" => {
                    if let Some(v) = coerce_f32(value) {
                        self.x = v;
                    }
                }
                "y" => {
                    if let Some(v) = coerce_f32(value) {
                        self.y = v;
                    }
                }
                "width" => {
                    if let Some(v) = coerce_f32(value) {
                        self.width = v.max(0.0);
                    }
                }
                "height" => {
                    if let Some(v) = coerce_f32(value) {
                        self.height = v.max(0.0);
                    }
                }
                "rotation" => {
                    if let Some(v) = coerce_f32(value) {
                        self.rotation = v;
                    }
                }
                "visible" => {
                    if let Ok(v) = value.as_bool() {
                        self.visible = v;
                    }
                }
                _ => {
                    self.fields.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn snapshot(&self) -> ObjectSnapshot {
        ObjectSnapshot {
            id: self.id.0,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            rotation: self.rotation,
            visible: self.visible,
            fields: fields_to_json(&self.fields),
        }
    }
}

/// Shared handle given to scripts; the registry keeps the canonical list.
pub type ObjectHandle = Rc<RefCell<GameObject>>;

/// Read-only view of an object for host snapshots and harness output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub fields: serde_json::Value,
}

pub struct ObjectRegistry {
    objects: Vec<ObjectHandle>,
    next_id: u64,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self { objects: Vec::new(), next_id: 1 }
    }

    pub fn create(&mut self, spec: Map) -> ObjectHandle {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let mut object = GameObject::new(id);
        object.apply_spec(&spec);
        let handle = Rc::new(RefCell::new(object));
        self.objects.push(handle.clone());
        handle
    }

    /// Removes the object. Double-destroy is a common script bug, so an
    /// absent id is a no-op rather than an error.
    pub fn destroy(&mut self, id: ObjectId) -> bool {
        let before = self.objects.len();
        self.objects.retain(|object| object.borrow().id() != id);
        self.objects.len() != before
    }

    pub fn get(&self, id: ObjectId) -> Option<ObjectHandle> {
        self.objects.iter().find(|object| object.borrow().id() == id).cloned()
    }

    /// Snapshot of the collection in draw order; mutating the registry does
    /// not invalidate a sequence already handed out.
    pub fn all(&self) -> Vec<ObjectHandle> {
        self.objects.clone()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn snapshots(&self) -> Vec<ObjectSnapshot> {
        self.objects.iter().map(|object| object.borrow().snapshot()).collect()
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn coerce_f32(value: &Dynamic) -> Option<f32> {
    if let Ok(float) = value.as_float() {
        Some(float as f32)
    } else if let Ok(int) = value.as_int() {
        Some(int as f32)
    } else {
        None
    }
}

fn fields_to_json(fields: &Map) -> serde_json::Value {
    if fields.is_empty() {
        return serde_json::Value::Null;
    }
    rhai::serde::from_dynamic(&Dynamic::from(fields.clone())).unwrap_or(serde_json::Value::Null)
}
