use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhai::{
    Array, Dynamic, Engine, EvalAltResult, FnPtr, FuncArgs, FuncRegistration, ImmutableString, Map,
    Module, Scope, AST,
};

use crate::channel::FaultChannel;
use crate::keys;
use crate::objects::{coerce_f32, ObjectHandle, ObjectId};
use crate::runtime::RuntimeContext;
use crate::surface::{DEFAULT_FONT, DEFAULT_LINE_WIDTH};

/// The four lifecycle slots. At most one of each; last registration wins.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub create: Option<FnPtr>,
    pub step: Option<FnPtr>,
    pub draw: Option<FnPtr>,
    pub destroy: Option<FnPtr>,
}

impl LifecycleHooks {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A script that survived the load pass: the compiled AST plus the committed
/// lifecycle registrations. Hooks are function pointers into the AST's
/// symbol table, so calling them needs no ambient state.
pub struct Program {
    pub ast: AST,
    pub hooks: LifecycleHooks,
}

/// Receiver for the `console.log` / `console.warn` / `console.error` shim.
#[derive(Debug, Clone, Copy)]
pub struct Console;

enum ScriptRng {
    Thread,
    Seeded(StdRng),
}

impl ScriptRng {
    fn float(&mut self, min: f64, max: f64) -> f64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if lo >= hi {
            return lo;
        }
        match self {
            ScriptRng::Thread => rand::thread_rng().gen_range(lo..hi),
            ScriptRng::Seeded(rng) => rng.gen_range(lo..hi),
        }
    }

    fn int(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        match self {
            ScriptRng::Thread => rand::thread_rng().gen_range(lo..=hi),
            ScriptRng::Seeded(rng) => rng.gen_range(lo..=hi),
        }
    }
}

/// The sandbox boundary: a `rhai` engine whose only callable surface is the
/// primitive table registered here. Scripts have no reachable path to host
/// globals, the filesystem, or the network; `eval` is disabled outright.
pub struct ScriptHost {
    engine: Engine,
    staged: Rc<RefCell<LifecycleHooks>>,
    rng: Rc<RefCell<ScriptRng>>,
}

impl ScriptHost {
    pub fn new(ctx: Rc<RefCell<RuntimeContext>>, channel: Rc<RefCell<FaultChannel>>) -> Self {
        let staged = Rc::new(RefCell::new(LifecycleHooks::default()));
        let rng = Rc::new(RefCell::new(ScriptRng::Thread));

        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        engine.disable_symbol("eval");
        engine.set_max_expr_depths(64, 64);

        register_constants(&mut engine);
        register_lifecycle(&mut engine, &staged);
        register_object_type(&mut engine);
        register_object_api(&mut engine, &ctx);
        register_drawing(&mut engine, &ctx);
        register_input(&mut engine, &ctx);
        register_utility(&mut engine, &rng);
        register_diagnostics(&mut engine, &channel);

        Self { engine, staged, rng }
    }

    /// Swaps the script RNG for a seeded one so harness runs reproduce.
    pub fn enable_deterministic_mode(&mut self, seed: u64) {
        *self.rng.borrow_mut() = ScriptRng::Seeded(StdRng::seed_from_u64(seed));
    }

    /// Compiles and runs the script's top-level pass. Lifecycle
    /// registrations are staged during the pass and committed only on
    /// success, so a failed load never exposes a partial registry. Top-level
    /// side effects (object creation, logging) are real and retained.
    pub fn load(&mut self, source: &str) -> Result<Program> {
        self.staged.borrow_mut().clear();
        let ast = self.engine.compile(source).context("compiling script")?;
        let mut scope = Scope::new();
        if let Err(err) = self.engine.run_ast_with_scope(&mut scope, &ast) {
            self.staged.borrow_mut().clear();
            bail!("script load failed: {err}");
        }
        let hooks = std::mem::take(&mut *self.staged.borrow_mut());
        Ok(Program { ast, hooks })
    }

    pub fn call_hook(
        &self,
        program: &Program,
        hook: &FnPtr,
        args: impl FuncArgs,
    ) -> Result<(), Box<EvalAltResult>> {
        hook.call::<()>(&self.engine, &program.ast, args)
    }
}

fn num(value: &Dynamic) -> f32 {
    coerce_f32(value).unwrap_or(0.0)
}

fn numf(value: &Dynamic) -> f64 {
    coerce_f32(value).map(f64::from).unwrap_or(0.0)
}

fn register_constants(engine: &mut Engine) {
    // Constants live in a global module, not the load scope, so they are
    // reachable from named script functions as well as closures.
    let mut module = Module::new();
    module.set_var("vk", keys::vk_map());
    module.set_var("console", Console);
    engine.register_global_module(module.into());
}

fn register_lifecycle(engine: &mut Engine, staged: &Rc<RefCell<LifecycleHooks>>) {
    let slot = staged.clone();
    engine.register_fn("register_create", move |hook: FnPtr| {
        slot.borrow_mut().create = Some(hook);
    });
    let slot = staged.clone();
    engine.register_fn("register_step", move |hook: FnPtr| {
        slot.borrow_mut().step = Some(hook);
    });
    let slot = staged.clone();
    engine.register_fn("register_draw", move |hook: FnPtr| {
        slot.borrow_mut().draw = Some(hook);
    });
    let slot = staged.clone();
    engine.register_fn("register_destroy", move |hook: FnPtr| {
        slot.borrow_mut().destroy = Some(hook);
    });
}

fn register_object_type(engine: &mut Engine) {
    engine.register_type_with_name::<ObjectHandle>("GameObject");
    engine.register_get("id", |object: &mut ObjectHandle| object.borrow().id().0 as i64);
    engine.register_get("x", |object: &mut ObjectHandle| f64::from(object.borrow().x));
    engine.register_set("x", |object: &mut ObjectHandle, value: Dynamic| {
        if let Some(v) = coerce_f32(&value) {
            object.borrow_mut().x = v;
        }
    });
    engine.register_get("y", |object: &mut ObjectHandle| f64::from(object.borrow().y));
    engine.register_set("y", |object: &mut ObjectHandle, value: Dynamic| {
        if let Some(v) = coerce_f32(&value) {
            object.borrow_mut().y = v;
        }
    });
    engine.register_get("width", |object: &mut ObjectHandle| f64::from(object.borrow().width));
    engine.register_set("width", |object: &mut ObjectHandle, value: Dynamic| {
        if let Some(v) = coerce_f32(&value) {
            object.borrow_mut().width = v.max(0.0);
        }
    });
    engine.register_get("height", |object: &mut ObjectHandle| f64::from(object.borrow().height));
    engine.register_set("height", |object: &mut ObjectHandle, value: Dynamic| {
        if let Some(v) = coerce_f32(&value) {
            object.borrow_mut().height = v.max(0.0);
        }
    });
    engine.register_get("rotation", |object: &mut ObjectHandle| f64::from(object.borrow().rotation));
    engine.register_set("rotation", |object: &mut ObjectHandle, value: Dynamic| {
        if let Some(v) = coerce_f32(&value) {
            object.borrow_mut().rotation = v;
        }
    });
    engine.register_get_set(
        "visible",
        |object: &mut ObjectHandle| object.borrow().visible,
        |object: &mut ObjectHandle, value: bool| {
            object.borrow_mut().visible = value;
        },
    );
    // Custom fields go through the index syntax: obj["hp"] = 3.
    engine.register_indexer_get(|object: &mut ObjectHandle, key: ImmutableString| -> Dynamic {
        object.borrow().fields.get(key.as_str()).cloned().unwrap_or(Dynamic::UNIT)
    });
    engine.register_indexer_set(|object: &mut ObjectHandle, key: ImmutableString, value: Dynamic| {
        object.borrow_mut().fields.insert(key.as_str().into(), value);
    });
}

fn register_object_api(engine: &mut Engine, ctx: &Rc<RefCell<RuntimeContext>>) {
    let state = ctx.clone();
    engine.register_fn("create_object", move |spec: Map| -> ObjectHandle {
        state.borrow_mut().objects.create(spec)
    });
    let state = ctx.clone();
    engine.register_fn("create_object", move || -> ObjectHandle {
        state.borrow_mut().objects.create(Map::new())
    });
    let state = ctx.clone();
    engine.register_fn("destroy_object", move |id: i64| {
        if id >= 0 {
            state.borrow_mut().objects.destroy(ObjectId(id as u64));
        }
    });
    let state = ctx.clone();
    engine.register_fn("get_object", move |id: i64| -> Dynamic {
        if id < 0 {
            return Dynamic::UNIT;
        }
        match state.borrow().objects.get(ObjectId(id as u64)) {
            Some(handle) => Dynamic::from(handle),
            None => Dynamic::UNIT,
        }
    });
    let state = ctx.clone();
    engine.register_fn("get_all_objects", move || -> Array {
        state.borrow().objects.all().into_iter().map(Dynamic::from).collect()
    });
}

fn register_drawing(engine: &mut Engine, ctx: &Rc<RefCell<RuntimeContext>>) {
    let state = ctx.clone();
    engine.register_fn(
        "draw_rectangle",
        move |x: Dynamic, y: Dynamic, width: Dynamic, height: Dynamic, color: &str| {
            if let Some(surface) = state.borrow_mut().surface.as_mut() {
                surface.fill_rect(num(&x), num(&y), num(&width), num(&height), color);
            }
        },
    );
    let state = ctx.clone();
    engine.register_fn("draw_circle", move |x: Dynamic, y: Dynamic, radius: Dynamic, color: &str| {
        if let Some(surface) = state.borrow_mut().surface.as_mut() {
            surface.fill_circle(num(&x), num(&y), num(&radius), color);
        }
    });
    let state = ctx.clone();
    engine.register_fn(
        "draw_line",
        move |x1: Dynamic, y1: Dynamic, x2: Dynamic, y2: Dynamic, color: &str| {
            if let Some(surface) = state.borrow_mut().surface.as_mut() {
                surface.stroke_line(num(&x1), num(&y1), num(&x2), num(&y2), color, DEFAULT_LINE_WIDTH);
            }
        },
    );
    let state = ctx.clone();
    engine.register_fn(
        "draw_line",
        move |x1: Dynamic, y1: Dynamic, x2: Dynamic, y2: Dynamic, color: &str, width: Dynamic| {
            if let Some(surface) = state.borrow_mut().surface.as_mut() {
                surface.stroke_line(num(&x1), num(&y1), num(&x2), num(&y2), color, num(&width));
            }
        },
    );
    let state = ctx.clone();
    engine.register_fn("draw_text", move |text: &str, x: Dynamic, y: Dynamic, color: &str| {
        if let Some(surface) = state.borrow_mut().surface.as_mut() {
            surface.draw_text(text, num(&x), num(&y), color, DEFAULT_FONT);
        }
    });
    let state = ctx.clone();
    engine.register_fn(
        "draw_text",
        move |text: &str, x: Dynamic, y: Dynamic, color: &str, font: &str| {
            if let Some(surface) = state.borrow_mut().surface.as_mut() {
                surface.draw_text(text, num(&x), num(&y), color, font);
            }
        },
    );
    let state = ctx.clone();
    engine.register_fn(
        "draw_sprite",
        move |name: &str, x: Dynamic, y: Dynamic, width: Dynamic, height: Dynamic| {
            if let Some(surface) = state.borrow_mut().surface.as_mut() {
                surface.draw_sprite(name, num(&x), num(&y), num(&width), num(&height));
            }
        },
    );
}

fn register_input(engine: &mut Engine, ctx: &Rc<RefCell<RuntimeContext>>) {
    let state = ctx.clone();
    engine.register_fn("keyboard_check", move |code: i64| state.borrow().input.key_held(code));
    let state = ctx.clone();
    engine
        .register_fn("keyboard_check_pressed", move |code: i64| state.borrow().input.key_pressed(code));
    let state = ctx.clone();
    engine.register_fn("mouse_check", move |button: i64| state.borrow().input.button_held(button));
    let state = ctx.clone();
    engine.register_fn("mouse_pressed", move || state.borrow().input.button_pressed(0));
    let state = ctx.clone();
    engine.register_fn("mouse_x", move || f64::from(state.borrow().input.mouse_position().x));
    let state = ctx.clone();
    engine.register_fn("mouse_y", move || f64::from(state.borrow().input.mouse_position().y));
    let state = ctx.clone();
    engine.register_fn("get_mouse_position", move || -> Map {
        let position = state.borrow().input.mouse_position();
        let mut map = Map::new();
        map.insert("x".into(), Dynamic::from(f64::from(position.x)));
        map.insert("y".into(), Dynamic::from(f64::from(position.y)));
        map
    });
}

fn register_utility(engine: &mut Engine, rng: &Rc<RefCell<ScriptRng>>) {
    let shared = rng.clone();
    engine.register_fn("random", move |min: Dynamic, max: Dynamic| -> f64 {
        shared.borrow_mut().float(numf(&min), numf(&max))
    });
    let shared = rng.clone();
    engine.register_fn("random_int", move |min: i64, max: i64| -> i64 {
        shared.borrow_mut().int(min, max)
    });
    engine.register_fn(
        "distance",
        |x1: Dynamic, y1: Dynamic, x2: Dynamic, y2: Dynamic| -> f64 {
            f64::from(Vec2::new(num(&x1), num(&y1)).distance(Vec2::new(num(&x2), num(&y2))))
        },
    );
    engine.register_fn("clamp", |value: Dynamic, min: Dynamic, max: Dynamic| -> f64 {
        let (lo, hi) = {
            let (a, b) = (numf(&min), numf(&max));
            if a <= b {
                (a, b)
            } else {
                (b, a)
            }
        };
        numf(&value).clamp(lo, hi)
    });
}

fn register_diagnostics(engine: &mut Engine, channel: &Rc<RefCell<FaultChannel>>) {
    let sink = channel.clone();
    engine.register_fn("log", move |message: Dynamic| {
        sink.borrow_mut().emit_log(message.to_string());
    });

    engine.register_type_with_name::<Console>("Console");
    // The console shim lives in a global module and is therefore a constant;
    // its methods must be registered as pure to stay callable on it.
    let sink = channel.clone();
    FuncRegistration::new("log").with_purity(true).register_into_engine(
        engine,
        move |_console: &mut Console, message: Dynamic| {
            sink.borrow_mut().emit_log(message.to_string());
        },
    );
    let sink = channel.clone();
    FuncRegistration::new("warn").with_purity(true).register_into_engine(
        engine,
        move |_console: &mut Console, message: Dynamic| {
            sink.borrow_mut().emit_log(format!("warning: {message}"));
        },
    );
    let sink = channel.clone();
    FuncRegistration::new("error").with_purity(true).register_into_engine(
        engine,
        move |_console: &mut Console, message: Dynamic| {
            sink.borrow_mut().emit_error(message.to_string());
        },
    );
}
