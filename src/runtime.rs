use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Context;
use rhai::{FnPtr, FuncArgs};
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelCallback, FaultChannel};
use crate::config::RuntimeConfig;
use crate::input::InputState;
use crate::objects::{ObjectRegistry, ObjectSnapshot};
use crate::sandbox::{LifecycleHooks, Program, ScriptHost};
use crate::surface::Surface;
use crate::time::FrameClock;

/// The mutable state reachable from sandbox primitives. Owned by one runtime
/// instance and shared only with the closures registered on its engine —
/// never ambient.
pub struct RuntimeContext {
    pub surface: Option<Box<dyn Surface>>,
    pub objects: ObjectRegistry,
    pub input: InputState,
}

impl RuntimeContext {
    fn new() -> Self {
        Self { surface: None, objects: ObjectRegistry::new(), input: InputState::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Schedule the next tick.
    Continue,
    /// The run is over; do not schedule again.
    Halted,
}

/// Read-only view of the runtime for the host.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeSnapshot {
    pub state: RunState,
    pub debug: bool,
    pub frame: u64,
    pub fps: f32,
    pub delta: f32,
    pub surface_size: Option<[f32; 2]>,
    pub mouse: [f32; 2],
    pub objects: Vec<ObjectSnapshot>,
}

/// The script execution runtime: loads SAAAM script source into the sandbox
/// and drives it through create → step/draw per tick → destroy, isolating
/// script faults from the host.
///
/// The host owns the frame pump: it calls `tick(now)` once per display frame
/// until the outcome is `Halted`. A tick is fully synchronous; `stop` only
/// prevents the next one.
pub struct Runtime {
    host: ScriptHost,
    program: Option<Program>,
    ctx: Rc<RefCell<RuntimeContext>>,
    channel: Rc<RefCell<FaultChannel>>,
    clock: FrameClock,
    state: RunState,
    debug: bool,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let ctx = Rc::new(RefCell::new(RuntimeContext::new()));
        let channel = Rc::new(RefCell::new(FaultChannel::new(config.log_capacity)));
        let host = ScriptHost::new(ctx.clone(), channel.clone());
        let debug = config.overlay.enabled;
        Self {
            host,
            program: None,
            ctx,
            channel,
            clock: FrameClock::new(),
            state: RunState::Stopped,
            debug,
            config,
        }
    }

    // ---------- Host-facing surface management ----------

    pub fn initialize(&mut self, surface: Box<dyn Surface>) {
        self.ctx.borrow_mut().surface = Some(surface);
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if let Some(surface) = self.ctx.borrow_mut().surface.as_mut() {
            surface.resize(width, height);
        }
    }

    // ---------- Script loading ----------

    /// Runs the script's one-time load pass. Returns `false` on a compile or
    /// top-level failure, with the cause on the fault channel; the previous
    /// program is discarded either way and the scheduler cannot start until
    /// a load succeeds. Reloading while running stops the current run first
    /// (firing its `destroy` once).
    pub fn execute_code(&mut self, source: &str) -> bool {
        if self.state != RunState::Stopped {
            self.stop();
        }
        self.channel.borrow_mut().clear();
        self.ctx.borrow_mut().objects.clear();
        self.program = None;
        match self.host.load(source) {
            Ok(program) => {
                self.program = Some(program);
                true
            }
            Err(err) => {
                self.channel.borrow_mut().emit_error(format!("{err:#}"));
                false
            }
        }
    }

    pub fn execute_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading script '{}'", path.display()));
        match source {
            Ok(source) => self.execute_code(&source),
            Err(err) => {
                self.channel.borrow_mut().emit_error(format!("{err:#}"));
                false
            }
        }
    }

    pub fn enable_deterministic_mode(&mut self, seed: u64) {
        self.host.enable_deterministic_mode(seed);
    }

    // ---------- Scheduler state machine ----------

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Transitions Stopped → Running, capturing `now` as the frame baseline,
    /// and fires `create` once. A `create` fault is fatal: the error is
    /// logged and the runtime is left Stopped without invoking `destroy`.
    pub fn start_at(&mut self, now: Instant) {
        if self.state != RunState::Stopped {
            return;
        }
        if self.program.is_none() {
            self.channel.borrow_mut().emit_error("no script loaded; call execute_code before start");
            return;
        }
        self.clock.reset(now);
        self.state = RunState::Running;
        let hook = self.hook(|hooks| hooks.create.clone());
        if let Err(message) = self.fire_hook(hook, "create", ()) {
            self.channel.borrow_mut().emit_error(message);
            self.state = RunState::Stopped;
        }
    }

    /// One frame: clear, step (unless paused), draw, optional debug overlay.
    /// A `step` or `draw` fault logs to the channel and triggers `stop`
    /// semantics; the host must not schedule another tick after `Halted`.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.state == RunState::Stopped {
            return TickOutcome::Halted;
        }
        let dt = self.clock.tick(now, self.config.max_delta);
        {
            let mut ctx = self.ctx.borrow_mut();
            if let Some(surface) = ctx.surface.as_mut() {
                surface.clear();
            }
        }
        if self.state == RunState::Running {
            let hook = self.hook(|hooks| hooks.step.clone());
            if let Err(message) = self.fire_hook(hook, "step", (f64::from(dt),)) {
                self.channel.borrow_mut().emit_error(message);
                self.stop();
                return TickOutcome::Halted;
            }
        }
        // Draw runs even while paused so a paused frame still renders.
        let hook = self.hook(|hooks| hooks.draw.clone());
        if let Err(message) = self.fire_hook(hook, "draw", ()) {
            self.channel.borrow_mut().emit_error(message);
            self.stop();
            return TickOutcome::Halted;
        }
        if self.debug {
            self.draw_overlay();
        }
        self.ctx.borrow_mut().input.end_frame();
        TickOutcome::Continue
    }

    /// Stops the run and fires `destroy` exactly once; a `destroy` fault is
    /// logged but never re-thrown to the caller.
    pub fn stop(&mut self) {
        if self.state == RunState::Stopped {
            return;
        }
        self.state = RunState::Stopped;
        let hook = self.hook(|hooks| hooks.destroy.clone());
        if let Err(message) = self.fire_hook(hook, "destroy", ()) {
            self.channel.borrow_mut().emit_error(message);
        }
    }

    pub fn toggle_pause(&mut self) {
        self.state = match self.state {
            RunState::Running => RunState::Paused,
            RunState::Paused => RunState::Running,
            RunState::Stopped => RunState::Stopped,
        };
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    // ---------- Host input events ----------

    pub fn set_key_down(&mut self, code: i64) {
        self.ctx.borrow_mut().input.set_key_down(code);
    }

    pub fn set_key_up(&mut self, code: i64) {
        self.ctx.borrow_mut().input.set_key_up(code);
    }

    pub fn set_mouse_button(&mut self, button: i64, down: bool) {
        self.ctx.borrow_mut().input.set_mouse_button(button, down);
    }

    pub fn set_mouse_position(&mut self, x: f32, y: f32) {
        self.ctx.borrow_mut().input.set_mouse_position(x, y);
    }

    // ---------- Diagnostics ----------

    pub fn on_log(&mut self, callback: ChannelCallback) {
        self.channel.borrow_mut().set_log_callback(callback);
    }

    pub fn on_error(&mut self, callback: ChannelCallback) {
        self.channel.borrow_mut().set_error_callback(callback);
    }

    pub fn logs(&self) -> Vec<String> {
        self.channel.borrow().logs()
    }

    pub fn errors(&self) -> Vec<String> {
        self.channel.borrow().errors()
    }

    pub fn take_logs(&mut self) -> Vec<String> {
        self.channel.borrow_mut().take_logs()
    }

    pub fn take_errors(&mut self) -> Vec<String> {
        self.channel.borrow_mut().take_errors()
    }

    pub fn clear_logs_and_errors(&mut self) {
        self.channel.borrow_mut().clear();
    }

    pub fn fps(&self) -> f32 {
        self.clock.fps()
    }

    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        let ctx = self.ctx.borrow();
        let mouse = ctx.input.mouse_position();
        RuntimeSnapshot {
            state: self.state,
            debug: self.debug,
            frame: self.clock.frame(),
            fps: self.clock.fps(),
            delta: self.clock.delta_seconds(),
            surface_size: ctx.surface.as_ref().map(|surface| {
                let (width, height) = surface.size();
                [width, height]
            }),
            mouse: [mouse.x, mouse.y],
            objects: ctx.objects.snapshots(),
        }
    }

    // ---------- Internals ----------

    fn hook(&self, select: impl Fn(&LifecycleHooks) -> Option<FnPtr>) -> Option<FnPtr> {
        self.program.as_ref().and_then(|program| select(&program.hooks))
    }

    fn fire_hook(&self, hook: Option<FnPtr>, phase: &str, args: impl FuncArgs) -> Result<(), String> {
        let Some(hook) = hook else { return Ok(()) };
        let Some(program) = self.program.as_ref() else { return Ok(()) };
        self.host
            .call_hook(program, &hook, args)
            .map_err(|err| format!("{phase} failed: {err}"))
    }

    fn draw_overlay(&mut self) {
        let fps = self.clock.fps();
        let frame = self.clock.frame();
        let mut ctx = self.ctx.borrow_mut();
        let object_count = ctx.objects.len();
        let mouse = ctx.input.mouse_position();
        let Some(surface) = ctx.surface.as_mut() else { return };
        let color = self.config.overlay.color.as_str();
        let font = self.config.overlay.font.as_str();
        let lines = [
            format!("fps: {fps:.0}"),
            format!("objects: {object_count}"),
            format!("mouse: {:.0},{:.0}", mouse.x, mouse.y),
            format!("frame: {frame}"),
        ];
        for (index, line) in lines.iter().enumerate() {
            surface.draw_text(line, 8.0, 16.0 + 14.0 * index as f32, color, font);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
