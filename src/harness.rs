use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;
use crate::objects::ObjectSnapshot;
use crate::runtime::{RunState, Runtime, TickOutcome};
use crate::surface::{DrawCommand, RecordingSurface};

/// Headless run description: a script (inline or by path) driven for a fixed
/// number of ticks at a fixed delta against a recording surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessFixture {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default = "default_seed")]
    pub deterministic_seed: Option<u64>,
    #[serde(default)]
    pub debug_overlay: bool,
    #[serde(default = "default_surface_size")]
    pub surface_size: [f32; 2],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PhaseRecord {
    pub logs: Vec<String>,
    pub commands: Vec<DrawCommand>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    pub logs: Vec<String>,
    pub commands: Vec<DrawCommand>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessOutput {
    pub steps: usize,
    pub dt: f32,
    pub loaded: bool,
    /// Load pass plus the `create` hook, before the first tick.
    pub load: PhaseRecord,
    pub results: Vec<StepRecord>,
    /// Step index at which a lifecycle fault ended the run, if any.
    pub halted_at: Option<usize>,
    pub final_state: RunState,
    pub shutdown_logs: Vec<String>,
    pub final_objects: Vec<ObjectSnapshot>,
    pub errors: Vec<String>,
}

pub fn run_fixture(fixture: &HarnessFixture) -> Result<HarnessOutput> {
    let source = fixture_source(fixture)?;
    if !(fixture.dt > 0.0) {
        bail!("fixture dt must be positive, got {}", fixture.dt);
    }

    let mut config = RuntimeConfig::default();
    config.overlay.enabled = fixture.debug_overlay;
    let mut runtime = Runtime::with_config(config);
    let surface = RecordingSurface::new(fixture.surface_size[0], fixture.surface_size[1]);
    runtime.initialize(Box::new(surface.clone()));
    if let Some(seed) = fixture.deterministic_seed {
        runtime.enable_deterministic_mode(seed);
    }

    let loaded = runtime.execute_code(&source);
    let epoch = Instant::now();
    if loaded {
        runtime.start_at(epoch);
    }
    let load = PhaseRecord { logs: runtime.take_logs(), commands: surface.take_commands() };

    let mut results = Vec::with_capacity(fixture.steps);
    let mut halted_at = None;
    if loaded {
        for step in 0..fixture.steps {
            let now = epoch + Duration::from_secs_f32(fixture.dt * (step + 1) as f32);
            let outcome = runtime.tick(now);
            results.push(StepRecord {
                step,
                logs: runtime.take_logs(),
                commands: surface.take_commands(),
            });
            if outcome == TickOutcome::Halted {
                halted_at = Some(step);
                break;
            }
        }
    }

    let final_state = runtime.run_state();
    runtime.stop();
    let shutdown_logs = runtime.take_logs();
    let final_objects = runtime.snapshot().objects;
    let errors = runtime.take_errors();

    Ok(HarnessOutput {
        steps: fixture.steps,
        dt: fixture.dt,
        loaded,
        load,
        results,
        halted_at,
        final_state,
        shutdown_logs,
        final_objects,
        errors,
    })
}

pub fn load_fixture<P: AsRef<Path>>(path: P) -> Result<HarnessFixture> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("opening fixture '{}'", path.as_ref().display()))?;
    Ok(serde_json::from_reader(file).with_context(|| "parsing fixture JSON")?)
}

fn fixture_source(fixture: &HarnessFixture) -> Result<String> {
    match (&fixture.source, &fixture.script) {
        (Some(source), _) => Ok(source.clone()),
        (None, Some(path)) => {
            fs::read_to_string(path).with_context(|| format!("reading script '{path}'"))
        }
        (None, None) => bail!("fixture needs either 'source' or 'script'"),
    }
}

fn default_steps() -> usize {
    3
}

fn default_dt() -> f32 {
    0.016
}

fn default_seed() -> Option<u64> {
    Some(1)
}

fn default_surface_size() -> [f32; 2] {
    [800.0, 600.0]
}
