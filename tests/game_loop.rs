use std::time::{Duration, Instant};

use saaam_runtime::config::RuntimeConfig;
use saaam_runtime::runtime::{RunState, Runtime, TickOutcome};
use saaam_runtime::surface::{DrawCommand, NullSurface, RecordingSurface};

const STEP_AND_DRAW: &str = r#"
    register_step(|dt| log("step"));
    register_draw(|| log("draw"));
"#;

fn tick_at(runtime: &mut Runtime, start: Instant, frame: u64) -> TickOutcome {
    runtime.tick(start + Duration::from_millis(16 * frame))
}

#[test]
fn step_completes_before_draw_within_a_tick() {
    let mut runtime = Runtime::new();
    runtime.initialize(Box::new(NullSurface::new(320.0, 240.0)));
    assert!(runtime.execute_code(STEP_AND_DRAW));

    let t0 = Instant::now();
    runtime.start_at(t0);
    assert_eq!(tick_at(&mut runtime, t0, 1), TickOutcome::Continue);
    assert_eq!(runtime.logs(), vec!["step".to_string(), "draw".to_string()]);
}

#[test]
fn paused_frame_skips_step_but_still_draws() {
    let mut runtime = Runtime::new();
    assert!(runtime.execute_code(STEP_AND_DRAW));

    let t0 = Instant::now();
    runtime.start_at(t0);
    runtime.toggle_pause();
    assert_eq!(runtime.run_state(), RunState::Paused);

    tick_at(&mut runtime, t0, 1);
    assert_eq!(runtime.logs(), vec!["draw".to_string()]);
    assert_eq!(runtime.frame(), 1, "a paused frame still renders and counts");

    runtime.toggle_pause();
    tick_at(&mut runtime, t0, 2);
    assert_eq!(
        runtime.logs(),
        vec!["draw".to_string(), "step".to_string(), "draw".to_string()]
    );
}

#[test]
fn step_fault_is_fatal_for_the_run() {
    let mut runtime = Runtime::new();
    let ok = runtime.execute_code(
        r#"
            register_step(|dt| { throw "boom"; });
            register_draw(|| log("draw"));
            register_destroy(|| log("destroyed"));
        "#,
    );
    assert!(ok);

    let t0 = Instant::now();
    runtime.start_at(t0);
    assert_eq!(tick_at(&mut runtime, t0, 1), TickOutcome::Halted);
    assert_eq!(runtime.run_state(), RunState::Stopped);
    assert!(runtime.errors().iter().any(|err| err.contains("boom")));
    assert!(
        !runtime.logs().contains(&"draw".to_string()),
        "draw must not run after a step fault in the same tick"
    );
    assert_eq!(
        runtime.logs().iter().filter(|line| *line == &"destroyed".to_string()).count(),
        1,
        "stop semantics fire destroy once"
    );

    let logs_before = runtime.logs();
    assert_eq!(tick_at(&mut runtime, t0, 2), TickOutcome::Halted);
    assert_eq!(runtime.logs(), logs_before, "no further ticks occur");
}

#[test]
fn draw_fault_is_fatal_for_the_run() {
    let mut runtime = Runtime::new();
    let ok = runtime.execute_code(
        r#"
            register_step(|dt| log("step"));
            register_draw(|| { throw "bad draw"; });
        "#,
    );
    assert!(ok);

    let t0 = Instant::now();
    runtime.start_at(t0);
    assert_eq!(tick_at(&mut runtime, t0, 1), TickOutcome::Halted);
    assert_eq!(runtime.run_state(), RunState::Stopped);
    assert!(runtime.errors().iter().any(|err| err.contains("bad draw")));
}

#[test]
fn fault_leaves_prior_frame_state_intact() {
    let mut runtime = Runtime::new();
    let ok = runtime.execute_code(
        r#"
            create_object(#{x: 1.0});
            register_step(|dt| { throw "boom"; });
        "#,
    );
    assert!(ok);

    let t0 = Instant::now();
    runtime.start_at(t0);
    tick_at(&mut runtime, t0, 1);
    let objects = runtime.snapshot().objects;
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].x, 1.0);
}

#[test]
fn destroy_fault_is_logged_but_swallowed() {
    let mut runtime = Runtime::new();
    let ok = runtime.execute_code(r#"register_destroy(|| { throw "teardown"; });"#);
    assert!(ok);

    runtime.start_at(Instant::now());
    runtime.stop();
    assert_eq!(runtime.run_state(), RunState::Stopped);
    assert!(runtime.errors().iter().any(|err| err.contains("teardown")));
}

#[test]
fn stop_fires_destroy_exactly_once() {
    let mut runtime = Runtime::new();
    assert!(runtime.execute_code(r#"register_destroy(|| log("destroyed"));"#));

    runtime.start_at(Instant::now());
    runtime.stop();
    runtime.stop();
    assert_eq!(runtime.logs(), vec!["destroyed".to_string()]);
}

#[test]
fn overlay_paints_after_user_draw() {
    let mut config = RuntimeConfig::default();
    config.overlay.enabled = true;
    let mut runtime = Runtime::with_config(config);
    let surface = RecordingSurface::new(320.0, 240.0);
    runtime.initialize(Box::new(surface.clone()));

    let ok = runtime.execute_code(
        r##"register_draw(|| draw_rectangle(10.0, 10.0, 50.0, 50.0, "#ff0000"));"##,
    );
    assert!(ok);

    let t0 = Instant::now();
    runtime.start_at(t0);
    tick_at(&mut runtime, t0, 1);

    let commands = surface.commands();
    assert_eq!(commands[0], DrawCommand::Clear);
    assert!(matches!(commands[1], DrawCommand::Rect { .. }));
    let texts: Vec<_> = commands
        .iter()
        .skip(2)
        .map(|command| match command {
            DrawCommand::Text { text, .. } => text.clone(),
            other => panic!("expected overlay text after user draw, got {other:?}"),
        })
        .collect();
    assert_eq!(texts.len(), 4);
    assert!(texts[0].starts_with("fps:"));
    assert!(texts[1].starts_with("objects:"));
    assert!(texts[2].starts_with("mouse:"));
    assert!(texts[3].starts_with("frame:"));
}

#[test]
fn delta_is_clamped_to_the_configured_bound() {
    let mut runtime = Runtime::new();
    assert!(runtime.execute_code(r#"register_step(|dt| log(dt == 0.25));"#));

    let t0 = Instant::now();
    runtime.start_at(t0);
    runtime.tick(t0 + Duration::from_secs(10));
    assert_eq!(runtime.logs(), vec!["true".to_string()]);
}

#[test]
fn start_without_a_program_reports_an_error() {
    let mut runtime = Runtime::new();
    runtime.start_at(Instant::now());
    assert_eq!(runtime.run_state(), RunState::Stopped);
    assert!(runtime.errors().iter().any(|err| err.contains("no script loaded")));
}

#[test]
fn tick_while_stopped_is_halted() {
    let mut runtime = Runtime::new();
    assert!(runtime.execute_code(STEP_AND_DRAW));
    assert_eq!(runtime.tick(Instant::now()), TickOutcome::Halted);
    assert!(runtime.logs().is_empty());
}

#[test]
fn create_fault_leaves_runtime_stopped_without_destroy() {
    let mut runtime = Runtime::new();
    let ok = runtime.execute_code(
        r#"
            register_create(|| { throw "bad create"; });
            register_destroy(|| log("destroyed"));
        "#,
    );
    assert!(ok);

    runtime.start_at(Instant::now());
    assert_eq!(runtime.run_state(), RunState::Stopped);
    assert!(runtime.errors().iter().any(|err| err.contains("bad create")));
    assert!(runtime.logs().is_empty(), "destroy is not fired when create never completed");
}

#[test]
fn frame_counter_and_fps_track_ticks() {
    let mut runtime = Runtime::new();
    assert!(runtime.execute_code(STEP_AND_DRAW));

    let t0 = Instant::now();
    runtime.start_at(t0);
    runtime.tick(t0 + Duration::from_millis(20));
    runtime.tick(t0 + Duration::from_millis(40));
    assert_eq!(runtime.frame(), 2);
    assert!((runtime.fps() - 50.0).abs() < 1.0);
}

#[test]
fn pressed_query_is_edge_triggered_across_frames() {
    let mut runtime = Runtime::new();
    let ok = runtime.execute_code(
        r#"
            register_step(|dt| {
                log(keyboard_check_pressed(vk.space));
                log(keyboard_check(vk.space));
            });
        "#,
    );
    assert!(ok);

    let t0 = Instant::now();
    runtime.set_key_down(32);
    runtime.start_at(t0);
    tick_at(&mut runtime, t0, 1);
    tick_at(&mut runtime, t0, 2);
    assert_eq!(
        runtime.logs(),
        vec![
            "true".to_string(),
            "true".to_string(),
            "false".to_string(),
            "true".to_string()
        ],
        "pressed reports one edge, held stays latched"
    );
}

#[test]
fn resize_replaces_the_surface_dimensions() {
    let mut runtime = Runtime::new();
    runtime.initialize(Box::new(RecordingSurface::new(320.0, 240.0)));
    assert_eq!(runtime.snapshot().surface_size, Some([320.0, 240.0]));
    runtime.resize(640.0, 480.0);
    assert_eq!(runtime.snapshot().surface_size, Some([640.0, 480.0]));
}

#[test]
fn mouse_queries_reflect_latched_host_events() {
    let mut runtime = Runtime::new();
    let ok = runtime.execute_code(
        r#"
            register_step(|dt| {
                log(mouse_check(0));
                log(mouse_x() == 3.0);
                log(get_mouse_position().y == 4.0);
            });
        "#,
    );
    assert!(ok);

    let t0 = Instant::now();
    runtime.set_mouse_button(0, true);
    runtime.set_mouse_position(3.0, 4.0);
    runtime.start_at(t0);
    tick_at(&mut runtime, t0, 1);
    assert_eq!(
        runtime.logs(),
        vec!["true".to_string(), "true".to_string(), "true".to_string()]
    );
}
