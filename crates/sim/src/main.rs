//! splatwalk - headless run of the interaction loop with a scripted player.

use anyhow::Result;
use audio::{AudioSystem, CuePlayer, SilentPlayer};
use engine_core::Time;
use input::{ElementState, InputState, KeyCode, MouseButton};
use scene::{GltfLoader, NullRenderer};
use sim::{SimConfig, SimContext, SimEvent, Simulation};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Action {
    Press(KeyCode),
    Release(KeyCode),
    Click,
    Unclick,
    Look(f64, f64),
    ClearAssets,
}

/// Walk into the tower, jump, throw a few balls, fly up and back down,
/// grab whatever is in front and launch it, then clear the spawned assets.
const SCRIPT: &[(u64, Action)] = &[
    (0, Action::Press(KeyCode::KeyW)),
    (90, Action::Release(KeyCode::KeyW)),
    (100, Action::Press(KeyCode::Space)),
    (101, Action::Release(KeyCode::Space)),
    (140, Action::Press(KeyCode::KeyF)),
    (141, Action::Release(KeyCode::KeyF)),
    (160, Action::Press(KeyCode::KeyF)),
    (161, Action::Release(KeyCode::KeyF)),
    (180, Action::Look(-400.0, 150.0)),
    (181, Action::Press(KeyCode::KeyF)),
    (182, Action::Release(KeyCode::KeyF)),
    (220, Action::Press(KeyCode::KeyG)),
    (221, Action::Release(KeyCode::KeyG)),
    (222, Action::Press(KeyCode::Space)),
    (270, Action::Release(KeyCode::Space)),
    (280, Action::Press(KeyCode::KeyG)),
    (281, Action::Release(KeyCode::KeyG)),
    (300, Action::Look(400.0, -150.0)),
    (330, Action::Press(KeyCode::F3)),
    (331, Action::Release(KeyCode::F3)),
    (360, Action::Press(KeyCode::KeyE)),
    (361, Action::Release(KeyCode::KeyE)),
    (362, Action::Press(KeyCode::ArrowLeft)),
    (390, Action::Release(KeyCode::ArrowLeft)),
    (400, Action::Click),
    (401, Action::Unclick),
    (500, Action::ClearAssets),
];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting splatwalk (headless)");
    let config = SimConfig::load();
    let demo = config.demo.clone();

    let audio: Box<dyn CuePlayer> = match AudioSystem::new() {
        Ok(system) => Box::new(system),
        Err(e) => {
            log::warn!("No audio output ({:#}); impact cues will be silent", e);
            Box::new(SilentPlayer::new())
        }
    };
    let context = SimContext {
        loader: Arc::new(GltfLoader::new(demo.asset_root.clone())),
        audio,
    };
    let (mut sim, commands) = Simulation::new(config, context)?;

    for asset in &demo.assets {
        let sounds: Vec<&str> = asset.sounds.iter().map(String::as_str).collect();
        commands.spawn_dynamic_asset(&asset.reference, &sounds, asset.scale);
    }
    if demo.tower_layers > 0 {
        commands.spawn_prop_tower(demo.tower_layers);
    }

    let frame_dt = Duration::from_millis(demo.frame_ms);
    let mut input = InputState::new();
    input.set_cursor_locked(true);
    let mut renderer = NullRenderer::new();
    let mut sub_steps = 0u64;
    let mut failures = 0usize;
    let mut clock = Time::new();
    let mut slowest = Duration::ZERO;

    for frame in 0..demo.frames {
        let actions: Vec<Action> = SCRIPT
            .iter()
            .filter(|(at, _)| *at == frame)
            .map(|(_, action)| *action)
            .collect();
        // Motion accumulates until begin_frame publishes it.
        for action in &actions {
            if let Action::Look(dx, dy) = *action {
                input.process_mouse_motion((dx, dy));
            }
        }
        input.begin_frame();
        for action in actions {
            match action {
                Action::Press(key) => input.process_keyboard(key, ElementState::Pressed),
                Action::Release(key) => input.process_keyboard(key, ElementState::Released),
                Action::Click => input.process_mouse_button(MouseButton::Left, ElementState::Pressed),
                Action::Unclick => input.process_mouse_button(MouseButton::Left, ElementState::Released),
                Action::ClearAssets => commands.clear_all_dynamic_assets(),
                Action::Look(..) => {}
            }
        }

        let report = sim.frame(&input, frame_dt);
        clock.update();
        slowest = slowest.max(clock.delta());
        if frame == 0 && !sim.wait_for_assets(Duration::from_secs(10)) {
            log::warn!("Asset loads still pending after 10 s");
        }
        sub_steps += report.sub_steps as u64;

        for event in sim.drain_events() {
            match event {
                SimEvent::AssetSpawned {
                    id,
                    reference,
                    fallback_collider,
                    ..
                } => log::info!(
                    "#{} {} spawned{}",
                    id,
                    reference,
                    if fallback_collider { " (fallback collider)" } else { "" }
                ),
                SimEvent::AssetFailed { id, reference, error } => {
                    failures += 1;
                    log::warn!("#{} {} failed: {}", id, reference, error);
                }
                other => log::info!("{:?}", other),
            }
        }
        if report.aborted {
            break;
        }
        sim.render(&mut renderer)?;
    }

    let blocks: usize = sim.towers().iter().map(|t| t.len()).sum();
    log::info!(
        "{} frames, {} physics steps, {} projectiles, {} dynamic assets ({} failed), {} tower blocks, {} impact cues",
        sim.frames(),
        sub_steps,
        sim.projectiles().len(),
        sim.spawner().len(),
        failures,
        blocks,
        sim.cues().fired()
    );
    log::info!(
        "wall clock {:.2} s over {} frames, slowest {:?}",
        clock.elapsed_seconds(),
        clock.frame_count(),
        slowest
    );
    log::info!(
        "last frame: {} instances, {} bytes uploaded, {} debug boxes",
        renderer.last_instance_count,
        renderer.last_upload_bytes,
        renderer.last_debug_boxes
    );

    commands.teardown();
    sim.frame(&input, frame_dt);
    sim.drain_events();
    Ok(())
}
