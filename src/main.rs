//! Barrage headless harness
//!
//! Drives the scheduler with a synthetic host: frame times grow with load,
//! a scripted bullet storm overloads the pools, and one long stall hits mid-run.
//! A minimal gameplay layer consumes collision reports so entities actually
//! die, drop pickups and spray particles.
//!
//! Usage: `barrage [settings.json]` or `barrage --print-settings`

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use barrage::Settings;
use barrage::consts::FRAME_BUDGET_MS;
use barrage::sim::{
    CollisionReport, DegradationLevel, Entity, FrameHost, FrameOutcome, Owner, PickupKind,
    Playfield, Scheduler, SimContext,
};

/// Frames to simulate
const RUN_FRAMES: u64 = 1500;
/// Storm window (frame numbers)
const STORM: std::ops::Range<u64> = 300..900;
/// Frame at which the host stalls, and for how long
const STALL_FRAME: u64 = 1000;
const STALL_MS: f64 = 3000.0;

/// Fixed host overhead per frame
const BASE_FRAME_MS: f64 = 12.0;
/// Simulated cost per live entity
const ENTITY_COST_MS: f64 = 0.04;
/// Simulated cost of a skipped frame
const SKIPPED_FRAME_MS: f64 = 4.0;

/// Horizontal span hostiles enter through: 20px in from each side, shrunk on
/// narrow playfields so the span never collapses
fn entry_lane(field: &Playfield) -> std::ops::Range<f32> {
    let inset = (field.area.width() * 0.25).min(20.0);
    field.area.left + inset..field.area.right - inset
}

/// Stands in for `requestAnimationFrame`
#[derive(Default)]
struct HeadlessHost {
    pending: bool,
    requests: u64,
}

impl FrameHost for HeadlessHost {
    fn request_frame(&mut self) {
        self.pending = true;
        self.requests += 1;
    }
}

impl HeadlessHost {
    fn take_request(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// Run totals, printed as JSON at the end
#[derive(Debug, Default, Serialize)]
struct Summary {
    frames: u64,
    skipped_frames: u64,
    stalls: u64,
    level_changes: u64,
    kills: u64,
    crates_broken: u64,
    player_hits: u64,
    pickups_collected: u64,
    evicted: u64,
    particles_suppressed: u64,
    final_level: DegradationLevel,
    final_average_fps: f64,
}

/// Harness instance holding the scheduler and gameplay bookkeeping
struct Game {
    scheduler: Scheduler,
    rng: Pcg32,
    now_ms: f64,
    summary: Summary,
}

impl Game {
    fn new(settings: Settings, seed: u64) -> Result<Self, barrage::ConfigError> {
        let mut scheduler = Scheduler::new(settings)?;
        let ctx = scheduler.ctx_mut();
        // A row of crates near the top
        for i in 0..6 {
            let x = 60.0 + i as f32 * 72.0;
            ctx.spawn_destructible(Vec2::new(x, 120.0), Vec2::new(40.0, 24.0), 4);
        }
        Ok(Self {
            scheduler,
            rng: Pcg32::seed_from_u64(seed),
            now_ms: 0.0,
            summary: Summary::default(),
        })
    }

    /// Synthetic wall-clock time the frame we just ran would have taken
    fn frame_cost_ms(&mut self, frame: u64, outcome: &FrameOutcome) -> f64 {
        if frame == STALL_FRAME {
            return STALL_MS;
        }
        if outcome.was_skipped() {
            return SKIPPED_FRAME_MS;
        }
        let jitter: f64 = self.rng.random_range(0.0..1.5);
        BASE_FRAME_MS + outcome.stats().active_entities as f64 * ENTITY_COST_MS + jitter
    }

    /// Gameplay input for this frame: movement, firing and enemy waves
    fn spawn(&mut self, frame: u64) {
        let storm = STORM.contains(&frame);
        let rng = &mut self.rng;
        let ctx = self.scheduler.ctx_mut();
        let field = ctx.playfield;

        let t = frame as f32 / 60.0;
        if let Some(player) = ctx.player.as_mut() {
            player.move_by(Vec2::new((t * 1.3).sin() * 4.0, 0.0), &field);
        }

        if frame % 6 == 0
            && let Some(pos) = ctx.player.as_ref().map(|p| p.pos)
        {
            for dx in [-8.0, 8.0] {
                ctx.spawn_projectile(
                    Owner::Player,
                    pos + Vec2::new(dx, -20.0),
                    Vec2::new(0.0, -520.0),
                );
            }
        }

        let wave_every = if storm { 4 } else { 30 };
        if frame % wave_every == 0 {
            let x = rng.random_range(entry_lane(&field));
            let vel = Vec2::new(rng.random_range(-30.0..30.0), rng.random_range(40.0..90.0));
            ctx.spawn_hostile(Vec2::new(x, -10.0), vel, 3);
        }

        let volley = if storm { 12 } else { 1 };
        if frame % 3 == 0 {
            let shooters: Vec<Vec2> = ctx.hostiles.iter().take(volley).map(|h| h.pos).collect();
            for origin in shooters {
                let angle = rng.random_range(0.3..2.8f32);
                let vel = Vec2::new(angle.cos(), angle.sin()) * 180.0;
                ctx.spawn_projectile(Owner::Hostile, origin, vel);
            }
        }
    }

    /// Minimal rules layer: resolve the frame's collisions
    fn apply_report(&mut self, report: &CollisionReport) {
        let rng = &mut self.rng;
        let ctx: &mut SimContext = self.scheduler.ctx_mut();

        for pair in &report.projectile_hostile {
            let Some((damage, piercing)) = ctx
                .player_projectiles
                .get(pair.a)
                .filter(|p| !p.should_remove())
                .map(|p| (p.damage, p.piercing))
            else {
                continue;
            };
            let Some(hostile) = ctx.hostiles.get_mut(pair.b) else {
                continue;
            };
            if !piercing {
                ctx.player_projectiles.mark_removed(pair.a);
            }
            let pos = hostile.pos;
            if hostile.apply_damage(damage) {
                self.summary.kills += 1;
                ctx.emit_particle_burst(rng, pos, 16, [255, 180, 60]);
                if self.summary.kills % 5 == 0 {
                    let kind = match rng.random_range(0..4) {
                        0 => PickupKind::Power,
                        1 => PickupKind::Score,
                        2 => PickupKind::Bomb,
                        _ => PickupKind::ExtraLife,
                    };
                    ctx.spawn_pickup(kind, pos);
                }
            }
        }

        for pair in &report.projectile_destructible {
            if ctx.player_projectiles.get(pair.a).is_none_or(|p| p.should_remove()) {
                continue;
            }
            ctx.player_projectiles.mark_removed(pair.a);
            if let Some(crate_) = ctx.destructibles.get_mut(pair.b)
                && crate_.apply_damage(1)
            {
                self.summary.crates_broken += 1;
                let pos = crate_.pos;
                ctx.emit_particle_burst(rng, pos, 24, [160, 120, 80]);
            }
        }

        for pair in &report.hostile_projectile_player {
            ctx.hostile_projectiles.mark_removed(pair.a);
            self.summary.player_hits += 1;
        }
        for pair in &report.player_hostile {
            ctx.hostiles.mark_removed(pair.b);
            self.summary.player_hits += 1;
        }
        for pair in &report.player_pickup {
            if ctx.pickups.mark_removed(pair.b) {
                self.summary.pickups_collected += 1;
            }
        }
    }

    fn run(&mut self, host: &mut HeadlessHost) {
        host.request_frame();
        let mut frame = 0;
        while host.take_request() && frame < RUN_FRAMES {
            frame += 1;
            self.spawn(frame);

            let outcome = self.scheduler.run_frame(self.now_ms, host);
            let stats = *outcome.stats();
            if stats.level_change.is_some() {
                self.summary.level_changes += 1;
            }
            if let Some(report) = outcome.report() {
                self.apply_report(report);
            }

            if frame % 120 == 0 {
                let ctx = self.scheduler.ctx();
                log::info!(
                    "frame {:>5} | {:<9} | avg {:>5.1} fps | {:>4} live | {:>4} skipped | {:>4} render items",
                    frame,
                    stats.level.as_str(),
                    self.scheduler.controller().average_fps(),
                    stats.active_entities,
                    self.scheduler.skipped_frames(),
                    ctx.render_items().count()
                );
            }

            self.now_ms += self.frame_cost_ms(frame, &outcome);
        }

        let ctx = self.scheduler.ctx();
        let controller = self.scheduler.controller();
        self.summary.frames = frame;
        self.summary.skipped_frames = self.scheduler.skipped_frames();
        self.summary.stalls = controller.stall_count();
        self.summary.evicted = ctx.evicted_total();
        self.summary.particles_suppressed = ctx.particles_suppressed();
        self.summary.final_level = self.scheduler.level();
        self.summary.final_average_fps = controller.average_fps();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let arg = std::env::args().nth(1);
    if arg.as_deref() == Some("--print-settings") {
        println!("{}", Settings::default().to_json()?);
        return Ok(());
    }

    let settings = match arg {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };
    log::info!(
        "Barrage harness starting ({} frames, budget {:.2}ms)",
        RUN_FRAMES,
        FRAME_BUDGET_MS
    );

    let mut game = Game::new(settings, 0xBA22_A6E)?;
    let mut host = HeadlessHost::default();
    game.run(&mut host);

    log::info!("Host received {} frame requests", host.requests);
    println!("{}", serde_json::to_string_pretty(&game.summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_lane_default_field() {
        let lane = entry_lane(&Playfield::new(480.0, 640.0, 32.0));
        assert_eq!(lane, 20.0..460.0);
    }

    #[test]
    fn test_entry_lane_never_empty() {
        let mut rng = Pcg32::seed_from_u64(3);
        for width in [0.5, 1.0, 10.0, 40.0, 41.0] {
            let field = Playfield::new(width, 640.0, 32.0);
            let lane = entry_lane(&field);
            assert!(lane.start < lane.end, "empty lane for width {}", width);
            let x = rng.random_range(lane);
            assert!(x >= field.area.left && x <= field.area.right);
        }
    }
}
