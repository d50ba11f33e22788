//! Fixed timestep simulation tick
//!
//! [`HeadlessEngine`] owns one run: its RNG stream, physics world and session
//! state. Each tick gathers input, launches or steers, steps the world and
//! dispatches the contacts that started during the step.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::events::{EventLog, EventSink, GameEvent, NullSink, TimedEvent};
use super::hazard::{HazardBand, HazardEffect, HazardRegistry, plan_hazards};
use super::replay::{Point, ReplayCursor, ReplayRecorder, ReplayRecording};
use super::result::{RunMetrics, RunOutcome, SimulationResult, VolleyStats};
use super::scoring::{BreakContext, ScoringState};
use super::state::{
    Ball, BallSnapshot, BallState, BrickState, GamePhase, Paddle, PaddleSnapshot, SessionSnapshot,
};
use crate::clamp_speed;
use crate::consts::SIM_DT_MS;
use crate::error::SimulationError;
use crate::level::{BrickForm, BrickPlacement, generate_level_layout, level_for_round};
use crate::physics::{
    ArcadeWorld, BodyDesc, BodyId, BodyLabel, ContactPair, PhysicsWorld, Shape, WallSide,
};
use crate::rng::Mulberry32;
use crate::settings::Settings;

/// Gap between the lowest brick row and the hazard band
const HAZARD_BAND_TOP_MARGIN: f32 = 40.0;
/// Gap between the hazard band and the paddle
const HAZARD_BAND_BOTTOM_MARGIN: f32 = 140.0;
/// Largest hit offset the autoplay bot aims for, leaving room for paddle lag
const BOT_MAX_AIM: f32 = 0.5;
/// Exit angle added per unit of incoming horizontal direction, in radians
const PADDLE_CARRY: f32 = 0.2;

/// Parameters of a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationRequest {
    pub seed: u32,
    /// 1-based
    pub round: u32,
    /// Simulated milliseconds to play at most
    pub duration_ms: f64,
    /// Drives input instead of the autoplay bot; its seed wins over `seed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<ReplayRecording>,
    /// Keep the event log in the result
    pub telemetry: bool,
}

impl Default for SimulationRequest {
    fn default() -> Self {
        Self {
            seed: 1,
            round: 1,
            duration_ms: 60_000.0,
            replay: None,
            telemetry: false,
        }
    }
}

/// Input commands for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// New paddle target x; `None` keeps the current target
    pub target_x: Option<f32>,
    /// Launch an attached ball
    pub launch: bool,
}

/// Deterministic fixed-step engine for one run
pub struct HeadlessEngine<W: PhysicsWorld = ArcadeWorld> {
    settings: Settings,
    world: W,
    rng: Mulberry32,
    seed: u32,
    round: u32,
    level_name: String,
    hazards: HazardRegistry,
    bricks: BTreeMap<BodyId, BrickState>,
    ball: Ball,
    paddle: Paddle,
    phase: GamePhase,
    lives: u32,
    scoring: ScoringState,
    metrics: RunMetrics,
    breakable_total: u32,
    bricks_remaining: u32,
    frame: u64,
    /// Time the ball has spent attached since the last launch or reattach
    serve_ms: f64,
    cursor: Option<ReplayCursor>,
    recorder: Option<ReplayRecorder>,
}

impl HeadlessEngine {
    /// Engine backed by the built-in [`ArcadeWorld`]
    pub fn new(seed: u32, round: u32, settings: Settings) -> Self {
        Self::with_world(ArcadeWorld::new(), seed, round, settings)
    }
}

impl<W: PhysicsWorld> HeadlessEngine<W> {
    /// Build the level for `round` into an empty `world`
    pub fn with_world(mut world: W, seed: u32, round: u32, settings: Settings) -> Self {
        let round = round.max(1);
        let mut rng = Mulberry32::new(seed);
        let level = level_for_round(round);
        let layout = generate_level_layout(&level, settings.layout_dims(), &mut rng, &settings.layout);

        spawn_bounds(&mut world, &settings);

        let mut bricks = BTreeMap::new();
        for placement in layout.bricks.iter().cloned() {
            let body = world.create_body(BodyDesc::brick(placement.center, brick_shape(&placement)));
            bricks.insert(
                body,
                BrickState {
                    hp: placement.hp,
                    placement,
                },
            );
        }

        let paddle_pos = Vec2::new(settings.playfield_width / 2.0, settings.paddle_y);
        let paddle_body = world.create_body(BodyDesc::paddle(
            paddle_pos,
            Vec2::new(settings.paddle_width, settings.paddle_height),
        ));
        let paddle = Paddle::new(
            paddle_body,
            paddle_pos.x,
            paddle_pos.y,
            settings.paddle_width,
            settings.paddle_height,
        );

        let offset = Ball::rest_offset(settings.ball_radius, settings.paddle_height);
        let ball_body = world.create_body(BodyDesc::ball(paddle_pos + offset, settings.ball_radius));
        world.attach(ball_body, paddle_body, offset);
        let ball = Ball {
            body: ball_body,
            radius: settings.ball_radius,
            state: BallState::Attached { offset },
        };

        let band = HazardBand {
            width: settings.playfield_width,
            min_y: layout.bottom_edge().unwrap_or(settings.brick_top_offset) + HAZARD_BAND_TOP_MARGIN,
            max_y: settings.paddle_y - HAZARD_BAND_BOTTOM_MARGIN,
        };
        let mut hazards = HazardRegistry::new();
        for descriptor in plan_hazards(round, &mut rng, band) {
            hazards.register(&mut world, descriptor);
        }

        let phase = if layout.breakable_count == 0 {
            log::warn!("Round {} has no breakable bricks", round);
            GamePhase::Cleared
        } else {
            GamePhase::Serve
        };

        log::info!(
            "Round {} ({}) seed {}: {} bricks ({} breakable), {} hazards",
            round,
            level.name,
            seed,
            bricks.len(),
            layout.breakable_count,
            hazards.len()
        );

        Self {
            lives: settings.starting_lives,
            settings,
            world,
            rng,
            seed,
            round,
            level_name: level.name.clone(),
            hazards,
            bricks,
            ball,
            paddle,
            phase,
            scoring: ScoringState::new(),
            metrics: RunMetrics::default(),
            breakable_total: layout.breakable_count,
            bricks_remaining: layout.breakable_count,
            frame: 0,
            serve_ms: 0.0,
            cursor: None,
            recorder: None,
        }
    }

    /// Drive input from `recording` instead of the autoplay bot
    ///
    /// The recording's seed does not reseed the engine; build the engine with
    /// it.
    pub fn attach_replay(&mut self, recording: &ReplayRecording) {
        self.cursor = Some(ReplayCursor::new(recording));
        self.recorder = None;
    }

    /// Capture autoplay inputs so the run can be replayed later
    pub fn start_recording(&mut self) {
        if self.cursor.is_none() {
            self.recorder = Some(ReplayRecorder::new(self.seed));
        }
    }

    pub fn take_recording(&mut self) -> Option<ReplayRecording> {
        self.recorder.take().map(ReplayRecorder::finish)
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn score(&self) -> u64 {
        self.scoring.score
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn bricks_remaining(&self) -> u32 {
        self.bricks_remaining
    }

    pub fn scoring(&self) -> &ScoringState {
        &self.scoring
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn hazards(&self) -> &HazardRegistry {
        &self.hazards
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn rng(&self) -> &Mulberry32 {
        &self.rng
    }

    /// Simulated time at the start of the next tick
    pub fn elapsed_ms(&self) -> f64 {
        self.frame as f64 * SIM_DT_MS
    }

    /// Advance one tick with input from the replay or the autoplay bot
    pub fn tick(&mut self, sink: &mut dyn EventSink) {
        if self.phase.is_terminal() {
            return;
        }
        let now_ms = self.elapsed_ms();
        let input = self.gather_input(now_ms);
        self.advance(input, now_ms, sink);
    }

    /// Advance one tick with explicit input, bypassing replay and autoplay
    pub fn tick_with_input(&mut self, input: TickInput, sink: &mut dyn EventSink) {
        if self.phase.is_terminal() {
            return;
        }
        let now_ms = self.elapsed_ms();
        self.advance(input, now_ms, sink);
    }

    /// Tick until `duration_ms` of simulated time has passed or the run ends
    pub fn run(&mut self, duration_ms: f64, sink: &mut dyn EventSink) {
        let target_frames = target_frames(duration_ms);
        while self.frame < target_frames && !self.phase.is_terminal() {
            self.tick(sink);
        }
        log::info!(
            "Run seed {} round {} ended {:?} after {} frames: score {}, {} lives left",
            self.seed,
            self.round,
            self.phase,
            self.frame,
            self.scoring.score,
            self.lives
        );
    }

    fn gather_input(&mut self, now_ms: f64) -> TickInput {
        let elapsed_seconds = now_ms / 1000.0;
        if let Some(cursor) = &mut self.cursor {
            let step = cursor.advance(elapsed_seconds, &mut self.rng);
            if step.seed_changes > 0 {
                log::debug!("Replay reseeded the RNG at {:.3}s", elapsed_seconds);
            }
            return TickInput {
                target_x: step.paddle_target.map(|p| p.x),
                launch: step.launch,
            };
        }

        // Autoplay: chase the free ball, hold still while serving
        let target_x = match self.ball.state {
            BallState::Free => self.world.position(self.ball.body).map(|pos| {
                let descending = self
                    .world
                    .velocity(self.ball.body)
                    .is_some_and(|v| v.y > 0.0);
                if descending {
                    pos.x - self.bot_aim(pos) * self.paddle.width / 2.0
                } else {
                    pos.x
                }
            }),
            BallState::Attached { .. } => None,
        };
        if let (Some(recorder), Some(x)) = (&mut self.recorder, target_x) {
            recorder.paddle_target(elapsed_seconds, Point { x, y: self.paddle.y });
        }
        TickInput {
            target_x,
            launch: false,
        }
    }

    /// Hit offset that sends the ball toward the breakable brick nearest in x
    ///
    /// Ties go to the lowest body id. Straight up when nothing is left.
    fn bot_aim(&self, ball_pos: Vec2) -> f32 {
        let max_angle = self.settings.max_bounce_angle;
        if max_angle.is_nan() || max_angle <= 0.0 {
            return 0.0;
        }
        let nearest = self
            .bricks
            .values()
            .filter(|b| b.placement.breakable)
            .min_by(|a, b| {
                let da = (a.placement.center.x - ball_pos.x).abs();
                let db = (b.placement.center.x - ball_pos.x).abs();
                da.total_cmp(&db)
            });
        let Some(brick) = nearest else {
            return 0.0;
        };
        let dx = brick.placement.center.x - ball_pos.x;
        let dy = (self.paddle.y - brick.placement.center.y).max(1.0);
        let aim = dx.atan2(dy) / max_angle;
        if aim.is_finite() {
            aim.clamp(-BOT_MAX_AIM, BOT_MAX_AIM)
        } else {
            0.0
        }
    }

    fn advance(&mut self, input: TickInput, now_ms: f64, sink: &mut dyn EventSink) {
        if self.ball.is_attached() {
            self.serve_ms += SIM_DT_MS;
            // Summed timesteps drift; allow a sliver of slack at the boundary
            if input.launch || self.serve_ms + 1e-9 >= self.settings.auto_launch_delay_ms {
                self.launch_ball(now_ms, sink);
            }
        }

        if let Some(x) = input.target_x {
            self.paddle.target_x = x;
        }
        self.paddle.follow(
            self.settings.paddle_responsiveness,
            self.settings.paddle_snap_threshold,
            self.settings.playfield_width,
        );
        self.world.set_position(self.paddle.body, self.paddle.position());
        self.world.sync_attachments();

        self.hazards.advance(&mut self.world, SIM_DT_MS);
        self.world.step(SIM_DT_MS);
        for contact in self.world.drain_contacts() {
            self.dispatch_contact(contact, now_ms, sink);
        }

        if !self.phase.is_terminal() && !self.ball.is_attached() {
            if let Some(vel) = self.world.velocity(self.ball.body) {
                let clamped = enforce_speed_envelope(
                    vel,
                    self.settings.base_speed,
                    self.settings.max_speed,
                    self.settings.min_vertical_speed,
                );
                self.world.set_velocity(self.ball.body, clamped);
            }
            self.check_life_lost(now_ms, sink);
        }

        let previous_combo = self.scoring.combo;
        if self.scoring.decay(&self.settings.scoring, SIM_DT_MS / 1000.0) {
            self.emit(sink, now_ms, GameEvent::ComboReset {
                previous: previous_combo,
            });
        }

        self.frame += 1;
    }

    fn launch_ball(&mut self, now_ms: f64, sink: &mut dyn EventSink) {
        let angle = self.rng.range(
            self.settings.launch_cone_min as f64,
            self.settings.launch_cone_max as f64,
        ) as f32;
        let sign = if self.rng.boolean() { 1.0 } else { -1.0 };
        let velocity = Vec2::new(sign * angle.sin(), -angle.cos()) * self.settings.launch_speed;

        self.world.detach(self.ball.body);
        self.world.set_velocity(self.ball.body, velocity);
        self.ball.state = BallState::Free;
        self.phase = GamePhase::Playing;
        self.serve_ms = 0.0;
        if let Some(recorder) = &mut self.recorder {
            recorder.launch(now_ms / 1000.0);
        }

        log::debug!("Ball launched at {:?} (frame {})", velocity, self.frame);
        self.emit(sink, now_ms, GameEvent::BallLaunched { velocity });
    }

    fn dispatch_contact(&mut self, contact: ContactPair, now_ms: f64, sink: &mut dyn EventSink) {
        let other = if contact.a == self.ball.body {
            contact.b
        } else if contact.b == self.ball.body {
            contact.a
        } else {
            return;
        };

        match self.world.label(other) {
            Some(BodyLabel::Brick) => self.hit_brick(other, now_ms, sink),
            Some(BodyLabel::Paddle) => self.bounce_off_paddle(now_ms, sink),
            // Falling out is a life loss, not a wall hit
            Some(BodyLabel::Wall(WallSide::Bottom)) => {}
            Some(BodyLabel::Wall(side)) => {
                self.metrics.wall_hits += 1;
                self.emit(sink, now_ms, GameEvent::WallHit { side });
            }
            Some(BodyLabel::Hazard) => self.touch_hazard(other, now_ms, sink),
            Some(BodyLabel::Ball) | None => {}
        }
    }

    fn hit_brick(&mut self, body: BodyId, now_ms: f64, sink: &mut dyn EventSink) {
        let impact_speed = self
            .world
            .velocity(self.ball.body)
            .map_or(0.0, |v| v.length());
        let Some(brick) = self.bricks.get_mut(&body) else {
            return;
        };

        let (row, col) = (brick.placement.row, brick.placement.col);
        brick.hp = brick.hp.saturating_sub(1);
        if !brick.placement.breakable {
            brick.hp = brick.hp.max(1);
        }
        if brick.hp > 0 {
            let hp_remaining = brick.hp;
            self.emit(sink, now_ms, GameEvent::BrickHit {
                brick: body,
                row,
                col,
                hp_remaining,
            });
            return;
        }

        self.bricks.remove(&body);
        self.world.remove_body(body);
        self.bricks_remaining = self.bricks_remaining.saturating_sub(1);
        self.metrics.bricks_broken += 1;

        let award = self.scoring.register_break(&self.settings.scoring, BreakContext {
            bricks_remaining: self.bricks_remaining,
            bricks_total: self.breakable_total,
            impact_speed,
            max_speed: self.settings.max_speed,
        });
        self.emit(sink, now_ms, GameEvent::BrickBreak {
            brick: body,
            row,
            col,
            points: award.points,
            combo: award.combo,
            impact_speed,
        });

        if self.bricks_remaining == 0 {
            self.phase = GamePhase::Cleared;
            self.world.set_velocity(self.ball.body, Vec2::ZERO);
            log::info!("Round {} cleared at frame {}", self.round, self.frame);
            self.emit(sink, now_ms, GameEvent::RoundCompleted {
                score: self.scoring.score,
            });
        }
    }

    fn bounce_off_paddle(&mut self, now_ms: f64, sink: &mut dyn EventSink) {
        let (Some(pos), Some(vel)) = (
            self.world.position(self.ball.body),
            self.world.velocity(self.ball.body),
        ) else {
            return;
        };
        let offset = self.paddle.hit_offset(pos.x);
        let velocity = paddle_bounce(
            offset,
            vel,
            self.settings.max_bounce_angle,
            self.settings.min_bounce_speed,
        );
        self.world.set_velocity(self.ball.body, velocity);
        self.metrics.paddle_hits += 1;
        self.emit(sink, now_ms, GameEvent::PaddleHit {
            offset,
            speed: velocity.length(),
        });
    }

    fn touch_hazard(&mut self, body: BodyId, now_ms: f64, sink: &mut dyn EventSink) {
        let Some(outcome) = self.hazards.handle_contact(
            &mut self.world,
            body,
            self.ball.body,
            self.ball.radius,
            now_ms,
        ) else {
            return;
        };

        self.metrics.hazard_contacts += 1;
        self.metrics.hazard_contacts_by_type.record(outcome.kind);
        match outcome.effect {
            HazardEffect::Impulse { .. } => self.metrics.moving_bumper_impacts += 1,
            HazardEffect::Teleport { .. } => self.metrics.portal_transports += 1,
            HazardEffect::None => {}
        }
        self.emit(sink, now_ms, GameEvent::HazardContact {
            hazard: body,
            kind: outcome.kind,
            triggered: outcome.triggered,
        });
    }

    fn check_life_lost(&mut self, now_ms: f64, sink: &mut dyn EventSink) {
        let Some(pos) = self.world.position(self.ball.body) else {
            return;
        };
        if pos.y <= self.settings.playfield_height {
            return;
        }

        self.lives = self.lives.saturating_sub(1);
        self.metrics.lives_lost += 1;
        let previous = self.scoring.reset_on_life_lost();
        if previous > 0 {
            self.emit(sink, now_ms, GameEvent::ComboReset { previous });
        }
        self.emit(sink, now_ms, GameEvent::LifeLost {
            lives_remaining: self.lives,
        });

        self.world.set_velocity(self.ball.body, Vec2::ZERO);
        if self.lives > 0 {
            let offset = Ball::rest_offset(self.ball.radius, self.paddle.height);
            self.world.attach(self.ball.body, self.paddle.body, offset);
            self.ball.state = BallState::Attached { offset };
            self.phase = GamePhase::Serve;
            self.serve_ms = 0.0;
            log::debug!("Life lost at frame {}, {} left", self.frame, self.lives);
        } else {
            self.phase = GamePhase::GameOver;
            log::debug!("Last life lost at frame {}", self.frame);
        }
    }

    fn emit(&self, sink: &mut dyn EventSink, now_ms: f64, event: GameEvent) {
        sink.publish(TimedEvent {
            frame: self.frame,
            time_ms: now_ms,
            event,
        });
    }

    /// Current session state
    pub fn snapshot(&self) -> SessionSnapshot {
        let position = self.world.position(self.ball.body).unwrap_or_default();
        let velocity = self.world.velocity(self.ball.body).unwrap_or_default();
        SessionSnapshot {
            phase: self.phase,
            level: self.level_name.clone(),
            round: self.round,
            score: self.scoring.score,
            lives: self.lives,
            combo: self.scoring.combo,
            bricks_remaining: self.bricks_remaining,
            breakable_total: self.breakable_total,
            elapsed_ms: self.elapsed_ms(),
            rng_draws: self.rng.draws(),
            ball: BallSnapshot {
                position,
                velocity,
                radius: self.ball.radius,
                attached: self.ball.is_attached(),
            },
            paddle: PaddleSnapshot {
                x: self.paddle.x,
                y: self.paddle.y,
                target_x: self.paddle.target_x,
                width: self.paddle.width,
                height: self.paddle.height,
            },
            momentum: self.scoring.momentum(
                &self.settings.scoring,
                velocity.length(),
                self.settings.max_speed,
                self.bricks_remaining,
                self.breakable_total,
            ),
        }
    }

    /// Package the run so far as a result
    ///
    /// `duration_ms` is the requested duration; the reported one is the
    /// simulated time actually played, capped at it.
    pub fn result(&self, duration_ms: f64, events: Vec<TimedEvent>) -> SimulationResult {
        let played_ms = (self.frame as f64 * SIM_DT_MS).min(sanitize_duration(duration_ms));
        let seconds = played_ms / 1000.0;

        let mut metrics = self.metrics.clone();
        if seconds > 0.0 {
            metrics.average_fps = self.frame as f64 / seconds;
            metrics.bricks_per_second = metrics.bricks_broken as f64 / seconds;
        }

        let outcome = match self.phase {
            GamePhase::Cleared => RunOutcome::Cleared,
            GamePhase::GameOver => RunOutcome::Failed,
            GamePhase::Serve | GamePhase::Playing => RunOutcome::DurationElapsed,
        };

        SimulationResult {
            session_id: session_id(self.seed, self.round),
            seed: self.seed,
            round: self.round,
            duration_ms: played_ms,
            frames: self.frame,
            outcome,
            metrics,
            volley: VolleyStats {
                longest_volley: self.scoring.longest_volley,
                average_impact_speed: self.scoring.average_impact_speed(),
            },
            events,
            score: self.scoring.score,
            snapshot: self.snapshot(),
            hazards: self.hazards.summaries(),
        }
    }
}

/// Run one simulation to completion
///
/// Settings and any attached replay are validated before the first tick.
/// The replay's seed replaces `request.seed`.
pub fn run_simulation(
    request: &SimulationRequest,
    settings: &Settings,
) -> Result<SimulationResult, SimulationError> {
    settings.validate()?;
    if let Some(replay) = &request.replay {
        replay.validate()?;
    }
    let seed = request.replay.as_ref().map_or(request.seed, |r| r.seed);
    let mut engine = HeadlessEngine::new(seed, request.round, settings.clone());
    if let Some(replay) = &request.replay {
        engine.attach_replay(replay);
    }
    Ok(play(&mut engine, request))
}

/// Run the autoplay bot and record its inputs
///
/// Any replay on the request is ignored. Feeding the returned recording back
/// through [`run_simulation`] reproduces the same result.
pub fn record_autoplay(
    request: &SimulationRequest,
    settings: &Settings,
) -> Result<(SimulationResult, ReplayRecording), SimulationError> {
    settings.validate()?;
    let mut engine = HeadlessEngine::new(request.seed, request.round, settings.clone());
    engine.start_recording();
    let result = play(&mut engine, request);
    let recording = engine
        .take_recording()
        .unwrap_or_else(|| ReplayRecording::new(request.seed));
    Ok((result, recording))
}

fn play<W: PhysicsWorld>(engine: &mut HeadlessEngine<W>, request: &SimulationRequest) -> SimulationResult {
    if request.telemetry {
        let mut log = EventLog::new();
        engine.run(request.duration_ms, &mut log);
        engine.result(request.duration_ms, log.into_events())
    } else {
        engine.run(request.duration_ms, &mut NullSink);
        engine.result(request.duration_ms, Vec::new())
    }
}

fn sanitize_duration(duration_ms: f64) -> f64 {
    if duration_ms.is_finite() {
        duration_ms.max(0.0)
    } else {
        0.0
    }
}

/// Ticks needed to cover `duration_ms`
pub fn target_frames(duration_ms: f64) -> u64 {
    (sanitize_duration(duration_ms) / SIM_DT_MS).round() as u64
}

/// Stable id for a (seed, round) pair
pub fn session_id(seed: u32, round: u32) -> String {
    let mut pcg = Pcg32::seed_from_u64(((seed as u64) << 32) | round as u64);
    format!("{:016x}", pcg.next_u64())
}

/// Exit velocity off the paddle
///
/// `offset` in [-1, 1] maps linearly onto [-max_angle, max_angle] from
/// vertical, and part of the incoming horizontal direction carries over.
/// Speed never drops below `min_speed`.
pub fn paddle_bounce(offset: f32, incoming: Vec2, max_angle: f32, min_speed: f32) -> Vec2 {
    let offset = if offset.is_finite() { offset.clamp(-1.0, 1.0) } else { 0.0 };
    let max_angle = if max_angle.is_finite() { max_angle.abs() } else { 0.0 };
    let incoming_speed = incoming.length();
    let (speed, carry) = if incoming_speed.is_finite() && incoming_speed > 1e-6 {
        (
            incoming_speed.max(min_speed),
            (incoming.x / incoming_speed) * PADDLE_CARRY,
        )
    } else {
        (min_speed, 0.0)
    };
    let angle = (offset * max_angle + carry).clamp(-max_angle, max_angle);
    Vec2::new(angle.sin(), -angle.cos()) * speed
}

/// Clamp speed into `[base, max]` and keep `|vy| >= min_vertical`
///
/// A stalled or non-finite ball is sent straight up at `base`.
pub fn enforce_speed_envelope(vel: Vec2, base: f32, max: f32, min_vertical: f32) -> Vec2 {
    if !vel.is_finite() || vel.length_squared() < 1e-8 {
        return Vec2::new(0.0, -base);
    }
    let mut v = clamp_speed(vel, base, max);
    if v.y.abs() < min_vertical {
        let speed = v.length();
        let vy = if v.y > 0.0 { min_vertical } else { -min_vertical };
        let vx = (speed * speed - vy * vy).max(0.0).sqrt();
        v = Vec2::new(vx.copysign(v.x), vy);
    }
    v
}

fn brick_shape(placement: &BrickPlacement) -> Shape {
    let half_extents = Vec2::new(placement.width, placement.height) / 2.0;
    match placement.form {
        BrickForm::Rectangle => Shape::Rect { half_extents },
        BrickForm::Circle => Shape::Circle {
            radius: half_extents.min_element(),
        },
        BrickForm::Diamond => Shape::Diamond { half_extents },
    }
}

/// Walls just outside the playfield; the bottom one only reports
fn spawn_bounds<W: PhysicsWorld>(world: &mut W, settings: &Settings) {
    let w = settings.playfield_width;
    let h = settings.playfield_height;
    let t = settings.wall_thickness;
    world.create_body(BodyDesc::wall(
        WallSide::Left,
        Vec2::new(-t / 2.0, h / 2.0),
        Vec2::new(t, h + 2.0 * t),
    ));
    world.create_body(BodyDesc::wall(
        WallSide::Right,
        Vec2::new(w + t / 2.0, h / 2.0),
        Vec2::new(t, h + 2.0 * t),
    ));
    world.create_body(BodyDesc::wall(
        WallSide::Top,
        Vec2::new(w / 2.0, -t / 2.0),
        Vec2::new(w + 2.0 * t, t),
    ));
    world.create_body(BodyDesc::wall(
        WallSide::Bottom,
        Vec2::new(w / 2.0, h + t / 2.0),
        Vec2::new(w + 2.0 * t, t),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReplayError, SettingsError};
    use crate::sim::replay::{ReplayAction, ReplayEvent};
    use proptest::prelude::*;

    fn request(seed: u32, round: u32, duration_ms: f64) -> SimulationRequest {
        SimulationRequest {
            seed,
            round,
            duration_ms,
            replay: None,
            telemetry: true,
        }
    }

    /// Tick once with a launch so the ball is free
    fn launched(seed: u32, round: u32) -> HeadlessEngine {
        let mut engine = HeadlessEngine::new(seed, round, Settings::default());
        engine.tick_with_input(
            TickInput {
                target_x: None,
                launch: true,
            },
            &mut NullSink,
        );
        assert!(!engine.ball.is_attached());
        engine
    }

    #[test]
    fn test_engine_builds_level() {
        let engine = HeadlessEngine::new(3, 4, Settings::default());
        assert_eq!(engine.phase(), GamePhase::Serve);
        assert_eq!(engine.hazards().len(), 3);
        assert!(engine.bricks_remaining() > 0);
        assert_eq!(engine.bricks_remaining(), engine.breakable_total);
        assert!(engine.ball.is_attached());
        assert_eq!(engine.lives(), Settings::default().starting_lives);
    }

    #[test]
    fn test_determinism() {
        let settings = Settings::default();
        let a = run_simulation(&request(42, 4, 8000.0), &settings).unwrap();
        let b = run_simulation(&request(42, 4, 8000.0), &settings).unwrap();
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert!(!a.events.is_empty());
    }

    #[test]
    fn test_seed_one_five_seconds() {
        let req = SimulationRequest {
            telemetry: false,
            ..request(1, 1, 5000.0)
        };
        let result = run_simulation(&req, &Settings::default()).unwrap();
        assert_eq!(result.outcome, RunOutcome::DurationElapsed);
        assert_eq!(result.frames, 600);
        assert_eq!(result.duration_ms, 5000.0);
        assert!(result.events.is_empty());
    }

    #[test]
    fn test_autoplay_keeps_breaking_bricks() {
        let result = run_simulation(&request(1, 1, 60_000.0), &Settings::default()).unwrap();
        let last_break = result
            .events
            .iter()
            .filter(|e| matches!(e.event, GameEvent::BrickBreak { .. }))
            .map(|e| e.time_ms)
            .fold(0.0, f64::max);
        assert!(
            result.outcome == RunOutcome::Cleared || last_break > 15_000.0,
            "last break at {last_break} ms, outcome {:?}",
            result.outcome
        );
    }

    #[test]
    fn test_bot_aims_toward_nearest_brick() {
        let mut engine = launched(5, 1);
        let ball = engine.ball.body;
        let half = engine.paddle.width / 2.0;

        // Every brick sits right of x = 20
        engine.world.set_position(ball, Vec2::new(20.0, 400.0));
        engine.world.set_velocity(ball, Vec2::new(0.0, 4.0));
        let target = engine.gather_input(100.0).target_x.unwrap();
        assert!(target < 20.0, "paddle leads left of the ball, got {target}");
        assert!(target >= 20.0 - BOT_MAX_AIM * half - 1e-4);

        engine.world.set_velocity(ball, Vec2::new(0.0, -4.0));
        assert_eq!(engine.gather_input(100.0).target_x, Some(20.0));
    }

    #[test]
    fn test_bot_aim_without_bricks_is_centered() {
        let mut engine = launched(5, 1);
        engine.bricks.clear();
        assert_eq!(engine.bot_aim(Vec2::new(20.0, 400.0)), 0.0);
    }

    #[test]
    fn test_auto_launch_after_delay() {
        let mut engine = HeadlessEngine::new(9, 1, Settings::default());
        let mut log = EventLog::new();
        let delay_ticks = (Settings::default().auto_launch_delay_ms / SIM_DT_MS).ceil() as u64;
        for _ in 0..delay_ticks - 1 {
            engine.tick(&mut log);
        }
        assert!(engine.ball.is_attached());
        engine.tick(&mut log);
        assert!(!engine.ball.is_attached());
        assert!(matches!(log.events()[0].event, GameEvent::BallLaunched { .. }));
    }

    #[test]
    fn test_life_loss_resets_combo_and_volley() {
        let mut engine = launched(5, 1);
        engine.scoring.combo = 3;
        engine.scoring.volley = 3;
        let ball = engine.ball.body;
        engine.world.set_position(ball, Vec2::new(400.0, 700.0));

        let mut log = EventLog::new();
        engine.tick_with_input(TickInput::default(), &mut log);

        assert_eq!(engine.scoring().combo, 0);
        assert_eq!(engine.scoring().volley, 0);
        assert_eq!(engine.lives(), 2);
        assert_eq!(engine.phase(), GamePhase::Serve);
        assert!(engine.ball.is_attached());
        let kinds: Vec<&GameEvent> = log.events().iter().map(|e| &e.event).collect();
        assert_eq!(kinds, vec![
            &GameEvent::ComboReset { previous: 3 },
            &GameEvent::LifeLost { lives_remaining: 2 },
        ]);
    }

    #[test]
    fn test_last_life_ends_run() {
        let mut engine = launched(5, 1);
        engine.lives = 1;
        engine.world.set_position(engine.ball.body, Vec2::new(400.0, 700.0));
        engine.tick_with_input(TickInput::default(), &mut NullSink);
        assert_eq!(engine.phase(), GamePhase::GameOver);

        let frames = engine.frame();
        engine.tick(&mut NullSink);
        assert_eq!(engine.frame(), frames);
        assert_eq!(engine.result(10_000.0, Vec::new()).outcome, RunOutcome::Failed);
    }

    #[test]
    fn test_paddle_bounce_contact() {
        let mut engine = launched(5, 1);
        let ball = engine.ball.body;
        engine.world.set_position(ball, Vec2::new(430.0, 544.0));
        engine.world.set_velocity(ball, Vec2::new(0.0, 4.0));
        engine.tick_with_input(TickInput::default(), &mut NullSink);

        assert_eq!(engine.metrics().paddle_hits, 1);
        let vel = engine.world.velocity(ball).unwrap();
        assert!(vel.x > 0.0, "right of center bounces right, got {vel:?}");
        assert!(vel.y < 0.0);
        assert!(vel.length() >= Settings::default().min_bounce_speed - 1e-3);
    }

    #[test]
    fn test_clearing_last_brick_completes_round() {
        let mut engine = launched(2, 1);
        let (&id, brick) = engine
            .bricks
            .iter()
            .filter(|(_, b)| b.placement.breakable)
            .max_by(|a, b| a.1.placement.center.y.total_cmp(&b.1.placement.center.y))
            .unwrap();
        let below = brick.placement.center
            + Vec2::new(0.0, brick.placement.height / 2.0 + engine.ball.radius + 1.0);
        engine.bricks.get_mut(&id).unwrap().hp = 1;
        engine.bricks_remaining = 1;
        let ball = engine.ball.body;
        engine.world.set_position(ball, below);
        engine.world.set_velocity(ball, Vec2::new(0.0, -4.0));

        let mut log = EventLog::new();
        engine.tick_with_input(TickInput::default(), &mut log);

        assert_eq!(engine.phase(), GamePhase::Cleared);
        assert!(!engine.world.contains(id));
        assert!(log
            .events()
            .iter()
            .any(|e| matches!(e.event, GameEvent::RoundCompleted { .. })));
        assert_eq!(engine.result(60_000.0, Vec::new()).outcome, RunOutcome::Cleared);
    }

    #[test]
    fn test_replay_reproduces_autoplay() {
        let settings = Settings::default();
        let (original, recording) = record_autoplay(&request(7, 3, 6000.0), &settings).unwrap();
        assert!(recording
            .events
            .iter()
            .any(|e| e.action == ReplayAction::Launch));

        let recording = ReplayRecording::from_json(&recording.to_json().unwrap()).unwrap();
        let replayed = run_simulation(
            &SimulationRequest {
                seed: 999,
                replay: Some(recording),
                ..request(7, 3, 6000.0)
            },
            &settings,
        )
        .unwrap();
        assert_eq!(original.to_json().unwrap(), replayed.to_json().unwrap());
    }

    #[test]
    fn test_malformed_replay_fails_before_any_tick() {
        let mut recording = ReplayRecording::new(1);
        recording.events.push(ReplayEvent {
            time: 2.0,
            action: ReplayAction::Launch,
        });
        recording.events.push(ReplayEvent {
            time: 1.0,
            action: ReplayAction::Launch,
        });
        let req = SimulationRequest {
            replay: Some(recording),
            ..request(1, 1, 1000.0)
        };
        assert!(matches!(
            run_simulation(&req, &Settings::default()),
            Err(SimulationError::Replay(ReplayError::OutOfOrder { index: 1, .. }))
        ));
    }

    #[test]
    fn test_invalid_settings_fail_before_any_tick() {
        let settings = Settings {
            base_speed: 20.0,
            ..Default::default()
        };
        assert!(matches!(
            run_simulation(&request(1, 1, 1000.0), &settings),
            Err(SimulationError::Settings(SettingsError::Invalid { field: "baseSpeed", .. }))
        ));
        assert!(record_autoplay(&request(1, 1, 1000.0), &settings).is_err());
    }

    #[test]
    fn test_speed_envelope() {
        let flat = enforce_speed_envelope(Vec2::new(10.0, 0.1), 7.5, 14.0, 2.4);
        assert!((flat.length() - 10.0).abs() < 1e-4);
        assert!((flat.y - 2.4).abs() < 1e-5);
        assert!(flat.x > 0.0);

        let fast = enforce_speed_envelope(Vec2::new(-30.0, -30.0), 7.5, 14.0, 2.4);
        assert!((fast.length() - 14.0).abs() < 1e-4);
        assert!(fast.x < 0.0 && fast.y < 0.0);

        assert_eq!(enforce_speed_envelope(Vec2::NAN, 7.5, 14.0, 2.4), Vec2::new(0.0, -7.5));

        let inverted = enforce_speed_envelope(Vec2::new(3.0, 4.0), 20.0, 14.0, 2.4);
        assert!((inverted.length() - 14.0).abs() < 1e-4);
    }

    #[test]
    fn test_paddle_bounce_angle() {
        let center = paddle_bounce(0.0, Vec2::new(0.0, 9.0), 1.0, 7.5);
        assert!((center - Vec2::new(0.0, -9.0)).length() < 1e-5);
        let edge = paddle_bounce(-1.0, Vec2::new(0.0, 2.0), 1.0, 7.5);
        assert!((edge.length() - 7.5).abs() < 1e-5);
        assert!(edge.x < 0.0 && edge.y < 0.0);
    }

    #[test]
    fn test_paddle_bounce_carries_incoming_direction() {
        let carried = paddle_bounce(0.0, Vec2::new(6.0, 8.0), 1.0, 7.5);
        assert!((carried.length() - 10.0).abs() < 1e-4);
        assert!(carried.x > 0.0 && carried.y < 0.0);
        assert!((carried.x / 10.0 - (0.6 * PADDLE_CARRY).sin()).abs() < 1e-5);

        // Carry never pushes past the edge angle
        let edge = paddle_bounce(1.0, Vec2::new(8.0, 6.0), 1.0, 7.5);
        assert!((edge.x / edge.length() - 1.0f32.sin()).abs() < 1e-5);
    }

    #[test]
    fn test_session_id_is_stable() {
        assert_eq!(session_id(1, 1), session_id(1, 1));
        assert_ne!(session_id(1, 1), session_id(1, 2));
        assert_eq!(session_id(5, 3).len(), 16);
        assert_eq!(target_frames(5000.0), 600);
        assert_eq!(target_frames(f64::NAN), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_same_request_same_result(
            seed in any::<u32>(),
            round in 1u32..=10,
            duration_ms in 500.0f64..2000.0,
        ) {
            let settings = Settings::default();
            let req = request(seed, round, duration_ms);
            let a = run_simulation(&req, &settings).unwrap().to_json().unwrap();
            let b = run_simulation(&req, &settings).unwrap().to_json().unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
