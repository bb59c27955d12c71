// Persistent background-thread simulation engine with adaptive tick rate.
//
// Runs the step scheduler continuously instead of stepping once per HTTP
// request, and publishes a `Snapshot` after every tick over a broadcast
// channel so any number of WebSocket clients can subscribe without blocking
// the simulation loop itself.

use crate::boundary::WorldBounds;
use crate::config::Preset;
use crate::error::Result;
use crate::particle::{Particle, ParticleId};
use crate::scheduler::StepScheduler;
use crate::snapshot::Snapshot;
use crate::vector::Vec2;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

const FRAME_TIME_HISTORY_SIZE: usize = 100;
const ADAPTIVE_THRESHOLD: u32 = 50;
const MIN_TICK_HZ: f32 = 30.0;

pub struct SimEngine {
    scheduler: Arc<Mutex<StepScheduler>>,
    running: Arc<Mutex<bool>>,
    target_hz: Arc<Mutex<f32>>,
    frame_count: Arc<Mutex<u64>>,
    snapshots: broadcast::Sender<Snapshot>,
}

impl SimEngine {
    pub fn new(cell_size: f32, target_hz: f32) -> Self {
        let (snapshots, _rx) = broadcast::channel(64);
        Self {
            scheduler: Arc::new(Mutex::new(StepScheduler::new(cell_size))),
            running: Arc::new(Mutex::new(false)),
            target_hz: Arc::new(Mutex::new(target_hz)),
            frame_count: Arc::new(Mutex::new(0)),
            snapshots,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn add_particle(&self, particle: Particle) -> Result<ParticleId> {
        self.scheduler.lock().unwrap().add_particle(particle)
    }

    pub fn spawn_from_preset(&self, preset: &Preset) -> Result<Vec<ParticleId>> {
        self.scheduler.lock().unwrap().spawn_from_preset(preset)
    }

    pub fn add_bond(&self, a: ParticleId, b: ParticleId, stiffness: f32, damping: f32, rest_length: f32) -> bool {
        self.scheduler.lock().unwrap().add_bond(a, b, stiffness, damping, rest_length)
    }

    pub fn set_world_bounds(&self, bounds: WorldBounds) {
        self.scheduler.lock().unwrap().set_world_bounds(bounds);
    }

    pub fn set_gravity(&self, gravity: Vec2) {
        self.scheduler.lock().unwrap().set_gravity(gravity);
    }

    pub fn clear(&self) {
        self.scheduler.lock().unwrap().clear();
    }

    pub fn snapshot(&self) -> Snapshot {
        self.scheduler.lock().unwrap().snapshot()
    }

    /// Forces an extra step outside the background loop's own cadence (used
    /// by the demo server's manual `/api/step`). Publishes the resulting
    /// snapshot to subscribers just like a scheduled tick would.
    pub fn step_once(&self, dt: f32) -> Snapshot {
        let snapshot = {
            let mut scheduler = self.scheduler.lock().unwrap();
            scheduler.step(dt);
            scheduler.snapshot()
        };
        let _ = self.snapshots.send(snapshot.clone());
        snapshot
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    pub fn frame_count(&self) -> u64 {
        *self.frame_count.lock().unwrap()
    }

    /// Spawns the tick loop on a dedicated OS thread. Idempotent: calling
    /// `start` twice is a no-op, matching the teacher engine's behaviour.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap();
        if *running {
            warn!("simulation engine already running");
            return;
        }
        *running = true;

        let initial_hz = *self.target_hz.lock().unwrap();
        info!(hz = initial_hz, "starting persistent simulation engine");

        let scheduler = Arc::clone(&self.scheduler);
        let running_flag = Arc::clone(&self.running);
        let target_hz = Arc::clone(&self.target_hz);
        let frame_count = Arc::clone(&self.frame_count);
        let snapshots = self.snapshots.clone();

        std::thread::spawn(move || {
            let mut frame_times: Vec<Duration> = Vec::with_capacity(FRAME_TIME_HISTORY_SIZE);
            let mut consecutive_delays: u32 = 0;

            loop {
                let start = Instant::now();
                if !*running_flag.lock().unwrap() {
                    info!("simulation engine stopping");
                    break;
                }

                let hz = *target_hz.lock().unwrap();
                let dt = 1.0 / hz;
                let target_duration = Duration::from_secs_f32(dt);

                let snapshot = {
                    let mut sched = scheduler.lock().unwrap();
                    sched.step(dt);
                    sched.snapshot()
                };
                let _ = snapshots.send(snapshot);

                *frame_count.lock().unwrap() += 1;

                let elapsed = start.elapsed();
                frame_times.push(elapsed);
                if frame_times.len() > FRAME_TIME_HISTORY_SIZE {
                    frame_times.remove(0);
                }

                if elapsed > target_duration {
                    consecutive_delays += 1;
                    if consecutive_delays >= ADAPTIVE_THRESHOLD {
                        let mut hz_guard = target_hz.lock().unwrap();
                        let new_hz = (*hz_guard * 0.9).max(MIN_TICK_HZ);
                        if (new_hz - *hz_guard).abs() > 1.0 {
                            *hz_guard = new_hz;
                            info!(new_hz, "reducing tick rate due to sustained overrun");
                            consecutive_delays = 0;
                        }
                    }
                } else {
                    consecutive_delays = 0;
                }

                if elapsed < target_duration {
                    std::thread::sleep(target_duration - elapsed);
                }
            }
        });
    }

    pub fn stop(&self) {
        *self.running.lock().unwrap() = false;
    }
}
