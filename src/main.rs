// Demo server: a thin axum/WebSocket wrapper around the persistent
// simulation engine. Not a deployment target in its own right -- just
// enough surface to drive and observe the physics core interactively.

use axum::{
    extract::{State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use physics_core::broadcast::BroadcastState;
use physics_core::boundary::WorldBounds;
use physics_core::config::MaterialKind;
use physics_core::engine::SimEngine;
use physics_core::particle::{BoundaryPolicy, CollisionParams, ComponentBag, DynamicsParams, GravityParams, Particle, ParticleId, Shape, Tint};
use physics_core::vector::Vec2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Clone)]
struct AppState {
    engine: Arc<SimEngine>,
}

#[derive(Deserialize, Debug)]
struct SpawnRequest {
    x: f32,
    y: f32,
    #[serde(default)]
    vx: f32,
    #[serde(default)]
    vy: f32,
    #[serde(default = "default_mass")]
    mass: f32,
    #[serde(default = "default_radius")]
    radius: f32,
    #[serde(default)]
    material: MaterialKind,
    #[serde(default)]
    is_static: bool,
}

fn default_mass() -> f32 {
    1.0
}

fn default_radius() -> f32 {
    0.05
}

#[derive(Serialize)]
struct SpawnResponse {
    id: u64,
}

#[derive(Deserialize, Debug)]
struct BondRequest {
    a: u64,
    b: u64,
    stiffness: f32,
    #[serde(default)]
    damping: f32,
    rest_length: f32,
}

#[derive(Serialize)]
struct BondResponse {
    created: bool,
}

#[derive(Deserialize, Debug)]
struct StepRequest {
    #[serde(default = "default_dt")]
    dt: f32,
}

fn default_dt() -> f32 {
    1.0 / 60.0
}

#[derive(Serialize)]
struct StepResponse {
    tick: u64,
    particle_count: usize,
}

#[derive(Deserialize, Debug)]
struct BoundsRequest {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
}

#[derive(Deserialize, Debug)]
struct GravityRequest {
    x: f32,
    y: f32,
}

#[derive(Serialize)]
struct Ack {
    ok: bool,
}

async fn health() -> &'static str {
    "OK"
}

async fn spawn(
    State(state): State<AppState>,
    Json(request): Json<SpawnRequest>,
) -> Result<Json<SpawnResponse>, StatusCode> {
    let is_sph = matches!(request.material, MaterialKind::Fluid | MaterialKind::Granular);
    let is_fluid = matches!(request.material, MaterialKind::Fluid);

    let particle = Particle {
        id: ParticleId(0),
        position: Vec2::new(request.x, request.y),
        velocity: Vec2::new(request.vx, request.vy),
        angular_velocity: 0.0,
        orientation: 0.0,
        mass: request.mass,
        shape: Shape::Circle { radius: request.radius },
        tint: Tint::default(),
        components: ComponentBag {
            gravity: Some(GravityParams::default()),
            collision: Some(CollisionParams {
                is_static: request.is_static,
                is_fluid,
                sph_integrated: is_sph,
                ..Default::default()
            }),
            dynamics: Some(DynamicsParams { sph_solver: is_sph, pressure_radius: request.radius, ..Default::default() }),
            boundary: Some(BoundaryPolicy::BounceAndClamp),
        },
    };

    let id = state
        .engine
        .add_particle(particle)
        .map_err(|e| {
            warn!(error = %e, "rejected spawn request");
            StatusCode::BAD_REQUEST
        })?;
    Ok(Json(SpawnResponse { id: id.0 }))
}

async fn bond(
    State(state): State<AppState>,
    Json(request): Json<BondRequest>,
) -> Json<BondResponse> {
    let created = state.engine.add_bond(
        ParticleId(request.a),
        ParticleId(request.b),
        request.stiffness,
        request.damping,
        request.rest_length,
    );
    Json(BondResponse { created })
}

async fn step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Json<StepResponse> {
    let snapshot = state.engine.step_once(request.dt);
    Json(StepResponse { tick: snapshot.tick(), particle_count: snapshot.len() })
}

async fn set_bounds(State(state): State<AppState>, Json(request): Json<BoundsRequest>) -> Json<Ack> {
    state.engine.set_world_bounds(WorldBounds {
        left: request.left,
        right: request.right,
        top: request.top,
        bottom: request.bottom,
    });
    Json(Ack { ok: true })
}

async fn set_gravity(State(state): State<AppState>, Json(request): Json<GravityRequest>) -> Json<Ack> {
    state.engine.set_gravity(Vec2::new(request.x, request.y));
    Json(Ack { ok: true })
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> axum::response::Response {
    let rx = state.engine.subscribe();
    info!("new websocket connection request");
    ws.on_upgrade(|socket| async move {
        handle_websocket(socket, rx).await;
        info!("websocket connection closed");
    })
}

async fn handle_websocket(
    socket: axum::extract::ws::WebSocket,
    mut rx: tokio::sync::broadcast::Receiver<physics_core::Snapshot>,
) {
    use axum::extract::ws::Message;
    use futures_util::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                recv = rx.recv() => {
                    match recv {
                        Ok(snapshot) => {
                            let Ok(encoded) = BroadcastState::encode(&snapshot) else { continue };
                            let mut message = Vec::with_capacity(12 + encoded.data.len());
                            message.extend_from_slice(&encoded.tick.to_le_bytes());
                            message.extend_from_slice(&(encoded.particle_count as u32).to_le_bytes());
                            message.extend_from_slice(&encoded.data);
                            if sender.send(Message::Binary(message)).await.is_err() {
                                warn!("failed to send websocket message, connection closed");
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "websocket client lagged behind the tick broadcast");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            warn!("broadcast channel closed");
                            break;
                        }
                    }
                }
                incoming = receiver.next() => {
                    match incoming {
                        Some(Ok(Message::Close(_))) | None => {
                            info!("websocket client closed connection");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "websocket receive error");
                            break;
                        }
                    }
                }
            }
        }
    });

    send_task.await.ok();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let engine = Arc::new(SimEngine::new(0.5, 120.0));
    engine.start();
    info!("simulation engine started");

    let state = AppState { engine };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/spawn", post(spawn))
        .route("/api/bond", post(bond))
        .route("/api/step", post(step))
        .route("/api/bounds", post(set_bounds))
        .route("/api/gravity", post(set_gravity))
        .route("/ws", get(websocket_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
    info!("physics-core demo server listening on http://0.0.0.0:3001");
    info!("  GET  /health");
    info!("  POST /api/spawn");
    info!("  POST /api/bond");
    info!("  POST /api/step");
    info!("  POST /api/bounds");
    info!("  POST /api/gravity");
    info!("  WS   /ws");

    axum::serve(listener, app).await?;

    Ok(())
}
