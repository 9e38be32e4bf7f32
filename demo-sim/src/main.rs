use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rmi::{
    Attachment, CarrierRegistry, ChannelId, Dispatcher, EntityId, FrameOutbox, FramePlan,
    InvokeError, MethodDescriptor, MethodRegistry, NetworkedObject, OutgoingCall, RmiConfig,
    RmiFlags, RmiParameters, RmiTarget, Role,
};
use serde::Serialize;
use sync::{
    read_aspect, write_dirty_aspects, AspectPayload, AspectTracker, CrySync, EntityAspects,
    NetworkSync, Profile, SyncResult, Synchronizable, Vec3,
};
use tools::{dump_payload, summarize};
use tracing_subscriber::EnvFilter;
use wire::{Limits, SyncContext};

/// Channel of the single simulated client.
const CLIENT_CHANNEL: ChannelId = ChannelId::new(1);
const BOUNDS: f32 = 200.0;
const MAX_HEALTH: u8 = 100;
const MAX_BOOST: f32 = 8.0;
/// Physics profile used while a vehicle stands still: position only.
const PARKED: u8 = 1;
const SPAWN_ASPECTS: EntityAspects = EntityAspects::from_raw(
    EntityAspects::SCRIPT.raw()
        | EntityAspects::PHYSICS.raw()
        | EntityAspects::GAME_SERVER_DYNAMIC.raw(),
);

#[derive(Parser)]
#[command(
    name = "demo-sim",
    version,
    about = "Deterministic client/server loopback over crysync"
)]
struct Cli {
    /// Number of simulated vehicles.
    #[arg(long, default_value_t = 8)]
    vehicles: u32,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 300)]
    ticks: u32,
    /// RNG seed for deterministic results.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// The client boosts its vehicles every N ticks.
    #[arg(long, default_value_t = 7)]
    boost_every: u32,
    /// The server broadcasts an announcement every N ticks.
    #[arg(long, default_value_t = 25)]
    announce_every: u32,
    /// Simulate a connection hiccup that flushes pending calls every N ticks.
    #[arg(long)]
    hiccup_every: Option<u32>,
    /// Optional output directory for aspect payloads and the summary.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Some(out_dir) = &cli.out_dir {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("create output dir {}", out_dir.display()))?;
    }

    let mut rng = Rng::new(cli.seed);
    let vehicles = spawn_vehicles(cli.vehicles, &mut rng);
    let mut server = Peer::new(Role::Server, FrameOutbox::new(), vehicles)?;
    let mirrors = server
        .vehicles
        .iter()
        .map(|vehicle| Vehicle::mirror(vehicle.id, vehicle.owner))
        .collect();
    let mut client = Peer::new(Role::Client, Vec::new(), mirrors)?;
    let limits = Limits::default();
    let mut summary = Summary::new(&cli);

    for tick in 1..=cli.ticks {
        if cli.boost_every > 0 && tick % cli.boost_every == 0 {
            client_boosts(&mut client, &mut rng)?;
        }
        deliver_to_server(&mut client, &mut server, &mut summary);

        step_vehicles(&mut server, &mut rng, tick)?;
        if !server.vehicles.is_empty() && rng.next_u32() % 4 == 0 {
            let index = rng.next_u32() as usize % server.vehicles.len();
            server.send(index, "Honk", RmiTarget::TO_ALL_CLIENTS, None)?;
            summary.honks_sent += 1;
        }
        if !server.vehicles.is_empty() && cli.announce_every > 0 && tick % cli.announce_every == 0
        {
            let mut announcement = Announcement {
                text: format!("tick {tick}"),
            };
            server.send(
                0,
                "Announce",
                RmiTarget::TO_ALL_CLIENTS,
                Some(&mut announcement),
            )?;
        }
        if cli.hiccup_every.is_some_and(|every| every > 0 && tick % every == 0) {
            summary.rmi_flushed += server.dispatcher.transport_mut().flush_pending() as u64;
        }

        let plan = server.dispatcher.transport_mut().take_frame();
        let payloads = server_write_aspects(
            &mut server,
            tick,
            &limits,
            cli.out_dir.as_deref(),
            &mut summary,
        )?;
        let resync = deliver_frame(plan, payloads, &mut client, &limits, &mut summary)?;
        for (id, aspect) in resync {
            if let Some(vehicle) = server.find(id) {
                vehicle.aspects.mark_dirty(aspect);
            }
        }
    }

    verify_mirrors(&server.vehicles, &client.vehicles)?;
    summary.finalize();
    summary.check_deliveries()?;

    let json = serde_json::to_string_pretty(&summary).context("serialize summary")?;
    if let Some(out_dir) = &cli.out_dir {
        let path = out_dir.join("summary.json");
        fs::write(&path, &json).with_context(|| format!("write {}", path.display()))?;
    }
    println!("{json}");
    Ok(())
}

#[derive(Debug, Default)]
struct Vehicle {
    id: u32,
    owner: i32,
    label: String,
    pos: Vec3,
    vel: Vec3,
    health: u8,
    last_hit: u32,
    aspects: AspectTracker,
    honks: u32,
    respawns: Vec<Vec3>,
    announcements: Vec<String>,
}

impl Vehicle {
    fn mirror(id: u32, owner: i32) -> Self {
        Self {
            id,
            owner,
            ..Self::default()
        }
    }

    fn spawn_point(id: u32) -> Vec3 {
        Vec3::new(id as f32 * 10.0, 0.0, 0.0)
    }
}

impl NetworkedObject for Vehicle {
    fn network_id(&self) -> EntityId {
        EntityId::new(self.id)
    }

    fn owner_channel(&self) -> ChannelId {
        ChannelId::new(self.owner)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl NetworkSync for Vehicle {
    fn synchronize_with_network(
        &mut self,
        sync: &mut CrySync,
        aspect: EntityAspects,
        profile: Profile,
        _flags: u32,
    ) -> SyncResult<()> {
        if aspect == EntityAspects::SCRIPT {
            sync.sync("label", &mut self.label)?;
        } else if aspect == EntityAspects::PHYSICS {
            sync.sync("pos", &mut self.pos)?;
            if profile.raw() == PARKED {
                if sync.is_reading() {
                    self.vel = Vec3::ZERO;
                }
            } else {
                sync.sync("vel", &mut self.vel)?;
            }
        } else if aspect == EntityAspects::GAME_SERVER_DYNAMIC {
            sync.sync("health", &mut self.health)?;
            if sync.begin_optional_group("damage", self.last_hit != 0)? {
                sync.sync("last_hit", &mut self.last_hit)?;
                sync.end_group()?;
            } else if sync.is_reading() {
                self.last_hit = 0;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Boost {
    amount: f32,
}

impl Synchronizable for Boost {
    fn synchronize(&mut self, sync: &mut CrySync) -> SyncResult<()> {
        sync.sync_or("amount", &mut self.amount, 1.0)
    }
}

impl RmiParameters for Boost {
    const TYPE_NAME: &'static str = "Boost";
}

#[derive(Debug, Default)]
struct Respawn {
    position: Vec3,
}

impl Synchronizable for Respawn {
    fn synchronize(&mut self, sync: &mut CrySync) -> SyncResult<()> {
        sync.sync("position", &mut self.position)
    }
}

impl RmiParameters for Respawn {
    const TYPE_NAME: &'static str = "Respawn";
}

#[derive(Debug, Default)]
struct Announcement {
    text: String,
}

impl Synchronizable for Announcement {
    fn synchronize(&mut self, sync: &mut CrySync) -> SyncResult<()> {
        sync.sync("text", &mut self.text)
    }
}

impl RmiParameters for Announcement {
    const TYPE_NAME: &'static str = "Announcement";
}

fn vehicle_methods() -> Result<MethodRegistry> {
    let mut methods = MethodRegistry::new();
    methods.register(
        MethodDescriptor::of::<Vehicle>("Boost")
            .marker(RmiFlags::new(Attachment::NoAttach, true, false, true))
            .invoke_with(|vehicle: &mut Vehicle, params: &Boost| {
                if !(0.0..=MAX_BOOST).contains(&params.amount) {
                    return Err(InvokeError::new(format!("boost {} out of range", params.amount)));
                }
                vehicle.vel.x += params.amount;
                vehicle.aspects.mark_dirty(EntityAspects::PHYSICS);
                Ok(true)
            }),
    )?;
    methods.register(
        MethodDescriptor::of::<Vehicle>("Honk")
            .marker(RmiFlags::new(Attachment::PreAttach, false, true, false))
            .invoke(|vehicle: &mut Vehicle| {
                vehicle.honks += 1;
                Ok(true)
            }),
    )?;
    // Post-attach: the physics aspect of the same frame has already landed.
    methods.register(
        MethodDescriptor::of::<Vehicle>("Respawn")
            .marker(RmiFlags::new(Attachment::PostAttach, false, false, false))
            .invoke_with(|vehicle: &mut Vehicle, params: &Respawn| {
                vehicle.respawns.push(params.position);
                Ok(vehicle.pos == params.position)
            }),
    )?;
    methods.register(
        MethodDescriptor::of::<Vehicle>("Announce")
            .marker(RmiFlags::new(Attachment::Independent, false, false, true))
            .invoke_with(|vehicle: &mut Vehicle, params: &Announcement| {
                vehicle.announcements.push(params.text.clone());
                Ok(true)
            }),
    )?;
    Ok(methods)
}

fn vehicle_carriers() -> Result<CarrierRegistry> {
    let mut carriers = CarrierRegistry::new();
    carriers.register::<Boost>()?;
    carriers.register::<Respawn>()?;
    carriers.register::<Announcement>()?;
    Ok(carriers)
}

/// One side of the loopback: its dispatcher and its view of the world.
struct Peer<T: rmi::Transport> {
    dispatcher: Dispatcher<T>,
    vehicles: Vec<Vehicle>,
}

impl<T: rmi::Transport> Peer<T> {
    fn new(role: Role, transport: T, vehicles: Vec<Vehicle>) -> Result<Self> {
        let dispatcher = Dispatcher::new(
            RmiConfig::new(role),
            vehicle_methods()?,
            vehicle_carriers()?,
            transport,
        );
        Ok(Self {
            dispatcher,
            vehicles,
        })
    }

    fn find(&mut self, id: EntityId) -> Option<&mut Vehicle> {
        self.vehicles
            .iter_mut()
            .find(|vehicle| vehicle.id == id.raw())
    }

    /// Calls `method` on the vehicle at `index`.
    fn send(
        &mut self,
        index: usize,
        method: &str,
        target: RmiTarget,
        carrier: Option<&mut dyn rmi::Carrier>,
    ) -> Result<()> {
        let vehicle = self
            .vehicles
            .get(index)
            .with_context(|| format!("no vehicle at index {index}"))?;
        self.dispatcher
            .call_remote(vehicle, method, target, carrier, ChannelId::NONE)
            .with_context(|| format!("call {method} on vehicle {}", vehicle.id))?;
        Ok(())
    }
}

fn spawn_vehicles(count: u32, rng: &mut Rng) -> Vec<Vehicle> {
    (1..=count)
        .map(|id| {
            let mut vehicle = Vehicle {
                id,
                owner: (id % 2 + 1) as i32,
                label: format!("vehicle-{id}"),
                pos: Vehicle::spawn_point(id),
                vel: Vec3::new(rng.range_f32(-2.0, 2.0), 0.0, rng.range_f32(-2.0, 2.0)),
                health: MAX_HEALTH,
                ..Vehicle::default()
            };
            vehicle.aspects.mark_dirty(SPAWN_ASPECTS);
            vehicle
        })
        .collect()
}

fn client_boosts(client: &mut Peer<Vec<OutgoingCall>>, rng: &mut Rng) -> Result<()> {
    let Peer {
        dispatcher,
        vehicles,
    } = client;
    for vehicle in vehicles
        .iter()
        .filter(|vehicle| ChannelId::new(vehicle.owner) == CLIENT_CHANNEL)
    {
        let mut boost = Boost {
            amount: rng.range_f32(0.0, MAX_BOOST),
        };
        dispatcher
            .call_remote(
                vehicle,
                "Boost",
                RmiTarget::TO_SERVER,
                Some(&mut boost),
                ChannelId::NONE,
            )
            .with_context(|| format!("boost vehicle {}", vehicle.id))?;
    }
    Ok(())
}

fn deliver_to_server(
    client: &mut Peer<Vec<OutgoingCall>>,
    server: &mut Peer<FrameOutbox>,
    summary: &mut Summary,
) {
    let Peer {
        dispatcher,
        vehicles,
    } = server;
    for call in client.dispatcher.transport_mut().drain(..) {
        summary.rmi_sent += 1;
        let Some(vehicle) = vehicles.iter_mut().find(|v| v.id == call.sender.raw()) else {
            summary.rmi_dropped += 1;
            continue;
        };
        if dispatcher.on_remote_call_received(vehicle, &call.into()) {
            summary.rmi_delivered += 1;
        } else {
            summary.rmi_rejected += 1;
        }
    }
}

fn step_vehicles(server: &mut Peer<FrameOutbox>, rng: &mut Rng, tick: u32) -> Result<()> {
    let parked = Profile::new(PARKED)?;
    let Peer {
        dispatcher,
        vehicles,
    } = server;
    for vehicle in vehicles.iter_mut() {
        match rng.next_u32() % 16 {
            0 => vehicle.vel = Vec3::ZERO,
            1 => vehicle.vel = Vec3::new(rng.range_f32(-3.0, 3.0), 0.0, rng.range_f32(-3.0, 3.0)),
            _ => {}
        }
        if vehicle.vel != Vec3::ZERO {
            vehicle.pos = Vec3::new(
                bounce(vehicle.pos.x + vehicle.vel.x, &mut vehicle.vel.x),
                vehicle.pos.y,
                bounce(vehicle.pos.z + vehicle.vel.z, &mut vehicle.vel.z),
            );
            vehicle.aspects.mark_dirty(EntityAspects::PHYSICS);
        }

        if rng.next_u32() % 10 == 0 {
            let damage = (1 + rng.next_u32() % 30) as u8;
            vehicle.health = vehicle.health.saturating_sub(damage);
            vehicle.last_hit = tick;
            vehicle.aspects.mark_dirty(EntityAspects::GAME_SERVER_DYNAMIC);
        }

        if vehicle.health == 0 {
            vehicle.health = MAX_HEALTH;
            vehicle.last_hit = 0;
            vehicle.pos = Vehicle::spawn_point(vehicle.id);
            vehicle.vel = Vec3::ZERO;
            vehicle
                .aspects
                .mark_dirty(EntityAspects::PHYSICS | EntityAspects::GAME_SERVER_DYNAMIC);
            let mut respawn = Respawn {
                position: vehicle.pos,
            };
            dispatcher
                .call_remote(
                    &*vehicle,
                    "Respawn",
                    RmiTarget::TO_OWN_CLIENT,
                    Some(&mut respawn),
                    ChannelId::NONE,
                )
                .with_context(|| format!("respawn vehicle {}", vehicle.id))?;
            tracing::debug!(vehicle = vehicle.id, tick, "vehicle respawned");
        }

        let profile = if vehicle.vel == Vec3::ZERO {
            parked
        } else {
            Profile::DEFAULT
        };
        vehicle.aspects.set_profile(EntityAspects::PHYSICS, profile)?;
    }
    Ok(())
}

fn bounce(value: f32, vel: &mut f32) -> f32 {
    if value.abs() > BOUNDS {
        *vel = -*vel;
        value.clamp(-BOUNDS, BOUNDS)
    } else {
        value
    }
}

fn server_write_aspects(
    server: &mut Peer<FrameOutbox>,
    tick: u32,
    limits: &Limits,
    out_dir: Option<&Path>,
    summary: &mut Summary,
) -> Result<BTreeMap<EntityId, Vec<AspectPayload>>> {
    let mut frame = BTreeMap::new();
    for vehicle in &mut server.vehicles {
        let tracker = vehicle.aspects.clone();
        if tracker.dirty().is_empty() {
            continue;
        }
        let payloads = write_dirty_aspects(vehicle, &tracker, SyncContext::Network, limits, 0)
            .with_context(|| format!("serialize vehicle {}", vehicle.id))?;
        vehicle.aspects.clear(tracker.dirty());
        for payload in &payloads {
            let dump = dump_payload(&payload.bytes, limits)
                .with_context(|| format!("inspect aspect payload of vehicle {}", vehicle.id))?;
            summary.push_aspect(payload.bytes.len() as u64, summarize(&dump).fields as u64);
            if let Some(out_dir) = out_dir {
                let aspect = payload.aspect.name().unwrap_or("aspect");
                let path = out_dir.join(format!("tick_{tick:06}_e{}_{aspect}.bin", vehicle.id));
                write_payload(&path, &payload.bytes)?;
            }
        }
        frame.insert(vehicle.network_id(), payloads);
    }
    Ok(frame)
}

fn write_payload(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}

/// Delivers one server frame to the client in attachment order.
///
/// Returns the aspects that arrived partially and must be sent again.
fn deliver_frame(
    plan: FramePlan,
    mut payloads: BTreeMap<EntityId, Vec<AspectPayload>>,
    client: &mut Peer<Vec<OutgoingCall>>,
    limits: &Limits,
    summary: &mut Summary,
) -> Result<Vec<(EntityId, EntityAspects)>> {
    let FramePlan {
        urgent,
        mut objects,
        unattached,
    } = plan;
    let mut resync = Vec::new();

    for call in urgent {
        deliver_to_client(client, call, summary);
    }

    let ids: BTreeSet<EntityId> = objects.keys().chain(payloads.keys()).copied().collect();
    for id in ids {
        let attached = objects.remove(&id).unwrap_or_default();
        for call in attached.pre_attach {
            deliver_to_client(client, call, summary);
        }
        if let Some(vehicle) = client.find(id) {
            for payload in payloads.remove(&id).unwrap_or_default() {
                let receipt = read_aspect(vehicle, &payload, limits, 0)
                    .with_context(|| format!("apply aspect to vehicle {id}"))?;
                if receipt.partial {
                    summary.partial_receipts += 1;
                    resync.push((id, receipt.aspect));
                }
            }
        }
        for call in attached.post_attach {
            deliver_to_client(client, call, summary);
        }
    }

    for call in unattached {
        deliver_to_client(client, call, summary);
    }
    Ok(resync)
}

fn deliver_to_client(client: &mut Peer<Vec<OutgoingCall>>, call: OutgoingCall, summary: &mut Summary) {
    summary.rmi_sent += 1;
    let Peer {
        dispatcher,
        vehicles,
    } = client;
    let Some(vehicle) = vehicles.iter_mut().find(|v| v.id == call.sender.raw()) else {
        summary.rmi_dropped += 1;
        return;
    };
    if !reaches_client(&call, vehicle.owner_channel(), CLIENT_CHANNEL) {
        summary.rmi_routed_elsewhere += 1;
        return;
    }
    if dispatcher.on_remote_call_received(vehicle, &call.into()) {
        summary.rmi_delivered += 1;
    } else {
        summary.rmi_rejected += 1;
    }
}

fn reaches_client(call: &OutgoingCall, owner: ChannelId, client: ChannelId) -> bool {
    let target = call.target;
    if target.contains(RmiTarget::NO_REMOTE_CALLS) {
        return false;
    }
    target.contains(RmiTarget::TO_ALL_CLIENTS)
        || (target.contains(RmiTarget::TO_OWN_CLIENT) && owner == client)
        || (target.contains(RmiTarget::TO_OTHER_CLIENTS) && owner != client)
        || (target.contains(RmiTarget::TO_CLIENT_CHANNEL) && call.channel == client)
}

fn verify_mirrors(server: &[Vehicle], client: &[Vehicle]) -> Result<()> {
    for (authority, mirror) in server.iter().zip(client) {
        let matches = authority.label == mirror.label
            && authority.pos == mirror.pos
            && authority.vel == mirror.vel
            && authority.health == mirror.health
            && authority.last_hit == mirror.last_hit;
        if !matches {
            anyhow::bail!(
                "vehicle {} diverged: server {:?}/{:?}/{} client {:?}/{:?}/{}",
                authority.id,
                authority.pos,
                authority.vel,
                authority.health,
                mirror.pos,
                mirror.vel,
                mirror.health
            );
        }
    }
    Ok(())
}

struct Rng {
    state: u64,
}

impl Rng {
    const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        (self.state >> 32) as u32
    }

    /// Uniform in `[min, max]` on a 1/256 grid so positions stay exact.
    fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        let steps = ((max - min) * 256.0) as u32 + 1;
        min + (self.next_u32() % steps) as f32 / 256.0
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    vehicles: u32,
    ticks: u32,
    seed: u64,
    hiccup_every: Option<u32>,
    aspect_payloads: u64,
    aspect_bytes_total: u64,
    aspect_fields_total: u64,
    avg_aspect_bytes: u64,
    p95_aspect_bytes: u64,
    partial_receipts: u64,
    honks_sent: u64,
    rmi_sent: u64,
    rmi_delivered: u64,
    rmi_rejected: u64,
    rmi_dropped: u64,
    rmi_routed_elsewhere: u64,
    rmi_flushed: u64,
    #[serde(skip)]
    aspect_sizes: Vec<u64>,
}

impl Summary {
    fn new(cli: &Cli) -> Self {
        Self {
            vehicles: cli.vehicles,
            ticks: cli.ticks,
            seed: cli.seed,
            hiccup_every: cli.hiccup_every,
            aspect_payloads: 0,
            aspect_bytes_total: 0,
            aspect_fields_total: 0,
            avg_aspect_bytes: 0,
            p95_aspect_bytes: 0,
            partial_receipts: 0,
            honks_sent: 0,
            rmi_sent: 0,
            rmi_delivered: 0,
            rmi_rejected: 0,
            rmi_dropped: 0,
            rmi_routed_elsewhere: 0,
            rmi_flushed: 0,
            aspect_sizes: Vec::new(),
        }
    }

    fn push_aspect(&mut self, bytes: u64, fields: u64) {
        self.aspect_payloads += 1;
        self.aspect_fields_total += fields;
        self.aspect_bytes_total += bytes;
        self.aspect_sizes.push(bytes);
    }

    fn finalize(&mut self) {
        if self.aspect_sizes.is_empty() {
            return;
        }
        self.avg_aspect_bytes = self.aspect_bytes_total / self.aspect_payloads;
        self.aspect_sizes.sort_unstable();
        let idx = ((self.aspect_sizes.len() as f64) * 0.95).ceil() as usize;
        let idx = idx.saturating_sub(1).min(self.aspect_sizes.len() - 1);
        self.p95_aspect_bytes = self.aspect_sizes[idx];
    }

    /// Every routed call must have been accepted by its receiver.
    fn check_deliveries(&self) -> Result<()> {
        if self.rmi_rejected > 0 || self.rmi_dropped > 0 {
            anyhow::bail!(
                "{} remote calls rejected, {} dropped",
                self.rmi_rejected,
                self.rmi_dropped
            );
        }
        Ok(())
    }
}
