use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sync::{
    write_dirty_aspects, AspectTracker, CrySync, EntityAspects, Limits, NetworkSync, Profile,
    SyncContext, SyncResult, Vec3,
};

struct Vehicle {
    position: Vec3,
    velocity: Vec3,
    fuel: f32,
    gear: i8,
    driver: String,
}

impl Vehicle {
    fn new() -> Self {
        Self {
            position: Vec3::new(120.5, 8.0, -44.25),
            velocity: Vec3::new(3.0, 0.0, 1.5),
            fuel: 0.75,
            gear: 3,
            driver: "player_one".to_owned(),
        }
    }
}

impl NetworkSync for Vehicle {
    fn synchronize_with_network(
        &mut self,
        sync: &mut CrySync,
        aspect: EntityAspects,
        _profile: Profile,
        _flags: u32,
    ) -> SyncResult<()> {
        if aspect == EntityAspects::PHYSICS {
            sync.sync("position", &mut self.position)?;
            sync.sync_elided("velocity", &mut self.velocity, &Vec3::ZERO)?;
        } else if aspect == EntityAspects::GAME_SERVER_DYNAMIC {
            sync.sync("fuel", &mut self.fuel)?;
            sync.sync("gear", &mut self.gear)?;
        } else if aspect == EntityAspects::GAME_SERVER_STATIC {
            sync.sync("driver", &mut self.driver)?;
        }
        Ok(())
    }
}

fn bench_medium(c: &mut Criterion) {
    let mut vehicle = Vehicle::new();
    let mut tracker = AspectTracker::new();
    tracker.mark_dirty(
        EntityAspects::PHYSICS
            | EntityAspects::GAME_SERVER_DYNAMIC
            | EntityAspects::GAME_SERVER_STATIC,
    );

    let limits = Limits::default();
    c.bench_function("write_dirty_aspects", |b| {
        b.iter(|| {
            write_dirty_aspects(
                black_box(&mut vehicle),
                &tracker,
                SyncContext::Network,
                &limits,
                0,
            )
            .unwrap()
        });
    });

    let payloads =
        write_dirty_aspects(&mut vehicle, &tracker, SyncContext::Network, &limits, 0).unwrap();
    c.bench_function("read_aspects", |b| {
        b.iter(|| {
            for payload in &payloads {
                sync::read_aspect(black_box(&mut vehicle), payload, &limits, 0).unwrap();
            }
        });
    });
}

criterion_group!(benches, bench_medium);
criterion_main!(benches);
