//! Per-aspect serialization driven by an [`AspectTracker`].

use wire::{Limits, SyncContext};

use crate::aspects::{AspectTracker, EntityAspects, Profile};
use crate::error::SyncResult;
use crate::medium::CrySync;

/// An object that serializes its state one aspect at a time.
pub trait NetworkSync {
    /// Synchronizes the fields belonging to `aspect` using the layout chosen
    /// by `profile`.
    ///
    /// Called once per single-bit aspect, for writing and for reading.
    fn synchronize_with_network(
        &mut self,
        sync: &mut CrySync,
        aspect: EntityAspects,
        profile: Profile,
        flags: u32,
    ) -> SyncResult<()>;
}

/// Encoded state of one aspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AspectPayload {
    pub aspect: EntityAspects,
    pub profile: Profile,
    pub bytes: Vec<u8>,
}

/// Outcome of replaying one aspect payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectReceipt {
    pub aspect: EntityAspects,
    /// The payload was incomplete; the sender should resynchronize this aspect.
    pub partial: bool,
}

/// Serializes every dirty aspect of `object`, lowest bit first.
///
/// Each payload is checked against `limits`, which should match the
/// receiver's [`read_aspect`] limits. The tracker is not modified; clear the
/// sent aspects once the transport accepted them.
pub fn write_dirty_aspects<O: NetworkSync + ?Sized>(
    object: &mut O,
    tracker: &AspectTracker,
    context: SyncContext,
    limits: &Limits,
    flags: u32,
) -> SyncResult<Vec<AspectPayload>> {
    let dirty = tracker.dirty();
    let mut payloads = Vec::with_capacity(dirty.raw().count_ones() as usize);
    for aspect in dirty.iter() {
        let profile = tracker.profile(aspect);
        let mut sync = CrySync::writer_with_limits(context, limits);
        object.synchronize_with_network(&mut sync, aspect, profile, flags)?;
        let bytes = sync.finish()?;
        tracing::trace!(?aspect, profile = profile.raw(), len = bytes.len(), "aspect serialized");
        payloads.push(AspectPayload {
            aspect,
            profile,
            bytes,
        });
    }
    Ok(payloads)
}

/// Replays one aspect payload into `object`.
///
/// A payload that cannot be decoded leaves the object untouched and is
/// reported as partial. Errors raised by the object's own sync code are
/// returned.
pub fn read_aspect<O: NetworkSync + ?Sized>(
    object: &mut O,
    payload: &AspectPayload,
    limits: &Limits,
    flags: u32,
) -> SyncResult<AspectReceipt> {
    let mut sync = match CrySync::reader(&payload.bytes, limits) {
        Ok(sync) => sync,
        Err(err) => {
            tracing::warn!(aspect = ?payload.aspect, %err, "dropping undecodable aspect payload");
            return Ok(AspectReceipt {
                aspect: payload.aspect,
                partial: true,
            });
        }
    };
    object.synchronize_with_network(&mut sync, payload.aspect, payload.profile, flags)?;
    if sync.is_partial() {
        tracing::debug!(aspect = ?payload.aspect, "aspect received partially");
    }
    Ok(AspectReceipt {
        aspect: payload.aspect,
        partial: sync.is_partial(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::value::Vec3;

    #[derive(Debug, Default, PartialEq)]
    struct Barrel {
        pos: Vec3,
        health: u16,
        label: String,
        calls: Vec<EntityAspects>,
    }

    impl NetworkSync for Barrel {
        fn synchronize_with_network(
            &mut self,
            sync: &mut CrySync,
            aspect: EntityAspects,
            profile: Profile,
            _flags: u32,
        ) -> SyncResult<()> {
            self.calls.push(aspect);
            if aspect == EntityAspects::PHYSICS {
                if profile == Profile::DEFAULT {
                    sync.sync("pos", &mut self.pos)?;
                } else {
                    sync.sync("x", &mut self.pos.x)?;
                }
            } else if aspect == EntityAspects::SCRIPT {
                sync.sync("health", &mut self.health)?;
                sync.sync("label", &mut self.label)?;
            }
            Ok(())
        }
    }

    #[test]
    fn writes_dirty_aspects_in_bit_order() {
        let mut object = Barrel {
            pos: Vec3::new(1.0, 2.0, 3.0),
            health: 40,
            label: "box".into(),
            ..Barrel::default()
        };
        let mut tracker = AspectTracker::new();
        tracker.mark_dirty(EntityAspects::PHYSICS | EntityAspects::SCRIPT);

        let payloads = write_dirty_aspects(
            &mut object,
            &tracker,
            SyncContext::Network,
            &Limits::default(),
            0,
        )
        .unwrap();
        assert_eq!(
            object.calls,
            vec![EntityAspects::SCRIPT, EntityAspects::PHYSICS]
        );
        assert_eq!(payloads.len(), 2);
        assert_eq!(tracker.dirty(), EntityAspects::SCRIPT | EntityAspects::PHYSICS);

        let mut remote = Barrel::default();
        for payload in &payloads {
            let receipt = read_aspect(&mut remote, payload, &Limits::default(), 0).unwrap();
            assert!(!receipt.partial);
        }
        assert_eq!(remote.pos, object.pos);
        assert_eq!(remote.health, 40);
        assert_eq!(remote.label, "box");
    }

    #[test]
    fn profile_selects_layout() {
        let mut object = Barrel {
            pos: Vec3::new(7.0, 8.0, 9.0),
            ..Barrel::default()
        };
        let mut tracker = AspectTracker::new();
        tracker.mark_dirty(EntityAspects::PHYSICS);
        tracker
            .set_profile(EntityAspects::PHYSICS, Profile::new(1).unwrap())
            .unwrap();

        let payloads = write_dirty_aspects(
            &mut object,
            &tracker,
            SyncContext::Network,
            &Limits::default(),
            0,
        )
        .unwrap();
        let mut remote = Barrel::default();
        read_aspect(&mut remote, &payloads[0], &Limits::default(), 0).unwrap();
        assert_eq!(remote.pos, Vec3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn clean_tracker_writes_nothing() {
        let mut object = Barrel::default();
        let payloads = write_dirty_aspects(
            &mut object,
            &AspectTracker::new(),
            SyncContext::Network,
            &Limits::default(),
            0,
        )
        .unwrap();
        assert!(payloads.is_empty());
        assert!(object.calls.is_empty());
    }

    struct Nested {
        levels: usize,
    }

    impl NetworkSync for Nested {
        fn synchronize_with_network(
            &mut self,
            sync: &mut CrySync,
            _aspect: EntityAspects,
            _profile: Profile,
            _flags: u32,
        ) -> SyncResult<()> {
            for level in 0..self.levels {
                sync.begin_group(&format!("l{level}"))?;
            }
            for _ in 0..self.levels {
                sync.end_group()?;
            }
            Ok(())
        }
    }

    #[test]
    fn aspects_beyond_receiver_limits_fail_to_write() {
        let mut tracker = AspectTracker::new();
        tracker.mark_dirty(EntityAspects::SCRIPT);
        let limits = Limits::default();

        let err = write_dirty_aspects(
            &mut Nested { levels: 40 },
            &tracker,
            SyncContext::Network,
            &limits,
            0,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SyncError::LimitExceeded {
                kind: wire::LimitKind::GroupDepth,
                limit: 32,
                actual: 33,
            }
        ));

        let payloads = write_dirty_aspects(
            &mut Nested { levels: 32 },
            &tracker,
            SyncContext::Network,
            &limits,
            0,
        )
        .unwrap();
        let receipt = read_aspect(&mut Nested { levels: 32 }, &payloads[0], &limits, 0).unwrap();
        assert!(!receipt.partial);
    }

    #[test]
    fn corrupt_payload_reports_partial() {
        let mut remote = Barrel::default();
        let payload = AspectPayload {
            aspect: EntityAspects::SCRIPT,
            profile: Profile::DEFAULT,
            bytes: vec![0xFF; 3],
        };
        let receipt = read_aspect(&mut remote, &payload, &Limits::default(), 0).unwrap();
        assert!(receipt.partial);
        assert!(remote.calls.is_empty());
    }
}
