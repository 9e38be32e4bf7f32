//! Per-frame queue that orders calls by their attachment.

use std::collections::BTreeMap;

use crate::dispatcher::{OutgoingCall, Transport};
use crate::flags::Attachment;
use crate::target::EntityId;

/// Calls attached to the aspect sync of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachedCalls {
    /// Delivered before the object's aspect sync.
    pub pre_attach: Vec<OutgoingCall>,
    /// Delivered after the object's aspect sync.
    pub post_attach: Vec<OutgoingCall>,
}

/// Calls of one frame grouped by delivery ordering.
///
/// A transport delivers `urgent` first, then per object
/// `pre_attach`, the aspect sync, `post_attach`, and `unattached` in any
/// position. Within each list, call order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FramePlan {
    pub urgent: Vec<OutgoingCall>,
    pub objects: BTreeMap<EntityId, AttachedCalls>,
    /// `NoAttach` and `Independent` calls.
    pub unattached: Vec<OutgoingCall>,
}

impl FramePlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.urgent.len()
            + self.unattached.len()
            + self
                .objects
                .values()
                .map(|calls| calls.pre_attach.len() + calls.post_attach.len())
                .sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A [`Transport`] that queues calls until the frame is taken.
#[derive(Debug, Default)]
pub struct FrameOutbox {
    queued: Vec<OutgoingCall>,
}

impl FrameOutbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Drains the queue into a plan for this frame.
    pub fn take_frame(&mut self) -> FramePlan {
        let mut plan = FramePlan::default();
        for call in self.queued.drain(..) {
            match call.flags.attachment() {
                Attachment::Urgent => plan.urgent.push(call),
                Attachment::PreAttach => plan
                    .objects
                    .entry(call.sender)
                    .or_default()
                    .pre_attach
                    .push(call),
                Attachment::PostAttach => plan
                    .objects
                    .entry(call.sender)
                    .or_default()
                    .post_attach
                    .push(call),
                Attachment::NoAttach | Attachment::Independent => plan.unattached.push(call),
            }
        }
        plan
    }

    /// Discards every pending call except `Independent` ones.
    ///
    /// Returns the number of calls discarded.
    pub fn flush_pending(&mut self) -> usize {
        let before = self.queued.len();
        self.queued
            .retain(|call| call.flags.attachment() == Attachment::Independent);
        let dropped = before - self.queued.len();
        if dropped > 0 {
            tracing::debug!(dropped, kept = self.queued.len(), "flushed pending rmi");
        }
        dropped
    }
}

impl Transport for FrameOutbox {
    fn send(&mut self, call: OutgoingCall) {
        self.queued.push(call);
    }
}
