//! The bidirectional sync medium.

use std::collections::{HashMap, HashSet};

use wire::{
    decode_payload, encode_payload, FieldValue, LimitKind, Limits, PayloadHeader, Record,
    SyncContext,
};

use crate::error::{SyncError, SyncResult};
use crate::value::SyncValue;

/// Name of the single field inside the group written by [`CrySync::sync_elided`].
const ELIDED_FIELD: &str = "value";

/// State that can describe itself to a [`CrySync`] medium.
///
/// The same `synchronize` call sequence is used for writing and for reading;
/// the medium decides the direction.
pub trait Synchronizable {
    fn synchronize(&mut self, sync: &mut CrySync) -> SyncResult<()>;
}

/// A sync cursor bound to one writing or one reading pass.
///
/// Writing records every call as a named record; [`CrySync::finish`] encodes
/// them. Reading decodes a payload up front and answers each call by name
/// within the current group, so field order within a group does not matter.
///
/// Calls that are wrong on the local side (bad names, unbalanced groups,
/// output the receiving [`Limits`] would reject) return [`SyncError`]. Data missing or mismatched in an incoming payload is
/// logged and reported through [`CrySync::is_partial`].
#[derive(Debug)]
pub struct CrySync {
    context: SyncContext,
    limits: Limits,
    partial: bool,
    mode: Mode,
}

#[derive(Debug)]
enum Mode {
    Writing(WriteState),
    Reading(ReadState),
}

#[derive(Debug)]
struct WriteState {
    records: Vec<Record>,
    scopes: Vec<Scope>,
}

#[derive(Debug, Default)]
struct Scope {
    fields: HashSet<String>,
    groups: HashSet<String>,
}

/// Decoded payload as an arena of groups; index 0 is the root.
#[derive(Debug)]
struct ReadState {
    groups: Vec<GroupNode>,
    stack: Vec<usize>,
}

#[derive(Debug, Default)]
struct GroupNode {
    fields: HashMap<String, FieldValue>,
    children: HashMap<String, usize>,
}

impl CrySync {
    /// Creates a writing medium with default limits.
    #[must_use]
    pub fn writer(context: SyncContext) -> Self {
        Self::writer_with_limits(context, &Limits::default())
    }

    /// Creates a writing medium whose output is checked against `limits`.
    ///
    /// Use the limits the receiving side decodes with; anything it would
    /// reject fails here instead.
    #[must_use]
    pub fn writer_with_limits(context: SyncContext, limits: &Limits) -> Self {
        Self {
            context,
            limits: limits.clone(),
            partial: false,
            mode: Mode::Writing(WriteState {
                records: Vec::new(),
                scopes: vec![Scope::default()],
            }),
        }
    }

    /// Creates a reading medium over an encoded payload.
    ///
    /// Fails only when the payload cannot be decoded at all.
    pub fn reader(bytes: &[u8], limits: &Limits) -> SyncResult<Self> {
        let payload = decode_payload(bytes, limits)?;
        let mut partial = false;
        let groups = build_tree(payload.records, &mut partial);
        Ok(Self {
            context: payload.header.context,
            limits: limits.clone(),
            partial,
            mode: Mode::Reading(ReadState {
                groups,
                stack: vec![0],
            }),
        })
    }

    #[must_use]
    pub const fn context(&self) -> SyncContext {
        self.context
    }

    #[must_use]
    pub const fn is_reading(&self) -> bool {
        matches!(self.mode, Mode::Reading(_))
    }

    #[must_use]
    pub const fn is_writing(&self) -> bool {
        matches!(self.mode, Mode::Writing(_))
    }

    /// Number of currently open groups.
    #[must_use]
    pub fn depth(&self) -> usize {
        match &self.mode {
            Mode::Writing(state) => state.scopes.len() - 1,
            Mode::Reading(state) => state.stack.len() - 1,
        }
    }

    /// Synchronizes a single value.
    ///
    /// Reading leaves `value` untouched when the name is absent.
    pub fn sync<T: SyncValue>(&mut self, name: &str, value: &mut T) -> SyncResult<()> {
        self.check_name(name)?;
        if let Mode::Writing(state) = &mut self.mode {
            return state.push_field(name, value.to_field(), &self.limits);
        }
        if let Some(found) = self.lookup::<T>(name) {
            *value = found;
        }
        Ok(())
    }

    /// Synchronizes a single value, assigning `default` on read when absent.
    pub fn sync_or<T: SyncValue>(&mut self, name: &str, value: &mut T, default: T) -> SyncResult<()> {
        self.check_name(name)?;
        if let Mode::Writing(state) = &mut self.mode {
            return state.push_field(name, value.to_field(), &self.limits);
        }
        *value = self.lookup::<T>(name).unwrap_or(default);
        Ok(())
    }

    /// Synchronizes a value inside an optional group that is only written when
    /// `value != default`.
    ///
    /// A value equal to its default costs nothing on the wire; the reader
    /// assigns `default` when the group is absent.
    pub fn sync_elided<T>(&mut self, name: &str, value: &mut T, default: &T) -> SyncResult<()>
    where
        T: SyncValue + PartialEq + Clone,
    {
        let differs = *value != *default;
        if self.begin_optional_group(name, differs)? {
            self.sync(ELIDED_FIELD, value)?;
            self.end_group()
        } else {
            if self.is_reading() {
                *value = default.clone();
            }
            Ok(())
        }
    }

    /// Opens a named group unconditionally.
    ///
    /// Reading a group that is absent logs, signals partial reception and
    /// enters an empty group so the caller's sequence stays balanced.
    pub fn begin_group(&mut self, name: &str) -> SyncResult<()> {
        self.check_name(name)?;
        match &mut self.mode {
            Mode::Writing(state) => state.open_group(name, &self.limits),
            Mode::Reading(state) => {
                if !state.enter(name) {
                    tracing::warn!(group = name, "expected group missing from payload");
                    state.enter_empty();
                    self.partial = true;
                }
                Ok(())
            }
        }
    }

    /// Opens a group only if it is (or will be) present.
    ///
    /// Writing emits the group iff `condition` and returns `condition`.
    /// Reading ignores `condition` and returns whether the group arrived.
    /// Callers must call [`CrySync::end_group`] only when this returns `true`.
    pub fn begin_optional_group(&mut self, name: &str, condition: bool) -> SyncResult<bool> {
        self.check_name(name)?;
        match &mut self.mode {
            Mode::Writing(state) => {
                if condition {
                    state.open_group(name, &self.limits)?;
                }
                Ok(condition)
            }
            Mode::Reading(state) => Ok(state.enter(name)),
        }
    }

    /// Closes the innermost open group.
    pub fn end_group(&mut self) -> SyncResult<()> {
        match &mut self.mode {
            Mode::Writing(state) => {
                if state.scopes.len() == 1 {
                    return Err(SyncError::UnbalancedGroup);
                }
                state.scopes.pop();
                state.records.push(Record::GroupEnd);
            }
            Mode::Reading(state) => {
                if state.stack.len() == 1 {
                    return Err(SyncError::UnbalancedGroup);
                }
                state.stack.pop();
            }
        }
        Ok(())
    }

    /// Synchronizes a nested object inside a group named `name`.
    pub fn sync_object<T: Synchronizable>(&mut self, name: &str, value: &mut T) -> SyncResult<()> {
        self.begin_group(name)?;
        value.synchronize(self)?;
        self.end_group()
    }

    /// Synchronizes a nested object, eliding it entirely when it equals
    /// `default`.
    pub fn sync_object_or<T>(&mut self, name: &str, value: &mut T, default: &T) -> SyncResult<()>
    where
        T: Synchronizable + PartialEq + Clone,
    {
        let differs = *value != *default;
        if self.begin_optional_group(name, differs)? {
            value.synchronize(self)?;
            self.end_group()
        } else {
            if self.is_reading() {
                *value = default.clone();
            }
            Ok(())
        }
    }

    /// Marks the received data as incomplete so a resync can be scheduled.
    ///
    /// Advisory only; the pass continues.
    pub fn signal_partial_reception(&mut self) {
        if !self.partial {
            tracing::debug!(context = ?self.context, "partial reception signalled");
        }
        self.partial = true;
    }

    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.partial
    }

    /// Encodes the records of a writing pass.
    pub fn finish(self) -> SyncResult<Vec<u8>> {
        match self.mode {
            Mode::Writing(state) => {
                let depth = state.scopes.len() - 1;
                if depth != 0 {
                    return Err(SyncError::GroupsStillOpen { depth });
                }
                let header = PayloadHeader::new(self.context);
                let bytes = encode_payload(&header, &state.records)?;
                check_limit(
                    LimitKind::PayloadBytes,
                    self.limits.max_payload_bytes,
                    bytes.len(),
                )?;
                Ok(bytes)
            }
            Mode::Reading(_) => Err(SyncError::WrongDirection {
                operation: "finish",
                direction: "reading",
            }),
        }
    }

    fn check_name(&self, name: &str) -> SyncResult<()> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(SyncError::InvalidName {
                name: name.to_owned(),
            });
        }
        if name.len() > self.limits.max_name_len {
            return Err(SyncError::NameTooLong {
                name: name.to_owned(),
                len: name.len(),
                limit: self.limits.max_name_len,
            });
        }
        Ok(())
    }

    fn lookup<T: SyncValue>(&mut self, name: &str) -> Option<T> {
        let Mode::Reading(state) = &self.mode else {
            return None;
        };
        let value = state.current().fields.get(name)?.clone();
        let found = value.kind();
        let converted = T::from_field(value);
        if converted.is_none() {
            tracing::warn!(
                field = name,
                expected = T::KIND.name(),
                found = found.name(),
                "field kind mismatch, treating as absent"
            );
            self.signal_partial_reception();
        }
        converted
    }
}

impl WriteState {
    fn scope(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Group ends not yet written; each still needs a record.
    fn pending_ends(&self) -> usize {
        self.scopes.len() - 1
    }

    fn reserve_records(&self, adding: usize, limits: &Limits) -> SyncResult<()> {
        let total = self.records.len() + self.pending_ends() + adding;
        check_limit(LimitKind::RecordCount, limits.max_records, total)
    }

    fn push_field(&mut self, name: &str, value: FieldValue, limits: &Limits) -> SyncResult<()> {
        let blob_len = match &value {
            FieldValue::Str(text) => Some(text.len()),
            FieldValue::Bytes(bytes) => Some(bytes.len()),
            _ => None,
        };
        if let Some(len) = blob_len {
            check_limit(LimitKind::BlobLength, limits.max_blob_len, len)?;
        }
        self.reserve_records(1, limits)?;
        if !self.scope().fields.insert(name.to_owned()) {
            return Err(SyncError::DuplicateName {
                name: name.to_owned(),
            });
        }
        self.records.push(Record::Field {
            name: name.to_owned(),
            value,
        });
        Ok(())
    }

    fn open_group(&mut self, name: &str, limits: &Limits) -> SyncResult<()> {
        check_limit(
            LimitKind::GroupDepth,
            limits.max_group_depth,
            self.pending_ends() + 1,
        )?;
        self.reserve_records(2, limits)?;
        if !self.scope().groups.insert(name.to_owned()) {
            return Err(SyncError::DuplicateName {
                name: name.to_owned(),
            });
        }
        self.records.push(Record::GroupBegin {
            name: name.to_owned(),
        });
        self.scopes.push(Scope::default());
        Ok(())
    }
}

impl ReadState {
    fn current_index(&self) -> usize {
        self.stack.last().copied().unwrap_or(0)
    }

    fn current(&self) -> &GroupNode {
        &self.groups[self.current_index()]
    }

    fn enter(&mut self, name: &str) -> bool {
        match self.current().children.get(name).copied() {
            Some(child) => {
                self.stack.push(child);
                true
            }
            None => false,
        }
    }

    fn enter_empty(&mut self) {
        self.groups.push(GroupNode::default());
        self.stack.push(self.groups.len() - 1);
    }
}

fn check_limit(kind: LimitKind, limit: usize, actual: usize) -> SyncResult<()> {
    if actual > limit {
        return Err(SyncError::LimitExceeded {
            kind,
            limit,
            actual,
        });
    }
    Ok(())
}

/// Builds the group arena from a balanced record list.
fn build_tree(records: Vec<Record>, partial: &mut bool) -> Vec<GroupNode> {
    let mut groups = vec![GroupNode::default()];
    let mut stack = vec![0usize];
    for record in records {
        let current = stack.last().copied().unwrap_or(0);
        match record {
            Record::Field { name, value } => {
                if groups[current].fields.contains_key(&name) {
                    tracing::warn!(field = %name, "duplicate field in payload, keeping last");
                    *partial = true;
                }
                groups[current].fields.insert(name, value);
            }
            Record::GroupBegin { name } => {
                groups.push(GroupNode::default());
                let child = groups.len() - 1;
                if groups[current].children.insert(name.clone(), child).is_some() {
                    tracing::warn!(group = %name, "duplicate group in payload, keeping last");
                    *partial = true;
                }
                stack.push(child);
            }
            Record::GroupEnd => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Vec3;

    fn roundtrip(write: impl FnOnce(&mut CrySync) -> SyncResult<()>) -> CrySync {
        let mut writer = CrySync::writer(SyncContext::Network);
        write(&mut writer).unwrap();
        let bytes = writer.finish().unwrap();
        CrySync::reader(&bytes, &Limits::for_testing()).unwrap()
    }

    #[test]
    fn fields_roundtrip_by_name() {
        let mut reader = roundtrip(|s| {
            s.sync("health", &mut 75u8)?;
            s.sync("pos", &mut Vec3::new(1.0, 2.0, 3.0))
        });
        assert!(reader.is_reading());
        assert_eq!(reader.context(), SyncContext::Network);

        let mut pos = Vec3::ZERO;
        let mut health = 0u8;
        reader.sync("pos", &mut pos).unwrap();
        reader.sync("health", &mut health).unwrap();
        assert_eq!(pos, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(health, 75);
        assert!(!reader.is_partial());
    }

    #[test]
    fn missing_field_leaves_value_or_assigns_default() {
        let mut reader = roundtrip(|_| Ok(()));
        let mut a = 9i32;
        reader.sync("a", &mut a).unwrap();
        assert_eq!(a, 9);

        let mut b = 9i32;
        reader.sync_or("b", &mut b, 4).unwrap();
        assert_eq!(b, 4);
        assert!(!reader.is_partial());
    }

    #[test]
    fn kind_mismatch_is_partial_and_absent() {
        let mut reader = roundtrip(|s| s.sync("speed", &mut 3.5f32));
        let mut speed = 1u32;
        reader.sync_or("speed", &mut speed, 0).unwrap();
        assert_eq!(speed, 0);
        assert!(reader.is_partial());
    }

    #[test]
    fn invalid_names_rejected_in_both_directions() {
        let mut writer = CrySync::writer(SyncContext::Network);
        for name in ["", "two words", "tab\tname"] {
            assert!(matches!(
                writer.sync(name, &mut 0u8),
                Err(SyncError::InvalidName { .. })
            ));
        }
        let mut reader = roundtrip(|_| Ok(()));
        assert!(matches!(
            reader.begin_group(" "),
            Err(SyncError::InvalidName { .. })
        ));
    }

    #[test]
    fn long_names_rejected() {
        let mut writer = CrySync::writer_with_limits(SyncContext::Network, &Limits::for_testing());
        let name = "n".repeat(33);
        assert!(matches!(
            writer.sync(&name, &mut 0u8),
            Err(SyncError::NameTooLong { len: 33, limit: 32, .. })
        ));
    }

    #[test]
    fn duplicate_names_rejected_per_group() {
        let mut writer = CrySync::writer(SyncContext::Network);
        writer.sync("x", &mut 1u8).unwrap();
        assert!(matches!(
            writer.sync("x", &mut 2u8),
            Err(SyncError::DuplicateName { .. })
        ));
        writer.begin_group("inner").unwrap();
        writer.sync("x", &mut 3u8).unwrap();
        writer.end_group().unwrap();
        assert!(matches!(
            writer.begin_group("inner"),
            Err(SyncError::DuplicateName { .. })
        ));
    }

    #[test]
    fn nested_groups_scope_names() {
        let mut reader = roundtrip(|s| {
            s.sync("x", &mut 1u16)?;
            s.begin_group("a")?;
            s.sync("x", &mut 2u16)?;
            s.begin_group("b")?;
            s.sync("x", &mut 3u16)?;
            s.end_group()?;
            s.end_group()
        });

        let mut outer = 0u16;
        let mut mid = 0u16;
        let mut inner = 0u16;
        reader.begin_group("a").unwrap();
        reader.begin_group("b").unwrap();
        reader.sync("x", &mut inner).unwrap();
        reader.end_group().unwrap();
        reader.sync("x", &mut mid).unwrap();
        reader.end_group().unwrap();
        reader.sync("x", &mut outer).unwrap();
        assert_eq!((outer, mid, inner), (1, 2, 3));
        assert_eq!(reader.depth(), 0);
    }

    #[test]
    fn missing_group_is_partial_but_balanced() {
        let mut reader = roundtrip(|_| Ok(()));
        reader.begin_group("absent").unwrap();
        assert_eq!(reader.depth(), 1);
        let mut v = 5u8;
        reader.sync("v", &mut v).unwrap();
        assert_eq!(v, 5);
        reader.end_group().unwrap();
        assert!(reader.is_partial());
    }

    #[test]
    fn optional_group_presence() {
        let mut reader = roundtrip(|s| {
            assert!(s.begin_optional_group("yes", true)?);
            s.sync("v", &mut 1u8)?;
            s.end_group()?;
            assert!(!s.begin_optional_group("no", false)?);
            Ok(())
        });
        assert!(reader.begin_optional_group("yes", false).unwrap());
        reader.end_group().unwrap();
        assert!(!reader.begin_optional_group("no", true).unwrap());
        assert!(!reader.is_partial());
    }

    #[test]
    fn elided_value_writes_nothing_at_default() {
        let mut writer = CrySync::writer(SyncContext::Network);
        writer
            .sync_elided("scale", &mut Vec3::ONE, &Vec3::ONE)
            .unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), wire::HEADER_SIZE);

        let mut reader = CrySync::reader(&bytes, &Limits::default()).unwrap();
        let mut scale = Vec3::ZERO;
        reader.sync_elided("scale", &mut scale, &Vec3::ONE).unwrap();
        assert_eq!(scale, Vec3::ONE);
    }

    #[test]
    fn end_group_without_begin() {
        let mut writer = CrySync::writer(SyncContext::Network);
        assert_eq!(writer.end_group(), Err(SyncError::UnbalancedGroup));
        let mut reader = roundtrip(|_| Ok(()));
        assert_eq!(reader.end_group(), Err(SyncError::UnbalancedGroup));
    }

    #[test]
    fn finish_rejects_open_groups_and_readers() {
        let mut writer = CrySync::writer(SyncContext::SaveGame);
        writer.begin_group("g").unwrap();
        assert_eq!(
            writer.finish(),
            Err(SyncError::GroupsStillOpen { depth: 1 })
        );

        let reader = roundtrip(|_| Ok(()));
        assert!(matches!(
            reader.finish(),
            Err(SyncError::WrongDirection { .. })
        ));
    }

    #[test]
    fn reader_keeps_payload_context() {
        let mut writer = CrySync::writer(SyncContext::SaveGame);
        writer.sync("k", &mut true).unwrap();
        let bytes = writer.finish().unwrap();
        let reader = CrySync::reader(&bytes, &Limits::default()).unwrap();
        assert_eq!(reader.context(), SyncContext::SaveGame);
    }

    #[test]
    fn duplicate_incoming_field_keeps_last() {
        let header = PayloadHeader::new(SyncContext::Network);
        let records = vec![
            Record::Field {
                name: "hp".into(),
                value: FieldValue::U8(1),
            },
            Record::Field {
                name: "hp".into(),
                value: FieldValue::U8(2),
            },
        ];
        let bytes = encode_payload(&header, &records).unwrap();
        let mut reader = CrySync::reader(&bytes, &Limits::default()).unwrap();
        let mut hp = 0u8;
        reader.sync("hp", &mut hp).unwrap();
        assert_eq!(hp, 2);
        assert!(reader.is_partial());
    }

    #[test]
    fn oversized_blobs_rejected_on_write() {
        let mut writer = CrySync::writer(SyncContext::Network);
        let mut text = "x".repeat(20 * 1024);
        assert_eq!(
            writer.sync("note", &mut text),
            Err(SyncError::LimitExceeded {
                kind: LimitKind::BlobLength,
                limit: 16 * 1024,
                actual: 20 * 1024,
            })
        );

        let mut writer = CrySync::writer_with_limits(SyncContext::Network, &Limits::for_testing());
        assert!(matches!(
            writer.sync("raw", &mut vec![0u8; 1025]),
            Err(SyncError::LimitExceeded {
                kind: LimitKind::BlobLength,
                ..
            })
        ));
        writer.sync("raw", &mut vec![7u8; 1024]).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = CrySync::reader(&bytes, &Limits::for_testing()).unwrap();
        let mut raw: Vec<u8> = Vec::new();
        reader.sync("raw", &mut raw).unwrap();
        assert_eq!(raw.len(), 1024);
    }

    #[test]
    fn group_depth_limited_on_write() {
        let limits = Limits::for_testing();
        let mut writer = CrySync::writer_with_limits(SyncContext::Network, &limits);
        for level in 0..limits.max_group_depth {
            writer.begin_group(&format!("g{level}")).unwrap();
        }
        assert_eq!(
            writer.begin_group("deeper"),
            Err(SyncError::LimitExceeded {
                kind: LimitKind::GroupDepth,
                limit: 8,
                actual: 9,
            })
        );
        assert!(!writer.begin_optional_group("skipped", false).unwrap());
        assert!(writer.begin_optional_group("deeper", true).is_err());
        for _ in 0..limits.max_group_depth {
            writer.end_group().unwrap();
        }
        let bytes = writer.finish().unwrap();
        assert!(CrySync::reader(&bytes, &limits).is_ok());
    }

    #[test]
    fn record_budget_counts_pending_group_ends() {
        let limits = Limits {
            max_records: 3,
            ..Limits::for_testing()
        };
        let mut writer = CrySync::writer_with_limits(SyncContext::Network, &limits);
        writer.begin_group("g").unwrap();
        writer.sync("a", &mut 1u8).unwrap();
        assert_eq!(
            writer.sync("b", &mut 2u8),
            Err(SyncError::LimitExceeded {
                kind: LimitKind::RecordCount,
                limit: 3,
                actual: 4,
            })
        );
        writer.end_group().unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = CrySync::reader(&bytes, &limits).unwrap();
        let mut a = 0u8;
        reader.begin_group("g").unwrap();
        reader.sync("a", &mut a).unwrap();
        reader.end_group().unwrap();
        assert_eq!(a, 1);
        assert!(!reader.is_partial());
    }

    #[test]
    fn payload_size_checked_on_finish() {
        let limits = Limits {
            max_payload_bytes: 64,
            ..Limits::for_testing()
        };
        let mut writer = CrySync::writer_with_limits(SyncContext::Network, &limits);
        writer.sync("raw", &mut vec![0u8; 100]).unwrap();
        assert!(matches!(
            writer.finish(),
            Err(SyncError::LimitExceeded {
                kind: LimitKind::PayloadBytes,
                limit: 64,
                ..
            })
        ));

        let mut writer = CrySync::writer_with_limits(SyncContext::Network, &limits);
        writer.sync("raw", &mut vec![0u8; 32]).unwrap();
        let bytes = writer.finish().unwrap();
        assert!(bytes.len() <= 64);
        assert!(CrySync::reader(&bytes, &limits).is_ok());
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(matches!(
            CrySync::reader(&[1, 2, 3], &Limits::default()),
            Err(SyncError::Decode(_))
        ));
    }
}
