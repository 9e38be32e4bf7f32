//! Inspection helpers for crysync payloads and RMI descriptors.
//!
//! - Dump a sync payload as a tree of groups and fields
//! - Summarize payload sizes and nesting
//! - Decode RMI flag bytes, target masks and aspect masks
//!
//! # Design Principles
//!
//! - **First-class tooling** - These tools are part of the product, not afterthoughts.
//! - **Human-readable output** - Every report has a pretty form and a JSON form.

use std::fmt::Write as _;

use rmi::{FlagDecodeError, RmiFlags, RmiTarget};
use serde::Serialize;
use sync::EntityAspects;
use wire::{decode_payload, DecodeError, FieldValue, Limits, Record, SyncContext};

/// A decoded payload as a tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadDump {
    pub version: u16,
    pub context: SyncContext,
    pub size: usize,
    pub nodes: Vec<DumpNode>,
}

/// One field or group of a [`PayloadDump`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DumpNode {
    Field {
        name: String,
        kind: &'static str,
        value: FieldValue,
    },
    Group {
        name: String,
        children: Vec<DumpNode>,
    },
}

/// Decodes `bytes` into a [`PayloadDump`].
pub fn dump_payload(bytes: &[u8], limits: &Limits) -> Result<PayloadDump, DecodeError> {
    let payload = decode_payload(bytes, limits)?;
    let mut stack: Vec<(String, Vec<DumpNode>)> = vec![(String::new(), Vec::new())];
    for record in payload.records {
        match record {
            Record::Field { name, value } => {
                if let Some((_, nodes)) = stack.last_mut() {
                    nodes.push(DumpNode::Field {
                        name,
                        kind: value.kind().name(),
                        value,
                    });
                }
            }
            Record::GroupBegin { name } => stack.push((name, Vec::new())),
            Record::GroupEnd => {
                // Decoded payloads are balanced, so the root is never popped.
                if stack.len() > 1 {
                    if let Some((name, children)) = stack.pop() {
                        if let Some((_, nodes)) = stack.last_mut() {
                            nodes.push(DumpNode::Group { name, children });
                        }
                    }
                }
            }
        }
    }
    let nodes = stack.pop().map(|(_, nodes)| nodes).unwrap_or_default();
    Ok(PayloadDump {
        version: payload.header.version,
        context: payload.header.context,
        size: bytes.len(),
        nodes,
    })
}

/// Size and shape statistics of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PayloadSummary {
    pub fields: usize,
    pub groups: usize,
    pub max_depth: usize,
}

#[must_use]
pub fn summarize(dump: &PayloadDump) -> PayloadSummary {
    fn walk(nodes: &[DumpNode], depth: usize, summary: &mut PayloadSummary) {
        for node in nodes {
            match node {
                DumpNode::Field { .. } => summary.fields += 1,
                DumpNode::Group { children, .. } => {
                    summary.groups += 1;
                    summary.max_depth = summary.max_depth.max(depth + 1);
                    walk(children, depth + 1, summary);
                }
            }
        }
    }
    let mut summary = PayloadSummary::default();
    walk(&dump.nodes, 0, &mut summary);
    summary
}

/// Renders a dump as an indented tree.
#[must_use]
pub fn format_dump_pretty(dump: &PayloadDump) -> String {
    fn walk(out: &mut String, nodes: &[DumpNode], indent: usize) {
        for node in nodes {
            let pad = "  ".repeat(indent);
            match node {
                DumpNode::Field { name, kind, value } => {
                    let _ = writeln!(out, "{pad}{name}: {kind} = {}", format_value(value));
                }
                DumpNode::Group { name, children } => {
                    let _ = writeln!(out, "{pad}{name} {{");
                    walk(out, children, indent + 1);
                    let _ = writeln!(out, "{pad}}}");
                }
            }
        }
    }
    let mut out = format!(
        "version: {} context: {:?} size: {} bytes\n",
        dump.version, dump.context, dump.size
    );
    walk(&mut out, &dump.nodes, 0);
    out
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Bool(v) => v.to_string(),
        FieldValue::I8(v) => v.to_string(),
        FieldValue::I16(v) => v.to_string(),
        FieldValue::I32(v) => v.to_string(),
        FieldValue::I64(v) => v.to_string(),
        FieldValue::U8(v) => v.to_string(),
        FieldValue::U16(v) => v.to_string(),
        FieldValue::U32(v) => v.to_string(),
        FieldValue::U64(v) => v.to_string(),
        FieldValue::F32(v) => v.to_string(),
        FieldValue::F64(v) => v.to_string(),
        FieldValue::Str(v) => format!("{v:?}"),
        FieldValue::Bytes(v) => format!("<{} bytes>", v.len()),
        FieldValue::Vec2(v) => format!("{v:?}"),
        FieldValue::Vec3(v) => format!("{v:?}"),
        FieldValue::Quat(v) => format!("{v:?}"),
    }
}

/// Decoded RMI flag byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagReport {
    pub raw: u8,
    pub attachment: String,
    pub reliable: bool,
    pub to_server: bool,
    pub low_delay: bool,
}

pub fn describe_flags(raw: u8) -> Result<FlagReport, FlagDecodeError> {
    let flags = RmiFlags::decode(raw)?;
    Ok(FlagReport {
        raw,
        attachment: flags.attachment().to_string(),
        reliable: flags.is_reliable(),
        to_server: flags.is_to_server(),
        low_delay: flags.is_low_delay(),
    })
}

/// Named bits of a bitmask plus whatever is left over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskReport {
    pub raw: u32,
    pub names: Vec<&'static str>,
    pub unknown_bits: u32,
}

const TARGET_NAMES: [(RmiTarget, &str); 7] = [
    (RmiTarget::TO_CLIENT_CHANNEL, "ToClientChannel"),
    (RmiTarget::TO_OWN_CLIENT, "ToOwnClient"),
    (RmiTarget::TO_OTHER_CLIENTS, "ToOtherClients"),
    (RmiTarget::TO_ALL_CLIENTS, "ToAllClients"),
    (RmiTarget::TO_SERVER, "ToServer"),
    (RmiTarget::NO_LOCAL_CALLS, "NoLocalCalls"),
    (RmiTarget::NO_REMOTE_CALLS, "NoRemoteCalls"),
];

#[must_use]
pub fn describe_target(raw: u32) -> MaskReport {
    let target = RmiTarget::from_raw(raw);
    let mut known = 0;
    let names = TARGET_NAMES
        .iter()
        .filter(|(flag, _)| target.contains(*flag))
        .map(|(flag, name)| {
            known |= flag.raw();
            *name
        })
        .collect();
    MaskReport {
        raw,
        names,
        unknown_bits: raw & !known,
    }
}

#[must_use]
pub fn describe_aspects(raw: u32) -> MaskReport {
    let aspects = EntityAspects::from_raw(raw);
    let names = aspects.iter().filter_map(EntityAspects::name).collect();
    MaskReport {
        raw,
        names,
        unknown_bits: raw & EntityAspects::RESERVED.raw(),
    }
}

/// Parses `0x`-prefixed hex or decimal.
pub fn parse_number(text: &str) -> Result<u64, std::num::ParseIntError> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    }
}
