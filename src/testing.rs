//! Test fixtures and builders (spec §2.4).
//!
//! Exercising the aggregator end to end needs a [`FieldLookup`] and a
//! [`DecodedRecord`] stream, which in production come from the external
//! IPFIX reader (spec §6.2). This module provides small, deterministic
//! stand-ins so the rest of the crate's tests don't each hand-roll a
//! closure.

use std::collections::HashMap;

use crate::ipfix::{DecodedRecord, FieldLookup, FindFlags, TemplateKind};
use crate::types::WireValue;

/// Adapts a plain closure to [`FieldLookup`], for tests that want to pass
/// `&dyn FieldLookup` without defining a one-off struct.
pub struct ClosureLookup<F>(pub F);

impl<F> FieldLookup for ClosureLookup<F>
where
    F: Fn(&DecodedRecord, u32, u16, FindFlags) -> Option<WireValue>,
{
    fn find_field(
        &self,
        record: &DecodedRecord,
        enterprise: u32,
        element_id: u16,
        flags: FindFlags,
    ) -> Option<WireValue> {
        (self.0)(record, enterprise, element_id, flags)
    }
}

/// A single flow's worth of well-known wire fields, for building
/// `FieldLookup` closures without repeating the `(enterprise, element_id)`
/// pairs at every call site.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlowFixture {
    pub src_ipv4: Option<[u8; 4]>,
    pub dst_ipv4: Option<[u8; 4]>,
    pub src_ipv6: Option<[u8; 16]>,
    pub dst_ipv6: Option<[u8; 16]>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub proto: Option<u8>,
    pub packets: Option<u64>,
    pub bytes: Option<u64>,
}

impl FlowFixture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_addresses(mut self, src: [u8; 4], dst: [u8; 4]) -> Self {
        self.src_ipv4 = Some(src);
        self.dst_ipv4 = Some(dst);
        self
    }

    #[must_use]
    pub fn with_ipv6_addresses(mut self, src: [u8; 16], dst: [u8; 16]) -> Self {
        self.src_ipv6 = Some(src);
        self.dst_ipv6 = Some(dst);
        self
    }

    #[must_use]
    pub fn with_ports(mut self, src: u16, dst: u16) -> Self {
        self.src_port = Some(src);
        self.dst_port = Some(dst);
        self
    }

    #[must_use]
    pub fn with_proto(mut self, proto: u8) -> Self {
        self.proto = Some(proto);
        self
    }

    #[must_use]
    pub fn with_counts(mut self, packets: u64, bytes: u64) -> Self {
        self.packets = Some(packets);
        self.bytes = Some(bytes);
        self
    }

    /// Resolve one `(enterprise, element_id)` lookup against this fixture.
    /// `find_flags` is accepted but ignored: a plain `FlowFixture` models a
    /// unidirectional record, where forward/reverse distinction doesn't
    /// apply. Use [`BiflowFixture`] for tests that need the two halves to
    /// differ.
    #[must_use]
    pub fn find(&self, enterprise: u32, element_id: u16) -> Option<WireValue> {
        if enterprise != 0 {
            return None;
        }
        match element_id {
            8 => self.src_ipv4.map(WireValue::Ipv4),
            12 => self.dst_ipv4.map(WireValue::Ipv4),
            27 => self.src_ipv6.map(WireValue::Ipv6),
            28 => self.dst_ipv6.map(WireValue::Ipv6),
            7 => self.src_port.map(|p| WireValue::Unsigned(p as u64)),
            11 => self.dst_port.map(|p| WireValue::Unsigned(p as u64)),
            4 => self.proto.map(|p| WireValue::Unsigned(p as u64)),
            2 => self.packets.map(WireValue::Unsigned),
            1 => self.bytes.map(WireValue::Unsigned),
            _ => None,
        }
    }
}

/// A biflow record's forward and reverse halves, each a [`FlowFixture`],
/// resolved according to `find_flags` (spec §4.3).
///
/// Address fields (source/destination IPv4/IPv6) are not duplicated per
/// direction in a real biflow template — only the counter/port elements
/// are — so address lookups always resolve against `forward` regardless
/// of `flags`; `reverse` only ever supplies the reverse counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct BiflowFixture {
    pub forward: FlowFixture,
    pub reverse: FlowFixture,
}

const ADDRESS_ELEMENTS: [(u32, u16); 4] = [(0, 8), (0, 12), (0, 27), (0, 28)];

impl BiflowFixture {
    #[must_use]
    pub fn find(&self, enterprise: u32, element_id: u16, flags: FindFlags) -> Option<WireValue> {
        if ADDRESS_ELEMENTS.contains(&(enterprise, element_id)) {
            return self.forward.find(enterprise, element_id);
        }
        match flags {
            FindFlags::Reverse => self.reverse.find(enterprise, element_id),
            FindFlags::Forward | FindFlags::None => self.forward.find(enterprise, element_id),
        }
    }
}

/// Build a minimal [`DecodedRecord`]; `raw_bytes` is left empty since
/// nothing in this crate reads it directly (spec §6.2: the wire decoder
/// owns interpreting `raw_bytes`).
#[must_use]
pub fn record(template_kind: TemplateKind, snapshot_ref: u64) -> DecodedRecord {
    DecodedRecord {
        template_kind,
        template_ref: 256,
        snapshot_ref,
        raw_bytes: Vec::new(),
    }
}

/// Index many fixtures by their record's `snapshot_ref`, for a
/// [`crate::ipfix::VecReader`] serving a whole stream from one lookup
/// closure.
#[must_use]
pub fn by_snapshot_ref(fixtures: Vec<(u64, BiflowFixture)>) -> HashMap<u64, BiflowFixture> {
    fixtures.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_fixture_resolves_known_elements() {
        let fx = FlowFixture::new()
            .with_addresses([10, 0, 0, 1], [10, 0, 0, 2])
            .with_ports(1234, 443)
            .with_proto(6)
            .with_counts(5, 500);

        assert_eq!(fx.find(0, 8), Some(WireValue::Ipv4([10, 0, 0, 1])));
        assert_eq!(fx.find(0, 11), Some(WireValue::Unsigned(443)));
        assert_eq!(fx.find(0, 99), None);
    }

    #[test]
    fn biflow_fixture_honors_find_flags() {
        let bf = BiflowFixture {
            forward: FlowFixture::new().with_counts(1, 100),
            reverse: FlowFixture::new().with_counts(2, 200),
        };
        assert_eq!(bf.find(0, 1, FindFlags::Forward), Some(WireValue::Unsigned(100)));
        assert_eq!(bf.find(0, 1, FindFlags::Reverse), Some(WireValue::Unsigned(200)));
    }
}
