//! Information-element dictionary (external collaborator, spec §6.3).
//!
//! The real dictionary maps `(enterprise, element_id)` pairs and names to
//! IPFIX information-element metadata; it lives outside this crate. What we
//! own is the *contract* the schema compiler needs, expressed as a trait so
//! tests can swap in a small in-memory table.

use crate::types::DataType;

/// One entry of the information-element dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IeDescriptor {
    pub enterprise: u32,
    pub id: u16,
    pub data_type: DataType,
    /// True if this element only makes sense scoped (e.g. a biflow-only
    /// reverse counter); unused by the engine itself but part of the
    /// upstream contract (spec §6.3).
    pub scope: bool,
}

/// Read-only lookup contract consumed by the view-definition compiler
/// (spec §4.1) to resolve `<ie-name>` tokens and to validate prefix-masked
/// IP tokens against the underlying element's type.
pub trait IeDictionary: Send + Sync {
    fn find_by_name(&self, name: &str) -> Option<IeDescriptor>;
    fn find_by_id(&self, enterprise: u32, id: u16) -> Option<IeDescriptor>;
}

/// A small in-memory dictionary covering the well-known IPFIX elements the
/// schema compiler's recognized tokens resolve to (spec §4.1 tables). Handy
/// for tests and for embedding the engine without a full IANA-backed
/// dictionary.
#[derive(Clone, Debug, Default)]
pub struct StaticDictionary {
    entries: Vec<(String, IeDescriptor)>,
}

impl StaticDictionary {
    #[must_use]
    pub fn new() -> Self {
        let mut d = Self::default();
        d.insert("sourceIPv4Address", 0, 8, DataType::Ipv4);
        d.insert("destinationIPv4Address", 0, 12, DataType::Ipv4);
        d.insert("sourceIPv6Address", 0, 27, DataType::Ipv6);
        d.insert("destinationIPv6Address", 0, 28, DataType::Ipv6);
        d.insert("sourceTransportPort", 0, 7, DataType::U16);
        d.insert("destinationTransportPort", 0, 11, DataType::U16);
        d.insert("protocolIdentifier", 0, 4, DataType::U8);
        d.insert("packetDeltaCount", 0, 2, DataType::U64);
        d.insert("octetDeltaCount", 0, 1, DataType::U64);
        d.insert("flowStartMilliseconds", 0, 152, DataType::DateTimeMs);
        d.insert("flowEndMilliseconds", 0, 153, DataType::DateTimeMs);
        d.insert("sourceMacAddress", 0, 56, DataType::Mac);
        d
    }

    pub fn insert(&mut self, name: impl Into<String>, enterprise: u32, id: u16, data_type: DataType) {
        self.entries.push((
            name.into(),
            IeDescriptor {
                enterprise,
                id,
                data_type,
                scope: false,
            },
        ));
    }
}

impl IeDictionary for StaticDictionary {
    fn find_by_name(&self, name: &str) -> Option<IeDescriptor> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, d)| *d)
    }

    fn find_by_id(&self, enterprise: u32, id: u16) -> Option<IeDescriptor> {
        self.entries
            .iter()
            .find(|(_, d)| d.enterprise == enterprise && d.id == id)
            .map(|(_, d)| *d)
    }
}
