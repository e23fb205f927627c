//! Token parsing for the `-a <keys>` / `-s <values>` schema strings
//! (spec §4.1).

use super::{DirectionFilter, FieldKind, FieldSource, KeyKind, ValueKind, ViewDefinition, ViewField};
use crate::error::{AggError, Result};
use crate::ie::IeDictionary;
use crate::types::DataType;

// Well-known IPFIX information elements the recognized key/value tokens
// resolve to (enterprise 0 = IANA-registered). These are fixed regardless
// of what the caller's dictionary contains, matching how the original
// aggregator hardcodes its builtin field set (spec §4.1 tables).
const SOURCE_IPV4_ADDRESS: (u32, u16) = (0, 8);
const DESTINATION_IPV4_ADDRESS: (u32, u16) = (0, 12);
const SOURCE_IPV6_ADDRESS: (u32, u16) = (0, 27);
const DESTINATION_IPV6_ADDRESS: (u32, u16) = (0, 28);
const SOURCE_TRANSPORT_PORT: (u32, u16) = (0, 7);
const DESTINATION_TRANSPORT_PORT: (u32, u16) = (0, 11);
const PROTOCOL_IDENTIFIER: (u32, u16) = (0, 4);
const OCTET_DELTA_COUNT: (u32, u16) = (0, 1);
const PACKET_DELTA_COUNT: (u32, u16) = (0, 2);

fn source(pair: (u32, u16)) -> Option<FieldSource> {
    Some(FieldSource {
        enterprise: pair.0,
        element_id: pair.1,
    })
}

fn split_prefix(token: &str) -> (&str, Option<&str>) {
    match token.split_once('/') {
        Some((base, n)) => (base, Some(n)),
        None => (token, None),
    }
}

fn parse_prefix_len(n: Option<&str>, default: u8, max: u8, token: &str) -> Result<u8> {
    let value = match n {
        None => default,
        Some(s) => s
            .parse::<u8>()
            .map_err(|_| AggError::config(format!("invalid prefix length in \"{token}\"")))?,
    };
    if value < 1 || value > max {
        return Err(AggError::config(format!(
            "prefix length in \"{token}\" must be in 1..={max}"
        )));
    }
    Ok(value)
}

/// Compile the `-a`/`-s` strings into a [`ViewDefinition`] (spec §4.1).
pub fn compile_view(keys: &str, values: &str, dict: &dyn IeDictionary) -> Result<ViewDefinition> {
    let mut key_fields = Vec::new();
    let mut offset = 0usize;
    for token in keys.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let field = compile_key_token(token, dict, offset)?;
        offset += field.size;
        key_fields.push(field);
    }
    let keys_size = offset;

    let mut value_fields = Vec::new();
    let mut offset = 0usize;
    for token in values.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let field = compile_value_token(token, dict, offset)?;
        offset += field.size;
        value_fields.push(field);
    }
    let values_size = offset;

    let bidirectional = key_fields.iter().any(|f| {
        matches!(
            f.kind,
            FieldKind::Key(
                KeyKind::BidiIp
                    | KeyKind::BidiPort
                    | KeyKind::BidiIpv4Subnet(_)
                    | KeyKind::BidiIpv6Subnet(_)
            )
        )
    });
    let biflow_enabled =
        bidirectional || value_fields.iter().any(|f| f.direction_filter != DirectionFilter::Any);

    Ok(ViewDefinition {
        keys: key_fields,
        values: value_fields,
        keys_size,
        values_size,
        bidirectional,
        biflow_enabled,
    })
}

fn compile_key_token(token: &str, dict: &dyn IeDictionary, offset: usize) -> Result<ViewField> {
    let (base, suffix) = split_prefix(token);

    let field = match base {
        "srcip" => ViewField {
            name: token.to_string(),
            data_type: DataType::Ip,
            size: DataType::Ip.size(),
            offset,
            kind: FieldKind::Key(KeyKind::SourceIp),
            direction_filter: DirectionFilter::Any,
            source: None,
        },
        "dstip" => ViewField {
            name: token.to_string(),
            data_type: DataType::Ip,
            size: DataType::Ip.size(),
            offset,
            kind: FieldKind::Key(KeyKind::DestinationIp),
            direction_filter: DirectionFilter::Any,
            source: None,
        },
        "ip" => ViewField {
            name: token.to_string(),
            data_type: DataType::Ip,
            size: DataType::Ip.size(),
            offset,
            kind: FieldKind::Key(KeyKind::BidiIp),
            direction_filter: DirectionFilter::Any,
            source: None,
        },
        "srcport" => ViewField {
            name: token.to_string(),
            data_type: DataType::U16,
            size: DataType::U16.size(),
            offset,
            kind: FieldKind::Key(KeyKind::Verbatim),
            direction_filter: DirectionFilter::Any,
            source: source(SOURCE_TRANSPORT_PORT),
        },
        "dstport" => ViewField {
            name: token.to_string(),
            data_type: DataType::U16,
            size: DataType::U16.size(),
            offset,
            kind: FieldKind::Key(KeyKind::Verbatim),
            direction_filter: DirectionFilter::Any,
            source: source(DESTINATION_TRANSPORT_PORT),
        },
        "port" => ViewField {
            name: token.to_string(),
            data_type: DataType::U16,
            size: DataType::U16.size(),
            offset,
            kind: FieldKind::Key(KeyKind::BidiPort),
            direction_filter: DirectionFilter::Any,
            source: None,
        },
        "proto" => ViewField {
            name: token.to_string(),
            data_type: DataType::U8,
            size: DataType::U8.size(),
            offset,
            kind: FieldKind::Key(KeyKind::Verbatim),
            direction_filter: DirectionFilter::Any,
            source: source(PROTOCOL_IDENTIFIER),
        },
        "srcipv4" => {
            let n = parse_prefix_len(suffix, 32, 32, token)?;
            ViewField {
                name: token.to_string(),
                data_type: DataType::Ipv4,
                size: DataType::Ipv4.size(),
                offset,
                kind: FieldKind::Key(KeyKind::Ipv4Subnet(n)),
                direction_filter: DirectionFilter::Any,
                source: source(SOURCE_IPV4_ADDRESS),
            }
        }
        "dstipv4" => {
            let n = parse_prefix_len(suffix, 32, 32, token)?;
            ViewField {
                name: token.to_string(),
                data_type: DataType::Ipv4,
                size: DataType::Ipv4.size(),
                offset,
                kind: FieldKind::Key(KeyKind::Ipv4Subnet(n)),
                direction_filter: DirectionFilter::Any,
                source: source(DESTINATION_IPV4_ADDRESS),
            }
        }
        "srcipv6" => {
            let n = parse_prefix_len(suffix, 128, 128, token)?;
            ViewField {
                name: token.to_string(),
                data_type: DataType::Ipv6,
                size: DataType::Ipv6.size(),
                offset,
                kind: FieldKind::Key(KeyKind::Ipv6Subnet(n)),
                direction_filter: DirectionFilter::Any,
                source: source(SOURCE_IPV6_ADDRESS),
            }
        }
        "dstipv6" => {
            let n = parse_prefix_len(suffix, 128, 128, token)?;
            ViewField {
                name: token.to_string(),
                data_type: DataType::Ipv6,
                size: DataType::Ipv6.size(),
                offset,
                kind: FieldKind::Key(KeyKind::Ipv6Subnet(n)),
                direction_filter: DirectionFilter::Any,
                source: source(DESTINATION_IPV6_ADDRESS),
            }
        }
        "ipv4" => {
            let n = parse_prefix_len(suffix, 32, 32, token)?;
            ViewField {
                name: token.to_string(),
                data_type: DataType::Ipv4,
                size: DataType::Ipv4.size(),
                offset,
                kind: FieldKind::Key(KeyKind::BidiIpv4Subnet(n)),
                direction_filter: DirectionFilter::Any,
                source: None,
            }
        }
        "ipv6" => {
            let n = parse_prefix_len(suffix, 128, 128, token)?;
            ViewField {
                name: token.to_string(),
                data_type: DataType::Ipv6,
                size: DataType::Ipv6.size(),
                offset,
                kind: FieldKind::Key(KeyKind::BidiIpv6Subnet(n)),
                direction_filter: DirectionFilter::Any,
                source: None,
            }
        }
        _ => {
            let ie = dict
                .find_by_name(base)
                .ok_or_else(|| AggError::config(format!("unknown key field \"{token}\"")))?;
            if let Some(n) = suffix {
                let (kind, max) = match ie.data_type {
                    DataType::Ipv4 => (KeyKind::Ipv4Subnet as fn(u8) -> KeyKind, 32),
                    DataType::Ipv6 => (KeyKind::Ipv6Subnet as fn(u8) -> KeyKind, 128),
                    _ => {
                        return Err(AggError::config(format!(
                            "\"{token}\" requests a subnet of a non-IP element"
                        )));
                    }
                };
                let n = parse_prefix_len(Some(n), max, max, token)?;
                ViewField {
                    name: token.to_string(),
                    data_type: ie.data_type,
                    size: ie.data_type.size(),
                    offset,
                    kind: FieldKind::Key(kind(n)),
                    direction_filter: DirectionFilter::Any,
                    source: Some(FieldSource {
                        enterprise: ie.enterprise,
                        element_id: ie.id,
                    }),
                }
            } else {
                ViewField {
                    name: token.to_string(),
                    data_type: ie.data_type,
                    size: ie.data_type.size(),
                    offset,
                    kind: FieldKind::Key(KeyKind::Verbatim),
                    direction_filter: DirectionFilter::Any,
                    source: Some(FieldSource {
                        enterprise: ie.enterprise,
                        element_id: ie.id,
                    }),
                }
            }
        }
    };

    Ok(field)
}

fn compile_value_token(token: &str, dict: &dyn IeDictionary, offset: usize) -> Result<ViewField> {
    let numeric = |kind: ValueKind, src: (u32, u16), dtype: DataType, dir: DirectionFilter| ViewField {
        name: token.to_string(),
        data_type: dtype,
        size: dtype.size(),
        offset,
        kind: FieldKind::Value(kind),
        direction_filter: dir,
        source: source(src),
    };
    let count = |dir: DirectionFilter| ViewField {
        name: token.to_string(),
        data_type: DataType::U64,
        size: DataType::U64.size(),
        offset,
        kind: FieldKind::Value(ValueKind::Count),
        direction_filter: dir,
        source: None,
    };

    let field = match token {
        "packets" => numeric(ValueKind::Sum, PACKET_DELTA_COUNT, DataType::U64, DirectionFilter::Any),
        "bytes" => numeric(ValueKind::Sum, OCTET_DELTA_COUNT, DataType::U64, DirectionFilter::Any),
        "flows" => count(DirectionFilter::Any),
        "inpackets" => numeric(ValueKind::Sum, PACKET_DELTA_COUNT, DataType::U64, DirectionFilter::FwdOnly),
        "inbytes" => numeric(ValueKind::Sum, OCTET_DELTA_COUNT, DataType::U64, DirectionFilter::FwdOnly),
        "inflows" => count(DirectionFilter::FwdOnly),
        "outpackets" => numeric(ValueKind::Sum, PACKET_DELTA_COUNT, DataType::U64, DirectionFilter::RevOnly),
        "outbytes" => numeric(ValueKind::Sum, OCTET_DELTA_COUNT, DataType::U64, DirectionFilter::RevOnly),
        "outflows" => count(DirectionFilter::RevOnly),
        _ if token.starts_with("min") || token.starts_with("max") => {
            let (prefix, rest) = token.split_at(3);
            let ie = dict
                .find_by_name(rest)
                .ok_or_else(|| AggError::config(format!("unknown value field \"{token}\"")))?;
            let kind = if prefix == "min" { ValueKind::Min } else { ValueKind::Max };
            ViewField {
                name: token.to_string(),
                data_type: ie.data_type,
                size: ie.data_type.size(),
                offset,
                kind: FieldKind::Value(kind),
                direction_filter: DirectionFilter::Any,
                source: Some(FieldSource {
                    enterprise: ie.enterprise,
                    element_id: ie.id,
                }),
            }
        }
        _ => return Err(AggError::config(format!("unknown value field \"{token}\""))),
    };

    Ok(field)
}
