//! HTTP/1.x message heads.
//!
//! The header spans the start line and header fields up to and including
//! the blank line. A segment without the terminator is treated as a head
//! continuing into the next segment, so the whole remainder is claimed.

use super::{HTTP, TCP};
use crate::{
    chain::HeaderView,
    protocol::{Binding, BindingPriority, ProtocolDescriptor},
};

/// Ports that identify HTTP without looking at the payload.
pub const HTTP_PORTS: [u16; 2] = [80, 8080];

const METHODS: [&[u8]; 9] = [
    b"GET ",
    b"POST ",
    b"PUT ",
    b"HEAD ",
    b"DELETE ",
    b"OPTIONS ",
    b"PATCH ",
    b"CONNECT ",
    b"TRACE ",
];
const RESPONSE_PREFIX: &[u8] = b"HTTP/";
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

fn header_len(view: &HeaderView<'_>) -> usize {
    let bytes = view.bytes();
    bytes
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .map_or(bytes.len(), |at| at + HEAD_TERMINATOR.len())
}

/// Whether `bytes` starts like an HTTP request or response.
#[must_use]
pub fn looks_like_http(bytes: &[u8]) -> bool {
    bytes.starts_with(RESPONSE_PREFIX) || METHODS.iter().any(|method| bytes.starts_with(method))
}

pub(super) fn descriptor() -> ProtocolDescriptor { ProtocolDescriptor::new(HTTP, "http", header_len) }

pub(super) fn bindings() -> Vec<Binding> {
    vec![
        Binding::primary(TCP, HTTP, |input| {
            super::TcpView::new(input.source_view())
                .is_some_and(|tcp| HTTP_PORTS.iter().any(|port| tcp.uses_port(*port)))
        }),
        // Content sniffing for HTTP on unusual ports, after any TCP header.
        Binding::new(None, HTTP, BindingPriority::Heuristic, |input| {
            looks_like_http(input.remainder())
        })
        .depends_on([TCP]),
    ]
}
