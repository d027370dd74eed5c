//! Transfer operations
//!
//! Encoding and decoding of the host-port tuples carried by PORT and PASV.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::TransferError;

/// Parses a PORT argument `h1,h2,h3,h4,p1,p2`.
///
/// Exactly six comma-separated decimal fields are required, each in `0..=255`.
/// The port is `p1 * 256 + p2`.
pub fn parse_port_argument(arg: &str) -> Result<SocketAddrV4, TransferError> {
    let fields: Vec<&str> = arg.split(',').collect();
    if fields.len() != 6 {
        return Err(TransferError::InvalidPortCommand(format!(
            "expected 6 fields, got {}",
            fields.len()
        )));
    }

    let mut bytes = [0u8; 6];
    for (slot, field) in bytes.iter_mut().zip(&fields) {
        let field = field.trim();
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TransferError::InvalidPortCommand(format!(
                "non-numeric field {:?}",
                field
            )));
        }
        *slot = field.parse().map_err(|_| {
            TransferError::InvalidPortCommand(format!("field out of range {:?}", field))
        })?;
    }

    let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
    let port = u16::from(bytes[4]) * 256 + u16::from(bytes[5]);
    Ok(SocketAddrV4::new(ip, port))
}

/// Builds the text of a `227` reply for an advertised address and port.
pub fn format_pasv_reply(ip: Ipv4Addr, port: u16) -> String {
    let [h1, h2, h3, h4] = ip.octets();
    format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        h1,
        h2,
        h3,
        h4,
        port / 256,
        port % 256
    )
}
