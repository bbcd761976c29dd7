//! Frame codec.
//!
//! Request:
//!
//! | 4B LE      | header_len B        | args_size B |
//! | header_len | codec-coded header  | args        |
//!
//! The header is the codec-serialized [RpcHeader]; `args_size` inside it
//! declares the length of the args region that follows.
//!
//! Response:
//!
//! | 4B LE    | resp_len B |
//! | resp_len | payload    |
//!
//! symmetric with the request prefix, so a response of any size up to
//! [MAX_RESP_LEN] arrives intact.

use crate::codec::Codec;
use crate::error::RpcFault;
use log::*;
use serde_derive::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Ceiling for the serialized header region.
pub const MAX_HEADER_LEN: u32 = 1 << 20;
/// Ceiling for service and method names inside the header.
pub const MAX_NAME_LEN: usize = 1 << 10;
/// Ceiling for the args region.
pub const MAX_ARGS_LEN: u32 = 16 << 20;
/// Ceiling for a response payload.
pub const MAX_RESP_LEN: u32 = 16 << 20;

/// The routing record in front of every request.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct RpcHeader {
    pub service_name: String,
    pub method_name: String,
    pub args_size: u32,
}

/// One parsed request envelope.
pub struct RequestFrame {
    pub header: RpcHeader,
    pub args: Vec<u8>,
}

/// Assemble the full request wire bytes in one buffer, so the channel sends
/// them with a single write.
pub fn encode_request<C: Codec>(
    codec: &C, service_name: &str, method_name: &str, args: &[u8],
) -> Result<Vec<u8>, RpcFault> {
    if args.len() > MAX_ARGS_LEN as usize {
        return Err(RpcFault::Oversize);
    }
    let header = RpcHeader {
        service_name: service_name.to_string(),
        method_name: method_name.to_string(),
        args_size: args.len() as u32,
    };
    let mut buf = Vec::with_capacity(64 + args.len());
    buf.extend_from_slice(&[0u8; 4]);
    let header_len = match codec.encode_into(&header, &mut buf) {
        Ok(n) => n as u32,
        Err(()) => return Err(RpcFault::Encode),
    };
    if header_len == 0 || header_len > MAX_HEADER_LEN {
        return Err(RpcFault::Oversize);
    }
    buf[..4].copy_from_slice(&header_len.to_le_bytes());
    buf.extend_from_slice(args);
    Ok(buf)
}

/// Read and validate one request envelope.
///
/// Short reads retry until the exact count is satisfied (`read_exact`
/// semantics); a peer close maps to [RpcFault::Closed] and abandons the call.
pub fn read_request<C: Codec, R: Read>(codec: &C, r: &mut R) -> Result<RequestFrame, RpcFault> {
    let header_len = read_u32(r)?;
    if header_len == 0 || header_len > MAX_HEADER_LEN {
        warn!("rejecting request with header_len {}", header_len);
        return Err(RpcFault::Oversize);
    }
    let header_buf = read_exact_vec(r, header_len as usize)?;
    let header: RpcHeader = match codec.decode(&header_buf) {
        Ok(h) => h,
        Err(()) => return Err(RpcFault::Decode),
    };
    if header.service_name.len() > MAX_NAME_LEN || header.method_name.len() > MAX_NAME_LEN {
        warn!("rejecting request with oversized service/method name");
        return Err(RpcFault::Oversize);
    }
    if header.args_size > MAX_ARGS_LEN {
        warn!("rejecting request with args_size {}", header.args_size);
        return Err(RpcFault::Oversize);
    }
    let args = read_exact_vec(r, header.args_size as usize)?;
    Ok(RequestFrame { header, args })
}

/// Write one length-prefixed response payload as a single buffer.
pub fn write_response<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), RpcFault> {
    if payload.len() > MAX_RESP_LEN as usize {
        return Err(RpcFault::Oversize);
    }
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    w.write_all(&buf)?;
    Ok(())
}

/// Read one length-prefixed response payload.
pub fn read_response<R: Read>(r: &mut R) -> Result<Vec<u8>, RpcFault> {
    let resp_len = read_u32(r)?;
    if resp_len > MAX_RESP_LEN {
        warn!("rejecting response with resp_len {}", resp_len);
        return Err(RpcFault::Oversize);
    }
    read_exact_vec(r, resp_len as usize)
}

#[inline]
fn read_u32<R: Read>(r: &mut R) -> Result<u32, RpcFault> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

#[inline]
fn read_exact_vec<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>, RpcFault> {
    let mut buf = vec![0u8; len];
    if len > 0 {
        r.read_exact(&mut buf)?;
    }
    Ok(buf)
}
