//! # SNMP
//!
//! SNMPv2c GetRequest and GetBulkRequest over the correlation core. The
//! PDU request-id is the correlation id; it travels as a BER INTEGER, so ids
//! above `i32::MAX` appear negative on the wire and are read back as their
//! unsigned 32-bit value.
//!
//! ## Modules
//!
//! - `ber`: the BER subset SNMP needs
//! - `oid`: dotted object identifiers
//! - `pdu`: messages, PDUs, variable bindings and values
//! - `codec`: [`SnmpCodec`], binding request-ids to correlation ids
//! - `client`: [`SnmpClient`] with `get` and single-page `get_bulk_page`

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod ber;
pub mod client;
pub mod codec;
pub mod oid;
pub mod pdu;

pub use client::{SnmpClient, SnmpPage};
pub use codec::{SnmpCodec, SnmpRequest};
pub use oid::Oid;
pub use pdu::{Message, Pdu, PduType, SnmpValue, VarBind};
