//! String session decoding.
//!
//! A string session is a version character (`1`) followed by URL-safe
//! base64 of `dc_id (u8) | ip (4 or 16 bytes) | port (u16 BE) | auth_key (256 bytes)`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use thiserror::Error;

/// Size of an MTProto authorization key in bytes.
pub const AUTH_KEY_LEN: usize = 256;

const VERSION: char = '1';
const IPV4_PAYLOAD_LEN: usize = 1 + 4 + 2 + AUTH_KEY_LEN;
const IPV6_PAYLOAD_LEN: usize = 1 + 16 + 2 + AUTH_KEY_LEN;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors that can occur while decoding a string session.
#[derive(Debug, Error)]
pub enum SessionStringError {
    #[error("session string is empty")]
    Empty,

    #[error("unsupported session string version '{0}'")]
    UnsupportedVersion(char),

    #[error("session string is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unexpected session payload length {0} (expected 263 or 275)")]
    InvalidLength(usize),

    #[error("session string has invalid data center id {0}")]
    InvalidDcId(u8),
}

/// Decoded string session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionString {
    /// Home data center.
    pub dc_id: i32,

    /// Address of the home data center.
    pub address: SocketAddr,

    /// Authorization key bound to the logged-in account.
    pub auth_key: [u8; AUTH_KEY_LEN],
}

impl SessionString {
    /// Decodes a string session.
    ///
    /// # Errors
    ///
    /// Returns an error if the version, encoding or payload length is wrong.
    pub fn decode(raw: &str) -> Result<Self, SessionStringError> {
        let raw = raw.trim();
        let mut chars = raw.chars();
        let version = chars.next().ok_or(SessionStringError::Empty)?;
        if version != VERSION {
            return Err(SessionStringError::UnsupportedVersion(version));
        }

        let payload = URL_SAFE_LENIENT.decode(chars.as_str())?;
        let ip_len = match payload.len() {
            IPV4_PAYLOAD_LEN => 4,
            IPV6_PAYLOAD_LEN => 16,
            other => return Err(SessionStringError::InvalidLength(other)),
        };

        let dc_id = payload[0];
        if dc_id == 0 {
            return Err(SessionStringError::InvalidDcId(dc_id));
        }

        let ip_bytes = &payload[1..=ip_len];
        let ip = if ip_len == 4 {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(ip_bytes);
            IpAddr::V4(Ipv4Addr::from(octets))
        } else {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(ip_bytes);
            IpAddr::V6(Ipv6Addr::from(octets))
        };

        let port_at = 1 + ip_len;
        let port = u16::from_be_bytes([payload[port_at], payload[port_at + 1]]);

        let mut auth_key = [0u8; AUTH_KEY_LEN];
        auth_key.copy_from_slice(&payload[port_at + 2..]);

        Ok(Self {
            dc_id: i32::from(dc_id),
            address: SocketAddr::new(ip, port),
            auth_key,
        })
    }

    /// Encodes the session back into its string form.
    pub fn encode(&self) -> String {
        let mut payload = Vec::with_capacity(IPV6_PAYLOAD_LEN);
        payload.push(u8::try_from(self.dc_id).unwrap_or_default());
        match self.address.ip() {
            IpAddr::V4(ip) => payload.extend_from_slice(&ip.octets()),
            IpAddr::V6(ip) => payload.extend_from_slice(&ip.octets()),
        }
        payload.extend_from_slice(&self.address.port().to_be_bytes());
        payload.extend_from_slice(&self.auth_key);

        format!("{VERSION}{}", URL_SAFE_LENIENT.encode(payload))
    }

    /// Returns the address with its port replaced.
    pub fn address_with_port(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.address.ip(), port)
    }
}

impl fmt::Debug for SessionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionString")
            .field("dc_id", &self.dc_id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
