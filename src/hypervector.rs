// SPDX-License-Identifier: PMPL-1.0-or-later

//! Hypervector wire format: a compact binary encoding for the
//! high-dimensional vectors used to represent fact/rule similarity in
//! the branch scorer's diversity check.
//!
//! Layout: `b"HVEC"` magic, `u16` version (LE), `u32` dimensions (LE),
//! `u8` encoding tag, payload, trailing `u32` CRC32 (LE) over every
//! preceding byte.

use crate::errors::{EngineError, EngineResult, ErrorContext, ErrorKind};

const MAGIC: &[u8; 4] = b"HVEC";
const VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One bit per dimension: 1 = +1.0, 0 = -1.0.
    Bipolar,
    /// One bit per dimension: 1 = 1.0, 0 = 0.0.
    Binary,
    /// Four bytes per dimension, IEEE-754 LE.
    Float32,
}

impl Encoding {
    fn code(self) -> u8 {
        match self {
            Encoding::Binary => 0x01,
            Encoding::Bipolar => 0x02,
            Encoding::Float32 => 0x03,
        }
    }

    fn from_code(code: u8) -> EngineResult<Self> {
        match code {
            0x01 => Ok(Encoding::Binary),
            0x02 => Ok(Encoding::Bipolar),
            0x03 => Ok(Encoding::Float32),
            other => Err(malformed(format!("unknown hypervector encoding tag {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hypervector {
    pub dimensions: u32,
    pub encoding: Encoding,
    /// Canonical in-memory form regardless of wire encoding: -1.0/1.0
    /// for bipolar, 0.0/1.0 for binary, arbitrary for float32.
    pub values: Vec<f32>,
}

impl Hypervector {
    pub fn new(encoding: Encoding, values: Vec<f32>) -> Self {
        Self {
            dimensions: values.len() as u32,
            encoding,
            values,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 2 + 4 + 1 + self.payload_len() + 4);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&self.dimensions.to_le_bytes());
        buf.push(self.encoding.code());

        match self.encoding {
            Encoding::Bipolar | Encoding::Binary => {
                let threshold = if self.encoding == Encoding::Bipolar { 0.0 } else { 0.5 };
                for chunk in self.values.chunks(8) {
                    let mut byte = 0u8;
                    for (i, v) in chunk.iter().enumerate() {
                        if *v > threshold {
                            byte |= 1 << i;
                        }
                    }
                    buf.push(byte);
                }
            }
            Encoding::Float32 => {
                for v in &self.values {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
        }

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    fn payload_len(&self) -> usize {
        match self.encoding {
            Encoding::Bipolar | Encoding::Binary => self.dimensions.div_ceil(8) as usize,
            Encoding::Float32 => self.dimensions as usize * 4,
        }
    }

    pub fn decode(bytes: &[u8]) -> EngineResult<Self> {
        if bytes.len() < 4 + 2 + 4 + 1 + 4 {
            return Err(malformed("hypervector buffer shorter than fixed header+crc"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(malformed("bad magic bytes, expected HVEC"));
        }

        let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let expected_crc = u32::from_le_bytes(crc_bytes.try_into().unwrap());
        let actual_crc = crc32fast::hash(body);
        if actual_crc != expected_crc {
            return Err(malformed(format!(
                "CRC mismatch: expected {expected_crc:#010x}, computed {actual_crc:#010x}"
            )));
        }

        let version = u16::from_le_bytes([body[4], body[5]]);
        if version != VERSION {
            return Err(malformed(format!("unsupported hypervector version {version}")));
        }
        let dimensions = u32::from_le_bytes(body[6..10].try_into().unwrap());
        let encoding = Encoding::from_code(body[10])?;
        let payload = &body[11..];

        let values = match encoding {
            Encoding::Bipolar | Encoding::Binary => {
                let expected_bytes = dimensions.div_ceil(8) as usize;
                if payload.len() != expected_bytes {
                    return Err(malformed(format!(
                        "payload length {} does not match expected {expected_bytes} bytes for {dimensions} bit-packed dimensions",
                        payload.len()
                    )));
                }
                let (on, off) = if encoding == Encoding::Bipolar { (1.0, -1.0) } else { (1.0, 0.0) };
                (0..dimensions as usize)
                    .map(|i| {
                        let byte = payload[i / 8];
                        if byte & (1 << (i % 8)) != 0 {
                            on
                        } else {
                            off
                        }
                    })
                    .collect()
            }
            Encoding::Float32 => {
                let expected_bytes = dimensions as usize * 4;
                if payload.len() != expected_bytes {
                    return Err(malformed(format!(
                        "payload length {} does not match expected {expected_bytes} bytes for {dimensions} float32 dimensions",
                        payload.len()
                    )));
                }
                payload
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
                    .collect()
            }
        };

        Ok(Self {
            dimensions,
            encoding,
            values,
        })
    }
}

fn malformed(message: impl Into<String>) -> EngineError {
    EngineError::new(
        ErrorKind::InputMalformed,
        message,
        ErrorContext::new("hypervector::decode", "hypervector"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bipolar_round_trips() {
        let hv = Hypervector::new(Encoding::Bipolar, vec![1.0, -1.0, 1.0, 1.0, -1.0]);
        let bytes = hv.encode();
        let decoded = Hypervector::decode(&bytes).expect("should decode");
        assert_eq!(decoded.dimensions, 5);
        assert_eq!(decoded.values, vec![1.0, -1.0, 1.0, 1.0, -1.0]);
    }

    #[test]
    fn float32_round_trips() {
        let hv = Hypervector::new(Encoding::Float32, vec![0.5, -0.25, 3.75]);
        let bytes = hv.encode();
        let decoded = Hypervector::decode(&bytes).expect("should decode");
        assert_eq!(decoded.values, vec![0.5, -0.25, 3.75]);
    }

    #[test]
    fn mutated_crc_fails_to_decode() {
        let hv = Hypervector::new(Encoding::Binary, vec![1.0, 0.0, 1.0]);
        let mut bytes = hv.encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(Hypervector::decode(&bytes).is_err());
    }

    #[test]
    fn bad_magic_rejected() {
        let bytes = vec![0u8; 16];
        assert!(Hypervector::decode(&bytes).is_err());
    }
}
