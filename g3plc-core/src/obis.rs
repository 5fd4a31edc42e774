use crate::error::{G3Error, G3Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OBIS (Object Identification System) code identifying a COSEM object
///
/// OBIS codes are 6-byte identifiers used in DLMS/COSEM to uniquely identify
/// objects in a logical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    /// Create a new OBIS code from individual group values
    ///
    /// # Arguments
    ///
    /// * `a` - Medium (1 = electricity, 0 = abstract)
    /// * `b` - Channel
    /// * `c` - Physical value group
    /// * `d` - Measurement type group
    /// * `e` - Tariff group
    /// * `f` - Billing period group
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }

    /// Create an OBIS code from a 6-byte slice
    pub fn from_bytes(bytes: &[u8]) -> G3Result<Self> {
        if bytes.len() != 6 {
            return Err(G3Error::Decode(format!(
                "OBIS code requires 6 bytes, got {}",
                bytes.len()
            )));
        }
        let mut code = [0u8; 6];
        code.copy_from_slice(bytes);
        Ok(Self { bytes: code })
    }

    /// Parse an OBIS code from dotted string format, e.g. "1.0.1.8.0.255"
    pub fn from_string(s: &str) -> G3Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 6 {
            return Err(G3Error::Decode(format!(
                "Invalid OBIS code format: {}",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = part
                .parse::<u8>()
                .map_err(|_| G3Error::Decode(format!("Invalid OBIS group value: {}", part)))?;
        }

        Ok(Self { bytes })
    }

    /// Get the OBIS code as a byte array
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }

    /// Get the OBIS code as a copied byte array
    pub fn to_bytes(&self) -> [u8; 6] {
        self.bytes
    }

    pub fn a(&self) -> u8 {
        self.bytes[0]
    }

    pub fn b(&self) -> u8 {
        self.bytes[1]
    }

    pub fn c(&self) -> u8 {
        self.bytes[2]
    }

    pub fn d(&self) -> u8 {
        self.bytes[3]
    }

    pub fn e(&self) -> u8 {
        self.bytes[4]
    }

    pub fn f(&self) -> u8 {
        self.bytes[5]
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}",
            self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3], self.bytes[4],
            self.bytes[5]
        )
    }
}

/// COSEM attribute reference: interface class, object instance and attribute id
///
/// This is the unit the GET/SET services operate on, and the key the server
/// dispatches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Interface class id (e.g. 3 = register, 7 = profile generic)
    pub class_id: u16,
    /// Logical name of the object instance
    pub obis: ObisCode,
    /// Attribute id, starting at 1 (logical name)
    pub attribute: u8,
}

impl AttributeDescriptor {
    pub const fn new(class_id: u16, obis: ObisCode, attribute: u8) -> Self {
        Self {
            class_id,
            obis,
            attribute,
        }
    }
}

impl fmt::Display for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.class_id, self.obis, self.attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obis_code_new() {
        let code = ObisCode::new(1, 0, 1, 8, 0, 255);
        assert_eq!(code.a(), 1);
        assert_eq!(code.d(), 8);
        assert_eq!(code.f(), 255);
    }

    #[test]
    fn test_obis_code_from_string() {
        let code = ObisCode::from_string("1.0.1.8.0.255").unwrap();
        assert_eq!(code, ObisCode::new(1, 0, 1, 8, 0, 255));
    }

    #[test]
    fn test_obis_code_from_string_rejects_short() {
        assert!(ObisCode::from_string("1.0.1.8.0").is_err());
        assert!(ObisCode::from_string("1.0.1.8.0.999").is_err());
    }

    #[test]
    fn test_obis_code_display() {
        let code = ObisCode::new(0, 0, 29, 2, 0, 255);
        assert_eq!(format!("{}", code), "0.0.29.2.0.255");
    }

    #[test]
    fn test_obis_code_from_bytes() {
        let code = ObisCode::from_bytes(&[0, 0, 40, 0, 0, 255]).unwrap();
        assert_eq!(code, ObisCode::new(0, 0, 40, 0, 0, 255));
        assert!(ObisCode::from_bytes(&[1, 2, 3]).is_err());
    }
}
