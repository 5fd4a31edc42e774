//! OBIS object registry
//!
//! Maps (logical name, interface class) pairs to served objects, each paired
//! with per-association read/write attribute masks. The table holds at most
//! [`MAX_OBIS_OBJECTS`] entries; registration order is the order the
//! association object list reports to clients.

use g3plc_codec::AccessSelector;
use g3plc_core::{
    DataAccessResult, DataValue, G3Error, G3Result, MAX_ASSOCIATIONS, MAX_OBIS_OBJECTS, ObisCode,
};

/// One served COSEM object.
///
/// Attribute 1 (the logical name) is answered by the registry itself, so
/// implementations only ever see attributes from 2 upward. Returning a
/// [`DataAccessResult`] delivers that code to the client in place of data.
pub trait CosemObject: Send {
    fn class_id(&self) -> u16;

    fn logical_name(&self) -> ObisCode;

    fn get_attribute(
        &mut self,
        attribute: u8,
        selector: Option<&AccessSelector>,
    ) -> Result<DataValue, DataAccessResult>;

    /// Objects are read-only unless they override this.
    fn set_attribute(&mut self, attribute: u8, value: DataValue) -> Result<(), DataAccessResult> {
        let _ = (attribute, value);
        Err(DataAccessResult::ReadWriteDenied)
    }
}

/// Mask bit of `attribute`; attribute 1 occupies the top bit.
pub const fn attribute_bit(attribute: u8) -> u32 {
    if attribute == 0 || attribute > 32 {
        0
    } else {
        1u32 << (32 - attribute)
    }
}

/// Per-association attribute access masks of one registered object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRights {
    read: [u32; MAX_ASSOCIATIONS],
    write: [u32; MAX_ASSOCIATIONS],
}

impl AccessRights {
    pub const fn new(read: [u32; MAX_ASSOCIATIONS], write: [u32; MAX_ASSOCIATIONS]) -> Self {
        Self { read, write }
    }

    /// Every attribute readable by every association, nothing writable
    pub const fn read_only() -> Self {
        Self::new([u32::MAX; MAX_ASSOCIATIONS], [0; MAX_ASSOCIATIONS])
    }

    /// Every attribute readable and writable by every association
    pub const fn read_write() -> Self {
        Self::new([u32::MAX; MAX_ASSOCIATIONS], [u32::MAX; MAX_ASSOCIATIONS])
    }

    /// Same read mask for every association, nothing writable
    pub const fn read_mask(mask: u32) -> Self {
        Self::new([mask; MAX_ASSOCIATIONS], [0; MAX_ASSOCIATIONS])
    }

    pub fn can_read(&self, association: usize, attribute: u8) -> bool {
        self.read
            .get(association)
            .is_some_and(|mask| mask & attribute_bit(attribute) != 0)
    }

    pub fn can_write(&self, association: usize, attribute: u8) -> bool {
        self.write
            .get(association)
            .is_some_and(|mask| mask & attribute_bit(attribute) != 0)
    }
}

/// Registry entry: identity, rights and the object behind them
pub struct RegisteredObject {
    pub obis: ObisCode,
    pub class_id: u16,
    pub rights: AccessRights,
    pub object: Box<dyn CosemObject>,
}

/// Table the GET/SET dispatcher resolves attribute descriptors against
#[derive(Default)]
pub struct ObjectRegistry {
    entries: Vec<RegisteredObject>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds an object under the given rights mask.
    ///
    /// Fails when the table is full or when the (logical name, class) pair
    /// is already served.
    pub fn register(
        &mut self,
        rights: AccessRights,
        object: Box<dyn CosemObject>,
    ) -> G3Result<()> {
        if self.entries.len() >= MAX_OBIS_OBJECTS {
            return Err(G3Error::Config(format!(
                "OBIS table full ({} objects)",
                MAX_OBIS_OBJECTS
            )));
        }
        let obis = object.logical_name();
        let class_id = object.class_id();
        if self.find_index(&obis, class_id).is_some() {
            return Err(G3Error::Config(format!(
                "object {}:{} registered twice",
                class_id, obis
            )));
        }
        self.entries.push(RegisteredObject {
            obis,
            class_id,
            rights,
            object,
        });
        Ok(())
    }

    pub fn find_mut(&mut self, obis: &ObisCode, class_id: u16) -> Option<&mut RegisteredObject> {
        let index = self.find_index(obis, class_id)?;
        self.entries.get_mut(index)
    }

    fn find_index(&self, obis: &ObisCode, class_id: u16) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.obis == *obis && entry.class_id == class_id)
    }

    /// (class id, logical name) pairs in registration order
    pub fn descriptors(&self) -> Vec<(u16, ObisCode)> {
        self.entries
            .iter()
            .map(|entry| (entry.class_id, entry.obis))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
