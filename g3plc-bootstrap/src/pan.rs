//! PAN descriptor filtering and selection
//!
//! Discovery returns one descriptor per beacon heard. Descriptors below
//! the link-quality floor or advertising an unreachable route are
//! discarded; among the survivors the device picks the lowest route
//! cost, breaking ties on link quality.

use g3plc_core::{PanId, ShortAddress};

/// Minimum acceptable link quality towards the LBA
pub const MIN_LINK_QUALITY: u8 = 53;

/// Route cost advertised by a beacon with no path to the coordinator
pub const ROUTE_COST_INFINITY: u16 = 0x7FF;

/// One discovered PAN as reported by a beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanDescriptor {
    pub pan_id: PanId,
    /// Short address of the agent that sent the beacon
    pub lba_address: ShortAddress,
    /// Cumulative route cost from the agent to the coordinator
    pub route_cost: u16,
    /// Link quality of the received beacon
    pub link_quality: u8,
}

impl PanDescriptor {
    pub fn new(pan_id: PanId, lba_address: ShortAddress, route_cost: u16, link_quality: u8) -> Self {
        Self {
            pan_id,
            lba_address,
            route_cost,
            link_quality,
        }
    }
}

/// Tracks the best usable descriptor seen so far.
#[derive(Debug, Default)]
pub struct PanSelector {
    best: Option<PanDescriptor>,
}

impl PanSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consider one descriptor. Returns true when it was usable.
    pub fn offer(&mut self, descriptor: PanDescriptor) -> bool {
        if descriptor.link_quality < MIN_LINK_QUALITY {
            return false;
        }
        if descriptor.route_cost >= ROUTE_COST_INFINITY {
            return false;
        }
        let better = match &self.best {
            None => true,
            Some(current) => {
                descriptor.route_cost < current.route_cost
                    || (descriptor.route_cost == current.route_cost
                        && descriptor.link_quality > current.link_quality)
            }
        };
        if better {
            self.best = Some(descriptor);
        }
        true
    }

    pub fn best(&self) -> Option<&PanDescriptor> {
        self.best.as_ref()
    }

    pub fn take(&mut self) -> Option<PanDescriptor> {
        self.best.take()
    }
}
