//! Medium activity tracking for the bootstrap check windows

/// Traffic classes a device listens for while deciding whether the
/// medium is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaActivity {
    /// Beacon frame from a nearby PAN
    Beacon,
    /// LBP traffic from another joining device
    Bootstrap,
    /// Routing traffic (LOADng RREQ/RREP)
    Routing,
}

/// Accumulates observed activity over one check window.
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaMonitor {
    beacons: u32,
    bootstrap: u32,
    routing: u32,
}

impl MediaMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, activity: MediaActivity) {
        match activity {
            MediaActivity::Beacon => self.beacons += 1,
            MediaActivity::Bootstrap => self.bootstrap += 1,
            MediaActivity::Routing => self.routing += 1,
        }
    }

    /// Any activity during the window marks the medium busy
    pub fn busy(&self) -> bool {
        self.beacons > 0 || self.bootstrap > 0 || self.routing > 0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
