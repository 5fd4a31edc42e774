//! In-memory datagram links for exercising the stack without a network

use crate::datagram::DatagramLink;
use async_trait::async_trait;
use g3plc_core::{G3Error, G3Result, ShortAddress};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

type Routes = Arc<Mutex<HashMap<ShortAddress, mpsc::UnboundedSender<(ShortAddress, Vec<u8>)>>>>;

/// Switchboard connecting any number of [`MemoryLink`] endpoints
#[derive(Default, Clone)]
pub struct MemoryHub {
    routes: Routes,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node endpoint under the given short address
    pub fn attach(&self, address: ShortAddress) -> MemoryLink {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_routes().insert(address, tx);
        MemoryLink {
            address,
            routes: self.routes.clone(),
            rx,
        }
    }

    fn lock_routes(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ShortAddress, mpsc::UnboundedSender<(ShortAddress, Vec<u8>)>>>
    {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One endpoint attached to a [`MemoryHub`]
pub struct MemoryLink {
    address: ShortAddress,
    routes: Routes,
    rx: mpsc::UnboundedReceiver<(ShortAddress, Vec<u8>)>,
}

impl MemoryLink {
    pub fn address(&self) -> ShortAddress {
        self.address
    }
}

#[async_trait]
impl DatagramLink for MemoryLink {
    async fn send_to(&mut self, destination: ShortAddress, payload: &[u8]) -> G3Result<()> {
        let routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let target = routes.get(&destination).ok_or_else(|| {
            G3Error::Link(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                format!("no node at {}", destination),
            ))
        })?;
        target
            .send((self.address, payload.to_vec()))
            .map_err(|_| {
                G3Error::Link(std::io::Error::new(
                    std::io::ErrorKind::ConnectionAborted,
                    format!("node at {} has left", destination),
                ))
            })
    }

    async fn receive_from(&mut self) -> G3Result<(ShortAddress, Vec<u8>)> {
        self.rx.recv().await.ok_or_else(|| {
            G3Error::Link(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "all peers detached",
            ))
        })
    }
}
