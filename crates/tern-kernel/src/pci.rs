//! Enumerated PCI device table.

use alloc::vec::Vec;
use spin::RwLock;

use tern_hal::PciBus;
use tern_ipc::PciDevice;

/// PCI devices in enumeration order, behind a read/write lock.
///
/// Hot-plug may add or remove entries while kernqueries read.
#[derive(Default)]
pub struct PciTable {
    devices: RwLock<Vec<PciDevice>>,
}

impl PciTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_devices(devices: Vec<PciDevice>) -> Self {
        Self {
            devices: RwLock::new(devices),
        }
    }

    /// Append a device, returning its position
    pub fn add(&self, device: PciDevice) -> usize {
        let mut devices = self.devices.write();
        devices.push(device);
        devices.len() - 1
    }

    /// Remove the device at `position`; later devices shift down
    pub fn remove(&self, position: usize) -> Option<PciDevice> {
        let mut devices = self.devices.write();
        (position < devices.len()).then(|| devices.remove(position))
    }

    pub fn clear(&self) {
        self.devices.write().clear();
    }
}

impl PciBus for PciTable {
    fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    fn device_at(&self, position: usize) -> Option<PciDevice> {
        self.devices.read().get(position).copied()
    }
}
