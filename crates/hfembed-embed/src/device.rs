use anyhow::{anyhow, Result};
use candle_core::Device;
use hfembed_core::types::DevicePreference;

pub fn select_device(pref: DevicePreference) -> Result<Device> {
    match pref {
        DevicePreference::Cpu => {
            tracing::info!("Device: CPU");
            Ok(Device::Cpu)
        }
        DevicePreference::Metal => metal().ok_or_else(|| anyhow!("Metal device requested but unavailable")),
        DevicePreference::Auto => Ok(metal().unwrap_or_else(|| {
            tracing::info!("Device: CPU");
            Device::Cpu
        })),
    }
}

#[cfg(feature = "metal")]
fn metal() -> Option<Device> {
    match Device::new_metal(0) {
        Ok(dev) => {
            tracing::info!("Device: Metal (MPS)");
            Some(dev)
        }
        Err(e) => {
            tracing::warn!("Metal init failed: {e}");
            None
        }
    }
}

#[cfg(not(feature = "metal"))]
fn metal() -> Option<Device> { None }
