//! Compute device negotiation for embedding backends.
//!
//! A GPU request is a preference, not a requirement: [`negotiate`] resolves
//! it against what the backend and host can actually do and reports whether
//! it had to fall back to the CPU. Callers log the fallback; it is never an
//! error.

use anyhow::bail;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            other => bail!("Unknown embedding device: '{}'. Must be cpu or cuda.", other),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

/// Outcome of a device negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceResolution {
    pub requested: Device,
    pub resolved: Device,
    /// True when an accelerator was requested but the CPU was selected.
    pub fell_back: bool,
}

/// Resolve the requested device against backend and host capabilities.
pub fn negotiate(
    requested: Device,
    backend_supports_accelerator: bool,
    accelerator_present: bool,
) -> DeviceResolution {
    let resolved = match requested {
        Device::Cuda if backend_supports_accelerator && accelerator_present => Device::Cuda,
        _ => Device::Cpu,
    };
    DeviceResolution {
        requested,
        resolved,
        fell_back: requested != resolved,
    }
}

/// Probe the host for an NVIDIA driver.
pub fn detect_accelerator() -> bool {
    Path::new("/proc/driver/nvidia/version").exists() || Path::new("/dev/nvidia0").exists()
}
