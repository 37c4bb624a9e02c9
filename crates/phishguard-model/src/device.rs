//! Device selection: CUDA > Metal > CPU fallback.

use candle_core::Device;
use phishguard_core::{PhishGuardError, Result};

/// Which compute device the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePreference {
    /// Best available accelerator, CPU otherwise.
    Auto,
    /// Always CPU.
    Cpu,
}

impl std::str::FromStr for DevicePreference {
    type Err = PhishGuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            other => Err(PhishGuardError::Config(format!(
                "unknown device '{other}' (expected 'auto' or 'cpu')"
            ))),
        }
    }
}

/// Select a compute device according to `preference`.
///
/// With [`DevicePreference::Auto`], tries CUDA first (when compiled with the
/// `cuda` feature), then Metal (when compiled with `metal`), then falls back
/// to CPU.
pub fn select_device(preference: DevicePreference) -> Device {
    if preference == DevicePreference::Cpu {
        tracing::info!("Using CPU device (configured)");
        return Device::Cpu;
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            tracing::info!("Using CUDA device 0");
            return device;
        }
        tracing::warn!("CUDA feature enabled but no GPU available, falling back");
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            tracing::info!("Using Metal device 0");
            return device;
        }
        tracing::warn!("Metal feature enabled but no device available, falling back");
    }

    tracing::info!("Using CPU device");
    Device::Cpu
}

/// Short name of the backend behind `device`, for status reporting.
pub fn device_label(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}
