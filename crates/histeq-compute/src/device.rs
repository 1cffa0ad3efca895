use std::fmt::Write;

use crate::error::ComputeError;

/// Largest work-group any host device accepts.
pub const MAX_WORK_GROUP_SIZE: usize = 1 << 16;

/// How a device schedules work-groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Work-groups run concurrently on every available core.
    Parallel,
    /// Work-groups run one after the other on a single thread.
    Serial,
}

/// Description of a compute device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// index of the platform the device belongs to
    pub platform_id: usize,
    /// index of the device on its platform
    pub device_id: usize,
    /// human-readable device name
    pub name: String,
    /// scheduling model of the device
    pub kind: DeviceKind,
    /// number of work-groups that can execute at the same time
    pub compute_units: usize,
    /// largest accepted work-group size
    pub max_work_group_size: usize,
}

/// Description of a platform and its devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    /// index of the platform
    pub id: usize,
    /// human-readable platform name
    pub name: String,
    /// platform vendor
    pub vendor: String,
    /// devices of the platform
    pub devices: Vec<DeviceInfo>,
}

/// Enumerate the available platforms and their devices.
///
/// The host platform always exists and exposes a parallel device backed by all
/// cores and a serial device backed by one thread.
pub fn platforms() -> Vec<PlatformInfo> {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    vec![PlatformInfo {
        id: 0,
        name: "Host".to_string(),
        vendor: "rayon".to_string(),
        devices: vec![
            DeviceInfo {
                platform_id: 0,
                device_id: 0,
                name: format!("CPU ({cores} threads)"),
                kind: DeviceKind::Parallel,
                compute_units: cores,
                max_work_group_size: MAX_WORK_GROUP_SIZE,
            },
            DeviceInfo {
                platform_id: 0,
                device_id: 1,
                name: "CPU (serial)".to_string(),
                kind: DeviceKind::Serial,
                compute_units: 1,
                max_work_group_size: MAX_WORK_GROUP_SIZE,
            },
        ],
    }]
}

/// Look up a device by platform and device index.
///
/// # Errors
///
/// Returns [`ComputeError::InvalidPlatform`] or [`ComputeError::InvalidDevice`]
/// if either index does not exist.
pub fn device_info(platform_id: usize, device_id: usize) -> Result<DeviceInfo, ComputeError> {
    let platforms = platforms();
    let available = platforms.len();

    let platform = platforms
        .into_iter()
        .nth(platform_id)
        .ok_or(ComputeError::InvalidPlatform {
            platform_id,
            available,
        })?;

    let available = platform.devices.len();
    platform
        .devices
        .into_iter()
        .nth(device_id)
        .ok_or(ComputeError::InvalidDevice {
            platform_id,
            device_id,
            available,
        })
}

/// Render every platform and device as a human-readable listing.
pub fn list_platforms_devices() -> String {
    let mut out = String::new();
    for platform in platforms() {
        let _ = writeln!(
            out,
            "Platform {}, {}, {}",
            platform.id, platform.name, platform.vendor
        );
        for device in &platform.devices {
            let _ = writeln!(
                out,
                "  Device {}, {}, compute units: {}, max work-group size: {}",
                device.device_id, device.name, device.compute_units, device.max_work_group_size
            );
        }
    }
    out
}
