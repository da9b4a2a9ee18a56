//! Platform detection
//!
//! Provides OS and architecture information using standard Unix conventions:
//! - macOS → `"darwin"` (kernel name)
//! - Linux → `"linux"`
//! - Windows → `"windows"`
//!
//! Platform info is cached on first access.

use std::path::Path;
use std::sync::LazyLock;

/// Current platform information (cached)
///
/// # Example
/// ```
/// use modlink_core::platform::CURRENT_PLATFORM;
///
/// let banner = format!("modlink on {}/{}", CURRENT_PLATFORM.os, CURRENT_PLATFORM.arch);
/// assert!(banner.starts_with("modlink on "));
/// ```
pub static CURRENT_PLATFORM: LazyLock<Platform> = LazyLock::new(Platform::detect);

/// Platform information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// OS: "darwin" (macOS), "linux", "windows", "unknown"
    pub os: &'static str,
    /// CPU architecture: "x86_64", "aarch64", etc.
    pub arch: &'static str,
}

impl Platform {
    /// Detect the platform this binary was built for
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
            arch: std::env::consts::ARCH,
        }
    }

    const fn detect_os() -> &'static str {
        #[cfg(target_os = "macos")]
        {
            "darwin"
        }

        #[cfg(target_os = "linux")]
        {
            "linux"
        }

        #[cfg(target_os = "windows")]
        {
            "windows"
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            "unknown"
        }
    }

    /// Whether absolute paths on this platform start with a drive letter
    pub fn has_drive_letters(&self) -> bool {
        self.os == "windows"
    }
}

/// Check whether a drive letter is mounted
///
/// Only meaningful where [`Platform::has_drive_letters`] holds.
pub fn drive_exists(letter: char) -> bool {
    Path::new(&format!("{letter}:\\")).exists()
}
