// SPDX-License-Identifier: GPL-3.0-or-later
//! Opening the `canvas` TUN interface.
//!
//! Out of scope per spec §1 is *creating and configuring* the interface
//! (the spec assumes a pre-created, routable device); what's implemented
//! here is just enough to hand the rest of the pipeline a real file
//! descriptor to read from when running as the actual binary.
use std::io::Read;
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

use crate::error::{IngestError, Result};

/// A TUN device, or an in-memory stand-in used by tests.
pub trait TunDevice: Read + Send {
    #[cfg(unix)]
    fn raw_fd(&self) -> RawFd;
}

#[cfg(unix)]
impl AsRawFd for tun::platform::Device {
    fn as_raw_fd(&self) -> RawFd {
        tun::Device::as_raw_fd(self)
    }
}

#[cfg(unix)]
impl TunDevice for tun::platform::Device {
    fn raw_fd(&self) -> RawFd {
        AsRawFd::as_raw_fd(self)
    }
}

/// Open (and bring up) the named TUN interface.
pub fn open(name: &str) -> Result<tun::platform::Device> {
    let mut config = tun::Configuration::default();
    config.name(name).up();
    tun::create(&config).map_err(|err| IngestError::Open {
        name: name.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, err),
    })
}
