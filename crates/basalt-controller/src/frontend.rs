//! Frontend adapters: the OS-facing side of a volume.
//!
//! A frontend presents the volume as a kernel block device and routes its
//! reads and writes into the data plane through the
//! [`basalt_types::ReaderWriterUnmapperAt`] capability. The device
//! machinery itself (iSCSI target daemon, ublk driver) is an external
//! collaborator behind [`DeviceService`]; the adapters here only drive its
//! lifecycle.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use basalt_types::{FrontendState, ReaderWriterUnmapperAt};

/// Errors from frontend lifecycle operations.
#[derive(Debug, Error)]
pub enum FrontendError {
    /// The operation requires the frontend to be down.
    #[error("cannot {operation} the active frontend {name}")]
    Busy { operation: String, name: String },

    /// `startup` or `upgrade` before `init`.
    #[error("frontend is not initialized")]
    NotInitialized,

    /// Device machinery failure.
    #[error("device error: {0}")]
    Io(#[from] io::Error),
}

/// External block-device machinery consumed by the adapters.
pub trait DeviceService: Send {
    fn init_device(&mut self) -> io::Result<()>;
    fn start(&mut self, rw: Arc<dyn ReaderWriterUnmapperAt>) -> io::Result<()>;
    fn shutdown(&mut self) -> io::Result<()>;
    fn endpoint(&self) -> String;
    fn prepare_upgrade(&mut self) -> io::Result<()>;
    fn finish_upgrade(&mut self) -> io::Result<()>;
    fn expand(&mut self, size: i64) -> io::Result<()>;
}

/// Creates device services for a named volume.
pub trait DeviceCreator: Send + Sync {
    fn create(&self, name: &str, size: i64, frontend_name: &str)
    -> io::Result<Box<dyn DeviceService>>;
}

/// The frontend capability set.
pub trait Frontend: Send {
    fn frontend_name(&self) -> &str;
    fn init(&mut self, name: &str, size: i64, sector_size: i64) -> Result<(), FrontendError>;
    fn startup(&mut self, rw: Arc<dyn ReaderWriterUnmapperAt>) -> Result<(), FrontendError>;
    fn shutdown(&mut self) -> Result<(), FrontendError>;
    fn state(&self) -> FrontendState;
    fn endpoint(&self) -> String;
    fn upgrade(
        &mut self,
        name: &str,
        size: i64,
        sector_size: i64,
        rw: Arc<dyn ReaderWriterUnmapperAt>,
    ) -> Result<(), FrontendError>;
    fn expand(&mut self, size: i64) -> Result<(), FrontendError>;
}

/// iSCSI (tgt) frontend.
pub struct Tgt {
    creator: Box<dyn DeviceCreator>,
    dev: Option<Box<dyn DeviceService>>,
    frontend_name: String,
    is_up: bool,
}

impl Tgt {
    pub fn new(frontend_name: impl Into<String>, creator: Box<dyn DeviceCreator>) -> Self {
        Self {
            creator,
            dev: None,
            frontend_name: frontend_name.into(),
            is_up: false,
        }
    }
}

impl Frontend for Tgt {
    fn frontend_name(&self) -> &str {
        &self.frontend_name
    }

    fn init(&mut self, name: &str, size: i64, _sector_size: i64) -> Result<(), FrontendError> {
        let mut dev = self.creator.create(name, size, &self.frontend_name)?;
        dev.init_device()?;
        self.dev = Some(dev);
        self.is_up = false;
        Ok(())
    }

    fn startup(&mut self, rw: Arc<dyn ReaderWriterUnmapperAt>) -> Result<(), FrontendError> {
        let dev = self.dev.as_mut().ok_or(FrontendError::NotInitialized)?;
        dev.start(rw)?;
        self.is_up = true;
        info!(frontend = %self.frontend_name, "frontend up");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), FrontendError> {
        if let Some(dev) = self.dev.as_mut() {
            dev.shutdown()?;
        }
        self.is_up = false;
        info!(frontend = %self.frontend_name, "frontend down");
        Ok(())
    }

    fn state(&self) -> FrontendState {
        if self.is_up {
            FrontendState::Up
        } else {
            FrontendState::Down
        }
    }

    fn endpoint(&self) -> String {
        if self.is_up {
            self.dev.as_ref().map(|d| d.endpoint()).unwrap_or_default()
        } else {
            String::new()
        }
    }

    fn upgrade(
        &mut self,
        name: &str,
        size: i64,
        _sector_size: i64,
        rw: Arc<dyn ReaderWriterUnmapperAt>,
    ) -> Result<(), FrontendError> {
        let mut dev = self.creator.create(name, size, &self.frontend_name)?;
        dev.prepare_upgrade()?;
        dev.start(rw)?;
        dev.finish_upgrade()?;
        self.dev = Some(dev);
        self.is_up = true;
        info!(frontend = %self.frontend_name, volume = name, "finished upgrade");
        Ok(())
    }

    fn expand(&mut self, size: i64) -> Result<(), FrontendError> {
        if self.is_up {
            return Err(FrontendError::Busy {
                operation: "expand".to_string(),
                name: self.frontend_name.clone(),
            });
        }
        match self.dev.as_mut() {
            Some(dev) => Ok(dev.expand(size)?),
            None => Ok(()),
        }
    }
}

/// ublk frontend.
pub struct Ublk {
    creator: Box<dyn DeviceCreator>,
    dev: Option<Box<dyn DeviceService>>,
    frontend_name: String,
    queue_depth: u32,
    is_up: bool,
}

impl Ublk {
    pub fn new(
        frontend_name: impl Into<String>,
        queue_depth: u32,
        creator: Box<dyn DeviceCreator>,
    ) -> Self {
        Self {
            creator,
            dev: None,
            frontend_name: frontend_name.into(),
            queue_depth,
            is_up: false,
        }
    }

    /// Queue depth handed to the ublk driver.
    pub fn queue_depth(&self) -> u32 {
        self.queue_depth
    }
}

impl Frontend for Ublk {
    fn frontend_name(&self) -> &str {
        &self.frontend_name
    }

    fn init(&mut self, name: &str, size: i64, _sector_size: i64) -> Result<(), FrontendError> {
        info!(frontend = %self.frontend_name, queue_depth = self.queue_depth, "initializing ublk device");
        let mut dev = self.creator.create(name, size, &self.frontend_name)?;
        dev.init_device()?;
        self.dev = Some(dev);
        self.is_up = false;
        Ok(())
    }

    fn startup(&mut self, rw: Arc<dyn ReaderWriterUnmapperAt>) -> Result<(), FrontendError> {
        let dev = self.dev.as_mut().ok_or(FrontendError::NotInitialized)?;
        dev.start(rw)?;
        self.is_up = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), FrontendError> {
        if let Some(dev) = self.dev.as_mut() {
            dev.shutdown()?;
        }
        self.is_up = false;
        Ok(())
    }

    fn state(&self) -> FrontendState {
        if self.is_up {
            FrontendState::Up
        } else {
            FrontendState::Down
        }
    }

    fn endpoint(&self) -> String {
        if self.is_up {
            self.dev.as_ref().map(|d| d.endpoint()).unwrap_or_default()
        } else {
            String::new()
        }
    }

    fn upgrade(
        &mut self,
        _name: &str,
        _size: i64,
        _sector_size: i64,
        _rw: Arc<dyn ReaderWriterUnmapperAt>,
    ) -> Result<(), FrontendError> {
        // Live upgrade is not supported by the ublk driver.
        Ok(())
    }

    fn expand(&mut self, size: i64) -> Result<(), FrontendError> {
        if self.is_up {
            return Err(FrontendError::Busy {
                operation: "expand".to_string(),
                name: self.frontend_name.clone(),
            });
        }
        match self.dev.as_mut() {
            Some(dev) => Ok(dev.expand(size)?),
            None => Ok(()),
        }
    }
}
