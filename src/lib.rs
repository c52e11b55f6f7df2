//! # NAV350 Driver
//!
//! `nav350` is a driver for SICK NAV350 laser positioning sensors. It talks the
//! CoLa-A ASCII protocol over TCP: it logs in, changes operating modes, feeds
//! velocity updates, configures landmarks and mapping, and decodes pose,
//! reflector and scan replies into typed records.
//!
//! A background thread drains the socket into frames while requests are
//! matched with their replies one at a time.
//!
//! ```ignore
//! use nav350::{DriverConfig, Nav350Device, OperatingMode};
//!
//! let mut device = Nav350Device::new(DriverConfig::new("192.168.1.10"));
//! device.initialize()?;
//! device.set_operating_mode(OperatingMode::Navigation)?;
//! let data = device.get_navigation_data(1, 2)?;
//! println!("{:?}", data.pose);
//! device.shutdown()?;
//! ```

extern crate log;

pub mod base;
pub mod cmds;
mod config;
mod internals;
pub mod parsers;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod utils;

pub use crate::base::{Channel, DecodeError, Error, Frame, FrameReceiver, Result};
pub use crate::config::DriverConfig;
pub use crate::internals::*;
pub use crate::protocol::ColaAsciiProtocol;
pub use crate::types::{
    DeviceIdentity, Landmark, LandmarkData, NavigationData, OperatingMode, PoseRecord,
    ReflectorSet, ScanSector,
};

use crate::cmds::*;
use crate::parsers::*;
use crate::utils::{meters_to_millimeters, radians_to_millidegrees};
use log::{debug, error, trace, warn};
use std::io;
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// A live connection: writer channel, receiver thread and the socket handle used to stop it.
#[derive(Debug)]
struct Connection {
    channel: Channel<ColaAsciiProtocol, TcpStream>,
    receiver: FrameReceiver,
    socket: TcpStream,
}

/// Represents a connection to and control interface for a NAV350.
///
/// Every command method sends one request, waits for the matching reply and
/// decodes it. Decoded measurements are also kept as the latest snapshot
/// (`identity()`, `pose()`, `reflectors()`, `scan_sector()`); a failed command
/// leaves the snapshot untouched.
#[derive(Debug)]
pub struct Nav350Device {
    config: DriverConfig,
    connection: Option<Connection>,
    identity: Option<DeviceIdentity>,
    pose: Option<PoseRecord>,
    reflectors: Option<ReflectorSet>,
    scan: Option<ScanSector>,
}

impl Nav350Device {
    /// Constructs a new, unconnected `Nav350Device`.
    ///
    /// # Arguments
    ///
    /// * `config` - Address, port and timeouts of the device.
    pub fn new(config: DriverConfig) -> Nav350Device {
        trace!("Creating new Nav350Device for {}:{}", config.address, config.port);
        Nav350Device {
            config,
            connection: None,
            identity: None,
            pose: None,
            reflectors: None,
            scan: None,
        }
    }

    /// Connects, starts the receiver thread and logs in as authorized client.
    ///
    /// On failure nothing stays connected. Calling this on a live connection does nothing;
    /// a connection the peer has closed is torn down and opened again.
    pub fn initialize(&mut self) -> Result<()> {
        if self.is_connected() {
            debug!("Already connected, skipping initialize");
            return Ok(());
        }
        self.shutdown()?;

        let socket = transport::connect(
            &self.config.address,
            self.config.port,
            self.config.connect_timeout,
        )?;
        let reader = socket.try_clone()?;
        let writer = socket.try_clone()?;
        let (receiver, inbox) = FrameReceiver::spawn(
            ColaAsciiProtocol::with_max_frame_len(self.config.max_frame_len),
            reader,
            self.config.read_chunk_size,
        )?;
        let channel = Channel::new(
            ColaAsciiProtocol::with_max_frame_len(self.config.max_frame_len),
            writer,
            inbox,
        );
        self.connection = Some(Connection {
            channel,
            receiver,
            socket,
        });

        if let Err(e) = self.login() {
            error!("Login failed, closing connection: {}", e);
            if let Err(shutdown_err) = self.shutdown() {
                warn!("Error while closing connection: {}", shutdown_err);
            }
            return Err(e);
        }
        debug!("NAV350 initialized");
        Ok(())
    }

    /// Closes the socket and waits for the receiver thread to exit.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        trace!("Shutting down connection");
        let result = match connection.socket.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => {
                error!("Failed to shut down socket: {}", e);
                Err(Error::IoError(e))
            }
        };
        drop(connection.channel);
        connection.receiver.join();
        debug!("Connection closed");
        result
    }

    /// Returns `true` while the connection is up and the receiver is running.
    ///
    /// Turns `false` as soon as the receiver thread exits, even with no command in flight.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|connection| {
            connection.channel.is_alive() && !connection.receiver.is_finished()
        })
    }

    /// Identity from the last successful `get_identity`.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    /// Pose from the last reply that carried one.
    pub fn pose(&self) -> Option<&PoseRecord> {
        self.pose.as_ref()
    }

    /// Reflectors from the last reply that carried them.
    pub fn reflectors(&self) -> Option<&ReflectorSet> {
        self.reflectors.as_ref()
    }

    /// Scan sector from the last reply that carried one.
    pub fn scan_sector(&self) -> Option<&ScanSector> {
        self.scan.as_ref()
    }

    /// Logs in with the "authorized client" user level.
    pub fn login(&mut self) -> Result<()> {
        let cmd = CommandId::SetAccessMode
            .command()
            .unsigned(NAV350_ACCESS_LEVEL_AUTHORIZED)
            .arg(NAV350_AUTHORIZED_PASSWORD_HASH);
        let reply = self.transact(&cmd, self.config.reply_timeout)?;
        decode_reply(&reply, decode_access_mode)?;
        debug!("Logged in as authorized client");
        Ok(())
    }

    /// Gets part number, version and name of the device. Uses the default reply timeout.
    pub fn get_identity(&mut self) -> Result<DeviceIdentity> {
        self.get_identity_with_timeout(self.config.reply_timeout)
    }

    /// Gets the device identity with a specified timeout.
    ///
    /// # Arguments
    ///
    /// * `timeout` - The maximum duration to wait for a response.
    pub fn get_identity_with_timeout(&mut self, timeout: Duration) -> Result<DeviceIdentity> {
        let cmd = CommandId::DeviceIdent.command();
        let reply = self.transact(&cmd, timeout)?;
        let identity = decode_reply(&reply, decode_identity)?;
        trace!("Device identity: {:?}", identity);
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Switches the operating mode.
    ///
    /// The device only accepts some transitions (e.g. navigation is reached through standby).
    pub fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<()> {
        let cmd = CommandId::ChangeState.command().unsigned(mode.code());
        let reply = self.transact(&cmd, self.config.reply_timeout)?;
        decode_reply(&reply, decode_method_ack)?;
        debug!("Operating mode set to {:?}", mode);
        Ok(())
    }

    /// Sends the current vehicle velocity used for pose prediction.
    ///
    /// # Arguments
    ///
    /// * `x` - Velocity along x in m/s.
    /// * `y` - Velocity along y in m/s.
    /// * `phi` - Angular velocity in rad/s.
    /// * `timestamp` - Device time in milliseconds the velocity refers to.
    /// * `coord_base` - 0 for vehicle coordinates, 1 for world coordinates.
    pub fn set_speed(
        &mut self,
        x: f64,
        y: f64,
        phi: f64,
        timestamp: i32,
        coord_base: u8,
    ) -> Result<()> {
        let cmd = CommandId::SetSpeed
            .command()
            .signed(meters_to_millimeters(x))
            .signed(meters_to_millimeters(y))
            .signed(radians_to_millidegrees(phi))
            .signed(timestamp)
            .unsigned(coord_base);
        let reply = self.transact(&cmd, self.config.reply_timeout)?;
        decode_reply(&reply, decode_method_ack)?;
        Ok(())
    }

    /// Requests scan data in navigation mode and returns only the scan sector.
    ///
    /// # Arguments
    ///
    /// * `wait` - 1 to wait for the next sweep, 0 to return the last one.
    /// * `dataset` - Data set selector forwarded to the device.
    pub fn get_scan_data(&mut self, wait: u8, dataset: u8) -> Result<Option<ScanSector>> {
        let data = self.get_navigation_data(wait, dataset)?;
        Ok(data.scan)
    }

    /// Requests pose, reflectors and scan in navigation mode. Uses the default reply timeout.
    pub fn get_navigation_data(&mut self, wait: u8, dataset: u8) -> Result<NavigationData> {
        self.get_navigation_data_with_timeout(wait, dataset, self.config.reply_timeout)
    }

    /// Requests navigation data with a specified timeout.
    ///
    /// # Arguments
    ///
    /// * `wait` - 1 to wait for the next sweep, 0 to return the last one.
    /// * `dataset` - Data selection, see [`get_scan_data`](Self::get_scan_data).
    /// * `timeout` - The maximum duration to wait for a response.
    pub fn get_navigation_data_with_timeout(
        &mut self,
        wait: u8,
        dataset: u8,
        timeout: Duration,
    ) -> Result<NavigationData> {
        let cmd = CommandId::PosGetData
            .command()
            .unsigned(wait)
            .unsigned(dataset);
        let reply = self.transact(&cmd, timeout)?;
        let data = decode_reply(&reply, decode_navigation)?;
        if let Some(pose) = &data.pose {
            self.pose = Some(pose.clone());
        }
        if let Some(reflectors) = &data.reflectors {
            self.reflectors = Some(reflectors.clone());
        }
        if let Some(scan) = &data.scan {
            self.scan = Some(scan.clone());
        }
        Ok(data)
    }

    /// Requests reflectors and scan in landmark detection mode. Uses the default reply timeout.
    pub fn get_landmark_data(&mut self, wait: u8, dataset: u8) -> Result<LandmarkData> {
        self.get_landmark_data_with_timeout(wait, dataset, self.config.reply_timeout)
    }

    /// Requests landmark data with a specified timeout.
    pub fn get_landmark_data_with_timeout(
        &mut self,
        wait: u8,
        dataset: u8,
        timeout: Duration,
    ) -> Result<LandmarkData> {
        let cmd = CommandId::LmdGetData
            .command()
            .unsigned(wait)
            .unsigned(dataset);
        let reply = self.transact(&cmd, timeout)?;
        let data = decode_reply(&reply, decode_landmarks)?;
        if let Some(reflectors) = &data.reflectors {
            self.reflectors = Some(reflectors.clone());
        }
        if let Some(scan) = &data.scan {
            self.scan = Some(scan.clone());
        }
        Ok(data)
    }

    /// Runs one mapping sweep and returns the reflectors found. Uses the default reply timeout.
    pub fn do_mapping(&mut self) -> Result<Option<ReflectorSet>> {
        self.do_mapping_with_timeout(self.config.reply_timeout)
    }

    /// Runs one mapping sweep with a specified timeout.
    pub fn do_mapping_with_timeout(&mut self, timeout: Duration) -> Result<Option<ReflectorSet>> {
        let cmd = CommandId::DoMapping.command();
        let reply = self.transact(&cmd, timeout)?;
        let reflectors = decode_reply(&reply, decode_mapping)?;
        if let Some(reflectors) = &reflectors {
            debug!("Mapping found {} reflectors", reflectors.len());
            self.reflectors = Some(reflectors.clone());
        }
        Ok(reflectors)
    }

    /// Configures the next mapping run.
    ///
    /// # Arguments
    ///
    /// * `mean` - Number of sweeps averaged per reflector.
    /// * `negative` - Whether negative coordinates are mapped.
    /// * `x`, `y` - Vehicle position in meters.
    /// * `phi` - Vehicle heading in radians.
    pub fn configure_mapping(
        &mut self,
        mean: u8,
        negative: bool,
        x: f64,
        y: f64,
        phi: f64,
    ) -> Result<()> {
        let cmd = CommandId::MapConfig
            .command()
            .unsigned(mean)
            .unsigned(u8::from(negative))
            .signed(meters_to_millimeters(x))
            .signed(meters_to_millimeters(y))
            .signed(radians_to_millidegrees(phi));
        self.transact(&cmd, self.config.reply_timeout)?;
        Ok(())
    }

    /// Selects the active layer.
    pub fn set_current_layer(&mut self, layer: u16) -> Result<()> {
        let cmd = CommandId::CurrentLayer.command().unsigned(layer);
        self.transact(&cmd, self.config.reply_timeout)?;
        Ok(())
    }

    /// Sets the reflector type used by landmark detection (0 flat, 1 cylindrical).
    pub fn set_reflector_type(&mut self, reflector_type: u8) -> Result<()> {
        let cmd = CommandId::ReflectorType.command().unsigned(reflector_type);
        self.transact(&cmd, self.config.reply_timeout)?;
        Ok(())
    }

    /// Sets the reflector size in millimeters used by landmark detection.
    pub fn set_reflector_size(&mut self, size: u16) -> Result<()> {
        let cmd = CommandId::ReflectorSize.command().unsigned(size);
        self.transact(&cmd, self.config.reply_timeout)?;
        Ok(())
    }

    /// Adds one landmark to the layout.
    pub fn add_landmark(&mut self, landmark: &Landmark) -> Result<()> {
        self.add_landmarks(std::slice::from_ref(landmark))
    }

    /// Adds several landmarks with a single request.
    ///
    /// # Arguments
    ///
    /// * `landmarks` - Sent in order after their count. Must not be empty.
    pub fn add_landmarks(&mut self, landmarks: &[Landmark]) -> Result<()> {
        let count = match u16::try_from(landmarks.len()) {
            Ok(0) | Err(_) => {
                error!("Cannot add {} landmarks in one request", landmarks.len());
                return Err(Error::InvalidArgument {
                    description: format!("landmark count {} out of range", landmarks.len()),
                });
            }
            Ok(count) => count,
        };
        let mut cmd = CommandId::AddLandmark.command().unsigned(count);
        for landmark in landmarks {
            cmd = cmd
                .signed(meters_to_millimeters(landmark.x))
                .signed(meters_to_millimeters(landmark.y))
                .unsigned(landmark.landmark_type)
                .unsigned(landmark.subtype)
                .unsigned(landmark.size)
                .unsigned(landmark.layer_id)
                .unsigned(landmark.id);
        }
        let reply = self.transact(&cmd, self.config.reply_timeout)?;
        decode_reply(&reply, decode_method_ack)?;
        debug!("Added {} landmarks", count);
        Ok(())
    }

    /// Sends an arbitrary request payload and returns the raw reply frame. Uses the default reply timeout.
    pub fn send_raw(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.send_raw_with_timeout(payload, self.config.reply_timeout)
    }

    /// Sends an arbitrary request payload (without framing) with a specified timeout.
    ///
    /// If the payload parses as a request, the reply is matched on its header;
    /// otherwise the first frame received is returned. The reply keeps its framing bytes.
    pub fn send_raw_with_timeout(&mut self, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let expected = Command::parse(payload)
            .map(|cmd| cmd.expected_reply())
            .unwrap_or_default();
        trace!(
            "Sending raw request {:?}, expecting {:?}",
            String::from_utf8_lossy(payload),
            expected
        );
        let channel = self.channel()?;
        let reply = channel.invoke(payload, expected.as_bytes(), timeout)?;
        Ok(reply.into_raw())
    }

    fn channel(&self) -> Result<&Channel<ColaAsciiProtocol, TcpStream>> {
        self.connection
            .as_ref()
            .map(|connection| &connection.channel)
            .ok_or(Error::NotConnected)
    }

    fn transact(&self, cmd: &Command, timeout: Duration) -> Result<Frame> {
        let channel = self.channel()?;
        trace!("Invoking command: {}", cmd);
        match channel.invoke(&cmd.to_payload(), cmd.expected_reply().as_bytes(), timeout) {
            Ok(reply) => {
                trace!("Received reply for {}: {:?}", cmd.name(), reply.payload_lossy());
                Ok(reply)
            }
            Err(Error::OperationTimeout) => {
                warn!("Timeout waiting for {} reply", cmd.name());
                Err(Error::OperationTimeout)
            }
            Err(e) => {
                error!("Error invoking {}: {}", cmd.name(), e);
                Err(e)
            }
        }
    }
}

impl Drop for Nav350Device {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Error while closing connection on drop: {}", e);
        }
    }
}

fn decode_reply<T>(
    reply: &Frame,
    decoder: impl FnOnce(&[&str]) -> std::result::Result<T, DecodeError>,
) -> Result<T> {
    let tokens = tokenize(reply.payload())?;
    decoder(&tokens).map_err(|e| {
        error!("Failed to decode {:?}: {}", reply.payload_lossy(), e);
        Error::Decode(e)
    })
}
