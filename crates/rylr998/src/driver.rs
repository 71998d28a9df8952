//! Typed operations on the module.
//!
//! # Setters
//!
//! Every setter validates its input before touching the transport and
//! returns [`DriverError::Validation`] for out-of-range values. The cached
//! value is only updated once the module acknowledges, so a failed exchange
//! leaves the cache exactly as it was.
//!
//! # Getters
//!
//! A successful query refreshes the cache and returns the fresh value. On
//! failure the error is returned and the cache is left untouched; the
//! last-known-good values remain available from
//! [`RadioDriver::cached_config`].

use std::thread;

use parking_lot::Mutex;
use rylr998_protocol::{
    validate_baud_rate, validate_network_id, validate_output_power, Command, FirmwareVersion,
    Packet, Payload, ProtocolError, Response, RfParameters, WorkMode,
};
use tracing::{debug, info, warn};

use crate::channel::CommandChannel;
use crate::config::DriverConfig;
use crate::error::{DriverError, Result};
use crate::transport::{ResetLine, Transport};

/// Last-known-good configuration of the module.
///
/// Fields change only as a side effect of a successful exchange for that
/// field. Nothing is synchronized with the module in the background.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigCache {
    pub firmware_version: FirmwareVersion,
    pub uid: Option<String>,
    pub rf_parameters: Option<RfParameters>,
    pub mode: Option<WorkMode>,
    pub baud_rate: Option<u32>,
    /// RF frequency in Hz.
    pub band: u32,
    pub address: u16,
    pub network_id: u8,
    /// RF output power in dBm.
    pub rf_output_power: u8,
    pub rx_boost: bool,
}

/// Metadata of a packet returned by [`RadioDriver::recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// Address of the transmitting module.
    pub address: u16,
    /// Bytes copied into the caller's buffer.
    pub len: usize,
    /// Payload length as received. Larger than `len` when the buffer was
    /// too small and the rest of the payload was dropped.
    pub original_len: usize,
    pub rssi: i16,
    pub snr: i16,
}

#[derive(Debug, Clone, Copy, Default)]
struct LinkQuality {
    rssi: i16,
    snr: i16,
}

/// Driver for one RYLR998 module.
///
/// All methods take `&self`; share the driver between threads with an
/// `Arc`. Commands from different threads are serialized by the channel.
pub struct RadioDriver<T> {
    channel: CommandChannel<T>,
    cache: Mutex<ConfigCache>,
    link: Mutex<LinkQuality>,
    reset_line: Mutex<Option<Box<dyn ResetLine>>>,
    config: DriverConfig,
}

impl<T: Transport> RadioDriver<T> {
    /// Create a driver over `transport`.
    pub fn new(transport: T, config: DriverConfig) -> Self {
        RadioDriver {
            channel: CommandChannel::new(transport, config.command_timeout(), config.queue_capacity),
            cache: Mutex::new(ConfigCache::default()),
            link: Mutex::new(LinkQuality::default()),
            reset_line: Mutex::new(None),
            config,
        }
    }

    /// Create a driver that also controls the module's reset pin.
    ///
    /// Releases the module from reset, waits for it to settle, and discards
    /// whatever it printed while starting.
    pub fn with_reset_line(transport: T, mut reset: Box<dyn ResetLine>, config: DriverConfig) -> Result<Self> {
        reset.set_high();
        thread::sleep(config.reset_settle());

        let driver = Self::new(transport, config);
        *driver.reset_line.lock() = Some(reset);
        driver.flush()?;
        Ok(driver)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The underlying command channel.
    pub fn channel(&self) -> &CommandChannel<T> {
        &self.channel
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Pulse the reset line low. Does nothing without a reset line.
    ///
    /// Call [`RadioDriver::flush`] afterwards to drop the boot output.
    pub fn hw_reset(&self) {
        let mut line = self.reset_line.lock();
        if let Some(reset) = line.as_mut() {
            info!("hardware reset");
            reset.set_low();
            thread::sleep(self.config.reset_pulse());
            reset.set_high();
        }
    }

    /// Software reset. Succeeds once the module reports `+READY`.
    pub fn reset(&self) -> Result<()> {
        self.channel.execute(&Command::Reset)?;
        info!("module reset");
        Ok(())
    }

    /// Check that the module answers `AT`, trying up to
    /// [`DriverConfig::liveness_attempts`] times.
    pub fn at_available(&self) -> Result<()> {
        let attempts = self.config.liveness_attempts.max(1);
        for attempt in 1..=attempts {
            match self.channel.execute(&Command::Probe) {
                Ok(_) => return Ok(()),
                Err(DriverError::Transport(e)) => return Err(DriverError::Transport(e)),
                Err(e) => debug!("liveness probe {}/{} failed: {}", attempt, attempts, e),
            }
        }
        warn!("module not responding");
        Err(DriverError::NotAvailable { attempts })
    }

    /// Change the reply timeout for subsequent commands.
    pub fn set_timeout(&self, timeout: std::time::Duration) {
        self.channel.set_timeout(timeout);
    }

    /// Discard any received input not yet processed.
    ///
    /// Packets already queued are kept.
    pub fn flush(&self) -> Result<()> {
        self.channel.flush()
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Query the firmware version.
    pub fn get_fw_version(&self) -> Result<FirmwareVersion> {
        self.query(Command::GetVersion, |response, cache| match response {
            Response::Version(version) => {
                cache.firmware_version = version;
                Some(version)
            }
            _ => None,
        })
    }

    /// Query the 24-character unique ID.
    pub fn get_uid(&self) -> Result<String> {
        self.query(Command::GetUid, |response, cache| match response {
            Response::Uid(uid) => {
                cache.uid = Some(uid.clone());
                Some(uid)
            }
            _ => None,
        })
    }

    // ========================================================================
    // Radio Configuration
    // ========================================================================

    pub fn set_rf_parameters(&self, params: RfParameters) -> Result<()> {
        params.validate()?;
        self.commit(Command::SetParameters(params), |cache| cache.rf_parameters = Some(params))
    }

    pub fn get_rf_parameters(&self) -> Result<RfParameters> {
        self.query(Command::GetParameters, |response, cache| match response {
            Response::Parameters(params) => {
                cache.rf_parameters = Some(params);
                Some(params)
            }
            _ => None,
        })
    }

    /// Set the work mode. The module has no query for it, so the cache only
    /// reflects modes set through this driver.
    pub fn set_mode(&self, mode: WorkMode) -> Result<()> {
        self.commit(Command::SetMode(mode), |cache| cache.mode = Some(mode))
    }

    /// Set the module's UART baud rate.
    ///
    /// The module switches rate after replying; the transport has to be
    /// reopened at the new rate by the caller.
    pub fn set_baud_rate(&self, rate: u32) -> Result<()> {
        validate_baud_rate(rate)?;
        self.query(Command::SetBaudRate(rate), |response, cache| match response {
            Response::BaudRate(echoed) => {
                cache.baud_rate = Some(echoed);
                Some(())
            }
            _ => None,
        })
    }

    pub fn get_baud_rate(&self) -> Result<u32> {
        self.query(Command::GetBaudRate, |response, cache| match response {
            Response::BaudRate(rate) => {
                cache.baud_rate = Some(rate);
                Some(rate)
            }
            _ => None,
        })
    }

    /// Set the RF frequency in Hz.
    pub fn set_band(&self, freq: u32) -> Result<()> {
        self.commit(Command::SetBand(freq), |cache| cache.band = freq)
    }

    pub fn get_band(&self) -> Result<u32> {
        self.query(Command::GetBand, |response, cache| match response {
            Response::Band(band) => {
                cache.band = band;
                Some(band)
            }
            _ => None,
        })
    }

    pub fn set_address(&self, address: u16) -> Result<()> {
        self.commit(Command::SetAddress(address), |cache| cache.address = address)
    }

    pub fn get_address(&self) -> Result<u16> {
        self.query(Command::GetAddress, |response, cache| match response {
            Response::Address(address) => {
                cache.address = address;
                Some(address)
            }
            _ => None,
        })
    }

    /// Set the network ID (1 to 255).
    pub fn set_network_id(&self, id: u8) -> Result<()> {
        validate_network_id(id)?;
        self.commit(Command::SetNetworkId(id), |cache| cache.network_id = id)
    }

    pub fn get_network_id(&self) -> Result<u8> {
        self.query(Command::GetNetworkId, |response, cache| match response {
            Response::NetworkId(id) => {
                cache.network_id = id;
                Some(id)
            }
            _ => None,
        })
    }

    /// Set the RF output power in dBm (0 to 22).
    pub fn set_rf_output_power(&self, power: u8) -> Result<()> {
        validate_output_power(power)?;
        self.commit(Command::SetOutputPower(power), |cache| cache.rf_output_power = power)
    }

    pub fn get_rf_output_power(&self) -> Result<u8> {
        self.query(Command::GetOutputPower, |response, cache| match response {
            Response::OutputPower(power) => {
                cache.rf_output_power = power;
                Some(power)
            }
            _ => None,
        })
    }

    pub fn set_rx_boost(&self, on: bool) -> Result<()> {
        self.commit(Command::SetRxBoost(on), |cache| cache.rx_boost = on)
    }

    pub fn get_rx_boost(&self) -> Result<bool> {
        self.query(Command::GetRxBoost, |response, cache| match response {
            Response::RxBoost(on) => {
                cache.rx_boost = on;
                Some(on)
            }
            _ => None,
        })
    }

    /// Snapshot of the last-known-good configuration.
    pub fn cached_config(&self) -> ConfigCache {
        self.cache.lock().clone()
    }

    // ========================================================================
    // Data
    // ========================================================================

    /// Transmit `payload` (at most 240 bytes) to `address`; 0 broadcasts.
    ///
    /// Succeeds when the module accepts the command. There is no delivery
    /// confirmation.
    pub fn send(&self, address: u16, payload: &[u8]) -> Result<()> {
        let payload = Payload::new(payload)?;
        self.channel.execute(&Command::Send { address, payload })?;
        Ok(())
    }

    /// Payload size of the next buffered packet, or 0 if none.
    ///
    /// Reads any notifications already waiting on the stream first.
    pub fn get_size(&self) -> Result<usize> {
        let mut state = self.channel.lock();
        state.drain_pending(self.config.receive_timeout(), true)?;
        Ok(state.oob().queue().peek_head_size())
    }

    /// Take the next buffered packet, copying its payload into `buf`.
    ///
    /// A payload longer than `buf` is cut to fit and the remainder is lost;
    /// compare [`Received::len`] with [`Received::original_len`].
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<Received>> {
        let mut state = self.channel.lock();
        state.drain_pending(self.config.receive_timeout(), true)?;

        let Some(pulled) = state.oob_mut().queue_mut().pull(buf.len()) else {
            return Ok(None);
        };
        buf[..pulled.payload.len()].copy_from_slice(&pulled.payload);
        self.record_link(pulled.rssi, pulled.snr);

        Ok(Some(Received {
            address: pulled.address,
            len: pulled.payload.len(),
            original_len: pulled.original_len,
            rssi: pulled.rssi,
            snr: pulled.snr,
        }))
    }

    /// Take the next buffered packet whole.
    pub fn recv_packet(&self) -> Result<Option<Packet>> {
        let mut state = self.channel.lock();
        state.drain_pending(self.config.receive_timeout(), true)?;

        let packet = state.oob_mut().queue_mut().pop();
        if let Some(packet) = &packet {
            self.record_link(packet.rssi, packet.snr);
        }
        Ok(packet)
    }

    /// Number of buffered packets, without reading the stream.
    pub fn pending(&self) -> usize {
        self.channel.lock().oob().queue().len()
    }

    /// Packets evicted because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.channel.lock().oob().queue().dropped()
    }

    /// Code of the most recent `+ERR` notification.
    pub fn last_error(&self) -> Option<i32> {
        self.channel.lock().oob().last_error()
    }

    /// RSSI of the most recently received packet.
    pub fn last_rssi(&self) -> i16 {
        self.link.lock().rssi
    }

    /// SNR of the most recently received packet.
    pub fn last_snr(&self) -> i16 {
        self.link.lock().snr
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Run a command that is acknowledged with `+OK` and apply `update` to
    /// the cache on success.
    fn commit(&self, command: Command, update: impl FnOnce(&mut ConfigCache)) -> Result<()> {
        // Held across the cache update so the cache follows wire order.
        let mut state = self.channel.lock();
        state.execute(&command)?;
        update(&mut *self.cache.lock());
        debug!("committed {}", command);
        Ok(())
    }

    /// Run a command with a typed reply; `extract` picks the value out and
    /// records it in the cache.
    fn query<R>(
        &self,
        command: Command,
        extract: impl FnOnce(Response, &mut ConfigCache) -> Option<R>,
    ) -> Result<R> {
        let mut state = self.channel.lock();
        let response = state.execute(&command)?;
        // `Command::expected` already fixes the reply variant; if the two ever
        // disagree the reply is reported as a mismatch instead of trusted.
        let description = format!("{:?}", response);
        extract(response, &mut *self.cache.lock()).ok_or_else(|| DriverError::PatternMismatch {
            command: command.to_command_string(),
            source: ProtocolError::UnexpectedReply {
                expected: command.expected().to_string(),
                got: description,
            },
        })
    }

    fn record_link(&self, rssi: i16, snr: i16) {
        *self.link.lock() = LinkQuality { rssi, snr };
    }
}
