//! Master station coordinator
//!
//! Drives the three protocol layers over one connection to one outstation.
//! A single async mutex covers opening, closing, and every transaction, so
//! concurrent callers serialize and at most one request is ever in flight
//! on the link.
//!
//! # Transaction flow
//!
//! 1. Build the APDU (assigning the 4-bit application sequence).
//! 2. Segment it (assigning 6-bit transport sequences, which persist
//!    across transactions).
//! 3. Wrap each segment in an FT3 frame and write it.
//! 4. Read frames until the matching response APDU reassembles, confirming
//!    it if the outstation set CON, then parse and return it.
//!
//! Communication errors and response timeouts retry up to
//! `max_retries` times with `retry_delay` between attempts; CRC, frame,
//! protocol, object and control errors surface immediately.

use crate::error::{Dnp3Error, Dnp3Result};
use crate::poll::PollResult;
use dnp3_app::{
    AppFunction, ApplicationRequest, ApplicationResponse, ControlStatus,
};
use dnp3_core::Dnp3Config;
use dnp3_link::{hex_frame, FrameDecoder, LinkLayer, TransportFunction, MAX_SEGMENT_PAYLOAD};
use dnp3_objects::{
    group, object_size, AnalogCommand, AnalogInput, AnalogOutput, BinaryInput, BinaryOutput,
    Counter, Crob,
};
use dnp3_transport::{TcpSettings, TcpTransport, TransportLayer};
use std::future::Future;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Safety bound on fragments per response.
const MAX_FRAGMENTS: usize = 100;

/// How long to wait for the optional link reset acknowledgement.
const RESET_LINK_WAIT: Duration = Duration::from_secs(2);

/// DNP3 master station
///
/// Safe to share across tasks; all operations serialize on an internal
/// lock. Generic over the transport so the full stack can be exercised
/// against an in-memory stream.
pub struct Master<T: TransportLayer = TcpTransport> {
    config: Dnp3Config,
    inner: Mutex<Inner<T>>,
}

/// Connection-scoped state guarded by the master's lock
struct Inner<T> {
    transport: T,
    connected: bool,
    link: LinkLayer,
    transport_fn: TransportFunction,
    decoder: FrameDecoder,
    app_sequence: u8,
}

impl Master<TcpTransport> {
    /// Create a master talking TCP to the configured outstation.
    ///
    /// Validates the configuration; the master starts closed.
    pub fn new(config: Dnp3Config) -> Dnp3Result<Self> {
        let mut config = config;
        config.validate()?;
        let transport = TcpTransport::new(TcpSettings::new(
            config.host.clone(),
            config.port,
            config.connection_timeout_duration(),
        ));
        Self::with_validated_transport(config, transport)
    }
}

impl<T: TransportLayer> Master<T> {
    /// Create a master over a caller-provided transport.
    pub fn with_transport(config: Dnp3Config, transport: T) -> Dnp3Result<Self> {
        let mut config = config;
        config.validate()?;
        Self::with_validated_transport(config, transport)
    }

    fn with_validated_transport(config: Dnp3Config, transport: T) -> Dnp3Result<Self> {
        let link = LinkLayer::new(config.master_address, config.outstation_address)?;
        let transport_fn = TransportFunction::new(config.max_apdu_size);
        Ok(Self {
            inner: Mutex::new(Inner {
                transport,
                connected: false,
                link,
                transport_fn,
                decoder: FrameDecoder::new(),
                app_sequence: 0,
            }),
            config,
        })
    }

    pub fn config(&self) -> &Dnp3Config {
        &self.config
    }

    /// Whether a connection is currently open.
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.connected
    }

    /// Open the connection to the outstation.
    ///
    /// Idempotent: opening an open master is a no-op. When link
    /// confirmation is enabled, a RESET_LINK is issued so both ends agree
    /// on the frame count bit; a missing acknowledgement is tolerated.
    pub async fn open(&self) -> Dnp3Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.connected {
            return Ok(());
        }
        inner.transport.open().await?;
        inner.connected = true;
        inner.decoder.clear();
        inner.transport_fn.reset_rx();
        info!("connected to {}:{}", self.config.host, self.config.port);

        if self.config.confirm_required {
            inner.reset_link(&self.config).await;
        }
        Ok(())
    }

    /// Close the connection. Any pending read fails with a communication
    /// error once the transport shuts down.
    pub async fn close(&self) -> Dnp3Result<()> {
        let mut inner = self.inner.lock().await;
        let result = inner.transport.close().await;
        inner.connected = false;
        inner.decoder.clear();
        inner.transport_fn.reset_rx();
        info!("connection closed");
        result
    }

    /// Run `operation` inside an open connection, closing it on every
    /// exit path.
    ///
    /// ```ignore
    /// let total = master
    ///     .connect(|m| async move { Ok(m.integrity_poll().await.binary_inputs.len()) })
    ///     .await?;
    /// ```
    pub async fn connect<'a, F, Fut, R>(&'a self, operation: F) -> Dnp3Result<R>
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: Future<Output = Dnp3Result<R>> + 'a,
    {
        self.open().await?;
        let result = operation(self).await;
        let closed = self.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }

    // =====================================================================
    // Read operations
    // =====================================================================

    /// Integrity poll: a Class 0 read returning all static data.
    pub async fn integrity_poll(&self) -> PollResult {
        self.poll_with(|seq| ApplicationRequest::integrity_poll(seq)?.to_bytes())
            .await
    }

    /// Poll one data class (0-3).
    pub async fn read_class(&self, class: u8) -> PollResult {
        self.poll_with(move |seq| ApplicationRequest::read_class(class, seq)?.to_bytes())
            .await
    }

    /// Read binary input points over an inclusive index range.
    pub async fn read_binary_inputs(&self, start: u16, stop: u16) -> Dnp3Result<Vec<BinaryInput>> {
        Ok(self
            .read_range(group::BINARY_INPUT, start, stop)
            .await?
            .binary_inputs)
    }

    /// Read binary output status points.
    pub async fn read_binary_outputs(
        &self,
        start: u16,
        stop: u16,
    ) -> Dnp3Result<Vec<BinaryOutput>> {
        Ok(self
            .read_range(group::BINARY_OUTPUT, start, stop)
            .await?
            .binary_outputs)
    }

    /// Read analog input points.
    pub async fn read_analog_inputs(&self, start: u16, stop: u16) -> Dnp3Result<Vec<AnalogInput>> {
        Ok(self
            .read_range(group::ANALOG_INPUT, start, stop)
            .await?
            .analog_inputs)
    }

    /// Read analog output status points.
    pub async fn read_analog_outputs(
        &self,
        start: u16,
        stop: u16,
    ) -> Dnp3Result<Vec<AnalogOutput>> {
        Ok(self
            .read_range(group::ANALOG_OUTPUT_STATUS, start, stop)
            .await?
            .analog_outputs)
    }

    /// Read counter points.
    pub async fn read_counters(&self, start: u16, stop: u16) -> Dnp3Result<Vec<Counter>> {
        Ok(self.read_range(group::COUNTER, start, stop).await?.counters)
    }

    // =====================================================================
    // Control operations
    // =====================================================================

    /// Directly operate a binary output: latch on or off.
    ///
    /// Returns `Ok(true)` when the echoed status byte is SUCCESS; a
    /// non-zero status surfaces as a control error.
    pub async fn direct_operate_binary(&self, index: u16, value: bool) -> Dnp3Result<bool> {
        let crob = if value { Crob::latch_on() } else { Crob::latch_off() };
        self.operate_crob(AppFunction::DirectOperate, index, crob)
            .await
    }

    /// Select-before-operate a binary output.
    ///
    /// The OPERATE is issued with an identical CROB and must go out before
    /// `select_timeout` elapses; otherwise the operation fails with a
    /// control error without sending it.
    pub async fn select_operate_binary(&self, index: u16, value: bool) -> Dnp3Result<bool> {
        let crob = if value { Crob::latch_on() } else { Crob::latch_off() };

        let select_started = Instant::now();
        self.operate_crob(AppFunction::Select, index, crob).await?;

        if select_started.elapsed() >= self.config.select_timeout_duration() {
            error!(
                "select window of {}s expired before OPERATE could be issued",
                self.config.select_timeout
            );
            return Err(Dnp3Error::Control {
                status_code: ControlStatus::Timeout as u8,
            });
        }

        self.operate_crob(AppFunction::Operate, index, crob).await
    }

    /// Pulse a binary output `count` times with the given on/off timing.
    pub async fn pulse_binary(
        &self,
        index: u16,
        on_time_ms: u32,
        off_time_ms: u32,
        count: u8,
        pulse_on: bool,
    ) -> Dnp3Result<bool> {
        let crob = if pulse_on {
            Crob::pulse_on(on_time_ms, off_time_ms, count)
        } else {
            Crob::pulse_off(on_time_ms, off_time_ms, count)
        };
        self.operate_crob(AppFunction::DirectOperate, index, crob)
            .await
    }

    /// Directly operate an analog output setpoint.
    ///
    /// The command variation is chosen from the value: g41v1 for integral
    /// values fitting 32 bits, g41v3 otherwise.
    pub async fn direct_operate_analog(&self, index: u16, value: f64) -> Dnp3Result<bool> {
        let command = AnalogCommand::new(value);
        let variation = command.preferred_variation();
        self.operate_analog(index, command, variation).await
    }

    /// Directly operate an analog output with an explicit command
    /// variation (1 = i32, 2 = i16, 3 = f32, 4 = f64).
    pub async fn direct_operate_analog_with(
        &self,
        index: u16,
        value: f64,
        variation: u8,
    ) -> Dnp3Result<bool> {
        self.operate_analog(index, AnalogCommand::new(value), variation)
            .await
    }

    // =====================================================================
    // Utility operations
    // =====================================================================

    /// Request a cold restart of the outstation.
    pub async fn cold_restart(&self) -> Dnp3Result<bool> {
        self.restart(true).await
    }

    /// Request a warm restart of the outstation.
    pub async fn warm_restart(&self) -> Dnp3Result<bool> {
        self.restart(false).await
    }

    /// Enable unsolicited responses for the classes in `class_mask`
    /// (bit 0 = class 1, bit 1 = class 2, bit 2 = class 3).
    pub async fn enable_unsolicited(&self, class_mask: u8) -> Dnp3Result<bool> {
        let response = self
            .transaction(|seq| {
                ApplicationRequest::unsolicited_control(true, class_mask, seq)?.to_bytes()
            })
            .await?;
        response.check_rejection()?;
        Ok(true)
    }

    /// Disable unsolicited responses for the classes in `class_mask`.
    pub async fn disable_unsolicited(&self, class_mask: u8) -> Dnp3Result<bool> {
        let response = self
            .transaction(|seq| {
                ApplicationRequest::unsolicited_control(false, class_mask, seq)?.to_bytes()
            })
            .await?;
        response.check_rejection()?;
        Ok(true)
    }

    // =====================================================================
    // Internals
    // =====================================================================

    async fn poll_with<F>(&self, build: F) -> PollResult
    where
        F: FnOnce(u8) -> Dnp3Result<Vec<u8>>,
    {
        match self.poll_request(build).await {
            Ok(result) => result,
            Err(err) => {
                error!("poll failed: {}", err);
                PollResult::failure(err.to_string())
            }
        }
    }

    async fn poll_request<F>(&self, build: F) -> Dnp3Result<PollResult>
    where
        F: FnOnce(u8) -> Dnp3Result<Vec<u8>>,
    {
        let response = self.transaction(build).await?;
        response.check_rejection()?;
        PollResult::from_response(&response)
    }

    async fn read_range(&self, group_num: u8, start: u16, stop: u16) -> Dnp3Result<PollResult> {
        let response = self
            .transaction(move |seq| {
                ApplicationRequest::read_range(group_num, 0, start, stop, seq)?.to_bytes()
            })
            .await?;
        response.check_rejection()?;
        PollResult::from_response(&response)
    }

    async fn operate_crob(
        &self,
        function: AppFunction,
        index: u16,
        crob: Crob,
    ) -> Dnp3Result<bool> {
        let block = crob.encode();
        let response = self
            .transaction(move |seq| {
                ApplicationRequest::control_command(
                    function,
                    group::CONTROL_RELAY_OUTPUT_BLOCK,
                    1,
                    index,
                    &block,
                    seq,
                )?
                .to_bytes()
            })
            .await?;
        response.check_rejection()?;
        check_control_status(&response)?;
        Ok(true)
    }

    async fn operate_analog(
        &self,
        index: u16,
        command: AnalogCommand,
        variation: u8,
    ) -> Dnp3Result<bool> {
        let block = command.encode(variation)?;
        let response = self
            .transaction(move |seq| {
                ApplicationRequest::control_command(
                    AppFunction::DirectOperate,
                    group::ANALOG_OUTPUT_BLOCK,
                    variation,
                    index,
                    &block,
                    seq,
                )?
                .to_bytes()
            })
            .await?;
        response.check_rejection()?;
        check_control_status(&response)?;
        Ok(true)
    }

    async fn restart(&self, cold: bool) -> Dnp3Result<bool> {
        let response = self
            .transaction(move |seq| ApplicationRequest::restart(cold, seq)?.to_bytes())
            .await?;
        response.check_rejection()?;
        Ok(true)
    }

    /// Execute one request/response exchange under the connection lock,
    /// retrying retriable failures.
    async fn transaction<F>(&self, build: F) -> Dnp3Result<ApplicationResponse>
    where
        F: FnOnce(u8) -> Dnp3Result<Vec<u8>>,
    {
        let mut inner = self.inner.lock().await;
        inner.ensure_connected(&self.config)?;
        inner.drain_pending(&self.config).await;

        let seq = inner.next_app_sequence();
        let apdu = build(seq)?;

        let retry_delay = self.config.retry_delay_duration();
        let mut attempt = 0u32;
        loop {
            match inner.transact(&self.config, &apdu, seq).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retriable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "transaction attempt {} failed: {}; retrying in {:.1}s",
                        attempt, err, self.config.retry_delay
                    );
                    tokio::time::sleep(retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<T: TransportLayer> Inner<T> {
    fn ensure_connected(&self, config: &Dnp3Config) -> Dnp3Result<()> {
        if !self.connected {
            return Err(Dnp3Error::Communication {
                message: "not connected".to_string(),
                host: config.host.clone(),
                port: config.port,
            });
        }
        Ok(())
    }

    fn next_app_sequence(&mut self) -> u8 {
        let seq = self.app_sequence;
        self.app_sequence = (seq + 1) & 0x0F;
        seq
    }

    /// Send one APDU as transport segments wrapped in link frames.
    async fn send_apdu(&mut self, config: &Dnp3Config, apdu: &[u8]) -> Dnp3Result<()> {
        let max_payload = config
            .max_frame_size
            .saturating_sub(1)
            .clamp(1, MAX_SEGMENT_PAYLOAD);
        let segments = self.transport_fn.segment(apdu, max_payload)?;
        for segment in segments {
            let frame = self.link.build_frame(&segment, config.confirm_required)?;
            if config.log_raw_frames {
                debug!("TX: [{} bytes] {}", frame.len(), hex_frame(&frame));
            }
            self.transport.write_all(&frame).await?;
            self.transport.flush().await?;
            if config.confirm_required {
                self.link.toggle_fcb();
            }
        }
        Ok(())
    }

    /// One attempt: send the request and wait for its correlated response.
    async fn transact(
        &mut self,
        config: &Dnp3Config,
        apdu: &[u8],
        seq: u8,
    ) -> Dnp3Result<ApplicationResponse> {
        self.send_apdu(config, apdu).await?;
        self.receive_response(config, seq).await
    }

    /// Read frames until the response with the requested application
    /// sequence reassembles completely, confirming fragments that ask for
    /// it and collecting multi-fragment responses.
    async fn receive_response(
        &mut self,
        config: &Dnp3Config,
        seq: u8,
    ) -> Dnp3Result<ApplicationResponse> {
        let timeout = config.response_timeout_duration();
        let deadline = Instant::now() + timeout;
        self.transport_fn.reset_rx();

        let mut fragments: Vec<ApplicationResponse> = Vec::new();
        while fragments.len() < MAX_FRAGMENTS {
            let frame = self
                .decoder
                .read_frame(
                    &mut self.transport,
                    &self.link,
                    deadline,
                    config.log_raw_frames,
                )
                .await
                .map_err(|err| match err {
                    Dnp3Error::Timeout { .. } => Dnp3Error::Timeout {
                        message: "response timeout".to_string(),
                        timeout_seconds: config.response_timeout,
                    },
                    other => other,
                })?;

            if frame.is_link_control() {
                debug!("skipping link control frame: {}", frame);
                continue;
            }

            let apdu = match self.transport_fn.feed(frame.user_data(), timeout)? {
                Some(apdu) => apdu,
                None => continue,
            };
            let response = ApplicationResponse::parse(&apdu)?;

            if response.unsolicited || response.sequence != seq {
                warn!("discarding {} while waiting for sequence {}", response, seq);
                if response.unsolicited && response.confirm_required {
                    let confirm = ApplicationRequest::confirm(response.sequence, true)?;
                    self.send_apdu(config, &confirm).await?;
                }
                self.transport_fn.reset_rx();
                continue;
            }

            if response.confirm_required {
                debug!("confirming response sequence {}", response.sequence);
                let confirm =
                    ApplicationRequest::confirm(response.sequence, response.unsolicited)?;
                self.send_apdu(config, &confirm).await?;
            }

            if response.iin.has_reserved_bits() {
                warn!("response has reserved IIN bits set: {}", response.iin);
            }

            let is_final = response.final_fragment;
            fragments.push(response);
            if is_final {
                break;
            }
            self.transport_fn.reset_rx();
        }

        if fragments.is_empty() || !fragments.last().map(|f| f.final_fragment).unwrap_or(false) {
            return Err(Dnp3Error::protocol(format!(
                "response exceeded {} fragments without FIN",
                MAX_FRAGMENTS
            )));
        }
        ApplicationResponse::merge(fragments)
    }

    /// Consume frames already sitting in the receive buffer before a new
    /// request goes out: complete unsolicited responses are confirmed when
    /// asked, stale solicited ones are dropped. Never blocks on the
    /// socket.
    async fn drain_pending(&mut self, config: &Dnp3Config) {
        loop {
            let deadline = Instant::now();
            let frame = match self
                .decoder
                .read_frame(
                    &mut self.transport,
                    &self.link,
                    deadline,
                    config.log_raw_frames,
                )
                .await
            {
                Ok(frame) => frame,
                Err(_) => break,
            };
            if frame.is_link_control() {
                continue;
            }
            match self
                .transport_fn
                .feed(frame.user_data(), config.response_timeout_duration())
            {
                Ok(Some(apdu)) => match ApplicationResponse::parse(&apdu) {
                    Ok(response) if response.unsolicited => {
                        info!("drained unsolicited response: {}", response);
                        if response.confirm_required {
                            if let Ok(confirm) =
                                ApplicationRequest::confirm(response.sequence, true)
                            {
                                if let Err(err) = self.send_apdu(config, &confirm).await {
                                    warn!("failed to confirm unsolicited response: {}", err);
                                }
                            }
                        }
                    }
                    Ok(response) => {
                        warn!("discarding stale response: {}", response);
                    }
                    Err(err) => {
                        warn!("failed to parse drained APDU: {}", err);
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    warn!("reassembly error while draining: {}", err);
                    break;
                }
            }
        }
        self.transport_fn.reset_rx();
    }

    /// Best-effort RESET_LINK exchange after connecting.
    async fn reset_link(&mut self, config: &Dnp3Config) {
        let frame = self.link.build_reset_link();
        if config.log_raw_frames {
            debug!("TX: [{} bytes] {}", frame.len(), hex_frame(&frame));
        }
        if let Err(err) = self.transport.write_all(&frame).await {
            warn!("failed to send reset link: {}", err);
            return;
        }
        let _ = self.transport.flush().await;
        self.link.reset_fcb();

        let deadline = Instant::now() + RESET_LINK_WAIT;
        match self
            .decoder
            .read_frame(
                &mut self.transport,
                &self.link,
                deadline,
                config.log_raw_frames,
            )
            .await
        {
            Ok(frame) => debug!("reset link response: {}", frame),
            Err(err) => debug!("no response to reset link ({}); continuing", err),
        }
    }
}

/// Verify every echoed CROB / analog command status byte in a control
/// response. The status is the last byte of each echoed object.
fn check_control_status(response: &ApplicationResponse) -> Dnp3Result<()> {
    for block in &response.blocks {
        let header = &block.header;
        if header.group != group::CONTROL_RELAY_OUTPUT_BLOCK
            && header.group != group::ANALOG_OUTPUT_BLOCK
        {
            continue;
        }
        let obj_size = match object_size(header.group, header.variation) {
            Some(size) if size > 0 => size,
            _ => {
                warn!(
                    "skipping control response with unknown size: g{}v{}",
                    header.group, header.variation
                );
                continue;
            }
        };
        let stride = header.qualifier.index_prefix_size() + obj_size;

        let mut offset = 0;
        for i in 0..header.count {
            if offset + stride > block.data.len() {
                warn!("control response data ends early at object {}", i);
                break;
            }
            let status = block.data[offset + stride - 1];
            if status != ControlStatus::Success as u8 {
                error!(
                    "control operation failed at object {} with status {} ({})",
                    i,
                    status,
                    ControlStatus::name(status)
                );
                return Err(Dnp3Error::Control {
                    status_code: status,
                });
            }
            offset += stride;
        }
    }
    Ok(())
}
