use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::capture::configuration_abort::ConfigurationAbort;
use crate::capture::device_selector::DeviceSelector;
use crate::capture::domain::authorization::{AuthorizationState, PermissionProvider};
use crate::capture::domain::capture_backend::{
    CaptureBackend, SampleBufferDelegate, VideoDataOutput,
};
use crate::capture::domain::capture_device::{DeviceDiscovery, FacingPosition};
use crate::capture::domain::quality_preset::{QualityPreset, DEFAULT_PRESETS};
use crate::capture::domain::raw_frame_buffer::RawFrameBuffer;
use crate::capture::permission_gate::{PermissionCheck, PermissionGate};
use crate::capture::session_configurator::{ConfiguredSession, SessionConfigurator};
use crate::execution::executor::Executor;
use crate::execution::serial_queue::{QueueHandle, SerialQueue};
use crate::frame::frame_converter::FrameConverter;
use crate::frame::frame_dispatcher::{FrameConsumer, FrameDispatcher};
use crate::pipeline::pipeline_logger::{self, lock_logger, NullPipelineLogger, SharedPipelineLogger};
use crate::shared::constants::{DELIVERY_QUEUE_LABEL, SAMPLE_QUEUE_LABEL, SESSION_QUEUE_LABEL};

/// Lifecycle of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Unconfigured = 0,
    Configuring = 1,
    Running = 2,
    Stopped = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Unconfigured,
            1 => SessionState::Configuring,
            2 => SessionState::Running,
            _ => SessionState::Stopped,
        }
    }
}

/// Lock-free session state, readable from any context.
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn swap(&self, to: SessionState) -> SessionState {
        SessionState::from_u8(self.0.swap(to as u8, Ordering::SeqCst))
    }
}

/// State every context of one session can observe.
struct SessionShared {
    state: StateCell,
    halted: Arc<AtomicBool>,
    abort: OnceLock<ConfigurationAbort>,
    configured: OnceLock<ConfiguredSession>,
}

/// The platform collaborators a session drives.
pub struct CaptureComponents {
    pub permission: Box<dyn PermissionProvider>,
    pub discovery: Box<dyn DeviceDiscovery>,
    pub backend: Box<dyn CaptureBackend>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub position: FacingPosition,
    /// Tried in order; the first one the hardware can set wins.
    pub presets: Vec<QualityPreset>,
}

impl SessionOptions {
    pub fn new(position: FacingPosition) -> Self {
        Self {
            position,
            presets: DEFAULT_PRESETS.to_vec(),
        }
    }

    pub fn with_presets(mut self, presets: Vec<QualityPreset>) -> Self {
        self.presets = presets;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new(FacingPosition::Front)
    }
}

/// Everything the session-configuration queue owns. Only that queue's
/// worker ever touches it.
struct SessionCore {
    backend: Box<dyn CaptureBackend>,
    selector: DeviceSelector,
    gate: PermissionGate,
    configurator: SessionConfigurator,
    output: Option<VideoDataOutput>,
    shared: Arc<SessionShared>,
    logger: SharedPipelineLogger,
}

impl SessionCore {
    /// Phase one: check permission. When the user has not decided yet the
    /// decision arrives later as a posted [`SessionCore::resume`].
    fn begin(&mut self, queue: QueueHandle<SessionCore>) {
        let check = self.gate.check_permission(move |decision| {
            if !queue.post(move |core: &mut SessionCore| core.resume(decision)) {
                log::debug!("Permission decided after the session was torn down");
            }
        });
        match check {
            PermissionCheck::Resolved(state) => self.configure(state),
            PermissionCheck::Pending => log::info!("Waiting for camera permission"),
        }
    }

    /// Phase two, after an asynchronous permission decision.
    fn resume(&mut self, decision: AuthorizationState) {
        let state = self.gate.resolve(decision);
        self.configure(state);
    }

    fn configure(&mut self, permission: AuthorizationState) {
        if self.shared.halted.load(Ordering::SeqCst) {
            log::info!("Capture session stopped before configuration");
            return;
        }
        // Without access the session never leaves Unconfigured.
        if permission != AuthorizationState::Authorized {
            self.record_abort(ConfigurationAbort::PermissionDenied);
            return;
        }
        if !self
            .shared
            .state
            .transition(SessionState::Unconfigured, SessionState::Configuring)
        {
            return;
        }
        let Some(output) = self.output.take() else {
            return;
        };

        let result = self.configurator.configure(
            self.backend.as_mut(),
            permission,
            &self.selector,
            output,
        );
        match result {
            Ok(configured) => {
                let _ = self.shared.configured.set(configured);
                if self
                    .shared
                    .state
                    .transition(SessionState::Configuring, SessionState::Running)
                {
                    self.backend.start_running();
                    lock_logger(&self.logger).info("Capture session running");
                } else {
                    log::info!("Capture session stopped during configuration");
                }
            }
            Err(abort) => {
                self.shared
                    .state
                    .transition(SessionState::Configuring, SessionState::Unconfigured);
                self.record_abort(abort);
            }
        }
    }

    fn record_abort(&mut self, abort: ConfigurationAbort) {
        log::warn!("Capture session not started [{}]: {abort}", abort.code());
        lock_logger(&self.logger).aborted(&abort);
        let _ = self.shared.abort.set(abort);
    }

    fn halt(&mut self) {
        if self.backend.is_running() {
            self.backend.stop_running();
            log::info!("Capture session stopped");
        }
    }
}

/// Sample-buffer delegate of a session: converts each buffer and hands the
/// result to the dispatcher. Lives on the sample queue.
struct FrameSink {
    converter: FrameConverter,
    dispatcher: FrameDispatcher,
    halted: Arc<AtomicBool>,
    logger: SharedPipelineLogger,
}

impl SampleBufferDelegate for FrameSink {
    fn capture_output(&mut self, buffer: &RawFrameBuffer<'_>) {
        if self.halted.load(Ordering::SeqCst) {
            return;
        }
        log::debug!("Got frame {}", buffer.sequence());

        let start = Instant::now();
        let image = self.converter.convert(buffer);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match image {
            Some(image) => {
                {
                    let mut logger = lock_logger(&self.logger);
                    logger.timing("convert", elapsed_ms);
                    logger.frame_converted(buffer.sequence());
                }
                self.dispatcher.deliver(image);
            }
            None => lock_logger(&self.logger).frame_dropped(buffer.sequence()),
        }
    }

    fn output_finished(&mut self) {
        log::debug!(
            "Frame output finished: {} converted, {} dropped",
            self.converter.converted_count(),
            self.converter.dropped_count()
        );
        lock_logger(&self.logger).summary();
    }
}

/// Stops a session from any context, including the consumer callback.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<SessionShared>,
    queue: QueueHandle<SessionCore>,
}

impl StopHandle {
    /// Suppresses every delivery not yet handed to the consumer and asks the
    /// backend to stop producing frames. Idempotent.
    pub fn stop(&self) {
        self.shared.halted.store(true, Ordering::SeqCst);
        if self.shared.state.swap(SessionState::Stopped) == SessionState::Stopped {
            return;
        }
        log::info!("Stopping capture session");
        self.queue.post(|core| core.halt());
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.state.load() == SessionState::Stopped
    }
}

/// Configures a [`CaptureSession`] before starting it.
pub struct CaptureSessionBuilder {
    components: CaptureComponents,
    options: SessionOptions,
    delivery: Option<Arc<dyn Executor>>,
    consumer: Option<Box<dyn FrameConsumer>>,
    logger: SharedPipelineLogger,
}

impl CaptureSessionBuilder {
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Context consumer callbacks run on. Defaults to a dedicated serial
    /// queue owned by the session.
    pub fn delivery(mut self, executor: Arc<dyn Executor>) -> Self {
        self.delivery = Some(executor);
        self
    }

    /// Consumer registered before any frame can be produced.
    pub fn consumer(mut self, consumer: impl FrameConsumer + 'static) -> Self {
        self.consumer = Some(Box::new(consumer));
        self
    }

    pub fn logger(mut self, logger: SharedPipelineLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Spawns the session's queues and begins the permission check. Returns
    /// immediately; configuration continues on the session queue.
    pub fn start(self) -> io::Result<CaptureSession> {
        let (delivery, delivery_queue) = match self.delivery {
            Some(executor) => (executor, None),
            None => {
                let queue = SerialQueue::new(DELIVERY_QUEUE_LABEL, ())?;
                let executor: Arc<dyn Executor> = Arc::new(queue.handle());
                (executor, Some(queue))
            }
        };

        let halted = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(SessionShared {
            state: StateCell::new(SessionState::Unconfigured),
            halted: halted.clone(),
            abort: OnceLock::new(),
            configured: OnceLock::new(),
        });

        let dispatcher = FrameDispatcher::new(delivery.clone(), halted.clone());
        if let Some(consumer) = self.consumer {
            dispatcher.register(consumer);
        }

        let sink = FrameSink {
            converter: FrameConverter::new(),
            dispatcher: dispatcher.clone(),
            halted,
            logger: self.logger.clone(),
        };
        let sample_queue =
            SerialQueue::new(SAMPLE_QUEUE_LABEL, Box::new(sink) as Box<dyn SampleBufferDelegate>)?;
        let output = VideoDataOutput::new(sample_queue.handle());

        let CaptureComponents {
            permission,
            discovery,
            backend,
        } = self.components;
        let core = SessionCore {
            backend,
            selector: DeviceSelector::new(discovery),
            gate: PermissionGate::new(permission),
            configurator: SessionConfigurator::new(self.options.position, self.options.presets),
            output: Some(output.clone()),
            shared: shared.clone(),
            logger: self.logger,
        };
        let session_queue = SerialQueue::new(SESSION_QUEUE_LABEL, core)?;

        let queue = session_queue.handle();
        session_queue.post(move |core| core.begin(queue));

        Ok(CaptureSession {
            stop: StopHandle {
                shared,
                queue: session_queue.handle(),
            },
            dispatcher,
            delivery,
            output,
            session_queue,
            sample_queue,
            delivery_queue,
        })
    }
}

/// A running (or failed-to-configure) camera capture.
///
/// The handle is move-only and one-shot: once stopped it cannot restart.
/// Configuration failures are never returned as errors; the session simply
/// never runs and [`CaptureSession::abort_reason`] says why.
pub struct CaptureSession {
    stop: StopHandle,
    dispatcher: FrameDispatcher,
    delivery: Arc<dyn Executor>,
    output: VideoDataOutput,
    // Declaration order is teardown order: the backend stops before the
    // sample queue drains, and the sample queue drains before delivery.
    session_queue: SerialQueue<SessionCore>,
    sample_queue: SerialQueue<Box<dyn SampleBufferDelegate>>,
    delivery_queue: Option<SerialQueue<()>>,
}

impl CaptureSession {
    pub fn builder(components: CaptureComponents) -> CaptureSessionBuilder {
        CaptureSessionBuilder {
            components,
            options: SessionOptions::default(),
            delivery: None,
            consumer: None,
            logger: pipeline_logger::shared(NullPipelineLogger),
        }
    }

    /// Starts a session delivering on its own `framecap.delivery` queue.
    pub fn start(components: CaptureComponents, options: SessionOptions) -> io::Result<Self> {
        Self::builder(components).options(options).start()
    }

    /// Starts a session delivering on `delivery`.
    pub fn start_with_delivery(
        components: CaptureComponents,
        options: SessionOptions,
        delivery: Arc<dyn Executor>,
    ) -> io::Result<Self> {
        Self::builder(components)
            .options(options)
            .delivery(delivery)
            .start()
    }

    pub fn state(&self) -> SessionState {
        self.stop.shared.state.load()
    }

    /// Why configuration stopped short, if it did.
    pub fn abort_reason(&self) -> Option<ConfigurationAbort> {
        self.stop.shared.abort.get().cloned()
    }

    pub fn configured(&self) -> Option<&ConfiguredSession> {
        self.stop.shared.configured.get()
    }

    pub fn active_preset(&self) -> Option<QualityPreset> {
        self.configured().and_then(|c| c.preset)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn register_consumer(
        &self,
        consumer: impl FrameConsumer + 'static,
    ) -> Option<Box<dyn FrameConsumer>> {
        self.dispatcher.register(Box::new(consumer))
    }

    pub fn deregister_consumer(&self) -> Option<Box<dyn FrameConsumer>> {
        self.dispatcher.deregister()
    }

    /// Waits until configuration work queued so far has run. A permission
    /// prompt still awaiting the user is not waited for.
    pub fn settle(&self) {
        let _ = self.session_queue.sync(|_| ());
    }

    /// Waits until every frame submitted so far has been converted and,
    /// when the delivery context can be waited on, delivered.
    pub fn flush(&self) {
        self.settle();
        let _ = self.sample_queue.sync(|_| ());
        self.delivery.flush();
    }

    /// Stops capture and tears the session down.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop.stop();
        let output = self.output.clone();
        // Runs after the posted halt, so no frame follows the finish signal.
        self.session_queue.post(move |_| {
            output.finish();
        });
        if let Some(queue) = &self.delivery_queue {
            log::debug!("Releasing delivery queue '{}'", queue.label());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture_device::{CaptureDevice, DeviceKind};
    use crate::capture::infrastructure::device_catalogue::DeviceCatalogue;
    use crate::capture::infrastructure::scripted_permission::{PromptHandle, ScriptedPermission};
    use crate::capture::infrastructure::synthetic_camera::SyntheticCamera;
    use crate::pipeline::pipeline_logger::PipelineLogger;
    use std::sync::Mutex;

    /// Records the session state each time an abort is reported.
    struct AbortStateLogger {
        shared: Arc<OnceLock<Arc<SessionShared>>>,
        seen: Arc<Mutex<Vec<SessionState>>>,
    }

    impl PipelineLogger for AbortStateLogger {
        fn frame_converted(&mut self, _sequence: u64) {}
        fn frame_dropped(&mut self, _sequence: u64) {}
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn aborted(&mut self, _abort: &ConfigurationAbort) {
            if let Some(shared) = self.shared.get() {
                self.seen.lock().unwrap().push(shared.state.load());
            }
        }
        fn info(&mut self, _message: &str) {}
    }

    fn prompted_session(
        camera: SyntheticCamera,
    ) -> (CaptureSession, PromptHandle, Arc<Mutex<Vec<SessionState>>>) {
        let (permission, prompt) = ScriptedPermission::prompt();
        let components = CaptureComponents {
            permission: Box::new(permission),
            discovery: Box::new(DeviceCatalogue::new(vec![CaptureDevice::new(
                "front-wide",
                FacingPosition::Front,
                DeviceKind::WideAngle,
            )])),
            backend: Box::new(camera),
        };
        let slot = Arc::new(OnceLock::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let logger = pipeline_logger::shared(AbortStateLogger {
            shared: slot.clone(),
            seen: seen.clone(),
        });

        let session = CaptureSession::builder(components)
            .logger(logger)
            .start()
            .unwrap();
        let _ = slot.set(session.stop.shared.clone());
        session.settle();
        (session, prompt, seen)
    }

    #[test]
    fn test_denied_decision_never_enters_configuring() {
        let (session, prompt, seen) = prompted_session(SyntheticCamera::new());

        prompt.answer(false);
        session.settle();

        assert_eq!(*seen.lock().unwrap(), vec![SessionState::Unconfigured]);
        assert_eq!(session.state(), SessionState::Unconfigured);
        assert_eq!(session.abort_reason(), Some(ConfigurationAbort::PermissionDenied));
    }

    #[test]
    fn test_failed_configuration_is_unconfigured_when_reported() {
        let (session, prompt, seen) = prompted_session(SyntheticCamera::new().rejecting_output());

        prompt.answer(true);
        session.settle();

        assert_eq!(*seen.lock().unwrap(), vec![SessionState::Unconfigured]);
        assert_eq!(session.abort_reason(), Some(ConfigurationAbort::OutputRejected));
    }

    #[test]
    fn test_stop_handle_is_idempotent() {
        let (session, _prompt, _) = prompted_session(SyntheticCamera::new());
        let stop = session.stop_handle();

        stop.stop();
        stop.stop();

        assert!(stop.is_stopped());
        assert_eq!(session.state(), SessionState::Stopped);
    }
}
