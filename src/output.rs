//! The public speech-output entry point.
//!
//! [`SpeechOutput`] owns the whole bridge: the bootstrap task, the live proxy,
//! the signal task and both tables. Other subsystems only ever talk to it.
//!
//! # Lifecycle
//!
//! ```text
//! Unbound --init--> Bootstrapping --+--> Bound
//!                                   \--> Failed(reason)
//! any --shutdown--> Closed
//! ```
//!
//! Reads issued while not `Bound` fail with [`BindError::NotBound`] and
//! never touch the bus.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use log::{debug, error, info};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::{
    BridgeState, BusAddressResolver, CallRouter, PendingReply, RequestCorrelator, ServiceProxy,
    SignalTaskHandle, Transport, ZbusTransport, spawn_signal_task,
};
use crate::completion::{CompletionContext, CompletionFn, CompletionSlot};
use crate::config::BridgeSettings;
use crate::error::{BindError, CallError, CompletionError, InitError, LockResultExt};
use crate::observer::Owner;

type InboxOf<T> = <<T as Transport>::Connection as crate::bridge::BusConnection>::Inbox;

/// What a successful [`SpeechOutput::init`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// A bootstrap was started by this call
    Started,
    /// A bootstrap started earlier is still running; nothing was done
    InProgress,
    /// The bridge is already bound; nothing was done
    AlreadyBound,
}

struct Shared<T: Transport> {
    transport: T,
    settings: BridgeSettings,
    state: watch::Sender<BridgeState>,
    proxy: ArcSwapOption<ServiceProxy<T>>,
    router: Arc<CallRouter>,
    correlator: Arc<RequestCorrelator>,
    completion: CompletionSlot,
    signal_task: Mutex<Option<SignalTaskHandle>>,
    bootstrap: Mutex<Option<JoinHandle<()>>>,
    // Serialises publishing a bound proxy against shutdown.
    lifecycle: Mutex<()>,
    shutdown: CancellationToken,
}

/// Speech output bridge to the remote screen reader.
pub struct SpeechOutput<T: Transport = ZbusTransport> {
    shared: Arc<Shared<T>>,
}

impl SpeechOutput<ZbusTransport> {
    /// Bridge over the real session and accessibility buses.
    pub fn new(settings: BridgeSettings) -> Self {
        Self::with_transport(ZbusTransport, settings)
    }
}

impl<T: Transport> SpeechOutput<T> {
    pub fn with_transport(transport: T, settings: BridgeSettings) -> Self {
        let (state, _) = watch::channel(BridgeState::Unbound);
        Self {
            shared: Arc::new(Shared {
                transport,
                settings,
                state,
                proxy: ArcSwapOption::empty(),
                router: Arc::new(CallRouter::new()),
                correlator: Arc::new(RequestCorrelator::new()),
                completion: CompletionSlot::new(),
                signal_task: Mutex::new(None),
                bootstrap: Mutex::new(None),
                lifecycle: Mutex::new(()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start connecting to the screen reader.
    ///
    /// Returns as soon as the bootstrap is initiated; use
    /// [`wait_until_settled`](Self::wait_until_settled) to observe its end.
    /// Calling it again while a bootstrap is running, or once bound, does
    /// nothing.
    ///
    /// # Errors
    /// * `NoRuntime` - not called from within a tokio runtime
    /// * `ShutDown` - [`shutdown`](Self::shutdown) already ran
    /// * `Failed` - an earlier bootstrap failed; there is no retry
    pub fn init(&self) -> Result<InitStatus, InitError> {
        let runtime = Handle::try_current().map_err(|_| InitError::NoRuntime)?;

        let mut outcome = Ok(InitStatus::Started);
        self.shared.state.send_if_modified(|state| match state {
            BridgeState::Unbound => {
                *state = BridgeState::Bootstrapping;
                true
            }
            BridgeState::Bootstrapping => {
                outcome = Ok(InitStatus::InProgress);
                false
            }
            BridgeState::Bound => {
                outcome = Ok(InitStatus::AlreadyBound);
                false
            }
            BridgeState::Failed(reason) => {
                outcome = Err(InitError::Failed(reason.clone()));
                false
            }
            BridgeState::Closed => {
                outcome = Err(InitError::ShutDown);
                false
            }
        });

        if outcome != Ok(InitStatus::Started) {
            debug!(
                target: "yomiage::bootstrap",
                "init ignored: {:?}",
                outcome
            );
            return outcome;
        }

        info!(
            target: "yomiage::bootstrap",
            "Bootstrapping speech output via {} {}",
            self.shared.settings.discovery.service,
            self.shared.settings.discovery.path
        );
        let task = runtime.spawn(bootstrap(Arc::clone(&self.shared)));

        let _lifecycle = self.shared.lifecycle.lock().recover_poison("SpeechOutput::init");
        if !self.shared.shutdown.is_cancelled() {
            *self
                .shared
                .bootstrap
                .lock()
                .recover_poison("SpeechOutput::init") = Some(task);
        }
        outcome
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        self.shared.state.borrow().clone()
    }

    /// Wait until the bridge is bound, failed or closed.
    pub async fn wait_until_settled(&self) -> BridgeState {
        let mut rx = self.shared.state.subscribe();
        match rx.wait_for(BridgeState::is_settled).await {
            Ok(state) => state.clone(),
            // The sender lives in `shared`, which we hold.
            Err(_) => self.state(),
        }
    }

    /// Speak `text`, allowing a later read to interrupt it.
    ///
    /// `owner` receives `read-stopped` or `read-cancelled` when the service
    /// reports the end of this utterance.
    ///
    /// # Errors
    /// * `NotBound` - the bridge is not bound; nothing was sent
    pub fn read(&self, owner: Option<&Owner>, text: &str) -> Result<PendingReply, BindError> {
        Ok(self.bound_proxy("read")?.say_interruptible(owner, text))
    }

    /// Speak `text` to completion.
    ///
    /// # Errors
    /// * `NotBound` - the bridge is not bound; nothing was sent
    pub fn force_read(&self, owner: Option<&Owner>, text: &str) -> Result<PendingReply, BindError> {
        Ok(self.bound_proxy("force_read")?.say_uninterruptible(owner, text))
    }

    fn bound_proxy(&self, operation: &str) -> Result<Arc<ServiceProxy<T>>, BindError> {
        self.shared.proxy.load_full().ok_or_else(|| {
            debug!(
                target: "yomiage::proxy",
                "{} while not bound ({:?}), nothing sent",
                operation,
                self.state()
            );
            BindError::NotBound
        })
    }

    /// Reserved. In-flight speech is not cancelled at this layer.
    pub fn cancel(&self) {
        debug!(
            target: "yomiage::proxy",
            "cancel requested; speech cancellation is not supported"
        );
    }

    /// Install, replace or clear the process-wide completion callback.
    ///
    /// # Errors
    /// * `ContextMismatch` - a clear was attempted with a context other than
    ///   the registered one; the registration is unchanged
    pub fn set_completion_callback(
        &self,
        callback: Option<CompletionFn>,
        context: Option<CompletionContext>,
    ) -> Result<(), CompletionError> {
        self.shared.completion.set(callback, context)
    }

    /// Fire the registered completion callback. Returns whether one ran.
    ///
    /// The bridge never calls this on its own.
    pub fn invoke_completion(&self) -> bool {
        self.shared.completion.invoke()
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.shared.correlator
    }

    /// Number of ReadCommand calls still waiting for their reply.
    pub fn pending_calls(&self) -> usize {
        self.shared.router.pending_count()
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.shared.settings
    }

    /// Release the bus connection and everything attached to it.
    ///
    /// Cancels a bootstrap still in flight. Safe to call before `init`,
    /// after a failed bootstrap and more than once.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        let (bootstrap, signal_task, proxy, was_closed) = {
            let _lifecycle = shared.lifecycle.lock().recover_poison("SpeechOutput::shutdown");
            shared.shutdown.cancel();
            let was_closed = shared.state.send_replace(BridgeState::Closed) == BridgeState::Closed;
            (
                shared
                    .bootstrap
                    .lock()
                    .recover_poison("SpeechOutput::shutdown")
                    .take(),
                shared
                    .signal_task
                    .lock()
                    .recover_poison("SpeechOutput::shutdown")
                    .take(),
                shared.proxy.swap(None),
                was_closed,
            )
        };

        if let Some(bootstrap) = bootstrap {
            // Exits at its next poll: the shutdown token is cancelled.
            let _ = bootstrap.await;
        }
        if let Some(signal_task) = signal_task {
            signal_task.stop().await;
        }
        drop(proxy);

        shared.router.fail_all(CallError::Closed);
        shared.correlator.clear();

        if !was_closed {
            info!(target: "yomiage::bootstrap", "Speech output shut down");
        }
    }
}

impl<T: Transport> Drop for SpeechOutput<T> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

async fn bootstrap<T: Transport>(shared: Arc<Shared<T>>) {
    let outcome = tokio::select! {
        biased;

        _ = shared.shutdown.cancelled() => {
            debug!(target: "yomiage::bootstrap", "Bootstrap abandoned by shutdown");
            return;
        }
        outcome = connect(&shared) => outcome,
    };

    match outcome {
        Ok((proxy, inbox)) => install(&shared, proxy, inbox),
        Err(reason) => {
            error!(
                target: "yomiage::bootstrap",
                "Speech output bootstrap failed: {}",
                reason
            );
            let _lifecycle = shared.lifecycle.lock().recover_poison("bootstrap");
            if !shared.shutdown.is_cancelled() {
                shared.state.send_replace(BridgeState::Failed(reason));
            }
        }
    }
}

/// Resolve the bus address, bind the reader object and subscribe its signals.
async fn connect<T: Transport>(
    shared: &Shared<T>,
) -> Result<(ServiceProxy<T>, InboxOf<T>), String> {
    let settings = &shared.settings;
    let address = BusAddressResolver::new(
        &shared.transport,
        &settings.discovery,
        settings.discovery_timeout,
    )
    .resolve()
    .await
    .map_err(|err| err.to_string())?;
    debug!(
        target: "yomiage::bootstrap",
        "Accessibility bus address is {}",
        address
    );

    let (proxy, inbox) = ServiceProxy::bind(
        &shared.transport,
        address.as_str(),
        &settings.reader,
        Arc::clone(&shared.router),
    )
    .await
    .map_err(|err| err.to_string())?;
    proxy.subscribe().await.map_err(|err| err.to_string())?;

    Ok((proxy, inbox))
}

/// Publish a bound proxy, unless shutdown got there first.
fn install<T: Transport>(shared: &Shared<T>, proxy: ServiceProxy<T>, inbox: InboxOf<T>) {
    let _lifecycle = shared.lifecycle.lock().recover_poison("install");
    if shared.shutdown.is_cancelled() {
        debug!(
            target: "yomiage::bootstrap",
            "Shut down while binding, releasing connection"
        );
        return;
    }

    let signal_task = spawn_signal_task(
        &Handle::current(),
        inbox,
        Arc::clone(&shared.router),
        Arc::clone(&shared.correlator),
    );
    *shared
        .signal_task
        .lock()
        .recover_poison("install") = Some(signal_task);
    shared.proxy.store(Some(Arc::new(proxy)));
    shared.state.send_replace(BridgeState::Bound);

    info!(
        target: "yomiage::bootstrap",
        "Speech output bound to {} {}",
        shared.settings.reader.service,
        shared.settings.reader.path
    );
}
