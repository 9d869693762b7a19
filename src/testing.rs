//! Recording fakes for the coordinator's collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::backend::{BackendError, BookingApi, BookingRecord, BookingStatus, PaymentMethod};
use crate::engine::alert::AlertPlayer;
use crate::navigation::{DriverUi, Notice, Screen};
use crate::transport::EventChannel;

#[derive(Default)]
pub struct RecordingChannel {
    connected: AtomicBool,
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingChannel {
    pub fn connected() -> Self {
        let channel = Self::default();
        channel.connected.store(true, Ordering::SeqCst);
        channel
    }

    pub fn named(&self, event: &str) -> Vec<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.named(event).len()
    }

    pub fn last(&self, event: &str) -> Option<Value> {
        self.named(event).pop()
    }
}

impl EventChannel for RecordingChannel {
    fn emit(&self, event: &str, data: Value) {
        if self.is_connected() {
            self.events.lock().unwrap().push((event.to_string(), data));
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingCall {
    AssignDriver { booking_id: String, driver_id: i64 },
    UpdatePayment { booking_id: String },
}

type HeldResponse = oneshot::Receiver<Result<BookingRecord, BackendError>>;

enum Scripted {
    Fail(String),
    Held(HeldResponse),
}

/// Booking client that succeeds immediately unless a response is scripted.
#[derive(Default)]
pub struct FakeBookings {
    calls: Mutex<Vec<BookingCall>>,
    script: Mutex<VecDeque<Scripted>>,
}

impl FakeBookings {
    pub fn calls(&self) -> Vec<BookingCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_next(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
    }

    /// The next call waits until the returned sender resolves it.
    pub fn hold_next(&self) -> oneshot::Sender<Result<BookingRecord, BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().push_back(Scripted::Held(rx));
        tx
    }

    async fn respond(&self, call: BookingCall) -> Result<BookingRecord, BackendError> {
        self.calls.lock().unwrap().push(call);
        let scripted = self.script.lock().unwrap().pop_front();

        match scripted {
            None => Ok(BookingRecord::default()),
            Some(Scripted::Fail(message)) => Err(BackendError::Server {
                status: 500,
                message,
            }),
            Some(Scripted::Held(rx)) => rx
                .await
                .unwrap_or(Err(BackendError::Timeout { attempts: 1 })),
        }
    }
}

#[async_trait]
impl BookingApi for FakeBookings {
    async fn assign_driver(
        &self,
        booking_id: &str,
        driver_id: i64,
    ) -> Result<BookingRecord, BackendError> {
        self.respond(BookingCall::AssignDriver {
            booking_id: booking_id.to_string(),
            driver_id,
        })
        .await
    }

    async fn update_payment_status(
        &self,
        booking_id: &str,
        _status: BookingStatus,
        _payment_method: PaymentMethod,
    ) -> Result<BookingRecord, BackendError> {
        self.respond(BookingCall::UpdatePayment {
            booking_id: booking_id.to_string(),
        })
        .await
    }
}

#[derive(Default)]
pub struct RecordingUi {
    screens: Mutex<Vec<Screen>>,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingUi {
    pub fn screens(&self) -> Vec<Screen> {
        self.screens.lock().unwrap().clone()
    }

    pub fn last_screen(&self) -> Option<Screen> {
        self.screens.lock().unwrap().last().cloned()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl DriverUi for RecordingUi {
    fn navigate(&self, screen: Screen) {
        self.screens.lock().unwrap().push(screen);
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

#[derive(Default)]
pub struct CountingAlert {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl CountingAlert {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AlertPlayer for CountingAlert {
    fn start(&self, _booking_id: &str) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self, _booking_id: &str) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
