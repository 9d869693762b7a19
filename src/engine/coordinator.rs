//! Ride lifecycle coordinator.
//!
//! A single task owns the ride state. Channel events, driver actions, booking
//! write completions and the offer deadline all arrive on that task and are
//! handled one at a time, so a stage is only ever changed by the handler that
//! observed it. Booking writes run on their own tasks and report back; every
//! completion and server event is checked against the current booking and
//! stage before it is applied.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BookingApi, BookingRecord, BookingStatus, PaymentMethod};
use crate::engine::alert::{AlertGuard, AlertPlayer};
use crate::error::RideError;
use crate::identity::Identity;
use crate::models::events::{
    DriverResponse, ResponseStatus, RideStarted, RideStatusUpdate, TripCancelled,
    DRIVER_RESPONSE, RIDE_STARTED, STATUS_RIDE_STARTED,
};
use crate::models::offer::{RideOffer, RideSummary};
use crate::models::presence::PositionSample;
use crate::models::session::{RideSession, RideSnapshot, RideStage};
use crate::navigation::{DriverUi, Notice, Screen};
use crate::observability::metrics::Metrics;
use crate::transport::EventChannel;

/// How many cancelled booking ids are remembered for late offers.
const CANCELLED_MEMORY: usize = 64;

type Reply = oneshot::Sender<Result<RideSnapshot, RideError>>;

#[derive(Debug)]
pub enum DriverAction {
    Accept { booking_id: String },
    Reject { booking_id: String },
    Arrived { booking_id: String },
    SubmitOtp { booking_id: String, code: String },
    EndTrip { booking_id: String },
    ConfirmCash { booking_id: String },
    AcknowledgeCancellation,
}

impl DriverAction {
    fn name(&self) -> &'static str {
        match self {
            DriverAction::Accept { .. } => "accept",
            DriverAction::Reject { .. } => "reject",
            DriverAction::Arrived { .. } => "arrived",
            DriverAction::SubmitOtp { .. } => "submit_otp",
            DriverAction::EndTrip { .. } => "end_trip",
            DriverAction::ConfirmCash { .. } => "confirm_cash",
            DriverAction::AcknowledgeCancellation => "acknowledge_cancellation",
        }
    }
}

enum Command {
    BookingRequest(RideOffer),
    TripCancelled(TripCancelled),
    RideStatus(RideStatusUpdate),
    ChannelStatus(bool),
    Position(PositionSample),
    Driver(DriverAction, Reply),
    Snapshot(Reply),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    AssignDriver,
    CompletePayment,
}

impl WriteOp {
    fn label(&self) -> &'static str {
        match self {
            WriteOp::AssignDriver => "assign_driver",
            WriteOp::CompletePayment => "complete_payment",
        }
    }

    /// Stage the ride must still be in for the result to apply.
    fn stage(&self) -> RideStage {
        match self {
            WriteOp::AssignDriver => RideStage::AwaitingTripStart,
            WriteOp::CompletePayment => RideStage::PaymentPending,
        }
    }
}

struct WriteCompletion {
    booking_id: String,
    op: WriteOp,
    result: Result<BookingRecord, BackendError>,
}

pub struct CoordinatorDeps {
    pub channel: Arc<dyn EventChannel>,
    pub bookings: Arc<dyn BookingApi>,
    pub ui: Arc<dyn DriverUi>,
    pub alert: Arc<dyn AlertPlayer>,
    pub identity: Identity,
    pub duty: watch::Receiver<bool>,
    pub metrics: Metrics,
}

struct PendingOffer {
    offer: RideOffer,
    deadline: Instant,
    expires_at: DateTime<Utc>,
    alert: AlertGuard,
}

/// A booking write in flight. Drivers repeating the action join `waiters`
/// instead of issuing a second write.
struct PendingWrite {
    op: WriteOp,
    waiters: Vec<Reply>,
}

struct ActiveRide {
    session: RideSession,
    write: Option<PendingWrite>,
}

enum RideState {
    Idle,
    OfferPending(PendingOffer),
    Active(ActiveRide),
    Cancelled { booking_id: String, message: String },
}

impl RideState {
    fn stage(&self) -> RideStage {
        match self {
            RideState::Idle => RideStage::Idle,
            RideState::OfferPending(_) => RideStage::OfferPending,
            RideState::Active(ride) => ride.session.stage,
            RideState::Cancelled { .. } => RideStage::Cancelled,
        }
    }

    fn active_booking_id(&self) -> Option<&str> {
        match self {
            RideState::OfferPending(pending) => Some(&pending.offer.booking_id),
            RideState::Active(ride) => Some(ride.session.booking_id()),
            RideState::Idle | RideState::Cancelled { .. } => None,
        }
    }
}

enum Step {
    Done,
    AwaitWrite,
}

struct Coordinator {
    deps: CoordinatorDeps,
    offer_timeout: Duration,
    state: RideState,
    last_position: Option<PositionSample>,
    cancelled: VecDeque<String>,
    completions: mpsc::UnboundedSender<WriteCompletion>,
    snapshot_tx: watch::Sender<RideSnapshot>,
}

/// Starts the coordinator task and returns the handle used to feed it.
pub fn spawn(deps: CoordinatorDeps, offer_timeout: Duration) -> CoordinatorHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(RideSnapshot::idle(None));

    let coordinator = Coordinator {
        deps,
        offer_timeout,
        state: RideState::Idle,
        last_position: None,
        cancelled: VecDeque::with_capacity(CANCELLED_MEMORY),
        completions: completions_tx,
        snapshot_tx,
    };
    tokio::spawn(coordinator.run(commands_rx, completions_rx));

    CoordinatorHandle {
        commands: commands_tx,
        snapshot: snapshot_rx,
    }
}

impl Coordinator {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<WriteCompletion>,
    ) {
        info!(
            offer_timeout_secs = self.offer_timeout.as_secs(),
            "ride coordinator started"
        );

        loop {
            let deadline = match &self.state {
                RideState::OfferPending(pending) => Some(pending.deadline),
                _ => None,
            };

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(done) = completions.recv() => self.on_write_completed(done),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_offer_expired();
                }
            }

            self.publish();
        }

        info!("ride coordinator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::BookingRequest(offer) => self.on_booking_request(offer),
            Command::TripCancelled(event) => self.on_trip_cancelled(event),
            Command::RideStatus(update) => self.on_ride_status(update),
            Command::ChannelStatus(connected) => self.on_channel_status(connected),
            Command::Position(sample) => self.on_position(sample),
            Command::Driver(action, reply) => self.on_driver_action(action, reply),
            Command::Snapshot(reply) => {
                let _ = reply.send(Ok(self.snapshot()));
            }
        }
    }

    fn on_booking_request(&mut self, offer: RideOffer) {
        let booking_id = offer.booking_id.clone();

        if !*self.deps.duty.borrow() {
            info!(booking_id = %booking_id, "off duty; ignoring booking request");
            self.count_offer("off_duty");
            return;
        }

        if self.cancelled.contains(&booking_id) {
            info!(booking_id = %booking_id, "booking request for a cancelled booking");
            self.count_stale("booking_request");
            return;
        }

        match &self.state {
            RideState::Idle => {}
            RideState::Cancelled {
                booking_id: cancelled,
                ..
            } => {
                info!(
                    booking_id = %booking_id,
                    cancelled = %cancelled,
                    "new offer supersedes unacknowledged cancellation"
                );
            }
            RideState::OfferPending(pending) if pending.offer.booking_id == booking_id => {
                debug!(booking_id = %booking_id, "duplicate booking request");
                self.count_stale("booking_request");
                return;
            }
            state => {
                info!(
                    booking_id = %booking_id,
                    stage = %state.stage(),
                    "ride in progress; ignoring booking request"
                );
                self.count_offer("busy");
                return;
            }
        }

        let alert = AlertGuard::start(Arc::clone(&self.deps.alert), &booking_id);
        let deadline = Instant::now() + self.offer_timeout;
        let expires_at = chrono::Duration::from_std(self.offer_timeout)
            .ok()
            .and_then(|window| Utc::now().checked_add_signed(window))
            .unwrap_or_else(Utc::now);

        info!(
            booking_id = %booking_id,
            price = offer.total_price,
            "booking request received"
        );
        self.count_offer("surfaced");
        self.deps.ui.navigate(Screen::Offer {
            ride: RideSummary::from(&offer),
            expires_at,
        });
        self.enter(RideState::OfferPending(PendingOffer {
            offer,
            deadline,
            expires_at,
            alert,
        }));
    }

    fn on_offer_expired(&mut self) {
        let pending = match std::mem::replace(&mut self.state, RideState::Idle) {
            RideState::OfferPending(pending) => pending,
            other => {
                self.state = other;
                return;
            }
        };

        info!(booking_id = %pending.offer.booking_id, "offer window elapsed");
        self.decline(pending, true);
    }

    fn on_trip_cancelled(&mut self, event: TripCancelled) {
        let TripCancelled {
            booking_id,
            message,
        } = event;
        self.remember_cancellation(&booking_id);

        if self.state.active_booking_id() != Some(booking_id.as_str()) {
            debug!(
                booking_id = %booking_id,
                stage = %self.state.stage(),
                "cancellation for a booking that is not active"
            );
            self.count_stale("trip_cancelled");
            return;
        }

        match std::mem::replace(&mut self.state, RideState::Idle) {
            RideState::OfferPending(pending) => {
                pending.alert.stop();
                self.count_offer("cancelled");
            }
            RideState::Active(ride) => {
                if let Some(write) = ride.write {
                    for waiter in write.waiters {
                        let _ = waiter.send(Err(RideError::Cancelled(booking_id.clone())));
                    }
                }
            }
            RideState::Idle | RideState::Cancelled { .. } => {}
        }

        warn!(booking_id = %booking_id, message = %message, "ride cancelled by rider");
        self.deps.ui.notify(Notice::RideCancelled {
            booking_id: booking_id.clone(),
            message: message.clone(),
        });
        self.enter(RideState::Cancelled {
            booking_id,
            message,
        });
    }

    fn on_ride_status(&mut self, update: RideStatusUpdate) {
        if let Some(booking_id) = update.booking_id.as_deref() {
            if self.state.active_booking_id() != Some(booking_id) {
                debug!(booking_id, status = %update.status, "status update for another booking");
                self.count_stale("ride_status");
                return;
            }
        }

        if update.status == STATUS_RIDE_STARTED {
            let arrived = match &self.state {
                RideState::Active(ride) if ride.session.stage == RideStage::EnRouteToPickup => {
                    Some(ride.session.booking_id().to_string())
                }
                _ => None,
            };
            if let Some(booking_id) = arrived {
                info!(booking_id = %booking_id, "server reports ride started; treating as arrival");
                self.mark_arrived();
            }
        }

        let message = describe_status(&update);
        self.deps.ui.notify(Notice::RideStatus {
            status: update.status,
            message,
        });
    }

    fn on_channel_status(&mut self, connected: bool) {
        if connected {
            info!(stage = %self.state.stage(), "dispatch channel connected");
        } else {
            warn!(stage = %self.state.stage(), "dispatch channel lost");
        }
        self.deps.ui.notify(Notice::ChannelStatus { connected });
    }

    fn on_position(&mut self, sample: PositionSample) {
        if let Some(current) = &self.last_position {
            if !sample.is_newer_than(current) {
                debug!("ignoring out-of-order position sample");
                return;
            }
        }

        self.last_position = Some(sample);
        if let RideState::Active(ride) = &mut self.state {
            ride.session.driver_position = Some(sample);
        }
    }

    fn on_driver_action(&mut self, action: DriverAction, reply: Reply) {
        let name = action.name();
        let result = match action {
            DriverAction::Accept { booking_id } => self.accept(&booking_id),
            DriverAction::Reject { booking_id } => self.reject(&booking_id),
            DriverAction::Arrived { booking_id } => self.arrive(&booking_id),
            DriverAction::SubmitOtp { booking_id, code } => self.submit_otp(&booking_id, &code),
            DriverAction::EndTrip { booking_id } => self.end_trip(&booking_id),
            DriverAction::ConfirmCash { booking_id } => self.confirm_cash(&booking_id),
            DriverAction::AcknowledgeCancellation => self.acknowledge_cancellation(),
        };

        match result {
            Ok(Step::Done) => {
                let _ = reply.send(Ok(self.snapshot()));
            }
            Ok(Step::AwaitWrite) => match &mut self.state {
                RideState::Active(ActiveRide {
                    write: Some(write), ..
                }) => write.waiters.push(reply),
                _ => {
                    let _ = reply.send(Ok(self.snapshot()));
                }
            },
            Err(err) => {
                debug!(action = name, error = %err, "driver action refused");
                let _ = reply.send(Err(err));
            }
        }
    }

    fn accept(&mut self, booking_id: &str) -> Result<Step, RideError> {
        let PendingOffer { offer, alert, .. } = self.take_offer(booking_id, "accept")?;

        self.respond(&offer.booking_id, ResponseStatus::Accepted);
        alert.stop();
        info!(booking_id, "offer accepted");
        self.count_offer("accepted");

        let session = RideSession::from_offer(offer, self.last_position);
        self.deps.ui.navigate(Screen::GoToPickup {
            ride: session.summary(),
        });
        self.enter(RideState::Active(ActiveRide {
            session,
            write: None,
        }));
        Ok(Step::Done)
    }

    fn reject(&mut self, booking_id: &str) -> Result<Step, RideError> {
        let pending = self.take_offer(booking_id, "reject")?;
        info!(booking_id, "offer rejected by driver");
        self.decline(pending, false);
        Ok(Step::Done)
    }

    fn arrive(&mut self, booking_id: &str) -> Result<Step, RideError> {
        self.active_ride(booking_id, RideStage::EnRouteToPickup, "mark arrival")?;
        info!(booking_id, "arrived at pickup");
        self.mark_arrived();
        Ok(Step::Done)
    }

    fn submit_otp(&mut self, booking_id: &str, code: &str) -> Result<Step, RideError> {
        let (matches, in_flight) = {
            let ride = self.active_ride(booking_id, RideStage::AwaitingTripStart, "start trip")?;
            (ride.session.offer.otp_matches(code), ride.write.is_some())
        };

        if !matches {
            warn!(booking_id, "trip start code mismatch");
            self.deps.ui.notify(Notice::InvalidOtp {
                booking_id: booking_id.to_string(),
            });
            return Err(RideError::InvalidOtp);
        }

        if in_flight {
            debug!(booking_id, "driver assignment already in flight");
        } else {
            self.begin_write(booking_id, WriteOp::AssignDriver);
        }
        Ok(Step::AwaitWrite)
    }

    fn end_trip(&mut self, booking_id: &str) -> Result<Step, RideError> {
        let summary = {
            let ride = self.active_ride(booking_id, RideStage::EnRouteToDropoff, "end trip")?;
            ride.session.stage = RideStage::PaymentPending;
            ride.session.summary()
        };

        info!(booking_id, "trip ended; collecting payment");
        self.record_stage(RideStage::PaymentPending);
        self.deps.ui.navigate(Screen::Payment { ride: summary });
        Ok(Step::Done)
    }

    fn confirm_cash(&mut self, booking_id: &str) -> Result<Step, RideError> {
        let in_flight = self
            .active_ride(booking_id, RideStage::PaymentPending, "confirm payment")?
            .write
            .is_some();

        if in_flight {
            debug!(booking_id, "payment update already in flight");
        } else {
            self.begin_write(booking_id, WriteOp::CompletePayment);
        }
        Ok(Step::AwaitWrite)
    }

    fn acknowledge_cancellation(&mut self) -> Result<Step, RideError> {
        match &self.state {
            RideState::Cancelled { booking_id, .. } => {
                info!(booking_id = %booking_id, "cancellation acknowledged");
                self.deps.ui.navigate(Screen::Home);
                self.enter(RideState::Idle);
                Ok(Step::Done)
            }
            state => Err(RideError::InvalidTransition {
                action: "acknowledge cancellation",
                stage: state.stage(),
            }),
        }
    }

    fn begin_write(&mut self, booking_id: &str, op: WriteOp) {
        if let RideState::Active(ride) = &mut self.state {
            ride.write = Some(PendingWrite {
                op,
                waiters: Vec::new(),
            });
        }

        let bookings = Arc::clone(&self.deps.bookings);
        let completions = self.completions.clone();
        let metrics = self.deps.metrics.clone();
        let driver_id = self.deps.identity.driver_id;
        let booking_id = booking_id.to_string();

        info!(booking_id = %booking_id, operation = op.label(), "booking write started");

        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let result = match op {
                WriteOp::AssignDriver => bookings.assign_driver(&booking_id, driver_id).await,
                WriteOp::CompletePayment => {
                    bookings
                        .update_payment_status(
                            &booking_id,
                            BookingStatus::Completed,
                            PaymentMethod::Cash,
                        )
                        .await
                }
            };

            let outcome = if result.is_ok() { "success" } else { "error" };
            metrics
                .booking_write_latency_seconds
                .with_label_values(&[op.label()])
                .observe(started.elapsed().as_secs_f64());
            metrics
                .booking_writes_total
                .with_label_values(&[op.label(), outcome])
                .inc();

            let _ = completions.send(WriteCompletion {
                booking_id,
                op,
                result,
            });
        });
    }

    fn on_write_completed(&mut self, done: WriteCompletion) {
        let WriteCompletion {
            booking_id,
            op,
            result,
        } = done;

        let write = match &mut self.state {
            RideState::Active(ride)
                if ride.session.booking_id() == booking_id
                    && ride.session.stage == op.stage()
                    && ride.write.as_ref().is_some_and(|write| write.op == op) =>
            {
                ride.write.take()
            }
            _ => None,
        };

        let Some(write) = write else {
            info!(
                booking_id = %booking_id,
                operation = op.label(),
                ok = result.is_ok(),
                "discarding booking response for a superseded ride"
            );
            self.count_stale("booking_response");
            return;
        };

        let reply = match result {
            Ok(record) => {
                debug!(booking_id = %booking_id, record_id = ?record.id, "booking write committed");
                self.commit_write(&booking_id, op);
                Ok(self.snapshot())
            }
            Err(err) => {
                warn!(
                    booking_id = %booking_id,
                    operation = op.label(),
                    error = %err,
                    "booking write failed; stage unchanged"
                );
                let message = err.to_string();
                self.deps.ui.notify(Notice::WriteFailed {
                    booking_id: booking_id.clone(),
                    message: message.clone(),
                });
                Err(RideError::DurableWrite(message))
            }
        };

        for waiter in write.waiters {
            let _ = waiter.send(reply.clone());
        }
    }

    fn commit_write(&mut self, booking_id: &str, op: WriteOp) {
        match op {
            WriteOp::AssignDriver => {
                let summary = match &mut self.state {
                    RideState::Active(ride) => {
                        ride.session.stage = RideStage::EnRouteToDropoff;
                        ride.session.summary()
                    }
                    _ => return,
                };

                info!(booking_id, "trip started");
                self.record_stage(RideStage::EnRouteToDropoff);
                self.deps.channel.emit(
                    RIDE_STARTED,
                    json!(RideStarted {
                        driver_id: self.deps.identity.driver_id,
                        booking_id: booking_id.to_string(),
                    }),
                );
                self.deps.ui.navigate(Screen::RideEnd { ride: summary });
            }
            WriteOp::CompletePayment => {
                if let RideState::Active(ride) = &mut self.state {
                    ride.session.cash_settled = true;
                }

                info!(booking_id, cash_settled = true, "ride complete");
                self.deps.ui.navigate(Screen::Home);
                self.enter(RideState::Idle);
            }
        }
    }

    /// Checks that a driver action names the ride currently on screen.
    fn ensure_current(&self, booking_id: &str) -> Result<(), RideError> {
        if let RideState::Cancelled {
            booking_id: cancelled,
            ..
        } = &self.state
        {
            if cancelled == booking_id {
                return Err(RideError::Cancelled(booking_id.to_string()));
            }
        }

        match self.state.active_booking_id() {
            Some(active) if active == booking_id => Ok(()),
            _ if self.cancelled.iter().any(|id| id == booking_id) => {
                Err(RideError::Cancelled(booking_id.to_string()))
            }
            _ => Err(RideError::Stale(booking_id.to_string())),
        }
    }

    fn take_offer(
        &mut self,
        booking_id: &str,
        action: &'static str,
    ) -> Result<PendingOffer, RideError> {
        self.ensure_current(booking_id)?;

        match std::mem::replace(&mut self.state, RideState::Idle) {
            RideState::OfferPending(pending) => Ok(pending),
            other => {
                let stage = other.stage();
                self.state = other;
                Err(RideError::InvalidTransition { action, stage })
            }
        }
    }

    fn active_ride(
        &mut self,
        booking_id: &str,
        expected: RideStage,
        action: &'static str,
    ) -> Result<&mut ActiveRide, RideError> {
        self.ensure_current(booking_id)?;

        let stage = self.state.stage();
        match &mut self.state {
            RideState::Active(ride) if ride.session.stage == expected => Ok(ride),
            _ => Err(RideError::InvalidTransition { action, stage }),
        }
    }

    fn mark_arrived(&mut self) {
        let summary = match &mut self.state {
            RideState::Active(ride) => {
                ride.session.stage = RideStage::AwaitingTripStart;
                ride.session.summary()
            }
            _ => return,
        };

        self.record_stage(RideStage::AwaitingTripStart);
        self.deps.ui.navigate(Screen::VerifyOtp { ride: summary });
    }

    fn decline(&mut self, pending: PendingOffer, expired: bool) {
        let PendingOffer { offer, alert, .. } = pending;

        self.respond(&offer.booking_id, ResponseStatus::Rejected);
        alert.stop();
        self.count_offer(if expired { "expired" } else { "rejected" });

        self.deps.ui.notify(Notice::OfferRejected {
            booking_id: offer.booking_id,
            expired,
        });
        self.deps.ui.navigate(Screen::Home);
        self.enter(RideState::Idle);
    }

    fn respond(&self, booking_id: &str, status: ResponseStatus) {
        self.deps.channel.emit(
            DRIVER_RESPONSE,
            json!(DriverResponse {
                booking_id: booking_id.to_string(),
                driver_id: self.deps.identity.driver_id,
                status,
            }),
        );
    }

    fn enter(&mut self, state: RideState) {
        let stage = state.stage();
        self.state = state;
        self.record_stage(stage);
    }

    fn record_stage(&self, stage: RideStage) {
        debug!(stage = %stage, "stage changed");
        self.deps
            .metrics
            .stage_transitions_total
            .with_label_values(&[stage.as_str()])
            .inc();
    }

    fn remember_cancellation(&mut self, booking_id: &str) {
        if self.cancelled.iter().any(|id| id == booking_id) {
            return;
        }
        if self.cancelled.len() == CANCELLED_MEMORY {
            self.cancelled.pop_front();
        }
        self.cancelled.push_back(booking_id.to_string());
    }

    fn count_offer(&self, outcome: &str) {
        self.deps
            .metrics
            .offers_total
            .with_label_values(&[outcome])
            .inc();
    }

    fn count_stale(&self, kind: &str) {
        self.deps
            .metrics
            .stale_events_total
            .with_label_values(&[kind])
            .inc();
    }

    fn snapshot(&self) -> RideSnapshot {
        let mut snapshot = RideSnapshot::idle(self.last_position);
        snapshot.stage = self.state.stage();

        match &self.state {
            RideState::Idle => {}
            RideState::OfferPending(pending) => {
                snapshot.booking_id = Some(pending.offer.booking_id.clone());
                snapshot.ride = Some(RideSummary::from(&pending.offer));
                snapshot.offer_expires_at = Some(pending.expires_at);
            }
            RideState::Active(ride) => {
                snapshot.booking_id = Some(ride.session.booking_id().to_string());
                snapshot.ride = Some(ride.session.summary());
                snapshot.driver_position = ride.session.driver_position.or(self.last_position);
                snapshot.distance_to_target_km = ride.session.distance_to_target_km();
                snapshot.cash_settled = ride.session.cash_settled;
                snapshot.write_in_flight = ride.write.is_some();
            }
            RideState::Cancelled {
                booking_id,
                message,
            } => {
                snapshot.booking_id = Some(booking_id.clone());
                snapshot.cancellation_message = Some(message.clone());
            }
        }

        snapshot
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

fn describe_status(update: &RideStatusUpdate) -> String {
    let headline = match update.status.as_str() {
        STATUS_RIDE_STARTED => "Trip ready to start".to_string(),
        "ride_completed" => "Trip completed".to_string(),
        "driver_arrived" => "Arrived at pickup".to_string(),
        other => {
            let words = other.replace('_', " ");
            let mut chars = words.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Ride updated".to_string(),
            }
        }
    };

    let Some(name) = &update.driver_name else {
        return headline;
    };
    let vehicle = [update.vehicle_type.as_deref(), update.vehicle_number.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if vehicle.is_empty() {
        format!("{headline} with {name}")
    } else {
        format!("{headline} with {name} ({vehicle})")
    }
}

/// Cloneable entry point into the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<RideSnapshot>,
}

impl CoordinatorHandle {
    pub fn booking_request(&self, offer: RideOffer) {
        self.enqueue(Command::BookingRequest(offer));
    }

    pub fn trip_cancelled(&self, event: TripCancelled) {
        self.enqueue(Command::TripCancelled(event));
    }

    pub fn ride_status(&self, update: RideStatusUpdate) {
        self.enqueue(Command::RideStatus(update));
    }

    pub fn channel_status(&self, connected: bool) {
        self.enqueue(Command::ChannelStatus(connected));
    }

    pub fn position(&self, sample: PositionSample) {
        self.enqueue(Command::Position(sample));
    }

    pub async fn accept(&self, booking_id: &str) -> Result<RideSnapshot, RideError> {
        self.act(DriverAction::Accept {
            booking_id: booking_id.to_string(),
        })
        .await
    }

    pub async fn reject(&self, booking_id: &str) -> Result<RideSnapshot, RideError> {
        self.act(DriverAction::Reject {
            booking_id: booking_id.to_string(),
        })
        .await
    }

    pub async fn arrived(&self, booking_id: &str) -> Result<RideSnapshot, RideError> {
        self.act(DriverAction::Arrived {
            booking_id: booking_id.to_string(),
        })
        .await
    }

    /// Resolves once the driver assignment write has committed or failed.
    pub async fn submit_otp(&self, booking_id: &str, code: &str) -> Result<RideSnapshot, RideError> {
        self.act(DriverAction::SubmitOtp {
            booking_id: booking_id.to_string(),
            code: code.to_string(),
        })
        .await
    }

    pub async fn end_trip(&self, booking_id: &str) -> Result<RideSnapshot, RideError> {
        self.act(DriverAction::EndTrip {
            booking_id: booking_id.to_string(),
        })
        .await
    }

    /// Resolves once the payment write has committed or failed.
    pub async fn confirm_cash(&self, booking_id: &str) -> Result<RideSnapshot, RideError> {
        self.act(DriverAction::ConfirmCash {
            booking_id: booking_id.to_string(),
        })
        .await
    }

    pub async fn acknowledge_cancellation(&self) -> Result<RideSnapshot, RideError> {
        self.act(DriverAction::AcknowledgeCancellation).await
    }

    /// Snapshot taken after every previously enqueued command was handled.
    pub async fn current(&self) -> Result<RideSnapshot, RideError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| RideError::Unavailable)?
    }

    /// Last published snapshot, without waiting on the coordinator.
    pub fn snapshot(&self) -> RideSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RideSnapshot> {
        self.snapshot.clone()
    }

    async fn act(&self, action: DriverAction) -> Result<RideSnapshot, RideError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Driver(action, tx))?;
        rx.await.map_err(|_| RideError::Unavailable)?
    }

    fn enqueue(&self, command: Command) {
        if self.send(command).is_err() {
            warn!("ride coordinator stopped; dropping event");
        }
    }

    fn send(&self, command: Command) -> Result<(), RideError> {
        self.commands
            .send(command)
            .map_err(|_| RideError::Unavailable)
    }
}
