use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, SendError, Sender};

use crate::enrollment::domain::enrollment_session::EnrollmentSession;
use crate::enrollment::domain::session_message::{SessionRequest, SessionResponse};
use crate::enrollment::enrollment_logger::EnrollmentLogger;
use crate::enrollment::enrollment_protocol::EnrollmentProtocol;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Runs one session on its own thread.
///
/// Layout: `caller → requests → worker [extract/match/enroll] → responses → caller`
///
/// Messages of one session are handled strictly in order; separate workers
/// share the protocol and run in parallel. Closing the request side (via
/// [`SessionWorker::finish`]) or cancelling stops the worker after the
/// message in flight.
pub struct SessionWorker {
    requests: Sender<SessionRequest>,
    responses: Receiver<SessionResponse>,
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn EnrollmentLogger>>,
}

impl SessionWorker {
    pub fn spawn(
        protocol: Arc<EnrollmentProtocol>,
        session: EnrollmentSession,
        logger: Box<dyn EnrollmentLogger>,
    ) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::bounded(DEFAULT_CHANNEL_CAPACITY);
        let (response_tx, response_rx) = crossbeam_channel::unbounded();
        let cancelled = Arc::new(AtomicBool::new(false));

        let handle = spawn_session(
            protocol,
            session,
            logger,
            request_rx,
            response_tx,
            Arc::clone(&cancelled),
        );

        Self {
            requests: request_tx,
            responses: response_rx,
            cancelled,
            handle,
        }
    }

    /// Queues a message; blocks while the request queue is full. Fails with
    /// the request when the worker has stopped.
    pub fn submit(&self, request: SessionRequest) -> Result<(), SendError<SessionRequest>> {
        self.requests.send(request)
    }

    /// Responses in submission order.
    pub fn responses(&self) -> &Receiver<SessionResponse> {
        &self.responses
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Closes the session, waits for the worker and returns its logger.
    /// Responses not yet received are dropped.
    pub fn finish(self) -> Result<Box<dyn EnrollmentLogger>, Box<dyn std::error::Error>> {
        let Self {
            requests, handle, ..
        } = self;
        drop(requests);
        handle
            .join()
            .map_err(|_| "Session worker thread panicked".into())
    }
}

fn spawn_session(
    protocol: Arc<EnrollmentProtocol>,
    mut session: EnrollmentSession,
    mut logger: Box<dyn EnrollmentLogger>,
    request_rx: Receiver<SessionRequest>,
    response_tx: Sender<SessionResponse>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<Box<dyn EnrollmentLogger>> {
    std::thread::spawn(move || {
        for request in request_rx {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let response = protocol.process(&mut session, &request, &mut *logger);
            if response_tx.send(response).is_err() {
                break;
            }
        }
        logger
    })
}
