//! Background routing.
//!
//! Requests are coalesced per wire: while a wire waits for a worker only its newest
//! request is kept, so a burst of edits costs one route. Results come back over a channel
//! tagged with a [`Ticket`]; [`RouteInbox`] keeps the newest result per wire and drops
//! anything older or belonging to a cancelled wire.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::DispatchError;
use crate::routing::{LaneOffsets, ObstacleProvider, Route, RouteRequest, Router, SiblingWireProvider, WireId};

/// Identifies one submitted request. Sequence numbers grow across all wires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub wire: WireId,
    pub seq: u64,
}

#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Completed {
        ticket: Ticket,
        route: Route,
    },
    Failed {
        ticket: Ticket,
        request: RouteRequest,
        message: String,
    },
}

impl RouteOutcome {
    pub fn ticket(&self) -> &Ticket {
        match self {
            RouteOutcome::Completed { ticket, .. } | RouteOutcome::Failed { ticket, .. } => ticket,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Requests replaced by a newer one before a worker picked them up.
    pub superseded: usize,
    /// Requests dropped by [`RouteDispatcher::cancel`].
    pub discarded: usize,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    superseded: AtomicUsize,
    discarded: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct Job<C> {
    ticket: Ticket,
    request: RouteRequest,
    context: Arc<C>,
}

struct Shared<C> {
    pending: Mutex<HashMap<WireId, Job<C>>>,
    cancelled: Mutex<HashSet<WireId>>,
    counters: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes wires on a rayon pool. `C` is the scene snapshot a job routes against.
pub struct RouteDispatcher<C> {
    pool: rayon::ThreadPool,
    router: Arc<Router>,
    shared: Arc<Shared<C>>,
    next_seq: AtomicU64,
    results: Sender<RouteOutcome>,
}

impl<C> RouteDispatcher<C>
where
    C: ObstacleProvider + SiblingWireProvider + Send + Sync + 'static,
{
    /// Starts the worker pool. Outcomes arrive on the returned receiver.
    pub fn new(router: Router) -> Result<(Self, Receiver<RouteOutcome>), DispatchError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("wirepath-route-{i}"));
        let threads = router.config().worker_threads;
        if threads > 0 {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;
        tracing::debug!(threads = pool.current_num_threads(), "routing workers started");
        let (results, receiver) = mpsc::channel();
        let dispatcher = Self {
            pool,
            router: Arc::new(router),
            shared: Arc::new(Shared {
                pending: Mutex::new(HashMap::new()),
                cancelled: Mutex::new(HashSet::new()),
                counters: Counters::default(),
            }),
            next_seq: AtomicU64::new(0),
            results,
        };
        Ok((dispatcher, receiver))
    }

    pub fn submit(&self, request: RouteRequest, context: Arc<C>) -> Result<Ticket, DispatchError> {
        if lock(&self.shared.cancelled).contains(&request.wire) {
            return Err(DispatchError::Cancelled(request.wire));
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let ticket = Ticket {
            wire: request.wire.clone(),
            seq,
        };
        bump(&self.shared.counters.submitted);

        let job = Job {
            ticket: ticket.clone(),
            request,
            context,
        };
        if let Some(old) = lock(&self.shared.pending).insert(ticket.wire.clone(), job) {
            bump(&self.shared.counters.superseded);
            tracing::trace!(wire = %ticket.wire, seq = old.ticket.seq, "request superseded");
        }

        let shared = Arc::clone(&self.shared);
        let router = Arc::clone(&self.router);
        let results = self.results.clone();
        let wire = ticket.wire.clone();
        self.pool.spawn(move || {
            // A task spawned for an older request runs the newest one; later tasks
            // for the same wire then find the slot empty.
            let Some(job) = lock(&shared.pending).remove(&wire) else {
                return;
            };
            let outcome = run_job(&router, job, &shared.counters);
            if results.send(outcome).is_err() {
                tracing::debug!(wire = %wire, "result receiver dropped");
            }
        });
        Ok(ticket)
    }

    /// Stops routing `wire`: its waiting request is dropped and new submissions fail.
    pub fn cancel(&self, wire: &WireId) {
        lock(&self.shared.cancelled).insert(wire.clone());
        if lock(&self.shared.pending).remove(wire).is_some() {
            bump(&self.shared.counters.discarded);
        }
    }

    /// Accepts submissions for a previously cancelled wire again.
    pub fn resume(&self, wire: &WireId) {
        lock(&self.shared.cancelled).remove(wire);
    }

    /// Requests waiting for a worker.
    pub fn pending(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.shared.counters;
        DispatchStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            superseded: c.superseded.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
        }
    }
}

fn run_job<C>(router: &Router, job: Job<C>, counters: &Counters) -> RouteOutcome
where
    C: ObstacleProvider + SiblingWireProvider,
{
    let Job {
        ticket,
        request,
        context,
    } = job;
    let scene: &C = &context;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        router.try_route(&request, Some(scene), Some(scene))
    }));
    let message = match result {
        Ok(Ok(route)) => {
            bump(&counters.completed);
            return RouteOutcome::Completed { ticket, route };
        }
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };
    bump(&counters.failed);
    tracing::warn!(wire = %ticket.wire, seq = ticket.seq, "routing failed: {message}");
    RouteOutcome::Failed {
        ticket,
        request,
        message,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("router panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("router panicked: {message}")
    } else {
        "router panicked".to_string()
    }
}

/// What [`RouteInbox::accept`] did with an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxEvent {
    Updated(Ticket),
    /// The job failed and the wire had no route yet, so a straight line stands in.
    FellBack(Ticket),
    /// The job failed and the previous route was kept.
    KeptLastKnown(Ticket),
    /// An older ticket than one already accepted.
    Stale(Ticket),
    /// The wire was cancelled.
    Discarded(Ticket),
}

/// Receiving side of the dispatcher, owned by whoever displays the routes.
#[derive(Debug, Default)]
pub struct RouteInbox {
    latest: HashMap<WireId, u64>,
    routes: HashMap<WireId, Route>,
    cancelled: HashSet<WireId>,
}

impl RouteInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, outcome: RouteOutcome) -> InboxEvent {
        let ticket = outcome.ticket().clone();
        if self.cancelled.contains(&ticket.wire) {
            return InboxEvent::Discarded(ticket);
        }
        if self.latest.get(&ticket.wire).is_some_and(|&seq| seq >= ticket.seq) {
            tracing::trace!(wire = %ticket.wire, seq = ticket.seq, "stale route dropped");
            return InboxEvent::Stale(ticket);
        }
        self.latest.insert(ticket.wire.clone(), ticket.seq);
        match outcome {
            RouteOutcome::Completed { route, .. } => {
                self.routes.insert(ticket.wire.clone(), route);
                InboxEvent::Updated(ticket)
            }
            RouteOutcome::Failed { request, .. } => {
                if self.routes.contains_key(&ticket.wire) {
                    InboxEvent::KeptLastKnown(ticket)
                } else {
                    self.routes.insert(ticket.wire.clone(), straight_route(&request));
                    InboxEvent::FellBack(ticket)
                }
            }
        }
    }

    /// Accepts every outcome already waiting on `results`.
    pub fn drain(&mut self, results: &Receiver<RouteOutcome>) -> Vec<InboxEvent> {
        results.try_iter().map(|outcome| self.accept(outcome)).collect()
    }

    /// Forgets `wire`; results still in flight for it will be discarded.
    pub fn cancel(&mut self, wire: &WireId) -> Option<Route> {
        self.cancelled.insert(wire.clone());
        self.latest.remove(wire);
        self.routes.remove(wire)
    }

    pub fn resume(&mut self, wire: &WireId) {
        self.cancelled.remove(wire);
    }

    pub fn route(&self, wire: &WireId) -> Option<&Route> {
        self.routes.get(wire)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }
}

fn straight_route(request: &RouteRequest) -> Route {
    let points = vec![request.start.position, request.end.position];
    Route {
        wire: request.wire.clone(),
        base: points.clone(),
        points,
        swapped: false,
        bumps: Vec::new(),
        lanes: LaneOffsets::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::RouterConfig;
    use crate::geometry::{Edge, Point, Rect};
    use crate::routing::{Endpoint, FanOutEntry, Obstacle, PinId, WireSegment};
    use crate::scene::{Component, Pin, Scene, WireSpec};

    const WAIT: Duration = Duration::from_secs(10);

    fn scene() -> Scene {
        let mut scene = Scene::new();
        scene
            .add_component(Component::new("a", Rect::from_xywh(0.0, 0.0, 100.0, 100.0)))
            .unwrap();
        scene
            .add_component(Component::new("b", Rect::from_xywh(300.0, 150.0, 100.0, 100.0)))
            .unwrap();
        scene.add_pin(Pin::on_edge("a.out", "a", Edge::Right, 50.0)).unwrap();
        scene.add_pin(Pin::on_edge("b.in", "b", Edge::Left, 50.0)).unwrap();
        scene.add_wire(WireSpec::new("w", "a.out", "b.in")).unwrap();
        scene
    }

    fn router(threads: usize) -> Router {
        Router::new(RouterConfig {
            worker_threads: threads,
            ..RouterConfig::default()
        })
    }

    fn completed(route: Route, seq: u64) -> RouteOutcome {
        RouteOutcome::Completed {
            ticket: Ticket {
                wire: route.wire.clone(),
                seq,
            },
            route,
        }
    }

    #[test]
    fn background_route_matches_synchronous_route() {
        let scene = Arc::new(scene());
        let request = scene.request(&"w".into()).unwrap();
        let expected = router(2).route(&request, Some(&*scene), Some(&*scene));

        let (dispatcher, results) = RouteDispatcher::new(router(2)).unwrap();
        let ticket = dispatcher.submit(request, Arc::clone(&scene)).unwrap();
        let outcome = results.recv_timeout(WAIT).unwrap();
        assert_eq!(outcome.ticket(), &ticket);

        let mut inbox = RouteInbox::new();
        assert_eq!(inbox.accept(outcome), InboxEvent::Updated(ticket));
        assert_eq!(inbox.route(&"w".into()).unwrap().points, expected.points);
        assert_eq!(dispatcher.stats().completed, 1);
    }

    #[test]
    fn inbox_keeps_only_the_newest_result() {
        let scene = scene();
        let request = scene.request(&"w".into()).unwrap();
        let newer = Router::default().route(&request, Some(&scene), None);
        let mut older = newer.clone();
        older.points.truncate(2);

        let mut inbox = RouteInbox::new();
        assert!(matches!(inbox.accept(completed(newer.clone(), 7)), InboxEvent::Updated(_)));
        assert!(matches!(inbox.accept(completed(older, 3)), InboxEvent::Stale(_)));
        assert_eq!(inbox.route(&"w".into()).unwrap(), &newer);
    }

    #[test]
    fn cancelled_wires_are_discarded() {
        let scene = Arc::new(scene());
        let request = scene.request(&"w".into()).unwrap();
        let (dispatcher, _results) = RouteDispatcher::new(router(1)).unwrap();
        dispatcher.cancel(&"w".into());
        assert!(matches!(
            dispatcher.submit(request.clone(), Arc::clone(&scene)),
            Err(DispatchError::Cancelled(_))
        ));
        dispatcher.resume(&"w".into());
        assert!(dispatcher.submit(request.clone(), scene).is_ok());

        let mut inbox = RouteInbox::new();
        let route = Router::default().route(&request, None, None);
        inbox.accept(completed(route.clone(), 1));
        assert!(inbox.cancel(&"w".into()).is_some());
        assert!(matches!(inbox.accept(completed(route, 2)), InboxEvent::Discarded(_)));
        assert!(inbox.route(&"w".into()).is_none());
    }

    #[test]
    fn failures_fall_back_then_keep_last_known() {
        let scene = Arc::new(scene());
        let (dispatcher, results) = RouteDispatcher::new(router(1)).unwrap();
        let broken = RouteRequest::new(
            "w",
            Endpoint::free(Point::new(f64::INFINITY, 0.0)),
            Endpoint::free(Point::new(10.0, 0.0)),
        );
        let mut inbox = RouteInbox::new();

        dispatcher.submit(broken.clone(), Arc::clone(&scene)).unwrap();
        let outcome = results.recv_timeout(WAIT).unwrap();
        assert!(matches!(outcome, RouteOutcome::Failed { .. }));
        assert!(matches!(inbox.accept(outcome), InboxEvent::FellBack(_)));
        assert_eq!(inbox.route(&"w".into()).unwrap().points.len(), 2);

        let good = scene.request(&"w".into()).unwrap();
        dispatcher.submit(good, Arc::clone(&scene)).unwrap();
        let outcome = results.recv_timeout(WAIT).unwrap();
        assert!(matches!(inbox.accept(outcome), InboxEvent::Updated(_)));
        let routed = inbox.route(&"w".into()).unwrap().clone();

        dispatcher.submit(broken, scene).unwrap();
        let outcome = results.recv_timeout(WAIT).unwrap();
        assert!(matches!(inbox.accept(outcome), InboxEvent::KeptLastKnown(_)));
        assert_eq!(inbox.route(&"w".into()).unwrap(), &routed);
        assert_eq!(dispatcher.stats().failed, 2);
    }

    /// Scene wrapper that can hold a worker until the test lets it go, or panic.
    struct Gated {
        scene: Scene,
        gate: Mutex<Option<Receiver<()>>>,
        explode: bool,
    }

    impl Gated {
        fn open(scene: Scene) -> Self {
            Self {
                scene,
                gate: Mutex::new(None),
                explode: false,
            }
        }
    }

    impl ObstacleProvider for Gated {
        fn rects_near(&self, query: Rect) -> Vec<Obstacle> {
            if self.explode {
                panic!("boom");
            }
            if let Some(gate) = lock(&self.gate).take() {
                let _ = gate.recv_timeout(WAIT);
            }
            self.scene.rects_near(query)
        }
    }

    impl SiblingWireProvider for Gated {
        fn segments_of_other_wires(&self, excluding: &WireId) -> Vec<WireSegment> {
            self.scene.segments_of_other_wires(excluding)
        }

        fn fan_out(&self, pin: &PinId, excluding: &WireId) -> Vec<FanOutEntry> {
            self.scene.fan_out(pin, excluding)
        }
    }

    #[test]
    fn queued_requests_for_a_wire_are_coalesced() {
        let mut base = scene();
        base.add_pin(Pin::free("x", Point::new(500.0, 500.0))).unwrap();
        base.add_wire(WireSpec::new("slow", "a.out", "x")).unwrap();
        let (release, gate) = mpsc::channel();
        let blocked = Arc::new(Gated {
            gate: Mutex::new(Some(gate)),
            ..Gated::open(base.clone())
        });
        let open = Arc::new(Gated::open(base.clone()));

        let (dispatcher, results) = RouteDispatcher::new(router(1)).unwrap();
        dispatcher.submit(base.request(&"slow".into()).unwrap(), blocked).unwrap();
        let request = base.request(&"w".into()).unwrap();
        let mut last = None;
        for _ in 0..3 {
            last = Some(dispatcher.submit(request.clone(), Arc::clone(&open)).unwrap());
        }
        release.send(()).unwrap();

        let first = results.recv_timeout(WAIT).unwrap();
        let second = results.recv_timeout(WAIT).unwrap();
        assert_eq!(first.ticket().wire, WireId::from("slow"));
        assert_eq!(Some(second.ticket().clone()), last);
        assert!(results.recv_timeout(Duration::from_millis(200)).is_err());
        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 4);
        assert_eq!(stats.superseded, 2);
        assert_eq!(stats.completed, 2);
    }

    #[test]
    fn worker_panics_become_failures() {
        let scene = scene();
        let request = scene.request(&"w".into()).unwrap();
        let exploding = Arc::new(Gated {
            explode: true,
            ..Gated::open(scene)
        });
        let (dispatcher, results) = RouteDispatcher::new(router(1)).unwrap();
        dispatcher.submit(request, exploding).unwrap();
        match results.recv_timeout(WAIT).unwrap() {
            RouteOutcome::Failed { message, .. } => assert!(message.contains("boom")),
            other => panic!("expected a failure, got {other:?}"),
        }
        assert_eq!(dispatcher.stats().failed, 1);
    }
}
