#![allow(clippy::uninlined_format_args)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use scopeview_core::coords::TIME;
use scopeview_core::Coords;
use scopeview_display::{DrawQueue, QueuePhase, Renderer, Result};

const WAIT: Duration = Duration::from_secs(10);

fn at(t: usize) -> Coords {
    Coords::new().with(TIME, t)
}

/// Records every pass; the first pass blocks until released.
struct GatedRenderer {
    seen: Arc<Mutex<Vec<Coords>>>,
    started: Sender<()>,
    gate: Option<Receiver<()>>,
}

impl Renderer for GatedRenderer {
    fn render(&mut self, coords: &Coords) -> Result<()> {
        let _ = self.started.send(());
        if let Some(gate) = self.gate.take() {
            let _ = gate.recv_timeout(WAIT);
        }
        self.seen.lock().unwrap().push(coords.clone());
        Ok(())
    }
}

struct Gated {
    queue: DrawQueue<GatedRenderer>,
    seen: Arc<Mutex<Vec<Coords>>>,
    started: Receiver<()>,
    release: Sender<()>,
}

fn gated_queue() -> Gated {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (started_tx, started) = channel();
    let (release, gate) = channel();
    let renderer_seen = Arc::clone(&seen);
    let queue = DrawQueue::spawn("gated-render", move |_| GatedRenderer {
        seen: renderer_seen,
        started: started_tx,
        gate: Some(gate),
    })
    .unwrap();
    Gated {
        queue,
        seen,
        started,
        release,
    }
}

#[test]
fn test_burst_during_pass_coalesces_to_latest() {
    let g = gated_queue();
    g.queue.enqueue(at(0));
    g.started.recv_timeout(WAIT).unwrap();

    g.queue.enqueue(at(1));
    g.queue.enqueue(at(2));
    g.queue.enqueue(at(3));
    assert_eq!(g.queue.phase(), QueuePhase::RenderPending);
    g.release.send(()).unwrap();

    assert!(g.queue.wait_idle(WAIT));
    assert_eq!(*g.seen.lock().unwrap(), vec![at(0), at(3)]);
    assert_eq!(g.queue.handle().coalesced(), 2);
    assert_eq!(g.queue.phase(), QueuePhase::Idle);
}

#[test]
fn test_halt_waits_for_in_flight_pass() {
    let g = gated_queue();
    g.queue.enqueue(at(0));
    g.started.recv_timeout(WAIT).unwrap();

    let release = g.release.clone();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        release.send(()).unwrap();
    });
    g.queue.halt();
    assert_eq!(g.seen.lock().unwrap().len(), 1);
    assert_eq!(g.queue.phase(), QueuePhase::Halted);
    releaser.join().unwrap();
}

#[test]
fn test_resume_draws_latest_request_once() {
    let g = gated_queue();
    g.release.send(()).unwrap();
    g.queue.enqueue(at(0));
    assert!(g.queue.wait_idle(WAIT));

    g.queue.halt();
    g.queue.halt();
    g.queue.enqueue(at(1));
    g.queue.enqueue(at(2));
    assert!(g.queue.wait_idle(WAIT));
    assert_eq!(g.seen.lock().unwrap().len(), 1);

    g.queue.resume();
    assert!(g.queue.wait_idle(WAIT));
    g.queue.resume();
    assert!(g.queue.wait_idle(WAIT));
    assert_eq!(*g.seen.lock().unwrap(), vec![at(0), at(2)]);
}

#[test]
fn test_passes_never_overlap() {
    struct Exclusive {
        active: Arc<AtomicBool>,
        overlapped: Arc<AtomicBool>,
        passes: Arc<AtomicUsize>,
        last: Arc<Mutex<Option<Coords>>>,
    }

    impl Renderer for Exclusive {
        fn render(&mut self, coords: &Coords) -> Result<()> {
            if self.active.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_micros(200));
            *self.last.lock().unwrap() = Some(coords.clone());
            self.passes.fetch_add(1, Ordering::SeqCst);
            self.active.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    let overlapped = Arc::new(AtomicBool::new(false));
    let passes = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(Mutex::new(None));
    let (o, p, l) = (Arc::clone(&overlapped), Arc::clone(&passes), Arc::clone(&last));
    let queue = DrawQueue::spawn("exclusive-render", move |_| Exclusive {
        active: Arc::new(AtomicBool::new(false)),
        overlapped: o,
        passes: p,
        last: l,
    })
    .unwrap();

    let producers: Vec<_> = (0..4)
        .map(|id| {
            let handle = queue.handle().clone();
            thread::spawn(move || {
                for t in 0..250 {
                    handle.enqueue(at(id * 1000 + t));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(queue.wait_idle(WAIT));
    assert!(!overlapped.load(Ordering::SeqCst));
    let total = passes.load(Ordering::SeqCst);
    assert!((1..=1000).contains(&total), "passes {}", total);
    assert_eq!(*last.lock().unwrap(), queue.handle().last_requested());
}
