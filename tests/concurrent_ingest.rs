#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use aspect_monitor::metrics::{CounterAspect, WindowAggregator};

const PRODUCERS: usize = 8;
const PER_PRODUCER: usize = 5_000;

#[test]
fn every_sample_lands_in_the_window() {
    let agg = Arc::new(WindowAggregator::new("load"));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let agg = Arc::clone(&agg);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    agg.ingest("latency", (p * PER_PRODUCER + i) as f64);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let published = agg.flush();
    let series = &published["latency"];
    assert_eq!(series.count, PRODUCERS * PER_PRODUCER);
    assert_eq!(series.min, 0.0);
    assert_eq!(series.max, (PRODUCERS * PER_PRODUCER - 1) as f64);
}

#[test]
fn flushing_during_ingest_neither_loses_nor_duplicates() {
    let agg = Arc::new(WindowAggregator::new("load"));
    let done = Arc::new(AtomicBool::new(false));

    // flusher accumulates every window it closes
    let flusher = {
        let agg = Arc::clone(&agg);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut seen = 0usize;
            while !done.load(Ordering::Acquire) {
                seen += agg.flush().get("n").map_or(0, |s| s.count);
                thread::sleep(Duration::from_micros(50));
            }
            seen
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let agg = Arc::clone(&agg);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    agg.ingest("n", i as f64);
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let mut total = flusher.join().unwrap();
    total += agg.flush()["n"].count;
    assert_eq!(total, PRODUCERS * PER_PRODUCER);
}

#[test]
fn counter_under_concurrent_requests() {
    let counter = Arc::new(CounterAspect::new(Duration::from_secs(60)));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let path = if p % 2 == 0 { "/even" } else { "/odd" };
                for _ in 0..1_000 {
                    counter.record(path, 200);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let snap = counter.flush();
    assert_eq!(snap.request_sum_per_minute, (PRODUCERS * 1_000) as u64);
    assert_eq!(snap.requests_per_minute["/even"], (PRODUCERS / 2 * 1_000) as u64);
    assert_eq!(snap.requests_per_minute["/odd"], (PRODUCERS / 2 * 1_000) as u64);
    assert_eq!(snap.request_codes_per_minute[&200], (PRODUCERS * 1_000) as u64);
}
