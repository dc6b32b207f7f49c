use pool_cycle::{
    open, run_once, Backend, BackendKind, Error, FixedPool, Harness, MockSource, PoolConfig,
    SourceRegistry, WorkloadParams,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const BACKENDS: [BackendKind; 2] = [BackendKind::Fixed, BackendKind::R2d2];

fn no_work() -> WorkloadParams {
    WorkloadParams {
        pre_work: 0,
        post_work: 0,
        yield_thread: false,
        sleep_us: 0,
    }
}

#[test]
fn thousand_sequential_trials_leave_no_leases() {
    for backend in BACKENDS {
        let harness = Harness::setup(&PoolConfig::new(backend, 1), no_work()).unwrap();
        for _ in 0..1_000 {
            harness.cycle().unwrap();
        }
        assert_eq!(harness.leased(), 0, "{backend}: leases outstanding");
        harness.teardown();
    }
}

#[test]
fn concurrent_trials_observe_the_full_sleep() {
    for backend in BACKENDS {
        let params = WorkloadParams {
            sleep_us: 500,
            ..no_work()
        };
        let harness = Arc::new(Harness::setup(&PoolConfig::new(backend, 8), params).unwrap());
        let handles = (0..2)
            .map(|_| {
                let harness = Arc::clone(&harness);
                thread::spawn(move || {
                    let start = Instant::now();
                    harness.cycle().unwrap();
                    start.elapsed()
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            let elapsed = handle.join().unwrap();
            assert!(elapsed >= Duration::from_micros(500), "trial took {elapsed:?}");
        }
        assert_eq!(harness.leased(), 0);
        if let Ok(harness) = Arc::try_unwrap(harness) {
            harness.teardown();
        }
    }
}

#[test]
fn contended_acquire_blocks_until_release() {
    for backend in BACKENDS {
        let config = PoolConfig::new(backend, 1);
        let pool: Arc<dyn Backend> =
            Arc::from(open(&config, Arc::new(MockSource::new())).unwrap());

        let first = pool.acquire().unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let conn = pool.acquire().unwrap();
                pool.release(conn).unwrap();
            })
        };
        thread::sleep(Duration::from_millis(50));
        pool.release(first).unwrap();
        waiter.join().unwrap();

        assert_eq!(pool.leased(), 0);
        pool.close().unwrap();
    }
}

#[test]
fn contended_acquire_times_out_as_pool_exhausted() {
    for backend in BACKENDS {
        let config =
            PoolConfig::new(backend, 1).acquire_timeout(Duration::from_millis(100));
        let pool = open(&config, Arc::new(MockSource::new())).unwrap();

        let held = pool.acquire().unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, Error::PoolExhausted), "{backend}: got {err}");

        pool.release(held).unwrap();
        pool.close().unwrap();
    }
}

#[test]
fn double_release_is_invalid() {
    for backend in BACKENDS {
        let config = PoolConfig::new(backend, 2);
        let pool = open(&config, Arc::new(MockSource::new())).unwrap();

        let conn = pool.acquire().unwrap();
        let stale = conn.clone();
        pool.release(conn).unwrap();
        let err = pool.release(stale).unwrap_err();
        assert!(matches!(err, Error::InvalidRelease), "{backend}: got {err}");

        pool.close().unwrap();
    }
}

#[test]
fn acquire_after_close_fails() {
    for backend in BACKENDS {
        let pool = open(&PoolConfig::new(backend, 1), Arc::new(MockSource::new())).unwrap();
        pool.close().unwrap();
        // Closing again is a no-op.
        pool.close().unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, Error::PoolClosed), "{backend}: got {err}");
    }
}

#[test]
fn registering_twice_leaves_one_effective_entry() {
    let registry = SourceRegistry::new();
    registry.register("mock", Arc::new(MockSource::new()));
    registry.register("mock", Arc::new(MockSource::new()));
    assert_eq!(registry.len(), 1);

    let err = registry
        .try_register("mock", Arc::new(MockSource::new()))
        .unwrap_err();
    assert!(matches!(err, Error::Registration(_)));
}

#[test]
fn deregistering_an_absent_source_does_not_raise() {
    let registry = SourceRegistry::new();
    registry.deregister("mock");
    assert!(registry.is_empty());

    registry.register("mock", Arc::new(MockSource::new()));
    registry.deregister("mock");
    registry.deregister("mock");
    assert!(registry.is_empty());
}

#[test]
fn mock_source_accepts_anything_and_hands_out_open_connections() {
    use pool_cycle::ConnectionSource;

    let source = MockSource::new();
    assert!(source.accepts("mock://bench"));
    assert!(source.accepts("anything at all"));

    let a = source.connect("mock://bench").unwrap();
    let b = source.connect("ignored").unwrap();
    assert!(a.is_open());
    assert_ne!(a, b);
}

#[test]
fn connection_close_is_idempotent() {
    use pool_cycle::ConnectionSource;

    let source = MockSource::new();
    let mut conn = source.connect("mock://bench").unwrap();
    conn.close();
    conn.close();
    assert!(!conn.is_open());
}

#[test]
fn fixed_pool_counts_cycles_only_when_metrics_are_enabled() {
    let config = PoolConfig::new(BackendKind::Fixed, 2).metrics_enabled(true);
    let pool = FixedPool::open(&config, Arc::new(MockSource::new())).unwrap();
    for _ in 0..3 {
        let conn = pool.acquire().unwrap();
        pool.release(conn).unwrap();
    }
    let metrics = pool.metrics().unwrap();
    assert_eq!(metrics.acquires, 3);
    assert_eq!(metrics.releases, 3);
    pool.close().unwrap();

    let silent = PoolConfig::new(BackendKind::Fixed, 2);
    let pool = FixedPool::open(&silent, Arc::new(MockSource::new())).unwrap();
    assert!(pool.metrics().is_none());
    pool.close().unwrap();
}

#[test]
fn run_once_cycles_a_single_connection() {
    for backend in BACKENDS {
        let conn = run_once(backend).unwrap();
        assert!(conn.is_open());
    }
}
