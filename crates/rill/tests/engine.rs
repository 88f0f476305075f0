//! End-to-end tests driving the full runtime: pools, scopes, timers,
//! relays, and bridges working together.
//!
//! Timing-sensitive tests assert relative ordering only, never absolute
//! durations, and keep wide margins between the windows involved.

use parking_lot::Mutex;
use rill::stream::{StreamExt, iter};
use rill::{
    BLOCKING_IO, BroadcastRelay, Emitter, Error, FailurePolicy, Runtime, TaskState,
    bridge_callback,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Routes engine logs to the test harness, filtered by `RUST_LOG`.
/// Repeated calls are fine; only the first registration wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn runtime() -> Runtime {
    init_tracing();
    Runtime::new()
}

#[test]
fn block_on_runs_a_pipeline_to_completion() {
    let rt = runtime();
    let out = rt.block_on(|_cx| async move { Ok(iter([1, 2, 3]).map(|x| x * x).collect().await) });
    assert_eq!(out, Ok(vec![1, 4, 9]));
}

#[test]
fn block_on_surfaces_the_root_error() {
    let rt = runtime();
    let out: Result<(), Error> = rt.block_on(|_cx| async move { Err(Error::upstream("root")) });
    assert_eq!(out, Err(Error::upstream("root")));
}

#[test]
fn spawned_task_delivers_its_value() {
    let rt = runtime();
    let out = rt.block_on(|cx| async move {
        let handle = cx.spawn(|_cx| async move { Ok(21 * 2) });
        handle.await
    });
    assert_eq!(out, Ok(42));
}

#[test]
fn completed_state_is_sticky() {
    let rt = runtime();
    let out = rt.block_on(|cx| async move {
        let mut handle = cx.spawn(|_cx| async move { Ok(7) });
        let value = (&mut handle).await?;
        assert_eq!(handle.state(), TaskState::Completed);
        // Cancelling a finished task changes nothing.
        handle.cancel();
        assert_eq!(handle.state(), TaskState::Completed);
        assert!(!handle.is_cancelled());
        Ok(value)
    });
    assert_eq!(out, Ok(7));
}

#[test]
fn cancelling_a_task_resolves_it_cancelled() {
    let rt = runtime();
    let out = rt.block_on(|cx| async move {
        let mut handle = cx.spawn(|cx| async move {
            cx.sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        handle.cancel();
        let result = (&mut handle).await;
        assert!(handle.is_cancelled());
        assert_eq!(handle.state(), TaskState::Cancelled);
        Ok(result.unwrap_err())
    });
    assert_eq!(out, Ok(Error::Cancelled));
}

#[test]
fn shorter_sleep_finishes_first() {
    let rt = runtime();
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = order.clone();
    rt.block_on(move |cx| async move {
        let slow = cx.spawn({
            let order = order.clone();
            move |cx| async move {
                cx.sleep(Duration::from_millis(150)).await;
                order.lock().push("slow");
                Ok(())
            }
        });
        let fast = cx.spawn({
            let order = order.clone();
            move |cx| async move {
                cx.sleep(Duration::from_millis(20)).await;
                order.lock().push("fast");
                Ok(())
            }
        });
        fast.await?;
        slow.await
    })
    .unwrap();
    assert_eq!(*seen.lock(), vec!["fast", "slow"]);
}

#[test]
fn fail_fast_scope_cancels_the_siblings() {
    let rt = runtime();
    rt.block_on(|cx| async move {
        let scope = cx.scope(FailurePolicy::FailFast);
        let sleeper = scope.spawn(|cx| async move {
            cx.sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let failer = scope.spawn(|_cx| async move {
            Err::<(), _>(Error::upstream("first failure wins"))
        });
        assert_eq!(failer.await, Err(Error::upstream("first failure wins")));
        assert_eq!(sleeper.await, Err(Error::Cancelled));
        assert!(scope.is_cancelled());
        scope.join().await;
        Ok(())
    })
    .unwrap();
}

#[test]
fn isolate_scope_contains_the_failure() {
    let rt = runtime();
    let failures: Arc<Mutex<Vec<Error>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = failures.clone();
    rt.block_on(move |cx| async move {
        let scope = cx.scope(FailurePolicy::Isolate);
        scope.on_failure(move |_id, error| failures.lock().push(error));
        let failer = scope.spawn(|_cx| async move { Err::<(), _>(Error::upstream("isolated")) });
        let survivor = scope.spawn(|cx| async move {
            cx.sleep(Duration::from_millis(30)).await;
            Ok(42)
        });
        assert_eq!(failer.await, Err(Error::upstream("isolated")));
        assert_eq!(survivor.await, Ok(42));
        assert!(!scope.is_cancelled());
        scope.join().await;
        Ok(())
    })
    .unwrap();
    assert_eq!(*seen.lock(), vec![Error::upstream("isolated")]);
}

#[test]
fn panics_surface_as_upstream_failures() {
    let rt = runtime();
    rt.block_on(|cx| async move {
        let scope = cx.scope(FailurePolicy::Isolate);
        let handle = scope.spawn(move |_cx| async move {
            assert_eq!(1 + 1, 3, "kaboom");
            Ok(())
        });
        let result = handle.await;
        match result {
            Err(Error::Upstream { message }) => assert!(message.contains("kaboom")),
            other => panic!("expected upstream failure, got {other:?}"),
        }
        scope.join().await;
        Ok(())
    })
    .unwrap();
}

#[test]
fn cancelling_a_scope_cascades_to_every_descendant() {
    let rt = runtime();
    rt.block_on(|cx| async move {
        let scope = cx.scope(FailurePolicy::Isolate);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|cx| async move {
                    cx.sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
            })
            .collect();
        scope.cancel();
        assert!(scope.is_cancelled());
        for handle in handles {
            assert_eq!(handle.await, Err(Error::Cancelled));
        }
        scope.join().await;
        // Cancellation is a stable observation.
        assert!(scope.is_cancelled());
        Ok(())
    })
    .unwrap();
}

#[test]
fn cancelled_scope_rejects_new_work() {
    let rt = runtime();
    rt.block_on(|cx| async move {
        let scope = cx.scope(FailurePolicy::FailFast);
        scope.cancel();
        let handle = scope.spawn(|_cx| async move { Ok(5) });
        assert!(handle.id().is_none());
        assert_eq!(handle.state(), TaskState::Cancelled);
        assert_eq!(handle.await, Err(Error::Cancelled));
        Ok(())
    })
    .unwrap();
}

#[test]
fn timeout_cuts_off_a_slow_future() {
    let rt = runtime();
    let out = rt.block_on(|cx| async move {
        let slow = cx.clone();
        cx.timeout(Duration::from_millis(20), async move {
            slow.sleep(Duration::from_secs(60)).await;
            Ok(1)
        })
        .await
    });
    assert!(matches!(out, Err(Error::Timeout { .. })));
}

#[test]
fn timeout_passes_a_fast_future_through() {
    let rt = runtime();
    let out = rt.block_on(|cx| async move {
        let fast = cx.clone();
        cx.timeout(Duration::from_secs(60), async move {
            fast.sleep(Duration::from_millis(10)).await;
            Ok(9)
        })
        .await
    });
    assert_eq!(out, Ok(9));
}

#[test]
fn on_pool_moves_the_section_and_comes_back() {
    let rt = runtime();
    rt.block_on(|cx| async move {
        let handle = cx.spawn(|cx| async move {
            let here = || std::thread::current().name().unwrap_or("").to_owned();
            assert!(here().contains("compute"), "started on {}", here());
            let inner = cx
                .on_pool(BLOCKING_IO, async move {
                    let name = here();
                    assert!(name.contains("blocking-io"), "section ran on {name}");
                    5
                })
                .await;
            assert!(here().contains("compute"), "resumed on {}", here());
            Ok(inner)
        });
        assert_eq!(handle.await, Ok(5));
        Ok(())
    })
    .unwrap();
}

#[test]
fn abandoned_lane_section_hands_the_task_back() {
    let rt = runtime();
    rt.block_on(|cx| async move {
        let handle = cx.spawn(|cx| async move {
            let here = || std::thread::current().name().unwrap_or("").to_owned();
            assert!(here().contains("compute"), "started on {}", here());
            let slow = cx.clone();
            let section = cx.on_pool(BLOCKING_IO, async move {
                slow.sleep(Duration::from_secs(60)).await;
                Ok(())
            });
            let out = cx.timeout(Duration::from_millis(30), section).await;
            assert!(matches!(out, Err(Error::Timeout { .. })));
            // The losing section was dropped mid-flight; after the next
            // suspension point the task must be back on its own lane.
            cx.sleep(Duration::from_millis(10)).await;
            assert!(here().contains("compute"), "resumed on {}", here());
            Ok(())
        });
        handle.await
    })
    .unwrap();
}

#[test]
fn custom_lane_gets_its_own_workers() {
    init_tracing();
    let rt = Runtime::builder().pool("render", 2).build();
    rt.block_on(|cx| async move {
        let scope = cx.scope(FailurePolicy::FailFast);
        let handle = scope.spawn_on("render", |_cx| async move {
            let name = std::thread::current().name().unwrap_or("").to_owned();
            assert!(name.contains("render"), "ran on {name}");
            Ok(())
        });
        let result = handle.await;
        scope.join().await;
        result
    })
    .unwrap();
}

#[test]
fn relay_feeds_a_consumer_across_tasks() {
    let rt = runtime();
    let out = rt.block_on(|cx| async move {
        let relay = BroadcastRelay::new(0);
        let view = relay.attach();
        let producer = cx.spawn(move |cx| async move {
            for v in 1..=3 {
                relay.emit(v);
                cx.sleep(Duration::from_millis(5)).await;
            }
            Ok(())
        });
        let seen = view.collect().await;
        producer.await?;
        Ok(seen)
    });
    assert_eq!(out, Ok(vec![1, 2, 3]));
}

#[test]
fn debounce_emits_after_quiet_windows() {
    let rt = runtime();
    let out = rt.block_on(|cx| async move {
        let relay = BroadcastRelay::new(0);
        let view = relay.attach();
        let producer = cx.spawn(move |cx| async move {
            relay.emit(1);
            cx.sleep(Duration::from_millis(20)).await;
            relay.emit(2);
            cx.sleep(Duration::from_millis(200)).await;
            relay.emit(3);
            Ok(())
        });
        let seen = view
            .debounce(Duration::from_millis(60), &cx.timer())
            .collect()
            .await;
        producer.await?;
        Ok(seen)
    });
    // 1 is superseded inside its window; 2 survives a quiet window; 3 is
    // flushed when the producer hangs up.
    assert_eq!(out, Ok(vec![2, 3]));
}

#[test]
fn cancelled_consumer_still_unregisters_the_bridge() {
    let rt = runtime();
    let unregistered = Arc::new(AtomicUsize::new(0));
    let count = unregistered.clone();
    rt.block_on(move |cx| async move {
        let registered = Arc::new(AtomicUsize::new(0));
        let saw_register = registered.clone();
        let consumer = cx.spawn(move |_cx| async move {
            // A source that registers but never emits: the collect below
            // can only end through cancellation.
            let stream = bridge_callback(
                move |_emitter: Emitter<i32>| {
                    registered.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    unregistered.fetch_add(1, Ordering::SeqCst);
                },
            );
            let _values = stream.collect().await;
            Ok(())
        });
        // Give the consumer a chance to poll (and register) first.
        cx.sleep(Duration::from_millis(50)).await;
        assert_eq!(saw_register.load(Ordering::SeqCst), 1);
        consumer.cancel();
        assert_eq!(consumer.await, Err(Error::Cancelled));
        Ok(())
    })
    .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
