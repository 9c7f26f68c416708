use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sentinel_core::{CircuitBreakerConfig, CircuitState, OrchestratorConfig, TaskStatus};
use sentinel_dispatcher::{Orchestrator, TaskDefinition};
use sentinel_testing_utils::{CallCounter, FixedCpuSampler};
use tokio::time::sleep;

fn orchestrator(cpu: &FixedCpuSampler) -> Orchestrator {
    Orchestrator::with_cpu_sampler(OrchestratorConfig::default(), Arc::new(cpu.clone()))
}

fn always_failing(counter: &CallCounter) -> TaskDefinition {
    let counter = counter.clone();
    TaskDefinition::new("always-fails", "Always fails", "@every 60s", move || {
        counter.hit();
        async { Err(anyhow::anyhow!("upstream unavailable")) }
    })
    .with_circuit_breaker(CircuitBreakerConfig::new(3, Duration::from_secs(300)))
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_after_threshold_and_grants_trial_after_recovery() {
    let cpu = FixedCpuSampler::new(10.0);
    let orchestrator = orchestrator(&cpu);
    let counter = CallCounter::new();
    orchestrator.register(always_failing(&counter)).unwrap();

    // firings at 60s, 120s, 180s fail; 240s is skipped
    sleep(Duration::from_secs(250)).await;
    assert_eq!(counter.count(), 3);
    let snapshot = orchestrator.snapshot("always-fails").await.unwrap();
    assert_eq!(snapshot.breaker.state, CircuitState::Open);
    assert_eq!(snapshot.skips, 1);
    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert_eq!(snapshot.last_skip_reason.as_deref(), Some("circuit breaker open"));

    // the window is measured from the last failure at 180s, so 480s is still
    // inside it and 540s is the half-open trial
    sleep(Duration::from_secs(240)).await;
    assert_eq!(counter.count(), 3);

    sleep(Duration::from_secs(100)).await;
    assert_eq!(counter.count(), 4);
    let snapshot = orchestrator.snapshot("always-fails").await.unwrap();
    assert_eq!(snapshot.breaker.state, CircuitState::Open);
    assert_eq!(snapshot.breaker.failure_count, 4);
    assert_eq!(snapshot.skips, 5);

    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_successful_trial_closes_breaker() {
    let cpu = FixedCpuSampler::new(10.0);
    let orchestrator = orchestrator(&cpu);
    let counter = CallCounter::new();
    let calls = counter.clone();
    let task = TaskDefinition::new("recovers", "Recovers", "@every 60s", move || {
        let n = calls.hit();
        async move {
            if n <= 3 {
                anyhow::bail!("failure {n}");
            }
            Ok(())
        }
    })
    .with_circuit_breaker(CircuitBreakerConfig::new(3, Duration::from_secs(300)));
    orchestrator.register(task).unwrap();

    sleep(Duration::from_secs(550)).await;
    assert_eq!(counter.count(), 4);

    let snapshot = orchestrator.snapshot("recovers").await.unwrap();
    assert_eq!(snapshot.breaker.state, CircuitState::Closed);
    assert_eq!(snapshot.breaker.failure_count, 2);
    assert_eq!(snapshot.status, TaskStatus::Ready);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(counter.count(), 5);
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_high_cpu_skips_scheduled_firing() {
    let cpu = FixedCpuSampler::new(85.0);
    let orchestrator = orchestrator(&cpu);
    let counter = CallCounter::new();
    let calls = counter.clone();
    orchestrator
        .register(TaskDefinition::new("busy", "Busy", "@every 30s", move || {
            calls.hit();
            async { Ok(()) }
        }))
        .unwrap();

    sleep(Duration::from_secs(35)).await;
    assert_eq!(counter.count(), 0);
    let snapshot = orchestrator.snapshot("busy").await.unwrap();
    assert_eq!(snapshot.skips, 1);
    assert_eq!(snapshot.breaker.state, CircuitState::Closed);
    assert_eq!(snapshot.breaker.total_calls, 0);
    assert_eq!(
        snapshot.last_skip_reason.as_deref(),
        Some("high CPU usage: 85.0% > 70.0%")
    );

    // skipped work is not retried early; it runs at the next natural firing
    cpu.set(20.0);
    sleep(Duration::from_secs(20)).await;
    assert_eq!(counter.count(), 0);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(counter.count(), 1);
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_firings_of_slow_task_are_not_serialized() {
    let cpu = FixedCpuSampler::new(0.0);
    let orchestrator = orchestrator(&cpu);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let (current, peak) = (in_flight.clone(), max_in_flight.clone());
    orchestrator
        .register(TaskDefinition::new("slow", "Slow", "@every 1s", move || {
            let (current, peak) = (current.clone(), peak.clone());
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_secs(3)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }))
        .unwrap();

    sleep(Duration::from_millis(5500)).await;
    assert!(max_in_flight.load(Ordering::SeqCst) >= 2);
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_in_flight_body_finish_and_stops_timers() {
    let cpu = FixedCpuSampler::new(0.0);
    let orchestrator = orchestrator(&cpu);
    let started = CallCounter::new();
    let finished = CallCounter::new();

    let (s, f) = (started.clone(), finished.clone());
    orchestrator
        .register(TaskDefinition::new("long", "Long", "@every 10s", move || {
            let (s, f) = (s.clone(), f.clone());
            async move {
                s.hit();
                sleep(Duration::from_secs(5)).await;
                f.hit();
                Ok(())
            }
        }))
        .unwrap();

    sleep(Duration::from_secs(12)).await;
    assert_eq!(started.count(), 1);
    orchestrator.shutdown();

    sleep(Duration::from_secs(60)).await;
    assert_eq!(started.count(), 1);
    assert_eq!(finished.count(), 1);
    assert_eq!(orchestrator.task_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unregister_cancels_timer() {
    let cpu = FixedCpuSampler::new(0.0);
    let orchestrator = orchestrator(&cpu);
    let counter = CallCounter::new();
    let calls = counter.clone();
    orchestrator
        .register(TaskDefinition::new("short-lived", "Short lived", "@every 5s", move || {
            calls.hit();
            async { Ok(()) }
        }))
        .unwrap();

    sleep(Duration::from_secs(11)).await;
    assert_eq!(counter.count(), 2);
    assert!(orchestrator.unregister("short-lived"));

    sleep(Duration::from_secs(30)).await;
    assert_eq!(counter.count(), 2);
    assert_eq!(orchestrator.status("short-lived"), None);
}
