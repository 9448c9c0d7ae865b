//! Recovery pipeline behavior against fake transports and channels

use crate::common::{TestChannel, TestTransport, ValidSessionProvider};
use cueline::{
    AuthEvent, AuthMonitor, ChannelKind, CircuitBreakerConfig, ConnectionState, HealthConfig,
    PipelineOutcome, RealtimeConfig, RealtimeEvent, ReconnectionCoordinator,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> RealtimeConfig {
    RealtimeConfig {
        cooldown_ms: 0,
        auth_wait_ms: 50,
        auth_poll_ms: 5,
        transport_settle_ms: 1,
        registration_poll_ms: 5,
        registration_wait_ms: 30,
        reconnect_stagger_ms: 1,
        stabilization_ms: 1,
        wake_settle_ms: 1,
        stuck_offline_ms: 50,
        error_cooldown_ms: 5_000,
        max_cycle_failures: 15,
        max_transport_failures: 3,
        transport_failure_reset_ms: 300_000,
        transport_backoff_base_ms: 1,
        transport_backoff_max_ms: 4,
        health: HealthConfig {
            debounce_ms: 0,
            startup_grace_ms: 0,
        },
        breaker: CircuitBreakerConfig {
            failure_threshold: 3,
            open_ms: 60_000,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
        },
    }
}

async fn signed_in_coordinator(transport: Arc<TestTransport>) -> ReconnectionCoordinator {
    let auth = AuthMonitor::with_settle_delay(Arc::new(ValidSessionProvider), 0);
    auth.handle_event(AuthEvent::TokenRefreshed).await;
    ReconnectionCoordinator::new(transport, auth, fast_config())
}

fn register_all(coordinator: &ReconnectionCoordinator) -> Vec<Arc<TestChannel>> {
    ChannelKind::RECONNECT_ORDER
        .into_iter()
        .map(|kind| {
            let channel = TestChannel::new();
            coordinator.register_channel(kind, channel.clone());
            channel
        })
        .collect()
}

#[tokio::test]
async fn full_recovery_after_forced_websocket_drop() {
    let transport = TestTransport::new(false);
    let coordinator = signed_in_coordinator(transport.clone()).await;
    let channels = register_all(&coordinator);
    let mut events = coordinator.subscribe_events();

    let outcome = coordinator.run_pipeline().await;
    assert_eq!(outcome, PipelineOutcome::Completed);
    assert_eq!(transport.reconnects.load(Ordering::SeqCst), 1);
    for channel in &channels {
        assert_eq!(channel.resubscribes.load(Ordering::SeqCst), 1);
    }

    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, RealtimeEvent::ReconnectionComplete) {
            completed = true;
        }
    }
    assert!(completed, "completion broadcast lets paused subsystems resume");
}

#[tokio::test]
async fn only_one_pipeline_runs_at_a_time() {
    let transport = TestTransport::new(true);
    let auth = AuthMonitor::with_settle_delay(Arc::new(ValidSessionProvider), 0);
    auth.handle_event(AuthEvent::TokenRefreshed).await;
    let mut config = fast_config();
    config.transport_settle_ms = 60;
    let coordinator = ReconnectionCoordinator::new(transport, auth, config);
    register_all(&coordinator);

    let running = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run_pipeline().await })
    };
    tokio::time::sleep(Duration::from_millis(15)).await;

    // Every overlapping invocation is refused
    for _ in 0..3 {
        assert_eq!(
            coordinator.run_pipeline().await,
            PipelineOutcome::SkippedAlreadyRunning
        );
    }
    assert_eq!(running.await.unwrap(), PipelineOutcome::Completed);
}

#[tokio::test]
async fn no_degraded_report_without_a_real_failure() {
    let transport = TestTransport::new(true);
    let coordinator = signed_in_coordinator(transport).await;
    register_all(&coordinator);

    assert_eq!(coordinator.run_pipeline().await, PipelineOutcome::Completed);
    let state = coordinator.connection_state();
    assert_eq!(*state.borrow(), ConnectionState::Connected);

    // Idle time passes; the state must not flap
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*state.borrow(), ConnectionState::Connected);

    // A real failure does degrade, synchronously with the error report
    coordinator.handle_channel_error(ChannelKind::Consolidated);
    assert_eq!(*coordinator.connection_state().borrow(), ConnectionState::Degraded);
}

#[tokio::test]
async fn wake_from_sleep_probes_before_reconnecting() {
    let transport = TestTransport::new(true);
    let coordinator = signed_in_coordinator(transport.clone()).await;
    register_all(&coordinator);

    coordinator.handle_network_online();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(
        transport.reconnects.load(Ordering::SeqCst),
        0,
        "an alive transport means the event was a network blip"
    );

    transport.alive.store(false, Ordering::SeqCst);
    coordinator.handle_network_online();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.reconnects.load(Ordering::SeqCst), 1);
    assert!(coordinator.health().all_connected());
}

#[tokio::test]
async fn sign_out_gates_the_pipeline() {
    let transport = TestTransport::new(false);
    let auth = AuthMonitor::with_settle_delay(Arc::new(ValidSessionProvider), 0);
    auth.handle_event(AuthEvent::TokenRefreshed).await;
    let coordinator = ReconnectionCoordinator::new(transport.clone(), auth.clone(), fast_config());
    coordinator.attach_to_auth();
    register_all(&coordinator);

    auth.handle_event(AuthEvent::SignedOut).await;
    assert_eq!(
        coordinator.run_pipeline().await,
        PipelineOutcome::SkippedStopped
    );
    assert_eq!(transport.reconnects.load(Ordering::SeqCst), 0);

    // Signing back in re-enables and triggers recovery
    auth.handle_event(AuthEvent::TokenRefreshed).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(transport.alive.load(Ordering::SeqCst));
}
