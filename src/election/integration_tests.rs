#[cfg(test)]
mod integration_tests {
    use super::super::core::InstanceId;
    use super::super::error::ElectionError;
    use super::super::events::ElectionEventType;
    use super::super::simulation::{spawn_simulation, Simulation};
    use tokio::time::{sleep, timeout, Duration, Instant};
    use tracing::info;

    /// Polls until `observer` believes `expected` is leader, or times out
    async fn wait_for_leader(
        simulation: &Simulation,
        observer: InstanceId,
        expected: InstanceId,
        wait: Duration,
    ) -> bool {
        let start = Instant::now();
        while start.elapsed() < wait {
            if simulation.current_leader(observer) == Ok(expected) {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }
        false
    }

    /// Polls until every id in `observers` believes `expected` is leader
    async fn wait_for_convergence(
        simulation: &Simulation,
        observers: &[InstanceId],
        expected: InstanceId,
        wait: Duration,
    ) -> bool {
        for &observer in observers {
            if !wait_for_leader(simulation, observer, expected, wait).await {
                return false;
            }
        }
        true
    }

    #[tokio::test]
    async fn test_bootstrap_leader_is_smallest_id() {
        let _ = tracing_subscriber::fmt().try_init();

        let simulation = spawn_simulation(&[2, 5, 9]).await;

        // No election needed at t=0: everyone follows the smallest id
        for id in [2, 5, 9] {
            assert_eq!(simulation.current_leader(id), Ok(2));
        }

        simulation.shutdown();
    }

    #[tokio::test]
    async fn test_election_converges_on_highest_id() {
        let _ = tracing_subscriber::fmt().try_init();
        info!("🧪 Starting convergence test with 5 instances");

        let simulation = spawn_simulation(&[1, 2, 3, 4, 5]).await;

        simulation.trigger_election(1).unwrap();

        assert!(
            wait_for_convergence(&simulation, &[1, 2, 3, 4, 5], 5, Duration::from_secs(3)).await,
            "all live instances should converge on leader 5"
        );

        simulation.shutdown();
    }

    #[tokio::test]
    async fn test_crash_then_reelect() {
        let _ = tracing_subscriber::fmt().try_init();
        info!("🧪 Starting crash-then-reelect test");

        let simulation = spawn_simulation(&[1, 2, 3, 4, 5]).await;

        // Establish leader 5 first
        simulation.trigger_election(1).unwrap();
        assert!(wait_for_convergence(&simulation, &[1, 2, 3, 4, 5], 5, Duration::from_secs(3)).await);

        // Kill the leader; 4 detects the failure through its heartbeat
        // probe, finds no live candidate above itself and takes over
        simulation.set_alive(5, false).unwrap();
        simulation.trigger_heartbeat(4).unwrap();

        assert!(
            wait_for_convergence(&simulation, &[1, 2, 3, 4], 4, Duration::from_secs(3)).await,
            "surviving instances should converge on leader 4"
        );

        simulation.shutdown();
    }

    #[tokio::test]
    async fn test_convergence_among_partial_live_set() {
        let _ = tracing_subscriber::fmt().try_init();

        let simulation = spawn_simulation(&[1, 2, 3, 4, 5]).await;

        // With 4 and 5 down, the maximum live id is 3
        simulation.set_alive(4, false).unwrap();
        simulation.set_alive(5, false).unwrap();
        simulation.trigger_election(2).unwrap();

        assert!(
            wait_for_convergence(&simulation, &[1, 2, 3], 3, Duration::from_secs(3)).await,
            "live instances should converge on the maximum live id"
        );

        simulation.shutdown();
    }

    #[tokio::test]
    async fn test_recovery_does_not_preempt() {
        let _ = tracing_subscriber::fmt().try_init();
        info!("🧪 Starting recovery-without-preemption test");

        let simulation = spawn_simulation(&[1, 2, 3, 4, 5]).await;

        simulation.trigger_election(1).unwrap();
        assert!(wait_for_convergence(&simulation, &[1, 2, 3, 4, 5], 5, Duration::from_secs(3)).await);

        simulation.set_alive(5, false).unwrap();
        simulation.trigger_heartbeat(4).unwrap();
        assert!(wait_for_convergence(&simulation, &[1, 2, 3, 4], 4, Duration::from_secs(3)).await);

        // Reviving 5 must not demote 4: the revived instance rejoins with
        // its stale beliefs and nobody contends until explicitly triggered
        simulation.set_alive(5, true).unwrap();
        sleep(Duration::from_millis(800)).await;
        for id in [1, 2, 3, 4] {
            assert_eq!(simulation.current_leader(id), Ok(4));
        }

        // An explicit re-trigger involving 5 hands leadership back to it
        simulation.trigger_election(3).unwrap();
        assert!(
            wait_for_convergence(&simulation, &[1, 2, 3, 4, 5], 5, Duration::from_secs(3)).await,
            "re-triggered election should reach the revived maximum id"
        );

        simulation.shutdown();
    }

    #[tokio::test]
    async fn test_single_winner_per_election_round() {
        let _ = tracing_subscriber::fmt().try_init();

        let simulation = spawn_simulation(&[1, 2, 3, 4, 5]).await;
        let mut events = simulation.events();

        // The bootstrap leader is alive, so no spontaneous elections compete
        // with the triggered round
        simulation.trigger_election(2).unwrap();
        assert!(wait_for_convergence(&simulation, &[1, 2, 3, 4, 5], 5, Duration::from_secs(3)).await);

        // Drain the event stream for a settling window and count victories
        let mut winners = Vec::new();
        let deadline = Instant::now() + Duration::from_millis(600);
        while let Ok(Ok(event)) = timeout(deadline - Instant::now(), events.recv()).await {
            if let ElectionEventType::LeaderElected { leader_id } = event.event_type {
                winners.push(leader_id);
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        assert_eq!(winners, vec![5], "exactly one instance should win");

        simulation.shutdown();
    }

    #[tokio::test]
    async fn test_no_live_instance_is_reported() {
        let _ = tracing_subscriber::fmt().try_init();

        let simulation = spawn_simulation(&[1, 2, 3]).await;
        for id in [1, 2, 3] {
            simulation.set_alive(id, false).unwrap();
        }

        // Candidate search reports the structural failure instead of
        // crashing or inventing an id; only the driver can recover this
        assert_eq!(
            simulation.router().find_next_instance(1),
            Err(ElectionError::NoLiveInstance)
        );

        simulation.shutdown();
    }

    #[tokio::test]
    async fn test_duplicate_leader_broadcast_is_idempotent() {
        let _ = tracing_subscriber::fmt().try_init();

        let simulation = spawn_simulation(&[1, 2, 3]).await;

        simulation.router().send_leader_message(3, 3);
        assert!(wait_for_convergence(&simulation, &[1, 2], 3, Duration::from_secs(2)).await);

        simulation.router().send_leader_message(3, 3);
        sleep(Duration::from_millis(300)).await;
        for id in [1, 2] {
            assert_eq!(simulation.current_leader(id), Ok(3));
        }

        simulation.shutdown();
    }

    #[tokio::test]
    async fn test_crashed_instance_ignores_broadcasts() {
        let _ = tracing_subscriber::fmt().try_init();

        let simulation = spawn_simulation(&[1, 2, 3]).await;

        simulation.set_alive(2, false).unwrap();
        simulation.router().send_leader_message(3, 3);

        assert!(wait_for_leader(&simulation, 1, 3, Duration::from_secs(2)).await);
        // The crashed instance never saw the announcement
        assert_eq!(simulation.current_leader(2), Ok(1));

        simulation.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_instance_driver_calls() {
        let _ = tracing_subscriber::fmt().try_init();

        let simulation = spawn_simulation(&[1, 2]).await;

        assert_eq!(
            simulation.set_alive(9, false),
            Err(ElectionError::UnknownInstance(9))
        );
        assert_eq!(
            simulation.trigger_heartbeat(9),
            Err(ElectionError::UnknownInstance(9))
        );
        assert_eq!(
            simulation.trigger_election(9),
            Err(ElectionError::UnknownInstance(9))
        );
        assert_eq!(
            simulation.current_leader(9),
            Err(ElectionError::UnknownInstance(9))
        );

        simulation.shutdown();
    }
}
