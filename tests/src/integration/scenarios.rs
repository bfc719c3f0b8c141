//! # Shutdown Scenarios
//!
//! End-to-end protocol runs: guest tokens go in on a channel, replies are
//! read back off the same channel.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lifecycle_core::testing::ScriptedProcessRegistry;
    use lifecycle_core::{
        AdminReply, AdminRequest, Command, HandlerStatus, LifecycleApi, LifecycleConfig,
        PeerRegistry, Role, ShutdownPhase, ShutdownPolicy,
    };

    use crate::integration::harness::{Bench, ADMIN_CLIENT};

    const ALLOWED: &str = "/dev/ttyS1";

    fn service_vm_config() -> LifecycleConfig {
        LifecycleConfig::new(Role::ServiceVm)
            .with_allowed_s5_device(ALLOWED)
            .with_shutdown(ShutdownPolicy {
                timeout: Duration::from_secs(30),
                poll_interval: Duration::from_secs(5),
            })
    }

    fn three_guests(processes: ScriptedProcessRegistry) -> Bench {
        Bench::service_vm(
            service_vm_config(),
            &[("vm1", ALLOWED), ("vm2", "/dev/ttyS2"), ("vm3", "/dev/ttyS3")],
            processes,
        )
    }

    async fn sync_all(bench: &mut Bench) {
        for peer in 0..bench.peers.len() {
            assert_eq!(bench.peer_says(peer, Command::Sync).await, HandlerStatus::Handled);
        }
    }

    // =========================================================================
    // Scenario 1: SYNC handshake
    // =========================================================================

    #[tokio::test]
    async fn test_sync_is_acknowledged_on_the_same_channel() {
        let mut bench = three_guests(ScriptedProcessRegistry::default());

        let status = bench.peer_says(1, Command::Sync).await;

        assert_eq!(status, HandlerStatus::Handled);
        assert_eq!(bench.received(1), vec!["ACK_SYNC"]);
        assert!(bench.received(0).is_empty());
        assert_eq!(bench.registry.connected().len(), 1);
    }

    // =========================================================================
    // Scenario 2: admin host shutdown with three guests
    // =========================================================================

    #[tokio::test]
    async fn test_host_shutdown_drains_connection_set_then_runs_once() {
        let mut bench = three_guests(ScriptedProcessRegistry::countdown(0));
        sync_all(&mut bench).await;

        let status = bench.admin_says(AdminRequest::SystemShutdown).await;

        assert_eq!(status, HandlerStatus::Handled);
        assert_eq!(
            bench.admin.replies(),
            vec![(ADMIN_CLIENT, AdminReply::AckReqSysShutdown)]
        );
        let budget = bench.service.config().retry.broadcast;
        for peer in 0..3 {
            assert_eq!(bench.received(peer), vec!["ACK_SYNC", "POWEROFF_CMD"]);
            assert!(bench
                .timer
                .started()
                .contains(&(bench.conn(peer), Command::PoweroffCmd, budget)));
        }

        bench.peer_says(0, Command::AckPoweroff).await;
        assert_eq!(bench.registry.connected().len(), 2);
        bench.peer_says(2, Command::AckPoweroff).await;
        assert_eq!(bench.registry.connected().len(), 1);
        assert_eq!(bench.service.shutdown_phase(), ShutdownPhase::Running);

        // vm2 never answers; its timer runs out.
        bench.ack_times_out(1).await;

        assert!(bench.registry.is_empty());
        assert_eq!(bench.service.shutdown_phase(), ShutdownPhase::Complete);
        assert_eq!(bench.admin.close_count(), 1);
        assert_eq!(bench.processes.queries(), 1);
        assert!(!bench.registry.is_listening());
    }

    // =========================================================================
    // Scenario 3: unauthorized shutdown request
    // =========================================================================

    #[tokio::test]
    async fn test_unauthorized_guest_cannot_power_off_host() {
        let mut bench = three_guests(ScriptedProcessRegistry::default());
        sync_all(&mut bench).await;

        let status = bench.peer_says(2, Command::ReqSysShutdown).await;

        assert_eq!(status, HandlerStatus::Unauthorized);
        for peer in 0..3 {
            assert_eq!(bench.received(peer), vec!["ACK_SYNC"]);
        }
        assert!(bench.timer.started().is_empty());
        assert_eq!(bench.registry.connected().len(), 3);
    }

    #[tokio::test]
    async fn test_authorized_guest_triggers_broadcast() {
        let mut bench = three_guests(ScriptedProcessRegistry::default());
        sync_all(&mut bench).await;

        let status = bench.peer_says(0, Command::ReqSysShutdown).await;

        assert_eq!(status, HandlerStatus::Handled);
        assert_eq!(
            bench.received(0),
            vec!["ACK_SYNC", "ACK_REQ_SYS_SHUTDOWN", "POWEROFF_CMD"]
        );
        assert_eq!(bench.received(2), vec!["ACK_SYNC", "POWEROFF_CMD"]);
    }

    // =========================================================================
    // Scenario 4: targeted shutdown of a guest that is not connected
    // =========================================================================

    #[tokio::test]
    async fn test_shutdown_of_silent_guest_reports_disconnect() {
        let mut bench = three_guests(ScriptedProcessRegistry::default());
        // vm2 and vm3 join; vm1's channel is open but it never spoke.
        bench.peer_says(1, Command::Sync).await;
        bench.peer_says(2, Command::Sync).await;

        let status = bench
            .admin_says(AdminRequest::UserVmShutdown {
                vm_name: "vm1".to_string(),
            })
            .await;

        assert_eq!(status, HandlerStatus::Handled);
        assert_eq!(
            bench.admin.replies(),
            vec![(ADMIN_CLIENT, AdminReply::UserVmDisconnect)]
        );
        assert!(bench.received(0).is_empty());
        assert_eq!(bench.received(1), vec!["ACK_SYNC"]);
        assert!(bench.timer.started().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_of_connected_guest_is_forwarded() {
        let mut bench = three_guests(ScriptedProcessRegistry::default());
        sync_all(&mut bench).await;

        bench
            .admin_says(AdminRequest::UserVmShutdown {
                vm_name: "vm3".to_string(),
            })
            .await;
        bench.peer_says(2, Command::AckUserVmShutdown).await;

        assert_eq!(
            bench.admin.replies(),
            vec![(ADMIN_CLIENT, AdminReply::AckReqUserVmShutdown)]
        );
        assert_eq!(bench.received(2), vec!["ACK_SYNC", "USER_VM_SHUTDOWN"]);
        assert_eq!(bench.service.pending(bench.conn(2)), None);
        assert_eq!(bench.registry.connected().len(), 3);
    }

    // =========================================================================
    // Scenario 5: last ACK_POWEROFF runs the orchestrator
    // =========================================================================

    #[tokio::test]
    async fn test_last_ack_waits_for_device_models_then_completes() {
        let mut bench = Bench::service_vm(
            service_vm_config(),
            &[("vm1", ALLOWED)],
            ScriptedProcessRegistry::countdown(3),
        );
        bench.peer_says(0, Command::ReqSysShutdown).await;
        let pauses_before = bench.pacer.pauses().len();

        bench.peer_says(0, Command::AckPoweroff).await;

        assert_eq!(bench.service.shutdown_phase(), ShutdownPhase::Complete);
        assert_eq!(bench.admin.close_count(), 1);
        // 3, 2, 1, 0
        assert_eq!(bench.processes.queries(), 4);
        let poll_pauses: Vec<_> = bench.pacer.pauses()[pauses_before + 1..].to_vec();
        assert_eq!(poll_pauses, vec![Duration::from_secs(5); 3]);
        assert!(poll_pauses.iter().sum::<Duration>() <= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_stuck_device_model_still_completes_within_timeout() {
        let mut bench = Bench::service_vm(
            service_vm_config(),
            &[("vm1", ALLOWED)],
            ScriptedProcessRegistry::stuck(1),
        );
        bench.peer_says(0, Command::ReqSysShutdown).await;
        let pauses_before = bench.pacer.pauses().len();

        bench.peer_says(0, Command::AckPoweroff).await;

        assert_eq!(bench.service.shutdown_phase(), ShutdownPhase::Complete);
        let poll_total: Duration = bench.pacer.pauses()[pauses_before + 1..].iter().sum();
        assert!(poll_total <= Duration::from_secs(30));
        assert_eq!(bench.processes.queries(), 7);
    }

    // =========================================================================
    // User VM
    // =========================================================================

    #[tokio::test]
    async fn test_user_vm_announces_and_obeys_poweroff() {
        let mut bench = Bench::user_vm(LifecycleConfig::new(Role::UserVm), "/dev/ttyS1");
        assert_eq!(bench.role(), Role::UserVm);

        assert_eq!(bench.announce(), HandlerStatus::Handled);
        bench.peer_says(0, Command::AckSync).await;
        let status = bench.peer_says(0, Command::PoweroffCmd).await;

        assert_eq!(status, HandlerStatus::Handled);
        assert_eq!(bench.received(0), vec!["SYNC", "ACK_POWEROFF"]);
        assert!(bench.registry.is_empty());
        assert_eq!(bench.admin.close_count(), 1);
        assert!(bench.service.is_shutdown_complete());
    }

    #[tokio::test]
    async fn test_user_vm_forwards_admin_shutdown_upstream() {
        let mut bench = Bench::user_vm(LifecycleConfig::new(Role::UserVm), "/dev/ttyS1");

        bench.admin_says(AdminRequest::SystemShutdown).await;
        bench.peer_says(0, Command::AckReqSysShutdown).await;

        assert_eq!(bench.received(0), vec!["REQ_SYS_SHUTDOWN"]);
        assert_eq!(
            bench.admin.replies(),
            vec![(ADMIN_CLIENT, AdminReply::AckReqSysShutdown)]
        );
        assert_eq!(bench.service.pending(bench.conn(0)), None);
    }
}
