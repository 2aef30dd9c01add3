//! Tests for the deferred application queue.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::SyncConfig;
    use crate::deferred::{
        ApplyOutcome, DeferredQueue, ManualScheduler, MockSurface, PendingState, PositionsView,
    };
    use crate::portfolio::PositionRecord;

    fn queue() -> DeferredQueue<ManualScheduler> {
        DeferredQueue::new(&SyncConfig::default(), ManualScheduler::new())
    }

    fn view(securities: &[&str]) -> PositionsView {
        PositionsView {
            positions: securities
                .iter()
                .map(|uuid| PositionRecord {
                    security_uuid: uuid.to_string(),
                    ..PositionRecord::default()
                })
                .collect(),
            error: None,
        }
    }

    /// Fires every armed timer once. Returns how many applied.
    fn fire(queue: &mut DeferredQueue<ManualScheduler>, surface: &mut MockSurface) -> usize {
        let timers = queue.scheduler_mut().fire_all();
        let mut applied = 0;
        for timer in timers {
            if queue.on_timer(&timer.portfolio_uuid, timer.handle, surface) {
                applied += 1;
            }
        }
        applied
    }

    // ==================== Immediate application ====================

    #[test]
    fn test_ready_surface_applies_immediately() {
        let mut queue = queue();
        let mut surface = MockSurface::default();

        assert!(queue.submit("P1", view(&["S1"]), &mut surface));
        assert!(queue.is_empty());
        assert_eq!(queue.scheduler().armed_count(), 0);
        assert_eq!(surface.call_count("P1"), 1);
    }

    // ==================== Retry cycle ====================

    #[test]
    fn test_missing_surface_is_retried_after_delay() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        assert!(!queue.submit("P1", view(&["S1"]), &mut surface));
        assert!(queue.contains("P1"));

        let armed = queue.scheduler().armed();
        assert_eq!(armed.len(), 1);
        assert_eq!(armed[0].portfolio_uuid, "P1");
        assert_eq!(armed[0].delay, Duration::from_millis(500));

        surface.set_default(ApplyOutcome::Applied);
        assert_eq!(fire(&mut queue, &mut surface), 1);
        assert!(queue.is_empty());
        assert_eq!(surface.call_count("P1"), 2);
        assert_eq!(surface.last_view("P1").unwrap().positions[0].security_uuid, "S1");
    }

    #[test]
    fn test_retries_stop_after_ten_attempts() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P1", view(&["S1"]), &mut surface);

        let mut rounds = 0;
        while queue.scheduler().armed_count() > 0 {
            fire(&mut queue, &mut surface);
            rounds += 1;
            assert!(rounds <= 10, "retry budget exceeded");
        }

        assert_eq!(rounds, 10);
        assert_eq!(surface.call_count("P1"), 11);
        assert!(!queue.contains("P1"));
        assert_eq!(queue.scheduler().armed_count(), 0);
    }

    #[test]
    fn test_custom_retry_budget() {
        let config = SyncConfig {
            retry_delay_ms: 50,
            max_retry_attempts: 2,
        };
        let mut queue = DeferredQueue::new(&config, ManualScheduler::new());
        let mut surface = MockSurface::new(ApplyOutcome::Hidden);

        queue.submit("P1", view(&[]), &mut surface);
        assert_eq!(queue.scheduler().armed()[0].delay, Duration::from_millis(50));

        fire(&mut queue, &mut surface);
        fire(&mut queue, &mut surface);
        assert!(queue.is_empty());
        assert_eq!(surface.call_count("P1"), 3);
    }

    #[test]
    fn test_hidden_surface_is_retried() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Hidden);

        queue.submit("P1", view(&["S1"]), &mut surface);
        let pending = queue.pending("P1").unwrap();
        assert_eq!(pending.last_outcome, ApplyOutcome::Hidden);
        assert!(matches!(pending.state, PendingState::Scheduled(_)));

        fire(&mut queue, &mut surface);
        assert_eq!(queue.pending("P1").unwrap().attempts, 1);
    }

    #[test]
    fn test_one_timer_per_portfolio() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P1", view(&["S1"]), &mut surface);
        queue.submit("P1", view(&["S1", "S2"]), &mut surface);
        queue.submit("P2", view(&["S9"]), &mut surface);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.scheduler().armed_count(), 2);

        let pending = queue.pending("P1").unwrap();
        assert_eq!(pending.view.positions.len(), 2);
        assert_eq!(pending.attempts, 0);
    }

    #[test]
    fn test_newer_view_keeps_retry_budget() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P1", view(&["S1"]), &mut surface);
        fire(&mut queue, &mut surface);
        fire(&mut queue, &mut surface);
        queue.submit("P1", view(&["S2"]), &mut surface);

        let pending = queue.pending("P1").unwrap();
        assert_eq!(pending.attempts, 2);
        assert_eq!(pending.view.positions[0].security_uuid, "S2");
        assert_eq!(queue.scheduler().armed_count(), 1);
    }

    #[test]
    fn test_stale_tick_is_ignored() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P1", view(&["S1"]), &mut surface);
        let stale = queue.scheduler().armed()[0].handle;

        // Applied out of band, then queued again under a fresh timer
        surface.script([ApplyOutcome::Applied]);
        assert!(queue.try_apply("P1", &mut surface));
        queue.submit("P1", view(&["S2"]), &mut surface);

        let calls_before = surface.call_count("P1");
        assert!(!queue.on_timer("P1", stale, &mut surface));
        assert_eq!(surface.call_count("P1"), calls_before);
        assert_eq!(queue.pending("P1").unwrap().attempts, 0);
    }

    #[test]
    fn test_tick_without_entry_is_ignored() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P1", view(&["S1"]), &mut surface);
        let timer = queue.scheduler_mut().fire_all().remove(0);
        queue.clear();

        assert!(!queue.on_timer(&timer.portfolio_uuid, timer.handle, &mut surface));
        assert_eq!(surface.call_count("P1"), 1);
    }

    // ==================== Outcomes ====================

    #[test]
    fn test_applied_cancels_timer() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P1", view(&["S1"]), &mut surface);
        assert_eq!(queue.scheduler().armed_count(), 1);

        surface.set_default(ApplyOutcome::Applied);
        assert!(queue.try_apply("P1", &mut surface));
        assert!(queue.is_empty());
        assert_eq!(queue.scheduler().armed_count(), 0);
    }

    #[test]
    fn test_invalid_is_not_retried() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Invalid);

        assert!(!queue.submit("P1", view(&["S1"]), &mut surface));
        assert!(queue.is_empty());
        assert_eq!(queue.scheduler().armed_count(), 0);
    }

    #[test]
    fn test_invalid_on_retry_drops_entry() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P1", view(&["S1"]), &mut surface);
        surface.set_default(ApplyOutcome::Invalid);
        fire(&mut queue, &mut surface);

        assert!(queue.is_empty());
        assert_eq!(queue.scheduler().armed_count(), 0);
    }

    #[test]
    fn test_try_apply_without_entry_returns_false() {
        let mut queue = queue();
        let mut surface = MockSurface::default();

        assert!(!queue.try_apply("P1", &mut surface));
        assert!(surface.calls().is_empty());
    }

    // ==================== Flush ====================

    #[test]
    fn test_flush_all_does_not_consume_budget() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P2", view(&["S2"]), &mut surface);
        queue.submit("P1", view(&["S1"]), &mut surface);

        assert_eq!(queue.flush_all(&mut surface), 0);
        assert_eq!(queue.pending("P1").unwrap().attempts, 0);
        assert_eq!(queue.scheduler().armed_count(), 2);

        surface.set_outcome("P1", ApplyOutcome::Applied);
        assert_eq!(queue.flush_all(&mut surface), 1);
        assert!(!queue.contains("P1"));
        assert!(queue.contains("P2"));
        assert_eq!(queue.scheduler().armed_count(), 1);
    }

    #[test]
    fn test_flush_all_visits_portfolios_in_order() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P2", view(&[]), &mut surface);
        queue.submit("P1", view(&[]), &mut surface);
        surface.set_default(ApplyOutcome::Applied);
        assert_eq!(queue.flush_all(&mut surface), 2);

        let order: Vec<&str> = surface.calls()[2..]
            .iter()
            .map(|(uuid, _)| uuid.as_str())
            .collect();
        assert_eq!(order, vec!["P1", "P2"]);
    }

    #[test]
    fn test_clear_cancels_all_timers() {
        let mut queue = queue();
        let mut surface = MockSurface::new(ApplyOutcome::Missing);

        queue.submit("P1", view(&[]), &mut surface);
        queue.submit("P2", view(&[]), &mut surface);
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.scheduler().armed_count(), 0);
    }
}
