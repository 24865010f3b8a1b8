use crate::session::Session;
use reelmark_core::{MilestoneTable, PositionUpdate};

/// What a single position update asks the classifier to report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressReport {
    /// Attribute dimensions should be forwarded now (one-shot per session).
    pub attributes_due: bool,
    /// Position for the elapsed-time metric, when the periodic tick fired.
    pub elapsed_tick: Option<f64>,
    /// Milestone events crossed by this update, in table order.
    pub milestones: Vec<String>,
}

/// Progress bookkeeping run on every content position update.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    step: f64,
    milestones: MilestoneTable,
    report_attributes: bool,
}

impl ProgressTracker {
    pub fn new(step: f64, milestones: MilestoneTable, report_attributes: bool) -> Self {
        Self {
            step,
            milestones,
            report_attributes,
        }
    }

    pub fn milestones(&self) -> &MilestoneTable {
        &self.milestones
    }

    pub fn advance(&self, session: &mut Session, update: &PositionUpdate) -> ProgressReport {
        let mut report = ProgressReport::default();

        session.refresh_duration(update.total_stream_duration);

        if self.report_attributes && !session.custom_dimensions_reported {
            session.custom_dimensions_reported = true;
            report.attributes_due = true;
        }

        let position = update.stream_position;
        session.playhead = Some(position);

        if position > session.last_reported_progress {
            report.elapsed_tick = Some(position);
            if (position - session.last_reported_progress).abs() >= self.step {
                session.last_reported_progress = position;
            }
            // Unconditional: the watermark ends one step past the snap point.
            session.last_reported_progress += self.step;
        }

        let Some(progress) = session.progress_at(position) else {
            return report;
        };

        for milestone in &self.milestones {
            let fraction = milestone.fraction;
            let last = session.last_reported_milestone;
            if progress > fraction && fraction != last && fraction > last {
                report.milestones.push(milestone.event.clone());
                session.last_reported_milestone = fraction;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(5.0, MilestoneTable::default(), false)
    }

    fn at(position: f64, total: f64) -> PositionUpdate {
        PositionUpdate {
            stream_position: position,
            total_stream_duration: total,
        }
    }

    #[test]
    fn milestones_fire_once_in_order() {
        let tracker = tracker();
        let mut session = Session::new();

        let fired: Vec<String> = [10.0, 30.0, 30.5, 60.0, 80.0, 99.0]
            .into_iter()
            .flat_map(|pos| tracker.advance(&mut session, &at(pos, 100.0)).milestones)
            .collect();

        assert_eq!(
            fired,
            [
                "playProgressStarted",
                "playProgressQuarter",
                "playProgressHalf",
                "playProgressThreeQuarters",
                "playProgressEnd"
            ]
        );
        assert_eq!(session.last_reported_milestone(), 0.97);
    }

    #[test]
    fn jump_fires_every_crossed_milestone() {
        let tracker = tracker();
        let mut session = Session::new();

        let report = tracker.advance(&mut session, &at(60.0, 100.0));

        assert_eq!(
            report.milestones,
            ["playProgressStarted", "playProgressQuarter", "playProgressHalf"]
        );
    }

    #[test]
    fn seeking_back_never_refires() {
        let tracker = tracker();
        let mut session = Session::new();
        tracker.advance(&mut session, &at(55.0, 100.0));

        assert!(tracker.advance(&mut session, &at(5.0, 100.0)).milestones.is_empty());
        assert!(tracker.advance(&mut session, &at(30.0, 100.0)).milestones.is_empty());
        assert_eq!(
            tracker.advance(&mut session, &at(76.0, 100.0)).milestones,
            ["playProgressThreeQuarters"]
        );
    }

    #[test]
    fn exact_fraction_does_not_fire() {
        let tracker = tracker();
        let mut session = Session::new();
        assert!(tracker.advance(&mut session, &at(1.0, 100.0)).milestones.is_empty());
        assert_eq!(
            tracker.advance(&mut session, &at(26.0, 100.0)).milestones,
            ["playProgressStarted", "playProgressQuarter"]
        );
    }

    #[test]
    fn unknown_duration_skips_milestones_but_ticks() {
        let tracker = tracker();
        let mut session = Session::new();

        let report = tracker.advance(&mut session, &at(12.0, 0.0));

        assert!(report.milestones.is_empty());
        assert_eq!(report.elapsed_tick, Some(12.0));
        assert_eq!(session.duration(), None);
        assert_eq!(session.playhead(), Some(12.0));
    }

    #[test]
    fn zero_total_keeps_previous_duration() {
        let tracker = tracker();
        let mut session = Session::new();
        tracker.advance(&mut session, &at(10.0, 200.0));
        tracker.advance(&mut session, &at(20.0, 0.0));
        assert_eq!(session.duration(), Some(200.0));
    }

    // The watermark compounds: a snap to the position is followed by another
    // step, so it always sits one step ahead of the last tick.
    #[test]
    fn watermark_runs_one_step_ahead() {
        let tracker = tracker();
        let mut session = Session::new();

        let first = tracker.advance(&mut session, &at(1.0, 100.0));
        assert_eq!(first.elapsed_tick, Some(1.0));
        assert_eq!(session.last_reported_progress(), 5.0);

        let below = tracker.advance(&mut session, &at(4.0, 100.0));
        assert_eq!(below.elapsed_tick, None);
        assert_eq!(session.last_reported_progress(), 5.0);

        let small_step = tracker.advance(&mut session, &at(6.0, 100.0));
        assert_eq!(small_step.elapsed_tick, Some(6.0));
        assert_eq!(session.last_reported_progress(), 10.0);

        let big_jump = tracker.advance(&mut session, &at(42.0, 100.0));
        assert_eq!(big_jump.elapsed_tick, Some(42.0));
        assert_eq!(session.last_reported_progress(), 47.0);
    }

    #[test]
    fn watermark_does_not_move_back_on_seek() {
        let tracker = tracker();
        let mut session = Session::new();
        tracker.advance(&mut session, &at(50.0, 100.0));
        let report = tracker.advance(&mut session, &at(10.0, 100.0));
        assert_eq!(report.elapsed_tick, None);
        assert_eq!(session.last_reported_progress(), 55.0);
    }

    #[test]
    fn attributes_are_due_once() {
        let tracker = ProgressTracker::new(5.0, MilestoneTable::default(), true);
        let mut session = Session::new();

        assert!(tracker.advance(&mut session, &at(1.0, 100.0)).attributes_due);
        assert!(!tracker.advance(&mut session, &at(9.0, 100.0)).attributes_due);
        assert!(!tracker.advance(&mut session, &at(20.0, 100.0)).attributes_due);
        assert!(session.custom_dimensions_reported());
    }
}
