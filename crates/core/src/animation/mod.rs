//! Rotation animator for the previewed object.
//!
//! Three drivers compete for the two rotation angles: the user's drag, the
//! eased return to the home orientation, and the idle attract loop. They are
//! modelled as variants of [`AnimationMode`] and every change of mode goes
//! through [`RotationAnimator::apply`], which also owns the single timer slot.
//! Entering a mode re-arms (or cancels) that slot, so two drivers can never
//! tick at once.

use tokio::time::Instant;
use tracing::debug;

use crate::{config::AnimationConfig, easing::ease_out_cubic, timeline::TimerSlot};

/// Orientation offsets applied to the displayed object.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationState {
    pub x_angle: f32,
    pub y_angle: f32,
}

impl RotationState {
    pub const HOME: Self = Self {
        x_angle: 0.0,
        y_angle: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationMode {
    Idle,
    Dragging,
    ReturningHome {
        start_x: f32,
        start_y: f32,
        step: u32,
        total_steps: u32,
    },
    Attracting {
        step: u32,
        total_steps: u32,
    },
}

impl AnimationMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Idle => ModeKind::Idle,
            Self::Dragging => ModeKind::Dragging,
            Self::ReturningHome { .. } => ModeKind::ReturningHome,
            Self::Attracting { .. } => ModeKind::Attracting,
        }
    }
}

/// Payload-free view of [`AnimationMode`] for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeKind {
    #[default]
    Idle,
    Dragging,
    ReturningHome,
    Attracting,
}

/// Everything that can move the animator from one mode to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimatorInput {
    DragBegan,
    /// Pointer translation accumulated since the drag began.
    DragMoved { dx: f32, dy: f32 },
    DragEnded,
    TimerElapsed,
}

#[derive(Debug, Clone)]
pub struct RotationAnimator {
    config: AnimationConfig,
    rotation: RotationState,
    mode: AnimationMode,
    timer: TimerSlot,
}

impl RotationAnimator {
    /// Creates an idle animator whose attract delay starts counting at `now`.
    pub fn new(config: AnimationConfig, now: Instant) -> Self {
        let mut timer = TimerSlot::new();
        timer.arm_once(now, config.idle_delay());
        Self {
            config,
            rotation: RotationState::HOME,
            mode: AnimationMode::Idle,
            timer,
        }
    }

    pub fn rotation(&self) -> RotationState {
        self.rotation
    }

    pub fn mode(&self) -> AnimationMode {
        self.mode
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn begin_drag(&mut self, now: Instant) -> bool {
        self.apply(AnimatorInput::DragBegan, now)
    }

    pub fn drag_to(&mut self, dx: f32, dy: f32, now: Instant) -> bool {
        self.apply(AnimatorInput::DragMoved { dx, dy }, now)
    }

    pub fn end_drag(&mut self, now: Instant) -> bool {
        self.apply(AnimatorInput::DragEnded, now)
    }

    /// Runs the armed timer if its deadline has passed. Returns whether the
    /// rotation changed.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        if !self.timer.take_due(now) {
            return false;
        }
        self.apply(AnimatorInput::TimerElapsed, now)
    }

    /// Cancels any pending timer. Used on viewer teardown.
    pub fn halt(&mut self) {
        self.timer.cancel();
    }

    /// The transition function. Returns whether the rotation changed.
    pub fn apply(&mut self, input: AnimatorInput, now: Instant) -> bool {
        let before = self.rotation;
        let previous = self.mode.kind();

        match (self.mode, input) {
            (AnimationMode::Dragging, AnimatorInput::DragBegan) => {}
            (_, AnimatorInput::DragBegan) => self.enter_dragging(),
            (_, AnimatorInput::DragMoved { dx, dy }) => {
                if !dx.is_finite() || !dy.is_finite() {
                    return false;
                }
                if self.mode != AnimationMode::Dragging {
                    self.enter_dragging();
                }
                let k = self.config.drag_sensitivity;
                self.rotation = RotationState {
                    x_angle: dy / k,
                    y_angle: dx / k,
                };
            }
            (AnimationMode::Dragging, AnimatorInput::DragEnded) => {
                self.mode = AnimationMode::ReturningHome {
                    start_x: self.rotation.x_angle,
                    start_y: self.rotation.y_angle,
                    step: 0,
                    total_steps: self.config.return_steps,
                };
                self.timer.arm_periodic(now, self.config.return_period());
            }
            (_, AnimatorInput::DragEnded) => {}
            (AnimationMode::Idle, AnimatorInput::TimerElapsed) => {
                self.rotation.x_angle = 0.0;
                self.mode = AnimationMode::Attracting {
                    step: 0,
                    total_steps: self.config.attract_steps,
                };
                self.timer.arm_periodic(now, self.config.attract_period());
            }
            (
                AnimationMode::ReturningHome {
                    start_x,
                    start_y,
                    step,
                    total_steps,
                },
                AnimatorInput::TimerElapsed,
            ) => {
                let step = step + 1;
                if step >= total_steps {
                    self.rotation = RotationState::HOME;
                    self.mode = AnimationMode::Idle;
                    self.timer.arm_once(now, self.config.idle_delay());
                } else {
                    let remaining = 1.0 - ease_out_cubic(step as f32 / total_steps as f32);
                    self.rotation = RotationState {
                        x_angle: start_x * remaining,
                        y_angle: start_y * remaining,
                    };
                    self.mode = AnimationMode::ReturningHome {
                        start_x,
                        start_y,
                        step,
                        total_steps,
                    };
                }
            }
            (AnimationMode::Attracting { step, total_steps }, AnimatorInput::TimerElapsed) => {
                let step = step + 1;
                let (y_angle, step) = if step >= total_steps {
                    (0.0, 0)
                } else {
                    let progress = step as f32 / total_steps as f32;
                    (attract_offset(progress, self.config.attract_amplitude), step)
                };
                self.rotation = RotationState {
                    x_angle: 0.0,
                    y_angle,
                };
                self.mode = AnimationMode::Attracting { step, total_steps };
            }
            // Entering Dragging cancels the slot, so this only sees a stale tick.
            (AnimationMode::Dragging, AnimatorInput::TimerElapsed) => {}
        }

        let current = self.mode.kind();
        if current != previous {
            debug!(from = ?previous, to = ?current, "rotation mode changed");
        }
        self.rotation != before
    }

    fn enter_dragging(&mut self) {
        self.timer.cancel();
        self.mode = AnimationMode::Dragging;
    }
}

/// Triangular oscillation in four equal quarters:
/// `0 -> +amplitude -> 0 -> -amplitude -> 0` as `progress` runs over `[0, 1]`.
pub fn attract_offset(progress: f32, amplitude: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    let offset = if p < 0.25 {
        amplitude * (p * 4.0)
    } else if p < 0.5 {
        amplitude - amplitude * ((p - 0.25) * 4.0)
    } else if p < 0.75 {
        -amplitude * ((p - 0.5) * 4.0)
    } else {
        amplitude * ((p - 0.75) * 4.0) - amplitude
    };
    offset.clamp(-amplitude, amplitude)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn animator() -> (RotationAnimator, Instant) {
        let now = Instant::now();
        (RotationAnimator::new(AnimationConfig::default(), now), now)
    }

    /// Fires the armed timer at its own deadline, returning the new "now".
    fn tick(animator: &mut RotationAnimator) -> Instant {
        let deadline = animator.next_deadline().expect("a timer should be armed");
        animator.fire_due(deadline);
        deadline
    }

    fn drag_and_release(animator: &mut RotationAnimator, now: Instant, dx: f32, dy: f32) {
        animator.begin_drag(now);
        animator.drag_to(dx, dy, now);
        animator.end_drag(now);
    }

    #[test]
    fn starts_idle_and_begins_attracting_after_the_idle_delay() {
        let (mut animator, start) = animator();
        assert_eq!(animator.mode(), AnimationMode::Idle);
        assert_eq!(animator.next_deadline(), Some(start + Duration::from_secs(4)));

        assert!(!animator.fire_due(start + Duration::from_millis(3_999)));
        tick(&mut animator);

        assert_eq!(
            animator.mode(),
            AnimationMode::Attracting {
                step: 0,
                total_steps: 576
            }
        );
        assert!(animator.timer_armed());
    }

    #[test]
    fn drag_sets_angles_from_translation() {
        let (mut animator, now) = animator();
        animator.begin_drag(now);
        assert!(animator.drag_to(50.0, -120.0, now));

        assert_eq!(animator.mode(), AnimationMode::Dragging);
        assert_eq!(animator.rotation().x_angle, -120.0 / 200.0);
        assert_eq!(animator.rotation().y_angle, 50.0 / 200.0);
        assert!(!animator.timer_armed());
    }

    #[test]
    fn drag_end_without_begin_is_ignored() {
        let (mut animator, now) = animator();
        animator.end_drag(now);

        assert_eq!(animator.mode(), AnimationMode::Idle);
        assert_eq!(animator.next_deadline(), Some(now + Duration::from_secs(4)));
    }

    #[test]
    fn non_finite_translation_is_dropped() {
        let (mut animator, now) = animator();
        animator.begin_drag(now);
        animator.drag_to(20.0, 20.0, now);

        assert!(!animator.drag_to(f32::NAN, 1.0, now));
        assert_eq!(animator.rotation().y_angle, 0.1);
    }

    #[test]
    fn return_home_eases_monotonically_and_lands_on_zero() {
        let (mut animator, now) = animator();
        drag_and_release(&mut animator, now, 180.0, -90.0);

        let mut previous = animator.rotation();
        for step in 1..=60 {
            assert!(matches!(animator.mode(), AnimationMode::ReturningHome { .. }));
            tick(&mut animator);
            let current = animator.rotation();
            assert!(current.x_angle.abs() <= previous.x_angle.abs(), "x grew at {step}");
            assert!(current.y_angle.abs() <= previous.y_angle.abs(), "y grew at {step}");
            previous = current;
        }

        assert_eq!(animator.rotation(), RotationState::HOME);
        assert_eq!(animator.mode(), AnimationMode::Idle);
    }

    #[test]
    fn return_home_uses_cubic_ease_out() {
        let (mut animator, now) = animator();
        drag_and_release(&mut animator, now, 200.0, 0.0);

        for _ in 0..30 {
            tick(&mut animator);
        }

        let expected = 1.0 - ease_out_cubic(0.5);
        assert!((animator.rotation().y_angle - expected).abs() < 1e-6);
    }

    #[test]
    fn attract_follows_idle_delay_after_returning_home() {
        let (mut animator, now) = animator();
        drag_and_release(&mut animator, now, 40.0, 40.0);
        for _ in 0..60 {
            tick(&mut animator);
        }
        let settled = animator.next_deadline().unwrap();

        let attract_start = tick(&mut animator);
        assert_eq!(attract_start, settled);
        assert!(matches!(animator.mode(), AnimationMode::Attracting { .. }));
    }

    #[test]
    fn attract_cycle_stays_in_range_and_returns_to_zero() {
        let (mut animator, _) = animator();
        tick(&mut animator);

        let mut peak: f32 = 0.0;
        let mut trough: f32 = 0.0;
        for _ in 0..576 {
            tick(&mut animator);
            let rotation = animator.rotation();
            assert_eq!(rotation.x_angle, 0.0);
            assert!((-0.25..=0.25).contains(&rotation.y_angle));
            peak = peak.max(rotation.y_angle);
            trough = trough.min(rotation.y_angle);
        }

        assert_eq!(animator.rotation().y_angle, 0.0);
        assert_eq!(peak, 0.25);
        assert_eq!(trough, -0.25);
        assert_eq!(
            animator.mode(),
            AnimationMode::Attracting {
                step: 0,
                total_steps: 576
            }
        );
    }

    #[test]
    fn drag_preempts_attract_mid_cycle() {
        let (mut animator, _) = animator();
        let mut now = tick(&mut animator);
        for _ in 0..300 {
            now = tick(&mut animator);
        }
        assert_eq!(
            animator.mode(),
            AnimationMode::Attracting {
                step: 300,
                total_steps: 576
            }
        );
        let frozen = animator.rotation();

        animator.begin_drag(now);

        assert_eq!(animator.mode(), AnimationMode::Dragging);
        assert!(!animator.timer_armed());
        assert!(!animator.fire_due(now + Duration::from_secs(60)));
        assert_eq!(animator.rotation(), frozen);
    }

    #[test]
    fn drag_during_return_home_cancels_the_return() {
        let (mut animator, now) = animator();
        drag_and_release(&mut animator, now, 100.0, 100.0);
        tick(&mut animator);

        animator.drag_to(10.0, 0.0, now);

        assert_eq!(animator.mode(), AnimationMode::Dragging);
        assert!(!animator.timer_armed());
        assert_eq!(animator.rotation().y_angle, 0.05);
    }

    #[test]
    fn attract_offset_has_four_equal_quarters() {
        assert_eq!(attract_offset(0.0, 0.25), 0.0);
        assert_eq!(attract_offset(0.25, 0.25), 0.25);
        assert_eq!(attract_offset(0.5, 0.25), 0.0);
        assert_eq!(attract_offset(0.75, 0.25), -0.25);
        assert_eq!(attract_offset(1.0, 0.25), 0.0);
    }
}
