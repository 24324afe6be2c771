//! # Navigation event loop
//!
//! Pose, goal and tick events arrive from independent sources. The loop in [`run`] receives all
//! of them over a single channel and handles them one at a time on the thread owning the
//! [`NavCtrl`], so no two handlers are ever interleaved.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use super::{NavCtrl, NavError, NavState};
use crate::{loc::PoseEstimate, map::WorldPoint, path::Path, traj_ctrl::VelocityCmd};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sends [`NavEvent::Tick`] at a fixed period from a background thread.
pub struct Ticker {
    stop: Arc<AtomicBool>,

    jh: Option<JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum NavEvent {
    Pose(PoseEstimate),
    Goal(WorldPoint),
    Tick,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavOutput {
    /// Velocity command, sent every tick
    Cmd(VelocityCmd),

    /// A newly planned path which is now being tracked
    Path(Path),

    /// The given goal has been reached
    GoalReached(WorldPoint),

    /// The last goal will not be reached
    PlanningFailed(NavError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Ticker {
    pub fn start(period: Duration, events: Sender<NavEvent>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let jh = thread::spawn(move || {
            while !thread_stop.load(Ordering::Relaxed) {
                let cycle_start = Instant::now();

                if events.send(NavEvent::Tick).is_err() {
                    debug!("Event receiver dropped, ticker exiting");
                    break;
                }

                let cycle_dur = cycle_start.elapsed();

                match period.checked_sub(cycle_dur) {
                    Some(d) => thread::sleep(d),
                    None => warn!(
                        "Tick overran by {:.06} s",
                        cycle_dur.as_secs_f64() - period.as_secs_f64()
                    ),
                }
            }
        });

        Self {
            stop,
            jh: Some(jh),
        }
    }

    /// Stop the ticker and wait for its thread to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(jh) = self.jh.take() {
            if jh.join().is_err() {
                warn!("Ticker thread panicked");
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Handle events until [`NavEvent::Shutdown`] is received or either channel is closed.
///
/// The controller is returned once the loop exits.
pub fn run(mut nav: NavCtrl, events: Receiver<NavEvent>, outputs: Sender<NavOutput>) -> NavCtrl {
    info!("Navigation event loop started");

    while let Ok(event) = events.recv() {
        let mut out = Vec::with_capacity(2);

        match event {
            NavEvent::Pose(pose) => {
                if let Some(result) = nav.on_pose(pose) {
                    plan_outputs(&nav, result, false, &mut out);
                }
            }
            NavEvent::Goal(goal) => {
                let was_tracking = nav.state() == NavState::Tracking;
                let result = nav.on_goal(goal);
                plan_outputs(&nav, result, was_tracking, &mut out);
            }
            NavEvent::Tick => {
                let goal = nav.goal();
                let step = nav.step();

                out.push(NavOutput::Cmd(step.cmd));

                if step.goal_reached {
                    if let Some(g) = goal {
                        out.push(NavOutput::GoalReached(g));
                    }
                }
            }
            NavEvent::Shutdown => {
                info!("Shutdown requested");
                break;
            }
        }

        if out.into_iter().any(|o| outputs.send(o).is_err()) {
            warn!("Output receiver dropped, stopping event loop");
            break;
        }
    }

    info!("Navigation event loop stopped");

    nav
}

fn plan_outputs(
    nav: &NavCtrl,
    result: Result<Path, NavError>,
    was_tracking: bool,
    out: &mut Vec<NavOutput>,
) {
    match result {
        Ok(path) => out.push(NavOutput::Path(path)),
        // Goal is kept and will be planned on the next pose
        Err(NavError::MissingPose) if nav.pending_goal().is_some() => (),
        Err(e) => {
            if was_tracking {
                out.push(NavOutput::Cmd(VelocityCmd::zero()));
            }
            out.push(NavOutput::PlanningFailed(e));
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{nav_ctrl::NavCtrlParams, sim::KinematicSim};
    use std::sync::mpsc::channel;

    fn nav_ctrl() -> NavCtrl {
        let params: NavCtrlParams =
            util::params::load_str(include_str!("../../../params/nav_ctrl.toml")).unwrap();
        NavCtrl::new(params).unwrap()
    }

    #[test]
    fn test_event_loop_to_goal() {
        let (event_tx, event_rx) = channel();
        let (out_tx, out_rx) = channel();
        let jh = thread::spawn(move || run(nav_ctrl(), event_rx, out_tx));

        let start = PoseEstimate::default();
        let mut sim = KinematicSim::new(start);

        // Goal arrives before the pose and is planned once the pose arrives
        event_tx.send(NavEvent::Goal(WorldPoint::new(1.0, 1.0))).unwrap();
        event_tx.send(NavEvent::Pose(start)).unwrap();
        match out_rx.recv().unwrap() {
            NavOutput::Path(p) => assert_eq!(p.get_num_points(), 4),
            o => panic!("expected a path, got {:?}", o),
        }

        let mut reached = None;
        for _ in 0..400 {
            event_tx.send(NavEvent::Tick).unwrap();

            let cmd = match out_rx.recv().unwrap() {
                NavOutput::Cmd(c) => c,
                o => panic!("expected a command, got {:?}", o),
            };

            // Only the goal reached tick commands a stop while tracking
            if cmd.is_zero() {
                match out_rx.recv().unwrap() {
                    NavOutput::GoalReached(g) => reached = Some(g),
                    o => panic!("expected goal reached, got {:?}", o),
                }
                break;
            }

            event_tx.send(NavEvent::Pose(sim.step(&cmd, 0.05))).unwrap();
        }
        assert_eq!(reached, Some(WorldPoint::new(1.0, 1.0)));

        // Idle ticks command a stop
        event_tx.send(NavEvent::Tick).unwrap();
        assert_eq!(out_rx.recv().unwrap(), NavOutput::Cmd(VelocityCmd::zero()));

        event_tx.send(NavEvent::Shutdown).unwrap();
        let nav = jh.join().unwrap();
        assert_eq!(nav.state(), NavState::Idle);
    }

    #[test]
    fn test_failed_goal_while_tracking_stops() {
        let (event_tx, event_rx) = channel();
        let (out_tx, out_rx) = channel();
        let jh = thread::spawn(move || run(nav_ctrl(), event_rx, out_tx));

        event_tx.send(NavEvent::Pose(PoseEstimate::default())).unwrap();
        event_tx.send(NavEvent::Goal(WorldPoint::new(1.0, 1.0))).unwrap();
        assert!(matches!(out_rx.recv().unwrap(), NavOutput::Path(_)));

        event_tx.send(NavEvent::Goal(WorldPoint::new(0.2, 0.5))).unwrap();
        assert_eq!(out_rx.recv().unwrap(), NavOutput::Cmd(VelocityCmd::zero()));
        assert!(matches!(
            out_rx.recv().unwrap(),
            NavOutput::PlanningFailed(NavError::Planning(_))
        ));

        drop(event_tx);
        let nav = jh.join().unwrap();
        assert!(nav.path().is_none());
    }

    #[test]
    fn test_ticker() {
        let (tx, rx) = channel();
        let ticker = Ticker::start(Duration::from_millis(5), tx);

        for _ in 0..3 {
            assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(NavEvent::Tick));
        }

        ticker.stop();
    }
}
