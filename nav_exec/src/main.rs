//! Main navigation executable entry point.
//!
//! # Architecture
//!
//! The executable runs the navigation core against the kinematic simulator:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the navigation controller, including the static map
//!     - Start the navigation event loop and the control ticker on their own threads
//!     - Main loop:
//!         - Receive commands and navigation results
//!         - Integrate the latest command in the simulator and publish the pose
//!         - Submit the next goal once the previous one is reached or has failed
//!     - Shut down once all goals are done or the timeout expires

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::Utc;
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::collections::VecDeque;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use nav_lib::{
    map::WorldPoint,
    nav::PLANNER_LOG_TARGET,
    nav_ctrl::{
        exec::{self, NavEvent, NavOutput, Ticker},
        NavCtrl, NavCtrlParams,
    },
    params::NavExecParams,
    sim::KinematicSim,
    traj_ctrl::VelocityCmd,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
    time::duration_to_seconds,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "nav_exec", about = "Navigate the simulated robot through a list of goals")]
struct Opts {
    /// Goal to visit as `x,y` in meters, may be repeated. Overrides the goals in nav_exec.toml.
    #[structopt(long = "goal", parse(try_from_str = parse_goal))]
    goals: Vec<WorldPoint>,

    /// Minimum log level, one of `info`, `debug` or `trace`
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger, the planner's per-cell traces are capped at debug
    logger_init(
        opts.log_level,
        &[(PLANNER_LOG_TARGET, LevelFilter::Debug)],
        &session,
    )
    .wrap_err("Failed to initialise logging")?;

    let start_time = Utc::now();

    info!("Navigation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let nav_ctrl_params: NavCtrlParams =
        util::params::load("nav_ctrl.toml").wrap_err("Could not load NavCtrl params")?;
    let exec_params: NavExecParams =
        util::params::load("nav_exec.toml").wrap_err("Could not load exec params")?;

    info!("Parameters loaded");

    let mut goals: VecDeque<WorldPoint> = if opts.goals.is_empty() {
        exec_params.goals().into()
    } else {
        opts.goals.into()
    };

    info!("{} goals to visit", goals.len());

    // ---- INITIALISE MODULES ----

    let nav_ctrl = NavCtrl::new(nav_ctrl_params).wrap_err("Failed to initialise NavCtrl")?;
    info!("NavCtrl init complete");

    let (event_tx, event_rx) = channel();
    let (output_tx, output_rx) = channel();

    let nav_jh = thread::spawn(move || exec::run(nav_ctrl, event_rx, output_tx));

    let ticker = Ticker::start(
        Duration::from_secs_f64(exec_params.tick_period_s),
        event_tx.clone(),
    );

    let mut sim = KinematicSim::new(exec_params.initial_pose());
    let mut cmd = VelocityCmd::zero();

    send(&event_tx, NavEvent::Pose(sim.pose()))?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    let pose_period = Duration::from_secs_f64(exec_params.pose_period_s);
    let timeout = Duration::from_secs_f64(exec_params.timeout_s);

    let exec_start = Instant::now();
    let mut last_pose = Instant::now();

    let mut running = next_goal(&event_tx, &mut goals)?;

    while running {
        if exec_start.elapsed() > timeout {
            warn!(
                "Timeout of {} s reached with {} goals remaining",
                exec_params.timeout_s,
                goals.len()
            );
            break;
        }

        match output_rx.recv_timeout(pose_period.saturating_sub(last_pose.elapsed())) {
            Ok(NavOutput::Cmd(c)) => cmd = c,
            Ok(NavOutput::Path(p)) => info!(
                "Tracking new path of {} waypoints, {:.2} m long",
                p.get_num_points(),
                p.get_length().unwrap_or(0.0)
            ),
            Ok(NavOutput::GoalReached(g)) => {
                let pose = sim.pose();
                info!(
                    "Reached goal ({:.2}, {:.2}), robot at ({:.2}, {:.2})",
                    g.x, g.y, pose.x_m, pose.y_m
                );
                running = next_goal(&event_tx, &mut goals)?;
            }
            Ok(NavOutput::PlanningFailed(e)) => {
                warn!("Goal abandoned: {}", e);
                running = next_goal(&event_tx, &mut goals)?;
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(eyre!("Navigation event loop exited unexpectedly"))
            }
        }

        // ---- SIMULATION ----

        let since_pose = last_pose.elapsed();
        if since_pose >= pose_period {
            last_pose = Instant::now();
            send(
                &event_tx,
                NavEvent::Pose(sim.step(&cmd, since_pose.as_secs_f64())),
            )?;
        }
    }

    // ---- SHUTDOWN ----

    send(&event_tx, NavEvent::Shutdown)?;
    ticker.stop();

    let nav_ctrl = nav_jh
        .join()
        .map_err(|_| eyre!("Navigation thread panicked"))?;

    info!(
        "End of execution after {:.2} s, final state {}",
        duration_to_seconds(Utc::now() - start_time).unwrap_or(std::f64::NAN),
        nav_ctrl.state()
    );

    session.exit();

    Ok(())
}

/// Send the next goal, returning false if there are none left.
fn next_goal(events: &Sender<NavEvent>, goals: &mut VecDeque<WorldPoint>) -> Result<bool, Report> {
    match goals.pop_front() {
        Some(g) => {
            info!("Sending goal ({:.2}, {:.2})", g.x, g.y);
            send(events, NavEvent::Goal(g))?;
            Ok(true)
        }
        None => {
            info!("All goals complete");
            Ok(false)
        }
    }
}

fn send(events: &Sender<NavEvent>, event: NavEvent) -> Result<(), Report> {
    events
        .send(event)
        .map_err(|_| eyre!("Navigation event loop is not running"))
}

/// Parse a goal given as `x,y`.
fn parse_goal(s: &str) -> Result<WorldPoint, String> {
    let coords = s
        .split(',')
        .map(|c| c.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid goal \"{}\": {}", s, e))?;

    match coords.as_slice() {
        [x, y] => Ok(WorldPoint::new(*x, *y)),
        _ => Err(format!("expected a goal as x,y, got \"{}\"", s)),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
