// src/main.rs
//
// Demo / research harness around the mantis-rl library.
//
// Binds the learner endpoint, spawns an in-process simulated controller,
// and runs scripted tripod-gait episodes, printing one summary line per
// episode. The real training loop lives out of process and consumes the
// same facade; this harness exists to exercise the full protocol end to
// end without a physics simulator.
//
// Config precedence: CLI > MANTIS_* env vars > defaults.

use clap::{ArgAction, Parser, ValueEnum};

use mantis_rl::config::{Config, Task};
use mantis_rl::controller::ControllerBridge;
use mantis_rl::env::HexapodEnv;
use mantis_rl::error::BridgeResult;
use mantis_rl::gait::GaitGenerator;
use mantis_rl::recorder::CsvSink;
use mantis_rl::robot::SimRobot;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TaskArg {
    StandUp,
    Walk,
    Climb,
    Idle,
}

impl From<TaskArg> for Task {
    fn from(arg: TaskArg) -> Self {
        match arg {
            TaskArg::StandUp => Task::StandUp,
            TaskArg::Walk => Task::Walk,
            TaskArg::Climb => Task::Climb,
            TaskArg::Idle => Task::Idle,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mantis-rl",
    about = "Mantis hexapod simulation bridge (demo harness)",
    version
)]
struct Args {
    /// Task selecting the reward policy.
    /// If omitted, uses MANTIS_TASK (default stand_up).
    #[arg(long, value_enum)]
    task: Option<TaskArg>,

    /// Listening port. If omitted, uses MANTIS_PORT (default 5000).
    #[arg(long)]
    port: Option<u16>,

    /// Step budget per episode.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Number of episodes to run.
    #[arg(long, default_value_t = 1)]
    episodes: u64,

    /// Write controller-side expert data to this CSV file.
    #[arg(long)]
    record: Option<String>,

    /// Seed for the simulated robot.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("mantis-rl: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> BridgeResult<()> {
    let mut cfg = Config::from_env_or_default();
    if let Some(task) = args.task {
        cfg.task = task.into();
    }
    if let Some(port) = args.port {
        cfg.transport.port = port;
    }
    if let Some(max_steps) = args.max_steps {
        cfg.episode.max_steps = max_steps;
    }

    println!(
        "mantis-rl | cfg={} | task={} | port={} | max_steps={} | episodes={} | seed={}",
        cfg.version,
        cfg.task.as_str(),
        cfg.transport.port,
        cfg.episode.max_steps,
        args.episodes,
        args.seed
    );

    let mut env = HexapodEnv::bind(cfg.clone())?;
    let port = env.local_port().unwrap_or(cfg.transport.port);

    // In-process controller standing in for the simulator process.
    let host = cfg.transport.host.clone();
    let dt = cfg.control.dt_seconds;
    let seed = args.seed;
    let record = args.record.clone();
    let controller = std::thread::spawn(move || -> BridgeResult<()> {
        let robot = SimRobot::new(seed).with_noise(0.002);
        let bridge = ControllerBridge::connect(&host, port, robot, dt)?;
        match record {
            Some(path) => {
                let sink = CsvSink::create(&path).map_err(|e| {
                    mantis_rl::error::BridgeError::transport(
                        mantis_rl::error::ExchangePhase::Connect,
                        format!("could not create {path}: {e}"),
                    )
                })?;
                let mut bridge = bridge.with_sink(sink);
                bridge.run()
            }
            None => {
                let mut bridge = bridge;
                bridge.run()
            }
        }
    });

    env.wait_for_controller()?;

    let gait = GaitGenerator::new(cfg.control.gait_freq_hz);
    for episode in 0..args.episodes {
        env.reset()?;

        let mut total_reward = 0.0;
        let mut steps = 0u64;
        let mut t = 0.0;
        loop {
            let action = gait.action(t);
            let result = env.step(&action)?;
            total_reward += result.reward;
            steps += 1;
            t += dt;

            if args.verbose > 1 {
                println!(
                    "  step {:4} | reward {:+.3} | stable {:3} | tilted {}",
                    steps, result.reward, result.info.stable_counter, result.info.is_tilted
                );
            }
            if result.done {
                println!(
                    "episode {} | steps={} | total_reward={:.3} | reason={}",
                    episode,
                    steps,
                    total_reward,
                    result
                        .info
                        .termination_reason
                        .map(|r| r.as_str())
                        .unwrap_or("none")
                );
                break;
            }
        }
    }

    env.close();
    match controller.join() {
        Ok(result) => result?,
        Err(_) => eprintln!("mantis-rl: controller thread panicked"),
    }

    Ok(())
}
