use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, Sender, TryRecvError},
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use pacenote::announce::{self, ConsoleAnnouncer};
use pacenote::config::RallyConfig;
use pacenote::display::{compose_frame, format_lap_row, format_lap_table};
use pacenote::errors::PacenoteError;
use pacenote::input::{self, DriverSignal};
use pacenote::session::{Announcement, LapType, Session};
use pacenote::writer::{self, LapRecord, SessionRecord};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Time a session with the given rally config
    Run {
        #[arg(short, long)]
        config: PathBuf,

        /// Write session records (config and completed laps) to this JSONL file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse a rally config and print the lap plan without starting a session
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn run(config_arg: &Path, output: Option<PathBuf>) -> Result<(), PacenoteError> {
    let config_path = RallyConfig::resolve_path(config_arg)?;
    let config = RallyConfig::from_file(&config_path)?;
    let refresh_rate_ms = config.misc.refresh_rate_ms;
    let debounce_s = config.misc.debounce_s;

    let (signal_tx, signal_rx) = mpsc::channel::<DriverSignal>();

    // Ctrl-C quits through the signal channel like any other quit, so the
    // shutdown below still runs and the session log reaches disk
    let interrupt_tx = signal_tx.clone();
    ctrlc::set_handler(move || {
        println!("\nExiting...");
        let _ = interrupt_tx.send(DriverSignal::Quit);
    })
    .expect("Could not set Ctrl-C handler");

    thread::spawn(move || input::read_signals(signal_tx, debounce_s));

    let (announce_tx, announce_rx) = mpsc::channel::<Announcement>();
    thread::spawn(move || announce::run_announcer(ConsoleAnnouncer { bell: true }, announce_rx));

    // if we need to write a session log we create a channel and send a record
    // for every completed lap
    let (record_tx, writer_handle) = match output {
        Some(output_file) => {
            let (record_tx, record_rx) = mpsc::channel::<SessionRecord>();
            let handle = thread::spawn(move || {
                if let Err(e) = writer::write_session(&output_file, record_rx) {
                    error!("Error while writing session log: {}", e);
                }
            });
            (Some(record_tx), Some(handle))
        }
        None => (None, None),
    };

    let mut session = Session::new();
    session.load_config(config)?;
    send_session_start(&record_tx, &session);

    println!("Loaded {}", config_path.display());
    println!("return = lap, m = mark, r = reset, q = quit");

    'session: loop {
        loop {
            match signal_rx.try_recv() {
                Ok(signal) => {
                    if !handle_signal(&mut session, signal, &record_tx) {
                        println!();
                        print!("{}", format_lap_table(&session));
                        break 'session;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    println!();
                    break 'session;
                }
            }
        }

        let tick = session.tick(Instant::now());
        if let Err(e) = announce::dispatch(&announce_tx, &tick.events) {
            warn!("{}", e);
        }

        let frame = compose_frame(&session, &tick);
        print!("\r{} | {}", frame.line1, frame.line2);
        let _ = io::stdout().flush();

        thread::sleep(Duration::from_millis(refresh_rate_ms));
    }

    // hang up the record channel and wait for the writer's final flush
    drop(record_tx);
    if let Some(writer_handle) = writer_handle {
        if writer_handle.join().is_err() {
            error!("Session log writer thread panicked");
        }
    }
    Ok(())
}

/// Apply one driver signal to the session. Returns `false` on quit.
fn handle_signal(
    session: &mut Session,
    signal: DriverSignal,
    record_tx: &Option<Sender<SessionRecord>>,
) -> bool {
    match signal {
        DriverSignal::LapBoundary => {
            let ended = session.current_lap_type();
            match session.advance() {
                Ok((started, completed)) => {
                    if let Some(seconds) = completed {
                        let lap_no = session.lap_log().lap_count();
                        println!();
                        println!("{}", format_lap_row(lap_no, ended, seconds));
                        if let Some(record_tx) = record_tx {
                            let _ = record_tx.send(SessionRecord::Lap(LapRecord {
                                lap_no,
                                lap_type: ended,
                                seconds,
                            }));
                            if ended == LapType::SetLap {
                                if let Some(reference) = session.reference() {
                                    let _ = record_tx
                                        .send(SessionRecord::Reference(reference.clone()));
                                }
                            }
                        }
                    }
                    info!("Now on lap {}: {}", session.lap_number(), started);
                }
                Err(e) => warn!("{}", e),
            }
            true
        }
        DriverSignal::MarkReached => {
            if let Err(e) = session.mark_reached() {
                warn!("{}", e);
            }
            true
        }
        DriverSignal::Reset => {
            session.reset();
            send_session_start(record_tx, session);
            println!();
            info!("Session reset");
            true
        }
        DriverSignal::Quit => false,
    }
}

fn send_session_start(record_tx: &Option<Sender<SessionRecord>>, session: &Session) {
    if let (Some(record_tx), Some(config)) = (record_tx, session.config()) {
        let _ = record_tx.send(SessionRecord::SessionStart {
            config: config.clone(),
        });
    }
}

fn check(config_arg: &Path) -> Result<(), PacenoteError> {
    let config_path = RallyConfig::resolve_path(config_arg)?;
    let config = RallyConfig::from_file(&config_path)?;

    println!("{}: {} laps", config_path.display(), config.sequence.len());
    for (idx, lap_type) in config.sequence.iter().enumerate() {
        println!("  {:2}. {}", idx + 1, lap_type);
    }
    if !config.marks.is_empty() {
        let labels: Vec<&str> = config.marks.iter().map(|mark| mark.label.as_str()).collect();
        println!("marks: {}", labels.join(", "));
    }
    println!(
        "countdown from {}, sound lead {:.1} s, debounce {:.1} s",
        config.misc.countdown_from, config.misc.sound_lead_s, config.misc.debounce_s
    );
    for warning in config.lint() {
        println!("warning: {}", warning);
    }
    Ok(())
}

fn main() {
    colog::init();

    let cli = Args::parse();
    match &cli.command {
        Commands::Run { config, output } => {
            if let Err(e) = run(config, output.clone()) {
                error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Check { config } => {
            if let Err(e) = check(config) {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    };
}
