//! sybil entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sybil::cmd::{Command as SessionCommand, Outcome, Session};
use sybil::context::Context;
use sybil::error::Error;

#[derive(Parser)]
#[command(name = "sybil")]
#[command(about = "Bounded symbolic model checker", long_about = None)]
#[command(version)]
struct Cli {
    /// Microcode cache directory (defaults to SYBIL_MICROCODE_DIR or
    /// `.microcode`).
    #[arg(long, global = true)]
    microcode_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify an invariant property by bounded model checking
    Verify {
        /// Model file
        #[arg(short, long)]
        model: PathBuf,
        /// The invariant property
        #[arg(short, long)]
        property: String,
        /// Bound cap
        #[arg(short = 'k', long, default_value_t = 10)]
        bound: u64,
        /// Dump the counterexample trace in this format
        #[arg(long)]
        dump: Option<String>,
    },
    /// Simulate the FSM for a number of steps
    Simulate {
        #[arg(short, long)]
        model: PathBuf,
        /// Number of steps
        #[arg(short = 'k', long)]
        steps: u64,
        /// Stop when this condition can hold
        #[arg(long)]
        halt: Option<String>,
        /// Extra state constraints (repeatable)
        #[arg(short = 'c', long = "constraint")]
        constraints: Vec<String>,
        /// Dump the trace in this format
        #[arg(long)]
        dump: Option<String>,
    },
    /// Choose and print an initial state
    PickState {
        #[arg(short, long)]
        model: PathBuf,
        #[arg(short = 'c', long = "constraint")]
        constraints: Vec<String>,
        #[arg(long)]
        dump: Option<String>,
    },
    /// Check INIT consistency
    CheckInit {
        #[arg(short, long)]
        model: PathBuf,
    },
    /// Check INVAR consistency
    CheckInvar {
        #[arg(short, long)]
        model: PathBuf,
    },
    /// Check TRANS consistency
    CheckTrans {
        #[arg(short, long)]
        model: PathBuf,
    },
    /// Parse, analyze and pretty-print a model
    DumpModel {
        #[arg(short, long)]
        model: PathBuf,
    },
    /// Run an interpreter script (`-` for stdin)
    Run {
        script: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<i32, Error> {
    let mut ctx = Context::new();
    if let Some(dir) = cli.microcode_dir {
        ctx = ctx.with_microcode_dir(dir);
    }
    let mut session = Session::new(ctx);

    let mut commands: Vec<SessionCommand> = Vec::new();
    match cli.command {
        Commands::Verify {
            model,
            property,
            bound,
            dump,
        } => {
            load(&mut session, &model)?;
            commands.push(SessionCommand::Verify {
                property,
                cap: bound,
            });
            if let Some(format) = dump {
                commands.push(SessionCommand::DumpTrace {
                    id: None,
                    format,
                    output: None,
                });
            }
        }
        Commands::Simulate {
            model,
            steps,
            halt,
            constraints,
            dump,
        } => {
            load(&mut session, &model)?;
            commands.push(SessionCommand::Simulate {
                k: steps,
                halt,
                constraints,
            });
            if let Some(format) = dump {
                commands.push(SessionCommand::DumpTrace {
                    id: None,
                    format,
                    output: None,
                });
            }
        }
        Commands::PickState {
            model,
            constraints,
            dump,
        } => {
            load(&mut session, &model)?;
            commands.push(SessionCommand::PickState { constraints });
            if let Some(format) = dump {
                commands.push(SessionCommand::DumpTrace {
                    id: None,
                    format,
                    output: None,
                });
            }
        }
        Commands::CheckInit { model } => {
            load(&mut session, &model)?;
            commands.push(SessionCommand::CheckInit);
        }
        Commands::CheckInvar { model } => {
            load(&mut session, &model)?;
            commands.push(SessionCommand::CheckInvar);
        }
        Commands::CheckTrans { model } => {
            load(&mut session, &model)?;
            commands.push(SessionCommand::CheckTrans);
        }
        Commands::DumpModel { model } => {
            load(&mut session, &model)?;
            commands.push(SessionCommand::DumpModel);
        }
        Commands::Run { script } => {
            let text = if script.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                std::fs::read_to_string(&script)?
            };
            return session.run_script(&text);
        }
    }

    for cmd in &commands {
        match session.execute(cmd)? {
            Outcome::Text(text) => {
                if !text.is_empty() {
                    println!("{}", text);
                }
            }
            Outcome::Quit(code) => return Ok(code),
        }
    }
    Ok(0)
}

fn load(session: &mut Session, path: &PathBuf) -> Result<(), Error> {
    let source = std::fs::read_to_string(path)?;
    session.load_model(&source)
}
