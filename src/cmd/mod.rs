//! The command interpreter.
//!
//! A [`Session`] holds the managers, the loaded model and the recorded
//! witnesses; [`Command`]s are parsed from script lines or assembled by
//! the CLI and executed one at a time. `on <cmd> then <cmd> else <cmd>`
//! chains on the first command's outcome.

pub mod render;

use std::str::FromStr;

use sybil_model::{Analyzer, Model};
use sybil_witness::WitnessStore;
use tracing::info;

use crate::algorithms::{bmc, check, sim};
use crate::context::Context;
use crate::error::Error;
use crate::parser;
use crate::trace::{self, TraceFormat};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ReadModel {
        path: String,
    },
    DumpModel,
    WriteModel {
        path: String,
    },
    CheckInit,
    CheckInvar,
    CheckTrans,
    PickState {
        constraints: Vec<String>,
    },
    Simulate {
        k: u64,
        halt: Option<String>,
        constraints: Vec<String>,
    },
    Verify {
        property: String,
        cap: u64,
    },
    DumpTrace {
        id: Option<String>,
        format: String,
        output: Option<String>,
    },
    On {
        cond: Box<Command>,
        then: Option<Box<Command>>,
        otherwise: Option<Box<Command>>,
    },
    Quit {
        code: i32,
    },
}

/// What a command produced: text for the console, or a quit request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Text(String),
    Quit(i32),
}

pub struct Session {
    pub ctx: Context,
    model: Option<Model>,
    pub witnesses: WitnessStore,
}

impl Session {
    pub fn new(ctx: Context) -> Self {
        Session {
            ctx,
            model: None,
            witnesses: WitnessStore::new(),
        }
    }

    pub fn model(&self) -> Result<&Model, Error> {
        self.model
            .as_ref()
            .ok_or_else(|| Error::Command("no model loaded".into()))
    }

    /// Parses, analyzes and installs a model from source text.
    pub fn load_model(&mut self, source: &str) -> Result<(), Error> {
        let mut model = parser::parse_model(&self.ctx, source).map_err(Error::Parse)?;
        Analyzer::process(&self.ctx.pool, &self.ctx.tm, &mut model)?;
        info!(modules = model.modules().len(), "model loaded");
        self.model = Some(model);
        Ok(())
    }

    pub fn execute(&mut self, cmd: &Command) -> Result<Outcome, Error> {
        match cmd {
            Command::ReadModel { path } => {
                let source = std::fs::read_to_string(path)?;
                self.load_model(&source)?;
                Ok(Outcome::Text(String::new()))
            }

            Command::DumpModel => {
                let text = render::render_model(&self.ctx, self.model()?);
                Ok(Outcome::Text(text))
            }

            Command::WriteModel { path } => {
                let text = render::render_model(&self.ctx, self.model()?);
                std::fs::write(path, text)?;
                Ok(Outcome::Text(String::new()))
            }

            Command::CheckInit => {
                let status = check::check_init(&self.ctx, self.model()?)?;
                Ok(Outcome::Text(status.as_str().to_string()))
            }
            Command::CheckInvar => {
                let status = check::check_invar(&self.ctx, self.model()?)?;
                Ok(Outcome::Text(status.as_str().to_string()))
            }
            Command::CheckTrans => {
                let status = check::check_trans(&self.ctx, self.model()?)?;
                Ok(Outcome::Text(status.as_str().to_string()))
            }

            Command::PickState { constraints } => {
                let exprs = self.parse_exprs(constraints)?;
                let id = self.witnesses.auto_id("state");
                let model = self.model()?;
                match sim::pick_state(&self.ctx, model, &exprs, id.clone())? {
                    Some(witness) => {
                        self.witnesses.record(witness)?;
                        Ok(Outcome::Text(format!("picked state, trace `{}`", id)))
                    }
                    None => Err(Error::Command("no initial state exists".into())),
                }
            }

            Command::Simulate {
                k,
                halt,
                constraints,
            } => {
                let halt_expr = halt
                    .as_deref()
                    .map(|h| parser::parse_expression(&self.ctx, h))
                    .transpose()
                    .map_err(Error::Parse)?;
                let exprs = self.parse_exprs(constraints)?;
                let id = self.witnesses.auto_id("sim");
                let model = self.model()?;
                let outcome =
                    sim::simulate(&self.ctx, model, halt_expr, &exprs, *k, id.clone())?;
                let mut text = format!("{:?}", outcome.status).to_uppercase();
                if let Some(witness) = outcome.witness {
                    self.witnesses.record(witness)?;
                    text.push_str(&format!(", trace `{}`", id));
                }
                Ok(Outcome::Text(text))
            }

            Command::Verify { property, cap } => {
                let prop = parser::parse_expression(&self.ctx, property)
                    .map_err(Error::Parse)?;
                let id = self.witnesses.auto_id("cex");
                let model = self.model()?;
                let outcome = bmc::verify(&self.ctx, model, prop, *cap, id.clone())?;
                let mut text = format!("{:?}", outcome.status).to_uppercase();
                if let Some(witness) = outcome.witness {
                    self.witnesses.record(witness)?;
                    text.push_str(&format!(", trace `{}`", id));
                }
                Ok(Outcome::Text(text))
            }

            Command::DumpTrace { id, format, output } => {
                let format = TraceFormat::from_str(format)?;
                let witness = match id {
                    Some(id) => self.witnesses.witness(id)?,
                    None => self
                        .witnesses
                        .current()
                        .ok_or_else(|| Error::Command("no trace recorded".into()))?,
                };
                let text = trace::dump(&self.ctx, self.model()?, witness, format);
                match output {
                    Some(path) => {
                        std::fs::write(path, text)?;
                        Ok(Outcome::Text(String::new()))
                    }
                    None => Ok(Outcome::Text(text)),
                }
            }

            Command::On {
                cond,
                then,
                otherwise,
            } => match self.execute(cond) {
                Ok(Outcome::Quit(code)) => Ok(Outcome::Quit(code)),
                Ok(outcome) => match then {
                    Some(cmd) => self.execute(cmd),
                    None => Ok(outcome),
                },
                Err(e) => match otherwise {
                    Some(cmd) => self.execute(cmd),
                    None => Err(e),
                },
            },

            Command::Quit { code } => Ok(Outcome::Quit(*code)),
        }
    }

    fn parse_exprs(&self, sources: &[String]) -> Result<Vec<sybil_expr::ExprId>, Error> {
        sources
            .iter()
            .map(|s| parser::parse_expression(&self.ctx, s).map_err(Error::Parse))
            .collect()
    }

    /// Executes a command script: one command per line, `#` and `--`
    /// comment lines skipped. Stops at the first error or `quit`.
    pub fn run_script(&mut self, script: &str) -> Result<i32, Error> {
        for line in script.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("--") {
                continue;
            }
            let cmd = parse_command(line)?;
            match self.execute(&cmd)? {
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
}

// -- command-line parsing ----------------------------------------------------

/// Splits a command line into tokens, honouring double quotes.
fn split_args(line: &str) -> Result<Vec<String>, Error> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                if !quoted && !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if quoted {
        return Err(Error::Command("unterminated string".into()));
    }
    if !current.is_empty() {
        out.push(current);
    }
    Ok(out)
}

/// Parses a single interpreter command line.
pub fn parse_command(line: &str) -> Result<Command, Error> {
    let tokens = split_args(line)?;
    parse_tokens(&tokens)
}

fn parse_tokens(tokens: &[String]) -> Result<Command, Error> {
    let Some(head) = tokens.first() else {
        return Err(Error::Command("empty command".into()));
    };
    let rest = &tokens[1..];

    match head.as_str() {
        "read-model" => Ok(Command::ReadModel {
            path: one_arg(rest, "read-model <file>")?,
        }),
        "dump-model" => Ok(Command::DumpModel),
        "write-model" => Ok(Command::WriteModel {
            path: one_arg(rest, "write-model <file>")?,
        }),
        "check-init" => Ok(Command::CheckInit),
        "check-invar" => Ok(Command::CheckInvar),
        "check-trans" => Ok(Command::CheckTrans),

        "pick-state" => {
            let mut constraints = Vec::new();
            let mut args = rest.iter();
            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "-c" => constraints.push(flag_value(&mut args, "-c")?),
                    other => return Err(unknown_flag(other)),
                }
            }
            Ok(Command::PickState { constraints })
        }

        "simulate" => {
            let mut k = None;
            let mut halt = None;
            let mut constraints = Vec::new();
            let mut args = rest.iter();
            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "-k" => k = Some(parse_number(&flag_value(&mut args, "-k")?)?),
                    "--halt" => halt = Some(flag_value(&mut args, "--halt")?),
                    "-c" => constraints.push(flag_value(&mut args, "-c")?),
                    other => return Err(unknown_flag(other)),
                }
            }
            Ok(Command::Simulate {
                k: k.ok_or_else(|| Error::Command("simulate requires -k".into()))?,
                halt,
                constraints,
            })
        }

        "verify" => {
            let mut property = None;
            let mut cap = None;
            let mut args = rest.iter();
            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "-p" => property = Some(flag_value(&mut args, "-p")?),
                    "-k" => cap = Some(parse_number(&flag_value(&mut args, "-k")?)?),
                    other => return Err(unknown_flag(other)),
                }
            }
            Ok(Command::Verify {
                property: property
                    .ok_or_else(|| Error::Command("verify requires -p".into()))?,
                cap: cap.ok_or_else(|| Error::Command("verify requires -k".into()))?,
            })
        }

        "dump-trace" => {
            let mut id = None;
            let mut format = "plain".to_string();
            let mut output = None;
            let mut args = rest.iter();
            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "-t" => id = Some(flag_value(&mut args, "-t")?),
                    "-f" => format = flag_value(&mut args, "-f")?,
                    "-o" => output = Some(flag_value(&mut args, "-o")?),
                    other => return Err(unknown_flag(other)),
                }
            }
            Ok(Command::DumpTrace { id, format, output })
        }

        "on" => {
            let then_pos = rest.iter().position(|t| t == "then").ok_or_else(|| {
                Error::Command("on requires a `then` branch".into())
            })?;
            let else_pos = rest.iter().position(|t| t == "else");

            let cond = parse_tokens(&rest[..then_pos])?;
            let (then_slice, else_slice) = match else_pos {
                Some(e) if e > then_pos => (&rest[then_pos + 1..e], Some(&rest[e + 1..])),
                _ => (&rest[then_pos + 1..], None),
            };
            let then = if then_slice.is_empty() {
                None
            } else {
                Some(Box::new(parse_tokens(then_slice)?))
            };
            let otherwise = else_slice
                .map(|s| parse_tokens(s).map(Box::new))
                .transpose()?;
            Ok(Command::On {
                cond: Box::new(cond),
                then,
                otherwise,
            })
        }

        "quit" => {
            let code = match rest.first() {
                Some(c) => parse_number(c)? as i32,
                None => 0,
            };
            Ok(Command::Quit { code })
        }

        other => Err(Error::Command(format!("unknown command `{}`", other))),
    }
}

fn one_arg(rest: &[String], usage: &str) -> Result<String, Error> {
    match rest {
        [arg] => Ok(arg.clone()),
        _ => Err(Error::Command(format!("usage: {}", usage))),
    }
}

fn flag_value<'a>(
    args: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<String, Error> {
    args.next()
        .cloned()
        .ok_or_else(|| Error::Command(format!("{} needs a value", flag)))
}

fn parse_number(s: &str) -> Result<u64, Error> {
    s.parse()
        .map_err(|_| Error::Command(format!("not a number: `{}`", s)))
}

fn unknown_flag(flag: &str) -> Error {
    Error::Command(format!("unknown flag `{}`", flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_commands_parse() {
        assert_eq!(
            parse_command("read-model m.sy").unwrap(),
            Command::ReadModel {
                path: "m.sy".into()
            }
        );
        assert_eq!(parse_command("check-init").unwrap(), Command::CheckInit);
        assert_eq!(parse_command("quit 2").unwrap(), Command::Quit { code: 2 });
    }

    #[test]
    fn quoted_expressions_survive_splitting() {
        let cmd = parse_command("verify -p \"x < 3\" -k 10").unwrap();
        assert_eq!(
            cmd,
            Command::Verify {
                property: "x < 3".into(),
                cap: 10
            }
        );
    }

    #[test]
    fn on_then_else_nests() {
        let cmd = parse_command("on check-init then quit 0 else quit 1").unwrap();
        let Command::On {
            cond,
            then,
            otherwise,
        } = cmd
        else {
            panic!("expected `on`");
        };
        assert_eq!(*cond, Command::CheckInit);
        assert_eq!(*then.unwrap(), Command::Quit { code: 0 });
        assert_eq!(*otherwise.unwrap(), Command::Quit { code: 1 });
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(parse_command("explode").is_err());
        assert!(parse_command("simulate").is_err());
    }

    #[test]
    fn dump_trace_defaults_to_plain() {
        let cmd = parse_command("dump-trace").unwrap();
        assert_eq!(
            cmd,
            Command::DumpTrace {
                id: None,
                format: "plain".into(),
                output: None
            }
        );
    }
}
