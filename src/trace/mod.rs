//! Trace dumpers: plain, JSON, XML and YAML renderings of a witness.
//!
//! Dumpers consume the witness data structure only; defines are
//! computed per frame through the witness evaluator. Variables split
//! into an `input` and a `state` section per step.

use std::fmt::Write as _;
use std::str::FromStr;

use serde_json::json;
use sybil_expr::Step;
use sybil_model::Model;
use sybil_witness::{Evaluator, Witness};

use crate::context::Context;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    Plain,
    Json,
    Xml,
    Yaml,
}

impl FromStr for TraceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "plain" => Ok(TraceFormat::Plain),
            "json" => Ok(TraceFormat::Json),
            "xml" => Ok(TraceFormat::Xml),
            "yaml" => Ok(TraceFormat::Yaml),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Named `(symbol, value)` pairs of one step, split by section.
struct Sections {
    input: Vec<(String, String)>,
    state: Vec<(String, String)>,
    defines: Vec<(String, String)>,
}

fn sections(ctx: &Context, model: &Model, witness: &Witness, step: Step) -> Sections {
    let pool = &ctx.pool;
    let mut out = Sections {
        input: Vec::new(),
        state: Vec::new(),
        defines: Vec::new(),
    };

    for (vctx, var) in model.each_variable() {
        if var.hidden || ctx.tm.is_instance(var.ty) {
            continue;
        }
        let fqn = pool.make_dot(vctx, var.name);
        let Some(value) = witness.value(fqn, step) else {
            continue;
        };
        let entry = (pool.to_text(fqn), pool.to_text(value));
        if var.input {
            out.input.push(entry);
        } else {
            out.state.push(entry);
        }
    }

    let mut evaluator = Evaluator::new(pool, &ctx.tm, model, witness);
    for (dctx, def) in model.each_define() {
        if !def.formals.is_empty() {
            continue;
        }
        let fqn = pool.make_dot(dctx, def.name);
        let value = evaluator.process(dctx, def.body, step);
        out.defines.push((pool.to_text(fqn), pool.to_text(value)));
    }

    out
}

/// Renders a witness in the requested format.
pub fn dump(
    ctx: &Context,
    model: &Model,
    witness: &Witness,
    format: TraceFormat,
) -> String {
    match format {
        TraceFormat::Plain => dump_plain(ctx, model, witness),
        TraceFormat::Json => dump_json(ctx, model, witness),
        TraceFormat::Xml => dump_xml(ctx, model, witness),
        TraceFormat::Yaml => dump_yaml(ctx, model, witness),
    }
}

fn plain_section(out: &mut String, name: &str, entries: &[(String, String)]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "-- {}", name);
    for (symbol, value) in entries {
        let _ = writeln!(out, "   {} = {}", symbol, value);
    }
    let _ = writeln!(out);
}

fn dump_plain(ctx: &Context, model: &Model, witness: &Witness) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Witness: {} [[ {} ]]", witness.id(), witness.desc());
    for step in witness.first_time()..=witness.last_time() {
        let _ = writeln!(out, ":: @{}", step);
        let s = sections(ctx, model, witness, step);
        plain_section(&mut out, "input", &s.input);
        plain_section(&mut out, "state", &s.state);
        plain_section(&mut out, "defines", &s.defines);
    }
    out
}

fn json_object(entries: &[(String, String)]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (symbol, value) in entries {
        map.insert(symbol.clone(), json!(value));
    }
    serde_json::Value::Object(map)
}

fn dump_json(ctx: &Context, model: &Model, witness: &Witness) -> String {
    let steps: Vec<serde_json::Value> = (witness.first_time()..=witness.last_time())
        .map(|step| {
            let s = sections(ctx, model, witness, step);
            json!({
                "time": step,
                "input": json_object(&s.input),
                "state": json_object(&s.state),
                "defines": json_object(&s.defines),
            })
        })
        .collect();

    let doc = json!({
        "witness": witness.id(),
        "description": witness.desc(),
        "steps": steps,
    });
    serde_json::to_string_pretty(&doc).expect("witness serialization")
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn xml_section(out: &mut String, name: &str, entries: &[(String, String)]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "    <{}>", name);
    for (symbol, value) in entries {
        let _ = writeln!(
            out,
            "      <value name=\"{}\">{}</value>",
            xml_escape(symbol),
            xml_escape(value)
        );
    }
    let _ = writeln!(out, "    </{}>", name);
}

fn dump_xml(ctx: &Context, model: &Model, witness: &Witness) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    let _ = writeln!(
        out,
        "<witness id=\"{}\" description=\"{}\">",
        xml_escape(witness.id()),
        xml_escape(witness.desc())
    );
    for step in witness.first_time()..=witness.last_time() {
        let _ = writeln!(out, "  <step time=\"{}\">", step);
        let s = sections(ctx, model, witness, step);
        xml_section(&mut out, "input", &s.input);
        xml_section(&mut out, "state", &s.state);
        xml_section(&mut out, "defines", &s.defines);
        let _ = writeln!(out, "  </step>");
    }
    let _ = writeln!(out, "</witness>");
    out
}

fn yaml_section(out: &mut String, name: &str, entries: &[(String, String)]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "    {}:", name);
    for (symbol, value) in entries {
        let _ = writeln!(out, "      {}: \"{}\"", symbol, value);
    }
}

fn dump_yaml(ctx: &Context, model: &Model, witness: &Witness) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "witness: {}", witness.id());
    let _ = writeln!(out, "description: \"{}\"", witness.desc());
    let _ = writeln!(out, "steps:");
    for step in witness.first_time()..=witness.last_time() {
        let _ = writeln!(out, "  - time: {}", step);
        let s = sections(ctx, model, witness, step);
        yaml_section(&mut out, "input", &s.input);
        yaml_section(&mut out, "state", &s.state);
        yaml_section(&mut out, "defines", &s.defines);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_parse() {
        assert_eq!("plain".parse::<TraceFormat>().unwrap(), TraceFormat::Plain);
        assert_eq!("json".parse::<TraceFormat>().unwrap(), TraceFormat::Json);
        assert_eq!("xml".parse::<TraceFormat>().unwrap(), TraceFormat::Xml);
        assert_eq!("yaml".parse::<TraceFormat>().unwrap(), TraceFormat::Yaml);
        assert!(matches!(
            "csv".parse::<TraceFormat>(),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn xml_escaping_covers_the_specials() {
        assert_eq!(xml_escape("a < b & c"), "a &lt; b &amp; c");
    }
}
