//! End-to-end scenarios: parse, analyze, compile, solve, decode.

use sybil::algorithms::bmc::{verify, McStatus};
use sybil::algorithms::check::{check_init, check_invar, check_trans, Consistency};
use sybil::algorithms::sim::{pick_state, simulate, SimStatus};
use sybil::algorithms::{assert_uniqueness, Fsm};
use sybil::cmd::Session;
use sybil::context::Context;
use sybil::parser::{parse_expression, parse_model};
use sybil_compile::Compiler;
use sybil_model::{Analyzer, Model};
use sybil_sat::{Engine, SolveResult};

fn microcode_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn load(ctx: &Context, src: &str) -> Model {
    let mut model = parse_model(ctx, src).expect("parse failed");
    Analyzer::process(&ctx.pool, &ctx.tm, &mut model).expect("analysis failed");
    model
}

fn frame_value(ctx: &Context, witness: &sybil_witness::Witness, name: &str, step: u64) -> String {
    let fqn = ctx
        .pool
        .make_dot(ctx.pool.empty_expr(), ctx.pool.make_ident(name));
    let value = witness.value(fqn, step).expect("value missing");
    ctx.pool.to_text(value)
}

const COUNTER: &str = "
    MODULE main
    VAR x : unsigned int(2);
    INIT x = 0;
    TRANS next(x) = x + 1;
";

#[test]
fn counter_reaches_three_at_depth_three() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(&ctx, COUNTER);

    let property = parse_expression(&ctx, "x != 3").unwrap();
    let outcome = verify(&ctx, &model, property, 4, "cex".into()).unwrap();
    assert_eq!(outcome.status, McStatus::Reachable);

    let witness = outcome.witness.expect("counterexample trace");
    assert_eq!(witness.first_time(), 0);
    assert_eq!(witness.last_time(), 3);
    for step in 0..=3 {
        assert_eq!(frame_value(&ctx, &witness, "x", step), step.to_string());
    }
}

#[test]
fn counter_never_exceeds_its_width() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(&ctx, COUNTER);

    // x is two bits wide, so x <= 3 is an invariant at every depth
    let property = parse_expression(&ctx, "x <= 3").unwrap();
    let outcome = verify(&ctx, &model, property, 4, "cex".into()).unwrap();
    assert_eq!(outcome.status, McStatus::Undecided);
    assert!(outcome.witness.is_none());
}

#[test]
fn signed_decrement_wraps_at_the_minimum() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR s : signed int(4);
        INIT s = -8;
        TRANS next(s) = s - 1;
        ",
    );

    let outcome = simulate(&ctx, &model, None, &[], 1, "sim".into()).unwrap();
    assert_eq!(outcome.status, SimStatus::Done);
    let witness = outcome.witness.unwrap();
    assert_eq!(frame_value(&ctx, &witness, "s", 0), "-8");
    assert_eq!(frame_value(&ctx, &witness, "s", 1), "7");
}

#[test]
fn parameterised_module_rewrites_to_the_actual() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(2);
            m1 : M(x);
        INIT x = 0;
        TRANS next(x) = m1.out;

        MODULE M(p)
        DEFINE out := p + 1;
        ",
    );

    // next(x) = m1.out rewrites to x + 1, so 2 is reachable at depth 2
    let property = parse_expression(&ctx, "x != 2").unwrap();
    let outcome = verify(&ctx, &model, property, 4, "cex".into()).unwrap();
    assert_eq!(outcome.status, McStatus::Reachable);
    let witness = outcome.witness.unwrap();
    assert_eq!(witness.last_time(), 2);
    assert_eq!(frame_value(&ctx, &witness, "x", 2), "2");
}

#[test]
fn out_of_bounds_subscript_shows_undef_in_the_trace() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR a : unsigned int(4)[3];
        DEFINE oob := a[9];
        INIT a[0] = 1;
        ",
    );

    let witness = pick_state(&ctx, &model, &[], "state".into())
        .unwrap()
        .expect("an initial state exists");

    let mut evaluator =
        sybil_witness::Evaluator::new(&ctx.pool, &ctx.tm, &model, &witness);
    let oob = ctx.pool.make_ident("oob");
    let value = evaluator.process(ctx.pool.empty_expr(), oob, 0);
    assert_eq!(value, ctx.pool.undef_expr());
}

#[test]
fn multiplication_through_microcode() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(3);
            y : unsigned int(3);
        INIT x = 3;
        INIT y = 2;
        ",
    );

    // x * y = 6 holds in the unique initial state ...
    let property = parse_expression(&ctx, "x * y = 6").unwrap();
    let outcome = verify(&ctx, &model, property, 0, "cex".into()).unwrap();
    assert_ne!(outcome.status, McStatus::Reachable);

    // ... and its negation is violated immediately
    let property = parse_expression(&ctx, "x * y != 6").unwrap();
    let outcome = verify(&ctx, &model, property, 0, "cex2".into()).unwrap();
    assert_eq!(outcome.status, McStatus::Reachable);
}

#[test]
fn symbolic_subscript_selects_the_addressed_element() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR a : unsigned int(2)[3];
            i : unsigned int(2);
        INIT i = 1;
        INIT a[i] = 2;
        ",
    );

    assert_eq!(check_init(&ctx, &model).unwrap(), Consistency::Ok);

    // a[1] = 2 follows: its violation never becomes satisfiable
    let property = parse_expression(&ctx, "a[1] = 2").unwrap();
    let outcome = verify(&ctx, &model, property, 0, "cex".into()).unwrap();
    assert_eq!(outcome.status, McStatus::Undecided);
}

#[test]
fn nondeterministic_choice_explores_both_branches() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(2);
        INIT x = 0;
        TRANS next(x) = {0, 2};
        ",
    );

    // both 0 and 2 must be reachable at depth 1
    for (value, reachable) in [("0", true), ("2", true), ("1", false), ("3", false)] {
        let property =
            parse_expression(&ctx, &format!("x != {}", value)).unwrap();
        let outcome = verify(&ctx, &model, property, 1, format!("cex{}", value)).unwrap();
        let got = outcome.status == McStatus::Reachable;
        assert_eq!(got, reachable, "value {}", value);
    }
}

#[test]
fn conditional_update_follows_the_input() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(2);
        IVAR go : boolean;
        INIT x = 0;
        TRANS next(x) = go ? x + 1 : x;
        ",
    );

    // with two favourable inputs, 2 is reachable at depth 2
    let property = parse_expression(&ctx, "x != 2").unwrap();
    let outcome = verify(&ctx, &model, property, 3, "cex".into()).unwrap();
    assert_eq!(outcome.status, McStatus::Reachable);
    assert_eq!(outcome.witness.unwrap().last_time(), 2);
}

#[test]
fn frozen_variables_keep_their_chosen_value() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(2);
        FROZENVAR f : unsigned int(2);
        INIT x = 0;
        INIT f = 2;
        TRANS next(x) = x + 1;
        ",
    );

    let outcome = simulate(&ctx, &model, None, &[], 2, "sim".into()).unwrap();
    assert_eq!(outcome.status, SimStatus::Done);
    let witness = outcome.witness.unwrap();
    for step in 0..=2 {
        assert_eq!(frame_value(&ctx, &witness, "f", step), "2");
    }
}

#[test]
fn enum_state_machine_cycles() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR e : { IDLE, BUSY };
        INIT e = IDLE;
        TRANS next(e) = (e = IDLE) ? BUSY : IDLE;
        ",
    );

    let outcome = simulate(&ctx, &model, None, &[], 2, "sim".into()).unwrap();
    let witness = outcome.witness.unwrap();
    assert_eq!(frame_value(&ctx, &witness, "e", 0), "IDLE");
    assert_eq!(frame_value(&ctx, &witness, "e", 1), "BUSY");
    assert_eq!(frame_value(&ctx, &witness, "e", 2), "IDLE");
}

#[test]
fn invariant_violation_deadlocks_simulation() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(2);
        INIT x = 0;
        INVAR x < 2;
        TRANS next(x) = x + 1;
        ",
    );

    let outcome = simulate(&ctx, &model, None, &[], 5, "sim".into()).unwrap();
    assert_eq!(outcome.status, SimStatus::Deadlocked);
    let witness = outcome.witness.unwrap();
    assert_eq!(witness.last_time(), 1);
    assert_eq!(frame_value(&ctx, &witness, "x", 1), "1");
}

#[test]
fn halting_condition_stops_the_run() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(&ctx, COUNTER);

    let halt = parse_expression(&ctx, "x = 2").unwrap();
    let outcome = simulate(&ctx, &model, Some(halt), &[], 5, "sim".into()).unwrap();
    assert_eq!(outcome.status, SimStatus::Halted);
    let witness = outcome.witness.unwrap();
    assert_eq!(witness.last_time(), 2);
    assert_eq!(frame_value(&ctx, &witness, "x", 2), "2");
}

#[test]
fn consistency_checks_report_contradictions() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(2);
        INIT x = 1;
        INIT x = 2;
        ",
    );
    assert_eq!(check_init(&ctx, &model).unwrap(), Consistency::Ko);

    let ctx2 = Context::new().with_microcode_dir(dir.path());
    let healthy = load(&ctx2, COUNTER);
    assert_eq!(check_init(&ctx2, &healthy).unwrap(), Consistency::Ok);
    assert_eq!(check_invar(&ctx2, &healthy).unwrap(), Consistency::Ok);
    assert_eq!(check_trans(&ctx2, &healthy).unwrap(), Consistency::Ok);
}

#[test]
fn uniqueness_blocks_stuttering_frames() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    // a stuttering machine: the two first frames are always equal
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(2);
        INIT x = 0;
        TRANS next(x) = x;
        ",
    );

    let mut compiler = Compiler::new(&ctx.pool, &ctx.tm, &model, &ctx.dd, &ctx.enc);
    let fsm = Fsm::compile(&ctx, &model, &mut compiler).unwrap();
    let mut engine = Engine::new(dir.path());
    let main = engine.main_group();

    fsm.assert_init(&ctx, &mut engine, 0, main).unwrap();
    fsm.assert_trans(&ctx, &mut engine, 0, main).unwrap();
    assert_eq!(engine.solve(&[]), SolveResult::Sat);

    assert_uniqueness(&ctx, &model, &mut engine, 0, 1, main);
    assert_eq!(engine.solve(&[]), SolveResult::Unsat);
}

#[test]
fn uniqueness_allows_differing_frames() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(&ctx, COUNTER);

    let mut compiler = Compiler::new(&ctx.pool, &ctx.tm, &model, &ctx.dd, &ctx.enc);
    let fsm = Fsm::compile(&ctx, &model, &mut compiler).unwrap();
    let mut engine = Engine::new(dir.path());
    let main = engine.main_group();

    fsm.assert_init(&ctx, &mut engine, 0, main).unwrap();
    fsm.assert_trans(&ctx, &mut engine, 0, main).unwrap();
    assert_uniqueness(&ctx, &model, &mut engine, 0, 1, main);
    assert_eq!(engine.solve(&[]), SolveResult::Sat);
}

#[test]
fn guarded_assignments_hold_their_value_otherwise() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR inertial c : unsigned int(2);
        IVAR tick : boolean;
        INIT c = 0;
        TRANS tick ?-> c := c + 1;
        ",
    );

    // without a tick the counter must not move: a run where c changes
    // while tick is false is impossible
    let property = parse_expression(&ctx, "tick || next(c) = c").unwrap();
    // properties over next() are not plain invariants; check one step
    // directly through the engine instead
    let mut compiler = Compiler::new(&ctx.pool, &ctx.tm, &model, &ctx.dd, &ctx.enc);
    let fsm = Fsm::compile(&ctx, &model, &mut compiler).unwrap();
    let violation = compiler
        .process(ctx.pool.empty_expr(), ctx.pool.make_not(property))
        .unwrap();

    let mut engine = Engine::new(dir.path());
    let main = engine.main_group();
    fsm.assert_init(&ctx, &mut engine, 0, main).unwrap();
    fsm.assert_trans(&ctx, &mut engine, 0, main).unwrap();
    sybil::algorithms::assert_formula(&ctx, &mut engine, &violation, 0, main).unwrap();
    assert_eq!(engine.solve(&[]), SolveResult::Unsat);
}

#[test]
fn session_scripts_drive_the_whole_pipeline() {
    let dir = microcode_dir();
    let model_file = dir.path().join("counter.sy");
    std::fs::write(&model_file, COUNTER).unwrap();

    let ctx = Context::new().with_microcode_dir(dir.path());
    let mut session = Session::new(ctx);
    let script = format!(
        "read-model {}\non check-init then verify -p \"x != 3\" -k 4 else quit 3\nquit 0\n",
        model_file.display()
    );
    let code = session.run_script(&script).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn traces_dump_in_all_formats() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(2);
        IVAR i : boolean;
        DEFINE d := x + 1;
        INIT x = 1;
        ",
    );

    let witness = pick_state(&ctx, &model, &[], "state_1".into())
        .unwrap()
        .expect("initial state");

    use sybil::trace::{dump, TraceFormat};
    let plain = dump(&ctx, &model, &witness, TraceFormat::Plain);
    assert!(plain.contains("Witness: state_1"));
    assert!(plain.contains("x = 1"));
    assert!(plain.contains("d = 2"));

    let json = dump(&ctx, &model, &witness, TraceFormat::Json);
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["witness"], "state_1");
    assert_eq!(parsed["steps"][0]["state"]["x"], "1");
    assert_eq!(parsed["steps"][0]["defines"]["d"], "2");

    let xml = dump(&ctx, &model, &witness, TraceFormat::Xml);
    assert!(xml.contains("<witness id=\"state_1\""));
    assert!(xml.contains("<value name=\"x\">1</value>"));

    let yaml = dump(&ctx, &model, &witness, TraceFormat::Yaml);
    assert!(yaml.contains("witness: state_1"));
    assert!(yaml.contains("x: \"1\""));
}

#[test]
fn named_constants_resolve_in_sections_and_properties() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        CONSTANT limit : unsigned int(2) := 2;
        VAR x : unsigned int(2);
        INIT x = 0;
        INVAR x <= limit;
        TRANS next(x) = x + 1;
        ",
    );

    // the invariant caps the counter at the constant's value, so the
    // run deadlocks after reaching it
    let outcome = simulate(&ctx, &model, None, &[], 5, "sim".into()).unwrap();
    assert_eq!(outcome.status, SimStatus::Deadlocked);
    let witness = outcome.witness.unwrap();
    assert_eq!(witness.last_time(), 2);
    assert_eq!(frame_value(&ctx, &witness, "x", 2), "2");

    // constants resolve in property position too
    let property = parse_expression(&ctx, "x <= limit").unwrap();
    let outcome = verify(&ctx, &model, property, 3, "cex".into()).unwrap();
    assert_ne!(outcome.status, McStatus::Reachable);
}

#[test]
fn fused_ite_chain_selects_by_priority() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    // an algebraic chain: branches over variables keep it out of the
    // diagram-folding path, so the fused selection descriptor carries it
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(2);
            y : unsigned int(2);
        IVAR a : boolean;
            b : boolean;
        INIT x = 0;
        INIT y = 1;
        TRANS next(x) = a ? y : (b ? y + 1 : 3);
        ",
    );

    let mut compiler = Compiler::new(&ctx.pool, &ctx.tm, &model, &ctx.dd, &ctx.enc);
    let fsm = Fsm::compile(&ctx, &model, &mut compiler).unwrap();
    let mut engine = Engine::new(dir.path());
    let main = engine.main_group();
    fsm.assert_init(&ctx, &mut engine, 0, main).unwrap();
    fsm.assert_trans(&ctx, &mut engine, 0, main).unwrap();

    let mut holds = |prop: &str| -> bool {
        let parsed = parse_expression(&ctx, prop).unwrap();
        let violation = compiler
            .process(ctx.pool.empty_expr(), ctx.pool.make_not(parsed))
            .unwrap();
        let group = engine.new_group();
        sybil::algorithms::assert_formula(&ctx, &mut engine, &violation, 0, group)
            .unwrap();
        let unsat = engine.solve(&[]) == SolveResult::Unsat;
        engine.retire_group(group);
        unsat
    };

    // the first arm whose condition holds wins
    assert!(holds("a -> next(x) = y"));
    assert!(holds("(!a && b) -> next(x) = y + 1"));
    assert!(holds("(!a && !b) -> next(x) = 3"));
    // and the middle arm is genuinely on offer
    assert!(!holds("next(x) != 2"));
}

#[test]
fn temporal_properties_are_refused_by_verify() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(&ctx, COUNTER);
    let property = parse_expression(&ctx, "G (x <= 3)").unwrap();
    let err = verify(&ctx, &model, property, 3, "cex".into());
    assert!(matches!(err, Err(sybil::Error::TemporalUnsupported)));
}

#[test]
fn division_by_a_positive_constant() {
    let dir = microcode_dir();
    let ctx = Context::new().with_microcode_dir(dir.path());
    let model = load(
        &ctx,
        "
        MODULE main
        VAR x : unsigned int(3);
            y : unsigned int(3);
        INIT x = 7;
        INIT y = 2;
        ",
    );

    // 7 / 2 = 3 and 7 mod 2 = 1 hold in the unique initial state
    let property = parse_expression(&ctx, "x / y = 3 && x mod y = 1").unwrap();
    let outcome = verify(&ctx, &model, property, 0, "cex".into()).unwrap();
    assert_ne!(outcome.status, McStatus::Reachable);
}
