use std::rc::Rc;

use clap::{Parser, ValueEnum};
use log::info;

use bdd_fsm::bdd::{Bdd, BddConfig};
use bdd_fsm::enc::BddEnc;
use bdd_fsm::expr::{BinOp, Expr};
use bdd_fsm::fsm::{FsmBuilder, FsmConfig};
use bdd_fsm::reorder::ReorderMethod;
use bdd_fsm::symbols::VarType;
use bdd_fsm::trans::{PartitionMethod, TransConfig};

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Partition {
    Monolithic,
    Threshold,
    Iwls95,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of counters.
    #[arg(value_name = "INT", default_value = "4")]
    n: usize,

    /// Each counter ranges over `0..=max`.
    #[arg(long, value_name = "INT", default_value = "5")]
    max: i64,

    /// Transition relation partitioning.
    #[arg(long, value_enum, default_value = "iwls95")]
    partition: Partition,

    /// Cluster size limit, in nodes.
    #[arg(long, value_name = "INT", default_value = "1000")]
    threshold: usize,

    /// Enable automatic variable reordering.
    #[arg(long)]
    reorder: bool,

    /// Restrict the fairness computation to reachable states.
    #[arg(long)]
    prune: bool,
}

/// `n` counters, one of which (chosen by input `sel`) steps modulo
/// `max + 1` at every step; every counter must return to 0 infinitely often.
fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mut config = BddConfig::default();
    if args.reorder {
        config = config.with_auto_reorder(ReorderMethod::GroupSift);
    }
    let bdd = Rc::new(Bdd::new(config));
    let mut enc = BddEnc::new(&bdd);

    let n = args.n as i64;
    enc.declare_input_variable("sel", VarType::Range(0, n - 1))?;
    let names: Vec<String> = (0..args.n).map(|i| format!("c{}", i)).collect();
    for name in &names {
        enc.declare_state_variable(name, VarType::Range(0, args.max))?;
    }

    let mut builder = FsmBuilder::new(&mut enc);
    for (i, name) in names.iter().enumerate() {
        let c = Expr::atom(name);
        let step = Expr::binary(
            BinOp::Mod,
            Expr::binary(BinOp::Plus, c.clone(), Expr::number(1)),
            Expr::number(args.max + 1),
        );
        let chosen = Expr::eq(Expr::atom("sel"), Expr::number(i as i64));
        builder = builder
            .init(Expr::eq(c.clone(), Expr::number(0)))
            .assign(Expr::assign(Expr::next(c.clone()), Expr::ite(chosen, step, c.clone())))
            .justice(Expr::eq(c, Expr::number(0)));
    }

    let partition = match args.partition {
        Partition::Monolithic => PartitionMethod::Monolithic,
        Partition::Threshold => PartitionMethod::Threshold(args.threshold),
        Partition::Iwls95 => PartitionMethod::Iwls95,
    };
    let trans_config = TransConfig::default()
        .with_partition(partition)
        .with_cluster_threshold(args.threshold);
    let fsm_config = FsmConfig::default().with_prune_fairness_with_reachable(args.prune);
    let fsm = builder.build(trans_config, fsm_config)?;
    println!("clusters = {}", fsm.trans().clusters().len());

    let time_reach = std::time::Instant::now();
    let reachable = fsm.reachable_states();
    println!(
        "reachable states = {} (diameter {}) in {:.3}s",
        fsm.count_states(reachable),
        fsm.diameter(),
        time_reach.elapsed().as_secs_f64()
    );
    println!("deadlock free = {}", fsm.is_deadlock_free());

    let time_fair = std::time::Instant::now();
    let fair = fsm.fair_states();
    println!(
        "fair states = {} in {:.3}s",
        fsm.count_states(fair),
        time_fair.elapsed().as_secs_f64()
    );

    let report = fsm.check_emptiness();
    if !report.is_clean() {
        println!("emptiness = {:?}", report);
    }

    info!("Variable order: {:?}", enc.ordering());
    println!("bdd = {:?}", bdd);

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.3}s", time_total.as_secs_f64());

    Ok(())
}
