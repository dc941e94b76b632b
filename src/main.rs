//! Tether - demo driver
//!
//! Builds both sides of a mission from a TOML plan, wires them over the
//! in-process loopback transport, and exposes a small REPL for issuing
//! commands and advancing ticks.

use clap::Parser;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tether::channel::{loopback, CommandSender, DispatchPump, ListenerRegistry};
use tether::core::config::ControlConfig;
use tether::core::error::Result;
use tether::core::types::{BodyId, Side};
use tether::handler::{HandlerRegistry, MissionBehaviourGraph};
use tether::mission::{MissionContext, MissionPlan};
use tether::motion::MotionFleet;
use tether::observation::ObservationRecord;
use tether::replication::{Inventory, ItemStack, RecipeBook, SlotRef};
use tether::reward::RewardAccumulator;

#[derive(Parser)]
#[command(name = "tether", about = "Mission control plane demo")]
struct Args {
    /// Mission plan to run
    #[arg(long, default_value = "missions/demo.toml")]
    plan: PathBuf,

    /// Body id of the demo participant
    #[arg(long, default_value = "agent-0")]
    body: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("tether=debug")
        .init();

    let args = Args::parse();
    let config = ControlConfig::default();
    if let Err(problem) = config.validate() {
        tracing::warn!("config problem: {problem}");
    }

    let plan = MissionPlan::load_from_toml(&args.plan)?;
    tracing::info!("mission plan {} loaded", plan.name);

    // Authoritative collaborators.
    let registry = Arc::new(ListenerRegistry::new());
    let inventory = Arc::new(Mutex::new(starter_inventory(&config)));
    let resolver = Arc::new(RecipeBook::with_defaults());
    let fleet = Arc::new(MotionFleet::new(
        config.inertia_ticks,
        config.max_angular_velocity,
    ));
    let body = BodyId::new(args.body.clone());
    fleet.attach(body.clone());

    // One ordered stream from the controlling to the authoritative side.
    let (transport, receiver) = loopback(config.channel_capacity);
    let sender = CommandSender::new(transport);
    let _pump = DispatchPump::spawn(receiver, registry.clone(), body.clone());

    let handler_registry = HandlerRegistry::with_defaults();
    let mut controlling_context = MissionContext::controlling(config.clone(), sender);
    let mut authoritative_context = MissionContext::authoritative(
        config,
        registry,
        inventory.clone(),
        resolver,
        fleet.clone(),
    );

    let mut controlling = MissionBehaviourGraph::build(
        &plan.handler_specs(Side::Controlling),
        Side::Controlling,
        &handler_registry,
    );
    let mut authoritative = MissionBehaviourGraph::build(
        &plan.handler_specs(Side::Authoritative),
        Side::Authoritative,
        &handler_registry,
    );
    for graph in [&controlling, &authoritative] {
        if !graph.report().is_empty() {
            println!("build report ({}):\n{}", graph.side(), graph.report());
        }
    }

    controlling.install_all(&mut controlling_context)?;
    authoritative.install_all(&mut authoritative_context)?;
    controlling.set_overriding(true);

    println!("\n=== TETHER ===");
    println!("Mission: {}", plan.name);
    println!();
    println!("Commands:");
    println!("  tick / t          - Advance one tick");
    println!("  run <n>           - Advance n ticks");
    println!("  obs               - Print the observation record");
    println!("  status / s        - Show body and inventory state");
    println!("  quit / q          - Exit");
    println!("  <verb> <value>    - Anything else goes to the command group");
    println!("                      (move 1, turn -0.5, craft planks, ...)");
    println!();

    let mut rewards = RewardAccumulator::new();
    let mut tick: u64 = 0;

    loop {
        print!("[tick {tick}] > ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        let ended = match line {
            "" => false,
            "quit" | "q" => break,
            "tick" | "t" => run_ticks(1, &mut tick, &mut controlling, &controlling_context, &fleet, &mut rewards),
            "obs" => {
                let mut record = ObservationRecord::new();
                controlling.write_observations(&mut record);
                println!("{}", record.into_value());
                false
            }
            "status" | "s" => {
                let local = controlling_context.local_body();
                let local = local.lock();
                println!(
                    "body: velocity {:.3} yaw {:.1} pitch {:.1}",
                    local.velocity, local.yaw, local.pitch
                );
                let inventory = inventory.lock();
                for item in ["log", "planks", "stick", "iron_ore", "iron_ingot", "coal"] {
                    let count = inventory.count_of(item);
                    if count > 0 {
                        println!("  {item}: {count}");
                    }
                }
                false
            }
            run if run.starts_with("run ") => match run[4..].trim().parse::<u64>() {
                Ok(count) => run_ticks(count, &mut tick, &mut controlling, &controlling_context, &fleet, &mut rewards),
                Err(_) => {
                    println!("usage: run <ticks>");
                    false
                }
            },
            command => {
                let (verb, value) = command.split_once(' ').unwrap_or((command, ""));
                if controlling.execute(verb, value.trim()) {
                    println!("ok");
                } else {
                    println!("no handler accepted {verb:?}");
                }
                false
            }
        };

        if ended {
            break;
        }
    }

    let collected = rewards.drain();
    if !collected.is_empty() {
        println!("rewards: {collected:?}");
    }

    controlling.deinstall_all(&mut controlling_context);
    authoritative.deinstall_all(&mut authoritative_context);
    Ok(())
}

fn run_ticks(
    count: u64,
    tick: &mut u64,
    controlling: &mut MissionBehaviourGraph,
    controlling_context: &MissionContext,
    fleet: &Arc<MotionFleet>,
    rewards: &mut RewardAccumulator,
) -> bool {
    for _ in 0..count {
        *tick += 1;
        let now = Instant::now();
        controlling_context.local_body().lock().advance(now);
        fleet.advance_all(now);
        controlling.collect_rewards(rewards);
        if let Some(end) = controlling.check_completion() {
            println!("mission over: {}", end.outcome);
            return true;
        }
    }
    false
}

fn starter_inventory(config: &ControlConfig) -> Inventory {
    let mut inventory = Inventory::new(config.stack_limit);
    inventory.add_container("inventory", 9);
    inventory.add_container("chest", 9);
    inventory.set_slot(&SlotRef::new("inventory", 0), Some(ItemStack::new("log", 4)));
    inventory.set_slot(&SlotRef::new("inventory", 1), Some(ItemStack::new("iron_ore", 2)));
    inventory.set_slot(&SlotRef::new("inventory", 2), Some(ItemStack::new("coal", 8)));
    inventory.set_slot(&SlotRef::new("chest", 0), Some(ItemStack::new("gold", 1)));
    inventory
}
