//! seedstate CLI - drive the Seed State Engine from the shell.
//!
//! Commands:
//!   seedstate register   - register an application topology
//!   seedstate apps       - list registered applications
//!   seedstate activate   - create an instance for an application
//!   seedstate list       - list instances
//!   seedstate apply      - apply a multiply/divide delta to an instance
//!   seedstate seed       - print an instance's current seed
//!   seedstate facts      - print the factorized facts of an instance
//!   seedstate ledger     - print an instance's delta ledger
//!   seedstate verify     - checksum-chain and replay checks
//!   seedstate deactivate - cascade-remove an application's instances
//!   seedstate demo       - run a small end-to-end demo

use num_bigint::BigUint;
use seedstate_core::{
    EngineError, InstanceStore, MemoryInstanceStore, MemoryLedger, OperationKind, Provenance,
    SeedEngine, StaticRegistry, TopologyDescriptor,
};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

const APPS_FILE: &str = "seedstate-apps.json";
const INSTANCES_FILE: &str = "seedstate-instances.json";
const LEDGER_FILE: &str = "seedstate-ledger.json";

fn print_usage() {
    println!(
        r#"seedstate - prime-power seed state with an audited delta ledger

Usage: seedstate <command> [options]

Commands:
  register   <app-id> <node-id> [node-id...]       Register an application (chain topology)
  apps                                             List registered applications
  activate   <app-id>                              Create an instance (starts at seed 1)
  list                                             List instances
  apply      <instance-id> <multiply|divide> <magnitude> [role] [device]
  seed       <instance-id>                         Show the current seed
  facts      <instance-id>                         Show (prime, multiplicity) facts
  ledger     <instance-id>                         Show the delta ledger
  verify     <instance-id>                         Verify checksum chain and replay
  deactivate <app-id>                              Remove all instances of an application
  demo                                             Run an end-to-end demo

Examples:
  seedstate register invoicing home form summary
  seedstate activate invoicing
  seedstate apply <instance-id> multiply 6 owner tablet
  seedstate apply <instance-id> divide 3 owner tablet
  seedstate facts <instance-id>
"#
    );
}

struct Cli {
    registry: Arc<StaticRegistry>,
    store: Arc<MemoryInstanceStore>,
    ledger: Arc<MemoryLedger>,
    engine: SeedEngine,
}

impl Cli {
    fn open() -> Self {
        let registry = Arc::new(StaticRegistry::open(APPS_FILE));
        let store = Arc::new(MemoryInstanceStore::open(INSTANCES_FILE));
        let ledger = Arc::new(MemoryLedger::open(LEDGER_FILE));
        let engine = SeedEngine::new(store.clone(), ledger.clone(), registry.clone());
        Self {
            registry,
            store,
            ledger,
            engine,
        }
    }

    fn persist(&self) -> Result<(), EngineError> {
        self.registry.save()?;
        self.store.save()?;
        self.ledger.save()
    }
}

fn parse_magnitude(raw: &str) -> Result<BigUint, EngineError> {
    BigUint::from_str(raw)
        .map_err(|_| EngineError::InvalidRequest(format!("'{}' is not a decimal integer", raw)))
}

fn run(args: &[String]) -> Result<(), EngineError> {
    let cli = Cli::open();
    match args[0].as_str() {
        "register" if args.len() >= 3 => {
            let node_ids: Vec<&str> = args[2..].iter().map(String::as_str).collect();
            let descriptor = TopologyDescriptor::chain(&args[1], &node_ids);
            if !descriptor.validate() {
                return Err(EngineError::InvalidTopology(args[1].clone()));
            }
            cli.registry.register(descriptor);
            cli.persist()?;
            println!("Registered application '{}' with {} node(s)", args[1], node_ids.len());
        }
        "apps" => {
            let mut ids = cli.registry.application_ids();
            ids.sort();
            for id in ids {
                println!("{}", id);
            }
        }
        "activate" if args.len() == 2 => {
            let instance = cli.engine.activate(&args[1])?;
            cli.persist()?;
            println!("{}", instance.summary());
        }
        "list" => {
            for instance in cli.store.list() {
                println!("{}", instance.summary());
            }
        }
        "apply" if args.len() >= 4 => {
            let kind: OperationKind = args[2].parse()?;
            let magnitude = parse_magnitude(&args[3])?;
            let provenance = Provenance {
                role: args.get(4).cloned(),
                device: args.get(5).cloned(),
            };
            let seed = cli.engine.apply(&args[1], &magnitude, kind, provenance)?;
            cli.persist()?;
            println!("New seed: {}", seed);
        }
        "seed" if args.len() == 2 => {
            println!("{}", cli.engine.current_seed(&args[1])?);
        }
        "facts" if args.len() == 2 => {
            let facts = cli.engine.facts(&args[1])?;
            if facts.is_empty() {
                println!("(at rest)");
            }
            for fact in facts {
                println!("{}^{}", fact.prime, fact.multiplicity);
            }
        }
        "ledger" if args.len() == 2 => {
            for record in cli.engine.history(&args[1]) {
                println!(
                    "#{:<4} {} {:<8} {} by {} at {}",
                    record.sequence_id,
                    &record.checksum[..8],
                    record.kind,
                    record.magnitude,
                    record.provenance,
                    record.applied_at.to_rfc3339()
                );
            }
        }
        "verify" if args.len() == 2 => {
            let chain_ok = cli.engine.verify_ledger(&args[1]);
            let replay_ok = cli.engine.replay_check(&args[1])?;
            println!("checksum chain: {}", if chain_ok { "OK" } else { "BROKEN" });
            println!("replay matches seed: {}", if replay_ok { "OK" } else { "DIVERGED" });
            if !chain_ok || !replay_ok {
                return Err(EngineError::InvalidRequest(format!(
                    "instance {} needs reconciliation",
                    args[1]
                )));
            }
        }
        "deactivate" if args.len() == 2 => {
            let removed = cli.engine.deactivate_application(&args[1]);
            cli.persist()?;
            println!("Removed {} instance(s)", removed);
        }
        "demo" => {
            demo(&cli)?;
            cli.persist()?;
        }
        _ => {
            print_usage();
        }
    }
    Ok(())
}

fn demo(cli: &Cli) -> Result<(), EngineError> {
    println!("== register + activate ==");
    cli.registry
        .register(TopologyDescriptor::chain("demo-app", &["home", "form", "done"]));
    let instance = cli.engine.activate("demo-app")?;
    println!("{}", instance.summary());

    println!("\n== accumulate facts ==");
    for magnitude in [6u32, 35, 4] {
        let seed = cli.engine.apply(
            &instance.instance_id,
            &BigUint::from(magnitude),
            OperationKind::Multiply,
            Provenance::new("owner", "demo"),
        )?;
        println!("multiply {:<3} -> seed {}", magnitude, seed);
    }

    println!("\n== retire a fact ==");
    let seed = cli.engine.apply(
        &instance.instance_id,
        &BigUint::from(7u32),
        OperationKind::Divide,
        Provenance::new("owner", "demo"),
    )?;
    println!("divide 7    -> seed {}", seed);

    println!("\n== facts ==");
    for fact in cli.engine.facts(&instance.instance_id)? {
        println!("{}^{}", fact.prime, fact.multiplicity);
    }

    println!("\n== audit ==");
    println!("ledger rows: {}", cli.engine.history(&instance.instance_id).len());
    println!("checksum chain: {}", cli.engine.verify_ledger(&instance.instance_id));
    println!("replay matches: {}", cli.engine.replay_check(&instance.instance_id)?);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }
    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
