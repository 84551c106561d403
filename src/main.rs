mod election;

use election::{spawn_simulation, InstanceId, Simulation};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber with environment-based filtering
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bully_sim=info".parse()?),
        )
        .init();

    info!("🚀 Bully election simulation starting...");

    // Fixed membership for the run: five instances, leader bootstraps to 1
    let instance_ids: Vec<InstanceId> = vec![1, 2, 3, 4, 5];
    let simulation = spawn_simulation(&instance_ids).await;
    info!("✅ Simulation spawned with instances {:?}", instance_ids);

    // Scripted demo: elect the highest id, kill it, watch the re-election
    run_demo_scenario(&simulation).await?;

    print_help();

    // Setup graceful shutdown handler
    let shutdown_signal = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        warn!("🛑 Received Ctrl+C, shutting down...");
    };

    // Interactive console for crash/recovery injection and re-triggers
    let cli_handler = async {
        let stdin = tokio::io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if !run_command(&simulation, line.trim()) {
                        break;
                    }
                }
                Ok(None) => {
                    warn!("📜 EOF reached, waiting for Ctrl+C");
                    loop {
                        sleep(Duration::from_secs(10)).await;
                    }
                }
                Err(e) => {
                    warn!("Error reading input: {}", e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = shutdown_signal => {}
        _ = cli_handler => {
            warn!("🏁 Console closed");
        }
    }

    warn!("⏹️  Shutting down simulation...");
    simulation.shutdown();
    Ok(())
}

/// Reproduces the classic scenario: all instances alive, the highest id wins
/// an election, then crashes, and the next-highest detects the failure via a
/// heartbeat probe and takes over.
async fn run_demo_scenario(simulation: &Simulation) -> Result<(), Box<dyn std::error::Error>> {
    info!("🗳️  Triggering the initial election");
    simulation.trigger_election(1)?;
    sleep(Duration::from_millis(500)).await;

    let leader = simulation.current_leader(1)?;
    info!("👑 Converged on leader {}", leader);

    warn!("💥 Crashing leader {}", leader);
    simulation.set_alive(leader, false)?;
    simulation.trigger_heartbeat(4)?;
    sleep(Duration::from_millis(500)).await;

    info!(
        "👑 New leader after failure: {}",
        simulation.current_leader(4)?
    );
    Ok(())
}

/// Executes one console command; returns false when the console should exit
fn run_command(simulation: &Simulation, line: &str) -> bool {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [] => true,
        ["kill", id] => {
            report(parse_id(id).and_then(|id| simulation.set_alive(id, false)));
            true
        }
        ["revive", id] => {
            report(parse_id(id).and_then(|id| simulation.set_alive(id, true)));
            true
        }
        ["heartbeat", id] => {
            report(parse_id(id).and_then(|id| simulation.trigger_heartbeat(id)));
            true
        }
        ["election", id] => {
            report(parse_id(id).and_then(|id| simulation.trigger_election(id)));
            true
        }
        ["leader", id] => {
            match parse_id(id).and_then(|id| simulation.current_leader(id)) {
                Ok(leader) => println!("instance {id} believes leader is {leader}"),
                Err(e) => println!("error: {e}"),
            }
            true
        }
        ["status"] => {
            println!("📊 Simulation status:");
            for (id, alive) in simulation.router().liveness_snapshot() {
                let leader = simulation
                    .current_leader(id)
                    .map(|l| l.to_string())
                    .unwrap_or_else(|e| e.to_string());
                let liveness = if alive { "alive" } else { "crashed" };
                println!("   instance {id}: {liveness}, believes leader {leader}");
            }
            true
        }
        ["help"] => {
            print_help();
            true
        }
        ["quit"] | ["exit"] => {
            warn!("🔚 Exiting...");
            false
        }
        _ => {
            println!("Unknown command: '{line}'. Type 'help' for available commands.");
            true
        }
    }
}

fn parse_id(raw: &str) -> Result<InstanceId, election::ElectionError> {
    raw.parse()
        .map_err(|_| election::ElectionError::MalformedContent(raw.to_string()))
}

fn report(result: Result<(), election::ElectionError>) {
    if let Err(e) = result {
        println!("error: {e}");
    }
}

fn print_help() {
    println!("\n=== Bully Election Interactive Console ===");
    println!("Commands:");
    println!("  kill <id>       - Crash an instance");
    println!("  revive <id>     - Recover an instance");
    println!("  heartbeat <id>  - Trigger a heartbeat check on an instance");
    println!("  election <id>   - Trigger an election on an instance");
    println!("  leader <id>     - Show which leader an instance believes in");
    println!("  status          - Show liveness and believed leaders");
    println!("  help            - Show this help message");
    println!("  quit            - Shutdown and exit");
    println!("  Ctrl+C          - Force shutdown");
    println!("==========================================\n");
}
