//! Swarmgrid CLI - solve a grid puzzle task from a JSON file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use swarmgrid::{
    compute::Solver,
    schema::{SolverConfig, Task},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <task.json>", args[0]);
        eprintln!();
        eprintln!("Solve a grid transformation puzzle from a JSON task file.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  task.json  Task with \"train\" pairs and \"test\" inputs");
        eprintln!();
        eprintln!("A sibling task.config.json overrides the default solver");
        eprintln!("configuration; print one with --example.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example();
        return;
    }

    let task_path = PathBuf::from(&args[1]);
    let task_str = fs::read_to_string(&task_path).unwrap_or_else(|e| {
        eprintln!("Error reading task file: {}", e);
        std::process::exit(1);
    });
    let task: Task = serde_json::from_str(&task_str).unwrap_or_else(|e| {
        eprintln!("Error parsing task: {}", e);
        std::process::exit(1);
    });

    let config_path = task_path.with_extension("config.json");
    let config: SolverConfig = if config_path.exists() {
        let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
            eprintln!("Error reading config file: {}", e);
            std::process::exit(1);
        });
        serde_json::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Error parsing config: {}", e);
            std::process::exit(1);
        })
    } else {
        SolverConfig::default()
    };

    println!("Swarmgrid Solver");
    println!("================");
    println!("Training pairs: {}", task.training_examples.len());
    println!("Test inputs: {}", task.test_examples.len());
    println!("Cycle budget: {}", config.cycle_budget);
    println!();

    let mut solver = Solver::new(config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let start = Instant::now();
    let outcome = solver.solve(&task);
    let elapsed = start.elapsed();

    println!("Prediction:");
    for y in 0..outcome.prediction.height() as i32 {
        let row: Vec<String> = (0..outcome.prediction.width() as i32)
            .map(|x| outcome.prediction.get(x, y).to_string())
            .collect();
        println!("  {}", row.join(" "));
    }
    println!();
    println!("Cycles used: {}", outcome.cycles);
    println!(
        "Source: {}",
        if outcome.rules.is_empty() {
            "identity (no rule found)"
        } else if outcome.fallback_used {
            "transformation engine"
        } else {
            "particle simulation"
        }
    );
    for rule in &outcome.rules {
        println!("  rule: {}", rule);
    }
    println!("Confidence: {:.2}", outcome.confidence);
    println!("Time: {:.3}s", elapsed.as_secs_f32());
}

fn print_example() {
    let config = SolverConfig::default();
    println!("Example solver configuration (task.config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
