//! Typed GP CLI - Evolve an arithmetic expression from JSON configuration.

use std::path::PathBuf;

use typed_gp::{
    Objective, TypeRegistry,
    schema::SearchConfig,
    search::SearchEngine,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [target]", args[0]);
        eprintln!();
        eprintln!("Search for an expression over {{add, sub, mul, 1}} evaluating to target.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to search configuration file");
        eprintln!("  target       Integer to reach (default: 42)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let target: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(42);

    let config = SearchConfig::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    let mut registry = TypeRegistry::new();
    registry.declare_binary("add", ("Num", "Num"), "Num", |x: &i64, y: &i64| {
        x.saturating_add(*y)
    });
    registry.declare_binary("sub", ("Num", "Num"), "Num", |x: &i64, y: &i64| {
        x.saturating_sub(*y)
    });
    registry.declare_binary("mul", ("Num", "Num"), "Num", |x: &i64, y: &i64| {
        x.saturating_mul(*y)
    });
    registry.declare_constant("Num", 1i64);

    let objective = Objective::from_value("Num", move |value| {
        value
            .get::<i64>()
            .map_or(f64::NEG_INFINITY, |x| -(x.abs_diff(target) as f64))
    })
    .with_max_score(0.0);

    println!("Typed GP Search");
    println!("===============");
    println!("Target: {}", target);
    println!("Population: {}", config.population_size);
    println!("Iterations: {}", config.iterations);
    println!();

    let mut engine = SearchEngine::new(&registry, objective, config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let result = engine
        .run_with_callback(|stats| {
            println!(
                "  Iteration {}: best={:.2}, mean={:.2}, failures={}, size={:.1}",
                stats.generation + 1,
                stats.best_score,
                stats.mean_score,
                stats.failures,
                stats.mean_size
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("Best: {}", result.best);
    println!("Score: {:.2}", result.best_score);
    println!(
        "Stopped after {} iterations ({:?}) in {:.2}s",
        result.stats.generations, result.stats.stop_reason, result.stats.elapsed_seconds
    );
}

fn print_example_config() {
    let config = SearchConfig {
        random_seed: Some(0),
        ..Default::default()
    };

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
