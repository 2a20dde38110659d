use std::sync::Arc;

use serde_json::json;
use sv_optimizer::*;
use sv_types::{Codomain, EvaluationError, Measure, SearchSpace};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sv_optimizer=info".parse()?))
        .init();

    println!("🌟 Sieve Quadratic Tuning Example");

    let space = SearchSpace::new()
        .add_float("x", -5.0, 5.0)
        .add_int("shift", 0, 3);

    // Minimum at x = 1.5, shift = 2
    let objective = FnObjective::new(
        Codomain::single(Measure::minimize("loss")),
        |c| -> Result<Vec<f64>, EvaluationError> {
            let x = c.get("x").and_then(|v| v.as_f64()).unwrap_or_default();
            let shift = c.get("shift").and_then(|v| v.as_i64()).unwrap_or_default() as f64;
            Ok(vec![(x - 1.5).powi(2) + (shift - 2.0).powi(2)])
        },
    );

    let config = SearchConfig::new(
        "quadratic",
        Terminator::any_of(vec![
            Terminator::evals(200),
            Terminator::stagnation_batch(5, 1e-4),
        ]),
    )
    .with_strategy("random_search", json!({"batch_size": 10, "seed": 7}));
    println!("Config:\n{}", config.to_json()?);

    let (instance, outcome) = tune(&config, space, Arc::new(objective))?;
    println!(
        "Stopped ({}) after {} evaluations in {} batches",
        outcome.reason, outcome.n_evals, outcome.n_batch
    );
    if let Some(result) = &outcome.result {
        let best = result.first();
        println!("Best candidate {} with loss {:.4}", best.candidate, best.scores[0]);
    }

    let dir = std::env::temp_dir().join("sieve_quadratic.parquet");
    write_parquet(instance.archive(), instance.space(), &dir)?;
    println!("Archive written to {}", dir.display());

    Ok(())
}
