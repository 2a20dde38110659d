use sv_types::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🌟 Sieve Basic Usage Example");

    // A mixed space with one dependent parameter
    let space = SearchSpace::new()
        .add_categorical("kernel", ["linear", "rbf"])
        .add_float("gamma", 1e-3, 1.0)
        .add_int("degree", 1, 4)
        .with_condition("gamma", Condition::equals("kernel", "rbf"));
    space.validate()?;
    println!("Created space with {} parameters: {:?}", space.dim(), space.ids());

    let rbf = Candidate::new()
        .with("kernel", "rbf")
        .with("gamma", 0.1)
        .with("degree", 2i64);
    space.check(&rbf)?;
    println!("Valid candidate: {}", rbf);

    // gamma is only active for the rbf kernel
    let linear = Candidate::new()
        .with("kernel", "linear")
        .with("gamma", 0.1)
        .with("degree", 2i64);
    match space.check(&linear) {
        Ok(()) => println!("Unexpectedly valid: {}", linear),
        Err(err) => println!("Rejected {}: {}", linear, err),
    }
    println!("Pruned: {}", space.prune_inactive(&linear));

    // Feature subsets are boolean spaces
    let features = SearchSpace::features(&["age", "income", "tenure"]);
    let subset = Candidate::from_features(&features.ids(), &["income"]);
    features.check(&subset)?;
    println!("Feature subset {} selects {:?}", subset, subset.selected_features());

    // Two measures pulling in opposite directions
    let codomain = Codomain::new(vec![
        Measure::minimize("classif.ce").with_worst(1.0),
        Measure::maximize("classif.auc").with_worst(0.0),
    ])?;
    println!(
        "Codomain with {} measures, primary '{}'",
        codomain.len(),
        codomain.primary().id
    );
    println!(
        "[0.10, 0.90] dominates [0.20, 0.85]: {}",
        codomain.dominates(&[0.10, 0.90], &[0.20, 0.85])
    );

    println!("✅ Basic usage example completed successfully!");
    Ok(())
}
