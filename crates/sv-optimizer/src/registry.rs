//! Name-keyed factories for strategies and terminators.

use serde::de::DeserializeOwned;
use serde_json::Value;

use sv_types::{SearchError, SearchSpace, SvResult};

use crate::strategy::{
    DesignPoints, ExhaustiveSearch, GridSearch, RandomSearch, RecursiveElimination,
    SearchStrategy, SequentialSelection,
};
use crate::terminator::Terminator;

type StrategyCtor = fn(&SearchSpace, Value) -> SvResult<Box<dyn SearchStrategy>>;
type TerminatorCtor = fn(Value) -> SvResult<Terminator>;

/// Every strategy that can be built by name.
pub const STRATEGIES: &[(&str, StrategyCtor)] = &[
    ("random_search", random_search),
    ("grid_search", grid_search),
    ("exhaustive_search", exhaustive_search),
    ("design_points", design_points),
    ("sequential", sequential),
    ("rfe", rfe),
];

/// Every terminator that can be built by name.
pub const TERMINATORS: &[(&str, TerminatorCtor)] = &[
    ("evals", evals),
    ("run_time", run_time),
    ("clock_time", clock_time),
    ("model_time", model_time),
    ("perf_reached", perf_reached),
    ("stagnation", stagnation),
    ("stagnation_batch", stagnation_batch),
    ("combo", combo),
    ("none", none),
];

/// Build a strategy from its registry key and JSON parameters.
pub fn strategy(key: &str, params: Value, space: &SearchSpace) -> SvResult<Box<dyn SearchStrategy>> {
    let (_, ctor) = STRATEGIES
        .iter()
        .find(|(k, _)| *k == key)
        .ok_or_else(|| unknown("strategy", key))?;
    ctor(space, params)
}

/// Build a terminator from its registry key and JSON parameters.
pub fn terminator(key: &str, params: Value) -> SvResult<Terminator> {
    let (_, ctor) = TERMINATORS
        .iter()
        .find(|(k, _)| *k == key)
        .ok_or_else(|| unknown("terminator", key))?;
    ctor(params)
}

pub fn strategy_keys() -> Vec<&'static str> {
    STRATEGIES.iter().map(|(k, _)| *k).collect()
}

pub fn terminator_keys() -> Vec<&'static str> {
    TERMINATORS.iter().map(|(k, _)| *k).collect()
}

fn unknown(registry: &str, key: &str) -> sv_types::SvError {
    SearchError::UnknownKey {
        registry: registry.to_string(),
        key: key.to_string(),
    }
    .into()
}

/// `null` means "all defaults".
fn parse<T: DeserializeOwned>(params: Value) -> SvResult<T> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    Ok(serde_json::from_value(params)?)
}

fn random_search(_space: &SearchSpace, params: Value) -> SvResult<Box<dyn SearchStrategy>> {
    Ok(Box::new(RandomSearch::new(parse(params)?)?))
}

fn grid_search(space: &SearchSpace, params: Value) -> SvResult<Box<dyn SearchStrategy>> {
    Ok(Box::new(GridSearch::new(space, parse(params)?)?))
}

fn exhaustive_search(space: &SearchSpace, params: Value) -> SvResult<Box<dyn SearchStrategy>> {
    Ok(Box::new(ExhaustiveSearch::new(space, parse(params)?)?))
}

fn design_points(_space: &SearchSpace, params: Value) -> SvResult<Box<dyn SearchStrategy>> {
    Ok(Box::new(DesignPoints::new(parse(params)?)?))
}

fn sequential(space: &SearchSpace, params: Value) -> SvResult<Box<dyn SearchStrategy>> {
    Ok(Box::new(SequentialSelection::new(space, parse(params)?)?))
}

fn rfe(space: &SearchSpace, params: Value) -> SvResult<Box<dyn SearchStrategy>> {
    Ok(Box::new(RecursiveElimination::new(space, parse(params)?)?))
}

fn evals(params: Value) -> SvResult<Terminator> {
    parse(params).map(Terminator::Evals)
}

fn run_time(params: Value) -> SvResult<Terminator> {
    parse(params).map(Terminator::RunTime)
}

fn clock_time(params: Value) -> SvResult<Terminator> {
    parse(params).map(Terminator::ClockTime)
}

fn model_time(params: Value) -> SvResult<Terminator> {
    parse(params).map(Terminator::ModelTime)
}

fn perf_reached(params: Value) -> SvResult<Terminator> {
    parse(params).map(Terminator::PerfReached)
}

fn stagnation(params: Value) -> SvResult<Terminator> {
    parse(params).map(Terminator::Stagnation)
}

fn stagnation_batch(params: Value) -> SvResult<Terminator> {
    parse(params).map(Terminator::StagnationBatch)
}

fn combo(params: Value) -> SvResult<Terminator> {
    parse(params).map(Terminator::Combo)
}

fn none(_params: Value) -> SvResult<Terminator> {
    Ok(Terminator::None)
}
