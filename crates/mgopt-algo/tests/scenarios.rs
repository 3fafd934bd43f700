//! End-to-end horizons solved with the Clarabel backend.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use mgopt_algo::{
    ClarabelBackend, HorizonContext, HorizonInputs, HorizonModel, HorizonState, MemorySink,
    PreparedPlant, RecedingHorizon, SolveStatus, Solution, SolverBackend, TableForecast, Topology,
    VoltageEstimate,
};
use mgopt_core::{
    Component, DispatchConfig, EfficiencyCurve, EnergyCarrier, Generator, Kilowatts,
    LineSpec, NetworkNode, Plant, Storage, SubNetwork, UtilityGrid,
};
use std::collections::HashMap;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2011, 7, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
}

fn electric_node(name: &str, load: Option<&str>, connections: &[&str]) -> NetworkNode {
    NetworkNode::new(name).with_sub_network(
        EnergyCarrier::Electric,
        SubNetwork {
            load: load.map(str::to_string),
            connections: connections.iter().map(|c| c.to_string()).collect(),
        },
    )
}

fn grid(node: &str, size: f64) -> Component {
    Component::UtilityGrid(UtilityGrid {
        name: "utility".into(),
        node: node.into(),
        size_kw: Kilowatts(size),
        sellback: false,
    })
}

fn generator(name: &str, size: f64, ramp: f64, initial: f64) -> Generator {
    Generator {
        name: name.into(),
        node: "A".into(),
        size_kw: Kilowatts(size),
        ramp_rate_kw: Kilowatts(ramp),
        curve: EfficiencyCurve::new(vec![(0.1, 0.3), (1.0, 0.4)]),
        heat_recovery: 0.5,
        initial_output_kw: Some(Kilowatts(initial)),
    }
}

fn config(steps: usize) -> DispatchConfig {
    let mut cfg = DispatchConfig::default();
    cfg.horizon.steps = steps;
    cfg.horizon.segments = 2;
    cfg
}

/// Hourly table with one electric load at `A` and the three price series.
fn forecast(cfg: &DispatchConfig, demand_kw: &[f64], utility: &[f64]) -> TableForecast {
    let stamps = (0..demand_kw.len() as i64)
        .map(|h| start() + Duration::hours(h))
        .collect();
    TableForecast::new(stamps, cfg.bases.clone())
        .with_column("electric:A", demand_kw.to_vec())
        .with_column("utility_price", utility.to_vec())
        .with_column("gas_price", vec![0.0; demand_kw.len()])
        .with_column("diesel_price", vec![0.0; demand_kw.len()])
}

struct Solved {
    model: HorizonModel,
    solution: Solution,
    rows: HashMap<(usize, String), f64>,
}

/// Builds and solves the first horizon directly, bypassing the driver.
fn solve_once(plant: &Plant, cfg: &DispatchConfig, table: &TableForecast) -> Solved {
    let prepared = PreparedPlant::prepare(plant, cfg).unwrap();
    let topology = Topology::build(plant, &prepared, cfg).unwrap();
    let dates: Vec<_> = (0..cfg.horizon.steps as i64)
        .map(|t| start() + Duration::hours(t))
        .collect();
    let inputs = HorizonInputs::gather(table, &topology, &[], &dates).unwrap();
    let voltage = VoltageEstimate::uniform(
        topology.electric_nodes.len(),
        cfg.horizon.steps,
        cfg.voltage.upper_squared(),
    );
    let state = HorizonState::initial(&prepared);
    let ctx = HorizonContext {
        prepared: &prepared,
        topology: &topology,
        config: cfg,
        inputs: &inputs,
        voltage: &voltage,
        state: &state,
    };
    let model = HorizonModel::build(&ctx).unwrap();
    let solution = ClarabelBackend::new(cfg.solver.clone())
        .solve(model.problem())
        .unwrap();
    let rows = if solution.is_optimal() {
        model
            .rows(&solution)
            .map(|(t, label, value)| ((t, label.to_string()), value))
            .collect()
    } else {
        HashMap::new()
    };
    Solved {
        model,
        solution,
        rows,
    }
}

impl Solved {
    fn at(&self, t: usize, label: &str) -> f64 {
        self.rows[&(t, label.to_string())]
    }
}

#[test]
fn isolated_node_balances_and_prices_import() {
    let cfg = config(3);
    let plant = Plant {
        name: "isolated".into(),
        components: vec![
            grid("A", 2500.0),
            Component::Turbine(generator("gt1", 500.0, 500.0, 250.0)),
        ],
        nodes: vec![electric_node("A", Some("A"), &[])],
        lines: vec![],
    };
    let table = forecast(&cfg, &[1250.0; 3], &[0.1; 3]);
    let solved = solve_once(&plant, &cfg, &table);
    assert_eq!(solved.solution.status, SolveStatus::Optimal);

    let mut import_cost = 0.0;
    for t in 0..3 {
        let turbine = solved.at(t, "gt1.output_kw");
        let import = solved.at(t, "utility.import_kw");
        assert!(
            (turbine + import - 1250.0).abs() < 1e-3,
            "step {t}: {turbine} + {import} != 1250"
        );
        // Free fuel: the turbine runs flat out and the grid covers the rest.
        assert!((turbine - 500.0).abs() < 1e-2, "turbine at {turbine}");
        let import_q = solved.at(t, "utility.import_kvar");
        import_cost += 0.1 * (import + cfg.reactive.import_price_multiplier * import_q);
    }
    assert!((import_cost - 225.0).abs() < 0.1, "cost {import_cost}");
    assert!(
        (solved.solution.objective - import_cost).abs() < 1e-3 * import_cost,
        "objective {} vs {import_cost}",
        solved.solution.objective
    );
}

fn turbine_only_plant() -> Plant {
    Plant {
        name: "no-heat-load".into(),
        components: vec![
            grid("A", 2500.0),
            Component::Turbine(generator("gt1", 500.0, 500.0, 250.0)),
        ],
        nodes: vec![electric_node("A", Some("A"), &[])],
        lines: vec![],
    }
}

#[test]
fn turbine_without_heat_load_runs_under_default_config() {
    let cfg = config(2);
    assert!(cfg.slack.allow_dumping);
    let table = forecast(&cfg, &[1250.0; 2], &[1.0; 2]);
    let solved = solve_once(&turbine_only_plant(), &cfg, &table);
    assert_eq!(solved.solution.status, SolveStatus::Optimal);
    for t in 0..2 {
        let turbine = solved.at(t, "gt1.output_kw");
        assert!((turbine - 500.0).abs() < 1e-2, "step {t}: turbine at {turbine}");
        let import = solved.at(t, "utility.import_kw");
        assert!((import - 750.0).abs() < 1e-2, "step {t}: import {import}");
    }
}

#[test]
fn pinned_heat_dump_idles_turbine_without_heat_load() {
    let mut cfg = config(2);
    cfg.slack.allow_dumping = false;
    let table = forecast(&cfg, &[1250.0; 2], &[1.0; 2]);
    let solved = solve_once(&turbine_only_plant(), &cfg, &table);
    assert_eq!(solved.solution.status, SolveStatus::Optimal);
    for t in 0..2 {
        assert!(solved.at(t, "gt1.output_kw").abs() < 1e-2);
    }
}

#[test]
fn turbine_ramps_up_from_cold_start() {
    let cfg = config(4);
    let plant = Plant {
        name: "ramp".into(),
        components: vec![
            grid("A", 2500.0),
            Component::Turbine(generator("gt1", 2500.0, 250.0, 0.0)),
        ],
        nodes: vec![electric_node("A", Some("A"), &[])],
        lines: vec![],
    };
    let table = forecast(&cfg, &[2000.0; 4], &[1.0; 4]);
    let solved = solve_once(&plant, &cfg, &table);
    assert_eq!(solved.solution.status, SolveStatus::Optimal);

    let outputs: Vec<f64> = (0..4).map(|t| solved.at(t, "gt1.output_kw")).collect();
    assert!(outputs[0] <= 250.0 + 1e-3, "first step {}", outputs[0]);
    for pair in outputs.windows(2) {
        assert!(pair[1] - pair[0] <= 250.0 + 1e-3, "{outputs:?}");
        assert!(pair[0] - pair[1] <= 250.0 + 1e-3, "{outputs:?}");
    }
    assert!(outputs[3] > 990.0, "{outputs:?}");
}

#[test]
fn storage_follows_charge_law_and_returns_to_start() {
    let cfg = config(4);
    let plant = Plant {
        name: "storage".into(),
        components: vec![
            grid("A", 2500.0),
            Component::ElectricStorage(Storage {
                name: "es1".into(),
                node: "A".into(),
                size_kw: Kilowatts(1000.0),
                charge_efficiency: 0.95,
                discharge_efficiency: 0.95,
                peak_charge: 0.25,
                peak_discharge: 0.25,
                min_state_fraction: 0.0,
                initial_state_kw: Some(Kilowatts(500.0)),
            }),
        ],
        nodes: vec![electric_node("A", Some("A"), &[])],
        lines: vec![],
    };
    let table = forecast(&cfg, &[500.0; 4], &[0.05, 0.05, 0.30, 0.30]);
    let solved = solve_once(&plant, &cfg, &table);
    assert_eq!(solved.solution.status, SolveStatus::Optimal);

    let mut previous = 500.0;
    for t in 0..4 {
        let charge = solved.at(t, "es1.charge_kw");
        let discharge = solved.at(t, "es1.discharge_kw");
        let state = solved.at(t, "es1.state_kw");
        let expected = previous + 0.95 * charge - discharge / 0.95;
        assert!((state - expected).abs() < 1e-3, "step {t}: {state} vs {expected}");
        previous = state;
    }
    assert!((previous - 500.0).abs() < 1e-3, "final state {previous}");
    assert!(solved.at(0, "es1.charge_kw") > 50.0);
    assert!(solved.at(3, "es1.discharge_kw") > 50.0);

    let carried = solved.model.carried_state(&solved.solution);
    assert!((carried.electric_storage[0] - solved.at(0, "es1.state_kw") / 2500.0).abs() < 1e-9);
}

#[test]
fn undersized_grid_is_reported_infeasible() {
    let cfg = config(2);
    let plant = Plant {
        name: "short".into(),
        components: vec![grid("A", 500.0)],
        nodes: vec![electric_node("A", Some("A"), &[])],
        lines: vec![],
    };
    let table = forecast(&cfg, &[1000.0, 1000.0], &[0.1, 0.1]);
    let solved = solve_once(&plant, &cfg, &table);
    assert_eq!(solved.solution.status, SolveStatus::Infeasible);
}

#[test]
fn unserved_demand_is_penalized_when_allowed() {
    let mut cfg = config(2);
    cfg.slack.allow_unserved = true;
    let plant = Plant {
        name: "short".into(),
        components: vec![grid("A", 500.0)],
        nodes: vec![electric_node("A", Some("A"), &[])],
        lines: vec![],
    };
    let table = forecast(&cfg, &[1000.0, 1000.0], &[0.1, 0.1]);
    let solved = solve_once(&plant, &cfg, &table);
    assert_eq!(solved.solution.status, SolveStatus::Optimal);
    for t in 0..2 {
        assert!((solved.at(t, "A.unserved_electric_kw") - 500.0).abs() < 1e-2);
    }
}

#[test]
fn two_node_feeder_runs_through_the_driver() {
    let mut cfg = config(2);
    cfg.horizon.horizons = 2;
    let plant = Plant {
        name: "feeder".into(),
        components: vec![grid("A", 2500.0)],
        nodes: vec![
            electric_node("A", None, &["B"]),
            electric_node("B", Some("A"), &["A"]),
        ],
        lines: vec![LineSpec {
            from: "A".into(),
            to: Some("B".into()),
            length_ft: 500.0,
            conductor: "350kcmil".into(),
            scale: 1.0,
        }],
    };
    let table = forecast(&cfg, &[300.0, 320.0, 340.0], &[0.1, 0.1, 0.1]);
    let prepared = PreparedPlant::prepare(&plant, &cfg).unwrap();
    let topology = Topology::build(&plant, &prepared, &cfg).unwrap();
    let backend = ClarabelBackend::new(cfg.solver.clone());
    let mut sink = MemorySink::new();
    let mut driver = RecedingHorizon::new(&prepared, &topology, &cfg, &table, &backend, start());
    let run = driver.run(cfg.horizon.horizons, &mut sink).unwrap();

    assert_eq!(run.horizons.len(), 2);
    assert_eq!(run.failed(), 0);
    for report in &run.horizons {
        assert!(report.iterations >= 1 && report.iterations <= cfg.voltage.max_iterations);
    }
    assert_eq!(driver.start(), start() + Duration::hours(2));

    let lower = cfg.voltage.lower_squared() - 1e-6;
    let upper = cfg.voltage.upper_squared() + 1e-6;
    for node in ["A", "B"] {
        for (_, v) in sink.series(&format!("{node}.voltage_sq_pu")) {
            assert!(v >= lower && v <= upper, "{node}: {v}");
        }
    }
    assert_eq!(sink.series("utility.import_kw").len(), 4);
    assert_eq!(sink.reports.len(), 2);
}
