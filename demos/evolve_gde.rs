//! Forward simulation of a size distribution under condensation, deposition and Brownian
//! coagulation. Writes the reconstructed distribution at a few times to
//! `data/evolve_gde.json`.
use aerosol_gde::config::{GdeConfig, ScaleType};
use aerosol_gde::estimation::evolve;
use aerosol_gde::model::{CoagulationSource, GdeModelBuilder, Target};
use aerosol_gde::physics::{gaussian, FuchsBrownian};
use aerosol_gde::rate::{stationary, time_dependent, Process};
use serde::Serialize;
use std::fs::{create_dir_all, File};

#[derive(Serialize)]
struct Snapshot {
    time: f64,
    diameters: Vec<f64>,
    n_log_dp: Vec<f64>,
}

fn main() -> eyre::Result<()> {
    let config = GdeConfig::from_diameter_range(20, 3, 0.01, 1.0, ScaleType::Log).with_boundary_zero(true);
    let scale = config.scale;
    let mean = scale.coordinate(0.05);

    let model = GdeModelBuilder::new(config)
        // Growth slows down over the day as vapour is depleted
        .add_process(
            Process::Condensation,
            time_dependent(|dp: f64, t: f64| 0.01 / dp * (-0.1 * t).exp()),
        )?
        .add_process(Process::Deposition, stationary(|dp: f64| 0.02 + 0.05 * dp))?
        .add_coagulation(FuchsBrownian::new(scale), CoagulationSource::Compute)?
        .compile()?;

    let alpha0 = model.compute_coefficients(Target::Alpha, |x| gaussian(x, 1000.0, mean, 1.5))?;
    let dt = 0.1;
    let evolution = evolve(&model, &alpha0, dt, 241)?;

    let mut snapshots = Vec::new();
    for (time, alpha) in evolution.times.iter().zip(&evolution.coefficients).step_by(40) {
        let plot = model.nplot_discretisation(alpha, None, None)?;
        let total: f64 = (0..model.space().num_elements())
            .map(|e| model.space().mesh().element_length(e) * alpha[model.space().global_index(e, 0)])
            .sum();
        println!("t = {:5.1} h, N = {:10.3} cm⁻³", time, total);
        snapshots.push(Snapshot {
            time: *time,
            diameters: plot.diameters,
            n_log_dp: plot.n_log_dp.as_slice().to_vec(),
        });
    }

    create_dir_all("data")?;
    let file = File::create("data/evolve_gde.json")?;
    serde_json::to_writer_pretty(file, &snapshots)?;
    Ok(())
}
