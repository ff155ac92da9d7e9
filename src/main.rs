use ndarray::{concatenate, Array1, Array2, Axis};
use sls_sim as sls;
use sls_sim::{Controller, SynthesisAlgorithm};

/// State-feedback walkthrough: synthesize a centralized and a
/// d-localized H2 controller for a 10-state averaging chain, then hit
/// the closed loop with an impulse disturbance at the middle of the
/// chain and compare how far the actuation spreads.
fn main() -> sls::Result<()> {
    env_logger::init();

    let nx = 10;
    let sim_horizon = 25;

    let chain = sls::DoublyStochasticChain {
        rho: 1.0,
        actuator_density: 1.0,
        alpha: 0.2,
    };
    let (a_mat, b2_mat) = chain.generate(nx)?;
    let nu = b2_mat.ncols();
    let applied_actuation = b2_mat.clone();

    let c1_mat = concatenate![Axis(0), Array2::eye(nx), Array2::zeros((nu, nx))];
    let d12_mat = concatenate![Axis(0), Array2::zeros((nx, nu)), Array2::eye(nu)];
    let mut sys = sls::LtiSystem::builder(nx, nx)
        .dynamics(a_mat, b2_mat)
        .disturbance(Array2::eye(nx))
        .performance(c1_mat, d12_mat)
        .build()?;

    // impulse disturbance at the middle of the chain
    let mut noise = sls::FixedNoiseVector::new(nx, sim_horizon);
    noise.generate_from(&mut sls::ZeroNoise::new(nx))?;
    noise.w_mut(0)[nx / 2] = 10.0;
    sys.use_noise_model(Box::new(noise))?;

    let mut simulator = sls::Simulator::new(sys, sim_horizon);
    let x0 = Array1::zeros(nx);

    let synthesizer = sls::SlsSynthesizer::new(20, sls::Objective::H2);
    let mut controller = synthesizer.synthesize(simulator.system())?;
    controller.initialize();
    simulator.set_controller(Box::new(controller));
    simulator.system_mut().initialize(Some(&x0))?;
    rewind_noise(&mut simulator)?;

    let log = simulator.run()?;
    let actuation = sls::viz::matrix_series_product(&applied_actuation, &log.inputs)?;
    println!("{}", sls::viz::heat_map(&log.states, &actuation, "Centralized"));

    let localized = sls::DLocalizedSls::new(synthesizer, 1, 2, 3);
    let mut controller = localized.synthesize(simulator.system())?;
    controller.initialize();
    simulator.set_controller(Box::new(controller));
    // reuse the remembered initial state
    simulator.system_mut().initialize(None)?;
    rewind_noise(&mut simulator)?;

    let log = simulator.run()?;
    let actuation = sls::viz::matrix_series_product(&applied_actuation, &log.inputs)?;
    println!("{}", sls::viz::heat_map(&log.states, &actuation, "Localized"));

    Ok(())
}

fn rewind_noise(simulator: &mut sls::Simulator) -> sls::Result<()> {
    if let Some(noise) = simulator.system_mut().noise_model_mut() {
        noise.start_at_time(0)?;
    }
    Ok(())
}
