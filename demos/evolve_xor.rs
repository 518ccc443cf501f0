use neat_engine::{Genome, Neat, Result};

use log::info;
use ndarray::Array1;

use std::fs::{self, File};
use std::io::{prelude::*, BufWriter};

const DATA_DIR: &str = "demos/data/evolve_xor";

struct XorReport {
    time: Array1<f64>,
    input_1: Array1<f64>,
    input_2: Array1<f64>,
    target: Array1<f64>,
    output: Array1<f64>,
    fitness: f64,
}

// the two input bits shown during second `t`
fn sensors(t: f64) -> (bool, bool) {
    let case = t.floor() as usize % 4;
    (case & 1 == 1, case & 2 == 2)
}

fn xor(genome: &Genome) -> XorReport {
    // the four cases cycle once per second
    let start_time = 0.0;
    let end_time = 4.0;
    let time_step = 0.25;

    let time = Array1::<f64>::range(start_time, end_time, time_step);
    let input_1 = time.mapv(|t| sensors(t).0 as u8 as f64);
    let input_2 = time.mapv(|t| sensors(t).1 as u8 as f64);
    let target = time.mapv(|t| {
        let (sensor_1, sensor_2) = sensors(t);
        (sensor_1 ^ sensor_2) as u8 as f64
    });

    let mut output = Array1::<f64>::zeros(time.dim());
    for t in 0..time.dim() {
        output[t] = genome
            .evaluate(&[input_1[t], input_2[t]])
            .map_or(0.0, |values| values[0]);
    }

    // squared distance from the worst possible total error
    let absolute_diff = (&output - &target).mapv(f64::abs);
    let fitness = (time.dim() as f64 - absolute_diff.sum()).powi(2);

    XorReport {
        time,
        input_1,
        input_2,
        target,
        output,
        fitness,
    }
}

fn xor_fitness(genome: &Genome) -> f64 {
    xor(genome).fitness
}

fn write_run_report(path: &str, run: &XorReport) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(&mut writer, "time,input_1,input_2,output,target")?;

    for i in 0..run.time.dim() {
        writeln!(
            &mut writer,
            "{},{},{},{},{}",
            run.time[i], run.input_1[i], run.input_2[i], run.output[i], run.target[i]
        )?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    fs::create_dir_all(DATA_DIR)?;

    let mut neat = Neat::from_parameters("demos/parameters/evolve_xor.yaml", xor_fitness)?;
    info!("number of genomes at init: {}", neat.number_of_genomes());

    for checkpoint in [10, 20, 30] {
        neat.evolve(10)?;
        info!("number of genomes at gen {}: {}", checkpoint, neat.number_of_genomes());
        neat.write_fitness_values(format!("{DATA_DIR}/fitness_{checkpoint}.txt"))?;

        if let Some(champion) = neat.get_champion() {
            let report = xor(&champion);
            info!("champion fitness at gen {}: {:.4}", checkpoint, report.fitness);
            write_run_report(&format!("{DATA_DIR}/run_{checkpoint}.csv"), &report)?;
            champion.save_yaml(format!("{DATA_DIR}/champion_{checkpoint}.yaml"))?;
        }
    }

    Ok(())
}
