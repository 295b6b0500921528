use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use kra_expand::core::chemistry::Occupation;
use kra_expand::core::domain::Params;
use kra_expand::expansion::expand::Expander;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const KB_EV: f64 = 8.617333e-5;

#[derive(Parser, Debug)]
#[command(about = "Build the cluster indices for a cubic crystal and expand random configurations")]
struct Args {
    /// Number of worker threads for batch expansion
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// JSON file with build parameters (defaults to BCC Fe)
    #[arg(short, long)]
    config: Option<String>,

    /// Number of random configurations to expand
    #[arg(short, long, default_value_t = 8)]
    samples: usize,

    /// Temperature in kelvin
    #[arg(long, default_value_t = 900.0)]
    temperature: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn load_params(path: Option<&str>) -> Result<Params> {
    let Some(path) = path else {
        return Ok(Params::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    Params::from_json(&text).with_context(|| format!("Failed to parse {}", path))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let params = load_params(args.config.as_deref())?;

    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global();

    let start = Instant::now();
    let expander = Expander::from_params(&params).context("Failed to build expansion indices")?;
    println!("Indices built in {:?}", start.elapsed());
    println!("{:#?}", expander.stats());

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let energy: Vec<f64> = (0..expander.spec_clusters().spec_clusters().len())
        .map(|_| rng.gen_range(-0.05..0.05))
        .collect();
    let mut kra = expander.zero_kra_coefficients();
    let mut keys: Vec<_> = kra.keys().copied().collect();
    keys.sort_unstable();
    for key in keys {
        if let Some(coeffs) = kra.get_mut(&key) {
            for c in coeffs.iter_mut() {
                *c = rng.gen_range(0.0..0.02);
            }
        }
    }

    let occupations = (0..args.samples)
        .map(|_| {
            Occupation::new_random(
                expander.supercell().num_sites(),
                expander.species_pool(),
                expander.vacancy_site(),
                &mut rng,
            )
        })
        .collect::<kra_expand::Result<Vec<_>>>()
        .context("Failed to generate configurations")?;

    let beta = 1.0 / (KB_EV * args.temperature);
    let start = Instant::now();
    let results = expander
        .expand_batch(beta, &occupations, &energy, &kra)
        .context("Expansion failed")?;
    println!(
        "Expanded {} configurations in {:?}",
        results.len(),
        start.elapsed()
    );

    if let Some((wbar, bbar)) = results.first() {
        println!("Wbar trace: {:.6e}", wbar.trace());
        println!("|bbar|: {:.6e}", bbar.norm());
    }
    Ok(())
}
