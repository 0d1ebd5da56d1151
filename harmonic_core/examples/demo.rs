use std::f64::consts::PI;

use healpix_harmonic_core::config::ConfigError;
use healpix_harmonic_core::pixel::{npix, pix2ang_ring};
use healpix_harmonic_core::{EngineConfig, HarmonicEngine, PixelOrdering, SkyMaps, SpectrumKind};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    println!(
        "Loaded config: strategy={:?} limit_range={:e} cache_capacity={} parallel={}",
        config.spin_strategy, config.limit_range, config.cache_capacity, config.parallel
    );
    let engine = HarmonicEngine::new(config)?;

    let nside = 16;
    // Dipole in temperature plus a pure E-mode quadrupole in Q.
    let mut t = Vec::with_capacity(npix(nside));
    let mut q = Vec::with_capacity(npix(nside));
    for pix in 0..npix(nside) {
        let (theta, _) = pix2ang_ring(nside, pix);
        t.push((3.0 / (4.0 * PI)).sqrt() * theta.cos());
        q.push((15.0 / (32.0 * PI)).sqrt() * theta.sin().powi(2));
    }
    let u = vec![0.0; q.len()];

    let alm = engine.map2alm(&t, PixelOrdering::Ring)?;
    println!("a_10 = {:.6}", alm.get(1, 0).unwrap_or_default());

    let (e, b) = engine.map2alm_spin(&q, &u, 2, PixelOrdering::Ring)?;
    println!(
        "E_20 = {:.6}, max |B| = {:.2e}",
        e.get(2, 0).unwrap_or_default(),
        b.as_slice().iter().map(|v| v.norm()).fold(0.0, f64::max)
    );

    let maps = SkyMaps::Full {
        t: &t,
        q: &q,
        u: &u,
    };
    let spectra = engine.anafast(&maps, None, PixelOrdering::Ring, 2)?;
    for kind in SpectrumKind::ALL {
        if let Some(cl) = spectra.get(kind) {
            println!("{} l=0..4: {:?}", kind, &cl.to_vec()[..5]);
        }
    }

    let stats = engine.cache_stats();
    println!(
        "Cache hit rates: rings {:.2} phases {:.2} spins {:.2}",
        stats.rings.hit_rate(),
        stats.phases.hit_rate(),
        stats.spins.hit_rate()
    );
    Ok(())
}

fn load_config() -> Result<EngineConfig, ConfigError> {
    EngineConfig::load_from_file("config/engine.toml").or_else(|err| {
        eprintln!("Falling back to default config: {err}");
        Ok(EngineConfig::default())
    })
}
