use std::f64::consts::PI;

use healpix_harmonic_core::pixel::{self, pix2ang_ring, ring_to_nest_indices};
use healpix_harmonic_core::{
    EngineConfig, HarmonicEngine, PixelOrdering, SkyMaps, SpectrumKind, SpinStrategy,
    TransformError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn engine() -> HarmonicEngine {
    HarmonicEngine::new(EngineConfig::default()).expect("default config is valid")
}

fn engine_with(config: EngineConfig) -> HarmonicEngine {
    HarmonicEngine::new(config).expect("config is valid")
}

fn analytic_map(nside: usize, f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    (0..pixel::npix(nside))
        .map(|p| {
            let (theta, phi) = pix2ang_ring(nside, p);
            f(theta, phi)
        })
        .collect()
}

fn random_map(nside: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..pixel::npix(nside))
        .map(|_| rng.gen_range(-1.0..1.0))
        .collect()
}

/// Y_10(θ) = sqrt(3/4π) cos θ
fn y10(theta: f64, _phi: f64) -> f64 {
    (3.0 / (4.0 * PI)).sqrt() * theta.cos()
}

/// ₂Y_20(θ, 0) = sqrt(15/32π) sin²θ
fn spin2_y20(theta: f64, _phi: f64) -> f64 {
    (15.0 / (32.0 * PI)).sqrt() * theta.sin().powi(2)
}

#[test]
fn constant_map_has_only_monopole() {
    let engine = engine();
    let map = vec![1.0; 192];
    let alm = engine.map2alm(&map, PixelOrdering::Ring).unwrap();

    let a00 = alm.get(0, 0).unwrap();
    assert!((a00.re - (4.0 * PI).sqrt()).abs() < 1e-12);
    assert!(a00.im.abs() < 1e-12);
    for m in 1..=alm.lmax() {
        for l in m..=alm.lmax() {
            assert!(alm.get(l, m).unwrap().norm() < 1e-12, "a_{}{}", l, m);
        }
    }

    let spectra = engine
        .anafast(&SkyMaps::Intensity(&map), None, PixelOrdering::Ring, 2)
        .unwrap();
    let tt = spectra.get(SpectrumKind::TT).unwrap();
    assert!((tt[0] - 4.0 * PI).abs() < 1e-11);
    for l in 1..tt.len() {
        assert!(tt[l].abs() < 1e-3 * tt[0], "C_{} = {}", l, tt[l]);
    }
}

#[test]
fn dipole_round_trip_converges_with_resolution() {
    let engine = engine();
    let mut errors = Vec::new();
    for nside in [4, 8] {
        let alm = engine
            .map2alm(&analytic_map(nside, y10), PixelOrdering::Ring)
            .unwrap();
        let a10 = alm.get(1, 0).unwrap();
        assert!(a10.im.abs() < 1e-12);
        errors.push((a10.re - 1.0).abs());
    }
    assert!(errors[0] < 1e-2, "N=4 error {}", errors[0]);
    assert!(errors[1] < 2e-3, "N=8 error {}", errors[1]);
    assert!(errors[1] < errors[0]);
}

#[test]
fn azimuthal_mode_is_recovered_at_its_order() {
    let engine = engine();
    // Y_21(θ, 0) cos φ = (Y_21 e^{iφ} + c.c.)/2 in the real-field convention.
    let map = analytic_map(8, |theta, phi| {
        -(15.0 / (8.0 * PI)).sqrt() * theta.sin() * theta.cos() * phi.cos()
    });
    let alm = engine.map2alm(&map, PixelOrdering::Ring).unwrap();
    let a21 = alm.get(2, 1).unwrap();
    assert!((a21.re - 0.5).abs() < 2e-3, "a21 = {}", a21);
    assert!(a21.im.abs() < 1e-12);
    assert!(alm.get(2, 0).unwrap().norm() < 1e-12);
    assert!(alm.get(2, 2).unwrap().norm() < 1e-12);
}

#[test]
fn pure_e_mode_is_recovered() {
    for strategy in [SpinStrategy::Table, SpinStrategy::Analytic] {
        let engine = engine_with(EngineConfig {
            spin_strategy: strategy,
            ..EngineConfig::default()
        });
        let q = analytic_map(8, spin2_y20);
        let u = vec![0.0; q.len()];
        let (e, b) = engine.map2alm_spin(&q, &u, 2, PixelOrdering::Ring).unwrap();

        let e20 = e.get(2, 0).unwrap();
        assert!((e20.re + 1.0).abs() < 1e-3, "{:?}: E_20 = {}", strategy, e20);
        assert!(b.as_slice().iter().all(|v| v.norm() < 1e-12));
        // Degrees below |s| carry nothing.
        assert_eq!(e.get(0, 0).unwrap().norm(), 0.0);
        assert_eq!(e.get(1, 1).unwrap().norm(), 0.0);

        let spectra = engine
            .anafast(
                &SkyMaps::Polarization { q: &q, u: &u },
                None,
                PixelOrdering::Ring,
                2,
            )
            .unwrap();
        assert_eq!(
            spectra.kinds(),
            &[SpectrumKind::EE, SpectrumKind::BB, SpectrumKind::EB]
        );
        let ee = spectra.get(SpectrumKind::EE).unwrap();
        assert!((ee[2] - 0.2).abs() < 1e-3, "EE_2 = {}", ee[2]);
        let bb = spectra.get(SpectrumKind::BB).unwrap();
        let eb = spectra.get(SpectrumKind::EB).unwrap();
        assert!(bb.iter().all(|v| v.abs() < 1e-20));
        assert!(eb.iter().all(|v| v.abs() < 1e-12));
    }
}

#[test]
fn spin_strategies_agree_on_random_maps() {
    let q = random_map(4, 11);
    let u = random_map(4, 12);
    let table = engine_with(EngineConfig {
        spin_strategy: SpinStrategy::Table,
        ..EngineConfig::default()
    });
    let analytic = engine_with(EngineConfig {
        spin_strategy: SpinStrategy::Analytic,
        ..EngineConfig::default()
    });
    let (e1, b1) = table.map2alm_spin(&q, &u, -2, PixelOrdering::Ring).unwrap();
    let (e2, b2) = analytic.map2alm_spin(&q, &u, -2, PixelOrdering::Ring).unwrap();
    let e_pairs = e1.as_slice().iter().zip(e2.as_slice());
    let b_pairs = b1.as_slice().iter().zip(b2.as_slice());
    for (x, y) in e_pairs.chain(b_pairs) {
        assert!((x - y).norm() < 1e-10);
    }
}

#[test]
fn spin_zero_equals_two_scalar_transforms() {
    let engine = engine();
    let q = random_map(4, 1);
    let u = random_map(4, 2);
    let (e, b) = engine.map2alm_spin(&q, &u, 0, PixelOrdering::Ring).unwrap();
    assert_eq!(e, engine.map2alm(&q, PixelOrdering::Ring).unwrap());
    assert_eq!(b, engine.map2alm(&u, PixelOrdering::Ring).unwrap());
}

#[test]
fn auto_spectrum_equals_cross_with_itself() {
    let engine = engine();
    let t = random_map(4, 3);
    let q = random_map(4, 4);
    let u = random_map(4, 5);

    let maps = SkyMaps::Full { t: &t, q: &q, u: &u };
    let auto = engine.anafast(&maps, None, PixelOrdering::Ring, 2).unwrap();
    let cross = engine
        .anafast(&maps, Some(&maps), PixelOrdering::Ring, 2)
        .unwrap();
    assert_eq!(auto.kinds(), &SpectrumKind::ALL);
    assert_eq!(auto, cross);

    let intensity = SkyMaps::Intensity(&t);
    assert_eq!(
        engine.anafast(&intensity, None, PixelOrdering::Ring, 2).unwrap(),
        engine
            .anafast(&intensity, Some(&intensity), PixelOrdering::Ring, 2)
            .unwrap()
    );
}

#[test]
fn cross_spectrum_requires_matching_inputs() {
    let engine = engine();
    let t = random_map(4, 6);
    let small = random_map(2, 7);
    let q = random_map(4, 8);

    let err = engine.anafast(
        &SkyMaps::Intensity(&t),
        Some(&SkyMaps::Polarization { q: &q, u: &q }),
        PixelOrdering::Ring,
        2,
    );
    assert!(matches!(err, Err(TransformError::ShapeMismatch { .. })));

    let err = engine.anafast(
        &SkyMaps::Intensity(&t),
        Some(&SkyMaps::Intensity(&small)),
        PixelOrdering::Ring,
        2,
    );
    assert!(matches!(err, Err(TransformError::ShapeMismatch { .. })));
}

fn to_nested(nside: usize, ring: &[f64]) -> Vec<f64> {
    let idx = ring_to_nest_indices(nside).unwrap();
    let mut nested = vec![0.0; ring.len()];
    for (r, &n) in idx.iter().enumerate() {
        nested[n] = ring[r];
    }
    nested
}

#[test]
fn nested_input_matches_ring_input() {
    let engine = engine();
    let ring = random_map(4, 9);
    let nested = to_nested(4, &ring);
    assert_eq!(
        engine.map2alm(&ring, PixelOrdering::Ring).unwrap(),
        engine.map2alm(&nested, PixelOrdering::Nested).unwrap()
    );
}

#[test]
fn nested_spin_input_matches_ring_input() {
    let engine = engine();
    let q = random_map(4, 16);
    let u = random_map(4, 17);
    let (q_nested, u_nested) = (to_nested(4, &q), to_nested(4, &u));
    for spin in [2, -2, 1] {
        assert_eq!(
            engine.map2alm_spin(&q, &u, spin, PixelOrdering::Ring).unwrap(),
            engine
                .map2alm_spin(&q_nested, &u_nested, spin, PixelOrdering::Nested)
                .unwrap(),
            "spin {}",
            spin
        );
    }
}

#[test]
fn nested_full_maps_give_ring_spectra() {
    let engine = engine();
    let t = random_map(4, 18);
    let q = random_map(4, 19);
    let u = random_map(4, 20);
    let (tn, qn, un) = (to_nested(4, &t), to_nested(4, &q), to_nested(4, &u));

    let ring = SkyMaps::Full { t: &t, q: &q, u: &u };
    let nested = SkyMaps::Full {
        t: &tn,
        q: &qn,
        u: &un,
    };
    assert_eq!(
        engine.anafast(&ring, None, PixelOrdering::Ring, 2).unwrap(),
        engine.anafast(&nested, None, PixelOrdering::Nested, 2).unwrap()
    );
    assert_eq!(
        engine
            .anafast(&ring, Some(&ring), PixelOrdering::Ring, 2)
            .unwrap(),
        engine
            .anafast(&nested, Some(&nested), PixelOrdering::Nested, 2)
            .unwrap()
    );
}

#[test]
fn parallel_and_sequential_results_are_identical() {
    let map = random_map(8, 10);
    let q = random_map(8, 13);
    let parallel = engine();
    let sequential = engine_with(EngineConfig {
        parallel: false,
        ..EngineConfig::default()
    });
    assert_eq!(
        parallel.map2alm(&map, PixelOrdering::Ring).unwrap(),
        sequential.map2alm(&map, PixelOrdering::Ring).unwrap()
    );
    assert_eq!(
        parallel.map2alm_spin(&q, &map, 2, PixelOrdering::Ring).unwrap(),
        sequential.map2alm_spin(&q, &map, 2, PixelOrdering::Ring).unwrap()
    );
}

#[test]
fn real_and_complex_ring_ffts_agree() {
    let map = random_map(4, 14);
    let real = engine();
    let complex = engine_with(EngineConfig {
        real_fft: false,
        ..EngineConfig::default()
    });
    let a = real.map2alm(&map, PixelOrdering::Ring).unwrap();
    let b = complex.map2alm(&map, PixelOrdering::Ring).unwrap();
    for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
        assert!((x - y).norm() < 1e-12);
    }
}

#[test]
fn transform_log_is_written_when_configured() {
    let dir = std::env::temp_dir().join(format!("sht_engine_log_{}", std::process::id()));
    let path = dir.join("transforms.jsonl");
    let _ = std::fs::remove_dir_all(&dir);

    let engine = engine_with(EngineConfig {
        log_path: Some(path.clone()),
        ..EngineConfig::default()
    });
    let map = vec![1.0; 48];
    engine.map2alm(&map, PixelOrdering::Ring).unwrap();
    engine
        .anafast(&SkyMaps::Intensity(&map), None, PixelOrdering::Ring, 2)
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let operations: Vec<String> = contents
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["operation"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(operations, vec!["map2alm", "anafast"]);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn unsupported_spin_is_reported() {
    let engine = engine_with(EngineConfig {
        spin_strategy: SpinStrategy::Analytic,
        ..EngineConfig::default()
    });
    let q = random_map(2, 15);
    let err = engine.map2alm_spin(&q, &q, 1, PixelOrdering::Ring);
    assert!(matches!(err, Err(TransformError::UnsupportedSpin { spin: 1, .. })));

    let err = engine.map2alm_spin(&q, &q, 6, PixelOrdering::Ring);
    assert!(matches!(err, Err(TransformError::UnsupportedSpin { spin: 6, .. })));
}
