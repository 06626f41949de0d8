//! Every generated kernel must be valid WGSL, checked with naga so no GPU is
//! needed.

use wgpu_fractal::{
    config::{OutputMode, Variant},
    shader::{self, validate::validate, KernelKey},
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn every_variant_and_mode_compiles() {
    init_logging();
    let mut failures = Vec::new();
    for variant in Variant::ALL {
        for mode in OutputMode::ALL {
            for inverse_base in [false, true] {
                let key = KernelKey {
                    variant,
                    inverse_base,
                    mode,
                };
                if let Err(error) = shader::generate_checked(key) {
                    failures.push(format!("{:?}: {}", key, error));
                }
            }
        }
    }
    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

#[test]
fn kernels_have_one_compute_entry_point() {
    init_logging();
    let key = KernelKey {
        variant: Variant::Nova,
        inverse_base: false,
        mode: OutputMode::OrbitTrap,
    };
    let module = validate(&shader::generate(key)).unwrap();
    assert_eq!(module.entry_points.len(), 1);
    assert_eq!(module.entry_points[0].name, shader::ENTRY_POINT);
    assert_eq!(module.entry_points[0].stage, naga::ShaderStage::Compute);
}

#[test]
fn buddha_kernels_bind_atomic_counters() {
    init_logging();
    for variant in Variant::ALL {
        let source = shader::generate(KernelKey {
            variant,
            inverse_base: false,
            mode: OutputMode::Buddha,
        });
        assert!(source.contains("array<atomic<u32>>"), "{}", variant);
        assert!(validate(&source).is_ok(), "{}", variant);
    }
}

#[test]
fn only_key_fields_change_the_source() {
    init_logging();
    let key = KernelKey {
        variant: Variant::Mandelbrot,
        inverse_base: false,
        mode: OutputMode::Smooth,
    };
    assert_eq!(shader::generate(key), shader::generate(key));
    assert_ne!(
        shader::generate(key),
        shader::generate(KernelKey {
            mode: OutputMode::Plain,
            ..key
        })
    );
}
